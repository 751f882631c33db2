//! Wire contracts of the engine HTTP API.

use chrono::{DateTime, TimeZone, Utc};
use dabini_core::errors::FormatError;
use dabini_core::session::Session;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

pub const MESSAGES_ENDPOINT: &str = "/messages";
pub const ACTIVATION_ENDPOINT: &str = "/activation/discord";
pub const IMAGE_ENDPOINT: &str = "/image";
pub const IMAGE_EDIT_ENDPOINT: &str = "/image/edit";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineRequest {
    pub messages: Vec<String>,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl EngineRequest {
    pub fn new(prompt: impl Into<String>, session: &Session) -> Self {
        Self {
            messages: vec![prompt.into()],
            session_id: session.session_id.clone(),
            speaker_name: session.speaker_name.clone(),
            user_id: session.user_id.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub messages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_content: Option<AdditionalContent>,
}

impl EngineResponse {
    pub fn stock_info(&self) -> &[StockInfo] {
        self.additional_content
            .as_ref()
            .map(|content| content.stock_info_list.as_slice())
            .unwrap_or_default()
    }

    pub fn giphy_url(&self) -> Option<&str> {
        self.additional_content
            .as_ref()
            .and_then(|content| content.giphy_url.as_deref())
            .filter(|url| !url.trim().is_empty())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AdditionalContent {
    #[serde(default, deserialize_with = "lenient_stock_list")]
    pub stock_info_list: Vec<StockInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub giphy_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StockInfo {
    pub stock_name: String,
    pub ticker: String,
    #[serde(deserialize_with = "lenient_number")]
    pub price: f64,
    #[serde(default)]
    pub currency: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub change: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub change_percentage: f64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub timestamp: Option<StockTimestamp>,
}

/// Quote time as sent by the engine: epoch milliseconds or an RFC 3339 string.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StockTimestamp {
    EpochMillis(f64),
    Text(String),
}

impl StockTimestamp {
    pub fn to_utc(&self) -> Result<DateTime<Utc>, FormatError> {
        match self {
            Self::EpochMillis(millis) => {
                if !millis.is_finite() {
                    return Err(FormatError::NonFiniteNumber);
                }
                Utc.timestamp_millis_opt(*millis as i64)
                    .single()
                    .ok_or_else(|| FormatError::InvalidTimestamp(millis.to_string()))
            }
            Self::Text(text) => {
                let trimmed = text.trim();
                if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
                    return Ok(parsed.with_timezone(&Utc));
                }
                trimmed
                    .parse::<i64>()
                    .ok()
                    .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
                    .ok_or_else(|| FormatError::InvalidTimestamp(text.clone()))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationRequest {
    pub discord_user_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationResponse {
    #[serde(default)]
    pub activation_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub session_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub is_returning_image: bool,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub response_message: Option<String>,
}

impl ImageResponse {
    pub fn image(&self) -> Option<&str> {
        if !(self.success && self.is_returning_image) {
            return None;
        }
        self.image_url.as_deref().filter(|url| !url.trim().is_empty())
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decodes each stock entry on its own. A malformed entry is logged and dropped so the text
/// reply around it still reaches the user.
fn lenient_stock_list<'de, D>(deserializer: D) -> Result<Vec<StockInfo>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            let failure = FormatError::MalformedStockEntry(format!("expected a list, got {other}"));
            warn!(
                event_name = "integration.engine.stock_skipped",
                error = %failure,
                "stock list ignored"
            );
            return Ok(Vec::new());
        }
    };

    Ok(entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value::<StockInfo>(entry) {
            Ok(stock) => Some(stock),
            Err(error) => {
                let failure = FormatError::MalformedStockEntry(error.to_string());
                warn!(
                    event_name = "integration.engine.stock_skipped",
                    index,
                    error = %failure,
                    "stock entry skipped"
                );
                None
            }
        })
        .collect())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

/// Accepts JSON numbers and numeric strings such as `"12.3"`.
fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(number) => number,
        NumberOrText::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| D::Error::custom(FormatError::InvalidNumber(text.clone())))?,
    };
    if value.is_finite() {
        Ok(value)
    } else {
        Err(D::Error::custom(FormatError::NonFiniteNumber))
    }
}
