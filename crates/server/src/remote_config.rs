use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use dabini_core::remote_config::{RemoteConfigError, RemoteConfigSource};
use serde_json::Value;

/// Fetches the remote parameter document over HTTP.
///
/// Accepts either a flat JSON object of scalars or a template of the form
/// `{"parameters": {"KEY": {"defaultValue": {"value": "..."}}}}`.
pub struct HttpRemoteConfigSource {
    http: reqwest::Client,
    url: String,
}

impl HttpRemoteConfigSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteConfigError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| RemoteConfigError::Fetch(error.to_string()))?;
        Ok(Self { http, url: url.into() })
    }
}

#[async_trait]
impl RemoteConfigSource for HttpRemoteConfigSource {
    async fn fetch(&self) -> Result<HashMap<String, String>, RemoteConfigError> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|error| RemoteConfigError::Fetch(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteConfigError::Fetch(format!("status {}", status.as_u16())));
        }

        let document: Value =
            response.json().await.map_err(|error| RemoteConfigError::Malformed(error.to_string()))?;
        flatten_document(&document)
    }
}

fn flatten_document(document: &Value) -> Result<HashMap<String, String>, RemoteConfigError> {
    let root = document
        .as_object()
        .ok_or_else(|| RemoteConfigError::Malformed("document is not an object".to_owned()))?;

    let parameters = match root.get("parameters").and_then(Value::as_object) {
        Some(parameters) => parameters,
        None => root,
    };

    Ok(parameters
        .iter()
        .filter_map(|(key, value)| {
            let value = value.pointer("/defaultValue/value").unwrap_or(value);
            scalar_text(value).map(|text| (key.clone(), text))
        })
        .collect())
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
