use dabini_core::locale::Translations;
use dabini_core::timezone::TimeZoneSetting;
use dabini_engine::types::{EngineResponse, StockInfo, StockTimestamp};
use serde::Serialize;

pub const COLOR_UP: u32 = 0x00ff00;
pub const COLOR_DOWN: u32 = 0xff0000;
const ZERO_WIDTH_SPACE: char = '\u{200B}';

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<EmbedImage>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EmbedImage {
    pub url: String,
}

impl Embed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField { name: name.into(), value: value.into(), inline });
        self
    }

    pub fn footer(mut self, text: impl Into<String>) -> Self {
        self.footer = Some(EmbedFooter { text: text.into() });
        self
    }

    pub fn image(mut self, url: impl Into<String>) -> Self {
        self.image = Some(EmbedImage { url: url.into() });
        self
    }
}

/// Text plus embeds, rendered once and delivered by either the gateway or the webhook path.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderedReply {
    pub content: String,
    pub embeds: Vec<Embed>,
}

impl RenderedReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: content.into(), embeds: Vec::new() }
    }
}

/// Engine messages joined by a blank line, followed by stock cards and the image card.
pub fn render_engine_response(
    response: &EngineResponse,
    translations: &Translations,
    time_zone: &TimeZoneSetting,
) -> RenderedReply {
    let content = response_text(response, translations);
    let mut embeds: Vec<Embed> = response
        .stock_info()
        .iter()
        .map(|stock| stock_card(stock, translations, time_zone))
        .collect();
    if let Some(url) = response.giphy_url() {
        embeds.push(image_card(url, None));
    }

    RenderedReply { content, embeds }
}

pub fn response_text(response: &EngineResponse, translations: &Translations) -> String {
    let joined = response
        .messages
        .iter()
        .map(|message| message.trim())
        .filter(|message| !message.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    if joined.is_empty() {
        translations.no_response.to_owned()
    } else {
        joined
    }
}

pub fn stock_card(
    stock: &StockInfo,
    translations: &Translations,
    time_zone: &TimeZoneSetting,
) -> Embed {
    let rising = stock.change >= 0.0;
    let (symbol, color) = if rising { ("▲", COLOR_UP) } else { ("▼", COLOR_DOWN) };

    let mut card = Embed::new()
        .color(color)
        .title(format!("{} ({})", stock.stock_name, stock.ticker))
        .field(translations.price, format!("{} {}", stock.price, stock.currency), true)
        .field(
            translations.change,
            format!(
                "{symbol} {:.2} ({:.2}%)",
                stock.change.abs(),
                stock.change_percentage.abs()
            ),
            true,
        )
        .footer(format!(
            "{}: {}",
            translations.last_updated,
            format_timestamp(stock.timestamp.as_ref(), translations, time_zone)
        ));
    if let Some(url) = stock.url.as_deref().filter(|url| !url.trim().is_empty()) {
        card = card.url(url);
    }
    card
}

pub fn image_card(url: &str, description: Option<&str>) -> Embed {
    let card = Embed::new().image(url);
    match description.filter(|text| !text.trim().is_empty()) {
        Some(text) => card.description(text),
        None => card,
    }
}

fn format_timestamp(
    timestamp: Option<&StockTimestamp>,
    translations: &Translations,
    time_zone: &TimeZoneSetting,
) -> String {
    let Some(timestamp) = timestamp else {
        return "-".to_owned();
    };

    match timestamp.to_utc() {
        Ok(instant) => format!(
            "{} {}",
            time_zone.localize(instant).format(translations.date_time_pattern),
            time_zone.label
        ),
        Err(_) => match timestamp {
            StockTimestamp::Text(raw) => raw.clone(),
            StockTimestamp::EpochMillis(_) => "-".to_owned(),
        },
    }
}

/// Neutralizes markdown control characters and mention triggers in user-supplied text.
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        if matches!(ch, '\\' | '*' | '_' | '~' | '`' | '|' | '>' | '#' | '[' | ']') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }

    escaped
        .replace("@everyone", &format!("@{ZERO_WIDTH_SPACE}everyone"))
        .replace("@here", &format!("@{ZERO_WIDTH_SPACE}here"))
        .replace("<@", &format!("<@{ZERO_WIDTH_SPACE}"))
}

#[cfg(test)]
mod tests {
    use dabini_core::locale::{Language, Translations};
    use dabini_core::timezone::TimeZoneSetting;
    use dabini_engine::types::{AdditionalContent, EngineResponse, StockInfo, StockTimestamp};

    use super::{escape_markdown, render_engine_response, stock_card, COLOR_DOWN, COLOR_UP};

    fn en() -> &'static Translations {
        Language::En.translations()
    }

    fn stock(change: f64, change_percentage: f64) -> StockInfo {
        StockInfo {
            stock_name: "Acme".to_owned(),
            ticker: "ACME".to_owned(),
            price: 101.5,
            currency: "USD".to_owned(),
            change,
            change_percentage,
            url: Some("https://example.com/acme".to_owned()),
            timestamp: Some(StockTimestamp::Text("2024-05-01T00:00:00Z".to_owned())),
        }
    }

    #[test]
    fn falling_stock_renders_down_card() {
        let card = stock_card(&stock(-1.5, -1.456), en(), &TimeZoneSetting::utc());

        assert_eq!(card.color, Some(COLOR_DOWN));
        assert_eq!(card.title.as_deref(), Some("Acme (ACME)"));
        assert_eq!(card.fields[0].name, "Price");
        assert_eq!(card.fields[0].value, "101.5 USD");
        assert_eq!(card.fields[1].name, "Change");
        assert_eq!(card.fields[1].value, "▼ 1.50 (1.46%)");
    }

    #[test]
    fn rising_stock_renders_up_card_with_localized_footer() {
        let kst = TimeZoneSetting::from_minutes("KST", 9 * 60).unwrap_or_else(TimeZoneSetting::utc);
        let card = stock_card(&stock(0.0, 0.0), Language::Ko.translations(), &kst);

        assert_eq!(card.color, Some(COLOR_UP));
        assert_eq!(card.fields[1].value, "▲ 0.00 (0.00%)");
        assert_eq!(card.fields[0].name, "가격");
        assert_eq!(
            card.footer.map(|footer| footer.text).as_deref(),
            Some("마지막 업데이트: 2024. 5. 1. 09:00 KST")
        );
    }

    #[test]
    fn empty_messages_yield_no_response_text() {
        let reply = render_engine_response(&EngineResponse::default(), en(), &TimeZoneSetting::utc());
        assert_eq!(reply.content, "I couldn't generate a response.");
        assert!(reply.embeds.is_empty());
    }

    #[test]
    fn messages_join_with_blank_line_and_cards_follow() {
        let response = EngineResponse {
            messages: vec!["first".to_owned(), "second".to_owned()],
            additional_content: Some(AdditionalContent {
                stock_info_list: vec![stock(2.0, 1.0)],
                giphy_url: Some("https://giphy.example/x.gif".to_owned()),
            }),
        };

        let reply = render_engine_response(&response, en(), &TimeZoneSetting::utc());

        assert_eq!(reply.content, "first\n\nsecond");
        assert_eq!(reply.embeds.len(), 2);
        assert_eq!(
            reply.embeds[1].image.as_ref().map(|image| image.url.as_str()),
            Some("https://giphy.example/x.gif")
        );
    }

    #[test]
    fn sanitizer_neutralizes_markdown_and_mentions() {
        assert_eq!(escape_markdown("**bold** _x_"), "\\*\\*bold\\*\\* \\_x\\_");
        let cleaned = escape_markdown("hi @everyone and <@123>");
        assert!(!cleaned.contains("@everyone"));
        assert!(!cleaned.contains("<@1"));
    }
}
