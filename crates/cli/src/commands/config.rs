use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use dabini_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

use super::CommandResult;

/// One rendered row: dotted key, display value, and the env keys that can set it, highest
/// precedence first.
struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

impl Field {
    fn new(key: &'static str, value: impl Into<String>, env_keys: &'static [&'static str]) -> Self {
        Self { key, value: value.into(), env_keys }
    }
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            )
        }
    };

    let file_path = detect_config_path();
    let file_doc = load_config_file_doc(file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(fields(&config).into_iter().map(|field| {
        let source = field_source(field.key, field.env_keys, file_doc.as_ref(), file_path.as_deref());
        render_line(field.key, &field.value, source)
    }));

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let engine_token = match &config.engine.token {
        Some(token) => redact_token(token.expose_secret()),
        None => "<unset>".to_string(),
    };

    vec![
        Field::new(
            "discord.bot_token",
            redact_token(config.discord.bot_token.expose_secret()),
            &["DABINI_DISCORD_BOT_TOKEN", "DISCORD_LOGIN_TOKEN"],
        ),
        Field::new(
            "discord.public_key",
            config.discord.public_key.clone(),
            &["DABINI_DISCORD_PUBLIC_KEY", "DISCORD_PUBLIC_KEY"],
        ),
        Field::new(
            "discord.api_base_url",
            config.discord.api_base_url.clone(),
            &["DABINI_DISCORD_API_BASE_URL"],
        ),
        Field::new(
            "discord.gateway_enabled",
            config.discord.gateway_enabled.to_string(),
            &["DABINI_DISCORD_GATEWAY_ENABLED"],
        ),
        Field::new(
            "engine.base_url",
            config.engine.base_url.clone(),
            &["DABINI_ENGINE_BASE_URL", "ENGINE_URL"],
        ),
        Field::new("engine.auth", format!("{:?}", config.engine.auth), &["DABINI_ENGINE_AUTH"]),
        Field::new("engine.token", engine_token, &["DABINI_ENGINE_TOKEN"]),
        Field::new(
            "engine.timeout_secs",
            config.engine.timeout_secs.to_string(),
            &["DABINI_ENGINE_TIMEOUT_SECS"],
        ),
        Field::new(
            "server.bind_address",
            config.server.bind_address.clone(),
            &["DABINI_SERVER_BIND_ADDRESS"],
        ),
        Field::new("server.port", config.server.port.to_string(), &["DABINI_SERVER_PORT", "PORT"]),
        Field::new(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["DABINI_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        Field::new(
            "gateway.max_reconnect_attempts",
            config.gateway.max_reconnect_attempts.to_string(),
            &["DABINI_GATEWAY_MAX_RECONNECT_ATTEMPTS"],
        ),
        Field::new(
            "gateway.keep_alive_interval_secs",
            config.gateway.keep_alive_interval_secs.to_string(),
            &["DABINI_GATEWAY_KEEP_ALIVE_INTERVAL_SECS"],
        ),
        Field::new(
            "remote_config.url",
            config.remote_config.url.as_deref().unwrap_or("<unset>"),
            &["DABINI_REMOTE_CONFIG_URL"],
        ),
        Field::new(
            "remote_config.cache_ttl_secs",
            config.remote_config.cache_ttl_secs.to_string(),
            &["DABINI_REMOTE_CONFIG_CACHE_TTL_SECS"],
        ),
        Field::new(
            "remote_config.activation_url",
            config.remote_config.activation_url.clone(),
            &["DABINI_REMOTE_CONFIG_ACTIVATION_URL"],
        ),
        Field::new(
            "bot.default_locale",
            config.bot.default_locale.clone(),
            &["DABINI_BOT_DEFAULT_LOCALE"],
        ),
        Field::new("bot.terms_url", config.bot.terms_url.clone(), &[]),
        Field::new("bot.privacy_url", config.bot.privacy_url.clone(), &[]),
        Field::new(
            "logging.level",
            config.logging.level.clone(),
            &["DABINI_LOGGING_LEVEL", "DABINI_LOG_LEVEL"],
        ),
        Field::new(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["DABINI_LOGGING_FORMAT", "DABINI_LOG_FORMAT"],
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("dabini.toml"), PathBuf::from("config/dabini.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    let env_hit = env_keys
        .iter()
        .find(|key| env::var(key).map(|value| !value.trim().is_empty()).unwrap_or(false));
    if let Some(env_key) = env_hit {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps at most the first four characters of a secret.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let prefix: String = trimmed.chars().take(4).collect();
    if prefix.chars().count() == trimmed.chars().count() {
        return "<redacted>".to_string();
    }
    format!("{prefix}***")
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_token};

    #[test]
    fn redaction_keeps_a_short_prefix_only() {
        assert_eq!(redact_token("  "), "<empty>");
        assert_eq!(redact_token("abc"), "<redacted>");
        assert_eq!(redact_token("MTIzNDU2.secret"), "MTIz***");
    }

    #[test]
    fn nested_paths_are_found_in_the_file_document() {
        let doc: Value = "[discord]\npublic_key = \"ab\"\n".parse().unwrap_or(Value::Boolean(false));

        assert!(contains_path(&doc, "discord.public_key"));
        assert!(!contains_path(&doc, "discord.bot_token"));
        assert!(!contains_path(&doc, "engine.base_url"));
    }
}
