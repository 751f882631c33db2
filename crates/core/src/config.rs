use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub discord: DiscordConfig,
    pub engine: EngineConfig,
    pub server: ServerConfig,
    pub gateway: GatewayConfig,
    pub remote_config: RemoteConfigSettings,
    pub bot: BotConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DiscordConfig {
    pub bot_token: SecretString,
    pub public_key: String,
    pub api_base_url: String,
    pub gateway_enabled: bool,
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub base_url: String,
    pub auth: EngineAuthMode,
    pub token: Option<SecretString>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

/// Reconnection budget and keep-alive cadence for the gateway connection.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub max_reconnect_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub retry_delay_ms: u64,
    pub keep_alive_interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct RemoteConfigSettings {
    pub url: Option<String>,
    pub cache_ttl_secs: u64,
    pub activation_url: String,
}

#[derive(Clone, Debug)]
pub struct BotConfig {
    pub default_locale: String,
    pub terms_url: String,
    pub privacy_url: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineAuthMode {
    Static,
    Metadata,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub discord_bot_token: Option<String>,
    pub discord_public_key: Option<String>,
    pub discord_api_base_url: Option<String>,
    pub gateway_enabled: Option<bool>,
    pub engine_base_url: Option<String>,
    pub engine_auth: Option<EngineAuthMode>,
    pub engine_token: Option<String>,
    pub server_port: Option<u16>,
    pub remote_config_url: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

pub const DEFAULT_DISCORD_API_BASE_URL: &str = "https://discord.com/api/v10";
pub const DEFAULT_ACTIVATION_URL: &str = "https://dabinilab.com/activation";

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            discord: DiscordConfig {
                bot_token: String::new().into(),
                public_key: String::new(),
                api_base_url: DEFAULT_DISCORD_API_BASE_URL.to_string(),
                gateway_enabled: false,
            },
            engine: EngineConfig {
                base_url: String::new(),
                auth: EngineAuthMode::Metadata,
                token: None,
                timeout_secs: 60,
            },
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            gateway: GatewayConfig {
                max_reconnect_attempts: 5,
                base_delay_ms: 1_000,
                max_delay_ms: 30_000,
                retry_delay_ms: 5_000,
                keep_alive_interval_secs: 300,
            },
            remote_config: RemoteConfigSettings {
                url: None,
                cache_ttl_secs: 300,
                activation_url: DEFAULT_ACTIVATION_URL.to_string(),
            },
            bot: BotConfig {
                default_locale: "en".to_string(),
                terms_url: "https://dabinilab.com/terms/".to_string(),
                privacy_url: "https://dabinilab.com/privacy/".to_string(),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for EngineAuthMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(Self::Static),
            "metadata" => Ok(Self::Metadata),
            other => Err(ConfigError::Validation(format!(
                "unsupported engine auth mode `{other}` (expected static|metadata)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("dabini.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(discord) = patch.discord {
            if let Some(bot_token_value) = discord.bot_token {
                self.discord.bot_token = secret_value(bot_token_value);
            }
            if let Some(public_key) = discord.public_key {
                self.discord.public_key = public_key;
            }
            if let Some(api_base_url) = discord.api_base_url {
                self.discord.api_base_url = api_base_url;
            }
            if let Some(gateway_enabled) = discord.gateway_enabled {
                self.discord.gateway_enabled = gateway_enabled;
            }
        }

        if let Some(engine) = patch.engine {
            if let Some(base_url) = engine.base_url {
                self.engine.base_url = base_url;
            }
            if let Some(auth) = engine.auth {
                self.engine.auth = auth;
            }
            if let Some(engine_token_value) = engine.token {
                self.engine.token = Some(secret_value(engine_token_value));
            }
            if let Some(timeout_secs) = engine.timeout_secs {
                self.engine.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(gateway) = patch.gateway {
            if let Some(max_reconnect_attempts) = gateway.max_reconnect_attempts {
                self.gateway.max_reconnect_attempts = max_reconnect_attempts;
            }
            if let Some(base_delay_ms) = gateway.base_delay_ms {
                self.gateway.base_delay_ms = base_delay_ms;
            }
            if let Some(max_delay_ms) = gateway.max_delay_ms {
                self.gateway.max_delay_ms = max_delay_ms;
            }
            if let Some(retry_delay_ms) = gateway.retry_delay_ms {
                self.gateway.retry_delay_ms = retry_delay_ms;
            }
            if let Some(keep_alive_interval_secs) = gateway.keep_alive_interval_secs {
                self.gateway.keep_alive_interval_secs = keep_alive_interval_secs;
            }
        }

        if let Some(remote_config) = patch.remote_config {
            if let Some(url) = remote_config.url {
                self.remote_config.url = Some(url);
            }
            if let Some(cache_ttl_secs) = remote_config.cache_ttl_secs {
                self.remote_config.cache_ttl_secs = cache_ttl_secs;
            }
            if let Some(activation_url) = remote_config.activation_url {
                self.remote_config.activation_url = activation_url;
            }
        }

        if let Some(bot) = patch.bot {
            if let Some(default_locale) = bot.default_locale {
                self.bot.default_locale = default_locale;
            }
            if let Some(terms_url) = bot.terms_url {
                self.bot.terms_url = terms_url;
            }
            if let Some(privacy_url) = bot.privacy_url {
                self.bot.privacy_url = privacy_url;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let bot_token =
            read_env("DABINI_DISCORD_BOT_TOKEN").or_else(|| read_env("DISCORD_LOGIN_TOKEN"));
        if let Some(value) = bot_token {
            self.discord.bot_token = secret_value(value);
        }
        let public_key =
            read_env("DABINI_DISCORD_PUBLIC_KEY").or_else(|| read_env("DISCORD_PUBLIC_KEY"));
        if let Some(value) = public_key {
            self.discord.public_key = value;
        }
        if let Some(value) = read_env("DABINI_DISCORD_API_BASE_URL") {
            self.discord.api_base_url = value;
        }
        if let Some(value) = read_env("DABINI_DISCORD_GATEWAY_ENABLED") {
            self.discord.gateway_enabled = parse_bool("DABINI_DISCORD_GATEWAY_ENABLED", &value)?;
        }

        let engine_url = read_env("DABINI_ENGINE_BASE_URL").or_else(|| read_env("ENGINE_URL"));
        if let Some(value) = engine_url {
            self.engine.base_url = value;
        }
        if let Some(value) = read_env("DABINI_ENGINE_AUTH") {
            self.engine.auth = value.parse()?;
        }
        if let Some(value) = read_env("DABINI_ENGINE_TOKEN") {
            self.engine.token = Some(secret_value(value));
        }
        if let Some(value) = read_env("DABINI_ENGINE_TIMEOUT_SECS") {
            self.engine.timeout_secs = parse_u64("DABINI_ENGINE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("DABINI_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("DABINI_SERVER_PORT") {
            self.server.port = parse_u16("DABINI_SERVER_PORT", &value)?;
        } else if let Some(value) = read_env("PORT") {
            self.server.port = parse_u16("PORT", &value)?;
        }
        if let Some(value) = read_env("DABINI_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("DABINI_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("DABINI_GATEWAY_MAX_RECONNECT_ATTEMPTS") {
            self.gateway.max_reconnect_attempts =
                parse_u32("DABINI_GATEWAY_MAX_RECONNECT_ATTEMPTS", &value)?;
        }
        if let Some(value) = read_env("DABINI_GATEWAY_KEEP_ALIVE_INTERVAL_SECS") {
            self.gateway.keep_alive_interval_secs =
                parse_u64("DABINI_GATEWAY_KEEP_ALIVE_INTERVAL_SECS", &value)?;
        }

        if let Some(value) = read_env("DABINI_REMOTE_CONFIG_URL") {
            self.remote_config.url = Some(value);
        }
        if let Some(value) = read_env("DABINI_REMOTE_CONFIG_CACHE_TTL_SECS") {
            self.remote_config.cache_ttl_secs =
                parse_u64("DABINI_REMOTE_CONFIG_CACHE_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("DABINI_REMOTE_CONFIG_ACTIVATION_URL") {
            self.remote_config.activation_url = value;
        }

        if let Some(value) = read_env("DABINI_BOT_DEFAULT_LOCALE") {
            self.bot.default_locale = value;
        }

        let log_level = read_env("DABINI_LOGGING_LEVEL").or_else(|| read_env("DABINI_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("DABINI_LOGGING_FORMAT").or_else(|| read_env("DABINI_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(bot_token) = overrides.discord_bot_token {
            self.discord.bot_token = secret_value(bot_token);
        }
        if let Some(public_key) = overrides.discord_public_key {
            self.discord.public_key = public_key;
        }
        if let Some(api_base_url) = overrides.discord_api_base_url {
            self.discord.api_base_url = api_base_url;
        }
        if let Some(gateway_enabled) = overrides.gateway_enabled {
            self.discord.gateway_enabled = gateway_enabled;
        }
        if let Some(base_url) = overrides.engine_base_url {
            self.engine.base_url = base_url;
        }
        if let Some(auth) = overrides.engine_auth {
            self.engine.auth = auth;
        }
        if let Some(token) = overrides.engine_token {
            self.engine.token = Some(secret_value(token));
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(url) = overrides.remote_config_url {
            self.remote_config.url = Some(url);
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_discord(&self.discord)?;
        validate_engine(&self.engine)?;
        validate_server(&self.server)?;
        validate_gateway(&self.gateway)?;
        validate_remote_config(&self.remote_config)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("dabini.toml"), PathBuf::from("config/dabini.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_discord(discord: &DiscordConfig) -> Result<(), ConfigError> {
    if discord.bot_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "discord.bot_token is required. Get it from https://discord.com/developers/applications > Your App > Bot > Token".to_string(),
        ));
    }

    let public_key = discord.public_key.trim();
    if public_key.is_empty() {
        return Err(ConfigError::Validation(
            "discord.public_key is required. Get it from https://discord.com/developers/applications > Your App > General Information > Public Key".to_string(),
        ));
    }
    if public_key.len() != 64 || !public_key.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return Err(ConfigError::Validation(
            "discord.public_key must be 64 hexadecimal characters (an Ed25519 public key)"
                .to_string(),
        ));
    }

    if !is_http_url(&discord.api_base_url) {
        return Err(ConfigError::Validation(
            "discord.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_engine(engine: &EngineConfig) -> Result<(), ConfigError> {
    if engine.base_url.trim().is_empty() {
        return Err(ConfigError::Validation(
            "engine.base_url is required (set DABINI_ENGINE_BASE_URL or ENGINE_URL)".to_string(),
        ));
    }
    if !is_http_url(&engine.base_url) {
        return Err(ConfigError::Validation(
            "engine.base_url must start with http:// or https://".to_string(),
        ));
    }

    if engine.timeout_secs == 0 || engine.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "engine.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if engine.auth == EngineAuthMode::Static {
        let missing = engine
            .token
            .as_ref()
            .map(|value| value.expose_secret().trim().is_empty())
            .unwrap_or(true);
        if missing {
            return Err(ConfigError::Validation(
                "engine.token is required when engine.auth = \"static\"".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_gateway(gateway: &GatewayConfig) -> Result<(), ConfigError> {
    if gateway.max_reconnect_attempts == 0 {
        return Err(ConfigError::Validation(
            "gateway.max_reconnect_attempts must be greater than zero".to_string(),
        ));
    }

    if gateway.base_delay_ms > gateway.max_delay_ms {
        return Err(ConfigError::Validation(
            "gateway.base_delay_ms must not exceed gateway.max_delay_ms".to_string(),
        ));
    }

    if gateway.keep_alive_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "gateway.keep_alive_interval_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_remote_config(remote_config: &RemoteConfigSettings) -> Result<(), ConfigError> {
    if let Some(url) = &remote_config.url {
        if !is_http_url(url) {
            return Err(ConfigError::Validation(
                "remote_config.url must start with http:// or https://".to_string(),
            ));
        }
    }

    if !is_http_url(&remote_config.activation_url) {
        return Err(ConfigError::Validation(
            "remote_config.activation_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn is_http_url(value: &str) -> bool {
    let value = value.trim();
    value.starts_with("http://") || value.starts_with("https://")
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    discord: Option<DiscordPatch>,
    engine: Option<EnginePatch>,
    server: Option<ServerPatch>,
    gateway: Option<GatewayPatch>,
    remote_config: Option<RemoteConfigPatch>,
    bot: Option<BotPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DiscordPatch {
    bot_token: Option<String>,
    public_key: Option<String>,
    api_base_url: Option<String>,
    gateway_enabled: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct EnginePatch {
    base_url: Option<String>,
    auth: Option<EngineAuthMode>,
    token: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct GatewayPatch {
    max_reconnect_attempts: Option<u32>,
    base_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
    retry_delay_ms: Option<u64>,
    keep_alive_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RemoteConfigPatch {
    url: Option<String>,
    cache_ttl_secs: Option<u64>,
    activation_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BotPatch {
    default_locale: Option<String>,
    terms_url: Option<String>,
    privacy_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
