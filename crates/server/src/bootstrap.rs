use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use dabini_core::config::{AppConfig, EngineAuthMode, EngineConfig};
use dabini_core::errors::AuthError;
use dabini_core::remote_config::{
    RemoteConfigCache, RemoteConfigError, RemoteConfigSource, StaticRemoteConfigSource,
    ACTIVATION_URL_KEY,
};
use dabini_core::timezone::GuildTimezones;
use dabini_discord::commands::{BotSettings, CommandService};
use dabini_discord::dispatcher::InteractionDispatcher;
use dabini_discord::gateway::{
    ConnectionSupervisor, GatewayFactory, NoopGatewayFactory, SupervisorHandle, SupervisorPolicy,
};
use dabini_discord::messages::BotMessageHandler;
use dabini_discord::rest::{DiscordRestClient, PlatformApi, PlatformError};
use dabini_discord::verify::SignatureVerifier;
use dabini_engine::client::{EngineApi, EngineClient};
use dabini_engine::credentials::{
    CredentialProvider, MetadataIdentityTokenProvider, StaticTokenProvider,
};
use thiserror::Error;
use tracing::info;

use crate::health::{self, HealthState};
use crate::interactions::{self, InteractionState};
use crate::remote_config::HttpRemoteConfigSource;

const REMOTE_CONFIG_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Application {
    pub config: AppConfig,
    pub verifier: Arc<SignatureVerifier>,
    pub dispatcher: Arc<InteractionDispatcher>,
    pub gateway: Option<SupervisorHandle>,
}

impl Application {
    /// `/health` and `/interactions` on one listener.
    pub fn router(&self) -> Router {
        let gateway = self.gateway.as_ref().map(SupervisorHandle::subscribe);
        health::router(HealthState::new(gateway)).merge(interactions::router(
            InteractionState::new(Arc::clone(&self.verifier), Arc::clone(&self.dispatcher)),
        ))
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("invalid webhook public key: {0}")]
    PublicKey(#[source] AuthError),
    #[error("engine client initialization failed: {0}")]
    Engine(#[source] AuthError),
    #[error("platform client setup failed: {0}")]
    Platform(#[from] PlatformError),
    #[error("remote config client setup failed: {0}")]
    RemoteConfig(#[from] RemoteConfigError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    bootstrap_with_gateway(config, Arc::new(NoopGatewayFactory)).await
}

pub async fn bootstrap_with_gateway(
    config: AppConfig,
    gateway_factory: Arc<dyn GatewayFactory>,
) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let verifier = SignatureVerifier::from_hex(&config.discord.public_key)
        .map_err(BootstrapError::PublicKey)?;

    let engine = EngineClient::new(
        &config.engine.base_url,
        Duration::from_secs(config.engine.timeout_secs),
        credential_provider(&config.engine),
    );
    engine.initialize().await.map_err(BootstrapError::Engine)?;
    let engine: Arc<dyn EngineApi> = Arc::new(engine);

    let remote_config = Arc::new(RemoteConfigCache::new(
        remote_config_source(&config)?,
        HashMap::from([(ACTIVATION_URL_KEY.to_owned(), config.remote_config.activation_url.clone())]),
        Duration::from_secs(config.remote_config.cache_ttl_secs),
    ));

    let commands = Arc::new(CommandService::new(
        engine,
        remote_config,
        Arc::new(GuildTimezones::new()),
        BotSettings {
            default_locale: config.bot.default_locale.clone(),
            terms_url: config.bot.terms_url.clone(),
            privacy_url: config.bot.privacy_url.clone(),
            activation_url: config.remote_config.activation_url.clone(),
        },
    ));

    let platform: Arc<dyn PlatformApi> = Arc::new(DiscordRestClient::new(
        &config.discord.api_base_url,
        config.discord.bot_token.clone(),
    )?);
    let dispatcher =
        Arc::new(InteractionDispatcher::new(Arc::clone(&commands), Arc::clone(&platform)));

    let gateway = if config.discord.gateway_enabled {
        let handler = Arc::new(BotMessageHandler::new(commands, platform));
        let supervisor = ConnectionSupervisor::new(
            gateway_factory,
            handler,
            config.discord.bot_token.clone(),
            SupervisorPolicy::from(&config.gateway),
        );
        Some(supervisor.spawn())
    } else {
        None
    };
    info!(
        event_name = "system.bootstrap.gateway_mode",
        correlation_id = "bootstrap",
        gateway_enabled = config.discord.gateway_enabled,
        "gateway supervisor configured"
    );

    Ok(Application { config, verifier: Arc::new(verifier), dispatcher, gateway })
}

fn credential_provider(config: &EngineConfig) -> Arc<dyn CredentialProvider> {
    match (config.auth, config.token.clone()) {
        (EngineAuthMode::Static, Some(token)) => Arc::new(StaticTokenProvider::new(token)),
        (EngineAuthMode::Static, None) => {
            Arc::new(StaticTokenProvider::new(String::new().into()))
        }
        (EngineAuthMode::Metadata, _) => {
            Arc::new(MetadataIdentityTokenProvider::new(config.base_url.clone()))
        }
    }
}

fn remote_config_source(config: &AppConfig) -> Result<Arc<dyn RemoteConfigSource>, BootstrapError> {
    match config.remote_config.url.as_deref() {
        Some(url) => {
            info!(
                event_name = "system.bootstrap.remote_config",
                correlation_id = "bootstrap",
                source = "http",
                "remote config source configured"
            );
            Ok(Arc::new(HttpRemoteConfigSource::new(url, REMOTE_CONFIG_TIMEOUT)?))
        }
        None => {
            info!(
                event_name = "system.bootstrap.remote_config",
                correlation_id = "bootstrap",
                source = "static",
                "no remote config url set, serving configured defaults"
            );
            Ok(Arc::new(StaticRemoteConfigSource::default()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use dabini_core::config::{AppConfig, EngineAuthMode};
    use dabini_discord::gateway::{ConnectionState, NoopGatewayFactory};
    use secrecy::SecretString;
    use tower::ServiceExt;

    use super::{bootstrap_with_config, bootstrap_with_gateway, BootstrapError};

    const PUBLIC_KEY: &str = "3b6a27bcceb6a42d62a3a8d02a6f0d73653215771de243a63ac048a18b59da29";

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.discord.bot_token = SecretString::from("bot-token".to_owned());
        config.discord.public_key = PUBLIC_KEY.to_owned();
        config.discord.api_base_url = "http://127.0.0.1:9".to_owned();
        config.engine.base_url = "http://127.0.0.1:9".to_owned();
        config.engine.auth = EngineAuthMode::Static;
        config.engine.token = Some(SecretString::from("engine-token".to_owned()));
        config
    }

    #[tokio::test]
    async fn bootstrap_serves_health_without_gateway() -> Result<(), String> {
        let app = bootstrap_with_config(config()).await.map_err(|e| e.to_string())?;
        assert!(app.gateway.is_none());

        let request = Request::get("/health").body(Body::empty()).map_err(|e| e.to_string())?;
        let response = app.router().oneshot(request).await.map_err(|e| e.to_string())?;

        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn bootstrap_rejects_unusable_engine_credentials() {
        let mut config = config();
        config.engine.token = Some(SecretString::from("   ".to_owned()));

        let result = bootstrap_with_config(config).await;

        assert!(matches!(result, Err(BootstrapError::Engine(_))));
    }

    #[tokio::test]
    async fn bootstrap_rejects_invalid_public_key() {
        let mut config = config();
        config.discord.public_key = "abcd".to_owned();

        let result = bootstrap_with_config(config).await;

        assert!(matches!(result, Err(BootstrapError::PublicKey(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn gateway_enabled_starts_supervisor() -> Result<(), String> {
        let mut config = config();
        config.discord.gateway_enabled = true;

        let app = bootstrap_with_gateway(config, Arc::new(NoopGatewayFactory))
            .await
            .map_err(|e| e.to_string())?;
        let gateway = app.gateway.ok_or("gateway should be running")?;

        let mut status = gateway.subscribe();
        let ready = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            status.wait_for(|status| status.state == ConnectionState::Ready),
        )
        .await
        .map(|result| result.is_ok());
        assert_eq!(ready.ok(), Some(true));
        gateway.shutdown().await;
        Ok(())
    }
}
