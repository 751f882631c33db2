use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use dabini_core::errors::{AuthError, EngineError};
use reqwest::Method;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, info};

use crate::credentials::CredentialProvider;
use crate::types::{
    ActivationRequest, ActivationResponse, EngineRequest, EngineResponse, ImageRequest,
    ImageResponse, ACTIVATION_ENDPOINT, IMAGE_EDIT_ENDPOINT, IMAGE_ENDPOINT, MESSAGES_ENDPOINT,
};

/// The engine operations the bot relies on.
#[async_trait]
pub trait EngineApi: Send + Sync {
    async fn send_messages(&self, request: &EngineRequest) -> Result<EngineResponse, EngineError>;

    async fn activate(&self, discord_user_id: &str) -> Result<ActivationResponse, EngineError>;

    async fn deactivate(&self, discord_user_id: &str) -> Result<ActivationResponse, EngineError>;

    async fn generate_image(&self, request: &ImageRequest) -> Result<ImageResponse, EngineError>;

    async fn edit_image(&self, request: &ImageRequest) -> Result<ImageResponse, EngineError>;
}

/// Authenticated HTTP wrapper around the engine.
///
/// The underlying HTTP client is created once by [`EngineClient::initialize`]; calling
/// [`EngineClient::request`] earlier fails with [`EngineError::Uninitialized`]. Every request
/// carries a bearer token from the credential provider, which owns refresh. No retries happen
/// here: the configured timeout is the only bound on a slow engine.
pub struct EngineClient {
    base_url: String,
    timeout: Duration,
    credentials: Arc<dyn CredentialProvider>,
    http: OnceLock<reqwest::Client>,
}

impl EngineClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            timeout,
            credentials,
            http: OnceLock::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_initialized(&self) -> bool {
        self.http.get().is_some()
    }

    pub async fn initialize(&self) -> Result<(), AuthError> {
        if self.is_initialized() {
            return Ok(());
        }

        self.credentials.bearer_token().await.map_err(|error| {
            error!(
                event_name = "system.engine.initialize_failed",
                provider = self.credentials.name(),
                error = %error,
                "engine credential check failed"
            );
            error
        })?;

        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|error| AuthError::Credential(format!("http client build failed: {error}")))?;
        let _ = self.http.set(http);

        info!(
            event_name = "system.engine.initialized",
            provider = self.credentials.name(),
            base_url = %self.base_url,
            "engine client initialized"
        );
        Ok(())
    }

    pub async fn request<B, R>(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<&B>,
    ) -> Result<R, EngineError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let http = self.http.get().ok_or(EngineError::Uninitialized)?;
        let method_name = method.as_str().to_owned();

        let result = self.send(http, endpoint, method, body).await;
        if let Err(failure) = &result {
            error!(
                event_name = "integration.engine.request_failed",
                endpoint,
                method = %method_name,
                error = %failure,
                "engine request failed"
            );
        }
        result
    }

    async fn send<B, R>(
        &self,
        http: &reqwest::Client,
        endpoint: &str,
        method: Method,
        body: Option<&B>,
    ) -> Result<R, EngineError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let method_name = method.as_str().to_owned();
        let token = self
            .credentials
            .bearer_token()
            .await
            .map_err(|error| EngineError::Credential(error.to_string()))?;

        let mut builder = http
            .request(method, format!("{}{endpoint}", self.base_url))
            .bearer_auth(token.expose_secret());
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|error| EngineError::Transport {
            endpoint: endpoint.to_owned(),
            method: method_name.clone(),
            message: error.to_string(),
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|error| EngineError::Transport {
            endpoint: endpoint.to_owned(),
            method: method_name.clone(),
            message: error.to_string(),
        })?;

        if !status.is_success() {
            return Err(EngineError::Status {
                endpoint: endpoint.to_owned(),
                method: method_name,
                status: status.as_u16(),
                body: text,
            });
        }

        let payload = if text.trim().is_empty() { "{}" } else { text.as_str() };
        serde_json::from_str(payload).map_err(|error| EngineError::Decode {
            endpoint: endpoint.to_owned(),
            method: method_name,
            message: error.to_string(),
        })
    }
}

#[async_trait]
impl EngineApi for EngineClient {
    async fn send_messages(&self, request: &EngineRequest) -> Result<EngineResponse, EngineError> {
        self.request(MESSAGES_ENDPOINT, Method::POST, Some(request)).await
    }

    async fn activate(&self, discord_user_id: &str) -> Result<ActivationResponse, EngineError> {
        let body = ActivationRequest { discord_user_id: discord_user_id.to_owned() };
        self.request(ACTIVATION_ENDPOINT, Method::POST, Some(&body)).await
    }

    async fn deactivate(&self, discord_user_id: &str) -> Result<ActivationResponse, EngineError> {
        let body = ActivationRequest { discord_user_id: discord_user_id.to_owned() };
        self.request(ACTIVATION_ENDPOINT, Method::DELETE, Some(&body)).await
    }

    async fn generate_image(&self, request: &ImageRequest) -> Result<ImageResponse, EngineError> {
        self.request(IMAGE_ENDPOINT, Method::POST, Some(request)).await
    }

    async fn edit_image(&self, request: &ImageRequest) -> Result<ImageResponse, EngineError> {
        self.request(IMAGE_EDIT_ENDPOINT, Method::POST, Some(request)).await
    }
}
