use std::time::Duration;

use async_trait::async_trait;
use dabini_core::errors::AuthError;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

pub const DEFAULT_METADATA_BASE_URL: &str = "http://metadata.google.internal";
const IDENTITY_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/identity";
/// Identity tokens are valid for an hour; refresh a little before that.
const IDENTITY_TOKEN_TTL: Duration = Duration::from_secs(55 * 60);

/// Supplies the bearer credential attached to every engine request.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn bearer_token(&self) -> Result<SecretString, AuthError>;
}

pub struct StaticTokenProvider {
    token: SecretString,
}

impl StaticTokenProvider {
    pub fn new(token: SecretString) -> Self {
        Self { token }
    }
}

#[async_trait]
impl CredentialProvider for StaticTokenProvider {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn bearer_token(&self) -> Result<SecretString, AuthError> {
        if self.token.expose_secret().trim().is_empty() {
            return Err(AuthError::Credential("static engine token is empty".to_owned()));
        }
        Ok(self.token.clone())
    }
}

/// Fetches an OIDC identity token for `audience` from the cloud metadata server.
pub struct MetadataIdentityTokenProvider {
    http: reqwest::Client,
    metadata_base_url: String,
    audience: String,
    cached: Mutex<Option<(SecretString, Instant)>>,
}

impl MetadataIdentityTokenProvider {
    pub fn new(audience: impl Into<String>) -> Self {
        Self::with_metadata_base_url(audience, DEFAULT_METADATA_BASE_URL)
    }

    pub fn with_metadata_base_url(
        audience: impl Into<String>,
        metadata_base_url: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            metadata_base_url: metadata_base_url.into().trim_end_matches('/').to_owned(),
            audience: audience.into(),
            cached: Mutex::new(None),
        }
    }

    async fn fetch(&self) -> Result<SecretString, AuthError> {
        let url = format!("{}{IDENTITY_PATH}", self.metadata_base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("audience", self.audience.as_str())])
            .header("Metadata-Flavor", "Google")
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|error| AuthError::Credential(format!("metadata server unreachable: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Credential(format!(
                "metadata server returned status {}",
                status.as_u16()
            )));
        }

        let token = response
            .text()
            .await
            .map_err(|error| AuthError::Credential(format!("metadata body unreadable: {error}")))?;
        let token = token.trim().to_owned();
        if token.is_empty() {
            return Err(AuthError::Credential("metadata server returned an empty token".to_owned()));
        }

        debug!(
            event_name = "system.engine.identity_token_refreshed",
            audience = %self.audience,
            "fetched engine identity token"
        );
        Ok(token.into())
    }
}

#[async_trait]
impl CredentialProvider for MetadataIdentityTokenProvider {
    fn name(&self) -> &'static str {
        "metadata"
    }

    async fn bearer_token(&self) -> Result<SecretString, AuthError> {
        let mut cached = self.cached.lock().await;
        if let Some((token, fetched_at)) = cached.as_ref() {
            if fetched_at.elapsed() < IDENTITY_TOKEN_TTL {
                return Ok(token.clone());
            }
        }

        let token = self.fetch().await?;
        *cached = Some((token.clone(), Instant::now()));
        Ok(token)
    }
}
