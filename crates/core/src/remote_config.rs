use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::warn;

pub const ACTIVATION_URL_KEY: &str = "ACTIVATION_URL";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RemoteConfigError {
    #[error("remote config fetch failed: {0}")]
    Fetch(String),
    #[error("remote config document is malformed: {0}")]
    Malformed(String),
}

/// Source of a flat key/value configuration document.
#[async_trait]
pub trait RemoteConfigSource: Send + Sync {
    async fn fetch(&self) -> Result<HashMap<String, String>, RemoteConfigError>;
}

/// Serves a fixed document. Used when no remote endpoint is configured.
#[derive(Clone, Debug, Default)]
pub struct StaticRemoteConfigSource {
    values: HashMap<String, String>,
}

impl StaticRemoteConfigSource {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self { values }
    }
}

#[async_trait]
impl RemoteConfigSource for StaticRemoteConfigSource {
    async fn fetch(&self) -> Result<HashMap<String, String>, RemoteConfigError> {
        Ok(self.values.clone())
    }
}

struct CachedDocument {
    values: HashMap<String, String>,
    fetched_at: Instant,
}

/// Process-wide cache over a [`RemoteConfigSource`].
///
/// A fetched document is served for `ttl`; the first lookup after that refetches. Defaults are
/// layered under the fetched values. Lookups never fail. A failed fetch keeps serving the last
/// good document, or only the defaults if there is none, and the next attempt waits a full `ttl`.
/// A blank or missing value yields the caller's default.
pub struct RemoteConfigCache {
    source: Arc<dyn RemoteConfigSource>,
    defaults: HashMap<String, String>,
    ttl: Duration,
    cached: Mutex<Option<CachedDocument>>,
}

impl RemoteConfigCache {
    pub fn new(
        source: Arc<dyn RemoteConfigSource>,
        defaults: HashMap<String, String>,
        ttl: Duration,
    ) -> Self {
        Self { source, defaults, ttl, cached: Mutex::new(None) }
    }

    pub async fn get_value(&self, key: &str, default: &str) -> String {
        let mut cached = self.cached.lock().await;

        let stale = cached.as_ref().map(|document| document.fetched_at.elapsed() >= self.ttl);
        if stale.unwrap_or(true) {
            match self.source.fetch().await {
                Ok(values) => {
                    let mut merged = self.defaults.clone();
                    merged.extend(values);
                    *cached = Some(CachedDocument { values: merged, fetched_at: Instant::now() });
                }
                Err(error) => {
                    warn!(
                        event_name = "system.remote_config.fetch_failed",
                        key,
                        error = %error,
                        serving_stale = cached.is_some(),
                        "remote config fetch failed, retrying after ttl"
                    );
                    let values = match cached.take() {
                        Some(previous) => previous.values,
                        None => self.defaults.clone(),
                    };
                    *cached = Some(CachedDocument { values, fetched_at: Instant::now() });
                }
            }
        }

        let value = cached
            .as_ref()
            .and_then(|document| document.values.get(key))
            .map(|value| value.trim())
            .filter(|value| !value.is_empty());
        match value {
            Some(value) => value.to_owned(),
            None => {
                warn!(
                    event_name = "system.remote_config.key_missing",
                    key, "remote config parameter not found, using default value"
                );
                default.to_owned()
            }
        }
    }

    /// Drops the cached document so the next lookup refetches.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }
}
