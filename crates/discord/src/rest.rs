use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::commands::CommandDefinition;
use crate::delivery::{DeferredTarget, MessagePayload};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PlatformError {
    #[error("platform request to `{route}` failed: {message}")]
    Transport { route: String, message: String },
    #[error("platform route `{route}` returned {status}: {body}")]
    Status { route: String, status: u16, body: String },
    #[error("platform response from `{route}` could not be decoded: {message}")]
    Decode { route: String, message: String },
}

/// The chat platform's REST surface used outside the gateway connection.
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Replaces the deferred "thinking" placeholder of an interaction.
    async fn edit_original(
        &self,
        target: &DeferredTarget,
        payload: &MessagePayload,
    ) -> Result<(), PlatformError>;

    async fn create_followup(
        &self,
        target: &DeferredTarget,
        payload: &MessagePayload,
    ) -> Result<(), PlatformError>;

    async fn send_channel_message(
        &self,
        channel_id: &str,
        payload: &MessagePayload,
    ) -> Result<(), PlatformError>;

    async fn trigger_typing(&self, channel_id: &str) -> Result<(), PlatformError>;

    async fn current_application_id(&self) -> Result<String, PlatformError>;

    async fn register_commands(
        &self,
        application_id: &str,
        commands: &[CommandDefinition],
    ) -> Result<(), PlatformError>;
}

#[derive(Deserialize)]
struct ApplicationInfo {
    id: String,
}

#[derive(Deserialize)]
struct Ignored {}

pub struct DiscordRestClient {
    http: reqwest::Client,
    api_base_url: String,
    bot_token: SecretString,
}

impl DiscordRestClient {
    pub fn new(api_base_url: &str, bot_token: SecretString) -> Result<Self, PlatformError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build().map_err(|error| {
            PlatformError::Transport { route: "client".to_owned(), message: error.to_string() }
        })?;
        Ok(Self { http, api_base_url: api_base_url.trim_end_matches('/').to_owned(), bot_token })
    }

    async fn call<B, R>(
        &self,
        method: Method,
        route: &str,
        body: Option<&B>,
        authorized: bool,
    ) -> Result<R, PlatformError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let mut builder = self.http.request(method, format!("{}{route}", self.api_base_url));
        if authorized {
            builder = builder
                .header("Authorization", format!("Bot {}", self.bot_token.expose_secret()));
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|error| PlatformError::Transport {
            route: route.to_owned(),
            message: error.to_string(),
        })?;
        let status = response.status();
        let text = response.text().await.map_err(|error| PlatformError::Transport {
            route: route.to_owned(),
            message: error.to_string(),
        })?;

        if !status.is_success() {
            return Err(PlatformError::Status {
                route: route.to_owned(),
                status: status.as_u16(),
                body: text,
            });
        }

        let payload = if text.trim().is_empty() { "{}" } else { text.as_str() };
        serde_json::from_str(payload)
            .map_err(|error| PlatformError::Decode { route: route.to_owned(), message: error.to_string() })
    }
}

fn webhook_route(target: &DeferredTarget) -> String {
    format!("/webhooks/{}/{}", target.application_id, target.token)
}

#[async_trait]
impl PlatformApi for DiscordRestClient {
    async fn edit_original(
        &self,
        target: &DeferredTarget,
        payload: &MessagePayload,
    ) -> Result<(), PlatformError> {
        let route = format!("{}/messages/@original", webhook_route(target));
        self.call::<_, Ignored>(Method::PATCH, &route, Some(payload), false).await.map(|_| ())
    }

    async fn create_followup(
        &self,
        target: &DeferredTarget,
        payload: &MessagePayload,
    ) -> Result<(), PlatformError> {
        let route = webhook_route(target);
        self.call::<_, Ignored>(Method::POST, &route, Some(payload), false).await.map(|_| ())
    }

    async fn send_channel_message(
        &self,
        channel_id: &str,
        payload: &MessagePayload,
    ) -> Result<(), PlatformError> {
        let route = format!("/channels/{channel_id}/messages");
        self.call::<_, Ignored>(Method::POST, &route, Some(payload), true).await.map(|_| ())
    }

    async fn trigger_typing(&self, channel_id: &str) -> Result<(), PlatformError> {
        let route = format!("/channels/{channel_id}/typing");
        self.call::<(), Ignored>(Method::POST, &route, None, true).await.map(|_| ())
    }

    async fn current_application_id(&self) -> Result<String, PlatformError> {
        let info: ApplicationInfo =
            self.call::<(), _>(Method::GET, "/oauth2/applications/@me", None, true).await?;
        Ok(info.id)
    }

    async fn register_commands(
        &self,
        application_id: &str,
        commands: &[CommandDefinition],
    ) -> Result<(), PlatformError> {
        let route = format!("/applications/{application_id}/commands");
        self.call::<_, serde_json::Value>(Method::PUT, &route, Some(commands), true)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, patch, post, put};
    use axum::{Json, Router};
    use secrecy::SecretString;
    use serde_json::{json, Value};
    use tokio::sync::Mutex;

    use super::{DiscordRestClient, PlatformApi, PlatformError};
    use crate::commands::registration_payload;
    use crate::delivery::{DeferredTarget, MessagePayload};

    type Calls = Arc<Mutex<Vec<(String, Option<String>, Value)>>>;

    fn auth(headers: &HeaderMap) -> Option<String> {
        headers.get("authorization").and_then(|value| value.to_str().ok()).map(str::to_owned)
    }

    async fn spawn_platform(calls: Calls) -> Result<String, String> {
        let app = Router::new()
            .route(
                "/webhooks/{app}/{token}/messages/@original",
                patch(
                    |State(calls): State<Calls>,
                     Path((app, token)): Path<(String, String)>,
                     headers: HeaderMap,
                     Json(body): Json<Value>| async move {
                        calls.lock().await.push((format!("edit {app}/{token}"), auth(&headers), body));
                        Json(json!({ "id": "m1" }))
                    },
                ),
            )
            .route(
                "/channels/{id}/messages",
                post(
                    |State(calls): State<Calls>,
                     Path(id): Path<String>,
                     headers: HeaderMap,
                     Json(body): Json<Value>| async move {
                        calls.lock().await.push((format!("send {id}"), auth(&headers), body));
                        Json(json!({ "id": "m2" }))
                    },
                ),
            )
            .route(
                "/channels/{id}/typing",
                post(|| async { StatusCode::NO_CONTENT }),
            )
            .route(
                "/oauth2/applications/@me",
                get(|| async { Json(json!({ "id": "app-42", "name": "dabini" })) }),
            )
            .route(
                "/applications/{id}/commands",
                put(|Json(body): Json<Value>| async move {
                    if body.as_array().map(Vec::len) == Some(6) {
                        (StatusCode::OK, Json(body))
                    } else {
                        (StatusCode::BAD_REQUEST, Json(json!({ "message": "bad" })))
                    }
                }),
            )
            .with_state(calls);

        let listener =
            tokio::net::TcpListener::bind("127.0.0.1:0").await.map_err(|e| e.to_string())?;
        let addr = listener.local_addr().map_err(|e| e.to_string())?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(format!("http://{addr}"))
    }

    fn client(base: &str) -> Result<DiscordRestClient, String> {
        DiscordRestClient::new(base, SecretString::from("bot-token".to_owned()))
            .map_err(|e| e.to_string())
    }

    #[tokio::test]
    async fn webhook_edit_is_unauthenticated_and_channel_send_uses_bot_token() -> Result<(), String>
    {
        let calls: Calls = Arc::default();
        let base = spawn_platform(calls.clone()).await?;
        let client = client(&base)?;
        let target = DeferredTarget { application_id: "app".to_owned(), token: "tok".to_owned() };

        client
            .edit_original(&target, &MessagePayload::content("hi"))
            .await
            .map_err(|e| e.to_string())?;
        client
            .send_channel_message("c-1", &MessagePayload::content("yo"))
            .await
            .map_err(|e| e.to_string())?;
        client.trigger_typing("c-1").await.map_err(|e| e.to_string())?;

        let calls = calls.lock().await.clone();
        assert_eq!(calls[0].0, "edit app/tok");
        assert_eq!(calls[0].1, None);
        assert_eq!(calls[0].2, json!({ "content": "hi" }));
        assert_eq!(calls[1].0, "send c-1");
        assert_eq!(calls[1].1.as_deref(), Some("Bot bot-token"));
        Ok(())
    }

    #[tokio::test]
    async fn registers_commands_for_current_application() -> Result<(), String> {
        let base = spawn_platform(Arc::default()).await?;
        let client = client(&base)?;

        let application_id = client.current_application_id().await.map_err(|e| e.to_string())?;
        assert_eq!(application_id, "app-42");
        client
            .register_commands(&application_id, &registration_payload())
            .await
            .map_err(|e| e.to_string())?;

        let rejected = client.register_commands(&application_id, &[]).await;
        assert!(matches!(rejected, Err(PlatformError::Status { status: 400, .. })));
        Ok(())
    }
}
