use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use dabini_core::errors::{ApplicationError, AuthError, InterfaceError};
use dabini_discord::dispatcher::{Dispatch, InteractionDispatcher};
use dabini_discord::interactions::Interaction;
use dabini_discord::verify::{SignatureVerifier, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct InteractionState {
    verifier: Arc<SignatureVerifier>,
    dispatcher: Arc<InteractionDispatcher>,
}

impl InteractionState {
    pub fn new(verifier: Arc<SignatureVerifier>, dispatcher: Arc<InteractionDispatcher>) -> Self {
        Self { verifier, dispatcher }
    }
}

pub fn router(state: InteractionState) -> Router {
    Router::new().route("/interactions", post(receive)).with_state(state)
}

/// Webhook entry point. The signature is checked against the raw bytes before any parsing;
/// deferred work is spawned only after the acknowledgement is built.
pub async fn receive(
    State(state): State<InteractionState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let correlation_id = Uuid::new_v4().to_string();

    match accept(&state, &headers, &body) {
        Ok(Dispatch { ack, followup }) => {
            debug!(
                event_name = "ingress.discord.interaction_acknowledged",
                correlation_id = %correlation_id,
                response_type = ack.kind,
                deferred = followup.is_some(),
                "acknowledged interaction"
            );
            if let Some(followup) = followup {
                tokio::spawn(followup);
            }
            (StatusCode::OK, Json(ack)).into_response()
        }
        Err(error) => {
            let interface = error.into_interface(correlation_id);
            warn!(
                event_name = "ingress.discord.interaction_rejected",
                correlation_id = %interface.correlation_id(),
                status = interface.status_code(),
                error = %interface,
                "rejected interaction request"
            );
            error_response(&interface)
        }
    }
}

fn accept(
    state: &InteractionState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Dispatch, ApplicationError> {
    let signature = header(headers, SIGNATURE_HEADER).ok_or(AuthError::MissingSignature)?;
    let timestamp = header(headers, TIMESTAMP_HEADER).ok_or(AuthError::MissingSignature)?;
    if !state.verifier.verify(body, signature, timestamp) {
        return Err(AuthError::InvalidSignature.into());
    }

    let interaction: Interaction = serde_json::from_slice(body)
        .map_err(|error| ApplicationError::MalformedRequest(format!("invalid interaction: {error}")))?;
    state
        .dispatcher
        .handle(interaction)
        .map_err(|error| ApplicationError::MalformedRequest(error.to_string()))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok()).filter(|value| !value.is_empty())
}

fn error_response(error: &InterfaceError) -> Response {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = json!({ "error": error.user_message(), "correlation_id": error.correlation_id() });
    (status, Json(body)).into_response()
}
