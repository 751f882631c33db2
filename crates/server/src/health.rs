use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use dabini_discord::gateway::SupervisorStatus;
use serde::Serialize;
use tokio::sync::watch;

#[derive(Clone, Default)]
pub struct HealthState {
    gateway: Option<watch::Receiver<SupervisorStatus>>,
}

impl HealthState {
    pub fn new(gateway: Option<watch::Receiver<SupervisorStatus>>) -> Self {
        Self { gateway }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub gateway: &'static str,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

/// Liveness only. Always 200; the gateway state is informational.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let gateway = state
        .gateway
        .as_ref()
        .map(|status| status.borrow().state.as_str())
        .unwrap_or("disabled");

    let payload =
        HealthResponse { status: "ok", timestamp: Utc::now().to_rfc3339(), gateway };
    (StatusCode::OK, Json(payload))
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};
    use dabini_discord::gateway::{ConnectionState, SupervisorStatus};
    use tokio::sync::watch;

    use crate::health::{health, HealthState};

    #[tokio::test]
    async fn health_reports_disabled_gateway() {
        let (status, Json(payload)) = health(State(HealthState::default())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ok");
        assert_eq!(payload.gateway, "disabled");
        assert!(chrono::DateTime::parse_from_rfc3339(&payload.timestamp).is_ok());
    }

    #[tokio::test]
    async fn health_stays_ok_when_gateway_gave_up() {
        let (_sender, receiver) = watch::channel(SupervisorStatus {
            state: ConnectionState::GaveUp,
            reconnect_attempts: 5,
            max_reconnect_attempts: 5,
            is_reconnecting: false,
            fatal_reports: 1,
        });

        let (status, Json(payload)) = health(State(HealthState::new(Some(receiver)))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.gateway, "gave_up");
    }
}
