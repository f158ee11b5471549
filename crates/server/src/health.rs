use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::state::{AppState, Integrations};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub integrations: Integrations,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<&'static str>,
    pub checked_at: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

/// Only the assistant gates readiness; the other integrations degrade individual tools.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let ready = state.integrations.assistant;
    let payload = HealthResponse {
        status: if ready { "ok" } else { "degraded" },
        integrations: state.integrations,
        missing: if ready { Vec::new() } else { state.integrations.missing() },
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};

    use crate::health::health;
    use crate::state::test_support::{app, get, send, unconfigured_state};
    use crate::state::{AppState, Integrations};

    #[tokio::test]
    async fn health_is_ok_when_assistant_is_configured() {
        let state = AppState {
            integrations: Integrations { assistant: true, crm: true, ..Integrations::default() },
            ..unconfigured_state()
        };

        let (status, Json(payload)) = health(State(state)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ok");
        assert!(payload.missing.is_empty());
        assert!(payload.integrations.crm);
    }

    #[tokio::test]
    async fn health_lists_missing_integrations_when_degraded() {
        let (status, body) = send(app(unconfigured_state()), get("/health")).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["missing"][0], "assistant");
        assert_eq!(body["integrations"]["calendar"], false);
        assert!(body["checkedAt"].is_string());
    }
}
