use std::sync::Arc;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use leadbot_agent::TurnHandler;
use leadbot_core::config::ServerConfig;
use leadbot_core::connectors::{CalendarConnector, CrmConnector, Notifier, SpreadsheetConnector};
use leadbot_core::errors::InterfaceError;
use serde::Serialize;
use serde_json::json;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;
use uuid::Uuid;

use crate::{availability, chat, health, intake};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared handles for every route. Absent integrations are `Unconfigured` stand-ins;
/// `turns` is `None` when the assistant itself is not configured.
#[derive(Clone)]
pub struct AppState {
    pub turns: Option<Arc<TurnHandler>>,
    pub crm: Arc<dyn CrmConnector>,
    pub sheets: Arc<dyn SpreadsheetConnector>,
    pub calendar: Arc<dyn CalendarConnector>,
    pub notifier: Arc<dyn Notifier>,
    pub integrations: Integrations,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Integrations {
    pub assistant: bool,
    pub crm: bool,
    pub calendar: bool,
    pub sheets: bool,
    pub notifications: bool,
}

impl Integrations {
    pub fn missing(&self) -> Vec<&'static str> {
        [
            ("assistant", self.assistant),
            ("crm", self.crm),
            ("calendar", self.calendar),
            ("sheets", self.sheets),
            ("notifications", self.notifications),
        ]
        .into_iter()
        .filter_map(|(name, ready)| (!ready).then_some(name))
        .collect()
    }
}

pub fn router(state: AppState, server: &ServerConfig) -> Router {
    Router::new()
        .merge(chat::router())
        .merge(intake::router())
        .merge(availability::router())
        .merge(health::router())
        .with_state(state)
        .layer(cors_layer(&server.allowed_origins))
        .layer(TraceLayer::new_for_http())
}

/// Empty list or a lone `*` allows any origin.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(REQUEST_ID_HEADER),
        ]);

    if allowed_origins.is_empty() || allowed_origins.iter().any(|origin| origin == "*") {
        return base.allow_origin(Any);
    }

    let origins = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(
                    event_name = "server.cors.invalid_origin",
                    origin = %origin,
                    "skipping invalid CORS origin"
                );
                None
            }
        })
        .collect::<Vec<_>>();
    base.allow_origin(AllowOrigin::list(origins))
}

/// Inbound `X-Request-ID`, or a fresh v4 uuid.
pub fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty() && value.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Caller-facing error body: `{error, code, correlationId}`. Unless a public detail is
/// attached, `error` is the generic apology for the status class.
#[derive(Debug)]
pub struct ApiError {
    inner: InterfaceError,
    detail: Option<String>,
    code: Option<&'static str>,
}

impl From<InterfaceError> for ApiError {
    fn from(inner: InterfaceError) -> Self {
        Self { inner, detail: None, code: None }
    }
}

impl ApiError {
    /// Form validation failures; `message` is shown to the caller.
    pub fn bad_request(message: impl Into<String>, correlation_id: &str) -> Self {
        let message = message.into();
        Self {
            detail: Some(message.clone()),
            inner: InterfaceError::BadRequest { message, correlation_id: correlation_id.to_string() },
            code: None,
        }
    }

    pub fn not_configured(integration: &str, correlation_id: &str) -> Self {
        Self {
            inner: InterfaceError::ServiceUnavailable {
                message: format!("{integration} is not configured"),
                correlation_id: correlation_id.to_string(),
            },
            detail: None,
            code: Some("not_configured"),
        }
    }

    pub fn internal(detail: impl Into<String>, correlation_id: &str) -> Self {
        let detail = detail.into();
        Self {
            inner: InterfaceError::Internal {
                message: detail.clone(),
                correlation_id: correlation_id.to_string(),
            },
            detail: Some(detail),
            code: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.inner {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::GatewayTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let correlation_id = self.inner.correlation_id().to_string();
        let error = self.detail.unwrap_or_else(|| self.inner.user_message().to_string());
        let code = self.code.unwrap_or_else(|| self.inner.code());
        let body = json!({ "error": error, "code": code, "correlationId": correlation_id });

        let mut response = (status, Json(body)).into_response();
        if let Ok(value) = HeaderValue::from_str(&correlation_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }
}
