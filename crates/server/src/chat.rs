//! Widget-facing conversation routes.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use leadbot_core::domain::run::ThreadId;
use leadbot_core::domain::turn::{
    ImagePayload, StructuredAction, TurnContext, TurnOutcome, UserContent,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::state::{correlation_id, ApiError, AppState};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    #[serde(default, alias = "threadRef")]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub content: Option<ContentField>,
    #[serde(default)]
    pub image: Option<ImagePayload>,
    #[serde(default)]
    pub context: Option<RequestContext>,
}

/// `content` is either plain text or an object carrying an image.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ContentField {
    Text(String),
    Image(ImagePayload),
    Parts {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        image: Option<ImagePayload>,
    },
}

impl TurnRequest {
    /// `message` and `image` win over the matching parts of `content`.
    fn user_content(&mut self) -> UserContent {
        let (text, image) = match self.content.take() {
            Some(ContentField::Text(text)) => (Some(text), None),
            Some(ContentField::Image(image)) => (None, Some(image)),
            Some(ContentField::Parts { text, image }) => (text, image),
            None => (None, None),
        };
        UserContent { text: self.message.take().or(text), image: self.image.take().or(image) }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RequestContext {
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
}

/// Reply shape for `/turn`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    pub thread_ref: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<StructuredAction>,
}

/// Reply shape the embedded widget reads from `/api/message`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub thread_id: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<StructuredAction>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadResponse {
    pub thread_id: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/thread", post(create_thread))
        .route("/api/message", post(send_message))
        .route("/turn", post(turn))
}

async fn create_thread(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ThreadResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let Some(turns) = state.turns.as_ref() else {
        return Err(ApiError::not_configured("assistant", &correlation_id));
    };

    let thread_id = turns.create_thread(&correlation_id).await.map_err(|error| {
        warn!(
            event_name = "server.thread.failed",
            correlation_id = %correlation_id,
            error = %error,
            "thread creation failed"
        );
        ApiError::from(error.into_interface(correlation_id.as_str()))
    })?;
    Ok(Json(ThreadResponse { thread_id: thread_id.0 }))
}

async fn send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<TurnRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let outcome = run_turn(&state, &headers, payload).await?;
    Ok(Json(MessageResponse {
        thread_id: outcome.thread_id.0,
        message: outcome.result.message,
        action: outcome.result.action,
    }))
}

async fn turn(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<TurnRequest>, JsonRejection>,
) -> Result<Json<TurnResponse>, ApiError> {
    let outcome = run_turn(&state, &headers, payload).await?;
    Ok(Json(TurnResponse {
        thread_ref: outcome.thread_id.0,
        message: outcome.result.message,
        action: outcome.result.action,
    }))
}

async fn run_turn(
    state: &AppState,
    headers: &HeaderMap,
    payload: Result<Json<TurnRequest>, JsonRejection>,
) -> Result<TurnOutcome, ApiError> {
    let correlation_id = correlation_id(headers);
    let Json(mut request) = payload.map_err(|rejection| {
        let message = format!("Invalid request body: {}", rejection.body_text());
        ApiError::bad_request(message, &correlation_id)
    })?;
    let Some(turns) = state.turns.as_ref() else {
        return Err(ApiError::not_configured("assistant", &correlation_id));
    };

    let thread_id = match request.thread_id.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(ThreadId::parse(raw).ok_or_else(|| {
            ApiError::bad_request("Invalid thread id", &correlation_id)
        })?),
    };
    let content = request.user_content();
    let context = request.context.take().unwrap_or_default();

    info!(
        event_name = "server.turn.received",
        correlation_id = %correlation_id,
        thread_id = thread_id.as_ref().map(ThreadId::as_str).unwrap_or("new"),
        has_image = content.image.is_some(),
        "turn received"
    );

    turns
        .handle_turn(
            thread_id,
            content,
            TurnContext {
                channel: context.channel,
                page: context.page,
                correlation_id: correlation_id.clone(),
            },
        )
        .await
        .map_err(|error| {
            warn!(
                event_name = "server.turn.failed",
                correlation_id = %correlation_id,
                error = %error,
                "turn failed"
            );
            ApiError::from(error.into_interface(correlation_id.as_str()))
        })
}
