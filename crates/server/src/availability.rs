use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use leadbot_core::connectors::SlotQuery;
use serde::Deserialize;
use tracing::info;

use crate::state::{correlation_id, ApiError, AppState};

const MAX_DAYS: u32 = 7;

#[derive(Debug, Default, Deserialize)]
pub struct AvailabilityQuery {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub days: Option<u32>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/availability", get(availability))
}

/// Direct slot lookup for the booking widget; the same data the assistant's
/// availability tool sees.
async fn availability(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<SlotQuery>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let raw_date = query.date.unwrap_or_default();
    let Ok(date) = NaiveDate::parse_from_str(raw_date.trim(), "%Y-%m-%d") else {
        return Err(ApiError::bad_request("date must be YYYY-MM-DD", &correlation_id));
    };
    if !state.integrations.calendar {
        return Err(ApiError::not_configured("calendar", &correlation_id));
    }

    let days = query.days.unwrap_or(1).clamp(1, MAX_DAYS);
    let slots = state.calendar.available_slots(date, days).await;
    info!(
        event_name = "server.availability.listed",
        correlation_id = %correlation_id,
        date = %date,
        days,
        count = slots.slots.len(),
        failed = slots.error.is_some(),
        "availability listed"
    );
    Ok(Json(slots))
}
