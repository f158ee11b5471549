//! Lead intake outside the chat: provider form webhooks and the website quote form.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Form, Json, Router};
use chrono::Utc;
use leadbot_agent::side_effects::{non_critical, spawn_non_critical};
use leadbot_core::connectors::Notification;
use leadbot_core::domain::lead::{
    is_plausible_email, non_blank, normalize_phone, LeadRecord, LeadSource, DEFAULT_SERVICE,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::state::{correlation_id, ApiError, AppState};

const NAME_KEYS: &[&str] = &["name", "full_name", "fullName", "contact_name"];
const PHONE_KEYS: &[&str] = &["phone", "phone_number", "phoneNumber", "mobile"];
const EMAIL_KEYS: &[&str] = &["email", "email_address", "emailAddress"];
const SERVICE_KEYS: &[&str] = &["service", "service_type", "serviceType", "service_needed"];
const ADDRESS_KEYS: &[&str] = &["address", "address1", "full_address", "street_address"];
const ZIP_KEYS: &[&str] = &["zip", "postal_code", "postalCode", "zip_code"];
const NOTES_KEYS: &[&str] = &["message", "notes", "description", "comments"];
const FIRST_NAME_KEYS: &[&str] = &["first_name", "firstName"];
const LAST_NAME_KEYS: &[&str] = &["last_name", "lastName"];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/webhook/lead-intake", post(lead_intake))
        .route("/api/quote", post(submit_quote))
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct IntakeAck {
    pub accepted: bool,
    pub forwarded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Always answers 200 so form providers do not retry; forwarding runs detached.
async fn lead_intake(State(state): State<AppState>, request: Request) -> Json<IntakeAck> {
    let correlation_id = correlation_id(request.headers());
    let Some(payload) = read_intake_body(request, &state).await else {
        warn!(
            event_name = "server.intake.unreadable",
            correlation_id = %correlation_id,
            "lead intake body is neither a JSON object nor a urlencoded form"
        );
        return Json(IntakeAck {
            accepted: false,
            forwarded: false,
            reason: Some("body is not a JSON object or form".to_string()),
        });
    };

    let Some(lead) = lead_from_form(&payload, &correlation_id) else {
        info!(
            event_name = "server.intake.skipped",
            correlation_id = %correlation_id,
            "lead intake without a usable phone number"
        );
        return Json(IntakeAck {
            accepted: true,
            forwarded: false,
            reason: Some("missing or invalid phone".to_string()),
        });
    };

    let crm = state.crm.clone();
    let sheets = state.sheets.clone();
    spawn_non_critical("lead_intake_forward", correlation_id.clone(), async move {
        let (crm_result, sheet_result) =
            tokio::join!(crm.upsert_contact(&lead), sheets.append_lead(&lead));
        match (crm_result, sheet_result) {
            (Err(crm_error), Err(sheet_error)) => {
                Err(format!("crm: {crm_error}; sheet: {sheet_error}"))
            }
            _ => Ok(()),
        }
    });

    Json(IntakeAck { accepted: true, forwarded: true, reason: None })
}

/// Urlencoded forms become a flat map of strings. Any other content type is read as
/// JSON, since some providers omit the header.
async fn read_intake_body(request: Request, state: &AppState) -> Option<Map<String, Value>> {
    let is_form = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"));

    if is_form {
        let Form(fields) =
            Form::<HashMap<String, String>>::from_request(request, state).await.ok()?;
        return Some(fields.into_iter().map(|(key, value)| (key, Value::String(value))).collect());
    }

    let body = Bytes::from_request(request, state).await.ok()?;
    match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Object(payload)) => Some(payload),
        _ => None,
    }
}

/// Flat fields win over `contact`, which wins over `customData`.
fn lead_from_form(payload: &Map<String, Value>, correlation_id: &str) -> Option<LeadRecord> {
    let scopes = [
        Some(payload),
        payload.get("contact").and_then(Value::as_object),
        payload
            .get("customData")
            .or_else(|| payload.get("custom_data"))
            .and_then(Value::as_object),
    ];
    let field = |keys: &[&str]| {
        scopes.iter().flatten().find_map(|scope| {
            keys.iter().find_map(|key| non_blank(scope.get(*key).and_then(scalar_text)))
        })
    };

    let phone = normalize_phone(&field(PHONE_KEYS)?)?;
    let name = field(NAME_KEYS)
        .or_else(|| {
            let first = field(FIRST_NAME_KEYS).unwrap_or_default();
            let last = field(LAST_NAME_KEYS).unwrap_or_default();
            non_blank(Some(format!("{first} {last}")))
        })
        .unwrap_or_else(|| "Unknown".to_string());

    Some(LeadRecord {
        name,
        phone,
        email: field(EMAIL_KEYS).filter(|email| is_plausible_email(email)),
        service: field(SERVICE_KEYS).unwrap_or_else(|| DEFAULT_SERVICE.to_string()),
        address: field(ADDRESS_KEYS),
        zip: field(ZIP_KEYS),
        preferred_date: None,
        preferred_time: None,
        notes: field(NOTES_KEYS),
        source: LeadSource::Webhook,
        correlation_id: correlation_id.to_string(),
        captured_at: Utc::now(),
    })
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct QuoteRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QuoteAck {
    pub success: bool,
    pub message: &'static str,
}

async fn submit_quote(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<QuoteRequest>, JsonRejection>,
) -> Result<Json<QuoteAck>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let Json(request) = payload
        .map_err(|_| ApiError::bad_request("Name and phone are required", &correlation_id))?;

    let (Some(name), Some(raw_phone)) = (non_blank(request.name), non_blank(request.phone)) else {
        return Err(ApiError::bad_request("Name and phone are required", &correlation_id));
    };
    let Some(phone) = normalize_phone(&raw_phone) else {
        return Err(ApiError::bad_request("Invalid phone number", &correlation_id));
    };
    let email = non_blank(request.email);
    if email.as_deref().is_some_and(|email| !is_plausible_email(email)) {
        return Err(ApiError::bad_request("Invalid email format", &correlation_id));
    }
    if !state.crm.is_configured() {
        return Err(ApiError::not_configured("crm", &correlation_id));
    }

    let lead = LeadRecord {
        name,
        phone,
        email,
        service: non_blank(request.service).unwrap_or_else(|| DEFAULT_SERVICE.to_string()),
        address: None,
        zip: None,
        preferred_date: non_blank(request.date),
        preferred_time: None,
        notes: non_blank(request.message),
        source: LeadSource::QuoteForm,
        correlation_id: correlation_id.clone(),
        captured_at: Utc::now(),
    };

    let contact = state.crm.upsert_contact(&lead).await.map_err(|error| {
        warn!(
            event_name = "server.quote.crm_failed",
            correlation_id = %correlation_id,
            error = %error,
            "quote form could not reach the crm"
        );
        ApiError::internal("Failed to submit quote. Please try again or call us.", &correlation_id)
    })?;

    if let Some(contact_id) = contact.contact_id.as_deref() {
        let note = format!("New quote request from website\n\n{}", lead.summary());
        non_critical("quote_note", &correlation_id, state.crm.add_note(contact_id, &note)).await;
    }

    let sheets = state.sheets.clone();
    let notifier = state.notifier.clone();
    let notification = Notification {
        title: format!("New quote request: {}", lead.name),
        body: lead.summary(),
        photo_url: None,
        correlation_id: correlation_id.clone(),
    };
    spawn_non_critical("quote_sheet_append", correlation_id.clone(), async move {
        sheets.append_lead(&lead).await
    });
    spawn_non_critical("quote_notification", correlation_id.clone(), async move {
        notifier.notify(&notification).await
    });

    info!(
        event_name = "server.quote.accepted",
        correlation_id = %correlation_id,
        contact_id = contact.contact_id.as_deref().unwrap_or("unknown"),
        "quote request accepted"
    );
    Ok(Json(QuoteAck { success: true, message: "Quote request received successfully" }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use leadbot_core::connectors::{
        ConnectorError, CrmConnector, CrmContact, Notification, Notifier, SpreadsheetConnector,
    };
    use leadbot_core::domain::lead::{LeadRecord, LeadSource};
    use serde_json::json;
    use tokio::sync::Mutex;

    use super::lead_from_form;
    use crate::state::test_support::{app, post_json, send, unconfigured_state};
    use crate::state::AppState;

    #[derive(Default)]
    struct Recorder {
        fail_crm: bool,
        leads: Mutex<Vec<LeadRecord>>,
        rows: Mutex<Vec<LeadRecord>>,
        notes: Mutex<Vec<String>>,
        notifications: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl CrmConnector for Recorder {
        async fn upsert_contact(&self, lead: &LeadRecord) -> Result<CrmContact, ConnectorError> {
            if self.fail_crm {
                return Err(ConnectorError::Rejected { status: 401, body: "bad token".into() });
            }
            self.leads.lock().await.push(lead.clone());
            Ok(CrmContact { contact_id: Some("c-1".to_string()), is_new: true })
        }

        async fn add_note(&self, _contact_id: &str, body: &str) -> Result<(), ConnectorError> {
            self.notes.lock().await.push(body.to_string());
            Ok(())
        }
    }

    #[async_trait]
    impl SpreadsheetConnector for Recorder {
        async fn append_lead(&self, lead: &LeadRecord) -> Result<(), ConnectorError> {
            self.rows.lock().await.push(lead.clone());
            Ok(())
        }
    }

    #[async_trait]
    impl Notifier for Recorder {
        async fn notify(&self, notification: &Notification) -> Result<(), ConnectorError> {
            self.notifications.lock().await.push(notification.clone());
            Ok(())
        }
    }

    fn state(recorder: &Arc<Recorder>) -> AppState {
        AppState {
            crm: recorder.clone(),
            sheets: recorder.clone(),
            notifier: recorder.clone(),
            ..unconfigured_state()
        }
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn nested_contact_and_custom_data_are_read() {
        let payload = json!({
            "contact": {"first_name": "Jane", "last_name": "Doe", "phone": "+1 (555) 123-4567"},
            "customData": {"service_needed": "Drywall", "message": "Hole in wall"},
            "email": "jane@example.com"
        });

        let lead = lead_from_form(payload.as_object().expect("object"), "req-1").expect("lead");

        assert_eq!(lead.name, "Jane Doe");
        assert_eq!(lead.phone, "5551234567");
        assert_eq!(lead.service, "Drywall");
        assert_eq!(lead.notes.as_deref(), Some("Hole in wall"));
        assert_eq!(lead.email.as_deref(), Some("jane@example.com"));
        assert_eq!(lead.source, LeadSource::Webhook);
    }

    #[tokio::test]
    async fn intake_forwards_when_phone_normalizes() {
        let recorder = Arc::new(Recorder::default());

        let (status, body) = send(
            app(state(&recorder)),
            post_json("/webhook/lead-intake", r#"{"name":"Jane","phone":"555-123-4567"}"#),
        )
        .await;
        settle().await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"accepted": true, "forwarded": true}));
        assert_eq!(recorder.leads.lock().await.len(), 1);
        assert_eq!(recorder.rows.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn intake_accepts_urlencoded_forms() {
        let recorder = Arc::new(Recorder::default());
        let request = Request::post("/webhook/lead-intake")
            .header("content-type", "application/x-www-form-urlencoded")
            .header("x-request-id", "req-form")
            .body(Body::from(
                "first_name=Jane&last_name=Doe&phone=%2B1+555-123-4567&service=Drywall+repair",
            ))
            .expect("request");

        let (status, body) = send(app(state(&recorder)), request).await;
        settle().await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"accepted": true, "forwarded": true}));
        let leads = recorder.leads.lock().await.clone();
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].name, "Jane Doe");
        assert_eq!(leads[0].phone, "5551234567");
        assert_eq!(leads[0].service, "Drywall repair");
        assert_eq!(recorder.rows.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn unreadable_intake_body_is_not_accepted() {
        let recorder = Arc::new(Recorder::default());

        let (status, body) =
            send(app(state(&recorder)), post_json("/webhook/lead-intake", "[1,2]")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["accepted"], false);
        assert!(recorder.leads.lock().await.is_empty());
    }

    #[tokio::test]
    async fn intake_without_phone_is_acknowledged_but_not_forwarded() {
        let recorder = Arc::new(Recorder::default());

        let (status, body) = send(
            app(state(&recorder)),
            post_json("/webhook/lead-intake", r#"{"name":"Jane","phone":"12"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["forwarded"], false);
        assert!(recorder.leads.lock().await.is_empty());

        let (status, body) =
            send(app(state(&recorder)), post_json("/webhook/lead-intake", "not json")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["accepted"], false);
    }

    #[tokio::test]
    async fn quote_requires_name_and_phone() {
        let recorder = Arc::new(Recorder::default());

        let (status, body) =
            send(app(state(&recorder)), post_json("/api/quote", r#"{"name":"Jane"}"#)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Name and phone are required");
    }

    #[tokio::test]
    async fn quote_rejects_malformed_email() {
        let recorder = Arc::new(Recorder::default());

        let (status, body) = send(
            app(state(&recorder)),
            post_json("/api/quote", r#"{"name":"Jane","phone":"5551234567","email":"jane@"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid email format");
    }

    #[tokio::test]
    async fn quote_crm_failure_is_500() {
        let recorder = Arc::new(Recorder { fail_crm: true, ..Recorder::default() });

        let (status, body) = send(
            app(state(&recorder)),
            post_json("/api/quote", r#"{"name":"Jane","phone":"5551234567"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to submit quote. Please try again or call us.");
        assert!(recorder.rows.lock().await.is_empty());
    }

    #[tokio::test]
    async fn quote_success_fans_out_to_sheet_note_and_notification() {
        let recorder = Arc::new(Recorder::default());

        let (status, body) = send(
            app(state(&recorder)),
            post_json(
                "/api/quote",
                r#"{"name":"Jane","phone":"(555) 123-4567","service":"TV mount","date":"2026-03-02"}"#,
            ),
        )
        .await;
        settle().await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true, "message": "Quote request received successfully"}));
        let leads = recorder.leads.lock().await;
        assert_eq!(leads[0].source, LeadSource::QuoteForm);
        assert_eq!(leads[0].preferred_date.as_deref(), Some("2026-03-02"));
        assert_eq!(recorder.rows.lock().await.len(), 1);
        assert_eq!(recorder.notes.lock().await.len(), 1);
        assert_eq!(recorder.notifications.lock().await[0].title, "New quote request: Jane");
    }

    #[tokio::test]
    async fn quote_without_crm_is_503() {
        let (status, body) = send(
            app(unconfigured_state()),
            post_json("/api/quote", r#"{"name":"Jane","phone":"5551234567"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], "not_configured");
    }
}
