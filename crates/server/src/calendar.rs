//! Calendar connector over the LeadConnector calendars API.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;
use leadbot_core::config::CalendarConfig;
use leadbot_core::connectors::{
    BookingOutcome, BookingRequest, CalendarConnector, ConnectorError, SlotQuery,
};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::crm::{send_json, GhlClient};

const MS_PER_DAY: i64 = 86_400_000;

pub struct GhlCalendarConnector {
    api: GhlClient,
    calendar_id: String,
    timezone: Tz,
    api_version: String,
    appointment_minutes: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AppointmentBody<'a> {
    calendar_id: &'a str,
    location_id: &'a str,
    contact_id: &'a str,
    start_time: String,
    end_time: String,
    title: String,
    description: String,
    address: &'a str,
    appointment_status: &'static str,
    to_notify: bool,
}

impl GhlCalendarConnector {
    /// `None` when no calendar id is configured. The timezone falls back to New York.
    pub fn new(api: GhlClient, config: &CalendarConfig) -> Option<Self> {
        let calendar_id = config.calendar_id.clone().filter(|id| !id.trim().is_empty())?;
        let timezone = config.timezone.parse::<Tz>().unwrap_or(chrono_tz::America::New_York);
        Some(Self {
            api,
            calendar_id,
            timezone,
            api_version: config.api_version.clone(),
            appointment_minutes: config.appointment_minutes,
        })
    }

    fn day_start_ms(&self, date: NaiveDate) -> i64 {
        let local = date.and_time(NaiveTime::MIN);
        self.timezone
            .from_local_datetime(&local)
            .earliest()
            .map(|start| start.timestamp_millis())
            .unwrap_or_else(|| local.and_utc().timestamp_millis())
    }

    fn format_slot(&self, slot: &str) -> String {
        match DateTime::parse_from_rfc3339(slot) {
            Ok(instant) => instant.with_timezone(&self.timezone).format("%-I:%M %p").to_string(),
            Err(_) => slot.to_string(),
        }
    }
}

#[async_trait]
impl CalendarConnector for GhlCalendarConnector {
    async fn available_slots(&self, date: NaiveDate, days_ahead: u32) -> SlotQuery {
        let start_ms = self.day_start_ms(date);
        let end_ms = start_ms + i64::from(days_ahead.max(1)) * MS_PER_DAY;
        let path = format!("calendars/{}/free-slots", self.calendar_id);
        let request = self.api.request(Method::GET, &path, &self.api_version).query(&[
            ("startDate", start_ms.to_string()),
            ("endDate", end_ms.to_string()),
            ("timezone", self.timezone.name().to_string()),
        ]);

        let value = match send_json(request).await {
            Ok(value) => value,
            Err(ConnectorError::Rejected { status, body }) => {
                warn!(
                    event_name = "calendar.slots.rejected",
                    status,
                    body = %body,
                    "free-slots rejected"
                );
                return SlotQuery::failed(date, format!("Calendar API: {status}"));
            }
            Err(error) => {
                warn!(
                    event_name = "calendar.slots.failed",
                    error = %error,
                    "free-slots request failed"
                );
                return SlotQuery::failed(date, error.to_string());
            }
        };

        let raw = collect_slots(&value);
        let slots = raw.iter().map(|slot| self.format_slot(slot)).collect::<Vec<_>>();
        info!(
            event_name = "calendar.slots.listed",
            date = %date,
            count = slots.len(),
            "free slots listed"
        );
        SlotQuery { date: date.to_string(), slots, raw, error: None }
    }

    async fn book(&self, request: &BookingRequest) -> BookingOutcome {
        let start = match DateTime::parse_from_rfc3339(request.start_time.trim()) {
            Ok(start) => start.with_timezone(&Utc),
            Err(_) => {
                return BookingOutcome::failed(format!(
                    "Invalid startTime `{}`; expected ISO 8601 with offset",
                    request.start_time
                ))
            }
        };
        let end = start + Duration::minutes(i64::from(self.appointment_minutes));
        let address = request.address.as_deref().unwrap_or_default();
        let contact_name = request
            .contact_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or("Customer");
        let body = AppointmentBody {
            calendar_id: &self.calendar_id,
            location_id: self.api.location_id(),
            contact_id: &request.contact_id,
            start_time: iso(start),
            end_time: iso(end),
            title: format!("Handyman Service for {contact_name}"),
            description: [
                format!("Service: {}", request.service),
                format!("Address: {}", if address.is_empty() { "TBD" } else { address }),
                "Booked via Website Chatbot".to_string(),
            ]
            .join("\n"),
            address,
            appointment_status: "new",
            to_notify: true,
        };

        let result = send_json(
            self.api
                .request(Method::POST, "calendars/events/appointments", &self.api_version)
                .json(&body),
        )
        .await;

        match result {
            Ok(value) => {
                let appointment_id = ["/id", "/appointment/id", "/eventId"]
                    .iter()
                    .find_map(|pointer| value.pointer(pointer).and_then(Value::as_str))
                    .map(str::to_string);
                info!(
                    event_name = "calendar.appointment.booked",
                    contact_id = %request.contact_id,
                    appointment_id = appointment_id.as_deref().unwrap_or("unknown"),
                    start_time = %body.start_time,
                    "appointment booked"
                );
                BookingOutcome {
                    success: true,
                    appointment_id,
                    start_time: Some(body.start_time),
                    end_time: Some(body.end_time),
                    error: None,
                }
            }
            Err(ConnectorError::Rejected { status, body }) => {
                let message = serde_json::from_str::<Value>(&body)
                    .ok()
                    .and_then(|value| {
                        value.get("message").and_then(Value::as_str).map(str::to_string)
                    })
                    .unwrap_or(body);
                BookingOutcome::failed(format!("Booking failed: {status} - {message}"))
            }
            Err(error) => BookingOutcome::failed(error.to_string()),
        }
    }
}

fn iso(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Accepts `{slots: {day: [...]}}` and `{day: {slots: [...]}}`.
fn collect_slots(value: &Value) -> Vec<String> {
    let strings = |items: &Vec<Value>| {
        items.iter().filter_map(Value::as_str).map(str::to_string).collect::<Vec<_>>()
    };

    if let Some(days) = value.get("slots").and_then(Value::as_object) {
        return days.values().filter_map(Value::as_array).flat_map(strings).collect();
    }
    value
        .as_object()
        .map(|days| {
            days.values()
                .filter_map(|day| day.get("slots").and_then(Value::as_array))
                .flat_map(strings)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::NaiveDate;
    use leadbot_core::config::{AppConfig, CalendarConfig};
    use leadbot_core::connectors::{BookingRequest, CalendarConnector};
    use secrecy::SecretString;
    use serde_json::json;

    use super::{collect_slots, GhlCalendarConnector};
    use crate::crm::GhlClient;
    use crate::test_http::MockServer;

    fn connector(base_url: &str) -> GhlCalendarConnector {
        let defaults = AppConfig::default();
        let crm = leadbot_core::config::CrmConfig {
            api_token: Some(SecretString::from("pit-test-token".to_string())),
            location_id: Some("loc-1".to_string()),
            base_url: base_url.to_string(),
            ..defaults.crm
        };
        let calendar =
            CalendarConfig { calendar_id: Some("cal-1".to_string()), ..defaults.calendar };
        let api = GhlClient::from_config(&crm, Duration::from_secs(5))
            .expect("client")
            .expect("configured");
        GhlCalendarConnector::new(api, &calendar).expect("calendar configured")
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).expect("date")
    }

    #[tokio::test]
    async fn slots_are_requested_in_ms_and_formatted_locally() {
        let server = MockServer::start(vec![(
            200,
            r#"{"slots":{"2026-03-02":["2026-03-02T09:00:00-05:00","2026-03-02T13:30:00-05:00"]}}"#,
        )])
        .await;

        let query = connector(&server.base_url).available_slots(date(), 2).await;

        assert_eq!(query.slots, vec!["9:00 AM".to_string(), "1:30 PM".to_string()]);
        assert_eq!(query.raw.len(), 2);
        assert_eq!(query.error, None);
        let requests = server.requests().await;
        // 2026-03-02T00:00:00-05:00
        assert!(requests[0].target.starts_with("/calendars/cal-1/free-slots?"));
        assert!(requests[0].target.contains("startDate=1772427600000"));
        assert!(requests[0].target.contains("endDate=1772600400000"));
        assert!(requests[0].target.contains("timezone=America%2FNew_York"));
        assert_eq!(requests[0].header("version"), Some("2021-04-15"));
    }

    #[tokio::test]
    async fn rejected_query_carries_status_error() {
        let server = MockServer::start(vec![(502, r#"{"message":"bad gateway"}"#)]).await;

        let query = connector(&server.base_url).available_slots(date(), 1).await;

        assert!(query.slots.is_empty());
        assert_eq!(query.date, "2026-03-02");
        assert_eq!(query.error.as_deref(), Some("Calendar API: 502"));
    }

    #[tokio::test]
    async fn booking_posts_ninety_minute_appointment() {
        let server = MockServer::start(vec![(201, r#"{"appointment":{"id":"appt-9"}}"#)]).await;

        let outcome = connector(&server.base_url)
            .book(&BookingRequest {
                contact_id: "c-42".to_string(),
                start_time: "2026-03-02T11:00:00-05:00".to_string(),
                service: "TV mount".to_string(),
                address: None,
                contact_name: Some("Jane".to_string()),
            })
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.appointment_id.as_deref(), Some("appt-9"));
        assert_eq!(outcome.end_time.as_deref(), Some("2026-03-02T17:30:00.000Z"));
        let body = server.requests().await[0].json();
        assert_eq!(body["startTime"], "2026-03-02T16:00:00.000Z");
        assert_eq!(body["title"], "Handyman Service for Jane");
        assert_eq!(body["description"], "Service: TV mount\nAddress: TBD\nBooked via Website Chatbot");
        assert_eq!(body["address"], "");
        assert_eq!(body["appointmentStatus"], "new");
        assert_eq!(body["toNotify"], true);
    }

    #[tokio::test]
    async fn booking_rejection_reports_message() {
        let server = MockServer::start(vec![(400, r#"{"message":"slot no longer available"}"#)]).await;

        let outcome = connector(&server.base_url)
            .book(&BookingRequest {
                contact_id: "c-42".to_string(),
                start_time: "2026-03-02T11:00:00-05:00".to_string(),
                service: "TV mount".to_string(),
                address: Some("1 Main St".to_string()),
                contact_name: None,
            })
            .await;

        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("Booking failed: 400 - slot no longer available"));
    }

    #[tokio::test]
    async fn malformed_start_time_fails_without_a_request() {
        let server = MockServer::start(vec![]).await;

        let outcome = connector(&server.base_url)
            .book(&BookingRequest {
                contact_id: "c-42".to_string(),
                start_time: "tomorrow at 11".to_string(),
                service: "TV mount".to_string(),
                address: None,
                contact_name: None,
            })
            .await;

        assert!(!outcome.success);
        assert!(server.requests().await.is_empty());
    }

    #[test]
    fn alternate_slot_shape_is_flattened() {
        let value = json!({
            "2026-03-02": {"slots": ["2026-03-02T09:00:00-05:00"]},
            "2026-03-03": {"slots": ["2026-03-03T10:00:00-05:00"]},
            "traceId": "abc"
        });
        assert_eq!(collect_slots(&value).len(), 2);
    }
}
