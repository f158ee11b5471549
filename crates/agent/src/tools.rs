//! Tool-call dispatch. Every call yields exactly one [`ToolOutput`]; failures are
//! rendered into the output so the assistant can recover in-band.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use leadbot_core::config::LeadSinkMode;
use leadbot_core::connectors::{
    BookingRequest, CalendarConnector, ConnectorError, CrmConnector, CrmContact, Notification,
    Notifier, SpreadsheetConnector,
};
use leadbot_core::domain::lead::{
    is_plausible_email, non_blank, normalize_phone, LeadRecord, LeadSource, DEFAULT_SERVICE,
};
use leadbot_core::domain::run::{ThreadId, ToolCall, ToolOutput};
use leadbot_core::domain::turn::FormPrefill;
use leadbot_core::errors::ToolError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::cache::PhotoCache;
use crate::side_effects::spawn_non_critical;

pub const MAX_DAYS_AHEAD: u32 = 7;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolKind {
    SaveLead,
    CheckAvailability,
    BookAppointment,
    Unknown(String),
}

impl ToolKind {
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "saveLead" | "save_lead" | "save_lead_data" | "captureLead" | "capture_lead" => {
                Self::SaveLead
            }
            "checkAvailability" | "check_availability" | "get_available_slots" => {
                Self::CheckAvailability
            }
            "bookAppointment" | "book_appointment" => Self::BookAppointment,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::SaveLead => "save_lead",
            Self::CheckAvailability => "check_availability",
            Self::BookAppointment => "book_appointment",
            Self::Unknown(name) => name,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveLeadArgs {
    #[serde(default, deserialize_with = "lenient_string", alias = "full_name", alias = "fullName")]
    name: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        alias = "phone_number",
        alias = "phoneNumber"
    )]
    phone: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    email: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        alias = "service_type",
        alias = "serviceType"
    )]
    service: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    address: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        alias = "zip_code",
        alias = "zipCode"
    )]
    zip: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", alias = "preferred_date")]
    preferred_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", alias = "preferred_time")]
    preferred_time: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        alias = "description",
        alias = "message"
    )]
    notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AvailabilityArgs {
    #[serde(default, deserialize_with = "lenient_string")]
    date: Option<String>,
    #[serde(default, deserialize_with = "lenient_days", alias = "days_ahead", alias = "days")]
    days_ahead: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookingArgs {
    #[serde(default, deserialize_with = "lenient_string", alias = "contact_id")]
    contact_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        alias = "start_time",
        alias = "dateTime",
        alias = "datetime"
    )]
    start_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    service: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    address: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        alias = "contact_name",
        alias = "contactName"
    )]
    name: Option<String>,
}

/// Accepts strings and numbers (assistants sometimes emit phone numbers unquoted).
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(text)) => non_blank(Some(text)),
        Some(Value::Number(number)) => Some(number.to_string()),
        Some(Value::Bool(flag)) => Some(flag.to_string()),
        _ => None,
    })
}

/// Takes `3`, `"3"` or `3.0`. Zero, negatives and anything unparseable fall back to
/// the default window.
fn lenient_days<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let days = match value {
        Some(Value::Number(number)) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|days| *days >= 1.0).map(|days| days as u64)),
        Some(Value::String(text)) => text.trim().parse::<u64>().ok(),
        _ => None,
    };
    Ok(days.filter(|days| *days > 0).map(|days| u32::try_from(days).unwrap_or(u32::MAX)))
}

fn parse_args<T>(raw: &str) -> Result<T, ToolError>
where
    T: DeserializeOwned + Default,
{
    if raw.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(raw).map_err(|error| ToolError::InvalidArguments(error.to_string()))
}

/// Per-run state the dispatcher can read.
#[derive(Clone, Debug, Default)]
pub struct DispatchContext {
    pub correlation_id: String,
    pub thread_id: Option<ThreadId>,
    /// Contact id captured by an earlier lead save in the same run.
    pub contact_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeadCapture {
    pub prefill: FormPrefill,
    pub contact_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub output: ToolOutput,
    pub lead: Option<LeadCapture>,
}

impl DispatchOutcome {
    fn new(call: &ToolCall, payload: Value) -> Self {
        Self {
            output: ToolOutput { tool_call_id: call.id.clone(), output: payload.to_string() },
            lead: None,
        }
    }

    fn failed(call: &ToolCall, error: &ToolError) -> Self {
        Self::new(call, json!({ "status": "Error", "message": error.to_string() }))
    }
}

#[derive(Clone)]
pub struct ToolDispatcher {
    crm: Arc<dyn CrmConnector>,
    sheets: Arc<dyn SpreadsheetConnector>,
    calendar: Arc<dyn CalendarConnector>,
    notifier: Arc<dyn Notifier>,
    photos: Arc<dyn PhotoCache>,
    sink_mode: LeadSinkMode,
}

impl ToolDispatcher {
    pub fn new(
        crm: Arc<dyn CrmConnector>,
        sheets: Arc<dyn SpreadsheetConnector>,
        calendar: Arc<dyn CalendarConnector>,
        notifier: Arc<dyn Notifier>,
        photos: Arc<dyn PhotoCache>,
        sink_mode: LeadSinkMode,
    ) -> Self {
        Self { crm, sheets, calendar, notifier, photos, sink_mode }
    }

    pub fn crm(&self) -> Arc<dyn CrmConnector> {
        self.crm.clone()
    }

    pub async fn dispatch(&self, call: &ToolCall, context: &DispatchContext) -> DispatchOutcome {
        let kind = ToolKind::from_name(&call.name);
        info!(
            event_name = "agent.tool.dispatch",
            correlation_id = %context.correlation_id,
            tool_call_id = %call.id,
            tool = kind.as_str(),
            "dispatching tool call"
        );

        let result = match &kind {
            ToolKind::SaveLead => self.save_lead(call, context).await,
            ToolKind::CheckAvailability => self.check_availability(call).await,
            ToolKind::BookAppointment => self.book_appointment(call, context).await,
            ToolKind::Unknown(_) => Err(ToolError::NotImplemented),
        };

        result.unwrap_or_else(|error| {
            warn!(
                event_name = "agent.tool.failed",
                correlation_id = %context.correlation_id,
                tool_call_id = %call.id,
                tool = kind.as_str(),
                error = %error,
                "tool call failed; reporting error to assistant"
            );
            DispatchOutcome::failed(call, &error)
        })
    }

    async fn save_lead(
        &self,
        call: &ToolCall,
        context: &DispatchContext,
    ) -> Result<DispatchOutcome, ToolError> {
        let args: SaveLeadArgs = parse_args(&call.arguments)?;
        let lead = build_lead(args, LeadSource::Chatbot, &context.correlation_id)?;

        let (crm_result, sheet_result) =
            tokio::join!(self.crm.upsert_contact(&lead), self.sheets.append_lead(&lead));
        let report = SinkReport { crm: crm_result, sheet: sheet_result };

        if report.crm.is_err() || report.sheet.is_err() {
            warn!(
                event_name = "agent.lead.sink_failed",
                correlation_id = %context.correlation_id,
                crm_ok = report.crm.is_ok(),
                sheet_ok = report.sheet.is_ok(),
                sink_mode = self.sink_mode.as_str(),
                "lead sink failed"
            );
        }

        self.notify_lead(&lead, &report, context).await;

        if !report.accepted(self.sink_mode) {
            let detail = report.failures().join("; ");
            return Err(ToolError::Connector(format!("Lead could not be saved: {detail}")));
        }

        let contact_id = report.contact_id();
        info!(
            event_name = "agent.lead.saved",
            correlation_id = %context.correlation_id,
            contact_id = contact_id.as_deref().unwrap_or("none"),
            "lead saved"
        );

        let mut payload = json!({ "status": "OK", "message": "Lead saved successfully" });
        if let Some(contact_id) = &contact_id {
            payload["contactId"] = Value::String(contact_id.clone());
        }

        let mut outcome = DispatchOutcome::new(call, payload);
        outcome.lead = Some(LeadCapture { prefill: FormPrefill::from(&lead), contact_id });
        Ok(outcome)
    }

    async fn notify_lead(&self, lead: &LeadRecord, report: &SinkReport, context: &DispatchContext) {
        let photo = match &context.thread_id {
            Some(thread_id) => self.photos.get(thread_id).await,
            None => None,
        };

        let mut body = lead.summary();
        body.push_str(&format!("\nCRM: {}", report.crm_status()));
        body.push_str(&format!("\nSheet: {}", report.sheet_status()));

        let notification = Notification {
            title: format!("New chatbot lead: {}", lead.name),
            body,
            photo_url: photo.map(|photo| photo.url),
            correlation_id: context.correlation_id.clone(),
        };
        let notifier = self.notifier.clone();
        spawn_non_critical("lead_notification", context.correlation_id.clone(), async move {
            notifier.notify(&notification).await
        });
    }

    async fn check_availability(&self, call: &ToolCall) -> Result<DispatchOutcome, ToolError> {
        let args: AvailabilityArgs = parse_args(&call.arguments)?;
        let raw_date = args.date.ok_or(ToolError::MissingField("date"))?;
        let date = NaiveDate::parse_from_str(&raw_date, "%Y-%m-%d").map_err(|_| {
            ToolError::InvalidArguments(format!("date `{raw_date}` must be YYYY-MM-DD"))
        })?;
        let days_ahead = args.days_ahead.unwrap_or(1).clamp(1, MAX_DAYS_AHEAD);

        let slots = self.calendar.available_slots(date, days_ahead).await;
        let payload =
            serde_json::to_value(&slots).map_err(|error| ToolError::Connector(error.to_string()))?;
        Ok(DispatchOutcome::new(call, payload))
    }

    async fn book_appointment(
        &self,
        call: &ToolCall,
        context: &DispatchContext,
    ) -> Result<DispatchOutcome, ToolError> {
        let args: BookingArgs = parse_args(&call.arguments)?;
        let contact_id = args
            .contact_id
            .or_else(|| context.contact_id.clone())
            .ok_or(ToolError::MissingField("contactId"))?;
        let start_time = args.start_time.ok_or(ToolError::MissingField("startTime"))?;

        let request = BookingRequest {
            contact_id,
            start_time,
            service: args.service.unwrap_or_else(|| DEFAULT_SERVICE.to_string()),
            address: args.address,
            contact_name: args.name,
        };
        let outcome = self.calendar.book(&request).await;
        let payload = serde_json::to_value(&outcome)
            .map_err(|error| ToolError::Connector(error.to_string()))?;
        Ok(DispatchOutcome::new(call, payload))
    }
}

struct SinkReport {
    crm: Result<CrmContact, ConnectorError>,
    sheet: Result<(), ConnectorError>,
}

impl SinkReport {
    fn accepted(&self, mode: LeadSinkMode) -> bool {
        match mode {
            LeadSinkMode::Lenient => self.crm.is_ok() || self.sheet.is_ok(),
            LeadSinkMode::Strict => self.crm.is_ok() && self.sheet.is_ok(),
        }
    }

    fn contact_id(&self) -> Option<String> {
        self.crm.as_ref().ok().and_then(|contact| contact.contact_id.clone())
    }

    fn failures(&self) -> Vec<String> {
        let mut failures = Vec::new();
        if let Err(error) = &self.crm {
            failures.push(format!("CRM {error}"));
        }
        if let Err(error) = &self.sheet {
            failures.push(format!("spreadsheet {error}"));
        }
        failures
    }

    fn crm_status(&self) -> String {
        match &self.crm {
            Ok(contact) => match &contact.contact_id {
                Some(id) if contact.is_new => format!("new contact {id}"),
                Some(id) => format!("updated contact {id}"),
                None => "saved".to_string(),
            },
            Err(error) => format!("FAILED ({error})"),
        }
    }

    fn sheet_status(&self) -> String {
        match &self.sheet {
            Ok(()) => "row appended".to_string(),
            Err(error) => format!("FAILED ({error})"),
        }
    }
}

fn build_lead(
    args: SaveLeadArgs,
    source: LeadSource,
    correlation_id: &str,
) -> Result<LeadRecord, ToolError> {
    let name = args.name.ok_or(ToolError::MissingField("name"))?;
    let raw_phone = args.phone.ok_or(ToolError::MissingField("phone"))?;
    let phone = normalize_phone(&raw_phone).ok_or_else(|| {
        ToolError::InvalidArguments(format!("phone `{raw_phone}` must contain at least 10 digits"))
    })?;

    Ok(LeadRecord {
        name,
        phone,
        email: args.email.filter(|email| is_plausible_email(email)),
        service: args.service.unwrap_or_else(|| DEFAULT_SERVICE.to_string()),
        address: args.address,
        zip: args.zip,
        preferred_date: args.preferred_date,
        preferred_time: args.preferred_time,
        notes: args.notes,
        source,
        correlation_id: correlation_id.to_string(),
        captured_at: Utc::now(),
    })
}
