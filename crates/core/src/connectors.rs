//! Contracts for the downstream systems a turn can touch.
//!
//! Each connector attempts its call exactly once and reports the outcome as a value;
//! nothing here panics or retries. HTTP implementations live in the server crate and
//! the notifier in the slack crate.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::lead::LeadRecord;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConnectorError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("unreadable response: {0}")]
    Decode(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrmContact {
    pub contact_id: Option<String>,
    pub is_new: bool,
}

#[async_trait]
pub trait CrmConnector: Send + Sync {
    async fn upsert_contact(&self, lead: &LeadRecord) -> Result<CrmContact, ConnectorError>;

    /// Attaches a free-text note (lead summary or conversation transcript) to a contact.
    async fn add_note(&self, contact_id: &str, body: &str) -> Result<(), ConnectorError>;

    fn is_configured(&self) -> bool {
        true
    }
}

#[async_trait]
pub trait SpreadsheetConnector: Send + Sync {
    async fn append_lead(&self, lead: &LeadRecord) -> Result<(), ConnectorError>;

    fn is_configured(&self) -> bool {
        true
    }
}

/// Free slots for a date range. Partial failures keep `error` set alongside whatever
/// slots were read so the assistant can tell "no slots" from "calendar down".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotQuery {
    pub date: String,
    pub slots: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SlotQuery {
    pub fn failed(date: NaiveDate, error: impl Into<String>) -> Self {
        Self { date: date.to_string(), slots: Vec::new(), raw: Vec::new(), error: Some(error.into()) }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub contact_id: String,
    pub start_time: String,
    pub service: String,
    pub address: Option<String>,
    pub contact_name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appointment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BookingOutcome {
    pub fn failed(error: impl Into<String>) -> Self {
        Self { success: false, error: Some(error.into()), ..Self::default() }
    }
}

#[async_trait]
pub trait CalendarConnector: Send + Sync {
    async fn available_slots(&self, date: NaiveDate, days_ahead: u32) -> SlotQuery;

    async fn book(&self, request: &BookingRequest) -> BookingOutcome;

    fn is_configured(&self) -> bool {
        true
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub photo_url: Option<String>,
    pub correlation_id: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), ConnectorError>;

    fn is_configured(&self) -> bool {
        true
    }
}

/// Stand-in for any integration whose credentials are absent.
#[derive(Clone, Copy, Debug)]
pub struct Unconfigured(pub &'static str);

#[async_trait]
impl CrmConnector for Unconfigured {
    async fn upsert_contact(&self, _lead: &LeadRecord) -> Result<CrmContact, ConnectorError> {
        Err(ConnectorError::NotConfigured(self.0))
    }

    async fn add_note(&self, _contact_id: &str, _body: &str) -> Result<(), ConnectorError> {
        Err(ConnectorError::NotConfigured(self.0))
    }

    fn is_configured(&self) -> bool {
        false
    }
}

#[async_trait]
impl SpreadsheetConnector for Unconfigured {
    async fn append_lead(&self, _lead: &LeadRecord) -> Result<(), ConnectorError> {
        Err(ConnectorError::NotConfigured(self.0))
    }

    fn is_configured(&self) -> bool {
        false
    }
}

#[async_trait]
impl CalendarConnector for Unconfigured {
    async fn available_slots(&self, date: NaiveDate, _days_ahead: u32) -> SlotQuery {
        SlotQuery::failed(date, ConnectorError::NotConfigured(self.0).to_string())
    }

    async fn book(&self, _request: &BookingRequest) -> BookingOutcome {
        BookingOutcome::failed(ConnectorError::NotConfigured(self.0).to_string())
    }

    fn is_configured(&self) -> bool {
        false
    }
}

#[async_trait]
impl Notifier for Unconfigured {
    async fn notify(&self, _notification: &Notification) -> Result<(), ConnectorError> {
        Err(ConnectorError::NotConfigured(self.0))
    }

    fn is_configured(&self) -> bool {
        false
    }
}
