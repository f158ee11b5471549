pub mod config;
pub mod connectors;
pub mod domain;
pub mod errors;

pub use connectors::{
    BookingOutcome, BookingRequest, CalendarConnector, ConnectorError, CrmConnector, CrmContact,
    Notification, Notifier, SlotQuery, SpreadsheetConnector, Unconfigured,
};
pub use domain::lead::{LeadRecord, LeadSource};
pub use domain::run::{
    MessageRole, Run, RunId, RunStatus, ThreadId, ThreadMessage, ToolCall, ToolOutput,
};
pub use domain::turn::{
    FormPrefill, ImagePayload, StructuredAction, TurnContext, TurnOutcome, TurnResult, UserContent,
};
pub use errors::{InterfaceError, ToolError, TurnError};
