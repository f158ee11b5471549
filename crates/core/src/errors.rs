use thiserror::Error;

use crate::domain::run::RunStatus;

/// Failures that terminate a turn.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TurnError {
    #[error("assistant service unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("run exceeded the {deadline_secs}s deadline")]
    Timeout { deadline_secs: u64 },
    #[error("run ended with status `{status}`")]
    RunFailed { status: RunStatus, detail: Option<String> },
    #[error("run completed without a usable assistant message")]
    NoResponse,
    #[error("invalid turn input: {0}")]
    InvalidInput(String),
    #[error("{0} is not configured")]
    NotConfigured(String),
}

/// Per-call tool failures. These never leave the dispatcher; they are rendered into
/// the tool output so the assistant can react in-band.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("{0}")]
    Connector(String),
    #[error("Function not implemented")]
    NotImplemented,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("gateway timeout: {message}")]
    GatewayTimeout { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "Sorry, I couldn't read that message. Please try again.",
            Self::ServiceUnavailable { .. } => {
                "Sorry, I am having trouble connecting right now. Please try again shortly."
            }
            Self::GatewayTimeout { .. } => {
                "Sorry, that took too long. Please send your message again."
            }
            Self::Internal { .. } => {
                "Sorry, something went wrong on our side. Please try again or call us."
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "bad_request",
            Self::ServiceUnavailable { .. } => "upstream_unavailable",
            Self::GatewayTimeout { .. } => "timeout",
            Self::Internal { .. } => "internal",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::GatewayTimeout { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl TurnError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::GatewayTimeout { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<TurnError> for InterfaceError {
    fn from(value: TurnError) -> Self {
        let correlation_id = "unassigned".to_owned();
        let message = value.to_string();
        match value {
            TurnError::InvalidInput(_) => Self::BadRequest { message, correlation_id },
            TurnError::UpstreamUnavailable(_) | TurnError::NotConfigured(_) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            TurnError::Timeout { .. } => Self::GatewayTimeout { message, correlation_id },
            TurnError::RunFailed { .. } | TurnError::NoResponse => {
                Self::Internal { message, correlation_id }
            }
        }
    }
}
