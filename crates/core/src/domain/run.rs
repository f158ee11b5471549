use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl ThreadId {
    /// Accepts only `thread_` followed by ASCII letters and digits, the shape the
    /// assistant service issues. Anything else would be spliced into request paths.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let suffix = raw.strip_prefix("thread_")?;
        if suffix.is_empty() || !suffix.bytes().all(|byte| byte.is_ascii_alphanumeric()) {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    pub fn is_well_formed(&self) -> bool {
        Self::parse(&self.0).is_some_and(|parsed| parsed.0 == self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl RunId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of one assistant run as reported by the assistant service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Completed,
    Failed,
    Cancelled,
    Expired,
    Incomplete,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Expired | Self::Incomplete
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::RequiresAction => "requires_action",
            Self::Cancelling => "cancelling",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
            Self::Incomplete => "incomplete",
        }
    }

    /// Transitions the orchestrator accepts from the assistant service. The only
    /// backwards edge is `requires_action` -> `queued`/`in_progress` after tool outputs
    /// are submitted.
    pub fn can_transition_to(self, next: RunStatus) -> bool {
        if self == next {
            return !self.is_terminal();
        }
        match self {
            Self::Queued => next != Self::Queued,
            Self::InProgress => next != Self::Queued,
            Self::RequiresAction => true,
            Self::Cancelling => {
                matches!(next, Self::Cancelled | Self::Failed | Self::Completed | Self::Expired)
            }
            Self::Completed | Self::Failed | Self::Cancelled | Self::Expired | Self::Incomplete => {
                false
            }
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request from the assistant to invoke a named capability. `arguments` is the raw,
/// untrusted JSON text exactly as the assistant produced it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Run {
    pub id: RunId,
    pub thread_id: ThreadId,
    pub status: RunStatus,
    pub required_action: Vec<ToolCall>,
    pub last_error: Option<String>,
}

impl Run {
    pub fn new(id: impl Into<String>, thread_id: ThreadId, status: RunStatus) -> Self {
        Self {
            id: RunId(id.into()),
            thread_id,
            status,
            required_action: Vec::new(),
            last_error: None,
        }
    }

    pub fn with_tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.required_action = calls;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThreadMessage {
    pub role: MessageRole,
    pub run_id: Option<RunId>,
    pub text: Option<String>,
}
