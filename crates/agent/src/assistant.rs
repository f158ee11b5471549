use async_trait::async_trait;
use leadbot_core::domain::run::{Run, RunId, ThreadId, ThreadMessage, ToolOutput};
use leadbot_core::domain::turn::UserContent;
use leadbot_core::errors::TurnError;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AssistantError {
    #[error("assistant request failed: {0}")]
    Transport(String),
    #[error("assistant rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("assistant response could not be decoded: {0}")]
    Decode(String),
}

impl From<AssistantError> for TurnError {
    fn from(error: AssistantError) -> Self {
        TurnError::UpstreamUnavailable(error.to_string())
    }
}

/// The hosted assistant service: threads, messages and runs.
#[async_trait]
pub trait AssistantClient: Send + Sync {
    async fn create_thread(&self) -> Result<ThreadId, AssistantError>;

    async fn append_message(
        &self,
        thread_id: &ThreadId,
        content: &UserContent,
    ) -> Result<(), AssistantError>;

    async fn start_run(
        &self,
        thread_id: &ThreadId,
        instructions: Option<&str>,
    ) -> Result<Run, AssistantError>;

    async fn get_run(&self, thread_id: &ThreadId, run_id: &RunId) -> Result<Run, AssistantError>;

    /// Submits one complete batch and returns the run as the service reports it afterwards.
    async fn submit_tool_outputs(
        &self,
        thread_id: &ThreadId,
        run_id: &RunId,
        outputs: &[ToolOutput],
    ) -> Result<Run, AssistantError>;

    async fn cancel_run(&self, thread_id: &ThreadId, run_id: &RunId)
        -> Result<(), AssistantError>;

    /// Messages newest first.
    async fn list_messages(
        &self,
        thread_id: &ThreadId,
        limit: u32,
    ) -> Result<Vec<ThreadMessage>, AssistantError>;
}
