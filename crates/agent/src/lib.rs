//! Assistant runtime for the lead-capture chatbot.
//!
//! One inbound message becomes one *turn*:
//! 1. **Thread** (`conversation`) - create or reuse the hosted assistant thread and append content
//! 2. **Run** (`runtime`) - start a run and poll it under a fixed interval and overall deadline
//! 3. **Tools** (`tools`) - dispatch `requires_action` calls to CRM, spreadsheet and calendar connectors
//! 4. **Reply** (`runtime`) - pick the run's assistant message and strip citation markers
//!
//! The hosted assistant decides what to say. Lead validation, sink fan-out and the
//! structured form-fill action are decided here.

pub mod assistant;
pub mod cache;
pub mod conversation;
pub mod openai;
pub mod polling;
pub mod runtime;
pub mod side_effects;
pub mod tools;

#[cfg(test)]
mod testing;

pub use assistant::{AssistantClient, AssistantError};
pub use cache::{InMemoryPhotoCache, PhotoCache};
pub use conversation::TurnHandler;
pub use openai::OpenAiAssistantClient;
pub use polling::PollSchedule;
pub use runtime::{RunOrchestrator, RunOutcome};
pub use tools::{DispatchContext, ToolDispatcher, ToolKind};
