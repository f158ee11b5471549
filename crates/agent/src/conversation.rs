use std::sync::Arc;

use leadbot_core::connectors::{CrmConnector, Notification, Notifier};
use leadbot_core::domain::run::{MessageRole, ThreadId, ThreadMessage};
use leadbot_core::domain::turn::{TurnContext, TurnOutcome, TurnResult, UserContent};
use leadbot_core::errors::TurnError;
use tracing::{info, warn};

use crate::assistant::AssistantClient;
use crate::cache::PhotoCache;
use crate::runtime::{clean_reply, RunOrchestrator};
use crate::side_effects::spawn_non_critical;
use crate::tools::DispatchContext;

const TRANSCRIPT_MESSAGE_LIMIT: u32 = 100;

/// Entry point for one inbound message: resolves the thread, appends the content and
/// hands the run to the [`RunOrchestrator`].
pub struct TurnHandler {
    orchestrator: RunOrchestrator,
    photos: Arc<dyn PhotoCache>,
    notifier: Arc<dyn Notifier>,
}

impl TurnHandler {
    pub fn new(
        orchestrator: RunOrchestrator,
        photos: Arc<dyn PhotoCache>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self { orchestrator, photos, notifier }
    }

    pub async fn create_thread(&self, correlation_id: &str) -> Result<ThreadId, TurnError> {
        let thread_id = self.orchestrator.assistant().create_thread().await?;
        info!(
            event_name = "agent.thread.created",
            correlation_id,
            thread_id = %thread_id,
            "created assistant thread"
        );
        Ok(thread_id)
    }

    pub async fn handle_turn(
        &self,
        thread_id: Option<ThreadId>,
        content: UserContent,
        context: TurnContext,
    ) -> Result<TurnOutcome, TurnError> {
        if content.is_empty() {
            return Err(TurnError::InvalidInput("message is empty".to_string()));
        }

        let correlation_id = context.correlation_id.clone();
        let thread_id = match thread_id.filter(|thread| !thread.as_str().trim().is_empty()) {
            Some(thread_id) if thread_id.is_well_formed() => thread_id,
            Some(_) => return Err(TurnError::InvalidInput("thread id is malformed".to_string())),
            None => self.create_thread(&correlation_id).await?,
        };

        if let Some(image) = &content.image {
            self.photos.put(&thread_id, image.clone()).await;
            let notification = Notification {
                title: "Photo received from website chat".to_string(),
                body: image.caption.clone().unwrap_or_else(|| format!("Thread {thread_id}")),
                photo_url: Some(image.url.clone()),
                correlation_id: correlation_id.clone(),
            };
            let notifier = self.notifier.clone();
            spawn_non_critical("photo_notification", correlation_id.clone(), async move {
                notifier.notify(&notification).await
            });
        }

        let assistant = self.orchestrator.assistant();
        if let Err(error) = assistant.append_message(&thread_id, &content).await {
            warn!(
                event_name = "agent.turn.append_failed",
                correlation_id = %correlation_id,
                thread_id = %thread_id,
                error = %error,
                "could not append message to thread"
            );
            return Err(error.into());
        }

        let dispatch_context = DispatchContext {
            correlation_id: correlation_id.clone(),
            thread_id: Some(thread_id.clone()),
            contact_id: None,
        };
        let instructions = context.instructions();
        let outcome = self
            .orchestrator
            .execute(&thread_id, instructions.as_deref(), dispatch_context)
            .await?;

        if let Some(contact_id) = outcome.contact_id.clone() {
            let crm = self.orchestrator.dispatcher().crm();
            let thread = thread_id.clone();
            spawn_non_critical("transcript_upload", correlation_id.clone(), async move {
                upload_transcript(assistant, crm, thread, contact_id).await
            });
        }

        info!(
            event_name = "agent.turn.completed",
            correlation_id = %correlation_id,
            thread_id = %thread_id,
            tool_cycles = outcome.tool_cycles,
            has_action = outcome.action.is_some(),
            "turn completed"
        );

        Ok(TurnOutcome {
            thread_id,
            result: TurnResult { message: outcome.reply, action: outcome.action },
        })
    }
}

async fn upload_transcript(
    assistant: Arc<dyn AssistantClient>,
    crm: Arc<dyn CrmConnector>,
    thread_id: ThreadId,
    contact_id: String,
) -> Result<(), String> {
    let messages = assistant
        .list_messages(&thread_id, TRANSCRIPT_MESSAGE_LIMIT)
        .await
        .map_err(|error| error.to_string())?;
    let transcript = render_transcript(&messages);
    if transcript.is_empty() {
        return Ok(());
    }
    crm.add_note(&contact_id, &format!("Website chat transcript\n\n{transcript}"))
        .await
        .map_err(|error| error.to_string())
}

/// Oldest first; `messages` arrive newest first.
pub fn render_transcript(messages: &[ThreadMessage]) -> String {
    messages
        .iter()
        .rev()
        .filter_map(|message| {
            let text = clean_reply(message.text.as_deref()?);
            if text.is_empty() {
                return None;
            }
            let speaker = match message.role {
                MessageRole::User => "Customer",
                MessageRole::Assistant => "Assistant",
            };
            Some(format!("{speaker}: {text}"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}
