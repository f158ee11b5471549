use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use futures_util::future::join_all;
use leadbot_core::domain::run::{
    MessageRole, Run, RunStatus, ThreadId, ThreadMessage, ToolCall, ToolOutput,
};
use leadbot_core::domain::turn::StructuredAction;
use leadbot_core::errors::TurnError;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::assistant::AssistantClient;
use crate::polling::{PollSchedule, Poller};
use crate::side_effects::spawn_non_critical;
use crate::tools::{DispatchContext, LeadCapture, ToolDispatcher};

const REPLY_SCAN_LIMIT: u32 = 20;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunOutcome {
    pub reply: String,
    pub action: Option<StructuredAction>,
    /// Contact id of the last lead saved during the run, if the CRM returned one.
    pub contact_id: Option<String>,
    pub tool_cycles: u32,
}

/// Drives one assistant run from creation to a terminal status, dispatching tool
/// batches along the way.
pub struct RunOrchestrator {
    assistant: Arc<dyn AssistantClient>,
    dispatcher: ToolDispatcher,
    schedule: PollSchedule,
}

impl RunOrchestrator {
    pub fn new(
        assistant: Arc<dyn AssistantClient>,
        dispatcher: ToolDispatcher,
        schedule: PollSchedule,
    ) -> Self {
        Self { assistant, dispatcher, schedule }
    }

    pub fn assistant(&self) -> Arc<dyn AssistantClient> {
        self.assistant.clone()
    }

    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    /// Starts a run on `thread_id` and polls it to completion. The deadline covers the
    /// whole run, including run creation and tool dispatch.
    pub async fn execute(
        &self,
        thread_id: &ThreadId,
        instructions: Option<&str>,
        context: DispatchContext,
    ) -> Result<RunOutcome, TurnError> {
        let poller = self.schedule.start();
        let run = poller
            .bound(self.assistant.start_run(thread_id, instructions))
            .await
            .map_err(|_| self.deadline_error())??;

        info!(
            event_name = "agent.run.started",
            correlation_id = %context.correlation_id,
            thread_id = %thread_id,
            run_id = %run.id,
            status = %run.status,
            "assistant run started"
        );

        self.drive(run, &poller, context).await
    }

    async fn drive(
        &self,
        mut run: Run,
        poller: &Poller,
        mut context: DispatchContext,
    ) -> Result<RunOutcome, TurnError> {
        let mut submitted: HashSet<String> = HashSet::new();
        let mut last_lead: Option<LeadCapture> = None;
        let mut tool_cycles = 0_u32;

        while !run.status.is_terminal() {
            if poller.expired() {
                return Err(self.time_out(&run, &context));
            }

            if run.status == RunStatus::RequiresAction {
                let pending: Vec<ToolCall> = run
                    .required_action
                    .iter()
                    .filter(|call| !submitted.contains(&call.id))
                    .cloned()
                    .collect();

                if !pending.is_empty() {
                    let Ok(outcomes) = poller
                        .bound(join_all(
                            pending.iter().map(|call| self.dispatcher.dispatch(call, &context)),
                        ))
                        .await
                    else {
                        return Err(self.time_out(&run, &context));
                    };

                    let mut outputs: Vec<ToolOutput> = Vec::with_capacity(outcomes.len());
                    for outcome in outcomes {
                        if let Some(lead) = outcome.lead {
                            if lead.contact_id.is_some() {
                                context.contact_id = lead.contact_id.clone();
                            }
                            last_lead = Some(lead);
                        }
                        outputs.push(outcome.output);
                    }
                    submitted.extend(outputs.iter().map(|output| output.tool_call_id.clone()));
                    tool_cycles += 1;

                    info!(
                        event_name = "agent.run.tool_outputs_submitted",
                        correlation_id = %context.correlation_id,
                        thread_id = %run.thread_id,
                        run_id = %run.id,
                        batch_size = outputs.len(),
                        tool_cycle = tool_cycles,
                        "submitting tool outputs"
                    );

                    let Ok(next) = poller
                        .bound(self.assistant.submit_tool_outputs(
                            &run.thread_id,
                            &run.id,
                            &outputs,
                        ))
                        .await
                    else {
                        return Err(self.time_out(&run, &context));
                    };
                    run = self.advance(run, next?, &context);
                    continue;
                }

                debug!(
                    event_name = "agent.run.stale_action",
                    correlation_id = %context.correlation_id,
                    run_id = %run.id,
                    "required action holds no unsubmitted tool calls; re-polling"
                );
            }

            poller.wait().await;
            if poller.expired() {
                return Err(self.time_out(&run, &context));
            }
            let Ok(next) = poller.bound(self.assistant.get_run(&run.thread_id, &run.id)).await
            else {
                return Err(self.time_out(&run, &context));
            };
            run = self.advance(run, next?, &context);
        }

        if run.status != RunStatus::Completed {
            warn!(
                event_name = "agent.run.failed",
                correlation_id = %context.correlation_id,
                thread_id = %run.thread_id,
                run_id = %run.id,
                status = %run.status,
                detail = run.last_error.as_deref().unwrap_or("none"),
                "assistant run ended without completing"
            );
            return Err(TurnError::RunFailed { status: run.status, detail: run.last_error });
        }

        let Ok(messages) = poller
            .bound(self.assistant.list_messages(&run.thread_id, REPLY_SCAN_LIMIT))
            .await
        else {
            return Err(self.deadline_error());
        };
        let reply = select_reply(&messages?, &run).ok_or(TurnError::NoResponse)?;

        info!(
            event_name = "agent.run.completed",
            correlation_id = %context.correlation_id,
            thread_id = %run.thread_id,
            run_id = %run.id,
            tool_cycles,
            lead_captured = last_lead.is_some(),
            "assistant run completed"
        );

        let contact_id = last_lead.as_ref().and_then(|lead| lead.contact_id.clone());
        Ok(RunOutcome {
            reply,
            action: last_lead.map(|lead| StructuredAction::FillForm(lead.prefill)),
            contact_id,
            tool_cycles,
        })
    }

    fn advance(&self, previous: Run, next: Run, context: &DispatchContext) -> Run {
        if previous.status != next.status {
            if !previous.status.can_transition_to(next.status) {
                warn!(
                    event_name = "agent.run.unexpected_transition",
                    correlation_id = %context.correlation_id,
                    run_id = %previous.id,
                    from = %previous.status,
                    to = %next.status,
                    "assistant reported an out-of-order run status"
                );
            }
            debug!(
                event_name = "agent.run.status_changed",
                correlation_id = %context.correlation_id,
                run_id = %previous.id,
                from = %previous.status,
                to = %next.status,
                "run status changed"
            );
        }
        next
    }

    /// Fires one detached cancel for `run` and returns the timeout error without
    /// waiting for the acknowledgement.
    fn time_out(&self, run: &Run, context: &DispatchContext) -> TurnError {
        warn!(
            event_name = "agent.run.timeout",
            correlation_id = %context.correlation_id,
            thread_id = %run.thread_id,
            run_id = %run.id,
            status = %run.status,
            deadline_secs = self.schedule.deadline.as_secs(),
            "assistant run exceeded deadline; cancelling"
        );

        let assistant = self.assistant.clone();
        let thread_id = run.thread_id.clone();
        let run_id = run.id.clone();
        spawn_non_critical("cancel_run", context.correlation_id.clone(), async move {
            assistant.cancel_run(&thread_id, &run_id).await
        });

        self.deadline_error()
    }

    fn deadline_error(&self) -> TurnError {
        TurnError::Timeout { deadline_secs: self.schedule.deadline.as_secs() }
    }
}

/// Newest assistant message produced by `run`, falling back to the newest assistant
/// message on the thread. `messages` is ordered newest first.
fn select_reply(messages: &[ThreadMessage], run: &Run) -> Option<String> {
    let assistant_texts = || {
        messages
            .iter()
            .filter(|message| message.role == MessageRole::Assistant)
            .filter_map(|message| {
                let cleaned = clean_reply(message.text.as_deref()?);
                (!cleaned.is_empty()).then_some((message, cleaned))
            })
    };

    assistant_texts()
        .find(|(message, _)| message.run_id.as_ref() == Some(&run.id))
        .or_else(|| assistant_texts().next())
        .map(|(_, cleaned)| cleaned)
}

fn citation_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"【[^】]*】").ok()).as_ref()
}

fn horizontal_space() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[ \t]{2,}").ok()).as_ref()
}

/// Strips `【…】` citation markers and collapses the spacing they leave behind.
pub fn clean_reply(text: &str) -> String {
    let stripped = match citation_pattern() {
        Some(pattern) => pattern.replace_all(text, "").into_owned(),
        None => text.to_string(),
    };
    let collapsed = match horizontal_space() {
        Some(pattern) => pattern.replace_all(&stripped, " ").into_owned(),
        None => stripped,
    };
    collapsed.lines().map(str::trim_end).collect::<Vec<_>>().join("\n").trim().to_string()
}
