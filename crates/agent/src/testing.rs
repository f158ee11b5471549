//! Scripted doubles shared by the agent tests.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use leadbot_core::config::LeadSinkMode;
use leadbot_core::connectors::{
    BookingOutcome, BookingRequest, CalendarConnector, ConnectorError, CrmConnector, CrmContact,
    Notification, Notifier, SlotQuery, SpreadsheetConnector,
};
use leadbot_core::domain::lead::LeadRecord;
use leadbot_core::domain::run::{
    MessageRole, Run, RunId, RunStatus, ThreadId, ThreadMessage, ToolCall, ToolOutput,
};
use leadbot_core::domain::turn::UserContent;
use tokio::sync::Mutex;

use crate::assistant::{AssistantClient, AssistantError};
use crate::cache::InMemoryPhotoCache;
use crate::tools::ToolDispatcher;

pub const THREAD: &str = "thread_1";
pub const RUN: &str = "run_1";

/// Lets detached side-effect tasks run on the current-thread test runtime.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

pub fn run(status: RunStatus) -> Run {
    Run::new(RUN, ThreadId(THREAD.to_string()), status)
}

pub fn requires(calls: Vec<ToolCall>) -> Run {
    run(RunStatus::RequiresAction).with_tool_calls(calls)
}

pub fn tool_call(id: &str, name: &str, arguments: &str) -> ToolCall {
    ToolCall { id: id.to_string(), name: name.to_string(), arguments: arguments.to_string() }
}

pub fn assistant_message(run_id: Option<&str>, text: &str) -> ThreadMessage {
    ThreadMessage {
        role: MessageRole::Assistant,
        run_id: run_id.map(|id| RunId(id.to_string())),
        text: Some(text.to_string()),
    }
}

pub fn user_message(text: &str) -> ThreadMessage {
    ThreadMessage { role: MessageRole::User, run_id: None, text: Some(text.to_string()) }
}

#[derive(Default)]
pub struct ScriptedAssistant {
    state: Mutex<AssistantState>,
}

#[derive(Default)]
struct AssistantState {
    create_error: Option<AssistantError>,
    append_error: Option<AssistantError>,
    start_status: Option<RunStatus>,
    polls: VecDeque<Result<Run, AssistantError>>,
    fallback_status: Option<RunStatus>,
    poll_delay: Option<Duration>,
    submit_results: VecDeque<Run>,
    messages: Vec<ThreadMessage>,
    created_threads: usize,
    appended: Vec<(ThreadId, UserContent)>,
    started_instructions: Vec<Option<String>>,
    submitted_ids: HashSet<String>,
    submissions: Vec<Vec<ToolOutput>>,
    cancels: usize,
    get_run_calls: usize,
}

impl ScriptedAssistant {
    /// `polls` are returned by successive `get_run` calls; once exhausted every poll
    /// reports `fallback` (default `completed`).
    pub fn new(polls: Vec<Run>, messages: Vec<ThreadMessage>) -> Self {
        Self {
            state: Mutex::new(AssistantState {
                polls: polls.into_iter().map(Ok).collect(),
                messages,
                ..AssistantState::default()
            }),
        }
    }

    pub async fn with_submit_results(self, runs: Vec<Run>) -> Self {
        self.state.lock().await.submit_results = runs.into();
        self
    }

    pub async fn with_fallback(self, status: RunStatus) -> Self {
        self.state.lock().await.fallback_status = Some(status);
        self
    }

    pub async fn with_poll_delay(self, delay: Duration) -> Self {
        self.state.lock().await.poll_delay = Some(delay);
        self
    }

    pub async fn with_start_status(self, status: RunStatus) -> Self {
        self.state.lock().await.start_status = Some(status);
        self
    }

    pub async fn failing_append(self, error: AssistantError) -> Self {
        self.state.lock().await.append_error = Some(error);
        self
    }

    pub async fn failing_create(self, error: AssistantError) -> Self {
        self.state.lock().await.create_error = Some(error);
        self
    }

    pub async fn push_poll_error(&self, error: AssistantError) {
        self.state.lock().await.polls.push_back(Err(error));
    }

    pub async fn submissions(&self) -> Vec<Vec<ToolOutput>> {
        self.state.lock().await.submissions.clone()
    }

    pub async fn cancels(&self) -> usize {
        self.state.lock().await.cancels
    }

    pub async fn created_threads(&self) -> usize {
        self.state.lock().await.created_threads
    }

    pub async fn appended(&self) -> Vec<(ThreadId, UserContent)> {
        self.state.lock().await.appended.clone()
    }

    pub async fn started_instructions(&self) -> Vec<Option<String>> {
        self.state.lock().await.started_instructions.clone()
    }

    pub async fn get_run_calls(&self) -> usize {
        self.state.lock().await.get_run_calls
    }
}

#[async_trait]
impl AssistantClient for ScriptedAssistant {
    async fn create_thread(&self) -> Result<ThreadId, AssistantError> {
        let mut state = self.state.lock().await;
        if let Some(error) = state.create_error.clone() {
            return Err(error);
        }
        state.created_threads += 1;
        Ok(ThreadId(THREAD.to_string()))
    }

    async fn append_message(
        &self,
        thread_id: &ThreadId,
        content: &UserContent,
    ) -> Result<(), AssistantError> {
        let mut state = self.state.lock().await;
        if let Some(error) = state.append_error.clone() {
            return Err(error);
        }
        state.appended.push((thread_id.clone(), content.clone()));
        Ok(())
    }

    async fn start_run(
        &self,
        _thread_id: &ThreadId,
        instructions: Option<&str>,
    ) -> Result<Run, AssistantError> {
        let mut state = self.state.lock().await;
        state.started_instructions.push(instructions.map(str::to_string));
        Ok(run(state.start_status.unwrap_or(RunStatus::Queued)))
    }

    async fn get_run(&self, _thread_id: &ThreadId, _run_id: &RunId) -> Result<Run, AssistantError> {
        let delay = {
            let mut state = self.state.lock().await;
            state.get_run_calls += 1;
            state.poll_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().await;
        match state.polls.pop_front() {
            Some(result) => result,
            None => Ok(run(state.fallback_status.unwrap_or(RunStatus::Completed))),
        }
    }

    async fn submit_tool_outputs(
        &self,
        _thread_id: &ThreadId,
        _run_id: &RunId,
        outputs: &[ToolOutput],
    ) -> Result<Run, AssistantError> {
        let mut state = self.state.lock().await;
        if outputs.iter().any(|output| state.submitted_ids.contains(&output.tool_call_id)) {
            return Err(AssistantError::Rejected {
                status: 400,
                body: "tool outputs already submitted for this run".to_string(),
            });
        }
        for output in outputs {
            state.submitted_ids.insert(output.tool_call_id.clone());
        }
        state.submissions.push(outputs.to_vec());
        Ok(state.submit_results.pop_front().unwrap_or_else(|| run(RunStatus::Queued)))
    }

    async fn cancel_run(
        &self,
        _thread_id: &ThreadId,
        _run_id: &RunId,
    ) -> Result<(), AssistantError> {
        self.state.lock().await.cancels += 1;
        Ok(())
    }

    async fn list_messages(
        &self,
        _thread_id: &ThreadId,
        limit: u32,
    ) -> Result<Vec<ThreadMessage>, AssistantError> {
        let state = self.state.lock().await;
        Ok(state.messages.iter().take(limit as usize).cloned().collect())
    }
}

pub struct StubCrm {
    result: Result<CrmContact, ConnectorError>,
    delay: Option<Duration>,
    upserts: Mutex<Vec<LeadRecord>>,
    notes: Mutex<Vec<(String, String)>>,
}

impl StubCrm {
    pub fn with_result(result: Result<CrmContact, ConnectorError>) -> Self {
        Self {
            result,
            delay: None,
            upserts: Mutex::new(Vec::new()),
            notes: Mutex::new(Vec::new()),
        }
    }

    /// Every upsert sleeps `delay` on the tokio clock before answering.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn accepting(contact_id: Option<&str>) -> Self {
        Self::with_result(Ok(CrmContact {
            contact_id: contact_id.map(str::to_string),
            is_new: true,
        }))
    }

    pub fn failing(error: ConnectorError) -> Self {
        Self::with_result(Err(error))
    }

    pub async fn upserts(&self) -> Vec<LeadRecord> {
        self.upserts.lock().await.clone()
    }

    pub async fn notes(&self) -> Vec<(String, String)> {
        self.notes.lock().await.clone()
    }
}

#[async_trait]
impl CrmConnector for StubCrm {
    async fn upsert_contact(&self, lead: &LeadRecord) -> Result<CrmContact, ConnectorError> {
        self.upserts.lock().await.push(lead.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.result.clone()
    }

    async fn add_note(&self, contact_id: &str, body: &str) -> Result<(), ConnectorError> {
        self.notes.lock().await.push((contact_id.to_string(), body.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct StubSheets {
    error: Option<String>,
    delay: Option<Duration>,
    rows: Mutex<Vec<LeadRecord>>,
}

impl StubSheets {
    pub fn failing(message: &str) -> Self {
        Self { error: Some(message.to_string()), ..Self::default() }
    }

    pub fn delayed(delay: Duration) -> Self {
        Self { delay: Some(delay), ..Self::default() }
    }

    pub async fn rows(&self) -> Vec<LeadRecord> {
        self.rows.lock().await.clone()
    }
}

#[async_trait]
impl SpreadsheetConnector for StubSheets {
    async fn append_lead(&self, lead: &LeadRecord) -> Result<(), ConnectorError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.error {
            return Err(ConnectorError::Transport(message.clone()));
        }
        self.rows.lock().await.push(lead.clone());
        Ok(())
    }
}

pub struct StubCalendar {
    slots: SlotQuery,
    delay: Option<Duration>,
    queries: Mutex<Vec<(String, u32)>>,
    bookings: Mutex<Vec<BookingRequest>>,
}

impl Default for StubCalendar {
    fn default() -> Self {
        Self::with_slots(SlotQuery {
            date: "2026-03-02".to_string(),
            slots: vec!["9:00 AM".to_string(), "1:30 PM".to_string()],
            raw: Vec::new(),
            error: None,
        })
    }
}

impl StubCalendar {
    pub fn with_slots(slots: SlotQuery) -> Self {
        Self {
            slots,
            delay: None,
            queries: Mutex::new(Vec::new()),
            bookings: Mutex::new(Vec::new()),
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn queries(&self) -> Vec<(String, u32)> {
        self.queries.lock().await.clone()
    }

    pub async fn bookings(&self) -> Vec<BookingRequest> {
        self.bookings.lock().await.clone()
    }
}

#[async_trait]
impl CalendarConnector for StubCalendar {
    async fn available_slots(&self, date: chrono::NaiveDate, days_ahead: u32) -> SlotQuery {
        self.queries.lock().await.push((date.to_string(), days_ahead));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.slots.clone()
    }

    async fn book(&self, request: &BookingRequest) -> BookingOutcome {
        self.bookings.lock().await.push(request.clone());
        BookingOutcome {
            success: true,
            appointment_id: Some("appt-1".to_string()),
            start_time: Some(request.start_time.clone()),
            end_time: None,
            error: None,
        }
    }
}

#[derive(Default)]
pub struct StubNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl StubNotifier {
    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for StubNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), ConnectorError> {
        self.sent.lock().await.push(notification.clone());
        Ok(())
    }
}

pub struct Stubs {
    pub crm: Arc<StubCrm>,
    pub sheets: Arc<StubSheets>,
    pub calendar: Arc<StubCalendar>,
    pub notifier: Arc<StubNotifier>,
    pub photos: Arc<InMemoryPhotoCache>,
    pub sink_mode: LeadSinkMode,
}

impl Default for Stubs {
    fn default() -> Self {
        Self {
            crm: Arc::new(StubCrm::accepting(Some("contact-1"))),
            sheets: Arc::new(StubSheets::default()),
            calendar: Arc::new(StubCalendar::default()),
            notifier: Arc::new(StubNotifier::default()),
            photos: Arc::new(InMemoryPhotoCache::new(Duration::from_secs(30 * 60))),
            sink_mode: LeadSinkMode::Lenient,
        }
    }
}

impl Stubs {
    pub fn dispatcher(&self) -> ToolDispatcher {
        ToolDispatcher::new(
            self.crm.clone(),
            self.sheets.clone(),
            self.calendar.clone(),
            self.notifier.clone(),
            self.photos.clone(),
            self.sink_mode,
        )
    }
}
