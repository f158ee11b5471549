use std::sync::Arc;
use std::time::Duration;

use leadbot_agent::{
    AssistantError, InMemoryPhotoCache, OpenAiAssistantClient, PollSchedule, RunOrchestrator,
    ToolDispatcher, TurnHandler,
};
use leadbot_core::config::AppConfig;
use leadbot_core::connectors::{
    CalendarConnector, ConnectorError, CrmConnector, Notifier, SpreadsheetConnector, Unconfigured,
};
use leadbot_slack::SlackWebhookNotifier;
use thiserror::Error;
use tracing::{info, warn};

use crate::calendar::GhlCalendarConnector;
use crate::crm::{GhlClient, GhlCrmConnector};
use crate::sheets::GoogleSheetsConnector;
use crate::state::{AppState, Integrations};

const CONNECTOR_TIMEOUT: Duration = Duration::from_secs(15);

pub struct Application {
    pub config: AppConfig,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("assistant client could not be built: {0}")]
    Assistant(#[source] AssistantError),
    #[error("{integration} connector could not be built: {source}")]
    Connector {
        integration: &'static str,
        #[source]
        source: ConnectorError,
    },
}

impl BootstrapError {
    fn connector(integration: &'static str) -> impl FnOnce(ConnectorError) -> Self {
        move |source| Self::Connector { integration, source }
    }
}

/// Wires every configured integration. Missing credentials never fail startup:
/// the integration is replaced by an `Unconfigured` stand-in and reported by `/health`.
pub async fn bootstrap(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let ghl = GhlClient::from_config(&config.crm, CONNECTOR_TIMEOUT)
        .map_err(BootstrapError::connector("crm"))?;
    let calendar_connector = ghl
        .clone()
        .and_then(|api| GhlCalendarConnector::new(api, &config.calendar));

    let crm: Arc<dyn CrmConnector> = match ghl {
        Some(api) => Arc::new(GhlCrmConnector::new(api, &config.crm)),
        None => Arc::new(Unconfigured("crm")),
    };
    let calendar: Arc<dyn CalendarConnector> = match calendar_connector {
        Some(connector) => Arc::new(connector),
        None => Arc::new(Unconfigured("calendar")),
    };
    let sheets: Arc<dyn SpreadsheetConnector> = match GoogleSheetsConnector::from_config(
        &config.sheets,
        &config.calendar.timezone,
        CONNECTOR_TIMEOUT,
    )
    .map_err(BootstrapError::connector("sheets"))?
    {
        Some(connector) => Arc::new(connector),
        None => Arc::new(Unconfigured("sheets")),
    };
    let notifier: Arc<dyn Notifier> = match SlackWebhookNotifier::from_config(&config.notifications)
        .map_err(BootstrapError::connector("notifications"))?
    {
        Some(notifier) => Arc::new(notifier),
        None => Arc::new(Unconfigured("notifications")),
    };

    let integrations = Integrations {
        assistant: config.assistant.is_configured(),
        crm: crm.is_configured(),
        calendar: calendar.is_configured(),
        sheets: sheets.is_configured(),
        notifications: notifier.is_configured(),
    };

    let turns = match OpenAiAssistantClient::from_config(&config.assistant)
        .map_err(BootstrapError::Assistant)?
    {
        Some(assistant) => {
            let photos = Arc::new(InMemoryPhotoCache::new(Duration::from_secs(
                config.leads.photo_cache_ttl_secs,
            )));
            let dispatcher = ToolDispatcher::new(
                crm.clone(),
                sheets.clone(),
                calendar.clone(),
                notifier.clone(),
                photos.clone(),
                config.leads.sink_mode,
            );
            let orchestrator = RunOrchestrator::new(
                Arc::new(assistant),
                dispatcher,
                PollSchedule::from_config(&config.assistant),
            );
            Some(Arc::new(TurnHandler::new(orchestrator, photos, notifier.clone())))
        }
        None => None,
    };

    let missing = integrations.missing();
    if missing.is_empty() {
        info!(
            event_name = "system.bootstrap.integrations_ready",
            correlation_id = "bootstrap",
            "all integrations configured"
        );
    } else {
        warn!(
            event_name = "system.bootstrap.integrations_missing",
            correlation_id = "bootstrap",
            missing = %missing.join(","),
            "some integrations are not configured; dependent routes and tools will degrade"
        );
    }
    info!(
        event_name = "system.bootstrap.complete",
        correlation_id = "bootstrap",
        sink_mode = config.leads.sink_mode.as_str(),
        "application bootstrap complete"
    );

    let state = AppState { turns, crm, sheets, calendar, notifier, integrations };
    Ok(Application { config, state })
}
