use std::time::Duration;

use async_trait::async_trait;
use leadbot_core::config::NotificationsConfig;
use leadbot_core::connectors::{ConnectorError, Notification, Notifier};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use crate::blocks::lead_alert_message;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts lead and photo alerts to a Slack incoming webhook.
pub struct SlackWebhookNotifier {
    client: Client,
    webhook_url: SecretString,
}

impl SlackWebhookNotifier {
    pub fn new(webhook_url: SecretString) -> Result<Self, ConnectorError> {
        let client = Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .map_err(|error| ConnectorError::Transport(error.to_string()))?;
        Ok(Self { client, webhook_url })
    }

    pub fn from_config(config: &NotificationsConfig) -> Result<Option<Self>, ConnectorError> {
        match config.slack_webhook_url.clone() {
            Some(url) if config.is_configured() => Self::new(url).map(Some),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl Notifier for SlackWebhookNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), ConnectorError> {
        let payload = lead_alert_message(notification);
        let response = self
            .client
            .post(self.webhook_url.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(|error| ConnectorError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::Rejected { status: status.as_u16(), body });
        }

        info!(
            event_name = "slack.webhook.delivered",
            correlation_id = %notification.correlation_id,
            "slack notification delivered"
        );
        Ok(())
    }
}
