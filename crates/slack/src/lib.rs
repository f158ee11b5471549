//! Slack delivery for lead alerts.
//!
//! - **Block Kit** (`blocks`) - message builders for lead and photo alerts
//! - **Incoming webhook** (`webhook`) - [`Notifier`](leadbot_core::connectors::Notifier) backed by a Slack webhook URL
//!
//! Set `SLACK_WEBHOOK_URL` (or `LEADBOT_NOTIFICATIONS_SLACK_WEBHOOK_URL`) to enable it.

pub mod blocks;
pub mod webhook;

pub use webhook::SlackWebhookNotifier;
