use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use leadbot_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

use crate::commands::CommandResult;

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            );
        }
    };

    let config_file_path = detect_config_path();
    let mut listing = Listing {
        config_file_doc: load_config_file_doc(config_file_path.as_deref()),
        config_file_path,
        lines: vec!["effective config (source precedence: env > file > default):".to_string()],
    };

    let assistant = &config.assistant;
    listing.push(
        "assistant.api_key",
        &redact_secret(assistant.api_key.as_ref()),
        &["LEADBOT_ASSISTANT_API_KEY", "OPENAI_API_KEY"],
    );
    listing.push(
        "assistant.assistant_id",
        or_unset(assistant.assistant_id.as_deref()),
        &["LEADBOT_ASSISTANT_ID", "OPENAI_ASSISTANT_ID"],
    );
    listing.push("assistant.base_url", &assistant.base_url, &["LEADBOT_ASSISTANT_BASE_URL"]);
    listing.push(
        "assistant.poll_interval_ms",
        &assistant.poll_interval_ms.to_string(),
        &["LEADBOT_ASSISTANT_POLL_INTERVAL_MS"],
    );
    listing.push(
        "assistant.run_deadline_secs",
        &assistant.run_deadline_secs.to_string(),
        &["LEADBOT_ASSISTANT_RUN_DEADLINE_SECS"],
    );
    listing.push(
        "assistant.request_timeout_secs",
        &assistant.request_timeout_secs.to_string(),
        &["LEADBOT_ASSISTANT_REQUEST_TIMEOUT_SECS"],
    );

    let crm = &config.crm;
    listing.push(
        "crm.api_token",
        &redact_secret(crm.api_token.as_ref()),
        &["LEADBOT_CRM_API_TOKEN", "PROSBUDDY_API_TOKEN"],
    );
    listing.push(
        "crm.location_id",
        or_unset(crm.location_id.as_deref()),
        &["LEADBOT_CRM_LOCATION_ID", "PROSBUDDY_LOCATION_ID"],
    );
    listing.push("crm.base_url", &crm.base_url, &["LEADBOT_CRM_BASE_URL"]);
    listing.push("crm.api_version", &crm.api_version, &[]);
    listing.push("crm.tags", &crm.tags.join(","), &["LEADBOT_CRM_TAGS"]);

    let calendar = &config.calendar;
    listing.push(
        "calendar.calendar_id",
        or_unset(calendar.calendar_id.as_deref()),
        &["LEADBOT_CALENDAR_ID", "GHL_CALENDAR_ID"],
    );
    listing.push("calendar.timezone", &calendar.timezone, &["LEADBOT_CALENDAR_TIMEZONE"]);
    listing.push(
        "calendar.appointment_minutes",
        &calendar.appointment_minutes.to_string(),
        &["LEADBOT_CALENDAR_APPOINTMENT_MINUTES"],
    );

    let sheets = &config.sheets;
    listing.push(
        "sheets.spreadsheet_id",
        or_unset(sheets.spreadsheet_id.as_deref()),
        &["LEADBOT_SHEETS_SPREADSHEET_ID", "GOOGLE_SHEET_ID"],
    );
    listing.push(
        "sheets.service_account_json",
        if sheets.service_account_json.is_some() { "<redacted>" } else { "<unset>" },
        &["LEADBOT_SHEETS_SERVICE_ACCOUNT_JSON", "GOOGLE_SERVICE_ACCOUNT_CREDENTIALS"],
    );
    listing.push("sheets.range", &sheets.range, &["LEADBOT_SHEETS_RANGE"]);

    listing.push(
        "notifications.slack_webhook_url",
        if config.notifications.slack_webhook_url.is_some() { "<redacted>" } else { "<unset>" },
        &["LEADBOT_NOTIFICATIONS_SLACK_WEBHOOK_URL", "SLACK_WEBHOOK_URL"],
    );

    let leads = &config.leads;
    listing.push("leads.sink_mode", leads.sink_mode.as_str(), &["LEADBOT_LEADS_SINK_MODE"]);
    listing.push(
        "leads.photo_cache_ttl_secs",
        &leads.photo_cache_ttl_secs.to_string(),
        &["LEADBOT_LEADS_PHOTO_CACHE_TTL_SECS"],
    );

    let server = &config.server;
    listing.push("server.bind_address", &server.bind_address, &["LEADBOT_SERVER_BIND_ADDRESS"]);
    listing.push("server.port", &server.port.to_string(), &["LEADBOT_SERVER_PORT", "PORT"]);
    listing.push(
        "server.allowed_origins",
        &if server.allowed_origins.is_empty() {
            "<any>".to_string()
        } else {
            server.allowed_origins.join(",")
        },
        &["LEADBOT_SERVER_ALLOWED_ORIGINS"],
    );
    listing.push(
        "server.graceful_shutdown_secs",
        &server.graceful_shutdown_secs.to_string(),
        &["LEADBOT_SERVER_GRACEFUL_SHUTDOWN_SECS"],
    );

    listing.push(
        "logging.level",
        &config.logging.level,
        &["LEADBOT_LOGGING_LEVEL", "LEADBOT_LOG_LEVEL", "LOG_LEVEL"],
    );
    listing.push(
        "logging.format",
        &format!("{:?}", config.logging.format).to_ascii_lowercase(),
        &["LEADBOT_LOGGING_FORMAT", "LEADBOT_LOG_FORMAT"],
    );

    CommandResult::success(listing.lines.join("\n"))
}

struct Listing {
    config_file_path: Option<PathBuf>,
    config_file_doc: Option<Value>,
    lines: Vec<String>,
}

impl Listing {
    fn push(&mut self, key_path: &str, value: &str, env_keys: &[&str]) {
        let source = field_source(
            key_path,
            env_keys,
            self.config_file_doc.as_ref(),
            self.config_file_path.as_deref(),
        );
        self.lines.push(render_line(key_path, value, source));
    }
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("leadbot.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/leadbot.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

/// The first env key that is set wins, matching the loader's alias order.
fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    let set_env = env_keys.iter().find(|key| {
        env::var(key).map(|value| !value.trim().is_empty()).unwrap_or(false)
    });
    if let Some(env_key) = set_env {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn or_unset(value: Option<&str>) -> &str {
    value.unwrap_or("<unset>")
}

/// Keeps a recognizable prefix (`sk-`, `pit-`) and nothing else.
fn redact_secret(secret: Option<&SecretString>) -> String {
    let Some(secret) = secret else {
        return "<unset>".to_string();
    };
    let trimmed = secret.expose_secret().trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        if prefix.len() <= 4 {
            return format!("{prefix}-***");
        }
    }

    "<redacted>".to_string()
}
