use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub assistant: AssistantConfig,
    pub crm: CrmConfig,
    pub calendar: CalendarConfig,
    pub sheets: SheetsConfig,
    pub notifications: NotificationsConfig,
    pub leads: LeadsConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct AssistantConfig {
    pub api_key: Option<SecretString>,
    pub assistant_id: Option<String>,
    pub base_url: String,
    pub poll_interval_ms: u64,
    pub run_deadline_secs: u64,
    pub request_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CrmConfig {
    pub api_token: Option<SecretString>,
    pub location_id: Option<String>,
    pub base_url: String,
    pub api_version: String,
    pub tags: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct CalendarConfig {
    pub calendar_id: Option<String>,
    pub timezone: String,
    pub api_version: String,
    pub appointment_minutes: u32,
}

#[derive(Clone, Debug)]
pub struct SheetsConfig {
    pub spreadsheet_id: Option<String>,
    pub service_account_json: Option<SecretString>,
    pub range: String,
}

#[derive(Clone, Debug)]
pub struct NotificationsConfig {
    pub slack_webhook_url: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct LeadsConfig {
    pub sink_mode: LeadSinkMode,
    pub photo_cache_ttl_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// How a lead save is judged when the CRM and the spreadsheet disagree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadSinkMode {
    /// Success when at least one sink accepted the lead.
    #[default]
    Lenient,
    /// Success only when every sink accepted the lead.
    Strict,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub assistant_id: Option<String>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub sink_mode: Option<LeadSinkMode>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            assistant: AssistantConfig {
                api_key: None,
                assistant_id: None,
                base_url: "https://api.openai.com/v1".to_string(),
                poll_interval_ms: 1_000,
                run_deadline_secs: 50,
                request_timeout_secs: 30,
            },
            crm: CrmConfig {
                api_token: None,
                location_id: None,
                base_url: "https://services.leadconnectorhq.com".to_string(),
                api_version: "2021-07-28".to_string(),
                tags: vec!["chatbot-lead".to_string(), "repair-asap-bot".to_string()],
            },
            calendar: CalendarConfig {
                calendar_id: None,
                timezone: "America/New_York".to_string(),
                api_version: "2021-04-15".to_string(),
                appointment_minutes: 90,
            },
            sheets: SheetsConfig {
                spreadsheet_id: None,
                service_account_json: None,
                range: "Sheet1!A:I".to_string(),
            },
            notifications: NotificationsConfig { slack_webhook_url: None },
            leads: LeadsConfig { sink_mode: LeadSinkMode::Lenient, photo_cache_ttl_secs: 1_800 },
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 8080,
                allowed_origins: Vec::new(),
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

fn has_secret(value: &Option<SecretString>) -> bool {
    value.as_ref().map(|secret| !secret.expose_secret().trim().is_empty()).unwrap_or(false)
}

fn has_value(value: &Option<String>) -> bool {
    value.as_ref().map(|value| !value.trim().is_empty()).unwrap_or(false)
}

impl AssistantConfig {
    pub fn is_configured(&self) -> bool {
        has_secret(&self.api_key) && has_value(&self.assistant_id)
    }
}

impl CrmConfig {
    pub fn is_configured(&self) -> bool {
        has_secret(&self.api_token) && has_value(&self.location_id)
    }
}

impl CalendarConfig {
    /// The calendar shares the CRM credentials, so both must be present.
    pub fn is_configured(&self, crm: &CrmConfig) -> bool {
        crm.is_configured() && has_value(&self.calendar_id)
    }
}

impl SheetsConfig {
    pub fn is_configured(&self) -> bool {
        has_value(&self.spreadsheet_id) && has_secret(&self.service_account_json)
    }
}

impl NotificationsConfig {
    pub fn is_configured(&self) -> bool {
        has_secret(&self.slack_webhook_url)
    }
}

impl std::str::FromStr for LeadSinkMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            other => Err(ConfigError::Validation(format!(
                "unsupported lead sink mode `{other}` (expected lenient|strict)"
            ))),
        }
    }
}

impl LeadSinkMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lenient => "lenient",
            Self::Strict => "strict",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("leadbot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(assistant) = patch.assistant {
            if let Some(api_key) = assistant.api_key {
                self.assistant.api_key = Some(secret_value(api_key));
            }
            if let Some(assistant_id) = assistant.assistant_id {
                self.assistant.assistant_id = Some(assistant_id);
            }
            if let Some(base_url) = assistant.base_url {
                self.assistant.base_url = base_url;
            }
            if let Some(poll_interval_ms) = assistant.poll_interval_ms {
                self.assistant.poll_interval_ms = poll_interval_ms;
            }
            if let Some(run_deadline_secs) = assistant.run_deadline_secs {
                self.assistant.run_deadline_secs = run_deadline_secs;
            }
            if let Some(request_timeout_secs) = assistant.request_timeout_secs {
                self.assistant.request_timeout_secs = request_timeout_secs;
            }
        }

        if let Some(crm) = patch.crm {
            if let Some(api_token) = crm.api_token {
                self.crm.api_token = Some(secret_value(api_token));
            }
            if let Some(location_id) = crm.location_id {
                self.crm.location_id = Some(location_id);
            }
            if let Some(base_url) = crm.base_url {
                self.crm.base_url = base_url;
            }
            if let Some(api_version) = crm.api_version {
                self.crm.api_version = api_version;
            }
            if let Some(tags) = crm.tags {
                self.crm.tags = tags;
            }
        }

        if let Some(calendar) = patch.calendar {
            if let Some(calendar_id) = calendar.calendar_id {
                self.calendar.calendar_id = Some(calendar_id);
            }
            if let Some(timezone) = calendar.timezone {
                self.calendar.timezone = timezone;
            }
            if let Some(api_version) = calendar.api_version {
                self.calendar.api_version = api_version;
            }
            if let Some(appointment_minutes) = calendar.appointment_minutes {
                self.calendar.appointment_minutes = appointment_minutes;
            }
        }

        if let Some(sheets) = patch.sheets {
            if let Some(spreadsheet_id) = sheets.spreadsheet_id {
                self.sheets.spreadsheet_id = Some(spreadsheet_id);
            }
            if let Some(service_account_json) = sheets.service_account_json {
                self.sheets.service_account_json = Some(secret_value(service_account_json));
            }
            if let Some(range) = sheets.range {
                self.sheets.range = range;
            }
        }

        if let Some(notifications) = patch.notifications {
            if let Some(slack_webhook_url) = notifications.slack_webhook_url {
                self.notifications.slack_webhook_url = Some(secret_value(slack_webhook_url));
            }
        }

        if let Some(leads) = patch.leads {
            if let Some(sink_mode) = leads.sink_mode {
                self.leads.sink_mode = sink_mode;
            }
            if let Some(photo_cache_ttl_secs) = leads.photo_cache_ttl_secs {
                self.leads.photo_cache_ttl_secs = photo_cache_ttl_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(allowed_origins) = server.allowed_origins {
                self.server.allowed_origins = allowed_origins;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env_any(&["LEADBOT_ASSISTANT_API_KEY", "OPENAI_API_KEY"]) {
            self.assistant.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env_any(&["LEADBOT_ASSISTANT_ID", "OPENAI_ASSISTANT_ID"]) {
            self.assistant.assistant_id = Some(value);
        }
        if let Some(value) = read_env("LEADBOT_ASSISTANT_BASE_URL") {
            self.assistant.base_url = value;
        }
        if let Some(value) = read_env("LEADBOT_ASSISTANT_POLL_INTERVAL_MS") {
            self.assistant.poll_interval_ms =
                parse_u64("LEADBOT_ASSISTANT_POLL_INTERVAL_MS", &value)?;
        }
        if let Some(value) = read_env("LEADBOT_ASSISTANT_RUN_DEADLINE_SECS") {
            self.assistant.run_deadline_secs =
                parse_u64("LEADBOT_ASSISTANT_RUN_DEADLINE_SECS", &value)?;
        }
        if let Some(value) = read_env("LEADBOT_ASSISTANT_REQUEST_TIMEOUT_SECS") {
            self.assistant.request_timeout_secs =
                parse_u64("LEADBOT_ASSISTANT_REQUEST_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env_any(&["LEADBOT_CRM_API_TOKEN", "PROSBUDDY_API_TOKEN"]) {
            self.crm.api_token = Some(secret_value(value));
        }
        if let Some(value) = read_env_any(&["LEADBOT_CRM_LOCATION_ID", "PROSBUDDY_LOCATION_ID"]) {
            self.crm.location_id = Some(value);
        }
        if let Some(value) = read_env("LEADBOT_CRM_BASE_URL") {
            self.crm.base_url = value;
        }
        if let Some(value) = read_env("LEADBOT_CRM_TAGS") {
            self.crm.tags = parse_list(&value);
        }

        if let Some(value) = read_env_any(&["LEADBOT_CALENDAR_ID", "GHL_CALENDAR_ID"]) {
            self.calendar.calendar_id = Some(value);
        }
        if let Some(value) = read_env("LEADBOT_CALENDAR_TIMEZONE") {
            self.calendar.timezone = value;
        }
        if let Some(value) = read_env("LEADBOT_CALENDAR_APPOINTMENT_MINUTES") {
            self.calendar.appointment_minutes =
                parse_u32("LEADBOT_CALENDAR_APPOINTMENT_MINUTES", &value)?;
        }

        if let Some(value) = read_env_any(&["LEADBOT_SHEETS_SPREADSHEET_ID", "GOOGLE_SHEET_ID"]) {
            self.sheets.spreadsheet_id = Some(value);
        }
        if let Some(value) = read_env_any(&[
            "LEADBOT_SHEETS_SERVICE_ACCOUNT_JSON",
            "GOOGLE_SERVICE_ACCOUNT_CREDENTIALS",
        ]) {
            self.sheets.service_account_json = Some(secret_value(value));
        }
        if let Some(value) = read_env("LEADBOT_SHEETS_RANGE") {
            self.sheets.range = value;
        }

        if let Some(value) =
            read_env_any(&["LEADBOT_NOTIFICATIONS_SLACK_WEBHOOK_URL", "SLACK_WEBHOOK_URL"])
        {
            self.notifications.slack_webhook_url = Some(secret_value(value));
        }

        if let Some(value) = read_env("LEADBOT_LEADS_SINK_MODE") {
            self.leads.sink_mode = value.parse()?;
        }
        if let Some(value) = read_env("LEADBOT_LEADS_PHOTO_CACHE_TTL_SECS") {
            self.leads.photo_cache_ttl_secs =
                parse_u64("LEADBOT_LEADS_PHOTO_CACHE_TTL_SECS", &value)?;
        }

        if let Some(value) = read_env("LEADBOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env_any(&["LEADBOT_SERVER_PORT", "PORT"]) {
            self.server.port = parse_u16("LEADBOT_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("LEADBOT_SERVER_ALLOWED_ORIGINS") {
            self.server.allowed_origins = parse_list(&value);
        }
        if let Some(value) = read_env("LEADBOT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("LEADBOT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) =
            read_env_any(&["LEADBOT_LOGGING_LEVEL", "LEADBOT_LOG_LEVEL", "LOG_LEVEL"])
        {
            self.logging.level = value;
        }
        if let Some(value) = read_env_any(&["LEADBOT_LOGGING_FORMAT", "LEADBOT_LOG_FORMAT"]) {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(assistant_id) = overrides.assistant_id {
            self.assistant.assistant_id = Some(assistant_id);
        }
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(sink_mode) = overrides.sink_mode {
            self.leads.sink_mode = sink_mode;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_assistant(&self.assistant)?;
        validate_crm(&self.crm)?;
        validate_calendar(&self.calendar)?;
        validate_sheets(&self.sheets)?;
        validate_leads(&self.leads)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("leadbot.toml"), PathBuf::from("config/leadbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{field} must start with http:// or https://")))
    }
}

fn validate_assistant(assistant: &AssistantConfig) -> Result<(), ConfigError> {
    validate_http_url("assistant.base_url", &assistant.base_url)?;

    if assistant.poll_interval_ms == 0 {
        return Err(ConfigError::Validation(
            "assistant.poll_interval_ms must be greater than zero".to_string(),
        ));
    }

    if assistant.run_deadline_secs.saturating_mul(1_000) <= assistant.poll_interval_ms {
        return Err(ConfigError::Validation(
            "assistant.run_deadline_secs must be longer than one poll interval".to_string(),
        ));
    }

    if assistant.request_timeout_secs == 0 || assistant.request_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "assistant.request_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_crm(crm: &CrmConfig) -> Result<(), ConfigError> {
    validate_http_url("crm.base_url", &crm.base_url)?;

    if crm.api_version.trim().is_empty() {
        return Err(ConfigError::Validation("crm.api_version must not be empty".to_string()));
    }

    Ok(())
}

fn validate_calendar(calendar: &CalendarConfig) -> Result<(), ConfigError> {
    if calendar.timezone.parse::<chrono_tz::Tz>().is_err() {
        return Err(ConfigError::Validation(format!(
            "calendar.timezone `{}` is not a known IANA timezone",
            calendar.timezone
        )));
    }

    if calendar.appointment_minutes == 0 || calendar.appointment_minutes > 24 * 60 {
        return Err(ConfigError::Validation(
            "calendar.appointment_minutes must be in range 1..=1440".to_string(),
        ));
    }

    Ok(())
}

fn validate_sheets(sheets: &SheetsConfig) -> Result<(), ConfigError> {
    if !sheets.range.contains('!') {
        return Err(ConfigError::Validation(
            "sheets.range must be an A1 range such as `Sheet1!A:I`".to_string(),
        ));
    }

    Ok(())
}

fn validate_leads(leads: &LeadsConfig) -> Result<(), ConfigError> {
    if leads.photo_cache_ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "leads.photo_cache_ttl_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    for origin in &server.allowed_origins {
        if origin != "*" {
            validate_http_url("server.allowed_origins", origin)?;
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// First non-empty value among `keys`, in order.
fn read_env_any(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| read_env(key))
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    assistant: Option<AssistantPatch>,
    crm: Option<CrmPatch>,
    calendar: Option<CalendarPatch>,
    sheets: Option<SheetsPatch>,
    notifications: Option<NotificationsPatch>,
    leads: Option<LeadsPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct AssistantPatch {
    api_key: Option<String>,
    assistant_id: Option<String>,
    base_url: Option<String>,
    poll_interval_ms: Option<u64>,
    run_deadline_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CrmPatch {
    api_token: Option<String>,
    location_id: Option<String>,
    base_url: Option<String>,
    api_version: Option<String>,
    tags: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct CalendarPatch {
    calendar_id: Option<String>,
    timezone: Option<String>,
    api_version: Option<String>,
    appointment_minutes: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct SheetsPatch {
    spreadsheet_id: Option<String>,
    service_account_json: Option<String>,
    range: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NotificationsPatch {
    slack_webhook_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LeadsPatch {
    sink_mode: Option<LeadSinkMode>,
    photo_cache_ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    allowed_origins: Option<Vec<String>>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
