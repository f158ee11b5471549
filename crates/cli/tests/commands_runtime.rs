use std::env;
use std::sync::{Mutex, OnceLock};

use leadbot_cli::commands::{config, doctor};
use serde_json::Value;

const ASSISTANT_ENV: [(&str, &str); 2] =
    [("LEADBOT_ASSISTANT_API_KEY", "sk-test-key"), ("LEADBOT_ASSISTANT_ID", "asst_test")];

#[test]
fn doctor_passes_with_only_the_assistant_configured() {
    with_env(&ASSISTANT_ENV, || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 0, "assistant alone is enough to serve turns");

        let report = parse_payload(&result.output);
        assert_eq!(report["overall_status"], "pass");
        assert_eq!(check(&report, "assistant")["status"], "pass");
        assert_eq!(check(&report, "crm")["status"], "skipped");
        assert_eq!(check(&report, "sheets")["status"], "skipped");
    });
}

#[test]
fn doctor_fails_without_assistant_credentials() {
    with_env(&[], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 1, "missing assistant is an integration failure");

        let report = parse_payload(&result.output);
        assert_eq!(report["overall_status"], "fail");
        assert_eq!(check(&report, "config_validation")["status"], "pass");
        assert_eq!(check(&report, "assistant")["status"], "fail");
    });
}

#[test]
fn doctor_reports_invalid_config_with_exit_code_two() {
    with_env(&[("LEADBOT_LOGGING_LEVEL", "loud")], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let report = parse_payload(&result.output);
        assert_eq!(check(&report, "config_validation")["status"], "fail");
        assert_eq!(check(&report, "calendar")["status"], "skipped");
    });
}

#[test]
fn doctor_flags_unusable_service_account_json() {
    let mut vars = ASSISTANT_ENV.to_vec();
    vars.push(("LEADBOT_SHEETS_SPREADSHEET_ID", "sheet-1"));
    vars.push(("LEADBOT_SHEETS_SERVICE_ACCOUNT_JSON", "{\"client_email\":"));

    with_env(&vars, || {
        let result = doctor::run(false);
        assert_eq!(result.exit_code, 1);
        assert!(result.output.contains("- [fail] sheets: service account json is unusable"));
        assert!(result.output.contains("- [ok] assistant:"));
    });
}

#[test]
fn doctor_flags_calendar_without_crm_credentials() {
    let mut vars = ASSISTANT_ENV.to_vec();
    vars.push(("LEADBOT_CALENDAR_ID", "cal-1"));

    with_env(&vars, || {
        let report = parse_payload(&doctor::run(true).output);
        assert_eq!(check(&report, "calendar")["status"], "fail");
    });
}

#[test]
fn config_attributes_sources_and_redacts_secrets() {
    with_env(
        &[
            ("LEADBOT_CRM_API_TOKEN", "pit-secret-value"),
            ("OPENAI_API_KEY", "sk-from-alias"),
            ("LEADBOT_NOTIFICATIONS_SLACK_WEBHOOK_URL", "https://hooks.example/secret"),
        ],
        || {
            let result = config::run();
            assert_eq!(result.exit_code, 0);

            let output = result.output;
            assert!(output.contains("- crm.api_token = pit-*** (source: env (LEADBOT_CRM_API_TOKEN))"));
            assert!(output.contains("- assistant.api_key = sk-*** (source: env (OPENAI_API_KEY))"));
            assert!(output.contains("- notifications.slack_webhook_url = <redacted>"));
            assert!(output.contains("- server.port = 8080 (source: default)"));
            assert!(output.contains("- assistant.assistant_id = <unset> (source: default)"));
            assert!(!output.contains("secret-value"));
            assert!(!output.contains("hooks.example"));
        },
    );
}

#[test]
fn config_returns_structured_failure_when_invalid() {
    with_env(&[("LEADBOT_SERVER_PORT", "eighty")], || {
        let result = config::run();
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "config");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn check<'a>(report: &'a Value, name: &str) -> &'a Value {
    report["checks"]
        .as_array()
        .and_then(|checks| checks.iter().find(|check| check["name"] == name))
        .unwrap_or_else(|| panic!("doctor report should include `{name}`"))
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "LEADBOT_ASSISTANT_API_KEY",
        "OPENAI_API_KEY",
        "LEADBOT_ASSISTANT_ID",
        "OPENAI_ASSISTANT_ID",
        "LEADBOT_ASSISTANT_BASE_URL",
        "LEADBOT_ASSISTANT_POLL_INTERVAL_MS",
        "LEADBOT_ASSISTANT_RUN_DEADLINE_SECS",
        "LEADBOT_ASSISTANT_REQUEST_TIMEOUT_SECS",
        "LEADBOT_CRM_API_TOKEN",
        "PROSBUDDY_API_TOKEN",
        "LEADBOT_CRM_LOCATION_ID",
        "PROSBUDDY_LOCATION_ID",
        "LEADBOT_CRM_BASE_URL",
        "LEADBOT_CRM_TAGS",
        "LEADBOT_CALENDAR_ID",
        "GHL_CALENDAR_ID",
        "LEADBOT_CALENDAR_TIMEZONE",
        "LEADBOT_CALENDAR_APPOINTMENT_MINUTES",
        "LEADBOT_SHEETS_SPREADSHEET_ID",
        "GOOGLE_SHEET_ID",
        "LEADBOT_SHEETS_SERVICE_ACCOUNT_JSON",
        "GOOGLE_SERVICE_ACCOUNT_CREDENTIALS",
        "LEADBOT_SHEETS_RANGE",
        "LEADBOT_NOTIFICATIONS_SLACK_WEBHOOK_URL",
        "SLACK_WEBHOOK_URL",
        "LEADBOT_LEADS_SINK_MODE",
        "LEADBOT_LEADS_PHOTO_CACHE_TTL_SECS",
        "LEADBOT_SERVER_BIND_ADDRESS",
        "LEADBOT_SERVER_PORT",
        "PORT",
        "LEADBOT_SERVER_ALLOWED_ORIGINS",
        "LEADBOT_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "LEADBOT_LOGGING_LEVEL",
        "LEADBOT_LOG_LEVEL",
        "LOG_LEVEL",
        "LEADBOT_LOGGING_FORMAT",
        "LEADBOT_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
