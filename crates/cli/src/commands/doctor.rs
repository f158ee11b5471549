use leadbot_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::commands::CommandResult;

const INTEGRATIONS: [&str; 5] = ["assistant", "crm", "calendar", "sheets", "notifications"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

/// Fields the token exchange needs; anything else in the key file is ignored.
#[derive(Deserialize)]
struct ServiceAccountProbe {
    client_email: String,
    private_key: String,
}

/// Exit codes: 0 ready, 1 an integration check failed, 2 config did not load.
pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = match report.overall_status {
        CheckStatus::Pass | CheckStatus::Skipped => 0,
        CheckStatus::Fail if config_failed(&report) => 2,
        CheckStatus::Fail => 1,
    };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn config_failed(report: &DoctorReport) -> bool {
    report
        .checks
        .iter()
        .any(|check| check.name == "config_validation" && check.status == CheckStatus::Fail)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_assistant(&config));
            checks.push(check_crm(&config));
            checks.push(check_calendar(&config));
            checks.push(check_sheets(&config));
            checks.push(check_notifications(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.extend(INTEGRATIONS.into_iter().map(|name| DoctorCheck {
                name,
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            }));
        }
    }

    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: ready to serve chat turns".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

/// The assistant is the only integration the chat cannot run without.
fn check_assistant(config: &AppConfig) -> DoctorCheck {
    if config.assistant.is_configured() {
        DoctorCheck {
            name: "assistant",
            status: CheckStatus::Pass,
            details: format!("assistant credentials present ({})", config.assistant.base_url),
        }
    } else {
        DoctorCheck {
            name: "assistant",
            status: CheckStatus::Fail,
            details: "assistant.api_key and assistant.assistant_id are required for chat turns"
                .to_string(),
        }
    }
}

fn check_crm(config: &AppConfig) -> DoctorCheck {
    if config.crm.is_configured() {
        DoctorCheck {
            name: "crm",
            status: CheckStatus::Pass,
            details: format!("crm credentials present ({})", config.crm.base_url),
        }
    } else {
        not_configured("crm", "lead saves fall back to the spreadsheet")
    }
}

fn check_calendar(config: &AppConfig) -> DoctorCheck {
    if config.calendar.is_configured(&config.crm) {
        DoctorCheck {
            name: "calendar",
            status: CheckStatus::Pass,
            details: format!("calendar configured in {}", config.calendar.timezone),
        }
    } else if config.calendar.calendar_id.is_some() {
        DoctorCheck {
            name: "calendar",
            status: CheckStatus::Fail,
            details: "calendar.calendar_id is set but the crm credentials it needs are missing"
                .to_string(),
        }
    } else {
        not_configured("calendar", "availability and booking tools report an error")
    }
}

fn check_sheets(config: &AppConfig) -> DoctorCheck {
    let Some(credentials) =
        config.sheets.service_account_json.as_ref().filter(|_| config.sheets.is_configured())
    else {
        return not_configured("sheets", "lead rows are not mirrored to the spreadsheet");
    };

    match serde_json::from_str::<ServiceAccountProbe>(credentials.expose_secret()) {
        Ok(probe) if probe.private_key.contains("PRIVATE KEY") => DoctorCheck {
            name: "sheets",
            status: CheckStatus::Pass,
            details: format!("service account {} ({})", probe.client_email, config.sheets.range),
        },
        Ok(_) => DoctorCheck {
            name: "sheets",
            status: CheckStatus::Fail,
            details: "service account private_key is not a PEM key".to_string(),
        },
        Err(error) => DoctorCheck {
            name: "sheets",
            status: CheckStatus::Fail,
            details: format!("service account json is unusable: {error}"),
        },
    }
}

fn check_notifications(config: &AppConfig) -> DoctorCheck {
    let Some(url) = config
        .notifications
        .slack_webhook_url
        .as_ref()
        .filter(|_| config.notifications.is_configured())
    else {
        return not_configured("notifications", "lead alerts are logged only");
    };

    if url.expose_secret().starts_with("https://") {
        DoctorCheck {
            name: "notifications",
            status: CheckStatus::Pass,
            details: "slack webhook configured".to_string(),
        }
    } else {
        DoctorCheck {
            name: "notifications",
            status: CheckStatus::Fail,
            details: "slack webhook url must use https".to_string(),
        }
    }
}

fn not_configured(name: &'static str, consequence: &str) -> DoctorCheck {
    DoctorCheck {
        name,
        status: CheckStatus::Skipped,
        details: format!("not configured; {consequence}"),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
