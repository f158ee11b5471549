use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SERVICE: &str = "Not specified";

/// Normalized lead assembled from tool-call arguments or inbound forms. Built fresh per
/// capture and handed to the CRM and spreadsheet connectors; never stored here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadRecord {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub service: String,
    pub address: Option<String>,
    pub zip: Option<String>,
    pub preferred_date: Option<String>,
    pub preferred_time: Option<String>,
    pub notes: Option<String>,
    pub source: LeadSource,
    pub correlation_id: String,
    pub captured_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadSource {
    Chatbot,
    QuoteForm,
    Webhook,
}

impl LeadSource {
    pub fn label(self) -> &'static str {
        match self {
            Self::Chatbot => "Website Chatbot",
            Self::QuoteForm => "Website Quote Form",
            Self::Webhook => "Lead Intake Webhook",
        }
    }

    pub fn default_tags(self) -> &'static [&'static str] {
        match self {
            Self::Chatbot => &["chatbot-lead", "repair-asap-bot"],
            Self::QuoteForm => &["quote-form", "website-lead"],
            Self::Webhook => &["webhook-lead"],
        }
    }
}

impl LeadRecord {
    pub fn e164_phone(&self) -> String {
        if self.phone.starts_with('+') {
            self.phone.clone()
        } else {
            format!("+1{}", self.phone)
        }
    }

    /// Human-readable multi-line summary used for CRM notes and notifications.
    pub fn summary(&self) -> String {
        let mut lines = vec![format!("Source: {}", self.source.label())];
        lines.push(format!("Name: {}", self.name));
        lines.push(format!("Phone: {}", self.phone));
        if let Some(email) = &self.email {
            lines.push(format!("Email: {email}"));
        }
        lines.push(format!("Service: {}", self.service));
        if let Some(address) = self.full_address() {
            lines.push(format!("Address: {address}"));
        }
        match (&self.preferred_date, &self.preferred_time) {
            (Some(date), Some(time)) => lines.push(format!("Preferred: {date} {time}")),
            (Some(date), None) => lines.push(format!("Preferred date: {date}")),
            (None, Some(time)) => lines.push(format!("Preferred time: {time}")),
            (None, None) => {}
        }
        if let Some(notes) = &self.notes {
            lines.push(format!("Notes: {notes}"));
        }
        lines.join("\n")
    }

    pub fn full_address(&self) -> Option<String> {
        match (&self.address, &self.zip) {
            (Some(address), Some(zip)) if !address.contains(zip.as_str()) => {
                Some(format!("{address} {zip}"))
            }
            (Some(address), _) => Some(address.clone()),
            (None, Some(zip)) => Some(zip.clone()),
            (None, None) => None,
        }
    }
}

/// Canonical phone format: ten national digits for North American numbers
/// (`5551234567`), `+` followed by digits for anything longer. Returns `None` when
/// fewer than ten digits remain.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

    match digits.len() {
        10 => Some(digits),
        11 if digits.starts_with('1') => Some(digits[1..].to_string()),
        11..=15 => Some(format!("+{digits}")),
        _ => None,
    }
}

/// Empty or whitespace-only strings become `None`.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

pub fn is_plausible_email(value: &str) -> bool {
    let value = value.trim();
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !value.chars().any(char::is_whitespace)
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains('@')
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{is_plausible_email, normalize_phone, LeadRecord, LeadSource};

    #[test]
    fn normalizes_common_us_formats() {
        assert_eq!(normalize_phone("5551234567").as_deref(), Some("5551234567"));
        assert_eq!(normalize_phone("(555) 123-4567").as_deref(), Some("5551234567"));
        assert_eq!(normalize_phone("+1 555 123 4567").as_deref(), Some("5551234567"));
        assert_eq!(normalize_phone("1-555-123-4567").as_deref(), Some("5551234567"));
    }

    #[test]
    fn keeps_international_numbers_with_plus() {
        assert_eq!(normalize_phone("+44 20 7946 0958").as_deref(), Some("+442079460958"));
    }

    #[test]
    fn rejects_short_or_empty_numbers() {
        assert_eq!(normalize_phone(""), None);
        assert_eq!(normalize_phone("555-1234"), None);
        assert_eq!(normalize_phone("call me"), None);
    }

    #[test]
    fn email_check_accepts_simple_addresses_only() {
        assert!(is_plausible_email("jane@example.com"));
        assert!(!is_plausible_email("jane@example"));
        assert!(!is_plausible_email("jane example@example.com"));
        assert!(!is_plausible_email("@example.com"));
    }

    #[test]
    fn summary_lists_known_fields() {
        let lead = LeadRecord {
            name: "Jane Doe".to_string(),
            phone: "5551234567".to_string(),
            email: None,
            service: "TV mount".to_string(),
            address: Some("1 Main St".to_string()),
            zip: Some("11374".to_string()),
            preferred_date: Some("2026-03-01".to_string()),
            preferred_time: None,
            notes: None,
            source: LeadSource::Chatbot,
            correlation_id: "req-1".to_string(),
            captured_at: Utc::now(),
        };

        let summary = lead.summary();
        assert!(summary.contains("Name: Jane Doe"));
        assert!(summary.contains("Address: 1 Main St 11374"));
        assert!(summary.contains("Preferred date: 2026-03-01"));
        assert!(!summary.contains("Email"));
        assert_eq!(lead.e164_phone(), "+15551234567");
    }
}
