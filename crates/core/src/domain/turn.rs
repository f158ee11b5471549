use serde::{Deserialize, Serialize};

use crate::domain::lead::LeadRecord;
use crate::domain::run::ThreadId;

/// Inbound content for one turn: text, an image, or both.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContent {
    pub text: Option<String>,
    pub image: Option<ImagePayload>,
}

impl UserContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), image: None }
    }

    pub fn is_empty(&self) -> bool {
        self.text.as_deref().map(str::trim).unwrap_or_default().is_empty() && self.image.is_none()
    }
}

/// An image reference. `url` may be an https URL or a `data:` URI.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    pub url: String,
    #[serde(default)]
    pub caption: Option<String>,
}

/// Free-form caller context such as the current page or the inbound channel.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnContext {
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub correlation_id: String,
}

impl TurnContext {
    pub fn instructions(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(channel) = self.channel.as_deref().filter(|value| !value.trim().is_empty()) {
            parts.push(format!("Channel: {channel}."));
        }
        if let Some(page) = self.page.as_deref().filter(|value| !value.trim().is_empty()) {
            parts.push(format!("The customer is viewing {page}."));
        }
        (!parts.is_empty()).then(|| parts.join(" "))
    }
}

/// Fields the website widget may pre-fill into its quote form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormPrefill {
    pub name: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl From<&LeadRecord> for FormPrefill {
    fn from(lead: &LeadRecord) -> Self {
        Self {
            name: lead.name.clone(),
            phone: lead.phone.clone(),
            email: lead.email.clone(),
            service: lead.service.clone(),
            address: lead.full_address(),
            date: lead.preferred_date.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum StructuredAction {
    #[serde(rename = "FILL_FORM")]
    FillForm(FormPrefill),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnResult {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<StructuredAction>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnOutcome {
    pub thread_id: ThreadId,
    pub result: TurnResult,
}
