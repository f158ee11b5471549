//! GoHighLevel-compatible CRM connector.
//!
//! Contacts are upserted by phone/email under the configured location. Notes carry lead
//! summaries and chat transcripts. The calendar connector shares [`GhlClient`].

use std::time::Duration;

use async_trait::async_trait;
use leadbot_core::config::CrmConfig;
use leadbot_core::connectors::{ConnectorError, CrmConnector, CrmContact};
use leadbot_core::domain::lead::{LeadRecord, LeadSource};
use reqwest::{Client, Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

/// Authenticated access to the LeadConnector REST API.
#[derive(Clone)]
pub struct GhlClient {
    client: Client,
    base_url: String,
    token: SecretString,
    location_id: String,
}

impl GhlClient {
    pub fn from_config(config: &CrmConfig, timeout: Duration) -> Result<Option<Self>, ConnectorError> {
        let (Some(token), Some(location_id)) = (config.api_token.clone(), config.location_id.clone())
        else {
            return Ok(None);
        };
        if !config.is_configured() {
            return Ok(None);
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| ConnectorError::Transport(error.to_string()))?;
        Ok(Some(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
            location_id,
        }))
    }

    pub fn location_id(&self) -> &str {
        &self.location_id
    }

    pub fn request(&self, method: Method, path: &str, version: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        self.client
            .request(method, url)
            .bearer_auth(self.token.expose_secret())
            .header("Version", version)
            .header("Accept", "application/json")
    }
}

pub async fn send_json(builder: RequestBuilder) -> Result<Value, ConnectorError> {
    let response =
        builder.send().await.map_err(|error| ConnectorError::Transport(error.to_string()))?;
    read_json(response).await
}

async fn read_json(response: Response) -> Result<Value, ConnectorError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ConnectorError::Rejected { status: status.as_u16(), body });
    }
    let text = response.text().await.map_err(|error| ConnectorError::Decode(error.to_string()))?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|error| ConnectorError::Decode(error.to_string()))
}

pub struct GhlCrmConnector {
    api: GhlClient,
    api_version: String,
    chatbot_tags: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpsertContactBody<'a> {
    first_name: &'a str,
    phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    address1: Option<String>,
    location_id: &'a str,
    tags: Vec<String>,
    source: String,
}

impl GhlCrmConnector {
    pub fn new(api: GhlClient, config: &CrmConfig) -> Self {
        Self { api, api_version: config.api_version.clone(), chatbot_tags: config.tags.clone() }
    }

    /// Chatbot leads carry the configured tags; forms and webhooks keep their own.
    fn tags_for(&self, source: LeadSource) -> Vec<String> {
        match source {
            LeadSource::Chatbot => self.chatbot_tags.clone(),
            other => other.default_tags().iter().map(|tag| tag.to_string()).collect(),
        }
    }
}

#[async_trait]
impl CrmConnector for GhlCrmConnector {
    async fn upsert_contact(&self, lead: &LeadRecord) -> Result<CrmContact, ConnectorError> {
        let body = UpsertContactBody {
            first_name: &lead.name,
            phone: lead.e164_phone(),
            email: lead.email.as_deref(),
            address1: lead.full_address(),
            location_id: self.api.location_id(),
            tags: self.tags_for(lead.source),
            source: format!("Service: {}", lead.service),
        };
        let value = send_json(
            self.api.request(Method::POST, "contacts/upsert", &self.api_version).json(&body),
        )
        .await?;

        let contact = parse_upsert(&value);
        info!(
            event_name = "crm.contact.upserted",
            correlation_id = %lead.correlation_id,
            contact_id = contact.contact_id.as_deref().unwrap_or("unknown"),
            is_new = contact.is_new,
            "crm contact upserted"
        );
        Ok(contact)
    }

    async fn add_note(&self, contact_id: &str, body: &str) -> Result<(), ConnectorError> {
        let path = format!("contacts/{contact_id}/notes");
        send_json(
            self.api
                .request(Method::POST, &path, &self.api_version)
                .json(&serde_json::json!({ "body": body })),
        )
        .await?;
        Ok(())
    }
}

fn parse_upsert(value: &Value) -> CrmContact {
    let contact_id = value
        .pointer("/contact/id")
        .or_else(|| value.get("id"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let is_new = value.get("new").and_then(Value::as_bool).unwrap_or(false);
    CrmContact { contact_id, is_new }
}
