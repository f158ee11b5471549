//! Google Sheets v4 lead log authenticated with a service account.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use chrono_tz::Tz;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use leadbot_core::config::SheetsConfig;
use leadbot_core::connectors::{ConnectorError, SpreadsheetConnector};
use leadbot_core::domain::lead::LeadRecord;
use reqwest::{Client, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::info;

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3_600;
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default)]
    token_uri: Option<String>,
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3_600
}

struct CachedToken {
    token: SecretString,
    refresh_at: Instant,
}

pub struct GoogleSheetsConnector {
    client: Client,
    api_base: String,
    spreadsheet_id: String,
    range: String,
    client_email: String,
    token_uri: String,
    signing_key: EncodingKey,
    timezone: Tz,
    token: Mutex<Option<CachedToken>>,
}

impl GoogleSheetsConnector {
    /// `Ok(None)` when the sheet id or credentials are absent; `Err` when the
    /// credentials are present but unusable.
    pub fn from_config(
        config: &SheetsConfig,
        timezone: &str,
        timeout: Duration,
    ) -> Result<Option<Self>, ConnectorError> {
        let (Some(spreadsheet_id), Some(credentials)) =
            (config.spreadsheet_id.clone(), config.service_account_json.as_ref())
        else {
            return Ok(None);
        };
        if !config.is_configured() {
            return Ok(None);
        }

        let key: ServiceAccountKey = serde_json::from_str(credentials.expose_secret())
            .map_err(|error| ConnectorError::Decode(format!("service account json: {error}")))?;
        let pem = key.private_key.replace("\\n", "\n");
        let signing_key = EncodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|error| ConnectorError::Decode(format!("service account key: {error}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| ConnectorError::Transport(error.to_string()))?;

        Ok(Some(Self {
            client,
            api_base: SHEETS_API_BASE.to_string(),
            spreadsheet_id,
            range: config.range.clone(),
            client_email: key.client_email,
            token_uri: key.token_uri.unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            signing_key,
            timezone: timezone.parse().unwrap_or(chrono_tz::America::New_York),
            token: Mutex::new(None),
        }))
    }

    #[cfg(test)]
    fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    async fn access_token(&self) -> Result<SecretString, ConnectorError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|token| Instant::now() < token.refresh_at) {
            return Ok(token.token.clone());
        }

        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: SHEETS_SCOPE,
            aud: &self.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .map_err(|error| ConnectorError::Decode(format!("could not sign assertion: {error}")))?;

        let response = self
            .client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|error| ConnectorError::Transport(error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::Rejected { status: status.as_u16(), body });
        }
        let token: TokenResponse =
            response.json().await.map_err(|error| ConnectorError::Decode(error.to_string()))?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);
        let secret = SecretString::from(token.access_token);
        *cached = Some(CachedToken { token: secret.clone(), refresh_at: Instant::now() + lifetime });
        Ok(secret)
    }

    fn append_url(&self) -> Result<Url, ConnectorError> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|error| ConnectorError::Decode(format!("sheets api base: {error}")))?;
        url.path_segments_mut()
            .map_err(|_| ConnectorError::Decode("sheets api base cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(["spreadsheets", self.spreadsheet_id.as_str(), "values"])
            .push(&format!("{}:append", self.range));
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED")
            .append_pair("insertDataOption", "INSERT_ROWS");
        Ok(url)
    }

    /// Columns A..I: timestamp, readable created-at, source, name, phone, email,
    /// address, service, notes.
    fn row(&self, lead: &LeadRecord) -> Vec<String> {
        let created_at = lead.captured_at.with_timezone(&self.timezone);
        let mut notes = lead.notes.clone().unwrap_or_default();
        let preferred = [lead.preferred_date.as_deref(), lead.preferred_time.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        if !preferred.is_empty() {
            if !notes.is_empty() {
                notes.push_str("; ");
            }
            notes.push_str(&format!("Preferred: {preferred}"));
        }

        vec![
            lead.captured_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            created_at.format("%b %-d, %Y, %-I:%M %p").to_string(),
            lead.source.label().to_string(),
            lead.name.clone(),
            lead.phone.clone(),
            lead.email.clone().unwrap_or_default(),
            lead.full_address().unwrap_or_default(),
            lead.service.clone(),
            notes,
        ]
    }
}

#[async_trait]
impl SpreadsheetConnector for GoogleSheetsConnector {
    async fn append_lead(&self, lead: &LeadRecord) -> Result<(), ConnectorError> {
        let token = self.access_token().await?;
        let response = self
            .client
            .post(self.append_url()?)
            .bearer_auth(token.expose_secret())
            .json(&json!({ "values": [self.row(lead)] }))
            .send()
            .await
            .map_err(|error| ConnectorError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::Rejected { status: status.as_u16(), body });
        }

        info!(
            event_name = "sheets.row.appended",
            correlation_id = %lead.correlation_id,
            source = lead.source.label(),
            "lead row appended"
        );
        Ok(())
    }
}
