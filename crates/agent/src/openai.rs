//! HTTP client for the OpenAI Assistants (v2) API.

use std::time::Duration;

use async_trait::async_trait;
use leadbot_core::config::AssistantConfig;
use leadbot_core::domain::run::{
    MessageRole, Run, RunId, RunStatus, ThreadId, ThreadMessage, ToolCall, ToolOutput,
};
use leadbot_core::domain::turn::UserContent;
use reqwest::{Client, RequestBuilder, Response, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::assistant::{AssistantClient, AssistantError};

const BETA_HEADER: &str = "assistants=v2";

pub struct OpenAiAssistantClient {
    client: Client,
    base_url: Url,
    api_key: SecretString,
    assistant_id: String,
}

impl OpenAiAssistantClient {
    /// Returns `None` when the key or the assistant id is missing.
    pub fn from_config(config: &AssistantConfig) -> Result<Option<Self>, AssistantError> {
        let (Some(api_key), Some(assistant_id)) =
            (config.api_key.clone(), config.assistant_id.clone())
        else {
            return Ok(None);
        };
        if !config.is_configured() {
            return Ok(None);
        }

        let base_url = Url::parse(config.base_url.trim_end_matches('/'))
            .map_err(|error| AssistantError::Transport(format!("invalid base url: {error}")))?;
        if base_url.cannot_be_a_base() {
            return Err(AssistantError::Transport("invalid base url: not a base".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|error| AssistantError::Transport(error.to_string()))?;

        Ok(Some(Self {
            client,
            base_url,
            api_key,
            assistant_id,
        }))
    }

    /// Each segment is percent-encoded on its own, so ids can never add path levels
    /// or a query string.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(self.api_key.expose_secret())
            .header("OpenAI-Beta", BETA_HEADER)
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, AssistantError> {
        let response = self
            .authed(builder)
            .send()
            .await
            .map_err(|error| AssistantError::Transport(error.to_string()))?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, AssistantError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AssistantError::Rejected { status: status.as_u16(), body });
    }
    response.json::<T>().await.map_err(|error| AssistantError::Decode(error.to_string()))
}

#[async_trait]
impl AssistantClient for OpenAiAssistantClient {
    async fn create_thread(&self) -> Result<ThreadId, AssistantError> {
        let created: IdOnly =
            self.send(self.client.post(self.url(&["threads"])).json(&json!({}))).await?;
        Ok(ThreadId(created.id))
    }

    async fn append_message(
        &self,
        thread_id: &ThreadId,
        content: &UserContent,
    ) -> Result<(), AssistantError> {
        let body = json!({ "role": "user", "content": message_content(content) });
        let url = self.url(&["threads", thread_id.as_str(), "messages"]);
        let _: IdOnly = self.send(self.client.post(url).json(&body)).await?;
        Ok(())
    }

    async fn start_run(
        &self,
        thread_id: &ThreadId,
        instructions: Option<&str>,
    ) -> Result<Run, AssistantError> {
        let request = StartRunRequest {
            assistant_id: &self.assistant_id,
            additional_instructions: instructions,
        };
        let url = self.url(&["threads", thread_id.as_str(), "runs"]);
        let run: WireRun = self.send(self.client.post(url).json(&request)).await?;
        Ok(run.into_run(thread_id))
    }

    async fn get_run(&self, thread_id: &ThreadId, run_id: &RunId) -> Result<Run, AssistantError> {
        let url = self.url(&["threads", thread_id.as_str(), "runs", run_id.as_str()]);
        let run: WireRun = self.send(self.client.get(url)).await?;
        Ok(run.into_run(thread_id))
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &ThreadId,
        run_id: &RunId,
        outputs: &[ToolOutput],
    ) -> Result<Run, AssistantError> {
        let url = self.url(&[
            "threads",
            thread_id.as_str(),
            "runs",
            run_id.as_str(),
            "submit_tool_outputs",
        ]);
        let body = json!({ "tool_outputs": outputs });
        let run: WireRun = self.send(self.client.post(url).json(&body)).await?;
        Ok(run.into_run(thread_id))
    }

    async fn cancel_run(
        &self,
        thread_id: &ThreadId,
        run_id: &RunId,
    ) -> Result<(), AssistantError> {
        let url = self.url(&["threads", thread_id.as_str(), "runs", run_id.as_str(), "cancel"]);
        let _: WireRun = self.send(self.client.post(url).json(&json!({}))).await?;
        Ok(())
    }

    async fn list_messages(
        &self,
        thread_id: &ThreadId,
        limit: u32,
    ) -> Result<Vec<ThreadMessage>, AssistantError> {
        let url = self.url(&["threads", thread_id.as_str(), "messages"]);
        let limit = limit.clamp(1, 100).to_string();
        let page: MessagePage = self
            .send(self.client.get(url).query(&[("limit", limit.as_str()), ("order", "desc")]))
            .await?;
        Ok(page.data.into_iter().map(WireMessage::into_message).collect())
    }
}

/// Text-only content goes as a plain string; images become `image_url` parts.
fn message_content(content: &UserContent) -> Value {
    let text = content.text.as_deref().map(str::trim).filter(|text| !text.is_empty());
    let Some(image) = &content.image else {
        return Value::String(text.unwrap_or_default().to_string());
    };

    let mut parts = Vec::new();
    let caption = text.or(image.caption.as_deref()).unwrap_or("The customer sent a photo.");
    parts.push(json!({ "type": "text", "text": caption }));
    parts.push(json!({ "type": "image_url", "image_url": { "url": image.url } }));
    Value::Array(parts)
}

#[derive(Serialize)]
struct StartRunRequest<'a> {
    assistant_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    additional_instructions: Option<&'a str>,
}

#[derive(Deserialize)]
struct IdOnly {
    id: String,
}

#[derive(Deserialize)]
struct WireRun {
    id: String,
    status: RunStatus,
    #[serde(default)]
    required_action: Option<WireRequiredAction>,
    #[serde(default)]
    last_error: Option<WireLastError>,
}

#[derive(Deserialize)]
struct WireRequiredAction {
    submit_tool_outputs: WireSubmitToolOutputs,
}

#[derive(Deserialize)]
struct WireSubmitToolOutputs {
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize)]
struct WireLastError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl WireRun {
    fn into_run(self, thread_id: &ThreadId) -> Run {
        let calls = self
            .required_action
            .map(|action| action.submit_tool_outputs.tool_calls)
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCall {
                id: call.id,
                name: call.function.name,
                arguments: call.function.arguments,
            })
            .collect();

        let mut run = Run::new(self.id, thread_id.clone(), self.status).with_tool_calls(calls);
        run.last_error = self.last_error.map(|error| match (error.code, error.message) {
            (Some(code), Some(message)) => format!("{code}: {message}"),
            (Some(code), None) => code,
            (None, Some(message)) => message,
            (None, None) => "unknown".to_string(),
        });
        run
    }
}

#[derive(Deserialize)]
struct MessagePage {
    #[serde(default)]
    data: Vec<WireMessage>,
}

#[derive(Deserialize)]
struct WireMessage {
    role: MessageRole,
    #[serde(default)]
    run_id: Option<String>,
    #[serde(default)]
    content: Vec<WireContent>,
}

#[derive(Deserialize)]
struct WireContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<WireText>,
}

#[derive(Deserialize)]
struct WireText {
    value: String,
}

impl WireMessage {
    fn into_message(self) -> ThreadMessage {
        let text = self
            .content
            .into_iter()
            .filter(|part| part.kind == "text")
            .filter_map(|part| part.text.map(|text| text.value))
            .next();
        ThreadMessage { role: self.role, run_id: self.run_id.map(RunId), text }
    }
}
