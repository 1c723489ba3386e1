//! Assistant service boundary and its OpenAI HTTP implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::types::{
    Assistant, CreateMessageRequest, CreateRunRequest, ListResponse, Message, MessageRole, Run,
    Thread,
};
use crate::error::BridgeError;
use crate::session::ThreadId;
use crate::Result;

/// Default OpenAI API root.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default per-request timeout for calls to the assistant service.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const BETA_HEADER: &str = "OpenAI-Beta";
const BETA_VALUE: &str = "assistants=v2";

/// Operations the conversation driver consumes from the assistant service.
///
/// Implementations report transport and protocol failures as errors; they
/// never retry.
#[async_trait]
pub trait AssistantService: Send + Sync {
    /// Fetch an assistant by id.
    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<Assistant>;

    /// Create an empty thread.
    async fn create_thread(&self) -> Result<Thread>;

    /// Fetch an existing thread.
    async fn retrieve_thread(&self, thread: &ThreadId) -> Result<Thread>;

    /// Append a message to a thread.
    async fn create_message(
        &self,
        thread: &ThreadId,
        role: MessageRole,
        content: &str,
    ) -> Result<Message>;

    /// Start a run of `assistant_id` against a thread.
    async fn create_run(&self, thread: &ThreadId, assistant_id: &str) -> Result<Run>;

    /// Fetch the current state of a run.
    async fn retrieve_run(&self, thread: &ThreadId, run_id: &str) -> Result<Run>;

    /// List thread messages, newest first.
    async fn list_messages(&self, thread: &ThreadId) -> Result<Vec<Message>>;
}

/// [`AssistantService`] backed by the OpenAI Assistants REST API.
#[derive(Debug, Clone)]
pub struct OpenAiAssistants {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiAssistants {
    /// Create a client with the default base URL and timeout.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_options(api_key, DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a client against a custom API root, e.g. a proxy or a test server.
    pub fn with_options(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request
            .bearer_auth(&self.api_key)
            .header(BETA_HEADER, BETA_VALUE)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::Api {
                status: status.as_u16(),
                message: error_message(&body, status.canonical_reason()),
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| BridgeError::Decode(e.to_string()))
    }
}

#[async_trait]
impl AssistantService for OpenAiAssistants {
    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<Assistant> {
        self.send(self.client.get(self.url(&format!("assistants/{assistant_id}"))))
            .await
    }

    async fn create_thread(&self) -> Result<Thread> {
        let thread: Thread = self
            .send(self.client.post(self.url("threads")).json(&serde_json::json!({})))
            .await?;
        debug!(thread = %thread.id, "created thread");
        Ok(thread)
    }

    async fn retrieve_thread(&self, thread: &ThreadId) -> Result<Thread> {
        self.send(self.client.get(self.url(&format!("threads/{thread}"))))
            .await
    }

    async fn create_message(
        &self,
        thread: &ThreadId,
        role: MessageRole,
        content: &str,
    ) -> Result<Message> {
        let body = CreateMessageRequest { role, content };
        self.send(
            self.client
                .post(self.url(&format!("threads/{thread}/messages")))
                .json(&body),
        )
        .await
    }

    async fn create_run(&self, thread: &ThreadId, assistant_id: &str) -> Result<Run> {
        let body = CreateRunRequest { assistant_id };
        let run: Run = self
            .send(
                self.client
                    .post(self.url(&format!("threads/{thread}/runs")))
                    .json(&body),
            )
            .await?;
        debug!(thread = %thread, run = %run.id, status = %run.status, "created run");
        Ok(run)
    }

    async fn retrieve_run(&self, thread: &ThreadId, run_id: &str) -> Result<Run> {
        self.send(
            self.client
                .get(self.url(&format!("threads/{thread}/runs/{run_id}"))),
        )
        .await
    }

    async fn list_messages(&self, thread: &ThreadId) -> Result<Vec<Message>> {
        let page: ListResponse<Message> = self
            .send(
                self.client
                    .get(self.url(&format!("threads/{thread}/messages")))
                    .query(&[("order", "desc")]),
            )
            .await?;
        Ok(page.data)
    }
}

/// Pull a readable message out of an error body.
///
/// The service wraps errors as `{"error": {"message": ...}}`; anything else
/// is passed through as text.
fn error_message(body: &str, reason: Option<&str>) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = value["error"]["message"].as_str() {
            return message.to_string();
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        reason.unwrap_or("unknown error").to_string()
    } else {
        trimmed.to_string()
    }
}
