//! OpenAI-compatible `chat/completions` client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{CompletionClient, CompletionRequest, LlmError};
use crate::config::{HttpConfig, LlmConfig};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    enable_thinking: Option<bool>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for any provider speaking the OpenAI chat-completions dialect
#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    reasoning_flag: bool,
}

impl OpenAiCompatClient {
    pub fn new(
        client: Client,
        base_url: &str,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.into(),
            api_key: api_key.into(),
            reasoning_flag: false,
        }
    }

    /// Send `enable_thinking` with every request
    pub fn with_reasoning_flag(mut self, enabled: bool) -> Self {
        self.reasoning_flag = enabled;
        self
    }

    /// Build from config with a dedicated HTTP client.
    ///
    /// `http.timeout_seconds` is not applied here: each call is bounded by its
    /// own [`CompletionRequest::timeout`] instead.
    pub fn from_config(config: &LlmConfig, http: &HttpConfig) -> Result<Self, LlmError> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(LlmError::NotConfigured)?;

        let client = completion_http_client(http)?;
        Ok(Self::new(client, config.endpoint_base(), config.model_name(), api_key)
            .with_reasoning_flag(config.provider.supports_reasoning_flag()))
    }

    async fn send(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                Message {
                    role: "system",
                    content: &request.system,
                },
                Message {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            enable_thinking: self.reasoning_flag.then_some(request.reasoning),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: text.chars().take(300).collect(),
            });
        }

        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|e| LlmError::Malformed(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| LlmError::Malformed("no choices[0].message.content".to_string()))
    }
}

fn completion_http_client(http: &HttpConfig) -> Result<Client, LlmError> {
    let user_agent = http.user_agent.clone().unwrap_or_else(|| {
        concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()
    });

    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .map_err(|e| LlmError::Http(format!("Failed to create HTTP client: {}", e)))
}

#[async_trait]
impl CompletionClient for OpenAiCompatClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        tracing::debug!(
            "POST {} (max_tokens={}, reasoning={})",
            self.endpoint,
            request.max_tokens,
            request.reasoning
        );
        tokio::time::timeout(request.timeout, self.send(request))
            .await
            .map_err(|_| LlmError::Timeout(request.timeout))?
    }
}
