//! Completion-service clients.
//!
//! The pipeline only ever sees [`CompletionClient`]: text in, text or failure out.
//! [`OpenAiCompatClient`] talks to any OpenAI-compatible `chat/completions`
//! endpoint; [`ScriptedClient`] answers from a closure for tests.

mod openai;
mod scripted;

pub use openai::OpenAiCompatClient;
pub use scripted::ScriptedClient;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;

/// One system + user exchange
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask for extended reasoning where the provider supports it
    pub reasoning: bool,
    /// Bound on the whole call, including reading the body
    pub timeout: Duration,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: 0.2,
            max_tokens: 512,
            reasoning: false,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn reasoning(mut self, reasoning: bool) -> Self {
        self.reasoning = reasoning;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A text-completion backend. Calls are single attempts.
#[async_trait]
pub trait CompletionClient: Send + Sync + std::fmt::Debug {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

/// Errors from the completion service
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("Completion service is not configured")]
    NotConfigured,

    #[error("Completion request failed: {0}")]
    Http(String),

    #[error("Completion service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed completion response: {0}")]
    Malformed(String),

    #[error("Completion timed out after {0:?}")]
    Timeout(Duration),
}

/// Shared handle to whichever client is configured
pub type SharedClient = Arc<dyn CompletionClient>;

/// Build the configured client, or `None` when LLM features are off.
pub fn client_from_config(config: &Config) -> Result<Option<SharedClient>, LlmError> {
    if !config.llm_is_configured() {
        tracing::info!("Completion service not configured; using fallbacks");
        return Ok(None);
    }
    let client = OpenAiCompatClient::from_config(&config.llm, &config.http)?;
    tracing::info!(
        "Completion service: {} via {}",
        config.llm.model_name(),
        config.llm.endpoint_base()
    );
    Ok(Some(Arc::new(client)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = CompletionRequest::new("sys", "user")
            .temperature(0.0)
            .max_tokens(64)
            .reasoning(true)
            .timeout(Duration::from_secs(5));
        assert_eq!(request.system, "sys");
        assert_eq!(request.max_tokens, 64);
        assert!(request.reasoning);
        assert_eq!(request.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_unconfigured_yields_no_client() {
        let config = Config::default();
        let client = client_from_config(&config).unwrap();
        assert!(client.is_none());
    }
}
