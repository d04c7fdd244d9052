//! Digest notifications to the enterprise messaging platform.
//!
//! Delivery goes through an HTTP relay with a fixed egress IP when one is
//! configured ([`RelayNotifier`]), otherwise straight to the messaging API
//! ([`DirectNotifier`]). Both report per-message outcomes in the same shape.

mod digest;
mod direct;
mod relay;

pub use digest::{compose_digest, CONTENT_BUDGET};
pub use direct::DirectNotifier;
pub use relay::RelayNotifier;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::RelayConfig;

/// A markdown application message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub touser: String,
    pub msgtype: String,
    pub agentid: i64,
    pub markdown: MarkdownBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkdownBody {
    pub content: String,
}

impl OutgoingMessage {
    pub fn markdown(to_user: impl Into<String>, agent_id: i64, content: impl Into<String>) -> Self {
        Self {
            touser: to_user.into(),
            msgtype: "markdown".to_string(),
            agentid: agent_id,
            markdown: MarkdownBody {
                content: content.into(),
            },
        }
    }
}

/// Outcome of one message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryResult {
    pub index: usize,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate outcome of a send
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyReport {
    pub success: usize,
    pub fail: usize,
    #[serde(default)]
    pub results: Vec<DeliveryResult>,
}

impl NotifyReport {
    pub fn push(&mut self, index: usize, result: Result<(), String>) {
        match result {
            Ok(()) => {
                self.success += 1;
                self.results.push(DeliveryResult {
                    index,
                    ok: true,
                    error: None,
                });
            }
            Err(error) => {
                self.fail += 1;
                self.results.push(DeliveryResult {
                    index,
                    ok: false,
                    error: Some(error),
                });
            }
        }
    }
}

/// Errors that prevent a send from happening at all
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notifier not configured: missing {0}")]
    NotConfigured(&'static str),

    #[error("Request failed: {0}")]
    Http(String),

    #[error("Endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Messaging API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Relay is unhealthy: {0}")]
    Unhealthy(String),
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        NotifyError::Http(err.to_string())
    }
}

/// Where digest messages are delivered
#[async_trait]
pub trait Notifier: Send + Sync + std::fmt::Debug {
    async fn send(&self, messages: &[OutgoingMessage]) -> Result<NotifyReport, NotifyError>;

    async fn health(&self) -> Result<(), NotifyError>;
}

/// Pick the relay when a URL is configured, direct delivery otherwise.
pub fn notifier_from_config(
    config: &RelayConfig,
    client: reqwest::Client,
) -> Result<Box<dyn Notifier>, NotifyError> {
    match config.url.as_deref().filter(|u| !u.trim().is_empty()) {
        Some(_) => Ok(Box::new(RelayNotifier::from_config(config, client)?)),
        None => Ok(Box::new(DirectNotifier::from_config(config, client)?)),
    }
}

pub(crate) fn required<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str, NotifyError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(NotifyError::NotConfigured(name))
}
