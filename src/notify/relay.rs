//! Client for the allowlisted messaging relay.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{required, Notifier, NotifyError, NotifyReport, OutgoingMessage};
use crate::config::RelayConfig;

#[derive(Serialize)]
struct RelayRequest<'a> {
    corpid: &'a str,
    corpsecret: &'a str,
    messages: &'a [OutgoingMessage],
}

#[derive(Deserialize)]
struct HealthResponse {
    #[serde(default)]
    status: String,
}

/// Forwards messages through `POST {relay}/relay` with a bearer token
#[derive(Clone)]
pub struct RelayNotifier {
    client: Client,
    base: String,
    token: String,
    corp_id: String,
    corp_secret: String,
}

impl std::fmt::Debug for RelayNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayNotifier")
            .field("base", &self.base)
            .field("corp_id", &self.corp_id)
            .finish_non_exhaustive()
    }
}

impl RelayNotifier {
    pub fn new(
        client: Client,
        base: &str,
        token: impl Into<String>,
        corp_id: impl Into<String>,
        corp_secret: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base: base.trim_end_matches('/').to_string(),
            token: token.into(),
            corp_id: corp_id.into(),
            corp_secret: corp_secret.into(),
        }
    }

    pub fn from_config(config: &RelayConfig, client: Client) -> Result<Self, NotifyError> {
        Ok(Self::new(
            client,
            required(&config.url, "relay url")?,
            required(&config.token, "relay token")?,
            required(&config.corp_id, "corp_id")?,
            required(&config.corp_secret, "corp_secret")?,
        ))
    }
}

#[async_trait]
impl Notifier for RelayNotifier {
    async fn send(&self, messages: &[OutgoingMessage]) -> Result<NotifyReport, NotifyError> {
        let url = format!("{}/relay", self.base);
        tracing::debug!("POST {} ({} messages)", url, messages.len());

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&RelayRequest {
                corpid: &self.corp_id,
                corpsecret: &self.corp_secret,
                messages,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body: body.chars().take(300).collect(),
            });
        }
        serde_json::from_str(&body).map_err(|e| NotifyError::Malformed(e.to_string()))
    }

    async fn health(&self) -> Result<(), NotifyError> {
        let url = format!("{}/health", self.base);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body: String::new(),
            });
        }

        let health: HealthResponse = response
            .json()
            .await
            .map_err(|e| NotifyError::Malformed(e.to_string()))?;
        if health.status == "ok" {
            Ok(())
        } else {
            Err(NotifyError::Unhealthy(health.status))
        }
    }
}
