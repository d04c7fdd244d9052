//! Direct delivery against the messaging API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{required, Notifier, NotifyError, NotifyReport, OutgoingMessage};
use crate::config::RelayConfig;

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
    #[serde(default)]
    access_token: Option<String>,
}

/// Fetches an access token, then sends each message individually
#[derive(Clone)]
pub struct DirectNotifier {
    client: Client,
    api_base: String,
    corp_id: String,
    corp_secret: String,
}

impl std::fmt::Debug for DirectNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectNotifier")
            .field("api_base", &self.api_base)
            .field("corp_id", &self.corp_id)
            .finish_non_exhaustive()
    }
}

impl DirectNotifier {
    pub fn new(
        client: Client,
        api_base: &str,
        corp_id: impl Into<String>,
        corp_secret: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            corp_id: corp_id.into(),
            corp_secret: corp_secret.into(),
        }
    }

    pub fn from_config(config: &RelayConfig, client: Client) -> Result<Self, NotifyError> {
        Ok(Self::new(
            client,
            &config.api_base,
            required(&config.corp_id, "corp_id")?,
            required(&config.corp_secret, "corp_secret")?,
        ))
    }

    async fn access_token(&self) -> Result<String, NotifyError> {
        let url = format!("{}/cgi-bin/gettoken", self.api_base);
        let response = self
            .client
            .get(&url)
            .query(&[("corpid", &self.corp_id), ("corpsecret", &self.corp_secret)])
            .send()
            .await?;
        let body = read_api_response(response).await?;
        body.access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| NotifyError::Malformed("gettoken returned no access_token".to_string()))
    }

    async fn send_one(&self, token: &str, message: &OutgoingMessage) -> Result<(), NotifyError> {
        let url = format!("{}/cgi-bin/message/send", self.api_base);
        let response = self
            .client
            .post(&url)
            .query(&[("access_token", token)])
            .json(message)
            .send()
            .await?;
        read_api_response(response).await.map(|_| ())
    }
}

async fn read_api_response(response: reqwest::Response) -> Result<ApiResponse, NotifyError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(NotifyError::Status {
            status: status.as_u16(),
            body: text.chars().take(300).collect(),
        });
    }
    let body: ApiResponse =
        serde_json::from_str(&text).map_err(|e| NotifyError::Malformed(e.to_string()))?;
    if body.errcode != 0 {
        return Err(NotifyError::Api {
            code: body.errcode,
            message: body.errmsg,
        });
    }
    Ok(body)
}

#[async_trait]
impl Notifier for DirectNotifier {
    async fn send(&self, messages: &[OutgoingMessage]) -> Result<NotifyReport, NotifyError> {
        let token = self.access_token().await?;
        let mut report = NotifyReport::default();
        for (index, message) in messages.iter().enumerate() {
            let result = self.send_one(&token, message).await;
            if let Err(e) = &result {
                tracing::warn!("Message {} failed: {}", index, e);
            }
            report.push(index, result.map_err(|e| e.to_string()));
        }
        Ok(report)
    }

    async fn health(&self) -> Result<(), NotifyError> {
        self.access_token().await.map(|_| ())
    }
}
