//! HTTP client utilities.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::Client;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use crate::config::HttpConfig;
use crate::sources::SourceError;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Shared HTTP client with sensible defaults and optional politeness limiting
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
    limiter: Option<Arc<DirectLimiter>>,
}

impl HttpClient {
    /// Create a client from the HTTP section of the configuration
    pub fn new(config: &HttpConfig) -> Result<Self, SourceError> {
        let user_agent = config.user_agent.clone().unwrap_or_else(|| {
            concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()
        });

        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| SourceError::Other(format!("Failed to create HTTP client: {}", e)))?;

        let limiter = config
            .requests_per_second
            .and_then(NonZeroU32::new)
            .map(|rps| {
                let quota = Quota::per_second(rps).allow_burst(nonzero!(2u32));
                Arc::new(RateLimiter::direct(quota))
            });

        Ok(Self {
            client: Arc::new(client),
            limiter,
        })
    }

    /// Create from an existing reqwest Client, without rate limiting
    pub fn from_client(client: Arc<Client>) -> Self {
        Self {
            client,
            limiter: None,
        }
    }

    /// Get the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Wait for the rate limiter, if any
    async fn throttle(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    /// GET a page body as text, failing on non-2xx statuses
    pub async fn get_text(&self, url: &str) -> Result<String, SourceError> {
        let response = self.get_checked(url).await?;
        response
            .text()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to read {}: {}", url, e)))
    }

    /// GET a body as raw bytes, failing on non-2xx statuses
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        let response = self.get_checked(url).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to read {}: {}", url, e)))?;
        Ok(bytes.to_vec())
    }

    async fn get_checked(&self, url: &str) -> Result<reqwest::Response, SourceError> {
        self.throttle().await;
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to fetch {}: {}", url, e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimit);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(SourceError::Api(format!("{} returned status: {}", url, status)));
        }
        Ok(response)
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::from_client(Arc::new(Client::new()))
    }
}
