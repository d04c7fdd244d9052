//! Paper sources: the daily listing, per-paper metadata and full-text content.
//!
//! The [`PaperSource`] trait is the seam between the pipeline and the network.
//! [`ArxivSource`] is the production implementation; [`MockSource`] serves
//! canned data for tests.
//!
//! - [`arxiv`]: identifier normalization, URL helpers, abstract-page metadata
//! - [`listing`]: daily listing table scraper
//! - [`content`]: HTML full-text extraction with PDF fallback

pub mod arxiv;
pub mod content;
pub mod listing;
pub mod mock;

pub use arxiv::{normalize_identifier, ArxivSource};
pub use content::{ContentExtractor, ContentOrigin, ExtractedContent};
pub use mock::MockSource;

use async_trait::async_trait;

use crate::models::{Candidate, PaperRecord};

/// Where papers, their metadata and their content come from.
#[async_trait]
pub trait PaperSource: Send + Sync + std::fmt::Debug {
    /// Human-readable name of the listing this source scrapes
    fn name(&self) -> &str;

    /// Rows of the daily listing, at most `limit`
    async fn listing(&self, limit: usize) -> Result<Vec<Candidate>, SourceError>;

    /// Metadata for a single paper, used when adding a paper by hand
    async fn metadata(&self, identifier: &str) -> Result<PaperRecord, SourceError>;

    /// Best-effort full text and figure URLs; empty content on total failure
    async fn content(&self, identifier: &str) -> ExtractedContent;
}

/// Errors that can occur when interacting with a source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(String),

    /// Parsing error (HTML, JSON, PDF)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimit,

    /// Paper or page not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unexpected status from the remote side
    #[error("API error: {0}")]
    Api(String),

    /// IO error (file system)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("Error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}
