//! Utility modules shared across the pipeline.
//!
//! - [`HttpClient`]: HTTP client with timeouts and optional rate limiting
//! - [`with_retry`]: Execute a source-site request with retry on transient errors
//! - [`extract_text`]: Extract text content from an in-memory PDF
//! - [`collapse_whitespace`] and friends: text shaping for prompts and records
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use robodaily::config::HttpConfig;
//! use robodaily::utils::{source_retry_config, with_retry, HttpClient};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new(&HttpConfig::default())?;
//! let page = with_retry(source_retry_config(), || client.get_text("https://arxiv.org/abs/2503.01078")).await?;
//! # let _ = page;
//! # Ok(())
//! # }
//! ```

mod http;
mod pdf;
mod retry;
mod text;

pub use http::HttpClient;
pub use pdf::{extract_text, extract_text_async, looks_like_pdf, PdfExtractError};
pub use retry::{source_retry_config, with_retry, RetryConfig, TransientError};
pub use text::{clamp_with_ellipsis, collapse_whitespace, truncate_chars};
