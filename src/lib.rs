//! # robodaily
//!
//! Daily robotics paper digest: scrape a paper listing, filter it for relevance
//! through an OpenAI-compatible completion service, summarize each paper from its
//! full text, persist the dataset as JSON and relay a digest to a messaging
//! platform.
//!
//! ## Architecture
//!
//! - [`config`]: Configuration value object (file + environment)
//! - [`models`]: Paper records, listing candidates, snapshot envelopes
//! - [`sources`]: Identifier normalization, listing scraper, content extraction
//! - [`llm`]: Completion-service clients
//! - [`pipeline`]: Batch runner, relevance filter, summarizer, orchestrator
//! - [`store`]: Incremental dataset store and relevance cache
//! - [`notify`]: Digest composition and delivery
//! - [`ui`]: Terminal output
//! - [`utils`]: HTTP client, retry, PDF text, text helpers

pub mod config;
pub mod llm;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod sources;
pub mod store;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use models::PaperRecord;
pub use pipeline::{Pipeline, RunReport};
pub use sources::{normalize_identifier, PaperSource};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
