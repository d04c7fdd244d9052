//! Mock source for testing purposes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::models::{Candidate, PaperRecord, PaperRecordBuilder};
use crate::sources::{ExtractedContent, PaperSource, SourceError};

/// A mock source that serves predefined listings, metadata and content.
#[derive(Debug, Default)]
pub struct MockSource {
    listing: Mutex<Option<Vec<Candidate>>>,
    metadata: Mutex<HashMap<String, PaperRecord>>,
    content: Mutex<HashMap<String, ExtractedContent>>,
    content_requests: Mutex<Vec<String>>,
}

impl MockSource {
    /// Create a new mock source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the listing rows to return. Without one, `listing` fails.
    pub fn set_listing(&self, rows: Vec<Candidate>) {
        let mut guard = self.listing.lock().unwrap();
        *guard = Some(rows);
    }

    /// Register abstract-page metadata for a paper.
    pub fn set_metadata(&self, record: PaperRecord) {
        let mut guard = self.metadata.lock().unwrap();
        guard.insert(record.identifier.clone(), record);
    }

    /// Register extracted content for a paper. Unregistered papers yield empty content.
    pub fn set_content(&self, identifier: &str, content: ExtractedContent) {
        let mut guard = self.content.lock().unwrap();
        guard.insert(identifier.to_string(), content);
    }

    /// Identifiers whose content was requested, in request order.
    pub fn content_requests(&self) -> Vec<String> {
        self.content_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaperSource for MockSource {
    fn name(&self) -> &str {
        "mock://listing"
    }

    async fn listing(&self, limit: usize) -> Result<Vec<Candidate>, SourceError> {
        let guard = self.listing.lock().unwrap();
        match &*guard {
            Some(rows) => Ok(rows.iter().take(limit).cloned().collect()),
            None => Err(SourceError::Network("mock listing unavailable".to_string())),
        }
    }

    async fn metadata(&self, identifier: &str) -> Result<PaperRecord, SourceError> {
        let guard = self.metadata.lock().unwrap();
        guard
            .get(identifier)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(identifier.to_string()))
    }

    async fn content(&self, identifier: &str) -> ExtractedContent {
        self.content_requests
            .lock()
            .unwrap()
            .push(identifier.to_string());
        let guard = self.content.lock().unwrap();
        guard
            .get(identifier)
            .cloned()
            .unwrap_or_else(ExtractedContent::empty)
    }
}

/// Helper function to create a listing row for testing.
pub fn make_candidate(identifier: &str, title: &str) -> Candidate {
    Candidate {
        identifier: identifier.to_string(),
        link: format!("https://arxiv.org/abs/{}", identifier),
        title: title.to_string(),
        authors: "Test Author".to_string(),
        date: "2025-03-03".to_string(),
        category: "Robotics".to_string(),
    }
}

/// Helper function to create a metadata record for testing.
pub fn make_record(identifier: &str, title: &str) -> PaperRecord {
    PaperRecordBuilder::new(identifier)
        .title(title)
        .authors("Test Author")
        .publication_date("2025-03-03")
        .category("Robotics")
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_listing_respects_limit() {
        let source = MockSource::new();
        assert!(source.listing(5).await.is_err());

        source.set_listing(vec![
            make_candidate("2503.00001", "A"),
            make_candidate("2503.00002", "B"),
        ]);
        assert_eq!(source.listing(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_content_records_requests() {
        let source = MockSource::new();
        source.set_content("2503.00001", ExtractedContent::html("body", vec![]));

        assert!(source.content("2503.00001").await.has_text());
        assert!(!source.content("2503.00002").await.has_text());
        assert_eq!(source.content_requests(), vec!["2503.00001", "2503.00002"]);
    }
}
