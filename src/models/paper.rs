//! Paper records and the listing candidates they are built from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One paper in the dataset, keyed by its canonical arXiv identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperRecord {
    /// Canonical unversioned identifier (primary key)
    pub identifier: String,

    /// Abstract page URL
    #[serde(default)]
    pub source_url: String,

    #[serde(default)]
    pub title: String,

    /// Authors as listed (free text)
    #[serde(default)]
    pub authors: String,

    /// Publication date as listed (free text)
    #[serde(default)]
    pub publication_date: String,

    /// Category label from the listing heading
    #[serde(default)]
    pub category: String,

    #[serde(default)]
    pub short_summary: Option<String>,

    #[serde(default)]
    pub long_summary: Option<String>,

    /// Figure URLs from the full-text rendering
    #[serde(default)]
    pub image_references: Vec<String>,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl PaperRecord {
    /// Create a record with only the identifier and source URL set
    pub fn new(identifier: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            source_url: source_url.into(),
            title: String::new(),
            authors: String::new(),
            publication_date: String::new(),
            category: String::new(),
            short_summary: None,
            long_summary: None,
            image_references: Vec::new(),
            tags: BTreeSet::new(),
            last_updated: None,
        }
    }

    /// Both summaries are present and non-empty.
    pub fn is_enriched(&self) -> bool {
        has_text(&self.short_summary) && has_text(&self.long_summary)
    }

    /// Merge `incoming` into `self`, field by field.
    ///
    /// Text metadata and images are replaced only by non-empty incoming values,
    /// summaries only by non-empty `Some`, tags are unioned. `last_updated` is set
    /// to `now` when anything changed. Returns whether anything changed.
    pub fn merge_from(&mut self, incoming: PaperRecord, now: DateTime<Utc>) -> bool {
        debug_assert_eq!(self.identifier, incoming.identifier);
        let mut changed = false;

        changed |= take_text(&mut self.source_url, incoming.source_url);
        changed |= take_text(&mut self.title, incoming.title);
        changed |= take_text(&mut self.authors, incoming.authors);
        changed |= take_text(&mut self.publication_date, incoming.publication_date);
        changed |= take_text(&mut self.category, incoming.category);
        changed |= take_summary(&mut self.short_summary, incoming.short_summary);
        changed |= take_summary(&mut self.long_summary, incoming.long_summary);

        if !incoming.image_references.is_empty()
            && incoming.image_references != self.image_references
        {
            self.image_references = incoming.image_references;
            changed = true;
        }

        for tag in incoming.tags {
            changed |= self.tags.insert(tag);
        }

        if changed {
            self.last_updated = Some(now);
        }
        changed
    }

    /// Project to the lightweight index shape
    pub fn to_index_entry(&self) -> IndexEntry {
        IndexEntry {
            identifier: self.identifier.clone(),
            source_url: self.source_url.clone(),
            title: self.title.clone(),
            authors: self.authors.clone(),
            publication_date: self.publication_date.clone(),
            category: self.category.clone(),
            short_summary: self.short_summary.clone(),
            tags: self.tags.clone(),
            last_updated: self.last_updated,
        }
    }
}

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}

fn take_text(current: &mut String, incoming: String) -> bool {
    if incoming.trim().is_empty() || *current == incoming {
        return false;
    }
    *current = incoming;
    true
}

fn take_summary(current: &mut Option<String>, incoming: Option<String>) -> bool {
    match incoming {
        Some(text) if !text.trim().is_empty() && current.as_deref() != Some(text.as_str()) => {
            *current = Some(text);
            true
        }
        _ => false,
    }
}

/// Index projection of a [`PaperRecord`] (strict field subset)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub identifier: String,
    pub source_url: String,
    pub title: String,
    pub authors: String,
    pub publication_date: String,
    pub category: String,
    pub short_summary: Option<String>,
    pub tags: BTreeSet<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// A row scraped from the daily listing, already normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub identifier: String,
    /// Link exactly as it appeared in the listing
    pub link: String,
    pub title: String,
    pub authors: String,
    pub date: String,
    pub category: String,
}

impl Candidate {
    /// Start a dataset record from this listing row
    pub fn to_record(&self) -> PaperRecord {
        PaperRecordBuilder::new(&self.identifier)
            .title(&self.title)
            .authors(&self.authors)
            .publication_date(&self.date)
            .category(&self.category)
            .build()
    }
}

/// Builder for constructing [`PaperRecord`] values
#[derive(Debug, Clone)]
pub struct PaperRecordBuilder {
    record: PaperRecord,
}

impl PaperRecordBuilder {
    /// New builder; the source URL defaults to the canonical abstract page.
    pub fn new(identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        let source_url = crate::sources::arxiv::abs_url(&identifier);
        Self {
            record: PaperRecord::new(identifier, source_url),
        }
    }

    pub fn source_url(mut self, url: impl Into<String>) -> Self {
        self.record.source_url = url.into();
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.record.title = title.into();
        self
    }

    pub fn authors(mut self, authors: impl Into<String>) -> Self {
        self.record.authors = authors.into();
        self
    }

    pub fn publication_date(mut self, date: impl Into<String>) -> Self {
        self.record.publication_date = date.into();
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.record.category = category.into();
        self
    }

    pub fn short_summary(mut self, summary: impl Into<String>) -> Self {
        self.record.short_summary = Some(summary.into());
        self
    }

    pub fn long_summary(mut self, summary: impl Into<String>) -> Self {
        self.record.long_summary = Some(summary.into());
        self
    }

    pub fn images(mut self, images: Vec<String>) -> Self {
        self.record.image_references = images;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.record.tags.insert(tag.into());
        self
    }

    pub fn build(self) -> PaperRecord {
        self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_builder_defaults_source_url() {
        let record = PaperRecordBuilder::new("2503.01078").title("Grasping").build();
        assert_eq!(record.source_url, "https://arxiv.org/abs/2503.01078");
        assert!(!record.is_enriched());
    }

    #[test]
    fn test_is_enriched_requires_both_summaries() {
        let partial = PaperRecordBuilder::new("2503.01078")
            .short_summary("short")
            .build();
        assert!(!partial.is_enriched());

        let blank = PaperRecordBuilder::new("2503.01078")
            .short_summary("short")
            .long_summary("   ")
            .build();
        assert!(!blank.is_enriched());

        let full = PaperRecordBuilder::new("2503.01078")
            .short_summary("short")
            .long_summary("long")
            .build();
        assert!(full.is_enriched());
    }

    #[test]
    fn test_merge_keeps_existing_when_incoming_is_empty() {
        let mut existing = PaperRecordBuilder::new("2503.01078")
            .title("Original")
            .short_summary("kept")
            .images(vec!["https://x/1.png".to_string()])
            .tag("manipulation")
            .build();

        let incoming = PaperRecordBuilder::new("2503.01078")
            .title("")
            .tag("grasping")
            .build();

        assert!(existing.merge_from(incoming, ts(10)));
        assert_eq!(existing.title, "Original");
        assert_eq!(existing.short_summary.as_deref(), Some("kept"));
        assert_eq!(existing.image_references.len(), 1);
        assert_eq!(existing.tags.len(), 2);
        assert_eq!(existing.last_updated, Some(ts(10)));
    }

    #[test]
    fn test_merge_without_changes_keeps_timestamp() {
        let mut existing = PaperRecordBuilder::new("2503.01078")
            .title("Same")
            .build();
        existing.last_updated = Some(ts(1));

        let incoming = PaperRecordBuilder::new("2503.01078").title("Same").build();
        assert!(!existing.merge_from(incoming, ts(99)));
        assert_eq!(existing.last_updated, Some(ts(1)));
    }

    #[test]
    fn test_index_entry_is_field_subset() {
        let record = PaperRecordBuilder::new("2503.01078")
            .title("T")
            .short_summary("s")
            .long_summary("l")
            .images(vec!["https://x/1.png".to_string()])
            .build();

        let entry = serde_json::to_value(record.to_index_entry()).unwrap();
        let full = serde_json::to_value(&record).unwrap();
        for (key, value) in entry.as_object().unwrap() {
            assert_eq!(full.get(key), Some(value), "field {key} differs");
        }
        assert!(entry.get("longSummary").is_none());
        assert!(entry.get("imageReferences").is_none());
    }

    #[test]
    fn test_camel_case_serialization() {
        let record = PaperRecordBuilder::new("2503.01078").build();
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"sourceUrl\""));
        assert!(json.contains("\"publicationDate\""));
        assert!(json.contains("\"lastUpdated\""));
    }
}
