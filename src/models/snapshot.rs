//! On-disk JSON envelopes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Envelope shared by the full dataset and the index projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot<T> {
    #[serde(default)]
    pub generated_at: Option<DateTime<Utc>>,

    /// Listing URL the data was collected from
    #[serde(default)]
    pub source: String,

    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

impl<T> Snapshot<T> {
    pub fn new(generated_at: DateTime<Utc>, source: impl Into<String>, items: Vec<T>) -> Self {
        Self {
            generated_at: Some(generated_at),
            source: source.into(),
            items,
        }
    }
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self {
            generated_at: None,
            source: String::new(),
            items: Vec::new(),
        }
    }
}

/// Relevance decisions keyed by canonical abstract URL
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelevanceSnapshot {
    #[serde(default)]
    pub kept: BTreeSet<String>,

    #[serde(default)]
    pub rejected: BTreeSet<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_tolerates_missing_fields() {
        let snapshot: Snapshot<serde_json::Value> = serde_json::from_str("{}").unwrap();
        assert!(snapshot.generated_at.is_none());
        assert!(snapshot.items.is_empty());
    }

    #[test]
    fn test_relevance_snapshot_shape() {
        let mut snapshot = RelevanceSnapshot::default();
        snapshot.kept.insert("https://arxiv.org/abs/2503.01078".to_string());
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["kept"][0], "https://arxiv.org/abs/2503.01078");
        assert!(value["rejected"].as_array().unwrap().is_empty());
    }
}
