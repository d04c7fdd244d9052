//! The paper collection and its on-disk snapshots.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{read_json, read_json_or_default, write_json_atomic, StoreError};
use crate::config::PathsConfig;
use crate::models::{IndexEntry, PaperRecord, Snapshot};

/// In-memory paper collection keyed by identifier, persisted as two snapshots.
///
/// Only records are tracked for changes; `save` is a no-op until an upsert
/// actually modifies something, so an unchanged run leaves both files untouched.
#[derive(Debug)]
pub struct DatasetStore {
    dataset_path: PathBuf,
    index_path: PathBuf,
    source: String,
    records: BTreeMap<String, PaperRecord>,
    generated_at: Option<DateTime<Utc>>,
    dirty: bool,
}

impl DatasetStore {
    /// Load the dataset snapshot, starting empty if it is missing or corrupt.
    pub fn open(paths: &PathsConfig, source: impl Into<String>) -> Self {
        let dataset_path = paths.dataset_path();
        let snapshot: Snapshot<PaperRecord> = read_json_or_default(&dataset_path);

        let mut records = BTreeMap::new();
        for record in snapshot.items {
            if record.identifier.trim().is_empty() {
                continue;
            }
            records.insert(record.identifier.clone(), record);
        }
        tracing::debug!(
            "Loaded {} records from {}",
            records.len(),
            dataset_path.display()
        );

        Self {
            dataset_path,
            index_path: paths.index_path(),
            source: source.into(),
            records,
            generated_at: snapshot.generated_at,
            dirty: false,
        }
    }

    pub fn get(&self, identifier: &str) -> Option<&PaperRecord> {
        self.records.get(identifier)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.records.contains_key(identifier)
    }

    pub fn is_enriched(&self, identifier: &str) -> bool {
        self.get(identifier).is_some_and(PaperRecord::is_enriched)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in snapshot order (identifier descending)
    pub fn records(&self) -> impl Iterator<Item = &PaperRecord> {
        self.records.values().rev()
    }

    /// Whether an upsert has happened since the last save
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Insert or merge a record. Returns whether anything changed.
    pub fn upsert(&mut self, record: PaperRecord) -> bool {
        let now = Utc::now();
        let changed = match self.records.get_mut(&record.identifier) {
            Some(existing) => existing.merge_from(record, now),
            None => {
                let mut record = record;
                record.last_updated = Some(now);
                self.records.insert(record.identifier.clone(), record);
                true
            }
        };
        self.dirty |= changed;
        changed
    }

    /// Write both snapshots if anything changed. Returns whether files were written.
    pub fn save(&mut self) -> Result<bool, StoreError> {
        if !self.dirty {
            return Ok(false);
        }

        let now = Utc::now();
        let items: Vec<&PaperRecord> = self.records().collect();
        let index: Vec<IndexEntry> = items.iter().map(|r| r.to_index_entry()).collect();

        write_json_atomic(
            &self.dataset_path,
            &Snapshot::new(now, self.source.as_str(), items),
        )?;
        write_json_atomic(&self.index_path, &Snapshot::new(now, self.source.as_str(), index))?;

        self.generated_at = Some(now);
        self.dirty = false;
        tracing::debug!(
            "Saved {} records to {}",
            self.records.len(),
            self.dataset_path.display()
        );
        Ok(true)
    }

    /// When the snapshot on disk was last written
    pub fn generated_at(&self) -> Option<DateTime<Utc>> {
        self.generated_at
    }
}

/// Load a dataset snapshot that must exist and parse.
pub fn load_strict(path: &Path) -> Result<Snapshot<PaperRecord>, StoreError> {
    read_json(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaperRecordBuilder;
    use tempfile::tempdir;

    fn paths(dir: &Path) -> PathsConfig {
        PathsConfig {
            data_dir: dir.to_path_buf(),
        }
    }

    fn record(id: &str) -> PaperRecord {
        PaperRecordBuilder::new(id).title(format!("Paper {}", id)).build()
    }

    #[test]
    fn test_missing_and_corrupt_files_start_empty() {
        let dir = tempdir().unwrap();
        assert!(DatasetStore::open(&paths(dir.path()), "src").is_empty());

        std::fs::write(dir.path().join("papers.json"), "[[[").unwrap();
        assert!(DatasetStore::open(&paths(dir.path()), "src").is_empty());
    }

    #[test]
    fn test_save_orders_newest_first_and_writes_index() {
        let dir = tempdir().unwrap();
        let mut store = DatasetStore::open(&paths(dir.path()), "https://example.org/list");
        store.upsert(record("2503.00001"));
        store.upsert(
            PaperRecordBuilder::new("2503.00002")
                .title("Later")
                .long_summary("long text")
                .build(),
        );
        assert!(store.save().unwrap());

        let full = load_strict(&dir.path().join("papers.json")).unwrap();
        assert_eq!(full.source, "https://example.org/list");
        assert_eq!(full.items[0].identifier, "2503.00002");
        assert_eq!(full.items[1].identifier, "2503.00001");

        let index: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("index.json")).unwrap(),
        )
        .unwrap();
        let items = index["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert!(items[0].get("longSummary").is_none());
        assert!(items[0].get("imageReferences").is_none());
        assert_eq!(items[0]["title"], "Later");
    }

    #[test]
    fn test_unchanged_save_is_a_noop() {
        let dir = tempdir().unwrap();
        let mut store = DatasetStore::open(&paths(dir.path()), "src");
        store.upsert(record("2503.00001"));
        store.save().unwrap();
        let before = std::fs::read(dir.path().join("papers.json")).unwrap();

        let mut reopened = DatasetStore::open(&paths(dir.path()), "src");
        assert!(!reopened.upsert(record("2503.00001")));
        assert!(!reopened.save().unwrap());
        let after = std::fs::read(dir.path().join("papers.json")).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_upsert_merges_by_identifier() {
        let dir = tempdir().unwrap();
        let mut store = DatasetStore::open(&paths(dir.path()), "src");
        store.upsert(record("2503.00001"));
        let changed = store.upsert(
            PaperRecordBuilder::new("2503.00001")
                .short_summary("short")
                .long_summary("long")
                .build(),
        );
        assert!(changed);
        assert_eq!(store.len(), 1);
        assert!(store.is_enriched("2503.00001"));
        assert_eq!(store.get("2503.00001").unwrap().title, "Paper 2503.00001");
    }

    #[test]
    fn test_load_strict_rejects_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("papers.json");
        assert!(matches!(load_strict(&path), Err(StoreError::Io { .. })));
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(load_strict(&path), Err(StoreError::Json { .. })));
    }
}
