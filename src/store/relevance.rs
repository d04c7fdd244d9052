//! Durable relevance decisions.

use std::path::{Path, PathBuf};

use super::{read_json_or_default, write_json_atomic, StoreError};
use crate::models::RelevanceSnapshot;

/// A cached classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relevance {
    Kept,
    Rejected,
}

/// Kept/rejected sets of canonical abstract URLs.
///
/// A reference lives in at most one set. Once recorded it is never reclassified,
/// except through [`RelevanceCache::force_keep`].
#[derive(Debug)]
pub struct RelevanceCache {
    path: PathBuf,
    snapshot: RelevanceSnapshot,
    dirty: bool,
}

impl RelevanceCache {
    /// Load the cache, starting empty if the file is missing or corrupt.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let mut snapshot: RelevanceSnapshot = read_json_or_default(&path);

        // a hand-edited file may list a reference twice; kept wins
        let overlap: Vec<String> = snapshot
            .kept
            .intersection(&snapshot.rejected)
            .cloned()
            .collect();
        for reference in overlap {
            snapshot.rejected.remove(&reference);
        }

        Self {
            path,
            snapshot,
            dirty: false,
        }
    }

    pub fn status(&self, reference: &str) -> Option<Relevance> {
        if self.snapshot.kept.contains(reference) {
            Some(Relevance::Kept)
        } else if self.snapshot.rejected.contains(reference) {
            Some(Relevance::Rejected)
        } else {
            None
        }
    }

    pub fn is_rejected(&self, reference: &str) -> bool {
        self.status(reference) == Some(Relevance::Rejected)
    }

    /// Record a keep decision for an unclassified reference.
    pub fn record_kept(&mut self, reference: &str) -> bool {
        self.record(reference, Relevance::Kept)
    }

    /// Record a reject decision for an unclassified reference.
    pub fn record_rejected(&mut self, reference: &str) -> bool {
        self.record(reference, Relevance::Rejected)
    }

    fn record(&mut self, reference: &str, relevance: Relevance) -> bool {
        if self.status(reference).is_some() {
            return false;
        }
        let set = match relevance {
            Relevance::Kept => &mut self.snapshot.kept,
            Relevance::Rejected => &mut self.snapshot.rejected,
        };
        set.insert(reference.to_string());
        self.dirty = true;
        true
    }

    /// Mark as kept, moving the reference out of `rejected` if needed.
    pub fn force_keep(&mut self, reference: &str) -> bool {
        let moved = self.snapshot.rejected.remove(reference);
        let inserted = self.snapshot.kept.insert(reference.to_string());
        self.dirty |= moved || inserted;
        moved || inserted
    }

    pub fn kept_count(&self) -> usize {
        self.snapshot.kept.len()
    }

    pub fn rejected_count(&self) -> usize {
        self.snapshot.rejected.len()
    }

    /// Persist if anything changed. Returns whether the file was written.
    pub fn save(&mut self) -> Result<bool, StoreError> {
        if !self.dirty {
            return Ok(false);
        }
        write_json_atomic(&self.path, &self.snapshot)?;
        self.dirty = false;
        Ok(true)
    }
}
