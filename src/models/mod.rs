//! Core data models for papers, listing rows and persisted snapshots.

mod paper;
mod snapshot;

pub use paper::{Candidate, IndexEntry, PaperRecord, PaperRecordBuilder};
pub use snapshot::{RelevanceSnapshot, Snapshot};
