//! Incremental JSON persistence.
//!
//! - [`DatasetStore`]: the paper collection, saved as a full snapshot plus an index projection
//! - [`RelevanceCache`]: kept/rejected decisions from the relevance filter
//!
//! Loads are tolerant: a missing or corrupt file means "start empty". Writes go
//! through a temporary file in the same directory and are renamed into place.

mod dataset;
mod relevance;

pub use dataset::{load_strict, DatasetStore};
pub use relevance::{Relevance, RelevanceCache};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Errors that can occur while reading or writing snapshots
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Read and parse a JSON file, failing on any problem.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let content = std::fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    serde_json::from_str(&content).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a JSON file, falling back to `T::default()` when it is missing or corrupt.
pub(crate) fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    if !path.exists() {
        tracing::debug!("{} does not exist yet, starting empty", path.display());
        return T::default();
    }
    match read_json(path) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Ignoring unreadable snapshot: {}", e);
            T::default()
        }
    }
}

/// Pretty-print `value` to `path` via temp file + rename.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;

    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
    serde_json::to_writer_pretty(&mut file, value).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    file.write_all(b"\n").map_err(|e| StoreError::io(path, e))?;
    file.as_file().sync_all().map_err(|e| StoreError::io(path, e))?;
    file.persist(path).map_err(|e| StoreError::io(path, e.error))?;
    Ok(())
}
