//! JSON file persistence shared by the record stores.
//!
//! Every store keeps its records in memory behind a `tokio::sync::RwLock` and
//! rewrites its backing file on each mutation while still holding the write
//! guard, so the file never lags behind a newer in-memory state.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed data in {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("{kind} {id} already exists")]
    Duplicate { kind: &'static str, id: String },

    #[error("Version conflict on {id}: expected {expected}, found {found}")]
    VersionConflict { id: String, expected: u64, found: u64 },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A JSON array file holding every record of one kind.
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all records; a missing file is an empty store.
    pub fn load<T: DeserializeOwned>(&self) -> StoreResult<Vec<T>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let contents = std::fs::read_to_string(&self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| StoreError::Malformed {
            path: self.path.clone(),
            source,
        })
    }

    /// Replace the file contents with `records`.
    pub fn save<T: Serialize>(&self, records: &[&T]) -> StoreResult<()> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        // Ensure parent directory exists
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let contents =
            serde_json::to_string_pretty(records).map_err(|source| StoreError::Malformed {
                path: self.path.clone(),
                source,
            })?;

        // Write through a sibling temp file so a crash never leaves half a document.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, contents).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;
        tracing::debug!("Saved {} records to {}", records.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        id: u32,
        name: String,
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let temp = tempdir().unwrap();
        let file = JsonFile::new(temp.path().join("none.json"));
        let records: Vec<Record> = file.load().unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_save_creates_parent_and_reloads() {
        let temp = tempdir().unwrap();
        let file = JsonFile::new(temp.path().join("nested/records.json"));
        let a = Record {
            id: 1,
            name: "a".to_string(),
        };
        file.save(&[&a]).unwrap();

        let loaded: Vec<Record> = file.load().unwrap();
        assert_eq!(loaded, vec![a]);
        assert!(!temp.path().join("nested/records.json.tmp").exists());
    }

    #[test]
    fn test_malformed_file_is_reported() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result: StoreResult<Vec<Record>> = JsonFile::new(&path).load();
        assert!(matches!(result, Err(StoreError::Malformed { .. })));
    }
}
