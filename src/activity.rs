//! Append-only activity log.
//!
//! Entries are tagged with the entities they concern and looked up by exact
//! `(kind, id)` key, never by matching text inside `details`. The backing
//! file is JSON Lines: one entry per line, appended as it is recorded.

use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::store::{StoreError, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Customer,
    Project,
    Task,
    Document,
}

/// Key of an entity an entry is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: impl ToString) -> Self {
        Self {
            kind,
            id: id.to_string(),
        }
    }

    pub fn customer(id: impl ToString) -> Self {
        Self::new(EntityKind::Customer, id)
    }

    pub fn project(id: impl ToString) -> Self {
        Self::new(EntityKind::Project, id)
    }

    pub fn task(id: impl ToString) -> Self {
        Self::new(EntityKind::Task, id)
    }

    pub fn document(id: impl ToString) -> Self {
        Self::new(EntityKind::Document, id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub id: Uuid,
    pub action: String,
    /// Acting user id, or `"unknown"` when the client did not say.
    pub user_id: String,
    pub details: String,
    pub subjects: Vec<EntityRef>,
    pub timestamp: DateTime<Utc>,
}

impl ActivityEntry {
    pub fn concerns(&self, subject: &EntityRef) -> bool {
        self.subjects.iter().any(|s| s == subject)
    }
}

#[derive(Debug)]
pub struct ActivityLog {
    entries: RwLock<Vec<ActivityEntry>>,
    path: PathBuf,
}

impl ActivityLog {
    pub fn open(path: PathBuf) -> StoreResult<Self> {
        let entries = Self::load(&path)?;
        tracing::info!(
            "Loaded {} activity entries from {}",
            entries.len(),
            path.display()
        );
        Ok(Self {
            entries: RwLock::new(entries),
            path,
        })
    }

    fn load(path: &PathBuf) -> StoreResult<Vec<ActivityEntry>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let io_err = |source| StoreError::Io {
            path: path.clone(),
            source,
        };

        let file = std::fs::File::open(path).map_err(io_err)?;
        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(io_err)?;
            if line.trim().is_empty() {
                continue;
            }
            let entry = serde_json::from_str(&line).map_err(|source| StoreError::Malformed {
                path: path.clone(),
                source,
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Append one entry and return it.
    pub async fn record(
        &self,
        action: &str,
        user_id: Option<&str>,
        details: impl Into<String>,
        subjects: Vec<EntityRef>,
    ) -> StoreResult<ActivityEntry> {
        let entry = ActivityEntry {
            id: Uuid::new_v4(),
            action: action.to_string(),
            user_id: user_id
                .filter(|u| !u.trim().is_empty())
                .unwrap_or("unknown")
                .to_string(),
            details: details.into(),
            subjects,
            timestamp: Utc::now(),
        };

        let mut entries = self.entries.write().await;
        self.append_line(&entry)?;
        entries.push(entry.clone());
        tracing::debug!(action = %entry.action, user = %entry.user_id, "Activity recorded");
        Ok(entry)
    }

    fn append_line(&self, entry: &ActivityEntry) -> StoreResult<()> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut line = serde_json::to_string(entry).map_err(|source| StoreError::Malformed {
            path: self.path.clone(),
            source,
        })?;
        line.push('\n');

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;
        file.write_all(line.as_bytes()).map_err(io_err)
    }

    /// Entries concerning `subject`, oldest first.
    pub async fn for_entity(&self, subject: &EntityRef) -> Vec<ActivityEntry> {
        let entries = self.entries.read().await;
        let mut matched: Vec<ActivityEntry> = entries
            .iter()
            .filter(|e| e.concerns(subject))
            .cloned()
            .collect();
        matched.sort_by_key(|e| e.timestamp);
        matched
    }
}
