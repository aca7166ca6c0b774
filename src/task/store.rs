//! Task persistence with version-checked writes.

use std::collections::HashMap;
use std::path::PathBuf;

use tokio::sync::RwLock;
use uuid::Uuid;

use super::model::{Task, UserId};
use crate::store::{JsonFile, StoreError, StoreResult};

/// Selection for [`TaskStore::list`]. Empty matches every task.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub project_id: Option<String>,
    pub assigned_to: Option<UserId>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(project_id) = &self.project_id {
            if &task.project_id != project_id {
                return false;
            }
        }
        if let Some(user) = &self.assigned_to {
            if !task.is_assigned(user) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug)]
pub struct TaskStore {
    tasks: RwLock<HashMap<Uuid, Task>>,
    file: JsonFile,
}

impl TaskStore {
    pub fn open(path: PathBuf) -> StoreResult<Self> {
        let file = JsonFile::new(path);
        let loaded: Vec<Task> = file.load()?;
        tracing::info!("Loaded {} tasks from {}", loaded.len(), file.path().display());
        Ok(Self {
            tasks: RwLock::new(loaded.into_iter().map(|t| (t.id, t)).collect()),
            file,
        })
    }

    fn persist(&self, tasks: &HashMap<Uuid, Task>) -> StoreResult<()> {
        let mut records: Vec<&Task> = tasks.values().collect();
        records.sort_by_key(|t| t.created_at);
        self.file.save(&records)
    }

    pub async fn get(&self, id: Uuid) -> Option<Task> {
        self.tasks.read().await.get(&id).cloned()
    }

    /// Matching tasks, oldest first.
    pub async fn list(&self, filter: &TaskFilter) -> Vec<Task> {
        let tasks = self.tasks.read().await;
        let mut list: Vec<Task> = tasks.values().filter(|t| filter.matches(t)).cloned().collect();
        list.sort_by_key(|t| t.created_at);
        list
    }

    pub async fn insert(&self, mut task: Task) -> StoreResult<Task> {
        task.version = 1;
        let mut tasks = self.tasks.write().await;
        tasks.insert(task.id, task.clone());
        if let Err(e) = self.persist(&tasks) {
            tasks.remove(&task.id);
            return Err(e);
        }
        Ok(task)
    }

    /// Write `task` back if nobody else has written it since it was loaded.
    ///
    /// `task.version` must be the version that was read; the stored copy gets
    /// the next one.
    pub async fn replace(&self, mut task: Task) -> StoreResult<Task> {
        let mut tasks = self.tasks.write().await;
        let current = tasks.get(&task.id).ok_or_else(|| StoreError::NotFound {
            kind: "Task",
            id: task.id.to_string(),
        })?;
        if current.version != task.version {
            return Err(StoreError::VersionConflict {
                id: task.id.to_string(),
                expected: task.version,
                found: current.version,
            });
        }

        task.version += 1;
        let previous = tasks.insert(task.id, task.clone());
        if let Err(e) = self.persist(&tasks) {
            if let Some(previous) = previous {
                tasks.insert(previous.id, previous);
            }
            return Err(e);
        }
        Ok(task)
    }
}
