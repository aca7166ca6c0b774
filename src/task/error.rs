use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("User not assigned to this task")]
    NotAssigned { user_id: String },

    #[error("Task {0} kept changing underneath the update; try again")]
    Conflict(Uuid),

    #[error("Storage failure: {0}")]
    Store(#[from] StoreError),
}

impl TaskError {
    pub fn task_not_found(id: Uuid) -> Self {
        Self::NotFound(format!("Task {} not found", id))
    }
}

pub type TaskResult<T> = Result<T, TaskError>;
