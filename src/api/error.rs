//! Mapping of domain errors onto HTTP responses.
//!
//! Handlers return `Result<_, (StatusCode, String)>`; these conversions let
//! them use `?` on store and task results directly.

use axum::http::StatusCode;

use crate::store::StoreError;
use crate::task::TaskError;

impl From<TaskError> for (StatusCode, String) {
    fn from(e: TaskError) -> Self {
        match e {
            TaskError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            TaskError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            TaskError::NotAssigned { .. } => (StatusCode::FORBIDDEN, e.to_string()),
            TaskError::Conflict(_) => (StatusCode::CONFLICT, e.to_string()),
            TaskError::Store(e) => e.into(),
        }
    }
}

impl From<StoreError> for (StatusCode, String) {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { .. } => (StatusCode::NOT_FOUND, e.to_string()),
            StoreError::Duplicate { .. } => (StatusCode::BAD_REQUEST, e.to_string()),
            StoreError::VersionConflict { .. } => (StatusCode::CONFLICT, e.to_string()),
            StoreError::Io { .. } | StoreError::Malformed { .. } => {
                tracing::error!("Storage failure: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal storage error".to_string(),
                )
            }
        }
    }
}

pub(crate) fn bad_request(msg: impl Into<String>) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, msg.into())
}

pub(crate) fn not_found(msg: impl Into<String>) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, msg.into())
}

pub(crate) fn internal(context: &str, e: impl std::fmt::Display) -> (StatusCode, String) {
    tracing::error!("{}: {}", context, e);
    (StatusCode::INTERNAL_SERVER_ERROR, context.to_string())
}
