//! Request/response types shared across API modules.

use serde::{Deserialize, Serialize};

use crate::task::Task;
use crate::users::User;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub dev_mode: bool,
    pub auth_required: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: User,
    /// Absent when the server has no signing secret (dev mode only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// `{"task": ...}` wrapper used by every single-task endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub task: Task,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
