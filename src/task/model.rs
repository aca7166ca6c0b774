//! Task aggregate and its embedded records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::customer::Project;

/// Users are referenced by the string id the user directory hands out.
pub type UserId = String;

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Stuck,
    Approved,
    Backward,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Stuck => "stuck",
            Self::Approved => "approved",
            Self::Backward => "backward",
        };
        write!(f, "{}", s)
    }
}

/// An assignee's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub url: String,
}

/// One user's response. A task holds at most one per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub user_id: UserId,
    pub user_name: String,
    #[serde(rename = "status")]
    pub decision: Decision,
    #[serde(default)]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    /// Whether the response arrived after the due date.
    pub late: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalSignOff {
    pub users: Vec<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Copy of a project's details taken when a task was created.
///
/// Never re-synced with the live project; later edits to the project do not
/// show up here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSnapshot {
    #[serde(flatten)]
    project: Project,
    taken_at: DateTime<Utc>,
}

impl ProjectSnapshot {
    pub fn capture(project: &Project, now: DateTime<Utc>) -> Self {
        Self {
            project: project.clone(),
            taken_at: now,
        }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub project_id: String,
    pub project_name: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: TaskStatus,
    /// Ordered, duplicate-free.
    pub assigned_users: Vec<UserId>,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub created_at: DateTime<Utc>,
    pub created_by: UserId,
    #[serde(default)]
    pub responses: Vec<TaskResponse>,
    /// Recomputed on every read; see [`Task::refresh_lateness`].
    #[serde(default)]
    pub is_late: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_sign_off: Option<FinalSignOff>,
    pub project_details: ProjectSnapshot,
    #[serde(default)]
    pub stuck_with: Vec<UserId>,
    /// Optimistic concurrency counter, bumped by the store on every write.
    #[serde(default)]
    pub version: u64,
}
