//! Task workflow endpoints.
//!
//! - Create / list / fetch / edit tasks
//! - Respond, forward, send back, remind
//! - Per-task activity

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::auth::AuthUser;
use super::error::bad_request;
use super::routes::AppState;
use super::types::{MessageResponse, TaskEnvelope};
use crate::activity::ActivityEntry;
use crate::task::{Attachment, Decision, NewTask, ResponseInput, Task, TaskEdit, TaskQuery};

/// Create task routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_tasks).post(create_task))
        .route("/:id", get(get_task).put(edit_task))
        .route("/:id/respond", put(respond_task))
        .route("/:id/forward", post(forward_task))
        .route("/:id/backward", post(backward_task))
        .route("/:id/remind", post(remind_task))
        .route("/:id/activity", get(task_activity))
}

// ─────────────────────────────────────────────────────────────────────────────
// Request Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub project_id: Option<String>,
    /// Defaults to the project's name
    pub project_name: Option<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub description: String,
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub assigned_users: Vec<String>,
    /// Defaults to the authenticated user
    pub created_by: Option<String>,
    /// Files already stored through `/api/uploads`
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTasksQuery {
    pub project_id: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub assigned_users: Vec<String>,
    /// Replaces the attachment list when present
    pub attachments: Option<Vec<Attachment>>,
    pub updated_by: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondRequest {
    /// Defaults to the authenticated user
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub status: Decision,
    #[serde(default)]
    pub reason: String,
    pub file_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardRequest {
    pub new_assigned_users: Vec<String>,
    pub comment: Option<String>,
    pub forwarded_by: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackwardRequest {
    #[serde(default)]
    pub reason: String,
    pub sent_by: Option<String>,
}

fn required(value: Option<String>, field: &str) -> Result<String, (StatusCode, String)> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| bad_request(format!("{} is required", field)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /api/tasks?projectId=&userId= - List tasks.
async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListTasksQuery>,
) -> Json<Vec<Task>> {
    let tasks = state
        .tasks
        .list(TaskQuery {
            project_id: q.project_id,
            user_id: q.user_id,
        })
        .await;
    Json(tasks)
}

/// POST /api/tasks - Create a task against an existing project.
async fn create_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskEnvelope>), (StatusCode, String)> {
    let project_id = required(req.project_id, "projectId")?;
    let title = required(req.title, "title")?;
    let due_date = req
        .due_date
        .ok_or_else(|| bad_request("dueDate is required"))?;

    let new = NewTask {
        title,
        description: req.description,
        due_date,
        assigned_users: req.assigned_users,
        attachments: req.attachments,
        created_by: req.created_by.unwrap_or(user.id),
        project_name: req.project_name,
    };
    let task = state.tasks.create(&project_id, new).await?;

    Ok((StatusCode::CREATED, Json(TaskEnvelope { task })))
}

/// GET /api/tasks/:id - Fetch one task.
async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TaskEnvelope>, (StatusCode, String)> {
    let task = state.tasks.get(id).await?;
    Ok(Json(TaskEnvelope { task }))
}

/// PUT /api/tasks/:id - Replace the editable fields.
async fn edit_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<EditTaskRequest>,
) -> Result<Json<TaskEnvelope>, (StatusCode, String)> {
    let actor = req.updated_by.unwrap_or(user.id);
    let edit = TaskEdit {
        title: req.title,
        description: req.description,
        due_date: req.due_date,
        assigned_users: req.assigned_users,
        attachments: req.attachments,
    };
    let task = state.tasks.edit(id, edit, Some(&actor)).await?;
    Ok(Json(TaskEnvelope { task }))
}

/// PUT /api/tasks/:id/respond - Approve or reject as an assignee.
async fn respond_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<RespondRequest>,
) -> Result<Json<TaskEnvelope>, (StatusCode, String)> {
    let user_id = req.user_id.unwrap_or_else(|| user.id.clone());
    let user_name = req
        .user_name
        .or_else(|| state.users.get(&user_id).map(|u| u.name))
        .unwrap_or_else(|| user.name.clone());

    let input = ResponseInput {
        user_id,
        user_name,
        decision: req.status,
        reason: req.reason,
        file_url: req.file_url.filter(|u| !u.is_empty()),
    };
    let task = state.tasks.respond(id, input).await?;
    Ok(Json(TaskEnvelope { task }))
}

/// POST /api/tasks/:id/forward - Add assignees.
async fn forward_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<ForwardRequest>,
) -> Result<Json<TaskEnvelope>, (StatusCode, String)> {
    let actor = req.forwarded_by.unwrap_or(user.id);
    let task = state
        .tasks
        .forward(id, req.new_assigned_users, req.comment, Some(&actor))
        .await?;
    Ok(Json(TaskEnvelope { task }))
}

/// POST /api/tasks/:id/backward - Send the task back to its creator.
async fn backward_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<BackwardRequest>,
) -> Result<Json<TaskEnvelope>, (StatusCode, String)> {
    let actor = req.sent_by.unwrap_or(user.id);
    let task = state.tasks.backward(id, &req.reason, Some(&actor)).await?;
    Ok(Json(TaskEnvelope { task }))
}

/// POST /api/tasks/:id/remind - Reminder placeholder.
async fn remind_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, (StatusCode, String)> {
    state.tasks.remind(id).await?;
    Ok(Json(MessageResponse {
        message: "Reminder sent".to_string(),
    }))
}

/// GET /api/tasks/:id/activity - Activity recorded against a task.
async fn task_activity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Json<Vec<ActivityEntry>> {
    Json(state.tasks.activity(id).await)
}
