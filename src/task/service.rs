//! Task operations: load, apply a transition, write back, record activity.
//!
//! Writes are version-checked. When another request wrote the task between
//! our read and our write, the whole read/apply/write cycle runs again on
//! the fresh copy, up to `write_retries` extra times.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::error::{TaskError, TaskResult};
use super::machine::{NewTask, RespondOutcome, ResponseInput, TaskEdit};
use super::model::{Task, UserId};
use super::store::{TaskFilter, TaskStore};
use crate::activity::{ActivityEntry, ActivityLog, EntityRef};
use crate::customer::CustomerStore;
use crate::store::StoreError;
use crate::users::{Role, SharedUserDirectory};

/// How a task listing is narrowed.
#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
    pub project_id: Option<String>,
    pub user_id: Option<UserId>,
}

pub struct TaskService {
    tasks: Arc<TaskStore>,
    customers: Arc<CustomerStore>,
    activity: Arc<ActivityLog>,
    users: SharedUserDirectory,
    write_retries: u32,
}

impl TaskService {
    pub fn new(
        tasks: Arc<TaskStore>,
        customers: Arc<CustomerStore>,
        activity: Arc<ActivityLog>,
        users: SharedUserDirectory,
        write_retries: u32,
    ) -> Self {
        Self {
            tasks,
            customers,
            activity,
            users,
            write_retries,
        }
    }

    /// Append an activity entry. The task write has already succeeded, so a
    /// failure here is logged rather than returned.
    async fn log(
        &self,
        action: &str,
        actor: Option<&str>,
        details: String,
        subjects: Vec<EntityRef>,
    ) {
        if let Err(e) = self.activity.record(action, actor, details, subjects).await {
            tracing::warn!(action, error = %e, "Failed to record activity");
        }
    }

    /// Run `apply` against the latest copy of the task and write it back.
    async fn mutate<R, F>(&self, id: Uuid, mut apply: F) -> TaskResult<(Task, R)>
    where
        F: FnMut(&mut Task) -> TaskResult<R>,
    {
        let mut attempt = 0;
        loop {
            let mut task = self
                .tasks
                .get(id)
                .await
                .ok_or_else(|| TaskError::task_not_found(id))?;
            let outcome = apply(&mut task)?;

            match self.tasks.replace(task).await {
                Ok(saved) => return Ok((saved, outcome)),
                Err(StoreError::VersionConflict { found, .. }) if attempt < self.write_retries => {
                    attempt += 1;
                    tracing::debug!(task = %id, attempt, found, "Task changed concurrently, retrying");
                }
                Err(StoreError::VersionConflict { .. }) => {
                    tracing::warn!(task = %id, attempts = attempt + 1, "Giving up on contended task");
                    return Err(TaskError::Conflict(id));
                }
                Err(StoreError::NotFound { .. }) => return Err(TaskError::task_not_found(id)),
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub async fn create(&self, project_id: &str, new: NewTask) -> TaskResult<Task> {
        let (customer, project) = self
            .customers
            .find_project(project_id)
            .await
            .ok_or_else(|| TaskError::NotFound(format!("Project {} not found", project_id)))?;

        let task = Task::create(new, &project, Utc::now())?;
        let task = self.tasks.insert(task).await?;

        tracing::info!(task = %task.id, project = %task.project_id, "Created task");
        self.log(
            "Task Creation",
            Some(&task.created_by),
            format!(
                "Task \"{}\" created for project \"{}\".",
                task.title, task.project_name
            ),
            vec![
                EntityRef::task(task.id),
                EntityRef::project(&task.project_id),
                EntityRef::customer(customer.id),
            ],
        )
        .await;

        Ok(task)
    }

    pub async fn get(&self, id: Uuid) -> TaskResult<Task> {
        let mut task = self
            .tasks
            .get(id)
            .await
            .ok_or_else(|| TaskError::task_not_found(id))?;
        task.refresh_lateness(Utc::now());
        Ok(task)
    }

    /// List tasks. A project filter wins over a user filter; a user filter
    /// shows only that user's assignments unless the user is an admin.
    pub async fn list(&self, query: TaskQuery) -> Vec<Task> {
        let filter = match (query.project_id, query.user_id) {
            (Some(project_id), _) => TaskFilter {
                project_id: Some(project_id),
                assigned_to: None,
            },
            (None, Some(user_id)) => {
                let is_admin = self
                    .users
                    .get(&user_id)
                    .is_some_and(|u| u.role == Role::Admin);
                TaskFilter {
                    project_id: None,
                    assigned_to: (!is_admin).then_some(user_id),
                }
            }
            (None, None) => TaskFilter::default(),
        };

        let now = Utc::now();
        let mut tasks = self.tasks.list(&filter).await;
        for task in &mut tasks {
            task.refresh_lateness(now);
        }
        tasks
    }

    pub async fn edit(&self, id: Uuid, edit: TaskEdit, actor: Option<&str>) -> TaskResult<Task> {
        let (mut task, ()) = self.mutate(id, |t| t.apply_edit(edit.clone())).await?;

        self.log(
            "Task Update",
            actor,
            format!("Task {} updated.", id),
            vec![EntityRef::task(id), EntityRef::project(&task.project_id)],
        )
        .await;

        task.refresh_lateness(Utc::now());
        Ok(task)
    }

    pub async fn respond(&self, id: Uuid, input: ResponseInput) -> TaskResult<Task> {
        let user_id = input.user_id.clone();
        let (mut task, outcome) = self
            .mutate(id, |t| t.respond(input.clone(), Utc::now()))
            .await
            .map_err(|e| {
                if let TaskError::NotAssigned { user_id } = &e {
                    tracing::info!(task = %id, user = %user_id, "Rejected response from non-assignee");
                }
                e
            })?;

        let (action, details) = match &outcome {
            RespondOutcome::FullyApproved => (
                "Task Fully Approved",
                format!("Task {} has been fully approved by all assigned users.", id),
            ),
            RespondOutcome::Stuck { pending } => (
                "Task Marked Stuck",
                format!(
                    "Task {} is stuck. Pending approvals from: {}",
                    id,
                    pending.join(", ")
                ),
            ),
        };
        tracing::info!(task = %id, user = %user_id, status = %task.status, "Recorded response");
        self.log(action, Some(&user_id), details, vec![EntityRef::task(id)])
            .await;

        task.refresh_lateness(Utc::now());
        Ok(task)
    }

    pub async fn forward(
        &self,
        id: Uuid,
        users: Vec<UserId>,
        comment: Option<String>,
        actor: Option<&str>,
    ) -> TaskResult<Task> {
        let (mut task, added) = self.mutate(id, |t| Ok(t.forward(&users))).await?;

        let mut details = format!("Task {} forwarded to: {}", id, users.join(", "));
        if let Some(comment) = comment.filter(|c| !c.trim().is_empty()) {
            details.push_str(&format!(". Comment: {}", comment));
        }
        tracing::info!(task = %id, added = ?added, "Forwarded task");
        self.log("Task Forwarded", actor, details, vec![EntityRef::task(id)])
            .await;

        task.refresh_lateness(Utc::now());
        Ok(task)
    }

    pub async fn backward(&self, id: Uuid, reason: &str, actor: Option<&str>) -> TaskResult<Task> {
        let (mut task, ()) = self
            .mutate(id, |t| {
                t.send_backward();
                Ok(())
            })
            .await?;

        tracing::info!(task = %id, creator = %task.created_by, "Sent task back");
        self.log(
            "Task Sent Back",
            actor,
            format!("Task {} sent back to sender. Reason: {}", id, reason),
            vec![EntityRef::task(id)],
        )
        .await;

        task.refresh_lateness(Utc::now());
        Ok(task)
    }

    /// Existence check only; no reminder is delivered yet.
    pub async fn remind(&self, id: Uuid) -> TaskResult<()> {
        if self.tasks.get(id).await.is_none() {
            return Err(TaskError::task_not_found(id));
        }
        tracing::info!(task = %id, "Reminder requested");
        Ok(())
    }

    pub async fn activity(&self, id: Uuid) -> Vec<ActivityEntry> {
        self.activity.for_entity(&EntityRef::task(id)).await
    }
}
