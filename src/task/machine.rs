//! Approval state machine.
//!
//! Every transition here is a pure function of the task and its inputs; the
//! caller supplies the clock. Loading, persisting and logging belong to
//! [`super::service::TaskService`].

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use super::error::{TaskError, TaskResult};
use super::model::{
    Attachment, Decision, FinalSignOff, ProjectSnapshot, Task, TaskResponse, TaskStatus, UserId,
};
use crate::customer::Project;

/// Input for creating a task.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub due_date: NaiveDate,
    pub assigned_users: Vec<UserId>,
    pub attachments: Vec<Attachment>,
    pub created_by: UserId,
    /// Display name for the project; the project's own name when absent.
    pub project_name: Option<String>,
}

/// Full replacement of the editable fields.
#[derive(Debug, Clone)]
pub struct TaskEdit {
    pub title: String,
    pub description: String,
    pub due_date: NaiveDate,
    pub assigned_users: Vec<UserId>,
    /// Replaces the attachment list only when present.
    pub attachments: Option<Vec<Attachment>>,
}

#[derive(Debug, Clone)]
pub struct ResponseInput {
    pub user_id: UserId,
    pub user_name: String,
    pub decision: Decision,
    pub reason: String,
    pub file_url: Option<String>,
}

/// Where a task stands after a response was recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespondOutcome {
    FullyApproved,
    Stuck { pending: Vec<UserId> },
}

/// Order-preserving de-duplication.
fn dedup_users(users: impl IntoIterator<Item = UserId>) -> Vec<UserId> {
    let mut out: Vec<UserId> = Vec::new();
    for user in users {
        if !out.contains(&user) {
            out.push(user);
        }
    }
    out
}

/// A due date counts from 00:00 UTC, so anything after midnight of the due
/// day is overdue.
fn is_overdue(due_date: NaiveDate, now: DateTime<Utc>) -> bool {
    now > due_date.and_time(NaiveTime::MIN).and_utc()
}

impl Task {
    /// Create a pending task against `project`, snapshotting its details.
    pub fn create(new: NewTask, project: &Project, now: DateTime<Utc>) -> TaskResult<Self> {
        if new.title.trim().is_empty() {
            return Err(TaskError::Validation("title is required".to_string()));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            project_id: project.id.clone(),
            project_name: new
                .project_name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| project.name.clone()),
            title: new.title,
            description: new.description,
            status: TaskStatus::Pending,
            assigned_users: dedup_users(new.assigned_users),
            due_date: new.due_date,
            attachments: new.attachments,
            created_at: now,
            created_by: new.created_by,
            responses: Vec::new(),
            is_late: false,
            final_sign_off: None,
            project_details: ProjectSnapshot::capture(project, now),
            stuck_with: Vec::new(),
            version: 0,
        })
    }

    pub fn is_assigned(&self, user_id: &str) -> bool {
        self.assigned_users.iter().any(|u| u == user_id)
    }

    pub fn response_of(&self, user_id: &str) -> Option<&TaskResponse> {
        self.responses.iter().find(|r| r.user_id == user_id)
    }

    /// Assignees without an approving response, in assignment order.
    pub fn compute_stuck_with(&self) -> Vec<UserId> {
        self.assigned_users
            .iter()
            .filter(|u| {
                self.response_of(u)
                    .map_or(true, |r| r.decision != Decision::Approved)
            })
            .cloned()
            .collect()
    }

    /// Lateness as seen at `now`: only pending tasks can be late.
    pub fn is_late_at(&self, now: DateTime<Utc>) -> bool {
        self.status == TaskStatus::Pending && is_overdue(self.due_date, now)
    }

    pub fn refresh_lateness(&mut self, now: DateTime<Utc>) {
        self.is_late = self.is_late_at(now);
    }

    /// Record (or overwrite) a response and re-derive status and `stuck_with`.
    ///
    /// Fails without touching the task when the user is not assigned.
    pub fn respond(&mut self, input: ResponseInput, now: DateTime<Utc>) -> TaskResult<RespondOutcome> {
        if !self.is_assigned(&input.user_id) {
            return Err(TaskError::NotAssigned {
                user_id: input.user_id,
            });
        }

        let late = is_overdue(self.due_date, now);
        match self.responses.iter_mut().find(|r| r.user_id == input.user_id) {
            Some(existing) => {
                // The name recorded with the first response is kept.
                existing.decision = input.decision;
                existing.reason = input.reason;
                existing.file_url = input.file_url;
                existing.late = late;
                existing.timestamp = now;
            }
            None => self.responses.push(TaskResponse {
                user_id: input.user_id,
                user_name: input.user_name,
                decision: input.decision,
                reason: input.reason,
                file_url: input.file_url,
                late,
                timestamp: now,
            }),
        }

        self.stuck_with = self.compute_stuck_with();
        if self.stuck_with.is_empty() && !self.assigned_users.is_empty() {
            self.status = TaskStatus::Approved;
            self.final_sign_off = Some(FinalSignOff {
                users: self.assigned_users.clone(),
                comments: None,
                timestamp: now,
            });
            Ok(RespondOutcome::FullyApproved)
        } else {
            self.status = TaskStatus::Stuck;
            self.final_sign_off = None;
            Ok(RespondOutcome::Stuck {
                pending: self.stuck_with.clone(),
            })
        }
    }

    /// Add assignees, keeping existing ones and their order.
    ///
    /// Returns the users that were not assigned before.
    pub fn forward(&mut self, users: &[UserId]) -> Vec<UserId> {
        let mut added = Vec::new();
        for user in users {
            if !self.is_assigned(user) {
                self.assigned_users.push(user.clone());
                added.push(user.clone());
            }
        }
        added
    }

    /// Hand the task back to its creator.
    ///
    /// Existing responses are deliberately left in place.
    pub fn send_backward(&mut self) {
        self.assigned_users = vec![self.created_by.clone()];
        self.status = TaskStatus::Backward;
    }

    pub fn apply_edit(&mut self, edit: TaskEdit) -> TaskResult<()> {
        if edit.title.trim().is_empty() {
            return Err(TaskError::Validation("title is required".to_string()));
        }
        self.title = edit.title;
        self.description = edit.description;
        self.due_date = edit.due_date;
        self.assigned_users = dedup_users(edit.assigned_users);
        if let Some(attachments) = edit.attachments {
            self.attachments = attachments;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::customer::{ProjectStatus, TaskCounters};
    use chrono::TimeZone;

    fn project() -> Project {
        Project {
            id: "prj-1".to_string(),
            customer_id: Uuid::new_v4(),
            customer_name: "Acme Solar".to_string(),
            name: "Rooftop 5MW".to_string(),
            description: "Rooftop install".to_string(),
            status: ProjectStatus::Active,
            start_date: None,
            end_date: None,
            budget: 1000.0,
            priority: None,
            progress: 0.0,
            tasks: TaskCounters::default(),
            inline_inspection: true,
            technical_specs_doc: None,
            qap_criteria: false,
            qap_document: None,
            tender_document: None,
            product_type: Some("Module".to_string()),
            plant: Some("P2".to_string()),
            other_documents: Vec::new(),
            uploaded_at: None,
        }
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn task(assigned: &[&str]) -> Task {
        Task::create(
            NewTask {
                title: "Check QAP".to_string(),
                description: String::new(),
                due_date: date(2025, 3, 10),
                assigned_users: assigned.iter().map(|u| u.to_string()).collect(),
                attachments: Vec::new(),
                created_by: "p".to_string(),
                project_name: None,
            },
            &project(),
            at(2025, 3, 1),
        )
        .unwrap()
    }

    fn reply(user: &str, decision: Decision) -> ResponseInput {
        ResponseInput {
            user_id: user.to_string(),
            user_name: format!("User {}", user),
            decision,
            reason: String::new(),
            file_url: None,
        }
    }

    #[test]
    fn test_create_starts_pending_with_snapshot() {
        let t = task(&["a", "b", "a"]);
        assert_eq!(t.status, TaskStatus::Pending);
        assert_eq!(t.assigned_users, vec!["a", "b"]);
        assert_eq!(t.project_name, "Rooftop 5MW");
        assert_eq!(t.project_details.project().plant.as_deref(), Some("P2"));
        assert_eq!(t.project_details.taken_at(), at(2025, 3, 1));
    }

    #[test]
    fn test_create_rejects_blank_title() {
        let result = Task::create(
            NewTask {
                title: "  ".to_string(),
                description: String::new(),
                due_date: date(2025, 3, 10),
                assigned_users: Vec::new(),
                attachments: Vec::new(),
                created_by: "p".to_string(),
                project_name: None,
            },
            &project(),
            at(2025, 3, 1),
        );
        assert!(matches!(result, Err(TaskError::Validation(_))));
    }

    #[test]
    fn test_all_approve_means_approved() {
        let mut t = task(&["a", "b"]);
        t.respond(reply("a", Decision::Approved), at(2025, 3, 2)).unwrap();
        let outcome = t.respond(reply("b", Decision::Approved), at(2025, 3, 3)).unwrap();

        assert_eq!(outcome, RespondOutcome::FullyApproved);
        assert_eq!(t.status, TaskStatus::Approved);
        assert!(t.stuck_with.is_empty());
        assert_eq!(t.final_sign_off.as_ref().unwrap().users, vec!["a", "b"]);
    }

    #[test]
    fn test_partial_approval_is_stuck() {
        let mut t = task(&["a", "b"]);
        let outcome = t.respond(reply("a", Decision::Approved), at(2025, 3, 2)).unwrap();

        assert_eq!(
            outcome,
            RespondOutcome::Stuck {
                pending: vec!["b".to_string()]
            }
        );
        assert_eq!(t.status, TaskStatus::Stuck);
        assert_eq!(t.stuck_with, vec!["b"]);
    }

    #[test]
    fn test_rejection_keeps_user_in_stuck_with() {
        let mut t = task(&["a", "b"]);
        t.respond(reply("a", Decision::Rejected), at(2025, 3, 2)).unwrap();
        t.respond(reply("b", Decision::Approved), at(2025, 3, 2)).unwrap();
        assert_eq!(t.status, TaskStatus::Stuck);
        assert_eq!(t.stuck_with, vec!["a"]);
    }

    #[test]
    fn test_non_assignee_leaves_task_unchanged() {
        let mut t = task(&["a", "b"]);
        let before = t.clone();

        let result = t.respond(reply("c", Decision::Approved), at(2025, 3, 2));
        assert!(matches!(result, Err(TaskError::NotAssigned { .. })));
        assert_eq!(t, before);
    }

    #[test]
    fn test_second_response_overwrites_first() {
        let mut t = task(&["a", "b"]);
        t.respond(reply("a", Decision::Rejected), at(2025, 3, 2)).unwrap();
        let mut again = reply("a", Decision::Approved);
        again.reason = "fixed".to_string();
        t.respond(again, at(2025, 3, 4)).unwrap();

        assert_eq!(t.responses.len(), 1);
        let r = t.response_of("a").unwrap();
        assert_eq!(r.decision, Decision::Approved);
        assert_eq!(r.reason, "fixed");
        assert_eq!(r.timestamp, at(2025, 3, 4));
        assert_eq!(t.stuck_with, vec!["b"]);
    }

    #[test]
    fn test_repeated_identical_response_is_stable() {
        let mut t = task(&["a", "b"]);
        t.respond(reply("a", Decision::Approved), at(2025, 3, 2)).unwrap();
        let (status, stuck) = (t.status, t.stuck_with.clone());
        t.respond(reply("a", Decision::Approved), at(2025, 3, 2)).unwrap();
        assert_eq!(t.status, status);
        assert_eq!(t.stuck_with, stuck);
        assert_eq!(t.responses.len(), 1);
    }

    #[test]
    fn test_stuck_with_matches_definition_after_each_response() {
        let mut t = task(&["a", "b", "c"]);
        let script = [
            ("b", Decision::Approved),
            ("a", Decision::Rejected),
            ("c", Decision::Approved),
            ("b", Decision::Rejected),
            ("a", Decision::Approved),
            ("b", Decision::Approved),
        ];
        for (user, decision) in script {
            t.respond(reply(user, decision), at(2025, 3, 2)).unwrap();
            let expected: Vec<UserId> = t
                .assigned_users
                .iter()
                .filter(|u| t.response_of(u).map(|r| r.decision) != Some(Decision::Approved))
                .cloned()
                .collect();
            assert_eq!(t.stuck_with, expected);
            let want = if expected.is_empty() {
                TaskStatus::Approved
            } else {
                TaskStatus::Stuck
            };
            assert_eq!(t.status, want);
        }
    }

    #[test]
    fn test_response_late_flag() {
        let mut t = task(&["a", "b"]);
        t.respond(reply("a", Decision::Approved), at(2025, 3, 9)).unwrap();
        t.respond(reply("b", Decision::Approved), at(2025, 3, 10)).unwrap();
        assert!(!t.response_of("a").unwrap().late);
        assert!(t.response_of("b").unwrap().late);
    }

    #[test]
    fn test_due_day_starts_at_utc_midnight() {
        let due = date(2025, 3, 10);
        let midnight = Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap();
        assert!(!is_overdue(due, midnight - chrono::Duration::seconds(1)));
        assert!(!is_overdue(due, midnight));
        assert!(is_overdue(due, midnight + chrono::Duration::seconds(1)));
        assert!(is_overdue(due, at(2025, 3, 10)));
    }

    #[test]
    fn test_forward_is_union() {
        let mut t = task(&["a"]);
        let added = t.forward(&["c".to_string(), "a".to_string(), "c".to_string()]);
        assert_eq!(added, vec!["c"]);
        assert_eq!(t.assigned_users, vec!["a", "c"]);
        assert_eq!(t.status, TaskStatus::Pending);
    }

    #[test]
    fn test_forward_keeps_responses_and_status() {
        let mut t = task(&["a", "b"]);
        t.respond(reply("a", Decision::Approved), at(2025, 3, 2)).unwrap();
        let before = t.assigned_users.clone();

        t.forward(&["d".to_string()]);
        assert!(before.iter().all(|u| t.assigned_users.contains(u)));
        assert_eq!(t.responses.len(), 1);
        assert_eq!(t.status, TaskStatus::Stuck);
    }

    #[test]
    fn test_backward_resets_to_creator() {
        let mut t = task(&["a", "b"]);
        t.respond(reply("a", Decision::Approved), at(2025, 3, 2)).unwrap();
        t.forward(&["c".to_string()]);

        t.send_backward();
        assert_eq!(t.assigned_users, vec!["p"]);
        assert_eq!(t.status, TaskStatus::Backward);
        assert_eq!(t.responses.len(), 1);
    }

    #[test]
    fn test_lateness_depends_on_status() {
        let mut t = task(&["a"]);
        let later = at(2025, 4, 1);
        assert!(t.is_late_at(later));
        assert!(!t.is_late_at(at(2025, 3, 9)));
        assert!(t.is_late_at(at(2025, 3, 10)));

        t.respond(reply("a", Decision::Approved), at(2025, 3, 5)).unwrap();
        assert_eq!(t.status, TaskStatus::Approved);
        t.refresh_lateness(later);
        assert!(!t.is_late);
    }

    #[test]
    fn test_edit_replaces_fields_but_not_state() {
        let mut t = task(&["a", "b"]);
        t.attachments = vec![Attachment {
            name: "spec.pdf".to_string(),
            url: "/uploads/1-spec.pdf".to_string(),
        }];
        t.respond(reply("a", Decision::Approved), at(2025, 3, 2)).unwrap();

        t.apply_edit(TaskEdit {
            title: "Check QAP rev B".to_string(),
            description: "updated".to_string(),
            due_date: date(2025, 4, 1),
            assigned_users: vec!["b".to_string(), "e".to_string(), "b".to_string()],
            attachments: None,
        })
        .unwrap();

        assert_eq!(t.title, "Check QAP rev B");
        assert_eq!(t.assigned_users, vec!["b", "e"]);
        assert_eq!(t.attachments.len(), 1);
        assert_eq!(t.status, TaskStatus::Stuck);
        assert_eq!(t.responses.len(), 1);
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            "\"in-progress\""
        );
        assert_eq!(TaskStatus::Backward.to_string(), "backward");
        let r: TaskResponse = serde_json::from_value(serde_json::json!({
            "userId": "a",
            "userName": "A",
            "status": "rejected",
            "late": false,
            "timestamp": "2025-03-02T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(r.decision, Decision::Rejected);
    }
}
