//! In-process router harness for handler tests.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;
use uuid::Uuid;

use super::routes::{router, AppState};
use crate::config::Config;
use crate::customer::{Customer, Project};
use crate::notify::testing::RecordingNotifier;
use crate::notify::{Notification, SharedNotifier};
use crate::users::{Role, StaticUserDirectory, User};

const BOUNDARY: &str = "approval-desk-test-boundary";

fn user(id: &str, name: &str, email: Option<&str>, role: Role) -> User {
    User {
        id: id.to_string(),
        username: id.to_string(),
        password: format!("{}-pw", id),
        name: name.to_string(),
        email: email.map(str::to_string),
        role,
    }
}

pub(crate) struct TestApp {
    _temp: TempDir,
    pub(crate) state: Arc<AppState>,
    pub(crate) router: Router,
    pub(crate) notifier: Arc<RecordingNotifier>,
    pub(crate) customer_id: Uuid,
    pub(crate) project_id: String,
}

impl TestApp {
    /// Dev-mode app with one customer owning project `prj-1`.
    pub(crate) async fn new() -> Self {
        Self::build(true).await
    }

    /// Same fixture with bearer-token auth enforced.
    pub(crate) async fn secured() -> Self {
        Self::build(false).await
    }

    async fn build(dev_mode: bool) -> Self {
        let temp = tempdir().unwrap();
        let data_dir = temp.path().to_string_lossy().to_string();
        let config = Config::from_lookup(|name| match name {
            "DEV_MODE" => Some(dev_mode.to_string()),
            "DATA_DIR" => Some(data_dir.clone()),
            "JWT_SECRET" if !dev_mode => Some("test-secret".to_string()),
            _ => None,
        })
        .unwrap();

        let users = Arc::new(StaticUserDirectory::new(vec![
            user("p", "Priya", Some("p@example.com"), Role::Manager),
            user("m", "Marco", Some("m@example.com"), Role::Manager),
            user("s", "Sam", Some("s@example.com"), Role::Sales),
            user("a", "Ana", None, Role::Common),
            user("root", "Root", None, Role::Admin),
        ]));
        let notifier = Arc::new(RecordingNotifier::default());
        let shared: SharedNotifier = notifier.clone();

        let state = Arc::new(AppState::open(config, users, shared).unwrap());
        let customer = state
            .customers
            .create(Customer::new("Acme Solar".to_string(), None))
            .await
            .unwrap();
        state
            .customers
            .add_project(Project::new(
                "prj-1".to_string(),
                &customer,
                "Rooftop".to_string(),
            ))
            .await
            .unwrap();

        Self {
            _temp: temp,
            router: router(Arc::clone(&state)),
            state,
            notifier,
            customer_id: customer.id,
            project_id: "prj-1".to_string(),
        }
    }

    /// Create a task on the fixture project and return its id.
    pub(crate) async fn create_task(&self, assigned: &[&str]) -> String {
        let (status, body) = send(
            &self.router,
            "POST",
            "/api/tasks",
            Some(json!({
                "projectId": self.project_id,
                "title": "Review QAP",
                "description": "Check acceptance criteria",
                "dueDate": "2099-01-01",
                "assignedUsers": assigned,
                "createdBy": "p"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body_json(&body)["task"]["id"].as_str().unwrap().to_string()
    }

    /// Wait for background notifications to land.
    pub(crate) async fn sent_notifications(&self, expected: usize) -> Vec<Notification> {
        for _ in 0..50 {
            let sent = self.notifier.sent.lock().await;
            if sent.len() >= expected {
                return sent.clone();
            }
            drop(sent);
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        self.notifier.sent.lock().await.clone()
    }
}

pub(crate) async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, String) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    read(router, request).await
}

/// Send a multipart form. Fields with a file name are sent as file parts.
pub(crate) async fn send_multipart(
    router: &Router,
    method: &str,
    uri: &str,
    fields: &[(&str, Option<&str>, &str)],
) -> (StatusCode, String) {
    let mut body = String::new();
    for (name, file_name, value) in fields {
        body.push_str(&format!("--{}\r\n", BOUNDARY));
        match file_name {
            Some(file_name) => body.push_str(&format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                name, file_name
            )),
            None => body.push_str(&format!(
                "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                name
            )),
        }
        body.push_str(value);
        body.push_str("\r\n");
    }
    body.push_str(&format!("--{}--\r\n", BOUNDARY));

    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap();
    read(router, request).await
}

async fn read(router: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

pub(crate) fn body_json(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|e| panic!("invalid JSON {:?}: {}", body, e))
}
