//! Project endpoints.
//!
//! Projects are stored inside their customer; creating one also registers
//! each attached document so it shows up in the document list.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::activity::record;
use super::auth::AuthUser;
use super::error::{bad_request, not_found};
use super::routes::AppState;
use crate::activity::EntityRef;
use crate::customer::{Priority, Project, ProjectStatus, TaskCounters};
use crate::document::{Document, DocumentDetails};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_project))
        .route("/:id", get(get_project))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    /// Generated when absent.
    pub id: Option<String>,
    pub customer_id: Option<Uuid>,
    pub name: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: ProjectStatus,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default)]
    pub budget: f64,
    pub priority: Option<Priority>,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub tasks: TaskCounters,
    #[serde(default)]
    pub inline_inspection: bool,
    pub technical_specs_doc: Option<String>,
    #[serde(default)]
    pub qap_criteria: bool,
    pub qap_document: Option<String>,
    pub tender_document: Option<String>,
    pub product_type: Option<String>,
    pub plant: Option<String>,
    #[serde(default)]
    pub other_documents: Vec<String>,
    pub created_by: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProjectEnvelope {
    pub project: Project,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// POST /api/projects
async fn create_project(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<ProjectEnvelope>), (StatusCode, String)> {
    let customer_id = req
        .customer_id
        .ok_or_else(|| bad_request("customerId is required"))?;
    let name = non_empty(req.name).ok_or_else(|| bad_request("name is required"))?;
    let customer = state
        .customers
        .get(customer_id)
        .await
        .ok_or_else(|| not_found("Customer not found"))?;

    let id = non_empty(req.id).unwrap_or_else(|| Uuid::new_v4().to_string());

    let mut project = Project::new(id, &customer, name);
    project.description = req.description;
    project.status = req.status;
    project.start_date = non_empty(req.start_date);
    project.end_date = non_empty(req.end_date);
    project.budget = req.budget;
    project.priority = req.priority;
    project.progress = req.progress;
    project.tasks = req.tasks;
    project.inline_inspection = req.inline_inspection;
    project.technical_specs_doc = non_empty(req.technical_specs_doc);
    project.qap_criteria = req.qap_criteria;
    project.qap_document = non_empty(req.qap_document);
    project.tender_document = non_empty(req.tender_document);
    project.product_type = non_empty(req.product_type);
    project.plant = non_empty(req.plant);
    project.other_documents = req
        .other_documents
        .into_iter()
        .filter(|d| !d.trim().is_empty())
        .collect();
    project.uploaded_at = Some(chrono::Utc::now().to_rfc3339());

    // Fails with 400 when the id is taken.
    state.customers.add_project(project.clone()).await?;
    tracing::info!(project = %project.id, customer = %customer.id, "Created project");

    let actor = req.created_by.unwrap_or(user.id);
    for (label, url) in project.documents() {
        let document = Document::new(
            label.to_string(),
            url.to_string(),
            actor.clone(),
            DocumentDetails {
                customer_name: customer.name.clone(),
                project_title: project.name.clone(),
                project_details: project.description.clone(),
                expected_delivery_schedule: None,
            },
        );
        // The project is already saved; a missing listing entry is not fatal.
        if let Err(e) = state.documents.add(document).await {
            tracing::warn!(project = %project.id, document = label, error = %e, "Failed to register project document");
        }
    }

    record(
        &state,
        "Project Creation",
        Some(&actor),
        format!(
            "Project \"{}\" created for customer \"{}\".",
            project.name, customer.name
        ),
        vec![EntityRef::project(&project.id), EntityRef::customer(customer.id)],
    )
    .await;

    Ok((StatusCode::CREATED, Json(ProjectEnvelope { project })))
}

/// GET /api/projects/:id
async fn get_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ProjectEnvelope>, (StatusCode, String)> {
    let (_, project) = state
        .customers
        .find_project(&id)
        .await
        .ok_or_else(|| not_found("Project not found"))?;
    Ok(Json(ProjectEnvelope { project }))
}

#[cfg(test)]
mod tests {
    use super::super::testing::{body_json, send, TestApp};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_project_registers_documents() {
        let app = TestApp::new().await;

        let (status, body) = send(
            &app.router,
            "POST",
            "/api/projects",
            Some(json!({
                "customerId": app.customer_id,
                "name": "Ground Mount 20MW",
                "description": "Single-axis trackers",
                "budget": 2500.0,
                "priority": "high",
                "qapDocument": "/uploads/1-qap.pdf",
                "otherDocuments": ["/uploads/2-layout.dwg", ""],
                "createdBy": "s"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let project = &body_json(&body)["project"];
        let id = project["id"].as_str().unwrap().to_string();
        assert_eq!(project["customerName"], "Acme Solar");
        assert_eq!(project["status"], "active");

        let (status, body) = send(&app.router, "GET", &format!("/api/projects/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body_json(&body)["project"]["otherDocuments"], json!(["/uploads/2-layout.dwg"]));

        let (_, body) = send(&app.router, "GET", "/api/documents?projectTitle=Ground%20Mount%2020MW", None).await;
        let docs = body_json(&body);
        let names: Vec<&str> = docs
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["name"].as_str().unwrap())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"QAP Document"));
        assert!(names.contains(&"Other Document"));

        let (_, body) = send(&app.router, "GET", &format!("/api/activity/project/{}", id), None).await;
        assert_eq!(body_json(&body)[0]["action"], "Project Creation");
    }

    #[tokio::test]
    async fn test_create_project_errors() {
        let app = TestApp::new().await;

        let (status, _) = send(&app.router, "POST", "/api/projects", Some(json!({ "name": "Orphan" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app.router,
            "POST",
            "/api/projects",
            Some(json!({ "customerId": uuid::Uuid::new_v4(), "name": "Orphan" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &app.router,
            "POST",
            "/api/projects",
            Some(json!({ "customerId": app.customer_id, "id": "prj-1", "name": "Dup" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app.router, "GET", "/api/projects/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
