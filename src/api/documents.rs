//! Document and raw upload endpoints.
//!
//! Both take `multipart/form-data`. Stored files land in the upload
//! directory and are served back from `/uploads`.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::activity::record;
use super::auth::AuthUser;
use super::error::{bad_request, internal};
use super::routes::AppState;
use crate::activity::EntityRef;
use crate::document::{Document, DocumentDetails, DocumentFilter};
use crate::notify::{dispatch, Notification};
use crate::uploads::StoredFile;
use crate::users::Role;

/// Document listing, upload and edit.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_documents).post(upload_document))
        .route("/:id", put(edit_document))
}

/// Bare file upload used before creating tasks or responses.
pub fn upload_routes() -> Router<Arc<AppState>> {
    Router::new().route("/", post(upload_files))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDocumentsQuery {
    pub uploaded_by: Option<String>,
    pub project_title: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DocumentEnvelope {
    pub document: Document,
}

/// A parsed multipart form: every file part plus the text fields.
#[derive(Default)]
struct Form {
    files: Vec<(String, Vec<u8>)>,
    fields: HashMap<String, String>,
}

impl Form {
    async fn read(mut multipart: Multipart) -> Result<Self, (StatusCode, String)> {
        let mut form = Form::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(|s| s.to_string()) {
                Some(file_name) => {
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
                    form.files.push((file_name, bytes.to_vec()));
                }
                None => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
                    form.fields.insert(name, value);
                }
            }
        }
        Ok(form)
    }

    fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn details(&self) -> Result<DocumentDetails, (StatusCode, String)> {
        let expected_delivery_schedule = match self.text("expectedDeliverySchedule") {
            Some(raw) => Some(
                raw.parse::<NaiveDate>()
                    .map_err(|_| bad_request("expectedDeliverySchedule must be YYYY-MM-DD"))?,
            ),
            None => None,
        };
        Ok(DocumentDetails {
            customer_name: self.text("customerName").unwrap_or_default(),
            project_title: self.text("projectTitle").unwrap_or_default(),
            project_details: self.text("projectDetails").unwrap_or_default(),
            expected_delivery_schedule,
        })
    }
}

async fn store_file(
    state: &AppState,
    name: &str,
    bytes: &[u8],
) -> Result<StoredFile, (StatusCode, String)> {
    state
        .uploads
        .save(name, bytes)
        .await
        .map_err(|e| internal("Failed to store upload", e))
}

/// Mail every manager that has an address.
fn notify_managers(state: &AppState, subject: String, body: String) {
    let recipients = state
        .users
        .with_role(Role::Manager)
        .into_iter()
        .filter_map(|u| u.email)
        .collect();
    dispatch(
        &state.notifier,
        Notification {
            recipients,
            subject,
            body,
        },
    );
}

/// GET /api/documents?uploadedBy=&projectTitle=
async fn list_documents(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListDocumentsQuery>,
) -> Json<Vec<Document>> {
    let filter = DocumentFilter {
        uploaded_by: q.uploaded_by,
        project_title: q.project_title,
    };
    Json(state.documents.list(&filter).await)
}

/// POST /api/documents
async fn upload_document(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<DocumentEnvelope>), (StatusCode, String)> {
    let form = Form::read(multipart).await?;
    let (file_name, bytes) = form
        .files
        .first()
        .ok_or_else(|| bad_request("No file uploaded"))?;
    let details = form.details()?;
    let uploaded_by = form.text("uploadedBy").unwrap_or(user.id);

    let stored = store_file(&state, file_name, bytes).await?;
    let document = state
        .documents
        .add(Document::new(stored.name, stored.url, uploaded_by.clone(), details))
        .await?;
    tracing::info!(document = %document.id, by = %uploaded_by, "Document uploaded");

    record(
        &state,
        "Document Upload",
        Some(&uploaded_by),
        format!(
            "Document \"{}\" uploaded for project \"{}\".",
            document.name, document.project_title
        ),
        vec![EntityRef::document(document.id)],
    )
    .await;

    let from_sales = state
        .users
        .get(&uploaded_by)
        .is_some_and(|u| u.role == Role::Sales);
    if from_sales {
        notify_managers(
            &state,
            format!("New Document Submission: {}", document.name),
            document.summary(),
        );
    }

    Ok((StatusCode::CREATED, Json(DocumentEnvelope { document })))
}

/// PUT /api/documents/:id
async fn edit_document(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<DocumentEnvelope>, (StatusCode, String)> {
    let form = Form::read(multipart).await?;
    let details = form.details()?;
    let actor = form.text("uploadedBy").unwrap_or(user.id);

    if state.documents.get(id).await.is_none() {
        return Err((StatusCode::NOT_FOUND, "Document not found".to_string()));
    }
    let file = match form.files.first() {
        Some((name, bytes)) => {
            let stored = store_file(&state, name, bytes).await?;
            Some((stored.name, stored.url))
        }
        None => None,
    };

    let document = state.documents.update(id, details, file).await?;
    tracing::info!(document = %document.id, by = %actor, "Document edited");

    record(
        &state,
        "Document Edit",
        Some(&actor),
        format!("Document \"{}\" edited.", document.name),
        vec![EntityRef::document(document.id)],
    )
    .await;
    notify_managers(
        &state,
        format!("Document Edited: {}", document.name),
        document.summary(),
    );

    Ok(Json(DocumentEnvelope { document }))
}

/// POST /api/uploads
async fn upload_files(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Vec<StoredFile>>), (StatusCode, String)> {
    let form = Form::read(multipart).await?;
    if form.files.is_empty() {
        return Err(bad_request("No file uploaded"));
    }

    let mut stored = Vec::with_capacity(form.files.len());
    for (name, bytes) in &form.files {
        stored.push(store_file(&state, name, bytes).await?);
    }
    Ok((StatusCode::CREATED, Json(stored)))
}
