//! Activity feeds for customers and projects.
//!
//! Task activity is served from `/api/tasks/:id/activity`.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use super::routes::AppState;
use crate::activity::{ActivityEntry, EntityRef};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/customer/:id", get(customer_activity))
        .route("/project/:id", get(project_activity))
}

/// Record an entry after the primary write succeeded; failures are only logged.
pub(crate) async fn record(
    state: &AppState,
    action: &str,
    actor: Option<&str>,
    details: String,
    subjects: Vec<EntityRef>,
) {
    if let Err(e) = state.activity.record(action, actor, details, subjects).await {
        tracing::warn!(action, error = %e, "Failed to record activity");
    }
}

/// GET /api/activity/customer/:id
async fn customer_activity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<Vec<ActivityEntry>> {
    Json(state.activity.for_entity(&EntityRef::customer(id)).await)
}

/// GET /api/activity/project/:id
async fn project_activity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<Vec<ActivityEntry>> {
    Json(state.activity.for_entity(&EntityRef::project(id)).await)
}
