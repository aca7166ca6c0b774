//! User listing for assignee pickers.

use axum::{extract::State, routing::get, Json, Router};
use std::sync::Arc;

use super::routes::AppState;
use crate::users::User;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/", get(list_users))
}

/// GET /api/users - Passwords are never serialized.
async fn list_users(State(state): State<Arc<AppState>>) -> Json<Vec<User>> {
    Json(state.users.list())
}
