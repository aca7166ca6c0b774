//! Customer endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
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
use crate::customer::{Customer, CustomerSummary};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_customers).post(create_customer))
        .route("/:id", get(get_customer))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomerRequest {
    pub name: Option<String>,
    pub industry: Option<String>,
    pub created_by: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CustomerEnvelope<T> {
    pub customer: T,
}

/// POST /api/customers
async fn create_customer(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateCustomerRequest>,
) -> Result<(StatusCode, Json<CustomerEnvelope<Customer>>), (StatusCode, String)> {
    let name = req
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| bad_request("name is required"))?;
    let industry = req.industry.filter(|i| !i.trim().is_empty());

    let customer = state.customers.create(Customer::new(name, industry)).await?;
    tracing::info!(customer = %customer.id, "Created customer");

    let actor = req.created_by.unwrap_or(user.id);
    record(
        &state,
        "Customer Creation",
        Some(&actor),
        format!("Customer \"{}\" created.", customer.name),
        vec![EntityRef::customer(customer.id)],
    )
    .await;

    Ok((StatusCode::CREATED, Json(CustomerEnvelope { customer })))
}

/// GET /api/customers
async fn list_customers(State(state): State<Arc<AppState>>) -> Json<Vec<CustomerSummary>> {
    let customers = state.customers.list().await;
    Json(customers.into_iter().map(CustomerSummary::from).collect())
}

/// GET /api/customers/:id
async fn get_customer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CustomerEnvelope<CustomerSummary>>, (StatusCode, String)> {
    let customer = state
        .customers
        .get(id)
        .await
        .ok_or_else(|| not_found("Customer not found"))?;
    Ok(Json(CustomerEnvelope {
        customer: customer.into(),
    }))
}
