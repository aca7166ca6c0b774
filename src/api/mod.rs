//! HTTP API.
//!
//! - `routes`: shared state, router assembly and the server loop
//! - `auth`: login and the bearer-token middleware
//! - one module per resource, each exposing `routes()`

mod activity;
pub mod auth;
mod customers;
mod documents;
mod error;
mod projects;
pub mod routes;
mod tasks;
pub mod types;
mod users;

pub use routes::{router, serve, AppState};

#[cfg(test)]
pub(crate) mod testing;
