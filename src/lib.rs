//! # Approval Desk
//!
//! Project and task approval service for a sales-to-operations handoff.
//!
//! Sales registers customers, projects and documents; managers create tasks
//! against a project and assign reviewers, who approve or reject them.
//!
//! ## Task Flow
//! 1. A task is created `pending` with a set of assignees
//! 2. Each assignee responds; one response per user, overwritten on resubmit
//! 3. All approved => `approved`, anything else => `stuck`
//! 4. Tasks can be forwarded to more reviewers or sent back to the creator
//!
//! ## Modules
//! - `task`: task aggregate, approval state machine, store and service
//! - `customer`: customers with their embedded projects
//! - `document`: uploaded documents for manager review
//! - `activity`: append-only log keyed by entity
//! - `users`: injected user directory
//! - `notify`: best-effort e-mail notifications
//! - `api`: HTTP routes

pub mod activity;
pub mod api;
pub mod config;
pub mod customer;
pub mod document;
pub mod notify;
pub mod store;
pub mod task;
pub mod uploads;
pub mod users;

pub use config::Config;
