//! Task module - the approval workflow.
//!
//! This module is designed with the same split throughout:
//! - `model`: the task aggregate and its records
//! - `machine`: pure state transitions, with the clock passed in
//! - `store`: version-checked persistence
//! - `service`: load/apply/write/log orchestration used by the API

pub mod error;
pub mod machine;
pub mod model;
pub mod service;
pub mod store;

pub use error::{TaskError, TaskResult};
pub use machine::{NewTask, RespondOutcome, ResponseInput, TaskEdit};
pub use model::{
    Attachment, Decision, FinalSignOff, ProjectSnapshot, Task, TaskResponse, TaskStatus, UserId,
};
pub use service::{TaskQuery, TaskService};
pub use store::{TaskFilter, TaskStore};
