//! Composition workflow: the status state machine, role-gated transitions,
//! item management, scoring and the calculator callback.

pub mod callback;
pub mod scoring;
pub mod service;
pub mod state;

use thiserror::Error;

use crate::store::StoreError;

pub use callback::receive_result;
pub use scoring::ClassicismScore;
pub use service::{CompositionDetail, CompositionWorkflow};
pub use state::Transition;

/// Workflow errors.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for WorkflowError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => WorkflowError::NotFound(what),
            other => WorkflowError::Store(other),
        }
    }
}
