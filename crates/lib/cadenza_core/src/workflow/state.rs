//! Composition status transitions.
//!
//! ```text
//! Draft ──form──▶ Formed ──complete──▶ Completed
//!   │                └────reject────▶ Rejected
//!   └──delete──▶ Deleted
//! ```

use super::WorkflowError;
use crate::models::composition::CompositionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Form,
    Complete,
    Reject,
    Delete,
}

impl Transition {
    /// Status a composition must be in for this transition.
    pub fn source(self) -> CompositionStatus {
        match self {
            Transition::Form | Transition::Delete => CompositionStatus::Draft,
            Transition::Complete | Transition::Reject => CompositionStatus::Formed,
        }
    }

    /// Status after the transition.
    pub fn target(self) -> CompositionStatus {
        match self {
            Transition::Form => CompositionStatus::Formed,
            Transition::Complete => CompositionStatus::Completed,
            Transition::Reject => CompositionStatus::Rejected,
            Transition::Delete => CompositionStatus::Deleted,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Transition::Form => "form",
            Transition::Complete => "complete",
            Transition::Reject => "reject",
            Transition::Delete => "delete",
        }
    }

    /// Next status from `current`, or `InvalidTransition`.
    pub fn apply(self, current: CompositionStatus) -> Result<CompositionStatus, WorkflowError> {
        if current != self.source() {
            return Err(WorkflowError::InvalidTransition(format!(
                "cannot {} a {current} composition",
                self.name()
            )));
        }
        Ok(self.target())
    }
}
