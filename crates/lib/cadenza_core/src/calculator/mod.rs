//! Hand-off of completed compositions to the external calculator.
//!
//! The workflow only sees [`CalculationSink`], a synchronous fire-and-forget
//! submit. [`CalculationDispatcher`] queues requests and delivers them
//! through a [`CalculatorClient`] in the background; the classification
//! comes back later through the callback endpoint.

pub mod dispatcher;
pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub use dispatcher::{CalculationDispatcher, DeadLetter, DispatcherSettings};
pub use http::HttpCalculatorClient;

/// Body of the outbound calculator call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationRequest {
    pub composition_id: i64,
}

/// Calculator delivery errors.
#[derive(Debug, Error)]
pub enum CalculatorError {
    #[error("Calculator request failed: {0}")]
    Request(String),

    #[error("Calculator responded with status {0}")]
    Status(u16),
}

/// One outbound delivery attempt.
#[async_trait]
pub trait CalculatorClient: Send + Sync {
    async fn notify(&self, request: &CalculationRequest) -> Result<(), CalculatorError>;
}

/// Accepts calculation requests without blocking the caller.
pub trait CalculationSink: Send + Sync {
    fn submit(&self, request: CalculationRequest);

    /// Recent requests that could not be delivered, oldest first.
    fn dead_letters(&self) -> Vec<DeadLetter> {
        Vec::new()
    }
}

/// Sink used when no calculator endpoint is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledSink;

impl CalculationSink for DisabledSink {
    fn submit(&self, request: CalculationRequest) {
        warn!(
            composition_id = request.composition_id,
            "calculator not configured, request discarded"
        );
    }
}
