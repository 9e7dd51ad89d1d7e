//! Liveness endpoint.

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use tracing::warn;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Whether a session store is configured and answering.
    pub session_store: bool,
    /// Calculation requests that exhausted their delivery attempts.
    pub calculator_dead_letters: usize,
}

/// `GET /api/health`
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let session_store = match &state.sessions {
        Some(store) => match store.ping().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "session store ping failed");
                false
            }
        },
        None => false,
    };
    let calculator_dead_letters = state.calculations.dead_letters().len();
    if calculator_dead_letters > 0 {
        warn!(count = calculator_dead_letters, "undelivered calculation requests");
    }
    Json(HealthResponse {
        status: "ok",
        version: cadenza_core::version(),
        session_store,
        calculator_dead_letters,
    })
}
