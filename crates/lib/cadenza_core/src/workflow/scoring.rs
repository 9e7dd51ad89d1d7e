//! Classicism affinity of a composition.
//!
//! `μ = Σ(tone × amount) / Σ(amount)` and `S = 1 / (1 + |μ − REFERENCE_TONE|)`.

use serde::{Deserialize, Serialize};

use crate::models::composition::CompositionItemView;

/// Reference mean tone of the classical period.
pub const REFERENCE_TONE: f64 = 2.82;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassicismScore {
    /// Affinity in `(0, 1]`, or `0` for a composition without items.
    pub coefficient: f64,
    /// Amount-weighted mean tone, or `0` for a composition without items.
    pub mean_tone: f64,
}

impl ClassicismScore {
    pub fn of(items: &[CompositionItemView]) -> Self {
        let total_amount: i64 = items.iter().map(|i| i64::from(i.amount)).sum();
        if total_amount <= 0 {
            return Self {
                coefficient: 0.0,
                mean_tone: 0.0,
            };
        }
        let weighted: f64 = items.iter().map(|i| i.tone * f64::from(i.amount)).sum();
        let mean_tone = weighted / total_amount as f64;
        Self {
            coefficient: 1.0 / (1.0 + (mean_tone - REFERENCE_TONE).abs()),
            mean_tone,
        }
    }
}
