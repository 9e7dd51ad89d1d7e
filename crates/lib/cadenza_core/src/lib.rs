//! # cadenza_core
//!
//! Core domain logic for Cadenza: identity tokens, session custody, the
//! composition workflow and the persistence contracts behind them.

pub mod auth;
pub mod calculator;
pub mod catalog;
pub mod migrate;
pub mod models;
pub mod session;
pub mod store;
pub mod uuid;
pub mod workflow;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
