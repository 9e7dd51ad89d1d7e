//! Business logic services.

pub mod auth;
pub mod calculator;
pub mod sessions;
