//! Session custody: a key-value store with per-key expiry.
//!
//! Backs access-token revocation, refresh-token custody and session
//! metadata. Keys are independent; no multi-key atomicity is offered.

pub mod memory;
pub mod postgres;
pub mod tokens;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemorySessionStore;
pub use postgres::PgSessionStore;

/// Session store errors.
#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("Session store unavailable: {0}")]
    Unavailable(String),

    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Wrong value type for key: {0}")]
    WrongType(String),
}

impl From<sqlx::Error> for SessionStoreError {
    fn from(e: sqlx::Error) -> Self {
        SessionStoreError::Unavailable(e.to_string())
    }
}

/// Key-value store with TTLs and hash-valued entries.
///
/// A key holds either a plain string (`set`/`get`) or a field map
/// (`hset`/`hgetall`). Mixing the two on one key yields `WrongType`.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value, expiring after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), SessionStoreError>;

    /// Fetch a string value. Missing or expired keys yield `NotFound`.
    async fn get(&self, key: &str) -> Result<String, SessionStoreError>;

    /// Remove a key. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), SessionStoreError>;

    async fn exists(&self, key: &str) -> Result<bool, SessionStoreError>;

    /// Reset the expiry of an existing key. Returns `false` when the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, SessionStoreError>;

    /// Set fields of a hash entry, creating it (without expiry) when absent.
    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<(), SessionStoreError>;

    /// All fields of a hash entry. Missing keys yield an empty map.
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, SessionStoreError>;

    /// Cheap liveness probe.
    async fn ping(&self) -> Result<(), SessionStoreError>;
}
