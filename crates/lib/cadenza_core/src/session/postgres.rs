//! PostgreSQL-backed session store.
//!
//! Entries live in an unlogged `session_entries` table. A row carries either
//! a plain `value` or a JSON-encoded `fields` map, plus an optional
//! `expires_at`; rows past their expiry are treated as absent.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{debug, info};

use super::{SessionStore, SessionStoreError};

const PURGE_INTERVAL: Duration = Duration::from_secs(300);

const SCHEMA: &str = "CREATE UNLOGGED TABLE IF NOT EXISTS session_entries (\
     key TEXT PRIMARY KEY, \
     value TEXT, \
     fields TEXT, \
     expires_at TIMESTAMPTZ)";

/// Session store over a dedicated connection pool.
#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

fn deadline(ttl: Duration) -> Result<DateTime<Utc>, SessionStoreError> {
    let ttl = chrono::Duration::from_std(ttl)
        .map_err(|e| SessionStoreError::Unavailable(format!("ttl out of range: {e}")))?;
    Ok(Utc::now() + ttl)
}

fn decode_fields(key: &str, raw: &str) -> Result<HashMap<String, String>, SessionStoreError> {
    serde_json::from_str(raw).map_err(|_| SessionStoreError::WrongType(key.to_string()))
}

impl PgSessionStore {
    /// Wrap an existing pool. Call [`PgSessionStore::ensure_schema`] before use.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with a short acquire timeout, create the table and ping.
    pub async fn connect(url: &str) -> Result<Self, SessionStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        store.ping().await?;
        info!("session store connected");
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> Result<(), SessionStoreError> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Delete expired rows, returning how many were removed.
    pub async fn purge_expired(&self) -> Result<u64, SessionStoreError> {
        let result = sqlx::query("DELETE FROM session_entries WHERE expires_at <= $1")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Spawn a periodic purge task.
    pub fn spawn_purge_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(PURGE_INTERVAL);
            loop {
                interval.tick().await;
                match store.purge_expired().await {
                    Ok(0) => {}
                    Ok(evicted) => debug!(evicted, "purged expired session entries"),
                    Err(e) => debug!(error = %e, "session purge failed"),
                }
            }
        })
    }

    /// Live `(value, fields)` for `key`.
    async fn fetch(
        &self,
        key: &str,
    ) -> Result<Option<(Option<String>, Option<String>)>, SessionStoreError> {
        let row = sqlx::query_as::<_, (Option<String>, Option<String>)>(
            "SELECT value, fields FROM session_entries \
             WHERE key = $1 AND (expires_at IS NULL OR expires_at > $2)",
        )
        .bind(key)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), SessionStoreError> {
        sqlx::query(
            "INSERT INTO session_entries (key, value, fields, expires_at) VALUES ($1, $2, NULL, $3) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, fields = NULL, \
             expires_at = EXCLUDED.expires_at",
        )
        .bind(key)
        .bind(value)
        .bind(deadline(ttl)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<String, SessionStoreError> {
        match self.fetch(key).await? {
            Some((Some(value), _)) => Ok(value),
            Some((None, _)) => Err(SessionStoreError::WrongType(key.to_string())),
            None => Err(SessionStoreError::NotFound(key.to_string())),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), SessionStoreError> {
        sqlx::query("DELETE FROM session_entries WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, SessionStoreError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM session_entries \
             WHERE key = $1 AND (expires_at IS NULL OR expires_at > $2))",
        )
        .bind(key)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, SessionStoreError> {
        let result = sqlx::query(
            "UPDATE session_entries SET expires_at = $2 \
             WHERE key = $1 AND (expires_at IS NULL OR expires_at > $3)",
        )
        .bind(key)
        .bind(deadline(ttl)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<(), SessionStoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM session_entries WHERE key = $1 AND expires_at <= $2")
            .bind(key)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        let current = sqlx::query_as::<_, (Option<String>, Option<String>)>(
            "SELECT value, fields FROM session_entries WHERE key = $1 FOR UPDATE",
        )
        .bind(key)
        .fetch_optional(&mut *tx)
        .await?;

        let mut map = match current {
            Some((Some(_), _)) => return Err(SessionStoreError::WrongType(key.to_string())),
            Some((None, Some(raw))) => decode_fields(key, &raw)?,
            _ => HashMap::new(),
        };
        for (field, value) in fields {
            map.insert(field.clone(), value.clone());
        }
        let encoded = serde_json::to_string(&map)
            .map_err(|e| SessionStoreError::Unavailable(format!("encode fields: {e}")))?;

        sqlx::query(
            "INSERT INTO session_entries (key, value, fields, expires_at) VALUES ($1, NULL, $2, NULL) \
             ON CONFLICT (key) DO UPDATE SET fields = EXCLUDED.fields",
        )
        .bind(key)
        .bind(encoded)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, SessionStoreError> {
        match self.fetch(key).await? {
            Some((None, Some(raw))) => decode_fields(key, &raw),
            Some((Some(_), _)) => Err(SessionStoreError::WrongType(key.to_string())),
            _ => Ok(HashMap::new()),
        }
    }

    async fn ping(&self) -> Result<(), SessionStoreError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}
