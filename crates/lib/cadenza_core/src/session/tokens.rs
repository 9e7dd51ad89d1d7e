//! Token custody on top of a [`SessionStore`].
//!
//! Key layout:
//! - `jwt:blacklist:<access token>` → `"revoked"`, TTL = remaining token lifetime
//! - `refresh:token:<user id>` → current refresh token, TTL = refresh lifetime
//! - `user:session:<user id>` → session record fields, TTL = access lifetime

use std::time::Duration;

use uuid::Uuid;

use super::{SessionStore, SessionStoreError};
use crate::models::auth::SessionRecord;

const REVOKED_PREFIX: &str = "jwt:blacklist:";
const REFRESH_PREFIX: &str = "refresh:token:";
const SESSION_PREFIX: &str = "user:session:";
const REVOKED_MARKER: &str = "revoked";

fn revoked_key(token: &str) -> String {
    format!("{REVOKED_PREFIX}{token}")
}

fn refresh_key(user_id: Uuid) -> String {
    format!("{REFRESH_PREFIX}{user_id}")
}

fn session_key(user_id: Uuid) -> String {
    format!("{SESSION_PREFIX}{user_id}")
}

/// Deny `token` for `remaining` (never less than one second).
pub async fn revoke_access_token(
    store: &dyn SessionStore,
    token: &str,
    remaining: Duration,
) -> Result<(), SessionStoreError> {
    let ttl = remaining.max(Duration::from_secs(1));
    store.set(&revoked_key(token), REVOKED_MARKER, ttl).await
}

pub async fn is_revoked(store: &dyn SessionStore, token: &str) -> Result<bool, SessionStoreError> {
    store.exists(&revoked_key(token)).await
}

/// Record `token` as the user's only valid refresh token.
pub async fn save_refresh_token(
    store: &dyn SessionStore,
    user_id: Uuid,
    token: &str,
    ttl: Duration,
) -> Result<(), SessionStoreError> {
    store.set(&refresh_key(user_id), token, ttl).await
}

/// The user's current refresh token, if any.
pub async fn get_refresh_token(
    store: &dyn SessionStore,
    user_id: Uuid,
) -> Result<Option<String>, SessionStoreError> {
    match store.get(&refresh_key(user_id)).await {
        Ok(token) => Ok(Some(token)),
        Err(SessionStoreError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

pub async fn delete_refresh_token(
    store: &dyn SessionStore,
    user_id: Uuid,
) -> Result<(), SessionStoreError> {
    store.delete(&refresh_key(user_id)).await
}

/// Replace the user's session record.
pub async fn save_session(
    store: &dyn SessionStore,
    user_id: Uuid,
    record: &SessionRecord,
    ttl: Duration,
) -> Result<(), SessionStoreError> {
    let key = session_key(user_id);
    store.delete(&key).await?;
    store.hset(&key, &record.to_fields()).await?;
    store.expire(&key, ttl).await?;
    Ok(())
}

/// The user's session record. Missing or unreadable records yield `None`.
pub async fn get_session(
    store: &dyn SessionStore,
    user_id: Uuid,
) -> Result<Option<SessionRecord>, SessionStoreError> {
    let fields = store.hgetall(&session_key(user_id)).await?;
    if fields.is_empty() {
        return Ok(None);
    }
    Ok(SessionRecord::from_fields(&fields))
}

pub async fn delete_session(
    store: &dyn SessionStore,
    user_id: Uuid,
) -> Result<(), SessionStoreError> {
    store.delete(&session_key(user_id)).await
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::session::MemorySessionStore;

    #[tokio::test(start_paused = true)]
    async fn revocation_lasts_for_remaining_lifetime() {
        let store = MemorySessionStore::new();
        revoke_access_token(&store, "tok", Duration::from_secs(30))
            .await
            .unwrap();
        assert!(is_revoked(&store, "tok").await.unwrap());
        assert!(!is_revoked(&store, "other").await.unwrap());

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(!is_revoked(&store, "tok").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn revocation_has_a_one_second_floor() {
        let store = MemorySessionStore::new();
        revoke_access_token(&store, "tok", Duration::ZERO)
            .await
            .unwrap();
        assert!(is_revoked(&store, "tok").await.unwrap());
    }

    #[tokio::test]
    async fn newer_refresh_token_replaces_older() {
        let store = MemorySessionStore::new();
        let user = Uuid::new_v4();
        let ttl = Duration::from_secs(3600);
        save_refresh_token(&store, user, "first", ttl).await.unwrap();
        save_refresh_token(&store, user, "second", ttl).await.unwrap();
        assert_eq!(
            get_refresh_token(&store, user).await.unwrap().as_deref(),
            Some("second")
        );

        delete_refresh_token(&store, user).await.unwrap();
        assert_eq!(get_refresh_token(&store, user).await.unwrap(), None);
    }

    #[tokio::test]
    async fn session_record_round_trips_through_store() {
        let store = MemorySessionStore::new();
        let user = Uuid::new_v4();
        let record = SessionRecord {
            login_time: Utc::now(),
            ip_address: "127.0.0.1".into(),
            display_name: "bach".into(),
            is_moderator: false,
        };
        save_session(&store, user, &record, Duration::from_secs(60))
            .await
            .unwrap();
        let loaded = get_session(&store, user).await.unwrap().unwrap();
        assert_eq!(loaded.display_name, "bach");
        assert_eq!(loaded.ip_address, "127.0.0.1");

        delete_session(&store, user).await.unwrap();
        assert!(get_session(&store, user).await.unwrap().is_none());
    }
}
