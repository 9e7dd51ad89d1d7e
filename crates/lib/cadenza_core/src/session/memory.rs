//! In-process session store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use super::{SessionStore, SessionStoreError};

/// Interval between purge passes of [`MemorySessionStore::spawn_purge_task`].
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
enum Value {
    Text(String),
    Hash(HashMap<String, String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    deadline: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.deadline.is_none_or(|deadline| now < deadline)
    }
}

/// DashMap-backed store. Expired keys are invisible immediately and
/// evicted lazily or by the purge task.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: DashMap<String, Entry>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live entry for `key`, evicting it when expired.
    fn live(&self, key: &str) -> Option<Entry> {
        let now = Instant::now();
        let entry = self.entries.get(key).map(|e| e.value().clone())?;
        if entry.is_live(now) {
            Some(entry)
        } else {
            self.entries.remove_if(key, |_, e| !e.is_live(now));
            None
        }
    }

    /// Evict expired entries.
    pub fn purge(&self) {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| e.is_live(now));
        let evicted = before.saturating_sub(self.entries.len());
        if evicted > 0 {
            debug!(evicted, "purged expired session entries");
        }
    }

    /// Spawn a periodic purge task.
    pub fn spawn_purge_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(PURGE_INTERVAL);
            loop {
                interval.tick().await;
                store.purge();
            }
        })
    }

    #[cfg(test)]
    fn raw_len(&self) -> usize {
        self.entries.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), SessionStoreError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: Value::Text(value.to_string()),
                deadline: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<String, SessionStoreError> {
        match self.live(key) {
            Some(Entry {
                value: Value::Text(text),
                ..
            }) => Ok(text),
            Some(_) => Err(SessionStoreError::WrongType(key.to_string())),
            None => Err(SessionStoreError::NotFound(key.to_string())),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), SessionStoreError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, SessionStoreError> {
        Ok(self.live(key).is_some())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, SessionStoreError> {
        if self.live(key).is_none() {
            return Ok(false);
        }
        match self.entries.get_mut(key) {
            Some(mut entry) => {
                entry.deadline = Some(Instant::now() + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<(), SessionStoreError> {
        let current = self.live(key);
        if let Some(Entry {
            value: Value::Text(_),
            ..
        }) = current
        {
            return Err(SessionStoreError::WrongType(key.to_string()));
        }
        let mut entry = self.entries.entry(key.to_string()).or_insert(Entry {
            value: Value::Hash(HashMap::new()),
            deadline: None,
        });
        if let Value::Hash(map) = &mut entry.value {
            for (field, value) in fields {
                map.insert(field.clone(), value.clone());
            }
        }
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, SessionStoreError> {
        match self.live(key) {
            Some(Entry {
                value: Value::Hash(map),
                ..
            }) => Ok(map),
            Some(_) => Err(SessionStoreError::WrongType(key.to_string())),
            None => Ok(HashMap::new()),
        }
    }

    async fn ping(&self) -> Result<(), SessionStoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn values_expire_after_ttl() {
        let store = MemorySessionStore::new();
        store.set("k", "v", Duration::from_secs(10)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), "v");
        assert!(store.exists("k").await.unwrap());

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(!store.exists("k").await.unwrap());
        assert!(matches!(
            store.get("k").await,
            Err(SessionStoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn set_overwrites_previous_value() {
        let store = MemorySessionStore::new();
        store.set("k", "old", Duration::from_secs(60)).await.unwrap();
        store.set("k", "new", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), "new");
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemorySessionStore::new();
        store.set("k", "v", Duration::from_secs(60)).await.unwrap();
        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert!(!store.exists("k").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn hash_entries_take_expiry_from_expire() {
        let store = MemorySessionStore::new();
        let fields = vec![
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
        ];
        store.hset("h", &fields).await.unwrap();
        assert!(store.expire("h", Duration::from_secs(5)).await.unwrap());
        assert_eq!(store.hgetall("h").await.unwrap().len(), 2);

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(store.hgetall("h").await.unwrap().is_empty());
        assert!(!store.expire("h", Duration::from_secs(5)).await.unwrap());
    }

    #[tokio::test]
    async fn mixing_value_kinds_is_rejected() {
        let store = MemorySessionStore::new();
        store.set("k", "v", Duration::from_secs(60)).await.unwrap();
        let fields = vec![("a".to_string(), "1".to_string())];
        assert!(matches!(
            store.hset("k", &fields).await,
            Err(SessionStoreError::WrongType(_))
        ));

        store.hset("h", &fields).await.unwrap();
        assert!(matches!(
            store.get("h").await,
            Err(SessionStoreError::WrongType(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn purge_evicts_expired_entries() {
        let store = MemorySessionStore::new();
        store.set("short", "v", Duration::from_secs(1)).await.unwrap();
        store.set("long", "v", Duration::from_secs(600)).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        store.purge();
        assert_eq!(store.raw_len(), 1);
        assert!(store.exists("long").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_task_runs_periodically() {
        let store = Arc::new(MemorySessionStore::new());
        store.set("k", "v", Duration::from_secs(1)).await.unwrap();
        let handle = store.spawn_purge_task();
        tokio::time::sleep(PURGE_INTERVAL + Duration::from_secs(1)).await;
        assert_eq!(store.raw_len(), 0);
        handle.abort();
    }
}
