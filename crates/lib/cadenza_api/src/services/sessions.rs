//! Session store selection at start-up.

use std::sync::Arc;

use tracing::{info, warn};

use cadenza_core::session::{MemorySessionStore, PgSessionStore, SessionStore};

use crate::config::{ApiConfig, SessionBackend};

/// Connect the configured session store and start its purge task.
///
/// Returns `None` when sessions are disabled or the store is unreachable;
/// the API then runs without revocation, refresh custody or session records.
pub async fn connect_session_store(config: &ApiConfig) -> Option<Arc<dyn SessionStore>> {
    match config.session_backend {
        SessionBackend::Disabled => {
            info!("session store disabled");
            None
        }
        SessionBackend::Memory => {
            let store = Arc::new(MemorySessionStore::new());
            store.spawn_purge_task();
            info!("using in-memory session store");
            Some(store)
        }
        SessionBackend::Postgres => match PgSessionStore::connect(config.session_url()).await {
            Ok(store) => {
                let store = Arc::new(store);
                store.spawn_purge_task();
                info!("connected to session store");
                Some(store)
            }
            Err(e) => {
                warn!(error = %e, "session store unavailable, continuing without revocation");
                None
            }
        },
    }
}
