//! Relational store contracts.
//!
//! The workflow and API layers only talk to these traits. [`PgStore`] backs
//! them with PostgreSQL; [`MemoryStore`] keeps everything in-process.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::auth::{User, UserWithPassword};
use crate::models::composition::{
    Composition, CompositionFilter, CompositionItemView, CompositionStatus, CompositionUpdate,
};
use crate::models::interval::{Interval, IntervalFilter, IntervalUpdate, NewInterval, PageRequest};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// User accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_login(&self, login: &str)
    -> Result<Option<UserWithPassword>, StoreError>;

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Create a user. Fails with `Conflict` when the login is taken.
    async fn create_user(
        &self,
        login: &str,
        password_hash: &str,
        is_moderator: bool,
    ) -> Result<User, StoreError>;

    /// Update login and/or password hash. Fails with `NotFound` for an
    /// unknown id and `Conflict` when the new login is taken.
    async fn update_user(
        &self,
        id: Uuid,
        login: Option<&str>,
        password_hash: Option<&str>,
    ) -> Result<User, StoreError>;
}

/// Catalog intervals.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// One page of non-deleted intervals ordered by id, plus the total match count.
    async fn list_intervals(
        &self,
        filter: &IntervalFilter,
        page: PageRequest,
    ) -> Result<(Vec<Interval>, i64), StoreError>;

    /// Fetch a non-deleted interval.
    async fn get_interval(&self, id: i64) -> Result<Option<Interval>, StoreError>;

    async fn create_interval(&self, interval: &NewInterval) -> Result<Interval, StoreError>;

    async fn update_interval(&self, id: i64, update: &IntervalUpdate)
    -> Result<Interval, StoreError>;

    async fn set_interval_photo(&self, id: i64, photo_url: &str) -> Result<Interval, StoreError>;

    /// Soft delete. Fails with `NotFound` when absent or already deleted.
    async fn delete_interval(&self, id: i64) -> Result<(), StoreError>;
}

/// Compositions and their item associations.
#[async_trait]
pub trait CompositionStore: Send + Sync {
    /// The creator's current draft, if any.
    async fn find_draft(&self, creator_id: Uuid) -> Result<Option<Composition>, StoreError>;

    async fn count_items(&self, composition_id: i64) -> Result<i64, StoreError>;

    /// Atomically find-or-create the creator's draft and upsert the item
    /// `(draft, interval_id)` with `amount`. Returns the draft.
    async fn upsert_draft_item(
        &self,
        creator_id: Uuid,
        interval_id: i64,
        amount: i32,
    ) -> Result<Composition, StoreError>;

    /// Change the amount of an existing item of a draft composition.
    /// `NotFound` if the association is absent or the composition has left
    /// draft status.
    async fn update_item_amount(
        &self,
        composition_id: i64,
        interval_id: i64,
        amount: i32,
    ) -> Result<(), StoreError>;

    /// Delete an item of a draft composition. `NotFound` under the same
    /// conditions as [`CompositionStore::update_item_amount`].
    async fn remove_item(&self, composition_id: i64, interval_id: i64) -> Result<(), StoreError>;

    async fn get_composition(&self, id: i64) -> Result<Option<Composition>, StoreError>;

    /// Items joined with their intervals, ordered by interval id.
    async fn list_items(&self, composition_id: i64)
    -> Result<Vec<CompositionItemView>, StoreError>;

    /// Listed compositions (never drafts or deleted) ordered by id.
    async fn list_compositions(
        &self,
        filter: &CompositionFilter,
    ) -> Result<Vec<Composition>, StoreError>;

    /// Apply `update` in a single row update, guarded by `expected` status
    /// when given and by item presence when `update.require_items` is set.
    /// Zero rows affected surfaces as `NotFound`.
    async fn apply_update(
        &self,
        id: i64,
        expected: Option<CompositionStatus>,
        update: &CompositionUpdate,
    ) -> Result<Composition, StoreError>;
}
