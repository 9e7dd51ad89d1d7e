//! In-process implementation of the store traits.
//!
//! One `RwLock` guards all tables, so every trait method is atomic with
//! respect to the others. Used for development and tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CatalogStore, CompositionStore, StoreError, UserStore};
use crate::models::auth::{User, UserWithPassword};
use crate::models::composition::{
    Composition, CompositionFilter, CompositionItemView, CompositionStatus, CompositionUpdate,
};
use crate::models::interval::{Interval, IntervalFilter, IntervalUpdate, NewInterval, PageRequest};
use crate::uuid::uuidv7;

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<Uuid, UserWithPassword>,
    intervals: BTreeMap<i64, Interval>,
    compositions: BTreeMap<i64, Composition>,
    /// `(composition_id, interval_id)` → amount.
    items: BTreeMap<(i64, i64), i32>,
    last_interval_id: i64,
    last_composition_id: i64,
}

impl Tables {
    fn login_taken(&self, login: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|u| u.user.login == login && Some(u.user.id) != except)
    }

    fn live_interval_mut(&mut self, id: i64) -> Result<&mut Interval, StoreError> {
        self.intervals
            .get_mut(&id)
            .filter(|i| !i.is_deleted)
            .ok_or_else(|| StoreError::NotFound(format!("interval {id}")))
    }

    fn draft_of(&self, creator_id: Uuid) -> Option<&Composition> {
        self.compositions
            .values()
            .find(|c| c.creator_id == creator_id && c.status == CompositionStatus::Draft)
    }

    fn is_draft(&self, composition_id: i64) -> bool {
        self.compositions
            .get(&composition_id)
            .is_some_and(|c| c.status == CompositionStatus::Draft)
    }

    fn has_items(&self, composition_id: i64) -> bool {
        self.items
            .range((composition_id, i64::MIN)..=(composition_id, i64::MAX))
            .next()
            .is_some()
    }
}

/// Store keeping every table in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_login(
        &self,
        login: &str,
    ) -> Result<Option<UserWithPassword>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.user.login == login)
            .cloned())
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(&id).map(|u| u.user.clone()))
    }

    async fn create_user(
        &self,
        login: &str,
        password_hash: &str,
        is_moderator: bool,
    ) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.login_taken(login, None) {
            return Err(StoreError::Conflict("login already taken".into()));
        }
        let user = User {
            id: uuidv7(),
            login: login.to_string(),
            is_moderator,
        };
        tables.users.insert(
            user.id,
            UserWithPassword {
                user: user.clone(),
                password_hash: password_hash.to_string(),
            },
        );
        Ok(user)
    }

    async fn update_user(
        &self,
        id: Uuid,
        login: Option<&str>,
        password_hash: Option<&str>,
    ) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(login) = login
            && tables.login_taken(login, Some(id))
        {
            return Err(StoreError::Conflict("login already taken".into()));
        }
        let record = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("user {id}")))?;
        if let Some(login) = login {
            record.user.login = login.to_string();
        }
        if let Some(hash) = password_hash {
            record.password_hash = hash.to_string();
        }
        Ok(record.user.clone())
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn list_intervals(
        &self,
        filter: &IntervalFilter,
        page: PageRequest,
    ) -> Result<(Vec<Interval>, i64), StoreError> {
        let tables = self.tables.read().await;
        let matching: Vec<&Interval> = tables
            .intervals
            .values()
            .filter(|i| filter.matches(i))
            .collect();
        let total = matching.len() as i64;
        let page_items = matching
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(page.page_size).unwrap_or(0))
            .cloned()
            .collect();
        Ok((page_items, total))
    }

    async fn get_interval(&self, id: i64) -> Result<Option<Interval>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .intervals
            .get(&id)
            .filter(|i| !i.is_deleted)
            .cloned())
    }

    async fn create_interval(&self, interval: &NewInterval) -> Result<Interval, StoreError> {
        let mut tables = self.tables.write().await;
        tables.last_interval_id += 1;
        let created = Interval {
            id: tables.last_interval_id,
            title: interval.title.clone(),
            description: interval.description.clone(),
            tone: interval.tone,
            photo_url: None,
            is_deleted: false,
        };
        tables.intervals.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_interval(
        &self,
        id: i64,
        update: &IntervalUpdate,
    ) -> Result<Interval, StoreError> {
        let mut tables = self.tables.write().await;
        let interval = tables.live_interval_mut(id)?;
        update.apply_to(interval);
        Ok(interval.clone())
    }

    async fn set_interval_photo(&self, id: i64, photo_url: &str) -> Result<Interval, StoreError> {
        let mut tables = self.tables.write().await;
        let interval = tables.live_interval_mut(id)?;
        interval.photo_url = Some(photo_url.to_string());
        Ok(interval.clone())
    }

    async fn delete_interval(&self, id: i64) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.live_interval_mut(id)?.is_deleted = true;
        Ok(())
    }
}

#[async_trait]
impl CompositionStore for MemoryStore {
    async fn find_draft(&self, creator_id: Uuid) -> Result<Option<Composition>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.draft_of(creator_id).cloned())
    }

    async fn count_items(&self, composition_id: i64) -> Result<i64, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .items
            .range((composition_id, i64::MIN)..=(composition_id, i64::MAX))
            .count() as i64)
    }

    async fn upsert_draft_item(
        &self,
        creator_id: Uuid,
        interval_id: i64,
        amount: i32,
    ) -> Result<Composition, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.intervals.contains_key(&interval_id) {
            return Err(StoreError::NotFound(format!("interval {interval_id}")));
        }
        let now = Utc::now();
        let existing = tables.draft_of(creator_id).map(|draft| draft.id);
        let draft_id = match existing {
            Some(id) => id,
            None => {
                tables.last_composition_id += 1;
                let draft = Composition {
                    id: tables.last_composition_id,
                    creator_id,
                    moderator_id: None,
                    status: CompositionStatus::Draft,
                    belonging: None,
                    title: String::new(),
                    date_create: now,
                    date_update: now,
                    date_finish: None,
                };
                tables.compositions.insert(draft.id, draft);
                tables.last_composition_id
            }
        };
        tables.items.insert((draft_id, interval_id), amount);
        let draft = tables
            .compositions
            .get_mut(&draft_id)
            .ok_or_else(|| StoreError::NotFound(format!("composition {draft_id}")))?;
        draft.date_update = now;
        Ok(draft.clone())
    }

    async fn update_item_amount(
        &self,
        composition_id: i64,
        interval_id: i64,
        amount: i32,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.is_draft(composition_id) {
            return Err(StoreError::NotFound(format!("draft composition {composition_id}")));
        }
        match tables.items.get_mut(&(composition_id, interval_id)) {
            Some(current) => {
                *current = amount;
                Ok(())
            }
            None => Err(StoreError::NotFound(format!(
                "interval {interval_id} in composition {composition_id}"
            ))),
        }
    }

    async fn remove_item(&self, composition_id: i64, interval_id: i64) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.is_draft(composition_id) {
            return Err(StoreError::NotFound(format!("draft composition {composition_id}")));
        }
        tables
            .items
            .remove(&(composition_id, interval_id))
            .map(|_| ())
            .ok_or_else(|| {
                StoreError::NotFound(format!(
                    "interval {interval_id} in composition {composition_id}"
                ))
            })
    }

    async fn get_composition(&self, id: i64) -> Result<Option<Composition>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.compositions.get(&id).cloned())
    }

    async fn list_items(
        &self,
        composition_id: i64,
    ) -> Result<Vec<CompositionItemView>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .items
            .range((composition_id, i64::MIN)..=(composition_id, i64::MAX))
            .filter_map(|(&(_, interval_id), &amount)| {
                tables
                    .intervals
                    .get(&interval_id)
                    .map(|interval| CompositionItemView {
                        interval_id,
                        title: interval.title.clone(),
                        tone: interval.tone,
                        amount,
                    })
            })
            .collect())
    }

    async fn list_compositions(
        &self,
        filter: &CompositionFilter,
    ) -> Result<Vec<Composition>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .compositions
            .values()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect())
    }

    async fn apply_update(
        &self,
        id: i64,
        expected: Option<CompositionStatus>,
        update: &CompositionUpdate,
    ) -> Result<Composition, StoreError> {
        let mut tables = self.tables.write().await;
        if update.require_items && !tables.has_items(id) {
            return Err(StoreError::NotFound(format!("composition {id} with items")));
        }
        let composition = tables
            .compositions
            .get_mut(&id)
            .filter(|c| expected.is_none_or(|status| c.status == status))
            .ok_or_else(|| StoreError::NotFound(format!("composition {id}")))?;
        update.apply_to(composition, Utc::now());
        Ok(composition.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::composition::CompositionField;

    async fn seeded() -> (MemoryStore, Uuid, i64) {
        let store = MemoryStore::new();
        let user = store.create_user("liszt", "hash", false).await.unwrap();
        let interval = store
            .create_interval(&NewInterval {
                title: "Major third".into(),
                description: String::new(),
                tone: 2.0,
            })
            .await
            .unwrap();
        (store, user.id, interval.id)
    }

    #[tokio::test]
    async fn duplicate_login_conflicts() {
        let (store, _, _) = seeded().await;
        assert!(matches!(
            store.create_user("liszt", "other", true).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn repeated_adds_share_one_draft() {
        let (store, creator, interval) = seeded().await;
        let first = store.upsert_draft_item(creator, interval, 1).await.unwrap();
        let second = store.upsert_draft_item(creator, interval, 3).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.count_items(first.id).await.unwrap(), 1);
        let items = store.list_items(first.id).await.unwrap();
        assert_eq!(items[0].amount, 3);
    }

    #[tokio::test]
    async fn guarded_update_misses_on_wrong_status() {
        let (store, creator, interval) = seeded().await;
        let draft = store.upsert_draft_item(creator, interval, 1).await.unwrap();
        let update = CompositionUpdate::new()
            .set(CompositionField::Status(CompositionStatus::Completed));
        assert!(matches!(
            store
                .apply_update(draft.id, Some(CompositionStatus::Formed), &update)
                .await,
            Err(StoreError::NotFound(_))
        ));
        let unchanged = store.get_composition(draft.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, CompositionStatus::Draft);
    }

    #[tokio::test]
    async fn deleted_intervals_are_hidden() {
        let (store, _, interval) = seeded().await;
        store.delete_interval(interval).await.unwrap();
        assert!(store.get_interval(interval).await.unwrap().is_none());
        assert!(matches!(
            store.delete_interval(interval).await,
            Err(StoreError::NotFound(_))
        ));
        let (page, total) = store
            .list_intervals(
                &IntervalFilter::default(),
                PageRequest {
                    page: 1,
                    page_size: 8,
                },
            )
            .await
            .unwrap();
        assert!(page.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn missing_item_is_not_found() {
        let (store, creator, interval) = seeded().await;
        let draft = store.upsert_draft_item(creator, interval, 1).await.unwrap();
        store.remove_item(draft.id, interval).await.unwrap();
        assert!(matches!(
            store.remove_item(draft.id, interval).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.update_item_amount(draft.id, interval, 2).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn items_are_frozen_once_formed() {
        let (store, creator, interval) = seeded().await;
        let draft = store.upsert_draft_item(creator, interval, 1).await.unwrap();
        let form = CompositionUpdate::new().set(CompositionField::Status(CompositionStatus::Formed));
        store
            .apply_update(draft.id, Some(CompositionStatus::Draft), &form)
            .await
            .unwrap();

        assert!(matches!(
            store.update_item_amount(draft.id, interval, 5).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.remove_item(draft.id, interval).await,
            Err(StoreError::NotFound(_))
        ));
        let items = store.list_items(draft.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].amount, 1);
    }

    #[tokio::test]
    async fn update_requiring_items_misses_on_empty_draft() {
        let (store, creator, interval) = seeded().await;
        let draft = store.upsert_draft_item(creator, interval, 1).await.unwrap();
        store.remove_item(draft.id, interval).await.unwrap();

        let form = CompositionUpdate::new()
            .set(CompositionField::Status(CompositionStatus::Formed))
            .require_items();
        assert!(matches!(
            store
                .apply_update(draft.id, Some(CompositionStatus::Draft), &form)
                .await,
            Err(StoreError::NotFound(_))
        ));
        let unchanged = store.get_composition(draft.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, CompositionStatus::Draft);

        store.upsert_draft_item(creator, interval, 2).await.unwrap();
        let formed = store
            .apply_update(draft.id, Some(CompositionStatus::Draft), &form)
            .await
            .unwrap();
        assert_eq!(formed.status, CompositionStatus::Formed);
    }

    #[tokio::test]
    async fn page_past_the_end_is_empty() {
        let (store, _, _) = seeded().await;
        let (page, total) = store
            .list_intervals(
                &IntervalFilter::default(),
                PageRequest {
                    page: i64::MAX,
                    page_size: 8,
                },
            )
            .await
            .unwrap();
        assert!(page.is_empty());
        assert_eq!(total, 1);
    }
}
