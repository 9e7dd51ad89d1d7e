//! Composition workflow service.
//!
//! Every operation takes the caller's verified [`Identity`] and enforces the
//! ownership and role rules before touching the store. Status changes go
//! through one guarded row update so a concurrent change surfaces as
//! `InvalidTransition` instead of being overwritten.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use super::scoring::ClassicismScore;
use super::state::Transition;
use super::WorkflowError;
use crate::calculator::{CalculationRequest, CalculationSink};
use crate::catalog::MAX_TEXT_LEN;
use crate::models::auth::Identity;
use crate::models::composition::{
    Belonging, CartInfo, Composition, CompositionField, CompositionFilter, CompositionItemView,
    CompositionStatus, CompositionUpdate,
};
use crate::store::{CatalogStore, CompositionStore, StoreError};

/// A composition with its items and score.
#[derive(Debug, Clone, Serialize)]
pub struct CompositionDetail {
    #[serde(flatten)]
    pub composition: Composition,
    pub items: Vec<CompositionItemView>,
    pub score: ClassicismScore,
}

/// Workflow over injected stores and a calculation sink.
#[derive(Clone)]
pub struct CompositionWorkflow {
    compositions: Arc<dyn CompositionStore>,
    catalog: Arc<dyn CatalogStore>,
    calculations: Arc<dyn CalculationSink>,
}

impl CompositionWorkflow {
    pub fn new(
        compositions: Arc<dyn CompositionStore>,
        catalog: Arc<dyn CatalogStore>,
        calculations: Arc<dyn CalculationSink>,
    ) -> Self {
        Self {
            compositions,
            catalog,
            calculations,
        }
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    /// Current draft id and item count, or [`CartInfo::empty`].
    pub async fn cart(&self, creator_id: Uuid) -> Result<CartInfo, WorkflowError> {
        let Some(draft) = self.compositions.find_draft(creator_id).await? else {
            return Ok(CartInfo::empty());
        };
        let item_count = self.compositions.count_items(draft.id).await?;
        Ok(CartInfo {
            composition_id: draft.id,
            item_count,
        })
    }

    /// Listed compositions. Non-moderators only ever see their own.
    pub async fn list(
        &self,
        actor: &Identity,
        mut filter: CompositionFilter,
    ) -> Result<Vec<Composition>, WorkflowError> {
        if !actor.is_moderator {
            filter.creator_id = Some(actor.subject_id);
        }
        Ok(self.compositions.list_compositions(&filter).await?)
    }

    /// One composition with items and score.
    ///
    /// Deleted compositions and other creators' drafts are `NotFound`; a
    /// non-moderator viewing another creator's composition is `Forbidden`.
    pub async fn get(&self, actor: &Identity, id: i64) -> Result<CompositionDetail, WorkflowError> {
        let composition = self.load(id).await?;
        let own = composition.creator_id == actor.subject_id;
        if composition.status == CompositionStatus::Draft && !own {
            return Err(not_found(id));
        }
        if !own && !actor.is_moderator {
            return Err(WorkflowError::Forbidden(
                "Only the creator or a moderator may view this composition".into(),
            ));
        }
        let items = self.compositions.list_items(id).await?;
        let score = ClassicismScore::of(&items);
        Ok(CompositionDetail {
            composition,
            items,
            score,
        })
    }

    // ------------------------------------------------------------------
    // Items
    // ------------------------------------------------------------------

    /// Add an interval to the caller's draft, creating the draft on demand.
    /// An existing item for the same interval takes the new amount.
    pub async fn add_item(
        &self,
        actor: &Identity,
        interval_id: i64,
        amount: i32,
    ) -> Result<Composition, WorkflowError> {
        validate_amount(amount)?;
        if self.catalog.get_interval(interval_id).await?.is_none() {
            return Err(WorkflowError::NotFound(format!("interval {interval_id}")));
        }
        let draft = self
            .compositions
            .upsert_draft_item(actor.subject_id, interval_id, amount)
            .await?;
        debug!(
            composition_id = draft.id,
            interval_id, amount, "interval added to draft"
        );
        Ok(draft)
    }

    pub async fn update_item(
        &self,
        actor: &Identity,
        composition_id: i64,
        interval_id: i64,
        amount: i32,
    ) -> Result<(), WorkflowError> {
        validate_amount(amount)?;
        self.load_own_draft(actor, composition_id).await?;
        match self
            .compositions
            .update_item_amount(composition_id, interval_id, amount)
            .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound(_)) => Err(self.item_miss(composition_id, interval_id).await),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn remove_item(
        &self,
        actor: &Identity,
        composition_id: i64,
        interval_id: i64,
    ) -> Result<(), WorkflowError> {
        self.load_own_draft(actor, composition_id).await?;
        match self
            .compositions
            .remove_item(composition_id, interval_id)
            .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound(_)) => Err(self.item_miss(composition_id, interval_id).await),
            Err(e) => Err(e.into()),
        }
    }

    // ------------------------------------------------------------------
    // Field updates
    // ------------------------------------------------------------------

    /// Rename the caller's draft.
    pub async fn update_title(
        &self,
        actor: &Identity,
        id: i64,
        title: &str,
    ) -> Result<Composition, WorkflowError> {
        if title.chars().count() > MAX_TEXT_LEN {
            return Err(WorkflowError::Validation(format!(
                "Title must be at most {MAX_TEXT_LEN} characters"
            )));
        }
        self.load_own_draft(actor, id).await?;
        let update = CompositionUpdate::new().set(CompositionField::Title(title.to_string()));
        self.guarded_update(id, CompositionStatus::Draft, &update)
            .await
    }

    /// Record the calculator's classification. Allowed in any status.
    pub async fn apply_calculation_result(
        &self,
        id: i64,
        belonging: Belonging,
    ) -> Result<Composition, WorkflowError> {
        let update = CompositionUpdate::new().set(CompositionField::Belonging(Some(belonging)));
        let composition = self.compositions.apply_update(id, None, &update).await?;
        info!(composition_id = id, belonging = %belonging, "calculation result recorded");
        Ok(composition)
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Draft → Formed. Creator only; the draft must hold at least one item.
    pub async fn form(&self, actor: &Identity, id: i64) -> Result<Composition, WorkflowError> {
        let composition = self.load(id).await?;
        require_creator(actor, &composition)?;
        let next = Transition::Form.apply(composition.status)?;
        let update = CompositionUpdate::new()
            .set(CompositionField::Status(next))
            .set(CompositionField::DateFinish(None))
            .require_items();
        let formed = self.guarded_update(id, composition.status, &update).await?;
        info!(composition_id = id, creator_id = %actor.subject_id, "composition formed");
        Ok(formed)
    }

    /// Formed → Completed. Moderator only; queues the calculation request.
    pub async fn complete(&self, actor: &Identity, id: i64) -> Result<Composition, WorkflowError> {
        require_moderator(actor)?;
        let composition = self.load(id).await?;
        let next = Transition::Complete.apply(composition.status)?;
        let update = CompositionUpdate::new()
            .set(CompositionField::Status(next))
            .set(CompositionField::ModeratorId(actor.subject_id))
            .set(CompositionField::DateFinish(Some(Utc::now())))
            .set(CompositionField::Belonging(None));
        let completed = self.guarded_update(id, composition.status, &update).await?;
        info!(composition_id = id, moderator_id = %actor.subject_id, "composition completed");
        self.calculations
            .submit(CalculationRequest { composition_id: id });
        Ok(completed)
    }

    /// Formed → Rejected. Moderator only; `belonging` is left unchanged.
    pub async fn reject(&self, actor: &Identity, id: i64) -> Result<Composition, WorkflowError> {
        require_moderator(actor)?;
        let composition = self.load(id).await?;
        let next = Transition::Reject.apply(composition.status)?;
        let update = CompositionUpdate::new()
            .set(CompositionField::Status(next))
            .set(CompositionField::ModeratorId(actor.subject_id))
            .set(CompositionField::DateFinish(Some(Utc::now())));
        let rejected = self.guarded_update(id, composition.status, &update).await?;
        info!(composition_id = id, moderator_id = %actor.subject_id, "composition rejected");
        Ok(rejected)
    }

    /// Draft → Deleted (soft). Creator only.
    pub async fn delete(&self, actor: &Identity, id: i64) -> Result<Composition, WorkflowError> {
        let composition = self.load(id).await?;
        require_creator(actor, &composition)?;
        let next = Transition::Delete.apply(composition.status)?;
        let update = CompositionUpdate::new().set(CompositionField::Status(next));
        let deleted = self.guarded_update(id, composition.status, &update).await?;
        info!(composition_id = id, "composition deleted");
        Ok(deleted)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// A composition that exists and is not soft-deleted.
    async fn load(&self, id: i64) -> Result<Composition, WorkflowError> {
        match self.compositions.get_composition(id).await? {
            Some(c) if c.status != CompositionStatus::Deleted => Ok(c),
            _ => Err(not_found(id)),
        }
    }

    async fn load_own_draft(
        &self,
        actor: &Identity,
        id: i64,
    ) -> Result<Composition, WorkflowError> {
        let composition = self.load(id).await?;
        require_creator(actor, &composition)?;
        if composition.status != CompositionStatus::Draft {
            return Err(WorkflowError::InvalidTransition(format!(
                "Only draft compositions can be edited (status is {})",
                composition.status
            )));
        }
        Ok(composition)
    }

    /// Apply `update` only while the row is still in `expected`.
    async fn guarded_update(
        &self,
        id: i64,
        expected: CompositionStatus,
        update: &CompositionUpdate,
    ) -> Result<Composition, WorkflowError> {
        match self
            .compositions
            .apply_update(id, Some(expected), update)
            .await
        {
            Ok(composition) => Ok(composition),
            Err(StoreError::NotFound(_)) => match self.compositions.get_composition(id).await? {
                Some(current) if current.status == expected && update.require_items => {
                    Err(WorkflowError::InvalidTransition(
                        "At least one interval must be added before forming".into(),
                    ))
                }
                Some(current) => Err(WorkflowError::InvalidTransition(format!(
                    "composition {id} is now {}",
                    current.status
                ))),
                None => Err(not_found(id)),
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Explain an item statement that matched nothing: the composition left
    /// draft status after the ownership check, or the item is absent.
    async fn item_miss(&self, composition_id: i64, interval_id: i64) -> WorkflowError {
        match self.compositions.get_composition(composition_id).await {
            Ok(Some(current)) if current.status != CompositionStatus::Draft => {
                WorkflowError::InvalidTransition(format!(
                    "Only draft compositions can be edited (status is {})",
                    current.status
                ))
            }
            Ok(_) => WorkflowError::NotFound(format!(
                "interval {interval_id} in composition {composition_id}"
            )),
            Err(e) => e.into(),
        }
    }
}

fn not_found(id: i64) -> WorkflowError {
    WorkflowError::NotFound(format!("composition {id}"))
}

fn validate_amount(amount: i32) -> Result<(), WorkflowError> {
    if amount < 1 {
        return Err(WorkflowError::Validation("Amount must be at least 1".into()));
    }
    Ok(())
}

fn require_creator(actor: &Identity, composition: &Composition) -> Result<(), WorkflowError> {
    if composition.creator_id != actor.subject_id {
        return Err(WorkflowError::Forbidden(
            "Only the creator may modify this composition".into(),
        ));
    }
    Ok(())
}

fn require_moderator(actor: &Identity) -> Result<(), WorkflowError> {
    if !actor.is_moderator {
        return Err(WorkflowError::Forbidden("Moderator role required".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::models::interval::NewInterval;
    use crate::store::{MemoryStore, UserStore};

    #[derive(Default)]
    struct RecordingSink {
        submitted: Mutex<Vec<CalculationRequest>>,
    }

    impl CalculationSink for RecordingSink {
        fn submit(&self, request: CalculationRequest) {
            self.submitted.lock().unwrap().push(request);
        }
    }

    /// A change another request commits between a read and the next write.
    enum Interleaved {
        Form,
        RemoveItem(i64),
    }

    /// Runs one [`Interleaved`] change right after the next composition read,
    /// then hands back the stale row.
    struct Interleaving {
        inner: Arc<MemoryStore>,
        pending: Mutex<Option<Interleaved>>,
    }

    impl Interleaving {
        fn new(inner: Arc<MemoryStore>, change: Interleaved) -> Self {
            Self {
                inner,
                pending: Mutex::new(Some(change)),
            }
        }
    }

    #[async_trait]
    impl CompositionStore for Interleaving {
        async fn find_draft(&self, creator_id: Uuid) -> Result<Option<Composition>, StoreError> {
            self.inner.find_draft(creator_id).await
        }

        async fn count_items(&self, composition_id: i64) -> Result<i64, StoreError> {
            self.inner.count_items(composition_id).await
        }

        async fn upsert_draft_item(
            &self,
            creator_id: Uuid,
            interval_id: i64,
            amount: i32,
        ) -> Result<Composition, StoreError> {
            self.inner
                .upsert_draft_item(creator_id, interval_id, amount)
                .await
        }

        async fn update_item_amount(
            &self,
            composition_id: i64,
            interval_id: i64,
            amount: i32,
        ) -> Result<(), StoreError> {
            self.inner
                .update_item_amount(composition_id, interval_id, amount)
                .await
        }

        async fn remove_item(
            &self,
            composition_id: i64,
            interval_id: i64,
        ) -> Result<(), StoreError> {
            self.inner.remove_item(composition_id, interval_id).await
        }

        async fn get_composition(&self, id: i64) -> Result<Option<Composition>, StoreError> {
            let snapshot = self.inner.get_composition(id).await?;
            let change = self.pending.lock().unwrap().take();
            match change {
                Some(Interleaved::Form) => {
                    let form = CompositionUpdate::new()
                        .set(CompositionField::Status(CompositionStatus::Formed));
                    self.inner
                        .apply_update(id, Some(CompositionStatus::Draft), &form)
                        .await?;
                }
                Some(Interleaved::RemoveItem(interval_id)) => {
                    self.inner.remove_item(id, interval_id).await?;
                }
                None => {}
            }
            Ok(snapshot)
        }

        async fn list_items(
            &self,
            composition_id: i64,
        ) -> Result<Vec<CompositionItemView>, StoreError> {
            self.inner.list_items(composition_id).await
        }

        async fn list_compositions(
            &self,
            filter: &CompositionFilter,
        ) -> Result<Vec<Composition>, StoreError> {
            self.inner.list_compositions(filter).await
        }

        async fn apply_update(
            &self,
            id: i64,
            expected: Option<CompositionStatus>,
            update: &CompositionUpdate,
        ) -> Result<Composition, StoreError> {
            self.inner.apply_update(id, expected, update).await
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        workflow: CompositionWorkflow,
        sink: Arc<RecordingSink>,
        creator: Identity,
        other: Identity,
        moderator: Identity,
        fifth: i64,
        third: i64,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(RecordingSink::default());
        let mut identities = Vec::new();
        for (login, is_moderator) in [("haydn", false), ("mozart", false), ("salieri", true)] {
            let user = store.create_user(login, "hash", is_moderator).await.unwrap();
            identities.push(Identity::from(&user));
        }
        let fifth = store
            .create_interval(&NewInterval {
                title: "Fifth".into(),
                description: String::new(),
                tone: 2.0,
            })
            .await
            .unwrap()
            .id;
        let third = store
            .create_interval(&NewInterval {
                title: "Third".into(),
                description: String::new(),
                tone: 4.0,
            })
            .await
            .unwrap()
            .id;
        let moderator = identities.pop().unwrap();
        let other = identities.pop().unwrap();
        let creator = identities.pop().unwrap();
        Fixture {
            workflow: CompositionWorkflow::new(store.clone(), store.clone(), sink.clone()),
            store,
            sink,
            creator,
            other,
            moderator,
            fifth,
            third,
        }
    }

    #[tokio::test]
    async fn empty_draft_cannot_be_formed() {
        let f = fixture().await;
        let draft = f.workflow.add_item(&f.creator, f.fifth, 1).await.unwrap();
        f.workflow.remove_item(&f.creator, draft.id, f.fifth).await.unwrap();
        match f.workflow.form(&f.creator, draft.id).await {
            Err(WorkflowError::InvalidTransition(msg)) => {
                assert!(msg.starts_with("At least one interval"), "{msg}");
            }
            other => panic!("expected InvalidTransition, got {other:?}"),
        }

        f.workflow.add_item(&f.creator, f.fifth, 1).await.unwrap();
        let formed = f.workflow.form(&f.creator, draft.id).await.unwrap();
        assert_eq!(formed.status, CompositionStatus::Formed);
        assert_eq!(formed.date_finish, None);
    }

    #[tokio::test]
    async fn item_edits_lose_to_a_concurrent_form() {
        let f = fixture().await;

        // `Some(amount)` edits the item, `None` removes it.
        for (actor, edit) in [(&f.creator, Some(5)), (&f.other, None)] {
            let draft = f.workflow.add_item(actor, f.fifth, 1).await.unwrap();
            let racing = CompositionWorkflow::new(
                Arc::new(Interleaving::new(f.store.clone(), Interleaved::Form)),
                f.store.clone(),
                f.sink.clone(),
            );
            let result = match edit {
                Some(amount) => racing.update_item(actor, draft.id, f.fifth, amount).await,
                None => racing.remove_item(actor, draft.id, f.fifth).await,
            };
            assert!(matches!(result, Err(WorkflowError::InvalidTransition(_))));

            let detail = f.workflow.get(actor, draft.id).await.unwrap();
            assert_eq!(detail.composition.status, CompositionStatus::Formed);
            assert_eq!(detail.items.len(), 1);
            assert_eq!(detail.items[0].amount, 1);
        }
    }

    #[tokio::test]
    async fn form_loses_to_a_concurrent_last_item_removal() {
        let f = fixture().await;
        let draft = f.workflow.add_item(&f.creator, f.fifth, 1).await.unwrap();
        let racing = CompositionWorkflow::new(
            Arc::new(Interleaving::new(
                f.store.clone(),
                Interleaved::RemoveItem(f.fifth),
            )),
            f.store.clone(),
            f.sink.clone(),
        );
        assert!(matches!(
            racing.form(&f.creator, draft.id).await,
            Err(WorkflowError::InvalidTransition(_))
        ));
        let current = f.store.get_composition(draft.id).await.unwrap().unwrap();
        assert_eq!(current.status, CompositionStatus::Draft);
    }

    #[tokio::test]
    async fn missing_item_is_not_found_on_a_draft() {
        let f = fixture().await;
        let draft = f.workflow.add_item(&f.creator, f.fifth, 1).await.unwrap();
        assert!(matches!(
            f.workflow.update_item(&f.creator, draft.id, f.third, 2).await,
            Err(WorkflowError::NotFound(_))
        ));
        assert!(matches!(
            f.workflow.remove_item(&f.creator, draft.id, f.third).await,
            Err(WorkflowError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn cart_reports_draft_and_item_count() {
        let f = fixture().await;
        assert_eq!(f.workflow.cart(f.creator.subject_id).await.unwrap(), CartInfo::empty());

        let draft = f.workflow.add_item(&f.creator, f.fifth, 2).await.unwrap();
        f.workflow.add_item(&f.creator, f.third, 1).await.unwrap();
        let cart = f.workflow.cart(f.creator.subject_id).await.unwrap();
        assert_eq!(cart.composition_id, draft.id);
        assert_eq!(cart.item_count, 2);
    }

    #[tokio::test]
    async fn complete_records_moderator_and_queues_calculation() {
        let f = fixture().await;
        let draft = f.workflow.add_item(&f.creator, f.fifth, 1).await.unwrap();
        f.workflow.form(&f.creator, draft.id).await.unwrap();

        assert!(matches!(
            f.workflow.complete(&f.creator, draft.id).await,
            Err(WorkflowError::Forbidden(_))
        ));

        let done = f.workflow.complete(&f.moderator, draft.id).await.unwrap();
        assert_eq!(done.status, CompositionStatus::Completed);
        assert_eq!(done.moderator_id, Some(f.moderator.subject_id));
        assert!(done.date_finish.is_some());
        assert_eq!(done.belonging, None);
        assert_eq!(
            *f.sink.submitted.lock().unwrap(),
            vec![CalculationRequest {
                composition_id: draft.id
            }]
        );
    }

    #[tokio::test]
    async fn illegal_transitions_leave_state_unchanged() {
        let f = fixture().await;
        let draft = f.workflow.add_item(&f.creator, f.fifth, 1).await.unwrap();

        assert!(matches!(
            f.workflow.complete(&f.moderator, draft.id).await,
            Err(WorkflowError::InvalidTransition(_))
        ));
        assert!(f.sink.submitted.lock().unwrap().is_empty());

        f.workflow.form(&f.creator, draft.id).await.unwrap();
        for result in [
            f.workflow.delete(&f.creator, draft.id).await,
            f.workflow.form(&f.creator, draft.id).await,
        ] {
            assert!(matches!(result, Err(WorkflowError::InvalidTransition(_))));
        }
        let detail = f.workflow.get(&f.creator, draft.id).await.unwrap();
        assert_eq!(detail.composition.status, CompositionStatus::Formed);
    }

    #[tokio::test]
    async fn reject_keeps_belonging() {
        let f = fixture().await;
        let draft = f.workflow.add_item(&f.creator, f.fifth, 1).await.unwrap();
        f.workflow
            .apply_calculation_result(draft.id, Belonging::Belongs)
            .await
            .unwrap();
        f.workflow.form(&f.creator, draft.id).await.unwrap();
        let rejected = f.workflow.reject(&f.moderator, draft.id).await.unwrap();
        assert_eq!(rejected.status, CompositionStatus::Rejected);
        assert_eq!(rejected.belonging, Some(Belonging::Belongs));
        assert!(f.sink.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn only_the_creator_edits_a_draft() {
        let f = fixture().await;
        let draft = f.workflow.add_item(&f.creator, f.fifth, 1).await.unwrap();
        assert!(matches!(
            f.workflow.update_item(&f.other, draft.id, f.fifth, 3).await,
            Err(WorkflowError::Forbidden(_))
        ));
        assert!(matches!(
            f.workflow.delete(&f.other, draft.id).await,
            Err(WorkflowError::Forbidden(_))
        ));
        assert!(matches!(
            f.workflow.update_title(&f.other, draft.id, "Mine").await,
            Err(WorkflowError::Forbidden(_))
        ));
        let renamed = f
            .workflow
            .update_title(&f.creator, draft.id, "Sonata")
            .await
            .unwrap();
        assert_eq!(renamed.title, "Sonata");
    }

    #[tokio::test]
    async fn listing_is_scoped_to_creator_for_non_moderators() {
        let f = fixture().await;
        for actor in [&f.creator, &f.other] {
            let draft = f.workflow.add_item(actor, f.fifth, 1).await.unwrap();
            f.workflow.form(actor, draft.id).await.unwrap();
        }
        let mine = f
            .workflow
            .list(&f.creator, CompositionFilter::default())
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert!(mine.iter().all(|c| c.creator_id == f.creator.subject_id));

        let all = f
            .workflow
            .list(&f.moderator, CompositionFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn detail_view_carries_score_and_respects_ownership() {
        let f = fixture().await;
        let draft = f.workflow.add_item(&f.creator, f.fifth, 2).await.unwrap();
        f.workflow.add_item(&f.creator, f.third, 1).await.unwrap();

        assert!(matches!(
            f.workflow.get(&f.moderator, draft.id).await,
            Err(WorkflowError::NotFound(_))
        ));

        f.workflow.form(&f.creator, draft.id).await.unwrap();
        let detail = f.workflow.get(&f.moderator, draft.id).await.unwrap();
        assert_eq!(detail.items.len(), 2);
        assert!((detail.score.coefficient - 0.867).abs() < 1e-3);

        assert!(matches!(
            f.workflow.get(&f.other, draft.id).await,
            Err(WorkflowError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn deleted_draft_frees_the_cart() {
        let f = fixture().await;
        let draft = f.workflow.add_item(&f.creator, f.fifth, 1).await.unwrap();
        f.workflow.delete(&f.creator, draft.id).await.unwrap();
        assert!(matches!(
            f.workflow.get(&f.creator, draft.id).await,
            Err(WorkflowError::NotFound(_))
        ));
        let next = f.workflow.add_item(&f.creator, f.fifth, 1).await.unwrap();
        assert_ne!(next.id, draft.id);
    }

    #[tokio::test]
    async fn invalid_amounts_and_missing_intervals() {
        let f = fixture().await;
        assert!(matches!(
            f.workflow.add_item(&f.creator, f.fifth, 0).await,
            Err(WorkflowError::Validation(_))
        ));
        assert!(matches!(
            f.workflow.add_item(&f.creator, 9_999, 1).await,
            Err(WorkflowError::NotFound(_))
        ));
    }
}
