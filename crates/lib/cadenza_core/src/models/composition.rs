//! Composition domain models.
//!
//! Types matching the `compositions` and `composition_items` tables, plus the
//! explicit field-update type used for every row mutation.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Id reported by the cart view when the creator has no draft.
pub const NO_DRAFT_ID: i64 = 0;

/// Composition status, as stored in the `status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompositionStatus {
    /// Mutable per-creator cart.
    Draft,
    /// Submitted by the creator, awaiting moderation.
    Formed,
    /// Accepted by a moderator.
    Completed,
    /// Declined by a moderator.
    Rejected,
    /// Soft-deleted draft.
    Deleted,
}

impl CompositionStatus {
    /// Database text representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompositionStatus::Draft => "draft",
            CompositionStatus::Formed => "formed",
            CompositionStatus::Completed => "completed",
            CompositionStatus::Rejected => "rejected",
            CompositionStatus::Deleted => "deleted",
        }
    }

    /// Parse the database text representation.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(CompositionStatus::Draft),
            "formed" => Some(CompositionStatus::Formed),
            "completed" => Some(CompositionStatus::Completed),
            "rejected" => Some(CompositionStatus::Rejected),
            "deleted" => Some(CompositionStatus::Deleted),
            _ => None,
        }
    }

    /// Whether compositions in this status show up in the general listing.
    pub fn is_listed(&self) -> bool {
        !matches!(self, CompositionStatus::Draft | CompositionStatus::Deleted)
    }
}

impl std::fmt::Display for CompositionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Externally computed classification of a completed composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Belonging {
    #[serde(rename = "belongs")]
    Belongs,
    #[serde(rename = "does not belong")]
    DoesNotBelong,
}

impl Belonging {
    pub fn as_str(&self) -> &'static str {
        match self {
            Belonging::Belongs => "belongs",
            Belonging::DoesNotBelong => "does not belong",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "belongs" => Some(Belonging::Belongs),
            "does not belong" => Some(Belonging::DoesNotBelong),
            _ => None,
        }
    }
}

impl std::fmt::Display for Belonging {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composition row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    pub id: i64,
    pub creator_id: Uuid,
    pub moderator_id: Option<Uuid>,
    pub status: CompositionStatus,
    pub belonging: Option<Belonging>,
    pub title: String,
    pub date_create: DateTime<Utc>,
    pub date_update: DateTime<Utc>,
    pub date_finish: Option<DateTime<Utc>>,
}

/// Item joined with the interval it references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionItemView {
    pub interval_id: i64,
    pub title: String,
    pub tone: f64,
    pub amount: i32,
}

/// One mutable composition field. `id`, `creator_id` and `date_create` are
/// immutable and have no variant.
#[derive(Debug, Clone, PartialEq)]
pub enum CompositionField {
    Title(String),
    Belonging(Option<Belonging>),
    Status(CompositionStatus),
    ModeratorId(Uuid),
    DateFinish(Option<DateTime<Utc>>),
}

/// A set of field changes applied as one atomic row update. `date_update` is
/// always bumped by the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositionUpdate {
    pub fields: Vec<CompositionField>,
    /// Only match a row that still holds at least one item.
    pub require_items: bool,
}

impl CompositionUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: CompositionField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn require_items(mut self) -> Self {
        self.require_items = true;
        self
    }

    /// Apply the changes to an in-memory row.
    pub fn apply_to(&self, composition: &mut Composition, now: DateTime<Utc>) {
        for field in &self.fields {
            match field {
                CompositionField::Title(title) => composition.title = title.clone(),
                CompositionField::Belonging(belonging) => composition.belonging = *belonging,
                CompositionField::Status(status) => composition.status = *status,
                CompositionField::ModeratorId(id) => composition.moderator_id = Some(*id),
                CompositionField::DateFinish(date) => composition.date_finish = *date,
            }
        }
        composition.date_update = now;
    }
}

/// Store-level listing filter. Draft and deleted compositions are always excluded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositionFilter {
    /// Restrict to one creator (non-moderator callers).
    pub creator_id: Option<Uuid>,
    pub status: Option<CompositionStatus>,
    /// Inclusive lower bound on `date_create` (day granularity).
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper bound on `date_create` (day granularity).
    pub date_to: Option<NaiveDate>,
}

impl CompositionFilter {
    /// Whether a row passes this filter.
    pub fn matches(&self, composition: &Composition) -> bool {
        if !composition.status.is_listed() {
            return false;
        }
        if let Some(creator) = self.creator_id
            && composition.creator_id != creator
        {
            return false;
        }
        if let Some(status) = self.status
            && composition.status != status
        {
            return false;
        }
        let day = composition.date_create.date_naive();
        if let Some(from) = self.date_from
            && day < from
        {
            return false;
        }
        if let Some(to) = self.date_to
            && day > to
        {
            return false;
        }
        true
    }
}

/// Cart view: the creator's current draft id and its item count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartInfo {
    pub composition_id: i64,
    pub item_count: i64,
}

impl CartInfo {
    pub fn empty() -> Self {
        Self {
            composition_id: NO_DRAFT_ID,
            item_count: 0,
        }
    }
}
