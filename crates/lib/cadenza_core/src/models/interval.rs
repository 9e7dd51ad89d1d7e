//! Catalog (interval) domain models.

use serde::{Deserialize, Serialize};

/// Catalog item referenced by compositions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub tone: f64,
    pub photo_url: Option<String>,
    pub is_deleted: bool,
}

/// Fields for a new interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInterval {
    pub title: String,
    pub description: String,
    pub tone: f64,
}

/// Partial interval update. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntervalUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tone: Option<f64>,
}

impl IntervalUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.tone.is_none()
    }

    pub fn apply_to(&self, interval: &mut Interval) {
        if let Some(title) = &self.title {
            interval.title = title.clone();
        }
        if let Some(description) = &self.description {
            interval.description = description.clone();
        }
        if let Some(tone) = self.tone {
            interval.tone = tone;
        }
    }
}

/// Catalog search filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntervalFilter {
    /// Case-insensitive substring of the title.
    pub title: Option<String>,
    pub tone_min: Option<f64>,
    pub tone_max: Option<f64>,
}

impl IntervalFilter {
    pub fn matches(&self, interval: &Interval) -> bool {
        if interval.is_deleted {
            return false;
        }
        if let Some(title) = &self.title
            && !interval
                .title
                .to_lowercase()
                .contains(&title.to_lowercase())
        {
            return false;
        }
        if let Some(min) = self.tone_min
            && interval.tone < min
        {
            return false;
        }
        if let Some(max) = self.tone_max
            && interval.tone > max
        {
            return false;
        }
        true
    }
}

/// Page request after clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

impl PageRequest {
    /// Rows to skip. Saturates, so an absurdly large page reads past the end
    /// and comes back empty.
    pub fn offset(&self) -> i64 {
        self.page.saturating_sub(1).saturating_mul(self.page_size)
    }
}

/// Pagination metadata returned with a page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationInfo {
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub total_pages: i64,
}
