//! Catalog rules shared by every store: pagination clamping and interval
//! validation.

use crate::models::interval::{IntervalUpdate, NewInterval, PageRequest, PaginationInfo};

/// Default and maximum catalog page size.
pub const MAX_PAGE_SIZE: i64 = 8;

/// Maximum stored length of titles and descriptions.
pub const MAX_TEXT_LEN: usize = 255;

/// Clamp raw paging parameters: page ≥ 1, page size in `1..=MAX_PAGE_SIZE`
/// (missing or non-positive sizes fall back to the maximum).
pub fn page_request(page: Option<i64>, page_size: Option<i64>) -> PageRequest {
    let page = page.filter(|p| *p >= 1).unwrap_or(1);
    let page_size = match page_size {
        Some(size) if size >= 1 => size.min(MAX_PAGE_SIZE),
        _ => MAX_PAGE_SIZE,
    };
    PageRequest { page, page_size }
}

/// Build pagination metadata for a page of `total` results.
pub fn pagination(request: PageRequest, total: i64) -> PaginationInfo {
    let total_pages = if total > 0 {
        (total + request.page_size - 1) / request.page_size
    } else {
        0
    };
    PaginationInfo {
        page: request.page,
        page_size: request.page_size,
        total,
        total_pages,
    }
}

/// Validate a new interval, returning a message describing the first problem.
pub fn validate_new_interval(interval: &NewInterval) -> Result<(), String> {
    validate_title(&interval.title)?;
    validate_description(&interval.description)?;
    validate_tone(interval.tone)
}

/// Validate the present fields of an interval update.
pub fn validate_interval_update(update: &IntervalUpdate) -> Result<(), String> {
    if update.is_empty() {
        return Err("No fields to update".into());
    }
    if let Some(title) = &update.title {
        validate_title(title)?;
    }
    if let Some(description) = &update.description {
        validate_description(description)?;
    }
    if let Some(tone) = update.tone {
        validate_tone(tone)?;
    }
    Ok(())
}

fn validate_title(title: &str) -> Result<(), String> {
    if title.trim().is_empty() {
        return Err("Title must not be empty".into());
    }
    if title.chars().count() > MAX_TEXT_LEN {
        return Err(format!("Title must be at most {MAX_TEXT_LEN} characters"));
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<(), String> {
    if description.chars().count() > MAX_TEXT_LEN {
        return Err(format!(
            "Description must be at most {MAX_TEXT_LEN} characters"
        ));
    }
    Ok(())
}

fn validate_tone(tone: f64) -> Result<(), String> {
    if !tone.is_finite() || tone < 0.0 {
        return Err("Tone must be a non-negative number".into());
    }
    Ok(())
}
