//! Catalog (interval) request handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use cadenza_core::catalog::{
    page_request, pagination, validate_interval_update, validate_new_interval,
};
use cadenza_core::models::composition::CartInfo;
use cadenza_core::models::interval::{
    Interval, IntervalFilter, IntervalUpdate, NewInterval, PaginationInfo,
};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::{AuthenticatedUser, MaybeUser};

// ---------------------------------------------------------------------------
// Request / response DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ListIntervalsQuery {
    pub title: Option<String>,
    pub tone_min: Option<f64>,
    pub tone_max: Option<f64>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// Who is looking at the catalog, when known.
#[derive(Debug, Serialize)]
pub struct ViewerInfo {
    pub id: Uuid,
    pub login: String,
    pub is_moderator: bool,
}

#[derive(Debug, Serialize)]
pub struct IntervalListResponse {
    pub items: Vec<Interval>,
    pub pagination: PaginationInfo,
    pub viewer: Option<ViewerInfo>,
}

#[derive(Debug, Deserialize)]
pub struct CreateIntervalRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub tone: f64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateIntervalRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tone: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct SetPhotoRequest {
    pub photo_url: String,
}

#[derive(Debug, Deserialize)]
pub struct AddToCompositionRequest {
    pub interval_id: i64,
    pub amount: i32,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /api/intervals`: filtered, paginated catalog page.
pub async fn list_intervals_handler(
    State(state): State<AppState>,
    axum::Extension(MaybeUser(viewer)): axum::Extension<MaybeUser>,
    Query(query): Query<ListIntervalsQuery>,
) -> AppResult<Json<IntervalListResponse>> {
    if let (Some(min), Some(max)) = (query.tone_min, query.tone_max)
        && min > max
    {
        return Err(AppError::Validation(
            "tone_min must not exceed tone_max".into(),
        ));
    }
    let filter = IntervalFilter {
        title: query.title.filter(|t| !t.trim().is_empty()),
        tone_min: query.tone_min,
        tone_max: query.tone_max,
    };
    let page = page_request(query.page, query.page_size);
    let (items, total) = state.catalog.list_intervals(&filter, page).await?;
    Ok(Json(IntervalListResponse {
        items,
        pagination: pagination(page, total),
        viewer: viewer.map(|identity| ViewerInfo {
            id: identity.subject_id,
            login: identity.display_name,
            is_moderator: identity.is_moderator,
        }),
    }))
}

/// `GET /api/intervals/{id}`
pub async fn get_interval_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Interval>> {
    let interval = state
        .catalog
        .get_interval(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("interval {id}")))?;
    Ok(Json(interval))
}

/// `POST /api/intervals`: add an interval to the catalog.
pub async fn create_interval_handler(
    State(state): State<AppState>,
    Json(body): Json<CreateIntervalRequest>,
) -> AppResult<(StatusCode, Json<Interval>)> {
    let new = NewInterval {
        title: body.title.trim().to_string(),
        description: body.description,
        tone: body.tone,
    };
    validate_new_interval(&new).map_err(AppError::Validation)?;
    let interval = state.catalog.create_interval(&new).await?;
    info!(interval_id = interval.id, "interval created");
    Ok((StatusCode::CREATED, Json(interval)))
}

/// `PUT /api/intervals/{id}`: partial update.
pub async fn update_interval_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateIntervalRequest>,
) -> AppResult<Json<Interval>> {
    let update = IntervalUpdate {
        title: body.title.map(|t| t.trim().to_string()),
        description: body.description,
        tone: body.tone,
    };
    validate_interval_update(&update).map_err(AppError::Validation)?;
    let interval = state.catalog.update_interval(id, &update).await?;
    Ok(Json(interval))
}

/// `DELETE /api/intervals/{id}`: soft delete.
pub async fn delete_interval_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.catalog.delete_interval(id).await?;
    info!(interval_id = id, "interval deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /api/intervals/{id}/image`: point the interval at a stored image.
pub async fn set_interval_photo_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<SetPhotoRequest>,
) -> AppResult<Json<Interval>> {
    let url = url::Url::parse(body.photo_url.trim())
        .map_err(|e| AppError::Validation(format!("Invalid photo URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::Validation(
            "Photo URL must use http or https".into(),
        ));
    }
    let interval = state.catalog.set_interval_photo(id, url.as_str()).await?;
    Ok(Json(interval))
}

/// `POST /api/intervals/add-to-composition`: add to the caller's draft.
pub async fn add_to_composition_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Json(body): Json<AddToCompositionRequest>,
) -> AppResult<Json<CartInfo>> {
    state
        .workflow
        .add_item(&user.identity, body.interval_id, body.amount)
        .await?;
    let cart = state.workflow.cart(user.identity.subject_id).await?;
    Ok(Json(cart))
}
