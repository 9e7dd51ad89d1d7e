//! Composition workflow request handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use cadenza_core::models::composition::{
    Belonging, CartInfo, Composition, CompositionFilter, CompositionStatus,
};
use cadenza_core::workflow::{CompositionDetail, receive_result};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;

// ---------------------------------------------------------------------------
// Request / response DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ListCompositionsQuery {
    pub status: Option<String>,
    /// `YYYY-MM-DD`, inclusive.
    pub date_from: Option<String>,
    /// `YYYY-MM-DD`, inclusive.
    pub date_to: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CompositionListResponse {
    pub compositions: Vec<Composition>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateCompositionRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct CalculationResultRequest {
    pub composition_id: i64,
    pub result: String,
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Serialize)]
pub struct CalculationResultResponse {
    pub success: bool,
    pub composition_id: i64,
    pub result: Belonging,
}

fn parse_date(field: &str, value: Option<&str>) -> AppResult<Option<NaiveDate>> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| {
            NaiveDate::parse_from_str(v, "%Y-%m-%d")
                .map_err(|_| AppError::Validation(format!("{field} must be a YYYY-MM-DD date")))
        })
        .transpose()
}

impl ListCompositionsQuery {
    fn into_filter(self) -> AppResult<CompositionFilter> {
        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                CompositionStatus::parse(raw)
                    .filter(CompositionStatus::is_listed)
                    .ok_or_else(|| AppError::Validation(format!("Unknown status: {raw}")))?,
            ),
        };
        Ok(CompositionFilter {
            creator_id: None,
            status,
            date_from: parse_date("date_from", self.date_from.as_deref())?,
            date_to: parse_date("date_to", self.date_to.as_deref())?,
        })
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /api/compositions`: listed compositions, the caller's own unless
/// they moderate.
pub async fn list_compositions_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Query(query): Query<ListCompositionsQuery>,
) -> AppResult<Json<CompositionListResponse>> {
    let filter = query.into_filter()?;
    let compositions = state.workflow.list(&user.identity, filter).await?;
    Ok(Json(CompositionListResponse { compositions }))
}

/// `GET /api/compositions/comp-cart`: the caller's draft id and item count.
pub async fn cart_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
) -> AppResult<Json<CartInfo>> {
    let cart = state.workflow.cart(user.identity.subject_id).await?;
    Ok(Json(cart))
}

/// `GET /api/compositions/{id}`: composition, items and score.
pub async fn get_composition_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<CompositionDetail>> {
    let detail = state.workflow.get(&user.identity, id).await?;
    Ok(Json(detail))
}

/// `PUT /api/compositions/{id}`: rename the caller's draft.
pub async fn update_composition_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateCompositionRequest>,
) -> AppResult<Json<Composition>> {
    let updated = state
        .workflow
        .update_title(&user.identity, id, body.title.trim())
        .await?;
    Ok(Json(updated))
}

/// `PUT /api/compositions/{id}/form`
pub async fn form_composition_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<Composition>> {
    Ok(Json(state.workflow.form(&user.identity, id).await?))
}

/// `PUT /api/compositions/{id}/complete`
pub async fn complete_composition_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<Composition>> {
    Ok(Json(state.workflow.complete(&user.identity, id).await?))
}

/// `PUT /api/compositions/{id}/reject`
pub async fn reject_composition_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<Composition>> {
    Ok(Json(state.workflow.reject(&user.identity, id).await?))
}

/// `DELETE /api/compositions/{id}`: soft delete of the caller's draft.
pub async fn delete_composition_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.workflow.delete(&user.identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/compositions/calculation-result`: calculator callback,
/// authenticated by shared key instead of a bearer token.
pub async fn calculation_result_handler(
    State(state): State<AppState>,
    Json(body): Json<CalculationResultRequest>,
) -> AppResult<Json<CalculationResultResponse>> {
    let updated = receive_result(
        &state.workflow,
        &state.config.callback_api_key,
        body.composition_id,
        &body.result,
        &body.api_key,
    )
    .await?;
    let result = updated
        .belonging
        .ok_or_else(|| AppError::Internal("belonging missing after callback".into()))?;
    Ok(Json(CalculationResultResponse {
        success: true,
        composition_id: updated.id,
        result,
    }))
}
