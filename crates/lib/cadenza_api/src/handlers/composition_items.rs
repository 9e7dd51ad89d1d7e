//! Draft item (composition ↔ interval association) handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub composition_id: i64,
    pub interval_id: i64,
    pub amount: i32,
}

#[derive(Debug, Deserialize)]
pub struct RemoveItemRequest {
    pub composition_id: i64,
    pub interval_id: i64,
}

/// `PUT /api/composition-intervals`: change an item's amount.
pub async fn update_item_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Json(body): Json<UpdateItemRequest>,
) -> AppResult<StatusCode> {
    state
        .workflow
        .update_item(
            &user.identity,
            body.composition_id,
            body.interval_id,
            body.amount,
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /api/composition-intervals`: drop an item from a draft.
pub async fn remove_item_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Json(body): Json<RemoveItemRequest>,
) -> AppResult<StatusCode> {
    state
        .workflow
        .remove_item(&user.identity, body.composition_id, body.interval_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
