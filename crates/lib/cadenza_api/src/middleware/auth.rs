//! Authentication middleware: Bearer token extraction, revocation check and
//! JWT verification.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use cadenza_core::auth::jwt::verify_token;
use cadenza_core::models::auth::{Identity, TokenClaims};
use cadenza_core::session::tokens;

use crate::AppState;
use crate::error::AppError;

/// Verified caller, stored in request extensions by [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub identity: Identity,
    /// The raw bearer token, kept for logout.
    pub token: String,
    pub claims: TokenClaims,
}

/// Caller identity on routes where authentication is optional.
#[derive(Debug, Clone, Default)]
pub struct MaybeUser(pub Option<Identity>);

/// Axum middleware: extracts `Authorization: Bearer <token>`, rejects revoked
/// tokens, verifies the JWT and injects [`AuthenticatedUser`].
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())?.to_string();
    let claims = authenticate(&state, &token).await?;
    request.extensions_mut().insert(AuthenticatedUser {
        identity: claims.identity(),
        token,
        claims,
    });
    Ok(next.run(request).await)
}

/// Axum middleware: requires an [`AuthenticatedUser`] with the moderator flag.
/// Must run inside [`require_auth`].
pub async fn require_moderator(request: Request, next: Next) -> Result<Response, AppError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))?;
    if !user.identity.is_moderator {
        return Err(AppError::Forbidden("Moderator role required".into()));
    }
    Ok(next.run(request).await)
}

/// Axum middleware: like [`require_auth`] but never rejects. Missing, invalid
/// and revoked tokens all yield an anonymous [`MaybeUser`].
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = bearer_token(request.headers()).ok().map(str::to_string);
    let identity = match token {
        Some(token) => authenticate(&state, &token)
            .await
            .ok()
            .map(|claims| claims.identity()),
        None => None,
    };
    request.extensions_mut().insert(MaybeUser(identity));
    next.run(request).await
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization scheme".into()))
}

/// Revocation first, then signature and expiry. An unreachable session store
/// skips the revocation check.
async fn authenticate(state: &AppState, token: &str) -> Result<TokenClaims, AppError> {
    if let Some(sessions) = &state.sessions {
        match tokens::is_revoked(sessions.as_ref(), token).await {
            Ok(true) => return Err(AppError::Unauthorized("Token has been revoked".into())),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "revocation check skipped"),
        }
    }
    Ok(verify_token(token, state.config.jwt_secret.as_bytes())?)
}
