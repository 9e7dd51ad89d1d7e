//! Authentication service: account, token and session flows delegating to
//! `cadenza_core::auth` and `cadenza_core::session`.
//!
//! Session-store bookkeeping is best-effort. When the store is absent or
//! failing, logins and refreshes still succeed and revocation is skipped.

use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use cadenza_core::auth::AuthError;
use cadenza_core::auth::jwt::{issue_token, verify_token};
use cadenza_core::auth::password::{hash_password, validate_password, verify_password};
use cadenza_core::catalog::MAX_TEXT_LEN;
use cadenza_core::models::auth::{Identity, SessionRecord, TokenPair, User};
use cadenza_core::session::tokens;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

/// Public view of a user account.
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub login: String,
    pub is_moderator: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            login: user.login,
            is_moderator: user.is_moderator,
        }
    }
}

/// Token pair returned by login and refresh.
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub user: UserResponse,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn chrono_ttl(ttl: StdDuration) -> AppResult<Duration> {
    Duration::from_std(ttl).map_err(|e| AppError::Internal(format!("token lifetime: {e}")))
}

fn issue_pair(state: &AppState, identity: &Identity) -> AppResult<TokenPair> {
    let secret = state.config.jwt_secret.as_bytes();
    let access = issue_token(identity, secret, chrono_ttl(state.config.access_ttl)?)?;
    let refresh = issue_token(identity, secret, chrono_ttl(state.config.refresh_ttl)?)?;
    Ok(TokenPair { access, refresh })
}

fn token_response(state: &AppState, pair: TokenPair, user: User) -> TokenResponse {
    TokenResponse {
        access_token: pair.access.token,
        refresh_token: pair.refresh.token,
        token_type: "Bearer".to_string(),
        expires_in: state.config.access_ttl.as_secs() as i64,
        user: user.into(),
    }
}

fn validate_login(login: &str) -> AppResult<&str> {
    let login = login.trim();
    if login.is_empty() {
        return Err(AppError::Validation("Login is required".into()));
    }
    if login.chars().count() > MAX_TEXT_LEN {
        return Err(AppError::Validation(format!(
            "Login must be at most {MAX_TEXT_LEN} characters"
        )));
    }
    Ok(login)
}

// ---------------------------------------------------------------------------
// Public auth operations
// ---------------------------------------------------------------------------

/// Create an account. Duplicate logins are a validation error.
pub async fn register(
    state: &AppState,
    login: &str,
    password: &str,
    is_moderator: bool,
) -> AppResult<UserResponse> {
    let login = validate_login(login)?;
    validate_password(password)?;
    if state.users.find_user_by_login(login).await?.is_some() {
        return Err(AppError::Validation("Login is already taken".into()));
    }
    let hash = hash_password(password)?;
    let user = state.users.create_user(login, &hash, is_moderator).await?;
    info!(user_id = %user.id, is_moderator, "user registered");
    Ok(user.into())
}

/// Authenticate with login + password and issue a token pair.
pub async fn login(
    state: &AppState,
    login: &str,
    password: &str,
    ip_address: &str,
) -> AppResult<TokenResponse> {
    let found = state
        .users
        .find_user_by_login(login.trim())
        .await?
        .ok_or(AuthError::CredentialError)?;
    if !verify_password(password, &found.password_hash)? {
        return Err(AuthError::CredentialError.into());
    }

    let user = found.user;
    let identity = Identity::from(&user);
    let pair = issue_pair(state, &identity)?;

    if let Some(sessions) = &state.sessions {
        let refresh_ttl = state.config.refresh_ttl;
        if let Err(e) =
            tokens::save_refresh_token(sessions.as_ref(), user.id, &pair.refresh.token, refresh_ttl)
                .await
        {
            warn!(user_id = %user.id, error = %e, "refresh token not recorded");
        }
        let record = SessionRecord {
            login_time: Utc::now(),
            ip_address: ip_address.to_string(),
            display_name: user.login.clone(),
            is_moderator: user.is_moderator,
        };
        // The session record lives exactly as long as the access token.
        let access_ttl = state.config.access_ttl;
        if let Err(e) = tokens::save_session(sessions.as_ref(), user.id, &record, access_ttl).await
        {
            warn!(user_id = %user.id, error = %e, "session not recorded");
        }
    }

    info!(user_id = %user.id, ip = ip_address, "user logged in");
    Ok(token_response(state, pair, user))
}

/// Exchange a refresh token for a new pair. The presented token must be the
/// one on record; the new refresh token replaces it.
pub async fn refresh(state: &AppState, refresh_token: &str) -> AppResult<TokenResponse> {
    let claims = verify_token(refresh_token, state.config.jwt_secret.as_bytes())?;

    if let Some(sessions) = &state.sessions {
        match tokens::get_refresh_token(sessions.as_ref(), claims.sub).await {
            Ok(Some(stored)) if stored == refresh_token => {}
            Ok(_) => {
                return Err(AppError::Unauthorized(
                    "Refresh token is no longer valid".into(),
                ));
            }
            Err(e) => warn!(user_id = %claims.sub, error = %e, "refresh custody check skipped"),
        }
    }

    let user = state
        .users
        .get_user_by_id(claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".into()))?;
    let pair = issue_pair(state, &Identity::from(&user))?;

    if let Some(sessions) = &state.sessions
        && let Err(e) = tokens::save_refresh_token(
            sessions.as_ref(),
            user.id,
            &pair.refresh.token,
            state.config.refresh_ttl,
        )
        .await
    {
        warn!(user_id = %user.id, error = %e, "rotated refresh token not recorded");
    }

    Ok(token_response(state, pair, user))
}

/// Revoke the caller's access token for its remaining lifetime and drop the
/// refresh token and session record. Store failures are logged, not returned.
pub async fn logout(state: &AppState, caller: &AuthenticatedUser) -> AppResult<()> {
    let user_id = caller.identity.subject_id;
    let Some(sessions) = &state.sessions else {
        warn!(%user_id, "logout without session store, token stays valid until expiry");
        return Ok(());
    };
    let remaining = (caller.claims.expires_at() - Utc::now())
        .to_std()
        .unwrap_or_default();
    if let Err(e) = tokens::revoke_access_token(sessions.as_ref(), &caller.token, remaining).await
    {
        warn!(%user_id, error = %e, "access token not revoked");
    }
    if let Err(e) = tokens::delete_refresh_token(sessions.as_ref(), user_id).await {
        warn!(%user_id, error = %e, "refresh token not deleted");
    }
    if let Err(e) = tokens::delete_session(sessions.as_ref(), user_id).await {
        warn!(%user_id, error = %e, "session not deleted");
    }
    info!(%user_id, "user logged out");
    Ok(())
}

/// The caller's own account.
pub async fn profile(state: &AppState, user_id: Uuid) -> AppResult<UserResponse> {
    let user = state
        .users
        .get_user_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok(user.into())
}

/// Change the caller's login and/or password.
pub async fn update_profile(
    state: &AppState,
    user_id: Uuid,
    login: Option<&str>,
    password: Option<&str>,
) -> AppResult<UserResponse> {
    if login.is_none() && password.is_none() {
        return Err(AppError::Validation("No fields to update".into()));
    }
    let login = login.map(validate_login).transpose()?;
    let hash = match password {
        Some(password) => {
            validate_password(password)?;
            Some(hash_password(password)?)
        }
        None => None,
    };
    let user = state
        .users
        .update_user(user_id, login, hash.as_deref())
        .await?;
    info!(%user_id, "profile updated");
    Ok(user.into())
}

/// Session metadata recorded at the caller's last login.
pub async fn session(state: &AppState, user_id: Uuid) -> AppResult<SessionRecord> {
    let sessions = state
        .sessions
        .as_ref()
        .ok_or_else(|| AppError::Unavailable("Session store unavailable".into()))?;
    tokens::get_session(sessions.as_ref(), user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Session not found".into()))
}
