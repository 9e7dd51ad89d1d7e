//! Authentication domain models.
//!
//! These are internal domain models, distinct from the API request/response
//! shapes declared by the `cadenza_api` handlers.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Domain user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub login: String,
    pub is_moderator: bool,
}

/// User with password hash (for internal auth flows).
#[derive(Debug, Clone)]
pub struct UserWithPassword {
    pub user: User,
    pub password_hash: String,
}

/// Verified identity of a caller, as carried by a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub subject_id: Uuid,
    pub display_name: String,
    pub is_moderator: bool,
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            subject_id: user.id,
            display_name: user.login.clone(),
            is_moderator: user.is_moderator,
        }
    }
}

/// JWT claims embedded in access and refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: user ID (standard JWT `sub` claim).
    pub sub: Uuid,
    /// Display name (the user's login).
    pub name: String,
    pub is_moderator: bool,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
    /// Unique token id, so two tokens issued in the same second differ.
    pub jti: Uuid,
}

impl TokenClaims {
    pub fn identity(&self) -> Identity {
        Identity {
            subject_id: self.sub,
            display_name: self.name.clone(),
            is_moderator: self.is_moderator,
        }
    }

    /// Expiry as a timestamp.
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// A freshly signed token together with the claims it carries.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: TokenClaims,
}

/// Access + refresh token pair returned by login and refresh.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

/// Session metadata recorded at login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub login_time: DateTime<Utc>,
    pub ip_address: String,
    pub display_name: String,
    pub is_moderator: bool,
}

impl SessionRecord {
    /// Flatten into hash fields for the session store.
    pub fn to_fields(&self) -> Vec<(String, String)> {
        vec![
            ("login_time".into(), self.login_time.to_rfc3339()),
            ("ip_address".into(), self.ip_address.clone()),
            ("display_name".into(), self.display_name.clone()),
            ("is_moderator".into(), self.is_moderator.to_string()),
        ]
    }

    /// Rebuild from hash fields. Returns `None` when a field is missing or malformed.
    pub fn from_fields(fields: &HashMap<String, String>) -> Option<Self> {
        let login_time = DateTime::parse_from_rfc3339(fields.get("login_time")?)
            .ok()?
            .with_timezone(&Utc);
        Some(Self {
            login_time,
            ip_address: fields.get("ip_address")?.clone(),
            display_name: fields.get("display_name")?.clone(),
            is_moderator: fields.get("is_moderator")?.parse().ok()?,
        })
    }
}
