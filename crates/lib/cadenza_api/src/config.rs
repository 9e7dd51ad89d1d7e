//! API server configuration.
//!
//! Built once at start-up and carried in [`crate::AppState`]; handlers never
//! read the environment themselves.

use std::time::Duration;

use tracing::warn;

use cadenza_core::auth::jwt::resolve_jwt_secret;

const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(24 * 3600);
const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(168 * 3600);
const DEFAULT_CALCULATOR_TIMEOUT: Duration = Duration::from_secs(10);

/// Which session store backend to connect at start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionBackend {
    Postgres,
    Memory,
    Disabled,
}

impl SessionBackend {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Some(SessionBackend::Postgres),
            "memory" => Some(SessionBackend::Memory),
            "disabled" | "none" | "off" => Some(SessionBackend::Disabled),
            _ => None,
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// JWT signing secret.
    pub jwt_secret: String,
    /// Access token lifetime.
    pub access_ttl: Duration,
    /// Refresh token lifetime.
    pub refresh_ttl: Duration,
    pub session_backend: SessionBackend,
    /// Session store database; falls back to `pg_connection_url`.
    pub session_database_url: Option<String>,
    /// Calculator endpoint. `None` disables the hand-off.
    pub calculator_url: Option<String>,
    pub calculator_timeout: Duration,
    /// Delivery attempts per calculation request (1 = no retry).
    pub calculator_max_attempts: u32,
    /// Shared key the calculator presents on callback. Empty rejects all callbacks.
    pub callback_api_key: String,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                  | Default                              |
    /// |---------------------------|--------------------------------------|
    /// | `BIND_ADDR`               | `127.0.0.1:3100`                     |
    /// | `DATABASE_URL`            | `postgres://localhost:5432/cadenza`  |
    /// | `JWT_SECRET` / `AUTH_SECRET` | generated & persisted to file     |
    /// | `JWT_ACCESS_EXPIRE`       | `24h`                                |
    /// | `JWT_REFRESH_EXPIRE`      | `168h`                               |
    /// | `SESSION_STORE`           | `postgres`                           |
    /// | `SESSION_DATABASE_URL`    | `DATABASE_URL`                       |
    /// | `CALCULATOR_URL`          | unset (hand-off disabled)            |
    /// | `CALCULATOR_TIMEOUT`      | `10s`                                |
    /// | `CALCULATOR_MAX_ATTEMPTS` | `1`                                  |
    /// | `CALLBACK_API_KEY`        | empty (callbacks rejected)           |
    pub fn from_env() -> Self {
        let session_backend = match env_opt("SESSION_STORE") {
            None => SessionBackend::Postgres,
            Some(raw) => SessionBackend::parse(&raw).unwrap_or_else(|| {
                warn!(value = %raw, "unknown SESSION_STORE, using postgres");
                SessionBackend::Postgres
            }),
        };
        let calculator_max_attempts = match env_opt("CALCULATOR_MAX_ATTEMPTS") {
            None => 1,
            Some(raw) => match raw.parse::<u32>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    warn!(value = %raw, "invalid CALCULATOR_MAX_ATTEMPTS, using 1");
                    1
                }
            },
        };
        let callback_api_key = env_opt("CALLBACK_API_KEY").unwrap_or_default();
        if callback_api_key.is_empty() {
            warn!("CALLBACK_API_KEY not set, calculation callbacks will be rejected");
        }

        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3100".into()),
            pg_connection_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/cadenza".into()),
            jwt_secret: resolve_jwt_secret(),
            access_ttl: env_duration("JWT_ACCESS_EXPIRE", DEFAULT_ACCESS_TTL),
            refresh_ttl: env_duration("JWT_REFRESH_EXPIRE", DEFAULT_REFRESH_TTL),
            session_backend,
            session_database_url: env_opt("SESSION_DATABASE_URL"),
            calculator_url: env_opt("CALCULATOR_URL"),
            calculator_timeout: env_duration("CALCULATOR_TIMEOUT", DEFAULT_CALCULATOR_TIMEOUT),
            calculator_max_attempts,
            callback_api_key,
        }
    }

    /// Session store database URL, defaulting to the main database.
    pub fn session_url(&self) -> &str {
        self.session_database_url
            .as_deref()
            .unwrap_or(&self.pg_connection_url)
    }
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_duration(name: &str, default: Duration) -> Duration {
    match env_opt(name) {
        None => default,
        Some(raw) => parse_duration(&raw).unwrap_or_else(|| {
            warn!(var = name, value = %raw, ?default, "invalid duration, using default");
            default
        }),
    }
}

/// Parse `"30s"`, `"90m"`, `"24h"`, `"7d"` or a bare number of seconds.
/// Zero durations are rejected.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    let (digits, unit_secs) = match value.char_indices().last()? {
        (i, 's') => (&value[..i], 1),
        (i, 'm') => (&value[..i], 60),
        (i, 'h') => (&value[..i], 3600),
        (i, 'd') => (&value[..i], 86_400),
        (_, c) if c.is_ascii_digit() => (value, 1),
        _ => return None,
    };
    let amount: u64 = digits.trim().parse().ok()?;
    let secs = amount.checked_mul(unit_secs)?;
    (secs > 0).then(|| Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_with_units() {
        assert_eq!(parse_duration("24h"), Some(Duration::from_secs(86_400)));
        assert_eq!(parse_duration("168h"), Some(Duration::from_secs(604_800)));
        assert_eq!(parse_duration("90m"), Some(Duration::from_secs(5_400)));
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("7d"), Some(Duration::from_secs(604_800)));
        assert_eq!(parse_duration(" 45 "), Some(Duration::from_secs(45)));
    }

    #[test]
    fn malformed_durations() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("h"), None);
        assert_eq!(parse_duration("10y"), None);
        assert_eq!(parse_duration("-5m"), None);
        assert_eq!(parse_duration("0h"), None);
        assert_eq!(parse_duration("1.5h"), None);
    }

    #[test]
    fn session_backend_names() {
        assert_eq!(SessionBackend::parse("Postgres"), Some(SessionBackend::Postgres));
        assert_eq!(SessionBackend::parse("memory"), Some(SessionBackend::Memory));
        assert_eq!(SessionBackend::parse("disabled"), Some(SessionBackend::Disabled));
        assert_eq!(SessionBackend::parse("redis"), None);
    }
}
