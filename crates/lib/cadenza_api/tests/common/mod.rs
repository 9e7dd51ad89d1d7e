//! Shared harness: the full router over in-memory stores.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use cadenza_api::config::{ApiConfig, SessionBackend};
use cadenza_api::{AppState, router};
use cadenza_core::calculator::{CalculationRequest, CalculationSink, DeadLetter};
use cadenza_core::session::{MemorySessionStore, SessionStore};
use cadenza_core::store::MemoryStore;
use serde_json::{Value, json};
use tower::ServiceExt;

pub const CALLBACK_KEY: &str = "calc-key";
pub const PASSWORD: &str = "correct-horse";

/// Sink that remembers every submitted request. An undeliverable sink also
/// reports each of them as a dead letter.
#[derive(Default)]
pub struct RecordingSink {
    submitted: Mutex<Vec<CalculationRequest>>,
    undeliverable: bool,
}

impl RecordingSink {
    pub fn submitted(&self) -> Vec<CalculationRequest> {
        self.submitted.lock().unwrap().clone()
    }
}

impl CalculationSink for RecordingSink {
    fn submit(&self, request: CalculationRequest) {
        self.submitted.lock().unwrap().push(request);
    }

    fn dead_letters(&self) -> Vec<DeadLetter> {
        if !self.undeliverable {
            return Vec::new();
        }
        self.submitted()
            .into_iter()
            .map(|request| DeadLetter {
                request,
                attempts: 1,
                error: "Calculator responded with status 503".into(),
                failed_at: chrono::Utc::now(),
            })
            .collect()
    }
}

pub struct TestApp {
    pub app: Router,
    pub sink: Arc<RecordingSink>,
}

pub fn test_config() -> ApiConfig {
    ApiConfig {
        bind_addr: "127.0.0.1:0".into(),
        pg_connection_url: "postgres://localhost:5432/unused".into(),
        jwt_secret: "test-secret".into(),
        access_ttl: Duration::from_secs(3600),
        refresh_ttl: Duration::from_secs(7200),
        session_backend: SessionBackend::Memory,
        session_database_url: None,
        calculator_url: None,
        calculator_timeout: Duration::from_secs(1),
        calculator_max_attempts: 1,
        callback_api_key: CALLBACK_KEY.into(),
    }
}

pub fn spawn_app(with_sessions: bool) -> TestApp {
    spawn_app_with_sink(with_sessions, RecordingSink::default())
}

/// App whose calculator never accepts a request.
pub fn spawn_app_undeliverable() -> TestApp {
    spawn_app_with_sink(
        true,
        RecordingSink {
            undeliverable: true,
            ..Default::default()
        },
    )
}

fn spawn_app_with_sink(with_sessions: bool, sink: RecordingSink) -> TestApp {
    let sessions: Option<Arc<dyn SessionStore>> = if with_sessions {
        Some(Arc::new(MemorySessionStore::new()))
    } else {
        None
    };
    let sink = Arc::new(sink);
    let state = AppState::new(
        test_config(),
        Arc::new(MemoryStore::new()),
        sessions,
        sink.clone(),
    );
    TestApp {
        app: router(state),
        sink,
    }
}

impl TestApp {
    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let resp = self.app.clone().oneshot(req).await.expect("request");
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("parse JSON")
        };
        (status, json)
    }

    /// Register and log in, returning the login response body.
    pub async fn sign_up(&self, login: &str, is_moderator: bool) -> Value {
        let (status, _) = self
            .call(
                "POST",
                "/api/users/register",
                None,
                Some(json!({ "login": login, "password": PASSWORD, "is_moderator": is_moderator })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = self
            .call(
                "POST",
                "/api/users/login",
                None,
                Some(json!({ "login": login, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body
    }

    pub async fn access_token(&self, login: &str, is_moderator: bool) -> String {
        let body = self.sign_up(login, is_moderator).await;
        body["access_token"].as_str().unwrap().to_string()
    }
}
