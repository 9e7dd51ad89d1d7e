//! # cadenza_api
//!
//! HTTP API library for Cadenza.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post, put};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};

use cadenza_core::calculator::CalculationSink;
use cadenza_core::session::SessionStore;
use cadenza_core::store::{CatalogStore, CompositionStore, UserStore};
use cadenza_core::workflow::CompositionWorkflow;

use crate::config::ApiConfig;
use crate::handlers::{composition_items, compositions, health, intervals, users};
use crate::middleware::auth::{optional_auth, require_auth, require_moderator};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// API configuration.
    pub config: ApiConfig,
    pub users: Arc<dyn UserStore>,
    pub catalog: Arc<dyn CatalogStore>,
    pub workflow: CompositionWorkflow,
    /// `None` when no session store is reachable.
    pub sessions: Option<Arc<dyn SessionStore>>,
    pub calculations: Arc<dyn CalculationSink>,
}

impl AppState {
    /// Wire state over one store implementing every relational contract.
    pub fn new<S>(
        config: ApiConfig,
        store: Arc<S>,
        sessions: Option<Arc<dyn SessionStore>>,
        calculations: Arc<dyn CalculationSink>,
    ) -> Self
    where
        S: UserStore + CatalogStore + CompositionStore + 'static,
    {
        let workflow =
            CompositionWorkflow::new(store.clone(), store.clone(), calculations.clone());
        Self {
            config,
            users: store.clone(),
            catalog: store,
            workflow,
            sessions,
            calculations,
        }
    }
}

/// Run embedded database migrations.
///
/// Delegates to `cadenza_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    cadenza_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route("/api/health", get(health::health_handler))
        .route("/api/users/register", post(users::register_handler))
        .route("/api/users/login", post(users::login_handler))
        .route("/api/users/refresh", post(users::refresh_handler))
        .route("/api/intervals/{id}", get(intervals::get_interval_handler))
        .route(
            "/api/compositions/calculation-result",
            post(compositions::calculation_result_handler),
        );

    // Public routes that annotate the response when a valid token is present
    let optional = Router::new()
        .route("/api/intervals", get(intervals::list_intervals_handler))
        .layer(from_fn_with_state(state.clone(), optional_auth));

    // Protected routes (require auth)
    let protected = Router::new()
        .route(
            "/api/users/profile",
            get(users::get_profile_handler).put(users::update_profile_handler),
        )
        .route("/api/users/session", get(users::session_handler))
        .route("/api/users/logout", post(users::logout_handler))
        .route(
            "/api/compositions",
            get(compositions::list_compositions_handler),
        )
        .route("/api/compositions/comp-cart", get(compositions::cart_handler))
        .route(
            "/api/compositions/{id}",
            get(compositions::get_composition_handler)
                .put(compositions::update_composition_handler)
                .delete(compositions::delete_composition_handler),
        )
        .route(
            "/api/compositions/{id}/form",
            put(compositions::form_composition_handler),
        )
        .route(
            "/api/intervals/add-to-composition",
            post(intervals::add_to_composition_handler),
        )
        .route(
            "/api/composition-intervals",
            put(composition_items::update_item_handler)
                .delete(composition_items::remove_item_handler),
        )
        .layer(from_fn_with_state(state.clone(), require_auth));

    // Moderator routes (require auth + moderator flag)
    let moderator = Router::new()
        .route("/api/intervals", post(intervals::create_interval_handler))
        .route(
            "/api/intervals/{id}",
            put(intervals::update_interval_handler).delete(intervals::delete_interval_handler),
        )
        .route(
            "/api/intervals/{id}/image",
            put(intervals::set_interval_photo_handler),
        )
        .route(
            "/api/compositions/{id}/complete",
            put(compositions::complete_composition_handler),
        )
        .route(
            "/api/compositions/{id}/reject",
            put(compositions::reject_composition_handler),
        )
        .layer(from_fn(require_moderator))
        .layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public)
        .merge(optional)
        .merge(protected)
        .merge(moderator)
        .layer(cors)
        .with_state(state)
}
