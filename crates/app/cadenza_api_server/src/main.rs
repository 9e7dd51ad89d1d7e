//! Cadenza API server binary.
//!
//! Loads `.env`, reads configuration, runs migrations and serves the REST API
//! until Ctrl-C.

use std::sync::Arc;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use cadenza_api::config::ApiConfig;
use cadenza_api::services::{calculator::calculation_sink, sessions::connect_session_store};
use cadenza_api::{AppState, router};
use cadenza_core::store::PgStore;

/// CLI arguments for the API server. Anything not given here is read from
/// the environment by [`ApiConfig::from_env`].
#[derive(Parser, Debug)]
#[command(name = "cadenza_api_server", about = "Cadenza API server")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3100")]
    bind: String,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/cadenza"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 10)]
    max_connections: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,cadenza_api=debug,cadenza_core=debug"
                    .parse()
                    .unwrap()
            }),
        )
        .init();

    let args = Args::parse();

    let config = ApiConfig {
        bind_addr: args.bind,
        pg_connection_url: args.database_url,
        ..ApiConfig::from_env()
    };

    info!(bind = %config.bind_addr, max_connections = args.max_connections, "starting cadenza_api_server");

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&config.pg_connection_url)
        .await?;

    info!("running database migrations");
    cadenza_api::migrate(&pool).await?;

    let sessions = connect_session_store(&config).await;
    let calculations = calculation_sink(&config);
    let state = AppState::new(
        config.clone(),
        Arc::new(PgStore::new(pool)),
        sessions,
        calculations,
    );

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    Ok(())
}
