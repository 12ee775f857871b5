//! gambit-server entry point.
//!
//! Loads configuration, connects and migrates PostgreSQL, spawns the
//! session hub and serves REST and WebSocket endpoints.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use gambit_server::api;
use gambit_server::app_state::AppState;
use gambit_server::auth::TokenService;
use gambit_server::config::{LogFormat, ServerConfig};
use gambit_server::persistence::PgStore;
use gambit_server::ws::SessionHub;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = ServerConfig::from_env().context("failed to load configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
    tracing::info!(
        addr = %config.listen_addr,
        environment = %config.environment,
        "starting gambit-server"
    );

    // Persistence
    let store = PgStore::connect(&config)
        .await
        .context("failed to connect to database")?;
    store
        .migrate(config.is_development())
        .await
        .context("failed to run database migrations")?;

    // Application state
    let tokens = TokenService::new(config.jwt_secret.as_bytes());
    let state = AppState::new(
        Arc::new(store),
        tokens,
        SessionHub::spawn(),
        config.session_queue_capacity,
    );

    let app = api::build_app(state, config.request_timeout());

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
