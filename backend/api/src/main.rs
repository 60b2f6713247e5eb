//! EduRelief campaign API: entry point.
//!
//! Serves registration, login, the campaign directory and the donation flow
//! over Axum, backed by SQLite.  A background task sweeps expired bearer
//! tokens; both stop together on Ctrl-C.

mod api;
mod auth;
mod config;
mod db;
mod errors;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use api::ApiState;
use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;
    let pool = db::init_pool(&config.database_url).await?;

    let shutdown = CancellationToken::new();

    // ─── Token sweeper ────────────────────────────────────
    tokio::spawn(purge_tokens(
        pool.clone(),
        Duration::from_secs(config.token_purge_interval_secs.max(1)),
        shutdown.clone(),
    ));

    // ─── REST API ─────────────────────────────────────────
    let api_state = Arc::new(ApiState::new(pool, config.clone()));
    let app = api::router(api_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!(
        auto_verify = config.auto_verify_campaigns,
        "API listening on http://{addr}"
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {e}");
            }
            info!("Shutting down");
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    Ok(())
}

async fn purge_tokens(pool: SqlitePool, every: Duration, shutdown: CancellationToken) {
    loop {
        match db::purge_expired_tokens(&pool, Utc::now().timestamp()).await {
            Ok(0) => {}
            Ok(n) => info!(removed = n, "Purged expired tokens"),
            Err(e) => warn!("Token purge failed: {e}"),
        }
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(every) => {}
        }
    }
}
