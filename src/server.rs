//! Coordination worker runtime.
//!
//! Handles database and store connections, background task spawning, and
//! graceful shutdown.

use crate::config::Config;
use crate::domain::click_worker::run_click_worker;
use crate::domain::flush_scheduler::run_flush_scheduler;
use crate::infrastructure::coordination::{CoordinationStore, MemoryStore, RedisStore};
use crate::state::AppState;

use anyhow::{Context, Result};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens the PostgreSQL pool described by `config`.
pub async fn connect_pool(config: &Config) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
        .idle_timeout(Duration::from_secs(config.db_idle_timeout))
        .max_lifetime(Duration::from_secs(config.db_max_lifetime))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Connected to database");
    Ok(pool)
}

/// Connects the coordination store.
///
/// Without a Redis URL the in-process store is used, which only coordinates
/// tasks inside this process.
pub async fn connect_store(config: &Config) -> Result<Arc<dyn CoordinationStore>> {
    match &config.redis_url {
        Some(redis_url) => {
            let store = RedisStore::connect(redis_url)
                .await
                .context("Failed to connect to Redis")?;
            tracing::info!("Coordination store: Redis");
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!(
                "REDIS_URL not set; using in-process coordination store (single instance only)"
            );
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Runs the click worker and the flush scheduler until Ctrl-C or SIGTERM.
///
/// Initializes:
/// - PostgreSQL connection pool
/// - Apply migrations
/// - Coordination store (Redis or in-process)
/// - Background click worker and flush scheduler
///
/// # Errors
///
/// Returns an error if:
/// - Database or Redis connection fails
/// - Migrations fail
pub async fn run(config: Config) -> Result<()> {
    let pool = connect_pool(&config).await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to migrate")?;

    let store = connect_store(&config).await?;
    let (state, click_rx) = AppState::build(&config, pool, store)?;

    let worker = tokio::spawn(run_click_worker(click_rx, state.aggregator.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = tokio::spawn(run_flush_scheduler(state.aggregator.clone(), shutdown_rx));

    tracing::info!(
        bucket_format = %state.aggregator.format(),
        "Coordination worker running"
    );

    shutdown_signal().await;
    tracing::info!("Shutdown requested");

    let _ = shutdown_tx.send(true);
    // Dropping the last recorder closes the queue so the worker can drain.
    drop(state);

    if tokio::time::timeout(DRAIN_TIMEOUT, async {
        let _ = scheduler.await;
        let _ = worker.await;
    })
    .await
    .is_err()
    {
        tracing::warn!("Background tasks did not stop within {:?}", DRAIN_TIMEOUT);
    }

    tracing::info!("Stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
