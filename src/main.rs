//! ManageIt Core - caching and data access server
//!
//! Warms the connection pool, builds the domain caches, starts cache
//! maintenance and serves the admin API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tick::Clock;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use manageit_core::api::{create_router, AppState};
use manageit_core::{db, spawn_nightly_clear_task, spawn_sweep_task, CacheRegistry, Config};

/// Main entry point.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Warm the connection pool (fatal if the database is unreachable)
/// 4. Build the cache registry
/// 5. Start the sweep and nightly clear tasks
/// 6. Serve the admin API until SIGINT/SIGTERM, then close the pool
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "manageit_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ManageIt core");

    let config = Config::from_env();
    info!(
        database_url = %config.database_url,
        pool_size = config.pool_size,
        acquire_timeout = ?config.acquire_timeout,
        sweep_interval = config.sweep_interval,
        port = config.server_port,
        "Configuration loaded"
    );

    let facade = db::connect(&config)
        .await
        .context("failed to initialize the connection pool")?;

    let registry = Arc::new(CacheRegistry::from_config(&config, Clock::new_tokio()));
    for domain in manageit_core::Domain::ALL {
        info!(%domain, ttl_secs = registry.ttl(domain).as_secs(), "Cache domain ready");
    }

    let mut tasks = vec![spawn_nightly_clear_task(registry.clone())];
    tasks.extend(spawn_sweep_task(registry.clone(), config.sweep_interval));

    let pool = facade.pool().clone();
    let app = create_router(AppState::new(registry, facade));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(tasks))
        .await
        .context("server error")?;

    pool.close();
    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then aborts the
/// maintenance tasks.
async fn shutdown_signal(tasks: Vec<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    for task in &tasks {
        task.abort();
    }
    warn!(count = tasks.len(), "Maintenance tasks aborted");
}
