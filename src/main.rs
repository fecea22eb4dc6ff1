//! GTI Cache server
//!
//! HTTP surface over the tiered cache, rate limiter and query tracker.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gti_cache::{create_router, spawn_cleanup_task, AppState, Config};

/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Connect the cache store (remote tier if configured)
/// 4. Start background TTL cleanup task
/// 5. Serve the router until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gti_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting GTI cache server");

    let config = Config::from_env();
    info!(
        namespace = %config.namespace,
        default_ttl = config.default_ttl,
        port = config.server_port,
        cleanup_interval = config.cleanup_interval,
        failure_policy = %config.rate_limit_failure_policy,
        "Configuration loaded"
    );

    let state = AppState::from_config(&config).await;
    info!(
        primary_connected = state.store.primary_connected(),
        "Cache store initialized"
    );

    let cleanup_handle = spawn_cleanup_task(state.store.clone(), config.cleanup_interval);

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cleanup_handle))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for Ctrl+C or SIGTERM, then aborts the cleanup task.
async fn shutdown_signal(cleanup_handle: tokio::task::JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
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

    cleanup_handle.abort();
    warn!("Cleanup task aborted");
}
