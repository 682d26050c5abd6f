//! Cardkeep daemon
//!
//! Hosts the secure store, the cache and the sync queue behind a local HTTP API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cardkeep::api::create_router;
use cardkeep::sync::DryRunExecutor;
use cardkeep::{spawn_drain_task, AppState, Config};

/// Main entry point for the cardkeep daemon.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the file backends and build the engines
/// 4. Start the background drain task
/// 5. Create Axum router with all endpoints
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cardkeep=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting cardkeep daemon");

    let config = Config::from_env();
    info!(
        "Configuration loaded: port={}, data_dir={}, cache_max_age={}ms, max_attempts={}, drain_interval={}s",
        config.server_port,
        config.data_dir.display(),
        config.cache_max_age_ms,
        config.sync_max_attempts,
        config.drain_interval
    );

    // Remote replay is not wired in; operations are logged and acknowledged
    let state = AppState::from_config(&config, Arc::new(DryRunExecutor))
        .await
        .with_context(|| format!("opening storage under {}", config.data_dir.display()))?;
    info!("Storage engines initialized");

    let drain_handle = spawn_drain_task(
        state.queue.clone(),
        state.online_signal(),
        config.drain_interval,
    );
    info!("Background drain task started");

    let app = create_router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(drain_handle))
        .await
        .context("serving HTTP")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the drain task and allows graceful shutdown.
async fn shutdown_signal(drain_handle: tokio::task::JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
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

    drain_handle.abort();
    warn!("Drain task aborted");
}
