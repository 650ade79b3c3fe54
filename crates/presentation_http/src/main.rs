//! Summarize daemon
//!
//! Main entry point for the HTTP gateway.

use std::{future::IntoFuture, sync::Arc, time::Duration};

use infrastructure::{AppConfig, init_tracing};
use presentation_http::{Ports, build_state, routes, spawn_session_sweeper};
use tokio::{net::TcpListener, signal, sync::watch};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let loaded = AppConfig::load();
    let config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => AppConfig::default(),
    };

    init_tracing(&config.server)?;
    info!("Summarize daemon v{} starting...", env!("CARGO_PKG_VERSION"));
    if let Err(e) = loaded {
        warn!("Failed to load config, using defaults: {}", e);
    }

    info!(
        host = %config.server.host,
        port = config.server.port,
        cache = config.cache.enabled,
        auth = config.security.token().is_some(),
        "Configuration loaded"
    );
    if config.security.token().is_none() {
        warn!("No daemon token configured; only /health will answer");
    }

    let config = Arc::new(config);
    let ports = Ports::from_config(&config)?;
    let state = build_state(Arc::clone(&config), ports);

    let sweeper = spawn_session_sweeper(
        Arc::clone(&state.sessions),
        config.sessions.sweep_interval(),
    );
    let cache = Arc::clone(&state.cache);

    let app = routes::create_router(state);

    let addr = config.server.bind_address();
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    // Open event streams would hold graceful shutdown forever, so it is bounded
    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_secs);
    let (stopping_tx, mut stopping_rx) = watch::channel(false);
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal(shutdown_timeout).await;
        let _ = stopping_tx.send(true);
    });

    tokio::select! {
        result = server.into_future() => result?,
        () = async {
            let _ = stopping_rx.wait_for(|stopping| *stopping).await;
            tokio::time::sleep(shutdown_timeout).await;
        } => {
            warn!("Connections still open after {:?}, shutting down anyway", shutdown_timeout);
        }
    }

    sweeper.abort();
    cache.close().await;
    info!("Server shutdown complete");

    Ok(())
}

/// Wait for shutdown signals (SIGINT, SIGTERM) and handle graceful shutdown
async fn shutdown_signal(timeout: Duration) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    info!("Waiting up to {:?} for connections to close...", timeout);
}
