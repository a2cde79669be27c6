// ABOUTME: Gravelbox control plane library shared by the gravelbox binary and its tests
// ABOUTME: Provides the HTTP router, application errors, tracing setup and the server loop

pub mod api;
pub mod error;

pub use api::{create_router, AppState};
pub use error::AppError;

use anyhow::Context;
use gravelbox_config::constants::RUST_LOG;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. `RUST_LOG` overrides `default_level`.
pub fn init_tracing(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(RUST_LOG).unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .compact()
        .try_init();
}

/// Serve the HTTP API on `addr` until interrupted.
///
/// Pending container teardowns are awaited once the listener has stopped.
pub async fn run_server(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let manager = state.manager.clone();
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error");

    manager.drain_teardowns().await;
    info!("Server stopped");
    served
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
