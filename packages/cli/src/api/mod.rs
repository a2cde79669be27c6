// ABOUTME: HTTP router for the Gravelbox control plane
// ABOUTME: Wires version, atom management, execution and health routes to shared state

use axum::{
    routing::{get, post},
    Router,
};
use gravelbox_sandbox::SandboxManager;
use tower_http::trace::TraceLayer;

pub mod atoms;
pub mod docker;
pub mod health;
pub mod response;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub manager: SandboxManager,
}

impl AppState {
    pub fn new(manager: SandboxManager) -> Self {
        Self { manager }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/docker/version", get(docker::version))
        .route("/api/atoms/create/{name}", get(atoms::create_atom))
        .route("/api/atoms/delete/{name}", get(atoms::delete_atom))
        .route("/api/atoms/list", get(atoms::list_atoms))
        .route("/api/atoms/execute", post(atoms::execute))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
