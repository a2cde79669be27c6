// ABOUTME: Application error type for HTTP handlers
// ABOUTME: Renders sandbox and engine failures into the JSON response envelope

use crate::api::response::ApiResponse;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use gravelbox_sandbox::{EngineError, SandboxError};
use thiserror::Error;
use tracing::{error, warn};

/// Main application error type that all handlers should return
#[derive(Debug, Error)]
pub enum AppError {
    /// Request body could not be parsed
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Sandbox(_) | AppError::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            AppError::BadRequest(message) => warn!(error = %message, "Rejected request"),
            AppError::Sandbox(e) if e.is_client_error() => warn!(error = %e, "Rejected request"),
            other => error!(error = %other, "Request failed"),
        }

        (status, ApiResponse::<()>::failure(None, self.to_string())).into_response()
    }
}
