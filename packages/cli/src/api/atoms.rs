// ABOUTME: Atom image management and sandbox execution endpoints
// ABOUTME: Build, delete and list atoms, and run sandbox requests against them

use super::response::ApiResponse;
use super::AppState;
use crate::error::AppError;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::{IntoResponse, Response},
    Json,
};
use gravelbox_sandbox::{Atom, SandboxRequest};
use tracing::{info, warn};

/// Build an atom image; the build log is returned as data
pub async fn create_atom(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<ApiResponse<String>, AppError> {
    let log = state.manager.atoms().build(&name).await?;
    Ok(ApiResponse::success(log))
}

pub async fn delete_atom(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<ApiResponse<()>, AppError> {
    state.manager.atoms().delete(&name).await?;
    Ok(ApiResponse::success(()))
}

pub async fn list_atoms(State(state): State<AppState>) -> Result<ApiResponse<Vec<Atom>>, AppError> {
    let atoms = state.manager.atoms().list().await?;
    Ok(ApiResponse::success(atoms))
}

/// Run a sandbox request. Output and session id are returned even when the run fails.
pub async fn execute(
    State(state): State<AppState>,
    payload: Result<Json<SandboxRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return AppError::BadRequest(rejection.body_text()).into_response(),
    };

    info!(atom = %request.atom, "Executing sandbox request");
    let (report, error) = state.manager.execute(&request).await;

    match error {
        None => ApiResponse::success(report).into_response(),
        Some(e) => {
            warn!(runtime = ?report.runtime, error = %e, "Sandbox execution failed");
            ApiResponse::failure(Some(report), e.to_string()).into_response()
        }
    }
}
