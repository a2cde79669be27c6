// ABOUTME: Container engine endpoints

use super::response::ApiResponse;
use super::AppState;
use crate::error::AppError;
use axum::extract::State;

/// Engine version string, e.g. `Docker version 24.0.7, build afdd53b`
pub async fn version(State(state): State<AppState>) -> Result<ApiResponse<String>, AppError> {
    let version = state.manager.engine().version().await?;
    Ok(ApiResponse::success(version))
}
