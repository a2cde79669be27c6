// ABOUTME: Shared API response envelope
// ABOUTME: Every endpoint answers with {"data": ..., "error": ...}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        ApiResponse {
            data: Some(data),
            error: None,
        }
    }

    /// An error, optionally with data produced before the failure
    pub fn failure(data: Option<T>, message: impl Into<String>) -> Self {
        ApiResponse {
            data,
            error: Some(message.into()),
        }
    }
}

/// 200 without an error, 500 with one
impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = if self.error.is_some() {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::OK
        };
        (status, Json(self)).into_response()
    }
}
