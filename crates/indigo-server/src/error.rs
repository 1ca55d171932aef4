//! Unified error handling for the API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use indigo_core::ThreadBusy;

/// API error response body
#[derive(Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

/// Application error types
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    /// The thread is already running a turn
    Conflict(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
        };

        (
            status,
            Json(ApiError {
                error: message,
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

impl From<ThreadBusy> for AppError {
    fn from(err: ThreadBusy) -> Self {
        tracing::warn!("Rejected turn: {}", err);
        AppError::Conflict(err.to_string())
    }
}
