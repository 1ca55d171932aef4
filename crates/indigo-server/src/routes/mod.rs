//! API routes

use axum::{routing::get, Router};

use crate::AppState;

mod stream;

/// Build the API router with all endpoints
pub fn api_router() -> Router<AppState> {
    Router::new().route("/stream", get(stream::stream))
}
