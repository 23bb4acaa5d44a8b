//! HTTP handlers

mod auth;

pub use auth::{authenticate, requested_groups, BasicCredentials};

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::server::AppState;

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": authgate_core::VERSION,
        "uptime_seconds": state.start_time.elapsed().as_secs(),
    }))
}
