//! REST API handlers

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::state::AppState;

/// API error response
#[derive(Serialize)]
struct ApiError {
    error: String,
}

impl ApiError {
    fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

/// Get the latest printer snapshot
pub async fn get_printer(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.snapshot())
}

/// G-code request body
#[derive(Deserialize)]
pub struct GcodeRequest {
    script: String,
    /// Wait for the controller to finish the script
    #[serde(default)]
    wait: bool,
}

/// Send a G-code script to the printer
pub async fn send_gcode(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GcodeRequest>,
) -> impl IntoResponse {
    let script = req.script.trim();
    if script.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(ApiError::new("Empty script"))).into_response();
    }

    info!(script = %script, wait = req.wait, "G-code requested");

    match state.client.send_command(req.wait, script).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({"status": "sent"}))).into_response(),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(ApiError::new(format!("Failed to send G-code: {}", e))),
        )
            .into_response(),
    }
}

/// Get current configuration
pub async fn get_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let config = state.config.read().await.clone();
    Json(config)
}
