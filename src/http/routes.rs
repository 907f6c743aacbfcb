//! HTTP routes.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::http::websocket;
use crate::state::AppState;

/// Build the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/streams", get(streams))
        .route("/ws/video-snippets", get(websocket::video_snippets))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Health check endpoint
async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

/// List runs currently in flight
async fn streams(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "active_runs": state.active_run_count(),
        "runs": state.active_runs(),
    }))
}
