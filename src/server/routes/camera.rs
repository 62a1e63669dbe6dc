//! Camera feed control endpoints.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::server::state::AppState;

/// POST /api/camera/start - open the camera and begin streaming frames.
pub async fn start(State(state): State<AppState>) -> Json<Value> {
    state.camera.start().await;
    Json(json!({ "message": "Stream started" }))
}

/// POST /api/camera/stop - stop streaming and release the camera.
pub async fn stop(State(state): State<AppState>) -> Json<Value> {
    state.camera.stop().await;
    Json(json!({ "message": "Stream stopped" }))
}
