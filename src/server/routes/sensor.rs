//! Sensor feed control endpoints.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::server::state::AppState;

/// POST /api/sensor/start - begin broadcasting readings.
pub async fn start(State(state): State<AppState>) -> Json<Value> {
    state.sensor.start().await;
    Json(json!({ "message": "Sensor started" }))
}

/// POST /api/sensor/stop - stop the broadcast loop.
pub async fn stop(State(state): State<AppState>) -> Json<Value> {
    state.sensor.stop().await;
    Json(json!({ "message": "Sensor stopped" }))
}

/// GET /api/sensor/current - one immediate read, bypassing the broadcaster.
///
/// Read failures come back as `{"error": ...}` in the body rather than an
/// HTTP error, which is what the dashboard expects.
pub async fn current(State(state): State<AppState>) -> Json<Value> {
    match state.sensor.current_reading() {
        Ok(reading) => Json(json!(reading)),
        Err(err) => Json(json!({ "error": err.to_string() })),
    }
}
