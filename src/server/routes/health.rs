//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::server::state::AppState;

#[derive(Serialize)]
pub struct FeedHealth {
    pub running: bool,
    pub subscribers: usize,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub sensor: FeedHealth,
    pub camera: FeedHealth,
}

/// GET /health - liveness plus the broadcast state of both feeds.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        sensor: FeedHealth {
            running: state.sensor.is_running().await,
            subscribers: state.sensor.registry().len(),
        },
        camera: FeedHealth {
            running: state.camera.is_running().await,
            subscribers: state.camera.registry().len(),
        },
    })
}
