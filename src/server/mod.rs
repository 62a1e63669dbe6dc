//! HTTP server module for the control API and WebSocket feeds.
//!
//! The REST surface starts and stops the broadcasters; the WebSocket
//! endpoints are where subscribers attach to the live feeds.

pub mod routes;
pub mod state;
pub mod ws;

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::server::routes::{camera, health, sensor};
use crate::server::state::AppState;
use crate::server::ws::{camera_ws, sensor_ws, stats_ws};

/// Default server port.
pub const DEFAULT_PORT: u16 = 8000;

/// Builds the router with every control and streaming endpoint.
pub fn app(state: AppState) -> Router {
    // CORS layer for the dashboard frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Feed control API
        .route("/api/camera/start", post(camera::start))
        .route("/api/camera/stop", post(camera::stop))
        .route("/api/sensor/start", post(sensor::start))
        .route("/api/sensor/stop", post(sensor::stop))
        .route("/api/sensor/current", get(sensor::current))
        // WebSocket feeds
        .route("/api/camera/ws", get(camera_ws))
        .route("/api/sensor/ws", get(sensor_ws))
        .route("/api/system/ws", get(stats_ws))
        .layer(cors)
        .with_state(state)
}

/// Serves the API until `shutdown` resolves.
///
/// Open WebSocket subscriptions are dropped on shutdown rather than waited
/// for; they would otherwise hold the process up indefinitely.
pub async fn run_server(
    state: AppState,
    port: u16,
    shutdown: impl Future<Output = ()>,
) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP server listening on http://{addr}");

    let server = axum::serve(listener, app(state)).into_future();
    tokio::select! {
        result = server => result,
        () = shutdown => {
            info!("HTTP server shutting down");
            Ok(())
        }
    }
}
