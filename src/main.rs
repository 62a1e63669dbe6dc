//! Telemetry server binary: wires the device drivers into the broadcasters
//! and serves them over HTTP/WebSocket until interrupted.

use std::sync::Arc;

use pistream::drivers::{SimCamera, SimSensor};
use pistream::feed::camera::{CameraBroadcaster, CameraDevice};
use pistream::feed::sensor::SensorBroadcaster;
use pistream::server::state::AppState;
use pistream::server::{run_server, DEFAULT_PORT};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pistream=info")),
        )
        .init();

    // Composition root: the only place broadcaster instances are created.
    let sensor = Arc::new(SensorBroadcaster::new(Box::new(SimSensor::new())));
    let camera = Arc::new(CameraBroadcaster::new(Box::new(|| {
        Ok(Box::new(SimCamera::new()) as Box<dyn CameraDevice>)
    })));
    let state = AppState::new(Arc::clone(&sensor), Arc::clone(&camera));

    let port = std::env::var("PORT")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    run_server(state, port, shutdown_signal()).await?;

    // Release the hardware before exit.
    sensor.stop().await;
    camera.stop().await;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(err) => {
            warn!(%err, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
