//! Shared application state for the HTTP server.

use std::sync::Arc;

use crate::feed::camera::CameraBroadcaster;
use crate::feed::sensor::SensorBroadcaster;

/// The broadcaster instances shared across all handlers.
///
/// Constructed once at the composition root in `main` and injected here;
/// nothing in the server reaches for globals.
#[derive(Clone)]
pub struct AppState {
    pub sensor: Arc<SensorBroadcaster>,
    pub camera: Arc<CameraBroadcaster>,
}

impl AppState {
    pub fn new(sensor: Arc<SensorBroadcaster>, camera: Arc<CameraBroadcaster>) -> Self {
        Self { sensor, camera }
    }
}
