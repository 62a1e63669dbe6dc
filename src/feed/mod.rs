//! The telemetry feeds built on the broadcast core.

pub mod camera;
pub mod sensor;
pub mod stats;
