//! Live-telemetry broadcast server for a single Raspberry Pi-class device.
//!
//! Three feeds share one fan-out core:
//! - **sensor**: polls a DHT-style sensor every 100 ms and broadcasts readings
//! - **camera**: an MJPEG encoder pushes frames through a single-slot handoff
//! - **stats**: host metrics, sampled independently per connection
//!
//! The [`broadcast`] module owns the subscriber registry, the idempotent
//! start/stop lifecycle, and the fan-out loop; [`feed`] instantiates that
//! machinery per data source; [`server`] is the axum HTTP/WebSocket surface.

pub mod broadcast;
pub mod drivers;
pub mod feed;
pub mod server;
