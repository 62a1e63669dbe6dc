//! Temperature/humidity feed: poll a DHT-style sensor and broadcast.
//!
//! The hardware read is a synchronous call against a notoriously flaky
//! device, so the loop treats misreads as routine: log, keep the cadence,
//! try again. Only an explicit stop ends the loop.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::broadcast::{
    run_broadcast_loop, AcquireError, BroadcastSource, Lifecycle, SinkRegistry,
};

/// Delay between two hardware polls, bounding the read rate and CPU usage.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One temperature/humidity measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorReading {
    pub temperature_c: f64,
    pub temperature_f: f64,
    pub humidity: f64,
}

impl SensorReading {
    /// Builds a reading from the raw Celsius/humidity pair, deriving
    /// Fahrenheit.
    pub fn from_raw(temperature_c: f64, humidity: f64) -> Self {
        Self {
            temperature_c,
            temperature_f: temperature_c * 9.0 / 5.0 + 32.0,
            humidity,
        }
    }
}

/// Failure modes of a sensor read.
#[derive(Debug, Error)]
pub enum SensorError {
    /// DHT-class sensors misread often; treated as routine.
    #[error("sensor not ready: {0}")]
    NotReady(String),
    #[error("sensor fault: {0}")]
    Device(String),
}

/// Synchronous interface to the physical sensor.
pub trait SensorDevice: Send {
    /// Reads one `(celsius, humidity)` pair from the hardware.
    fn read(&mut self) -> Result<(f64, f64), SensorError>;
}

type SharedDevice = Arc<Mutex<Box<dyn SensorDevice>>>;

fn lock_device(device: &SharedDevice) -> std::sync::MutexGuard<'_, Box<dyn SensorDevice>> {
    match device.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// The sensor broadcaster: polling loop, subscriber registry, and lifecycle
/// for the temperature/humidity feed.
///
/// The device handle is shared between the loop and
/// [`current_reading`](Self::current_reading), which serves one-off reads
/// for the control API.
pub struct SensorBroadcaster {
    device: SharedDevice,
    registry: Arc<SinkRegistry<SensorReading>>,
    lifecycle: Lifecycle,
}

impl SensorBroadcaster {
    pub fn new(device: Box<dyn SensorDevice>) -> Self {
        Self {
            device: Arc::new(Mutex::new(device)),
            registry: Arc::new(SinkRegistry::new()),
            lifecycle: Lifecycle::new(),
        }
    }

    pub fn registry(&self) -> &Arc<SinkRegistry<SensorReading>> {
        &self.registry
    }

    /// Starts the polling loop; no-op when already running.
    pub async fn start(&self) {
        let source = SensorSource {
            device: Arc::clone(&self.device),
        };
        let registry = Arc::clone(&self.registry);
        let started = self
            .lifecycle
            .start(move |active| tokio::spawn(run_broadcast_loop(source, registry, active)))
            .await;
        if started {
            info!("sensor broadcast started");
        }
    }

    /// Stops the loop and waits for it to exit; no-op when already stopped.
    pub async fn stop(&self) {
        if self.lifecycle.stop().await {
            info!("sensor broadcast stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.lifecycle.is_running().await
    }

    /// One immediate read, bypassing the broadcast loop.
    pub fn current_reading(&self) -> Result<SensorReading, SensorError> {
        let (celsius, humidity) = lock_device(&self.device).read()?;
        Ok(SensorReading::from_raw(celsius, humidity))
    }
}

struct SensorSource {
    device: SharedDevice,
}

#[async_trait]
impl BroadcastSource for SensorSource {
    type Item = SensorReading;

    async fn acquire(&mut self) -> Result<SensorReading, AcquireError> {
        let result = lock_device(&self.device).read();
        match result {
            Ok((celsius, humidity)) => {
                let reading = SensorReading::from_raw(celsius, humidity);
                debug!(
                    temp_c = reading.temperature_c,
                    temp_f = reading.temperature_f,
                    humidity = reading.humidity,
                    "sensor reading"
                );
                Ok(reading)
            }
            Err(SensorError::NotReady(msg)) => Err(AcquireError::Transient(msg)),
            Err(err) => Err(AcquireError::Unexpected(err.to_string())),
        }
    }

    fn cadence(&self) -> Option<Duration> {
        Some(POLL_INTERVAL)
    }
}
