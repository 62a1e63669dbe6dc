//! Stand-in device drivers for running off the Pi.
//!
//! The real deployment wires a DHT sensor and the MJPEG camera pipeline into
//! the feed traits; these simulated drivers keep the whole service runnable
//! on a development host, including the encoder's cross-thread frame push.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use bytes::Bytes;

use crate::broadcast::SlotWriter;
use crate::feed::camera::{CameraDevice, CameraError};
use crate::feed::sensor::{SensorDevice, SensorError};

/// Synthetic DHT-style sensor: a slow drift around room temperature, with
/// the occasional misread the way real DHTs behave.
pub struct SimSensor {
    tick: u64,
}

impl SimSensor {
    pub fn new() -> Self {
        Self { tick: 0 }
    }
}

impl Default for SimSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorDevice for SimSensor {
    fn read(&mut self) -> Result<(f64, f64), SensorError> {
        self.tick += 1;
        if self.tick % 17 == 0 {
            return Err(SensorError::NotReady("checksum mismatch".into()));
        }
        let phase = self.tick as f64 / 40.0;
        let celsius = 21.5 + 2.0 * phase.sin();
        let humidity = 45.0 + 5.0 * (phase / 3.0).cos();
        Ok((celsius, humidity))
    }
}

/// Frame cadence of the simulated encoder, roughly 30 fps.
const SIM_FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Synthetic camera: a dedicated OS thread pushes a counter-stamped frame
/// into the handoff slot, mirroring how a hardware encoder calls back from
/// outside the runtime.
pub struct SimCamera {
    running: Option<(Arc<AtomicBool>, JoinHandle<()>)>,
}

impl SimCamera {
    pub fn new() -> Self {
        Self { running: None }
    }
}

impl Default for SimCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraDevice for SimCamera {
    fn start_stream(&mut self, output: SlotWriter<Bytes>) -> Result<(), CameraError> {
        let active = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&active);
        let handle = std::thread::spawn(move || {
            let mut frame_no: u64 = 0;
            while flag.load(Ordering::Relaxed) {
                frame_no += 1;
                output.write(Bytes::from(format!("frame {frame_no}")));
                std::thread::sleep(SIM_FRAME_INTERVAL);
            }
        });
        self.running = Some((active, handle));
        Ok(())
    }

    fn stop_stream(&mut self) {
        if let Some((active, handle)) = self.running.take() {
            active.store(false, Ordering::Relaxed);
            let _ = handle.join();
        }
    }
}

impl Drop for SimCamera {
    fn drop(&mut self) {
        self.stop_stream();
    }
}
