//! MJPEG camera feed: the encoder pushes frames, the loop fans them out.
//!
//! Unlike the sensor feed there is no fixed cadence here. The encoder writes
//! frames into the single-slot handoff at its own rate, usually from its own
//! thread, and the broadcast loop is paced entirely by its blocking read of
//! that slot. The camera hardware is acquired when the loop starts and
//! released when it exits, so a stopped feed holds no device handle.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tracing::{error, info};

use crate::broadcast::{
    run_broadcast_loop, slot, AcquireError, BroadcastSource, Lifecycle, SinkRegistry, SlotReader,
    SlotWriter,
};

/// Failure modes of the camera pipeline.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera unavailable: {0}")]
    Unavailable(String),
    #[error("encoder fault: {0}")]
    Encoder(String),
}

/// Interface to the camera/encoder pipeline.
///
/// `start_stream` hands the encoder the producer half of the handoff slot;
/// it then pushes frames at its own rate until `stop_stream`. Dropping the
/// device must release the hardware.
pub trait CameraDevice: Send {
    fn start_stream(&mut self, output: SlotWriter<Bytes>) -> Result<(), CameraError>;
    fn stop_stream(&mut self);
}

/// Factory producing a fresh device handle for each run of the loop.
pub type CameraOpener =
    Box<dyn Fn() -> Result<Box<dyn CameraDevice>, CameraError> + Send + Sync>;

/// The camera broadcaster: frame loop, subscriber registry, and lifecycle
/// for the video feed.
pub struct CameraBroadcaster {
    opener: Arc<CameraOpener>,
    registry: Arc<SinkRegistry<Bytes>>,
    lifecycle: Lifecycle,
}

impl CameraBroadcaster {
    pub fn new(opener: CameraOpener) -> Self {
        Self {
            opener: Arc::new(opener),
            registry: Arc::new(SinkRegistry::new()),
            lifecycle: Lifecycle::new(),
        }
    }

    pub fn registry(&self) -> &Arc<SinkRegistry<Bytes>> {
        &self.registry
    }

    /// Opens the camera and starts the frame loop; no-op when already
    /// running.
    pub async fn start(&self) {
        let opener = Arc::clone(&self.opener);
        let registry = Arc::clone(&self.registry);
        let started = self
            .lifecycle
            .start(move |active| tokio::spawn(stream_frames(opener, registry, active)))
            .await;
        if started {
            info!("camera broadcast started");
        }
    }

    /// Stops the loop, waits for it to exit, and with it releases the
    /// camera; no-op when already stopped.
    pub async fn stop(&self) {
        if self.lifecycle.stop().await {
            info!("camera broadcast stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.lifecycle.is_running().await
    }
}

/// Body of the camera loop: acquire the device, stream until stopped,
/// release the device on the way out.
async fn stream_frames(
    opener: Arc<CameraOpener>,
    registry: Arc<SinkRegistry<Bytes>>,
    active: Arc<AtomicBool>,
) {
    let (writer, reader) = slot();
    let mut device = match opener() {
        Ok(device) => device,
        Err(err) => {
            error!(%err, "camera failed to open");
            return;
        }
    };
    if let Err(err) = device.start_stream(writer) {
        error!(%err, "camera failed to start streaming");
        return;
    }

    run_broadcast_loop(CameraSource { reader }, registry, active).await;

    device.stop_stream();
}

struct CameraSource {
    reader: SlotReader<Bytes>,
}

#[async_trait]
impl BroadcastSource for CameraSource {
    type Item = Bytes;

    async fn acquire(&mut self) -> Result<Bytes, AcquireError> {
        self.reader.read().await.ok_or(AcquireError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::testing::{CollectSink, FailSink};
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    /// Captures the slot writer so the test can play encoder.
    struct TestCamera {
        writer_out: Arc<Mutex<Option<SlotWriter<Bytes>>>>,
        released: Arc<AtomicBool>,
    }

    impl CameraDevice for TestCamera {
        fn start_stream(&mut self, output: SlotWriter<Bytes>) -> Result<(), CameraError> {
            *self.writer_out.lock().unwrap() = Some(output);
            Ok(())
        }

        fn stop_stream(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    fn test_broadcaster() -> (
        CameraBroadcaster,
        Arc<Mutex<Option<SlotWriter<Bytes>>>>,
        Arc<AtomicBool>,
    ) {
        let writer_out = Arc::new(Mutex::new(None));
        let released = Arc::new(AtomicBool::new(false));
        let writer_for_opener = Arc::clone(&writer_out);
        let released_for_opener = Arc::clone(&released);
        let broadcaster = CameraBroadcaster::new(Box::new(move || {
            Ok(Box::new(TestCamera {
                writer_out: Arc::clone(&writer_for_opener),
                released: Arc::clone(&released_for_opener),
            }) as Box<dyn CameraDevice>)
        }));
        (broadcaster, writer_out, released)
    }

    async fn wait_for_writer(
        writer_out: &Arc<Mutex<Option<SlotWriter<Bytes>>>>,
    ) -> SlotWriter<Bytes> {
        timeout(Duration::from_secs(1), async {
            loop {
                if let Some(writer) = writer_out.lock().unwrap().clone() {
                    return writer;
                }
                sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("camera never started streaming")
    }

    async fn wait_for_count(sink: &Arc<CollectSink<Bytes>>, at_least: usize) {
        timeout(Duration::from_secs(1), async {
            while sink.count() < at_least {
                sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("frames never arrived");
    }

    #[tokio::test]
    async fn frames_reach_subscribers_despite_a_failing_sink() {
        let (broadcaster, writer_out, released) = test_broadcaster();
        let a = Arc::new(CollectSink::new());
        let c = Arc::new(CollectSink::new());
        broadcaster.registry().add(a.clone());
        broadcaster.registry().add(Arc::new(FailSink));
        broadcaster.registry().add(c.clone());

        broadcaster.start().await;
        let writer = wait_for_writer(&writer_out).await;

        writer.write(Bytes::from_static(b"frame-1"));
        wait_for_count(&a, 1).await;
        wait_for_count(&c, 1).await;
        assert_eq!(a.items()[0], Bytes::from_static(b"frame-1"));

        // Keep the encoder pushing so the cooperative stop can observe the
        // cleared flag at the next iteration.
        let pusher_writer = writer.clone();
        let pusher = tokio::spawn(async move {
            loop {
                pusher_writer.write(Bytes::from_static(b"pad"));
                sleep(Duration::from_millis(2)).await;
            }
        });

        broadcaster.stop().await;
        pusher.abort();

        assert!(released.load(Ordering::SeqCst), "camera was not released");
        assert!(!broadcaster.is_running().await);
    }

    #[tokio::test]
    async fn start_is_idempotent_and_restart_reopens_device() {
        let (broadcaster, writer_out, released) = test_broadcaster();

        broadcaster.start().await;
        broadcaster.start().await;
        let writer = wait_for_writer(&writer_out).await;

        let pusher_writer = writer.clone();
        let pusher = tokio::spawn(async move {
            loop {
                pusher_writer.write(Bytes::from_static(b"pad"));
                sleep(Duration::from_millis(2)).await;
            }
        });
        broadcaster.stop().await;
        pusher.abort();
        assert!(released.load(Ordering::SeqCst));

        // A fresh start must acquire a fresh device handle.
        *writer_out.lock().unwrap() = None;
        released.store(false, Ordering::SeqCst);
        broadcaster.start().await;
        let writer = wait_for_writer(&writer_out).await;

        let pusher_writer = writer.clone();
        let pusher = tokio::spawn(async move {
            loop {
                pusher_writer.write(Bytes::from_static(b"pad"));
                sleep(Duration::from_millis(2)).await;
            }
        });
        broadcaster.stop().await;
        pusher.abort();
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn open_failure_can_be_retried() {
        let attempts = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let writer_out = Arc::new(Mutex::new(None));
        let released = Arc::new(AtomicBool::new(false));

        let attempts_for_opener = Arc::clone(&attempts);
        let writer_for_opener = Arc::clone(&writer_out);
        let released_for_opener = Arc::clone(&released);
        let broadcaster = CameraBroadcaster::new(Box::new(move || {
            if attempts_for_opener.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(CameraError::Unavailable("no camera".into()));
            }
            Ok(Box::new(TestCamera {
                writer_out: Arc::clone(&writer_for_opener),
                released: Arc::clone(&released_for_opener),
            }) as Box<dyn CameraDevice>)
        }));

        broadcaster.start().await;
        timeout(Duration::from_secs(1), async {
            while broadcaster.is_running().await {
                sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("failed open never settled");

        // A retry must not be refused just because the dead task was never
        // explicitly stopped.
        broadcaster.start().await;
        let writer = wait_for_writer(&writer_out).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 2);

        let pusher_writer = writer.clone();
        let pusher = tokio::spawn(async move {
            loop {
                pusher_writer.write(Bytes::from_static(b"pad"));
                sleep(Duration::from_millis(2)).await;
            }
        });
        broadcaster.stop().await;
        pusher.abort();
        assert!(released.load(Ordering::SeqCst));
    }
}
