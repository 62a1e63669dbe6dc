//! WebSocket endpoints, one per telemetry feed.
//!
//! Camera and sensor sockets are sinks fed by their shared broadcast loop:
//! connect registers the socket, disconnect removes it, and the last
//! disconnect stops the loop. The stats socket has no shared loop: each
//! connection samples and sends on its own, for its own lifetime.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use bytes::Bytes;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::broadcast::{Sink, SinkError, SinkId, SinkRegistry};
use crate::feed::sensor::SensorReading;
use crate::feed::stats::{StatsCollector, STATS_INTERVAL};
use crate::server::state::AppState;

/// Write half of one subscriber's socket, shared with the fan-out.
struct WsSink {
    tx: Mutex<SplitSink<WebSocket, Message>>,
}

impl WsSink {
    async fn send(&self, message: Message) -> Result<(), SinkError> {
        self.tx
            .lock()
            .await
            .send(message)
            .await
            .map_err(|err| SinkError::Transport(err.to_string()))
    }
}

#[async_trait]
impl Sink<SensorReading> for WsSink {
    async fn deliver(&self, reading: SensorReading) -> Result<(), SinkError> {
        let payload = serde_json::to_string(&reading)
            .map_err(|err| SinkError::Transport(err.to_string()))?;
        self.send(Message::Text(payload)).await
    }
}

#[async_trait]
impl Sink<Bytes> for WsSink {
    async fn deliver(&self, frame: Bytes) -> Result<(), SinkError> {
        self.send(Message::Binary(frame.to_vec())).await
    }
}

/// GET /api/sensor/ws - subscribe to broadcast sensor readings.
pub async fn sensor_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| async move {
        let sensor = Arc::clone(&state.sensor);
        let registry = Arc::clone(sensor.registry());
        subscribe(socket, registry, || async move {
            info!("last sensor subscriber left, stopping feed");
            sensor.stop().await;
        })
        .await;
    })
}

/// GET /api/camera/ws - subscribe to broadcast camera frames.
///
/// The first subscriber starts the feed; the control endpoint can also start
/// it ahead of time.
pub async fn camera_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| async move {
        let camera = Arc::clone(&state.camera);
        camera.start().await;
        let registry = Arc::clone(camera.registry());
        subscribe(socket, registry, || async move {
            info!("last camera subscriber left, stopping feed");
            camera.stop().await;
        })
        .await;
    })
}

/// Registers the socket as a sink, then sits on its read side until the
/// client goes away; `on_empty` runs after removal if the registry drained.
async fn subscribe<T, F, Fut>(socket: WebSocket, registry: Arc<SinkRegistry<T>>, on_empty: F)
where
    T: Clone + Send + Sync + 'static,
    WsSink: Sink<T>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = ()>,
{
    let (tx, mut rx) = socket.split();
    let sink = Arc::new(WsSink { tx: Mutex::new(tx) });
    let id = registry.add(sink);
    debug!(sink = %id, subscribers = registry.len(), "subscriber attached");

    // Client messages are ignored; the read side only notices the close.
    while let Some(Ok(message)) = rx.next().await {
        if let Message::Close(_) = message {
            break;
        }
    }

    detach(&registry, id, on_empty).await;
}

/// Removes a sink and triggers the auto-stop hook when it was the last one.
async fn detach<T, F, Fut>(registry: &SinkRegistry<T>, id: SinkId, on_empty: F)
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ()>,
{
    registry.remove(id);
    debug!(sink = %id, subscribers = registry.len(), "subscriber detached");
    if registry.is_empty() {
        on_empty().await;
    }
}

/// GET /api/system/ws - per-connection stats loop, no shared task.
pub async fn stats_ws(ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(stream_stats)
}

async fn stream_stats(socket: WebSocket) {
    let (tx, rx) = socket.split();
    run_stats_loop(tx, rx, StatsCollector::new()).await;
    info!("system stats socket closed");
}

/// Sample-and-send loop for one stats connection.
///
/// The ticker lives outside the select, so inbound client chatter cannot
/// reset the in-flight countdown; the first sample goes out immediately and
/// the rest follow on the fixed interval.
async fn run_stats_loop<W, R>(mut tx: W, mut rx: R, mut collector: StatsCollector)
where
    W: futures::Sink<Message> + Unpin,
    R: futures::Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let mut ticker = interval(STATS_INTERVAL);

    loop {
        tokio::select! {
            // Drive the read side so close frames are noticed promptly.
            message = rx.next() => {
                match message {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
            _ = ticker.tick() => {
                let stats = collector.sample();
                let payload = match serde_json::to_string(&stats) {
                    Ok(payload) => payload,
                    Err(err) => {
                        warn!(%err, "stats serialization failed");
                        continue;
                    }
                };
                if tx.send(Message::Text(payload)).await.is_err() {
                    break;
                }
            }
        }
    }
}
