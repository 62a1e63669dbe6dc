//! Broadcast fan-out core shared by every telemetry feed.
//!
//! One background producer per feed acquires items and delivers each of them
//! to every currently registered sink, concurrently, tolerating per-sink
//! failures. The producer runs exactly once no matter how many subscribers
//! attach, starts on demand, and stops cleanly when told to.

pub mod lifecycle;
pub mod registry;
pub mod slot;

pub use lifecycle::Lifecycle;
pub use registry::{SinkId, SinkRegistry};
pub use slot::{slot, SlotReader, SlotWriter};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

/// Delivery failure reported by a single sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("subscriber went away")]
    Closed,
    #[error("transport error: {0}")]
    Transport(String),
}

/// A destination capable of receiving one item per broadcast, with
/// independent success or failure.
#[async_trait]
pub trait Sink<T>: Send + Sync {
    async fn deliver(&self, item: T) -> Result<(), SinkError>;
}

/// Why a broadcast iteration produced no item.
#[derive(Debug, Error)]
pub enum AcquireError {
    /// Expected hardware flakiness; logged quietly, the loop continues.
    #[error("transient read failure: {0}")]
    Transient(String),
    /// Anything else; logged loudly, the loop still continues.
    #[error("read failure: {0}")]
    Unexpected(String),
    /// The upstream producer is gone for good; the loop exits.
    #[error("source closed")]
    Closed,
}

/// One telemetry producer driven by [`run_broadcast_loop`].
#[async_trait]
pub trait BroadcastSource: Send {
    type Item: Clone + Send + Sync + 'static;

    /// Produces the next item to broadcast.
    async fn acquire(&mut self) -> Result<Self::Item, AcquireError>;

    /// Fixed delay after each iteration; `None` when the source paces itself.
    fn cadence(&self) -> Option<Duration> {
        None
    }
}

/// Runs one broadcaster until `active` is cleared or the source closes.
///
/// Read errors never terminate the loop: the policy for every failure kind is
/// log-and-continue at the next cadence tick. Only [`Lifecycle::stop`] (via
/// the `active` flag) or a closed source ends it.
pub async fn run_broadcast_loop<S>(
    mut source: S,
    registry: Arc<SinkRegistry<S::Item>>,
    active: Arc<AtomicBool>,
) where
    S: BroadcastSource,
{
    while active.load(Ordering::SeqCst) {
        match source.acquire().await {
            Ok(item) => {
                // The acquire step runs even with nobody listening, keeping
                // the latest hardware value warm; only the serialization and
                // dispatch work is skipped.
                if !registry.is_empty() {
                    fan_out(&registry, item).await;
                }
            }
            Err(AcquireError::Transient(msg)) => debug!(%msg, "transient read failure"),
            Err(err @ AcquireError::Unexpected(_)) => warn!(%err, "read failure"),
            Err(AcquireError::Closed) => {
                debug!("source closed, broadcast loop exiting");
                break;
            }
        }
        if let Some(delay) = source.cadence() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Delivers one item to every registered sink concurrently.
///
/// Works from a registry snapshot, so sinks attaching or detaching during the
/// fan-out do not affect the in-flight broadcast. A failing sink is logged
/// and skipped; it never blocks or fails delivery to the others, and the item
/// is not retried for it.
pub async fn fan_out<T>(registry: &SinkRegistry<T>, item: T)
where
    T: Clone + Send + Sync + 'static,
{
    let sinks = registry.snapshot();
    let deliveries = sinks.iter().map(|(id, sink)| {
        let item = item.clone();
        async move { (*id, sink.deliver(item).await) }
    });
    for (id, result) in futures::future::join_all(deliveries).await {
        if let Err(err) = result {
            debug!(sink = %id, %err, "delivery to subscriber failed");
        }
    }
}
