//! Idempotent start/stop wrapper owning one background task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::warn;

struct RunningTask {
    active: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Guards at most one broadcast loop per feed.
///
/// `start` and `stop` are safe to call redundantly and from concurrent
/// connection handlers; callers serialize on the inner async mutex, so N
/// simultaneous starts spawn exactly one task.
pub struct Lifecycle {
    task: Mutex<Option<RunningTask>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            task: Mutex::new(None),
        }
    }

    /// Spawns the loop via `spawn` unless one is already running.
    ///
    /// The closure receives the shared `active` flag the loop must observe at
    /// the top of each iteration. Returns `false` on a redundant call.
    pub async fn start<F>(&self, spawn: F) -> bool
    where
        F: FnOnce(Arc<AtomicBool>) -> JoinHandle<()>,
    {
        let mut task = self.task.lock().await;
        match task.as_ref() {
            Some(running) if !running.handle.is_finished() => return false,
            Some(_) => {
                // The previous loop died on its own (device open failure,
                // source closed); reap it so the feed can be retried
                // without an explicit stop.
                if let Some(dead) = task.take() {
                    if let Err(err) = dead.handle.await {
                        warn!(%err, "broadcast task ended abnormally");
                    }
                }
            }
            None => {}
        }
        let active = Arc::new(AtomicBool::new(true));
        let handle = spawn(Arc::clone(&active));
        *task = Some(RunningTask { active, handle });
        true
    }

    /// Clears the `active` flag and waits for the loop to fully exit.
    ///
    /// When this returns, no background task remains and the loop has
    /// released whatever device handle it held. No-op when already stopped;
    /// returns `false` in that case.
    pub async fn stop(&self) -> bool {
        let mut task = self.task.lock().await;
        let Some(running) = task.take() else {
            return false;
        };
        running.active.store(false, Ordering::SeqCst);
        if let Err(err) = running.handle.await {
            warn!(%err, "broadcast task ended abnormally");
        }
        true
    }

    /// True while the background task is alive. A loop that exited on its
    /// own (rather than via [`stop`](Self::stop)) reads as not running.
    pub async fn is_running(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
