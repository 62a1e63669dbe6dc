//! Registry of the subscribers currently attached to one feed.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::Sink;

/// Identity of one registered sink, unique within its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkId(u64);

impl fmt::Display for SinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The set of currently connected subscribers for one feed.
///
/// Mutation and iteration never overlap: the broadcast loop works from a
/// [`snapshot`](Self::snapshot) copy, so a connect or disconnect during an
/// in-flight fan-out cannot affect it. The mutex is scoped to the copy or
/// the mutation, nothing else.
pub struct SinkRegistry<T> {
    sinks: Mutex<HashMap<SinkId, Arc<dyn Sink<T>>>>,
    next_id: AtomicU64,
}

impl<T> SinkRegistry<T> {
    pub fn new() -> Self {
        Self {
            sinks: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SinkId, Arc<dyn Sink<T>>>> {
        match self.sinks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Registers a sink, returning the id used to remove it on disconnect.
    pub fn add(&self, sink: Arc<dyn Sink<T>>) -> SinkId {
        let id = SinkId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().insert(id, sink);
        id
    }

    /// Removes a sink; returns `false` when the id was already gone.
    pub fn remove(&self, id: SinkId) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// Copies the current membership so callers can iterate outside the lock.
    pub fn snapshot(&self) -> Vec<(SinkId, Arc<dyn Sink<T>>)> {
        self.lock()
            .iter()
            .map(|(id, sink)| (*id, Arc::clone(sink)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl<T> Default for SinkRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
