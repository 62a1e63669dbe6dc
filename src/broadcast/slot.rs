//! Single-slot handoff between a push-style producer and a pull-style consumer.
//!
//! The slot holds at most one pending value. A write always replaces whatever
//! is there (latest wins, nothing queues), so a fast encoder can never back up
//! behind a slow consumer loop. The producer half is cheap to clone and safe
//! to call from a foreign OS thread, which is where hardware encoder callbacks
//! live; the consumer half is an awaitable read inside the runtime.

use tokio::sync::watch;

/// Creates a connected writer/reader pair around an empty slot.
pub fn slot<T: Clone>() -> (SlotWriter<T>, SlotReader<T>) {
    let (tx, rx) = watch::channel(None);
    (SlotWriter { tx }, SlotReader { rx })
}

/// Producer half of the slot.
#[derive(Clone)]
pub struct SlotWriter<T> {
    tx: watch::Sender<Option<T>>,
}

impl<T> SlotWriter<T> {
    /// Stores `item`, replacing any unconsumed value, and wakes the blocked
    /// reader. Never blocks; callable from any thread.
    pub fn write(&self, item: T) {
        // Err here only means the reader is gone; the frame is simply dropped.
        let _ = self.tx.send(Some(item));
    }
}

/// Consumer half of the slot.
pub struct SlotReader<T> {
    rx: watch::Receiver<Option<T>>,
}

impl<T: Clone> SlotReader<T> {
    /// Waits until a value is pending, consumes it, and returns it.
    ///
    /// Returns `None` once every [`SlotWriter`] has been dropped.
    pub async fn read(&mut self) -> Option<T> {
        loop {
            if self.rx.changed().await.is_err() {
                return None;
            }
            if let Some(item) = self.rx.borrow_and_update().clone() {
                return Some(item);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn write_then_read_returns_item() {
        let (writer, mut reader) = slot();
        writer.write(42u32);
        assert_eq!(reader.read().await, Some(42));
    }

    #[tokio::test]
    async fn second_write_replaces_first() {
        let (writer, mut reader) = slot();
        writer.write(1u32);
        writer.write(2u32);
        assert_eq!(reader.read().await, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn read_blocks_until_write() {
        let (writer, mut reader) = slot();

        let blocked = timeout(Duration::from_millis(10), reader.read()).await;
        assert!(blocked.is_err(), "read completed with no write pending");

        writer.write(7u32);
        assert_eq!(reader.read().await, Some(7));
    }

    #[tokio::test]
    async fn read_after_consume_blocks_again() {
        let (writer, mut reader) = slot();
        writer.write(1u32);
        assert_eq!(reader.read().await, Some(1));

        let blocked = timeout(Duration::from_millis(10), reader.read()).await;
        assert!(blocked.is_err(), "slot was not cleared by the first read");
    }

    #[tokio::test]
    async fn write_from_foreign_thread_wakes_reader() {
        let (writer, mut reader) = slot();
        let pusher = std::thread::spawn(move || writer.write(99u32));
        assert_eq!(reader.read().await, Some(99));
        pusher.join().expect("pusher thread panicked");
    }

    #[tokio::test]
    async fn read_returns_none_after_writers_drop() {
        let (writer, mut reader) = slot::<u32>();
        drop(writer);
        assert_eq!(reader.read().await, None);
    }
}
