//! Ordered, append-only message history for one session.
//!
//! [`MessageStream`] is the single writer and lives inside the connection
//! task. Readers hold cloneable [`MessageView`]s and may take snapshots or
//! follow appends with a [`MessageCursor`]. Once the owning session ends the
//! stream is sealed: appends are refused and cursors finish after draining.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::watch;

struct Shared<T> {
    messages: RwLock<Vec<T>>,
    sealed: AtomicBool,
    /// Current length, bumped after every append and on seal.
    len_tx: watch::Sender<usize>,
}

impl<T: Clone> Shared<T> {
    fn get(&self, index: usize) -> Option<T> {
        self.messages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(index)
            .cloned()
    }

    fn snapshot(&self) -> Vec<T> {
        self.messages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn len(&self) -> usize {
        self.messages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Writer half of a session's message history.
pub struct MessageStream<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Clone> MessageStream<T> {
    pub fn new() -> Self {
        let (len_tx, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                messages: RwLock::new(Vec::new()),
                sealed: AtomicBool::new(false),
                len_tx,
            }),
        }
    }

    /// Append at the tail. Returns `false` and drops `message` if the stream
    /// has been sealed.
    pub fn append(&self, message: T) -> bool {
        let len = {
            let mut messages = self
                .shared
                .messages
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if self.shared.sealed.load(Ordering::Acquire) {
                return false;
            }
            messages.push(message);
            messages.len()
        };
        self.shared.len_tx.send_replace(len);
        true
    }

    /// Refuse all further appends and wake every cursor. Idempotent.
    pub fn seal(&self) {
        {
            let _guard = self
                .shared
                .messages
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            self.shared.sealed.store(true, Ordering::Release);
        }
        self.shared.len_tx.send_modify(|_| {});
    }

    pub fn is_sealed(&self) -> bool {
        self.shared.sealed.load(Ordering::Acquire)
    }

    /// Current ordered history.
    pub fn snapshot(&self) -> Vec<T> {
        self.shared.snapshot()
    }

    pub fn len(&self) -> usize {
        self.shared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read-only handle for observers.
    pub fn view(&self) -> MessageView<T> {
        MessageView {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone> Default for MessageStream<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for MessageStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageStream")
            .field("len", &*self.shared.len_tx.borrow())
            .field("sealed", &self.shared.sealed.load(Ordering::Acquire))
            .finish()
    }
}

/// Read-only, cloneable handle onto a [`MessageStream`].
pub struct MessageView<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Clone> MessageView<T> {
    /// Current ordered history.
    pub fn snapshot(&self) -> Vec<T> {
        self.shared.snapshot()
    }

    pub fn len(&self) -> usize {
        self.shared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` once the owning session has ended.
    pub fn is_sealed(&self) -> bool {
        self.shared.sealed.load(Ordering::Acquire)
    }

    /// Follow the history from the first message onward.
    pub fn subscribe(&self) -> MessageCursor<T> {
        MessageCursor {
            shared: Arc::clone(&self.shared),
            position: 0,
            len_rx: self.shared.len_tx.subscribe(),
        }
    }

    /// Follow only messages appended after this call.
    pub fn subscribe_from_end(&self) -> MessageCursor<T> {
        let mut cursor = self.subscribe();
        cursor.position = self.len();
        cursor
    }
}

impl<T> Clone for MessageView<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> std::fmt::Debug for MessageView<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageView")
            .field("len", &*self.shared.len_tx.borrow())
            .finish()
    }
}

/// Yields each appended message exactly once, in arrival order.
pub struct MessageCursor<T> {
    shared: Arc<Shared<T>>,
    position: usize,
    len_rx: watch::Receiver<usize>,
}

impl<T: Clone> MessageCursor<T> {
    /// Wait for the next message. Returns `None` once the stream is sealed and
    /// every message before the seal has been yielded.
    ///
    /// Cancel-safe: dropping the future never skips a message.
    pub async fn next(&mut self) -> Option<T> {
        loop {
            // Mark the current value seen before inspecting the history so an
            // append racing with this check still wakes `changed()`.
            self.len_rx.borrow_and_update();

            if let Some(message) = self.shared.get(self.position) {
                self.position += 1;
                return Some(message);
            }
            if self.shared.sealed.load(Ordering::Acquire) {
                return None;
            }
            if self.len_rx.changed().await.is_err() {
                return None;
            }
        }
    }

    /// Index of the next message this cursor will yield.
    pub fn position(&self) -> usize {
        self.position
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn snapshot_preserves_arrival_order_and_duplicates() {
        let stream = MessageStream::new();
        for item in ["a", "b", "a", "c"] {
            assert!(stream.append(item));
        }
        assert_eq!(stream.snapshot(), vec!["a", "b", "a", "c"]);
        assert_eq!(stream.view().snapshot(), stream.snapshot());
        assert_eq!(stream.len(), 4);
    }

    #[test]
    fn sealed_stream_refuses_appends() {
        let stream = MessageStream::new();
        stream.append(1);
        stream.seal();
        stream.seal();
        assert!(!stream.append(2));
        assert_eq!(stream.snapshot(), vec![1]);
        assert!(stream.view().is_sealed());
    }

    #[test]
    fn views_outlive_the_writer_without_growing() {
        let stream = MessageStream::new();
        stream.append("kept");
        let view = stream.view();
        stream.seal();
        drop(stream);
        assert_eq!(view.snapshot(), vec!["kept"]);
    }

    #[tokio::test]
    async fn cursor_replays_history_then_follows_appends() {
        let stream = MessageStream::new();
        stream.append(1);
        let mut cursor = stream.view().subscribe();

        assert_eq!(cursor.next().await, Some(1));

        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            stream.append(2);
            stream.append(3);
            stream.seal();
        });

        assert_eq!(cursor.next().await, Some(2));
        assert_eq!(cursor.next().await, Some(3));
        assert_eq!(cursor.next().await, None);
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn cursor_from_end_skips_existing_history() {
        let stream = MessageStream::new();
        stream.append("old");
        let mut cursor = stream.view().subscribe_from_end();
        stream.append("new");
        stream.seal();

        assert_eq!(cursor.next().await, Some("new"));
        assert_eq!(cursor.next().await, None);
        assert_eq!(cursor.position(), 2);
    }

    #[test]
    fn cursor_is_pending_until_the_first_append() {
        let stream = MessageStream::new();
        let mut cursor = stream.view().subscribe();
        {
            let mut next = tokio_test::task::spawn(cursor.next());
            tokio_test::assert_pending!(next.poll());

            stream.append("first");
            assert!(next.is_woken());
            assert_eq!(tokio_test::assert_ready!(next.poll()), Some("first"));
        }
        assert_eq!(cursor.position(), 1);
    }

    #[tokio::test]
    async fn cursor_wakes_on_seal_without_new_messages() {
        let stream: MessageStream<u8> = MessageStream::new();
        let mut cursor = stream.view().subscribe();
        let waiter = tokio::spawn(async move { cursor.next().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        stream.seal();
        assert_eq!(waiter.await.unwrap(), None);
    }
}
