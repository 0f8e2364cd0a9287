//! The "async stream": a single-producer, multi-consumer in-memory ring
//! used by `PutHR` to multiplex one input reader to N concurrent uploads.
//!
//! Every consumer starts at offset 0 and reads independently; the producer
//! is backpressured once the slowest consumer falls more than `window`
//! bytes behind the write head. This replaces the pipe/reader pattern the
//! upstream implementation uses for the same purpose (spec design notes:
//! "this replaces any language-specific pipe/reader pattern").

use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

struct Inner {
    buffer: Vec<u8>,
    closed: bool,
    consumer_offsets: Vec<usize>,
}

/// A handle identifying one consumer's read cursor into the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderId(usize);

/// The ring itself. Cheap to clone (an `Arc` internally) so every upload
/// task can hold its own handle plus a distinct [`ReaderId`].
#[derive(Clone)]
pub struct AsyncStream {
    inner: Arc<Mutex<Inner>>,
    space_available: Arc<Notify>,
    data_available: Arc<Notify>,
    window: usize,
}

impl AsyncStream {
    /// `window` bounds how far the write head may run ahead of the
    /// slowest reader before `write` blocks.
    pub fn new(window: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                buffer: Vec::new(),
                closed: false,
                consumer_offsets: Vec::new(),
            })),
            space_available: Arc::new(Notify::new()),
            data_available: Arc::new(Notify::new()),
            window,
        }
    }

    /// Register a new consumer, starting at offset 0.
    pub async fn add_reader(&self) -> ReaderId {
        let mut inner = self.inner.lock().await;
        inner.consumer_offsets.push(0);
        ReaderId(inner.consumer_offsets.len() - 1)
    }

    /// Append `chunk`, blocking while the slowest reader is more than
    /// `window` bytes behind the current write head.
    pub async fn write(&self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        loop {
            let notified = self.space_available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut inner = self.inner.lock().await;
                let min_offset = inner.consumer_offsets.iter().copied().min().unwrap_or(0);
                let outstanding = inner.buffer.len().saturating_sub(min_offset);
                if inner.consumer_offsets.is_empty() || outstanding <= self.window {
                    inner.buffer.extend_from_slice(chunk);
                    drop(inner);
                    self.data_available.notify_waiters();
                    return;
                }
            }

            notified.await;
        }
    }

    /// Mark the stream finished; readers observe EOF once they've drained
    /// whatever was already written.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        inner.closed = true;
        drop(inner);
        self.data_available.notify_waiters();
    }

    /// Read up to `max_len` bytes for `reader`, waiting for more data if
    /// none is available yet. Returns `None` once the stream is closed and
    /// this reader has caught up to the write head.
    pub async fn read(&self, reader: ReaderId, max_len: usize) -> Option<Vec<u8>> {
        loop {
            let notified = self.data_available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut inner = self.inner.lock().await;
                let offset = inner.consumer_offsets[reader.0];
                if offset < inner.buffer.len() {
                    let end = (offset + max_len).min(inner.buffer.len());
                    let out = inner.buffer[offset..end].to_vec();
                    inner.consumer_offsets[reader.0] = end;
                    drop(inner);
                    self.space_available.notify_waiters();
                    return Some(out);
                }
                if inner.closed {
                    return None;
                }
            }

            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn single_reader_round_trips() {
        let stream = AsyncStream::new(1024);
        let reader = stream.add_reader().await;

        stream.write(b"hello ").await;
        stream.write(b"world").await;
        stream.close().await;

        let mut collected = Vec::new();
        while let Some(chunk) = stream.read(reader, 4096).await {
            collected.extend(chunk);
        }
        assert_eq!(collected, b"hello world");
    }

    #[tokio::test]
    async fn multiple_readers_see_the_same_bytes_independently() {
        let stream = AsyncStream::new(1024);
        let r1 = stream.add_reader().await;
        let r2 = stream.add_reader().await;

        stream.write(b"payload").await;
        stream.close().await;

        // r1 drains fully before r2 even starts — offsets are independent.
        let mut out1 = Vec::new();
        while let Some(chunk) = stream.read(r1, 4096).await {
            out1.extend(chunk);
        }
        let mut out2 = Vec::new();
        while let Some(chunk) = stream.read(r2, 4096).await {
            out2.extend(chunk);
        }
        assert_eq!(out1, b"payload");
        assert_eq!(out2, b"payload");
    }

    #[tokio::test]
    async fn write_blocks_until_slow_reader_catches_up() {
        let stream = AsyncStream::new(4);
        let fast = stream.add_reader().await;
        let slow = stream.add_reader().await;

        stream.write(b"1234").await; // fills the window exactly

        let blocked_write = tokio::time::timeout(Duration::from_millis(50), stream.write(b"5678")).await;
        assert!(blocked_write.is_err(), "write should block while `slow` hasn't read anything");

        // Draining `fast` alone doesn't help — `slow` is the bottleneck.
        stream.read(fast, 4).await;
        let still_blocked = tokio::time::timeout(Duration::from_millis(50), stream.write(b"5678")).await;
        assert!(still_blocked.is_err());

        stream.read(slow, 4).await;
        let unblocked = tokio::time::timeout(Duration::from_millis(200), stream.write(b"5678")).await;
        assert!(unblocked.is_ok(), "write should proceed once the slow reader catches up");
    }

    #[tokio::test]
    async fn read_returns_none_after_close_and_drain() {
        let stream = AsyncStream::new(16);
        let reader = stream.add_reader().await;
        stream.close().await;
        assert_eq!(stream.read(reader, 16).await, None);
    }
}
