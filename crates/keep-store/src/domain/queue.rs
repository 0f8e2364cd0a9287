//! The pull/trash work queue: `Idle -> Draining(list) -> (replaced)`.
//!
//! A `replace` atomically swaps in a new list and discards whatever tail of
//! the previous list had not yet been handed to a worker. Items already
//! checked out by `next()` run to completion; only the unconsumed remainder
//! is cancelled.

use std::collections::VecDeque;
use tokio::sync::Mutex;

/// Snapshot of a queue's state, for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    /// No items pending.
    Idle,
    /// `n` items remain to be handed out.
    Draining(usize),
}

/// An ordered list of work items with atomic whole-list replacement.
pub struct WorkQueue<T> {
    items: Mutex<VecDeque<T>>,
    /// Bumped on every `replace`, so a worker that stashed a generation
    /// before awaiting I/O can tell whether its item still belongs to the
    /// current list (informational only; items themselves are not re-run).
    generation: std::sync::atomic::AtomicU64,
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            generation: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Replace the current list wholesale. Any items not yet taken by
    /// `next()` are dropped.
    pub async fn replace(&self, list: Vec<T>) {
        let mut items = self.items.lock().await;
        *items = list.into_iter().collect();
        self.generation
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    /// Take the next item, if any.
    pub async fn next(&self) -> Option<T> {
        self.items.lock().await.pop_front()
    }

    /// Current depth and Idle/Draining state.
    pub async fn state(&self) -> QueueState {
        let depth = self.items.lock().await.len();
        if depth == 0 {
            QueueState::Idle
        } else {
            QueueState::Draining(depth)
        }
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_idle() {
        let q: WorkQueue<u32> = WorkQueue::new();
        assert_eq!(q.state().await, QueueState::Idle);
    }

    #[tokio::test]
    async fn replace_then_drain() {
        let q = WorkQueue::new();
        q.replace(vec![1, 2, 3]).await;
        assert_eq!(q.state().await, QueueState::Draining(3));
        assert_eq!(q.next().await, Some(1));
        assert_eq!(q.next().await, Some(2));
        assert_eq!(q.state().await, QueueState::Draining(1));
        assert_eq!(q.next().await, Some(3));
        assert_eq!(q.next().await, None);
        assert_eq!(q.state().await, QueueState::Idle);
    }

    #[tokio::test]
    async fn replace_discards_unconsumed_tail() {
        let q = WorkQueue::new();
        q.replace(vec![1, 2, 3]).await;
        assert_eq!(q.next().await, Some(1));
        q.replace(vec![9]).await;
        assert_eq!(q.next().await, Some(9));
        assert_eq!(q.next().await, None);
    }

    #[tokio::test]
    async fn generation_bumps_on_replace() {
        let q: WorkQueue<u32> = WorkQueue::new();
        let g0 = q.generation();
        q.replace(vec![1]).await;
        assert_eq!(q.generation(), g0 + 1);
    }
}
