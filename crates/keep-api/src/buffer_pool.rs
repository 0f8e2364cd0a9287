//! A counting semaphore bounding how many 64 MiB block buffers may be in
//! flight at once.
//!
//! Every handler that reads a request body or a stored block checks out a
//! permit first and holds it for the duration of the operation; `HEAD`,
//! `DELETE`, and the index routes never touch a block's bytes, so they
//! never check one out.

use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

use keep_store::MAX_BLOCK_SIZE;

/// Bounds concurrent block-sized buffers rather than bytes: `max_buffers`
/// slots, each implicitly `MAX_BLOCK_SIZE` bytes.
pub struct BufferPool {
    semaphore: Arc<Semaphore>,
}

/// Held for the lifetime of one Get/Put; dropping it returns the slot.
pub struct BufferPermit<'a> {
    _permit: SemaphorePermit<'a>,
}

impl BufferPool {
    pub fn new(max_buffers: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_buffers.max(1))),
        }
    }

    /// Wait for a free buffer slot.
    pub async fn checkout(&self) -> BufferPermit<'_> {
        let permit = self
            .semaphore
            .acquire()
            .await
            .expect("buffer pool semaphore is never closed");
        BufferPermit { _permit: permit }
    }

    /// Buffers currently free, for `GET /status.json`.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// The fixed per-buffer size every slot represents.
    pub fn buffer_size(&self) -> u64 {
        MAX_BLOCK_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn checkout_blocks_once_capacity_is_exhausted() {
        let pool = BufferPool::new(1);
        let _first = pool.checkout().await;
        assert_eq!(pool.available(), 0);

        let second = tokio::time::timeout(std::time::Duration::from_millis(50), pool.checkout()).await;
        assert!(second.is_err(), "second checkout should block while the only slot is held");
    }

    #[tokio::test]
    async fn releasing_a_permit_frees_the_slot() {
        let pool = BufferPool::new(1);
        {
            let _permit = pool.checkout().await;
            assert_eq!(pool.available(), 0);
        }
        assert_eq!(pool.available(), 1);
    }
}
