//! Bounded lock-free object pool.
//!
//! Used for per-calculation state bundles. Each acquired object is owned
//! exclusively by its caller until released; a caller that never releases
//! (cancellation, early error) simply lets the object drop.

use crossbeam::queue::ArrayQueue;

use crate::stats::{AtomicPoolStats, PoolStats};

/// A thread-safe object pool backed by a bounded `ArrayQueue`.
pub struct ObjectPool<T> {
    queue: ArrayQueue<T>,
    stats: AtomicPoolStats,
}

impl<T: Send> ObjectPool<T> {
    /// Create a new pool retaining at most `max_size` objects.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            queue: ArrayQueue::new(max_size.max(1)),
            stats: AtomicPoolStats::new(),
        }
    }

    /// Acquire an object from the pool, or create a new one via `factory`.
    /// A reused object is passed through `reset` first.
    pub fn acquire(&self, factory: impl FnOnce() -> T, reset: impl FnOnce(&mut T)) -> T {
        if let Some(mut item) = self.queue.pop() {
            self.stats.record_hit();
            reset(&mut item);
            item
        } else {
            self.stats.record_miss();
            factory()
        }
    }

    /// Return an object for reuse. Dropped when the pool is full.
    pub fn release(&self, item: T) {
        if self.queue.push(item).is_err() {
            self.stats.record_eviction();
        }
    }

    /// Objects currently available.
    #[must_use]
    pub fn available(&self) -> usize {
        self.queue.len()
    }

    /// Get a snapshot of pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.stats.snapshot()
    }
}
