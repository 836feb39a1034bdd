//! Concurrency limits for recursive transforms and product fan-out.

use std::sync::atomic::{AtomicUsize, Ordering};

/// A counting semaphore that never blocks.
///
/// Callers that fail to get a slot run their work inline instead of
/// waiting, so nesting can never deadlock and total fan-out stays bounded.
#[derive(Debug)]
pub struct WorkerSlots {
    in_use: AtomicUsize,
    capacity: usize,
}

impl WorkerSlots {
    /// Create a semaphore with `capacity` slots.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            in_use: AtomicUsize::new(0),
            capacity,
        }
    }

    /// Take a slot if one is free.
    pub fn try_acquire(&self) -> Option<SlotGuard<'_>> {
        let mut current = self.in_use.load(Ordering::Relaxed);
        loop {
            if current >= self.capacity {
                return None;
            }
            match self.in_use.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Some(SlotGuard { slots: self }),
                Err(observed) => current = observed,
            }
        }
    }

    /// Slots currently held.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Relaxed)
    }

    /// Total slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Returns its slot on drop.
#[derive(Debug)]
pub struct SlotGuard<'a> {
    slots: &'a WorkerSlots,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.slots.in_use.fetch_sub(1, Ordering::Release);
    }
}

/// Decides whether a transform level may split across threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecursionGate {
    /// Smallest sub-transform order worth splitting.
    pub min_log_size: u32,
    /// Deepest recursion level that may still split.
    pub max_depth: u32,
}

impl RecursionGate {
    /// Whether a sub-transform of order `log_size` at `depth` may fork.
    #[must_use]
    pub fn allows(&self, log_size: u32, depth: u32) -> bool {
        log_size >= self.min_log_size && depth < self.max_depth
    }
}

impl Default for RecursionGate {
    fn default() -> Self {
        Self {
            min_log_size: 4,
            max_depth: 3,
        }
    }
}

/// Number of logical CPUs, at least one.
#[must_use]
pub fn available_cores() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}
