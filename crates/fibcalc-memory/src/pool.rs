//! Size-classed word pools.
//!
//! Every family keeps one bounded lock-free queue per size class. Acquire
//! hands out a zeroed `Vec<u64>` whose capacity is the class size; release
//! accepts a buffer back only when its capacity matches a class exactly and
//! stays under the configured bit cap. Anything else is left to the allocator.

use std::fmt;

use crossbeam::queue::ArrayQueue;

use crate::size_class::{
    SizeClasses, COEFF_SLICE_CLASSES, FERMAT_CLASSES, FERMAT_SLICE_CLASSES, WORD_CLASSES,
};
use crate::stats::{AtomicPoolStats, PoolStats};

/// Default bit-length cap above which buffers are never pooled.
pub const DEFAULT_MAX_POOLED_BITS: usize = 100_000_000;

/// Default number of buffers retained per size class.
pub const DEFAULT_MAX_PER_CLASS: usize = 32;

/// The four buffer kinds handed out by [`MemoryPools`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolFamily {
    /// Plain digit vectors.
    Words,
    /// Single Fermat-ring elements and scratch.
    FermatElements,
    /// Polynomial coefficient storage.
    CoefficientSlices,
    /// Point-value storage.
    FermatSlices,
}

impl PoolFamily {
    /// All families, in a fixed order.
    pub const ALL: [Self; 4] = [
        Self::Words,
        Self::FermatElements,
        Self::CoefficientSlices,
        Self::FermatSlices,
    ];

    /// Size classes used by this family.
    #[must_use]
    pub fn classes(self) -> SizeClasses {
        match self {
            Self::Words => SizeClasses::new(&WORD_CLASSES),
            Self::FermatElements => SizeClasses::new(&FERMAT_CLASSES),
            Self::CoefficientSlices => SizeClasses::new(&COEFF_SLICE_CLASSES),
            Self::FermatSlices => SizeClasses::new(&FERMAT_SLICE_CLASSES),
        }
    }
}

impl fmt::Display for PoolFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Words => "words",
            Self::FermatElements => "fermat",
            Self::CoefficientSlices => "coeff-slices",
            Self::FermatSlices => "fermat-slices",
        };
        f.write_str(name)
    }
}

/// Limits shared by every pool family.
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    /// Buffers whose capacity exceeds this many bits are never retained.
    pub max_bit_len: usize,
    /// Retained buffers per size class.
    pub max_per_class: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_bit_len: DEFAULT_MAX_POOLED_BITS,
            max_per_class: DEFAULT_MAX_PER_CLASS,
        }
    }
}

/// A pool of `Vec<u64>` buffers bucketed by size class.
pub struct WordPool {
    family: PoolFamily,
    classes: SizeClasses,
    slots: Vec<ArrayQueue<Vec<u64>>>,
    max_bit_len: usize,
    stats: AtomicPoolStats,
}

impl WordPool {
    /// Create an empty pool for `family`.
    #[must_use]
    pub fn new(family: PoolFamily, config: PoolConfig) -> Self {
        let classes = family.classes();
        let per_class = config.max_per_class.max(1);
        let slots = (0..classes.len())
            .map(|_| ArrayQueue::new(per_class))
            .collect();
        Self {
            family,
            classes,
            slots,
            max_bit_len: config.max_bit_len,
            stats: AtomicPoolStats::new(),
        }
    }

    /// The family this pool serves.
    #[must_use]
    pub fn family(&self) -> PoolFamily {
        self.family
    }

    /// Get a zeroed buffer of length `len`.
    ///
    /// Its capacity is the smallest class ≥ `len`, or exactly `len` when the
    /// request is larger than every class.
    pub fn acquire(&self, len: usize) -> Vec<u64> {
        let Some(idx) = self.classes.class_for(len) else {
            self.stats.record_miss();
            return vec![0; len];
        };
        if let Some(mut buf) = self.slots[idx].pop() {
            self.stats.record_hit();
            buf.clear();
            buf.resize(len, 0);
            return buf;
        }
        self.stats.record_miss();
        let mut buf = Vec::with_capacity(self.classes.capacity(idx));
        buf.resize(len, 0);
        buf
    }

    /// Return a buffer for reuse.
    ///
    /// No-op for buffers above the bit cap or whose capacity is not a class size.
    pub fn release(&self, buf: Vec<u64>) {
        let capacity = buf.capacity();
        if capacity.saturating_mul(64) > self.max_bit_len {
            self.stats.record_rejection();
            return;
        }
        let Some(idx) = self.classes.exact(capacity) else {
            self.stats.record_rejection();
            return;
        };
        if self.slots[idx].push(buf).is_err() {
            self.stats.record_eviction();
        }
    }

    /// Pre-populate the class serving `len` until it holds `count` buffers.
    ///
    /// Returns the number of buffers added.
    pub fn warm(&self, len: usize, count: usize) -> usize {
        let Some(idx) = self.classes.class_for(len) else {
            return 0;
        };
        let capacity = self.classes.capacity(idx);
        if capacity.saturating_mul(64) > self.max_bit_len {
            return 0;
        }
        let slot = &self.slots[idx];
        let mut added = 0;
        while slot.len() < count.min(slot.capacity()) {
            if slot.push(Vec::with_capacity(capacity)).is_err() {
                break;
            }
            added += 1;
        }
        added
    }

    /// Number of buffers currently retained.
    #[must_use]
    pub fn total_pooled(&self) -> usize {
        self.slots.iter().map(ArrayQueue::len).sum()
    }

    /// Remove and return every retained buffer.
    pub fn drain(&self) -> Vec<Vec<u64>> {
        let mut out = Vec::with_capacity(self.total_pooled());
        for slot in &self.slots {
            while let Some(buf) = slot.pop() {
                out.push(buf);
            }
        }
        out
    }

    /// Drop every retained buffer.
    pub fn clear(&self) {
        drop(self.drain());
    }

    /// Get a snapshot of pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.stats.snapshot()
    }

    /// Reset pool statistics counters.
    pub fn reset_stats(&self) {
        self.stats.reset();
    }
}

/// The four word-pool families used by one engine instance.
pub struct MemoryPools {
    words: WordPool,
    fermat: WordPool,
    coeff_slices: WordPool,
    fermat_slices: WordPool,
}

impl MemoryPools {
    /// Build all families with shared limits.
    #[must_use]
    pub fn new(config: PoolConfig) -> Self {
        Self {
            words: WordPool::new(PoolFamily::Words, config),
            fermat: WordPool::new(PoolFamily::FermatElements, config),
            coeff_slices: WordPool::new(PoolFamily::CoefficientSlices, config),
            fermat_slices: WordPool::new(PoolFamily::FermatSlices, config),
        }
    }

    /// Access one family.
    #[must_use]
    pub fn family(&self, family: PoolFamily) -> &WordPool {
        match family {
            PoolFamily::Words => &self.words,
            PoolFamily::FermatElements => &self.fermat,
            PoolFamily::CoefficientSlices => &self.coeff_slices,
            PoolFamily::FermatSlices => &self.fermat_slices,
        }
    }

    /// Digit-vector pool.
    #[must_use]
    pub fn words(&self) -> &WordPool {
        &self.words
    }

    /// Fermat-element pool.
    #[must_use]
    pub fn fermat(&self) -> &WordPool {
        &self.fermat
    }

    /// Coefficient-slice pool.
    #[must_use]
    pub fn coeff_slices(&self) -> &WordPool {
        &self.coeff_slices
    }

    /// Point-value pool.
    #[must_use]
    pub fn fermat_slices(&self) -> &WordPool {
        &self.fermat_slices
    }

    /// Pre-populate one family.
    pub fn warm(&self, family: PoolFamily, len: usize, count: usize) -> usize {
        self.family(family).warm(len, count)
    }

    /// Statistics summed over every family.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolFamily::ALL
            .iter()
            .map(|&f| self.family(f).stats())
            .fold(PoolStats::default(), PoolStats::merged)
    }

    /// Buffers retained across all families.
    #[must_use]
    pub fn total_pooled(&self) -> usize {
        PoolFamily::ALL
            .iter()
            .map(|&f| self.family(f).total_pooled())
            .sum()
    }

    /// Drop every retained buffer in every family.
    pub fn clear(&self) {
        for family in PoolFamily::ALL {
            self.family(family).clear();
        }
    }
}

impl Default for MemoryPools {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words_pool() -> WordPool {
        WordPool::new(PoolFamily::Words, PoolConfig::default())
    }

    #[test]
    fn acquire_returns_zeroed_class_buffer() {
        let pool = words_pool();
        let buf = pool.acquire(100);
        assert_eq!(buf.len(), 100);
        assert!(buf.iter().all(|&w| w == 0));
        assert!(buf.capacity() >= 256);
    }

    #[test]
    fn release_then_acquire_is_a_hit() {
        let pool = words_pool();
        let mut buf = pool.acquire(200);
        buf[0] = 7;
        let cap = buf.capacity();
        pool.release(buf);
        if cap == 256 {
            assert_eq!(pool.total_pooled(), 1);
            let again = pool.acquire(150);
            assert_eq!(again.len(), 150);
            assert_eq!(again[0], 0);
            assert_eq!(pool.stats().hits, 1);
        }
    }

    #[test]
    fn release_rejects_odd_capacity() {
        let pool = words_pool();
        pool.release(Vec::with_capacity(100));
        assert_eq!(pool.total_pooled(), 0);
        assert_eq!(pool.stats().rejected, 1);
    }

    #[test]
    fn release_rejects_over_cap() {
        let pool = WordPool::new(
            PoolFamily::Words,
            PoolConfig {
                max_bit_len: 64 * 64,
                max_per_class: 4,
            },
        );
        pool.release(Vec::with_capacity(256));
        assert_eq!(pool.total_pooled(), 0);
        assert_eq!(pool.stats().rejected, 1);
    }

    #[test]
    fn full_class_counts_evictions() {
        let pool = WordPool::new(
            PoolFamily::FermatElements,
            PoolConfig {
                max_bit_len: DEFAULT_MAX_POOLED_BITS,
                max_per_class: 2,
            },
        );
        pool.warm(32, 2);
        pool.release(Vec::with_capacity(32));
        assert_eq!(pool.total_pooled(), 2);
        assert!(pool.stats().evictions + pool.stats().rejected >= 1);
    }

    #[test]
    fn oversize_request_is_served_but_not_pooled() {
        let pool = WordPool::new(PoolFamily::FermatElements, PoolConfig::default());
        let buf = pool.acquire(20_000);
        assert_eq!(buf.len(), 20_000);
        pool.release(buf);
        assert_eq!(pool.total_pooled(), 0);
    }

    #[test]
    fn warm_is_bounded_and_idempotent() {
        let pool = words_pool();
        assert_eq!(pool.warm(1_000, 5), 5);
        assert_eq!(pool.warm(1_000, 5), 0);
        assert_eq!(pool.warm(1_000, 1_000), DEFAULT_MAX_PER_CLASS - 5);
        assert_eq!(pool.total_pooled(), DEFAULT_MAX_PER_CLASS);
    }

    #[test]
    fn warm_skips_classes_above_cap() {
        let pool = WordPool::new(
            PoolFamily::Words,
            PoolConfig {
                max_bit_len: 1_000,
                max_per_class: 4,
            },
        );
        assert_eq!(pool.warm(5_000, 3), 0);
    }

    #[test]
    fn drain_empties_pool() {
        let pool = words_pool();
        pool.warm(64, 3);
        pool.warm(4_096, 2);
        let drained = pool.drain();
        assert_eq!(drained.len(), 5);
        assert_eq!(pool.total_pooled(), 0);
    }

    #[test]
    fn memory_pools_route_families() {
        let pools = MemoryPools::default();
        pools.warm(PoolFamily::FermatSlices, 3_000, 2);
        pools.warm(PoolFamily::FermatElements, 40, 1);
        assert_eq!(pools.fermat_slices().total_pooled(), 2);
        assert_eq!(pools.fermat().total_pooled(), 1);
        assert_eq!(pools.total_pooled(), 3);
        pools.clear();
        assert_eq!(pools.total_pooled(), 0);
    }

    #[test]
    fn family_display_names() {
        assert_eq!(PoolFamily::Words.to_string(), "words");
        assert_eq!(PoolFamily::FermatSlices.to_string(), "fermat-slices");
    }
}
