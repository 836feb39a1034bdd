//! Bump arena for per-multiplication temporaries.
//!
//! One arena is created per multiplication call and never shared between
//! threads. Its capacity comes from [`estimate_transform_words`]; a request
//! that no longer fits is served by a plain heap allocation instead, so an
//! undersized estimate costs speed, never correctness.

use std::cell::Cell;
use std::ops::{Deref, DerefMut};

use bumpalo::Bump;

/// Words needed by one forward + pointwise + inverse sequence, with a 20%
/// margin: `1.2 × (2·K·(n+1) + 8·n)` where `K = 2^k` and `n` is the ring
/// element width in words.
#[must_use]
pub fn estimate_transform_words(k: u32, n: usize) -> usize {
    estimate_staging_words(k, n, 2)
}

/// [`estimate_transform_words`] generalized to `operands` staged inputs:
/// `1.2 × (operands·K·(n+1) + 8·n)`.
#[must_use]
pub fn estimate_staging_words(k: u32, n: usize, operands: usize) -> usize {
    let transform_len = 1usize << k;
    let base = operands * transform_len * (n + 1) + 8 * n;
    (base * 6).div_ceil(5)
}

/// A zeroed word buffer from the arena or, on overflow, from the heap.
#[derive(Debug)]
pub enum ArenaWords<'a> {
    /// Carved out of the arena; reclaimed by [`BumpArena::reset`].
    Arena(&'a mut [u64]),
    /// Fallback allocation; freed on drop.
    Heap(Vec<u64>),
}

impl ArenaWords<'_> {
    /// Whether this buffer came from the fallback path.
    #[must_use]
    pub fn is_heap(&self) -> bool {
        matches!(self, Self::Heap(_))
    }
}

impl Deref for ArenaWords<'_> {
    type Target = [u64];

    fn deref(&self) -> &[u64] {
        match self {
            Self::Arena(slice) => slice,
            Self::Heap(vec) => vec,
        }
    }
}

impl DerefMut for ArenaWords<'_> {
    fn deref_mut(&mut self) -> &mut [u64] {
        match self {
            Self::Arena(slice) => slice,
            Self::Heap(vec) => vec,
        }
    }
}

/// Single-owner bump arena with a fixed word budget.
pub struct BumpArena {
    bump: Bump,
    capacity_words: usize,
    used_words: Cell<usize>,
    fallbacks: Cell<usize>,
}

impl BumpArena {
    /// Create an arena able to serve `words` words before falling back.
    #[must_use]
    pub fn with_capacity_words(words: usize) -> Self {
        Self {
            bump: Bump::with_capacity(words.saturating_mul(8)),
            capacity_words: words,
            used_words: Cell::new(0),
            fallbacks: Cell::new(0),
        }
    }

    /// Create an arena sized for a transform of length `2^k` over `n`-word elements.
    #[must_use]
    pub fn for_transform(k: u32, n: usize) -> Self {
        Self::with_capacity_words(estimate_transform_words(k, n))
    }

    /// Create an arena for `operands` inputs staged into one transform shape.
    #[must_use]
    pub fn for_operands(k: u32, n: usize, operands: usize) -> Self {
        Self::with_capacity_words(estimate_staging_words(k, n, operands))
    }

    /// Allocate `len` zeroed words.
    pub fn alloc_words(&self, len: usize) -> ArenaWords<'_> {
        let used = self.used_words.get();
        if used + len <= self.capacity_words {
            self.used_words.set(used + len);
            ArenaWords::Arena(self.bump.alloc_slice_fill_copy(len, 0u64))
        } else {
            self.fallbacks.set(self.fallbacks.get() + 1);
            tracing::trace!(
                requested = len,
                remaining = self.capacity_words - used,
                "arena exhausted, falling back to heap"
            );
            ArenaWords::Heap(vec![0; len])
        }
    }

    /// Rewind the arena. Outstanding borrows prevent calling this early.
    pub fn reset(&mut self) {
        self.bump.reset();
        self.used_words.set(0);
    }

    /// Words handed out from the arena since the last reset.
    #[must_use]
    pub fn used_words(&self) -> usize {
        self.used_words.get()
    }

    /// Word budget.
    #[must_use]
    pub fn capacity_words(&self) -> usize {
        self.capacity_words
    }

    /// Words still available before falling back.
    #[must_use]
    pub fn remaining_words(&self) -> usize {
        self.capacity_words - self.used_words.get()
    }

    /// Requests served by the heap fallback.
    #[must_use]
    pub fn fallback_count(&self) -> usize {
        self.fallbacks.get()
    }

    /// Bytes reserved by the underlying bump allocator.
    #[must_use]
    pub fn allocated_bytes(&self) -> usize {
        self.bump.allocated_bytes()
    }
}
