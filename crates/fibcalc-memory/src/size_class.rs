//! Geometric size-class tables for the word pools.
//!
//! Each pool family buckets its buffers by capacity (in 64-bit words).
//! A request is served from the smallest class that fits; a buffer is only
//! ever accepted back if its capacity equals one of the class sizes exactly.

/// Digit vectors: operands, products and reassembly outputs.
pub const WORD_CLASSES: [usize; 10] = [
    64, 256, 1_024, 4_096, 16_384, 65_536, 262_144, 1_048_576, 4_194_304, 16_777_216,
];

/// Single Fermat-ring elements and their multiplication scratch.
pub const FERMAT_CLASSES: [usize; 10] = [
    32, 64, 128, 256, 512, 1_024, 2_048, 4_096, 8_192, 16_384,
];

/// Contiguous coefficient storage of a split polynomial.
pub const COEFF_SLICE_CLASSES: [usize; 8] = [
    1_024, 4_096, 16_384, 65_536, 262_144, 1_048_576, 4_194_304, 16_777_216,
];

/// Contiguous point-value storage (2^K ring elements).
pub const FERMAT_SLICE_CLASSES: [usize; 8] = [
    2_048, 8_192, 32_768, 131_072, 524_288, 2_097_152, 8_388_608, 33_554_432,
];

/// An ascending table of buffer capacities.
#[derive(Debug, Clone, Copy)]
pub struct SizeClasses {
    classes: &'static [usize],
}

impl SizeClasses {
    /// Wrap a static, strictly ascending table.
    #[must_use]
    pub const fn new(classes: &'static [usize]) -> Self {
        Self { classes }
    }

    /// Index of the smallest class able to hold `len` words.
    #[must_use]
    pub fn class_for(&self, len: usize) -> Option<usize> {
        let idx = self.classes.partition_point(|&c| c < len);
        (idx < self.classes.len()).then_some(idx)
    }

    /// Index of the class whose size is exactly `capacity`.
    #[must_use]
    pub fn exact(&self, capacity: usize) -> Option<usize> {
        self.classes.binary_search(&capacity).ok()
    }

    /// Capacity of class `idx`.
    #[must_use]
    pub fn capacity(&self, idx: usize) -> usize {
        self.classes[idx]
    }

    /// Number of classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Largest poolable capacity.
    #[must_use]
    pub fn largest(&self) -> usize {
        self.classes.last().copied().unwrap_or(0)
    }
}
