//! Transform size selection.

use crate::fermat::WORD_BITS;

/// Combined operand bit lengths at which each transform order stops
/// sufficing. Index k covers products below `FFT_SIZE_THRESHOLDS[k]` bits.
pub const FFT_SIZE_THRESHOLDS: [u64; 16] = [
    0,
    0,
    0,
    4 << 10,
    8 << 10,
    16 << 10,
    32 << 10,
    64 << 10,
    1 << 18,
    1 << 20,
    3 << 20,
    8 << 20,
    30 << 20,
    100 << 20,
    300 << 20,
    600 << 20,
];

/// Transform order for a product of `bits` total bits.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn fft_size(bits: u64) -> u32 {
    FFT_SIZE_THRESHOLDS
        .iter()
        .position(|&t| t > bits)
        .unwrap_or(FFT_SIZE_THRESHOLDS.len()) as u32
}

/// Ring width `n` (in words) able to hold the convolution of `2^k`
/// coefficients of `m` words each.
///
/// The returned width is rounded up to a multiple of `2^(k - extra)` bits
/// (at least one word); with `extra = 2` the ring contains the √2-based
/// root of unity the transform needs.
#[must_use]
pub fn value_size(k: u32, m: usize, extra: u32) -> usize {
    let bits = 2 * m * WORD_BITS + k as usize;
    let granule = (1usize << k.saturating_sub(extra)).max(WORD_BITS);
    (bits / granule + 1) * granule / WORD_BITS
}

/// Shape of one FFT multiplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FftParams {
    /// Transform order; the transform has `2^k` points.
    pub k: u32,
    /// Coefficient width in words.
    pub m: usize,
    /// Ring width in words (elements hold `n + 1` words).
    pub n: usize,
}

impl FftParams {
    /// Parameters for multiplying operands of `x_words` and `y_words` words.
    #[must_use]
    pub fn for_words(x_words: usize, y_words: usize) -> Self {
        let words = x_words + y_words;
        let k = fft_size((words * WORD_BITS) as u64);
        let m = (words >> k) + 1;
        let n = value_size(k, m, 2);
        Self { k, m, n }
    }

    /// Parameters for squaring an operand of `words` words.
    #[must_use]
    pub fn for_square(words: usize) -> Self {
        Self::for_words(words, words)
    }

    /// Number of transform points.
    #[must_use]
    pub fn transform_len(&self) -> usize {
        1 << self.k
    }

    /// Width of one ring element in words.
    #[must_use]
    pub fn element_width(&self) -> usize {
        self.n + 1
    }

    /// Coefficients an operand of `words` words splits into.
    #[must_use]
    pub fn coefficient_count(&self, words: usize) -> usize {
        words / self.m + 1
    }

    /// Whether an operand of `words` words fits this transform.
    #[must_use]
    pub fn fits(&self, words: usize) -> bool {
        self.coefficient_count(words) <= self.transform_len()
    }
}
