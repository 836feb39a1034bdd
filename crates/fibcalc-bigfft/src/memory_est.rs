//! Memory estimation for FFT operations.

use fibcalc_memory::estimate_transform_words;

use crate::params::FftParams;

/// Estimate peak bytes for one FFT multiplication of `a_bits` by `b_bits`.
///
/// Counts two point-value forms plus the product's, the inverse output,
/// both coefficient buffers, and the staging arena.
#[must_use]
pub fn estimate_fft_memory(a_bits: usize, b_bits: usize) -> usize {
    let p = FftParams::for_words(a_bits.div_ceil(64), b_bits.div_ceil(64));
    let points = p.element_width() << p.k;
    let coeffs = 2 * (p.m << p.k);
    let words = 4 * points + coeffs + estimate_transform_words(p.k, p.n);
    words * 8
}
