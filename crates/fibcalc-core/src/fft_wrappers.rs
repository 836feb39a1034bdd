//! Three-tier multiplication routing.
//!
//! Schoolbook below the intermediate threshold, num-bigint's sub-quadratic
//! product (Karatsuba / Toom-3) between the two thresholds, and the Fermat
//! FFT above the FFT threshold. A threshold of 0 disables its tier.

use fibcalc_bigfft::{schoolbook_multiply, schoolbook_square, FftContext, Interrupt};
use num_bigint::BigUint;

use crate::calculator::FibError;

/// Multiplication algorithm family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MulTier {
    /// Quadratic word-by-word product.
    Schoolbook,
    /// num-bigint's built-in product.
    Intermediate,
    /// Fermat-ring FFT.
    Fft,
}

/// Pick a tier for operands of `a_bits` and `b_bits` bits.
///
/// A tier applies only when both operands exceed its threshold.
#[must_use]
pub fn select_tier(
    a_bits: usize,
    b_bits: usize,
    fft_threshold: usize,
    intermediate_threshold: usize,
) -> MulTier {
    let smaller = a_bits.min(b_bits);
    if fft_threshold > 0 && smaller > fft_threshold {
        MulTier::Fft
    } else if intermediate_threshold > 0 && smaller > intermediate_threshold {
        MulTier::Intermediate
    } else {
        MulTier::Schoolbook
    }
}

/// a · b on the given tier.
pub fn multiply_with(
    tier: MulTier,
    fft: &FftContext,
    a: &BigUint,
    b: &BigUint,
    interrupt: &dyn Interrupt,
) -> Result<BigUint, FibError> {
    match tier {
        MulTier::Schoolbook => Ok(schoolbook_multiply(a, b)),
        MulTier::Intermediate => Ok(a * b),
        MulTier::Fft => Ok(fft.multiply_interruptible(a, b, interrupt)?),
    }
}

/// a² on the given tier.
pub fn square_with(
    tier: MulTier,
    fft: &FftContext,
    a: &BigUint,
    interrupt: &dyn Interrupt,
) -> Result<BigUint, FibError> {
    match tier {
        MulTier::Schoolbook => Ok(schoolbook_square(a)),
        MulTier::Intermediate => Ok(a * a),
        MulTier::Fft => Ok(fft.square_interruptible(a, interrupt)?),
    }
}

/// a · b, routed by operand size.
#[allow(clippy::cast_possible_truncation)]
pub fn smart_multiply(
    fft: &FftContext,
    a: &BigUint,
    b: &BigUint,
    fft_threshold: usize,
    intermediate_threshold: usize,
    interrupt: &dyn Interrupt,
) -> Result<BigUint, FibError> {
    let tier = select_tier(
        a.bits() as usize,
        b.bits() as usize,
        fft_threshold,
        intermediate_threshold,
    );
    multiply_with(tier, fft, a, b, interrupt)
}

/// a², routed by operand size.
#[allow(clippy::cast_possible_truncation)]
pub fn smart_square(
    fft: &FftContext,
    a: &BigUint,
    fft_threshold: usize,
    intermediate_threshold: usize,
    interrupt: &dyn Interrupt,
) -> Result<BigUint, FibError> {
    let bits = a.bits() as usize;
    let tier = select_tier(bits, bits, fft_threshold, intermediate_threshold);
    square_with(tier, fft, a, interrupt)
}
