//! Public FFT multiplication API.
//!
//! Free functions backed by a lazily built process-wide [`FftContext`] with
//! default settings. Callers that need their own pools, cache or limits
//! build a context and call its methods instead.

use std::sync::OnceLock;

use num_bigint::BigUint;
use num_traits::Zero;

use crate::arith::{basic_mul, basic_sqr, trimmed_len};
use crate::context::FftContext;
use crate::convert::{biguint_from_words, copy_words, word_len};
use crate::error::Result;

static DEFAULT_CONTEXT: OnceLock<FftContext> = OnceLock::new();

/// The shared default context.
pub fn default_context() -> &'static FftContext {
    DEFAULT_CONTEXT.get_or_init(FftContext::default)
}

/// x · y through the FFT pipeline.
pub fn multiply(x: &BigUint, y: &BigUint) -> Result<BigUint> {
    default_context().multiply(x, y)
}

/// dst = x · y through the FFT pipeline.
pub fn multiply_into(dst: &mut BigUint, x: &BigUint, y: &BigUint) -> Result<()> {
    default_context().multiply_into(dst, x, y)
}

/// x² through the FFT pipeline, transforming `x` once.
pub fn square(x: &BigUint) -> Result<BigUint> {
    default_context().square(x)
}

/// dst = x² through the FFT pipeline.
pub fn square_into(dst: &mut BigUint, x: &BigUint) -> Result<()> {
    default_context().square_into(dst, x)
}

/// Quadratic-time product over raw words.
#[must_use]
pub fn schoolbook_multiply(x: &BigUint, y: &BigUint) -> BigUint {
    if x.is_zero() || y.is_zero() {
        return BigUint::zero();
    }
    let (xw, yw) = (words_of(x), words_of(y));
    let mut z = vec![0u64; xw.len() + yw.len()];
    basic_mul(&mut z, &xw, &yw);
    z.truncate(trimmed_len(&z));
    biguint_from_words(&z)
}

/// Quadratic-time square over raw words.
#[must_use]
pub fn schoolbook_square(x: &BigUint) -> BigUint {
    if x.is_zero() {
        return BigUint::zero();
    }
    let xw = words_of(x);
    let mut z = vec![0u64; 2 * xw.len()];
    basic_sqr(&mut z, &xw);
    z.truncate(trimmed_len(&z));
    biguint_from_words(&z)
}

fn words_of(x: &BigUint) -> Vec<u64> {
    let mut w = vec![0u64; word_len(x)];
    let fits = copy_words(x, &mut w);
    debug_assert!(fits);
    w
}
