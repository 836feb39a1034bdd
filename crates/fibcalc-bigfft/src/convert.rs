//! Conversions between `BigUint` and little-endian word vectors.

use num_bigint::BigUint;

#[allow(clippy::cast_possible_truncation)]
fn split_words(words: &[u64]) -> Vec<u32> {
    let mut digits = Vec::with_capacity(words.len() * 2);
    for &w in words {
        digits.push(w as u32);
        digits.push((w >> 32) as u32);
    }
    digits
}

/// Build a `BigUint` from words (trailing zeros allowed).
#[must_use]
pub fn biguint_from_words(words: &[u64]) -> BigUint {
    BigUint::new(split_words(words))
}

/// Overwrite `dst` with the value of `words`, reusing its allocation.
pub fn assign_from_words(dst: &mut BigUint, words: &[u64]) {
    dst.assign_from_slice(&split_words(words));
}

/// Number of significant 64-bit words in `x`.
#[must_use]
pub fn word_len(x: &BigUint) -> usize {
    x.iter_u64_digits().len()
}

/// Copy the words of `x` into `out`, zero-filling the tail.
///
/// Returns `false` if `out` is too short to hold `x`.
#[must_use]
pub fn copy_words(x: &BigUint, out: &mut [u64]) -> bool {
    let digits = x.iter_u64_digits();
    if digits.len() > out.len() {
        return false;
    }
    let written = digits.len();
    for (dst, d) in out.iter_mut().zip(digits) {
        *dst = d;
    }
    out[written..].fill(0);
    true
}

/// Count the number of significant bits in a `BigUint`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn bit_length(n: &BigUint) -> usize {
    n.bits() as usize
}
