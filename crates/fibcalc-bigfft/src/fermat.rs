//! Arithmetic modulo 2^(n·64) + 1.
//!
//! An element is a slice of n+1 words. In normalized form the top word is 0
//! or 1, and a top word of 1 implies every lower word is 0 (the value
//! 2^(n·64) ≡ -1). Every operation leaves its destination normalized.
//!
//! Because 2^(n·64) ≡ -1, multiplying by a power of two is a word rotation
//! with a borrow rather than a general product; the transform relies on this
//! for its twiddle factors.

use num_bigint::BigUint;

use crate::arith::{add_scalar, sub_scalar, sub_with_borrow};
use crate::convert::{biguint_from_words, copy_words};
use crate::error::{FftError, Result};
use crate::kernels::Kernels;

/// Bits per word.
pub const WORD_BITS: usize = 64;

/// Element width (in words, excluding the top word) below which `mul` and
/// `sqr` use the schoolbook path.
pub const DEFAULT_MUL_THRESHOLD: usize = 30;

/// Scratch words needed by [`FermatOps::mul`] for elements of `width` words.
#[must_use]
pub fn mul_scratch_len(width: usize) -> usize {
    2 * width
}

/// Fermat-ring operations bound to a kernel table and a schoolbook crossover.
#[derive(Debug, Clone, Copy)]
pub struct FermatOps {
    kernels: Kernels,
    mul_threshold: usize,
}

impl FermatOps {
    /// Bind ring operations to `kernels`, using schoolbook products for
    /// elements narrower than `mul_threshold` words.
    #[must_use]
    pub fn new(kernels: Kernels, mul_threshold: usize) -> Self {
        Self {
            kernels,
            mul_threshold,
        }
    }

    /// The kernel table in use.
    #[must_use]
    pub fn kernels(&self) -> &Kernels {
        &self.kernels
    }

    /// Schoolbook crossover in words.
    #[must_use]
    pub fn mul_threshold(&self) -> usize {
        self.mul_threshold
    }

    /// Bring `z` into normalized form.
    pub fn normalize(&self, z: &mut [u64]) {
        normalize(z);
    }

    /// z = x + y.
    pub fn add(&self, z: &mut [u64], x: &[u64], y: &[u64]) {
        let n = z.len() - 1;
        debug_assert!(x.len() == n + 1 && y.len() == n + 1);
        let carry = (self.kernels.add_vv)(&mut z[..n], &x[..n], &y[..n]);
        reduce_signed(z, 0, carry + x[n] + y[n]);
    }

    /// z += y.
    pub fn add_assign(&self, z: &mut [u64], y: &[u64]) {
        let n = z.len() - 1;
        debug_assert_eq!(y.len(), n + 1);
        let top = z[n];
        let carry = (self.kernels.add_assign_vv)(&mut z[..n], &y[..n]);
        reduce_signed(z, 0, carry + top + y[n]);
    }

    /// z = x - y.
    pub fn sub(&self, z: &mut [u64], x: &[u64], y: &[u64]) {
        let n = z.len() - 1;
        debug_assert!(x.len() == n + 1 && y.len() == n + 1);
        let borrow = (self.kernels.sub_vv)(&mut z[..n], &x[..n], &y[..n]);
        reduce_signed(z, borrow + y[n], x[n]);
    }

    /// z -= y.
    pub fn sub_assign(&self, z: &mut [u64], y: &[u64]) {
        let n = z.len() - 1;
        debug_assert_eq!(y.len(), n + 1);
        let top = z[n];
        let borrow = (self.kernels.sub_assign_vv)(&mut z[..n], &y[..n]);
        reduce_signed(z, borrow + y[n], top);
    }

    /// z = x · 2^k. Negative `k` divides by 2^|k|.
    ///
    /// `x` must be normalized and must not alias `z`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn shift(&self, z: &mut [u64], x: &[u64], k: i64) {
        let n = x.len() - 1;
        debug_assert_eq!(z.len(), n + 1);
        let ring_bits = (n * WORD_BITS) as i64;
        let mut k = k.rem_euclid(2 * ring_bits);
        let negate_result = k >= ring_bits;
        if negate_result {
            k -= ring_bits;
        }
        let k = k as usize;
        let (kw, kb) = (k / WORD_BITS, (k % WORD_BITS) as u32);

        // Word j of x << k.
        let shifted = |j: usize| -> u64 {
            if j < kw {
                return 0;
            }
            let s = j - kw;
            let cur = if s <= n { x[s] } else { 0 };
            if kb == 0 {
                return cur;
            }
            let prev = if s >= 1 && s - 1 <= n { x[s - 1] } else { 0 };
            (cur << kb) | (prev >> (64 - kb))
        };

        // x << k = lo + hi·2^(nW) + top·2^(2nW) ≡ lo - hi + top.
        let mut borrow = 0;
        for i in 0..n {
            let (d, b) = sub_with_borrow(shifted(i), shifted(i + n), borrow);
            z[i] = d;
            borrow = b;
        }
        let top = shifted(2 * n);
        reduce_signed(z, borrow + top, 0);

        if negate_result {
            negate(z);
        }
    }

    /// z = x · √2^k, where √2 = 2^(3nW/4) - 2^(nW/4). `tmp` must have the
    /// same width as `z`.
    #[allow(clippy::cast_possible_wrap)]
    pub fn shift_half(&self, z: &mut [u64], x: &[u64], k: i64, tmp: &mut [u64]) {
        if k % 2 == 0 {
            self.shift(z, x, k / 2);
            return;
        }
        let n = (x.len() - 1) as i64;
        let u = (k - 1) / 2;
        let word_bits = WORD_BITS as i64;
        self.shift(z, x, u + (3 * word_bits / 4) * n);
        self.shift(tmp, x, u + (word_bits / 4) * n);
        self.sub_assign(z, tmp);
    }

    /// z = x · y. `scratch` must hold at least [`mul_scratch_len`] words.
    pub fn mul(&self, z: &mut [u64], x: &[u64], y: &[u64], scratch: &mut [u64]) -> Result<()> {
        let n = check_operands(z, x, scratch)?;
        if y.len() != n + 1 || y[n] > 1 {
            return Err(FftError::fault("fermat mul: malformed right operand"));
        }
        let prod = &mut scratch[..2 * n + 2];
        if n < self.mul_threshold {
            self.kernels.basic_mul(prod, x, y);
        } else {
            bignum_product(prod, &(biguint_from_words(x) * biguint_from_words(y)))?;
        }
        self.reduce_product(z, prod)
    }

    /// z = x². `scratch` must hold at least [`mul_scratch_len`] words.
    pub fn sqr(&self, z: &mut [u64], x: &[u64], scratch: &mut [u64]) -> Result<()> {
        let n = check_operands(z, x, scratch)?;
        let prod = &mut scratch[..2 * n + 2];
        if n < self.mul_threshold {
            self.kernels.basic_sqr(prod, x);
        } else {
            let xb = biguint_from_words(x);
            bignum_product(prod, &(&xb * &xb))?;
        }
        self.reduce_product(z, prod)
    }

    // prod = a + b·2^(nW) + c·2^(2nW) ≡ a - b + c
    fn reduce_product(&self, z: &mut [u64], prod: &[u64]) -> Result<()> {
        let n = z.len() - 1;
        if prod[2 * n + 1] != 0 {
            return Err(FftError::fault("fermat product exceeds 2n+1 words"));
        }
        let (a, rest) = prod.split_at(n);
        let borrow = (self.kernels.sub_vv)(&mut z[..n], a, &rest[..n]);
        reduce_signed(z, borrow + rest[n], 0);
        Ok(())
    }
}

impl Default for FermatOps {
    fn default() -> Self {
        Self::new(Kernels::portable(), DEFAULT_MUL_THRESHOLD)
    }
}

fn check_operands(z: &[u64], x: &[u64], scratch: &[u64]) -> Result<usize> {
    if x.is_empty() || z.len() != x.len() {
        return Err(FftError::fault("fermat operand width mismatch"));
    }
    let n = x.len() - 1;
    if x[n] > 1 {
        return Err(FftError::fault("fermat operand not normalized"));
    }
    if scratch.len() < 2 * n + 2 {
        return Err(FftError::fault("fermat scratch too small"));
    }
    Ok(n)
}

fn bignum_product(prod: &mut [u64], value: &BigUint) -> Result<()> {
    if copy_words(value, prod) {
        Ok(())
    } else {
        Err(FftError::fault("bignum product wider than scratch"))
    }
}

/// Normalize an element whose top word may be any value.
pub fn normalize(z: &mut [u64]) {
    let n = z.len() - 1;
    let top = z[n];
    if top == 0 {
        return;
    }
    // low + top·2^(nW) ≡ low - top
    z[n] = 0;
    if sub_scalar(&mut z[..n], top) != 0 {
        z[n] = add_scalar(&mut z[..n], 1);
    }
}

/// With the low n words of `z` holding L, set z = L + add - sub (mod p).
fn reduce_signed(z: &mut [u64], add: u64, sub: u64) {
    let n = z.len() - 1;
    let low = &mut z[..n];
    // Each wrap of the low words is worth ∓1 because 2^(nW) ≡ -1.
    let carry = add_scalar(low, add);
    let borrow = sub_scalar(low, sub);
    let top = if borrow >= carry {
        add_scalar(low, borrow - carry)
    } else if sub_scalar(low, carry - borrow) != 0 {
        add_scalar(low, 1)
    } else {
        0
    };
    z[n] = top;
    normalize(z);
}

/// z = -z for a normalized element.
fn negate(z: &mut [u64]) {
    let n = z.len() - 1;
    if z[n] == 1 {
        z.fill(0);
        z[0] = 1;
        return;
    }
    if z[..n].iter().all(|&w| w == 0) {
        return;
    }
    for w in &mut z[..n] {
        *w = !*w;
    }
    z[n] = add_scalar(&mut z[..n], 2);
}

/// Whether `z` is in normalized form.
#[must_use]
pub fn is_normalized(z: &[u64]) -> bool {
    match z.split_last() {
        Some((&0, _)) => true,
        Some((&1, low)) => low.iter().all(|&w| w == 0),
        _ => false,
    }
}
