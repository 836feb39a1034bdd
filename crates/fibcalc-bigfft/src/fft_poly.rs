//! Polynomial view of an integer and its point-value form.
//!
//! An operand of `len` words is cut into `len / m + 1` coefficients of `m`
//! words, which is exactly its word vector zero-padded to a multiple of `m`.
//! After the forward transform every point is a Fermat element of `n + 1`
//! words; after the inverse transform every coefficient is too, and
//! reassembly adds coefficient `i` at word offset `i·m`.

use fibcalc_memory::{BumpArena, MemoryPools};
use rayon::prelude::*;

use crate::arith::{add_assign_vv, add_scalar, trimmed_len};
use crate::error::{FftError, Result};
use crate::fermat::{mul_scratch_len, FermatOps};
use crate::fft_core::{Direction, Fourier};

/// Coefficient form of an operand or product.
#[derive(Debug)]
pub struct Poly {
    k: u32,
    m: usize,
    width: usize,
    count: usize,
    coeffs: Vec<u64>,
}

impl Poly {
    /// Split `words` into coefficients of `m` words for a `2^k`-point transform.
    pub fn from_words(words: &[u64], k: u32, m: usize, pools: &MemoryPools) -> Result<Self> {
        if m == 0 {
            return Err(FftError::fault("zero coefficient width"));
        }
        let count = words.len() / m + 1;
        if count > 1 << k {
            return Err(FftError::fault(format!(
                "{count} coefficients exceed transform length {}",
                1usize << k
            )));
        }
        let mut coeffs = pools.coeff_slices().acquire(count * m);
        coeffs[..words.len()].copy_from_slice(words);
        Ok(Self {
            k,
            m,
            width: m,
            count,
            coeffs,
        })
    }

    /// Transform order.
    #[must_use]
    pub fn k(&self) -> u32 {
        self.k
    }

    /// Chunk size in words.
    #[must_use]
    pub fn m(&self) -> usize {
        self.m
    }

    /// Number of coefficients.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Coefficient `i`.
    #[must_use]
    pub fn coeff(&self, i: usize) -> &[u64] {
        &self.coeffs[i * self.width..(i + 1) * self.width]
    }

    /// The operand words this polynomial was cut from, zero-padded.
    #[must_use]
    pub fn words(&self) -> &[u64] {
        &self.coeffs
    }

    /// Forward transform into a ring of width `n`.
    ///
    /// The padded input is staged in `arena` when one is given.
    pub(crate) fn transform(
        &self,
        fourier: &Fourier<'_>,
        arena: Option<&BumpArena>,
    ) -> Result<PolValues> {
        if self.width != self.m {
            return Err(FftError::fault("transform of an inverse-transformed polynomial"));
        }
        let (k, n) = (fourier.k, fourier.n);
        if k != self.k || n < self.m {
            return Err(FftError::fault("transform shape does not match polynomial"));
        }
        let w = n + 1;
        let total = w << k;
        let pools = fourier.pools;

        let mut values = pools.fermat_slices().acquire(total);
        let result = match arena {
            Some(arena) => {
                let mut input = arena.alloc_words(total);
                self.stage(&mut input, w);
                fourier.run(&mut values, &input, Direction::Forward)
            }
            None => {
                let mut input = pools.fermat_slices().acquire(total);
                self.stage(&mut input, w);
                let r = fourier.run(&mut values, &input, Direction::Forward);
                pools.fermat_slices().release(input);
                r
            }
        };
        if let Err(e) = result {
            pools.fermat_slices().release(values);
            return Err(e);
        }
        Ok(PolValues { k, n, values })
    }

    fn stage(&self, input: &mut [u64], w: usize) {
        for (i, chunk) in self.coeffs.chunks_exact(self.m).enumerate() {
            input[i * w..i * w + self.m].copy_from_slice(chunk);
        }
    }

    /// Evaluate at x = 2^(64·m) with carry propagation; the result is trimmed.
    #[must_use]
    pub fn reassemble(&self) -> Vec<u64> {
        let mut out = vec![0u64; self.count * self.m + self.width + 1];
        for (i, coeff) in self.coeffs.chunks_exact(self.width).enumerate() {
            let at = i * self.m;
            let carry = add_assign_vv(&mut out[at..at + self.width], coeff);
            add_scalar(&mut out[at + self.width..], carry);
        }
        out.truncate(trimmed_len(&out));
        out
    }

    /// Return the coefficient buffer to `pools`.
    pub fn release(self, pools: &MemoryPools) {
        pools.coeff_slices().release(self.coeffs);
    }
}

/// Point-value form: `2^k` Fermat elements of `n + 1` words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolValues {
    k: u32,
    n: usize,
    values: Vec<u64>,
}

impl PolValues {
    pub(crate) fn from_parts(k: u32, n: usize, values: Vec<u64>) -> Self {
        debug_assert_eq!(values.len(), (n + 1) << k);
        Self { k, n, values }
    }

    /// Transform order.
    #[must_use]
    pub fn k(&self) -> u32 {
        self.k
    }

    /// Ring width in words.
    #[must_use]
    pub fn n(&self) -> usize {
        self.n
    }

    /// Number of evaluation points.
    #[must_use]
    pub fn len(&self) -> usize {
        1 << self.k
    }

    /// Always false; a transform has at least one point.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Point `i`.
    #[must_use]
    pub fn value(&self, i: usize) -> &[u64] {
        let w = self.n + 1;
        &self.values[i * w..(i + 1) * w]
    }

    /// All points, back to back.
    #[must_use]
    pub fn as_words(&self) -> &[u64] {
        &self.values
    }

    /// Pointwise product into a fresh buffer; neither input changes.
    pub fn pointwise_mul(
        &self,
        other: &PolValues,
        ops: &FermatOps,
        pools: &MemoryPools,
        parallel: bool,
    ) -> Result<PolValues> {
        if self.k != other.k || self.n != other.n {
            return Err(FftError::fault("pointwise operands have different shapes"));
        }
        self.pointwise(Some(other), ops, pools, parallel)
    }

    /// Pointwise square into a fresh buffer.
    pub fn pointwise_sqr(
        &self,
        ops: &FermatOps,
        pools: &MemoryPools,
        parallel: bool,
    ) -> Result<PolValues> {
        self.pointwise(None, ops, pools, parallel)
    }

    fn pointwise(
        &self,
        other: Option<&PolValues>,
        ops: &FermatOps,
        pools: &MemoryPools,
        parallel: bool,
    ) -> Result<PolValues> {
        let w = self.n + 1;
        let rhs = other.unwrap_or(self);
        let mut out = pools.fermat_slices().acquire(self.values.len());
        let square = other.is_none();
        let step = |scratch: &mut Vec<u64>, ((z, x), y): ((&mut [u64], &[u64]), &[u64])| {
            if square {
                ops.sqr(z, x, scratch)
            } else {
                ops.mul(z, x, y, scratch)
            }
        };

        let result = if parallel {
            out.par_chunks_mut(w)
                .zip(self.values.par_chunks(w))
                .zip(rhs.values.par_chunks(w))
                .try_for_each_init(|| vec![0u64; mul_scratch_len(w)], step)
        } else {
            let mut scratch = pools.words().acquire(mul_scratch_len(w));
            let r = out
                .chunks_mut(w)
                .zip(self.values.chunks(w))
                .zip(rhs.values.chunks(w))
                .try_for_each(|item| step(&mut scratch, item));
            pools.words().release(scratch);
            r
        };
        match result {
            Ok(()) => Ok(PolValues {
                k: self.k,
                n: self.n,
                values: out,
            }),
            Err(e) => {
                pools.fermat_slices().release(out);
                Err(e)
            }
        }
    }

    /// Inverse transform back to coefficients of stride `m`.
    pub(crate) fn inverse(&self, m: usize, fourier: &Fourier<'_>) -> Result<Poly> {
        if fourier.k != self.k || fourier.n != self.n {
            return Err(FftError::fault("inverse shape does not match point values"));
        }
        let w = self.n + 1;
        let mut coeffs = fourier.pools.coeff_slices().acquire(self.values.len());
        if let Err(e) = fourier.inverse(&mut coeffs, &self.values) {
            fourier.pools.coeff_slices().release(coeffs);
            return Err(e);
        }
        Ok(Poly {
            k: self.k,
            m,
            width: w,
            count: 1 << self.k,
            coeffs,
        })
    }

    /// Return the value buffer to `pools`.
    pub fn release(self, pools: &MemoryPools) {
        pools.fermat_slices().release(self.values);
    }
}
