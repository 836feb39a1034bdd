//! Runtime-selected vector kernels.
//!
//! The hot loops of ring arithmetic go through a table of function
//! pointers chosen once per [`crate::FftContext`]. The portable table is
//! always available and serves as the reference in tests; the unrolled table
//! processes four words per iteration and is picked when the CPU advertises
//! a wide carry chain.

use std::fmt;

use crate::arith::{self, add_with_carry, mul_wide, sub_with_borrow};

type BinaryOp = fn(&mut [u64], &[u64], &[u64]) -> u64;
type AssignOp = fn(&mut [u64], &[u64]) -> u64;
type MulAddOp = fn(&mut [u64], &[u64], u64) -> u64;

/// Function-pointer table for the word-vector hot paths.
#[derive(Clone, Copy)]
pub struct Kernels {
    name: &'static str,
    /// z = x + y, returns carry.
    pub add_vv: BinaryOp,
    /// z = x - y, returns borrow.
    pub sub_vv: BinaryOp,
    /// z += y, returns carry.
    pub add_assign_vv: AssignOp,
    /// z -= y, returns borrow.
    pub sub_assign_vv: AssignOp,
    /// z += x * w, returns the high word.
    pub mul_add_vww: MulAddOp,
}

impl Kernels {
    /// Reference implementation, valid on every target.
    #[must_use]
    pub fn portable() -> Self {
        Self {
            name: "portable",
            add_vv: arith::add_vv,
            sub_vv: arith::sub_vv,
            add_assign_vv: arith::add_assign_vv,
            sub_assign_vv: arith::sub_assign_vv,
            mul_add_vww: arith::mul_add_vww,
        }
    }

    /// Four-way unrolled loops.
    #[must_use]
    pub fn unrolled() -> Self {
        Self {
            name: "unrolled-4",
            add_vv: add_vv_unrolled,
            sub_vv: sub_vv_unrolled,
            add_assign_vv: add_assign_vv_unrolled,
            sub_assign_vv: sub_assign_vv_unrolled,
            mul_add_vww: mul_add_vww_unrolled,
        }
    }

    /// Probe the running CPU and pick the best table.
    #[must_use]
    pub fn detect() -> Self {
        if has_wide_carry_chain() {
            Self::unrolled()
        } else {
            Self::portable()
        }
    }

    /// Short identifier of the selected table.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Schoolbook product through this table.
    pub fn basic_mul(&self, z: &mut [u64], x: &[u64], y: &[u64]) {
        arith::basic_mul_with(z, x, y, self.mul_add_vww);
    }

    /// Schoolbook square through this table.
    pub fn basic_sqr(&self, z: &mut [u64], x: &[u64]) {
        arith::basic_sqr_with(z, x, self.mul_add_vww);
    }
}

impl fmt::Debug for Kernels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernels").field("name", &self.name).finish()
    }
}

impl Default for Kernels {
    fn default() -> Self {
        Self::detect()
    }
}

#[cfg(target_arch = "x86_64")]
fn has_wide_carry_chain() -> bool {
    std::is_x86_feature_detected!("adx") && std::is_x86_feature_detected!("bmi2")
}

#[cfg(target_arch = "aarch64")]
fn has_wide_carry_chain() -> bool {
    true
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
fn has_wide_carry_chain() -> bool {
    false
}

fn add_vv_unrolled(z: &mut [u64], x: &[u64], y: &[u64]) -> u64 {
    debug_assert!(z.len() == x.len() && x.len() == y.len());
    let mut carry = 0;
    let mut zc = z.chunks_exact_mut(4);
    let mut xc = x.chunks_exact(4);
    let mut yc = y.chunks_exact(4);
    for ((z4, x4), y4) in (&mut zc).zip(&mut xc).zip(&mut yc) {
        let (s0, c0) = add_with_carry(x4[0], y4[0], carry);
        let (s1, c1) = add_with_carry(x4[1], y4[1], c0);
        let (s2, c2) = add_with_carry(x4[2], y4[2], c1);
        let (s3, c3) = add_with_carry(x4[3], y4[3], c2);
        z4.copy_from_slice(&[s0, s1, s2, s3]);
        carry = c3;
    }
    arith::add_vv_carry(zc.into_remainder(), xc.remainder(), yc.remainder(), carry)
}

fn sub_vv_unrolled(z: &mut [u64], x: &[u64], y: &[u64]) -> u64 {
    debug_assert!(z.len() == x.len() && x.len() == y.len());
    let mut borrow = 0;
    let mut zc = z.chunks_exact_mut(4);
    let mut xc = x.chunks_exact(4);
    let mut yc = y.chunks_exact(4);
    for ((z4, x4), y4) in (&mut zc).zip(&mut xc).zip(&mut yc) {
        let (d0, b0) = sub_with_borrow(x4[0], y4[0], borrow);
        let (d1, b1) = sub_with_borrow(x4[1], y4[1], b0);
        let (d2, b2) = sub_with_borrow(x4[2], y4[2], b1);
        let (d3, b3) = sub_with_borrow(x4[3], y4[3], b2);
        z4.copy_from_slice(&[d0, d1, d2, d3]);
        borrow = b3;
    }
    arith::sub_vv_borrow(zc.into_remainder(), xc.remainder(), yc.remainder(), borrow)
}

fn add_assign_vv_unrolled(z: &mut [u64], y: &[u64]) -> u64 {
    debug_assert_eq!(z.len(), y.len());
    let mut carry = 0;
    let mut zc = z.chunks_exact_mut(4);
    let mut yc = y.chunks_exact(4);
    for (z4, y4) in (&mut zc).zip(&mut yc) {
        let (s0, c0) = add_with_carry(z4[0], y4[0], carry);
        let (s1, c1) = add_with_carry(z4[1], y4[1], c0);
        let (s2, c2) = add_with_carry(z4[2], y4[2], c1);
        let (s3, c3) = add_with_carry(z4[3], y4[3], c2);
        z4.copy_from_slice(&[s0, s1, s2, s3]);
        carry = c3;
    }
    arith::add_assign_vv_carry(zc.into_remainder(), yc.remainder(), carry)
}

fn sub_assign_vv_unrolled(z: &mut [u64], y: &[u64]) -> u64 {
    debug_assert_eq!(z.len(), y.len());
    let mut borrow = 0;
    let mut zc = z.chunks_exact_mut(4);
    let mut yc = y.chunks_exact(4);
    for (z4, y4) in (&mut zc).zip(&mut yc) {
        let (d0, b0) = sub_with_borrow(z4[0], y4[0], borrow);
        let (d1, b1) = sub_with_borrow(z4[1], y4[1], b0);
        let (d2, b2) = sub_with_borrow(z4[2], y4[2], b1);
        let (d3, b3) = sub_with_borrow(z4[3], y4[3], b2);
        z4.copy_from_slice(&[d0, d1, d2, d3]);
        borrow = b3;
    }
    arith::sub_assign_vv_borrow(zc.into_remainder(), yc.remainder(), borrow)
}

#[inline]
fn mul_add_step(z: u64, x: u64, w: u64, carry: u64) -> (u64, u64) {
    let (lo, hi) = mul_wide(x, w);
    let (s1, c1) = add_with_carry(z, lo, 0);
    let (s2, c2) = add_with_carry(s1, carry, 0);
    (s2, hi + c1 + c2)
}

fn mul_add_vww_unrolled(z: &mut [u64], x: &[u64], w: u64) -> u64 {
    debug_assert_eq!(z.len(), x.len());
    let mut carry = 0;
    let mut zc = z.chunks_exact_mut(4);
    let mut xc = x.chunks_exact(4);
    for (z4, x4) in (&mut zc).zip(&mut xc) {
        let (s0, k0) = mul_add_step(z4[0], x4[0], w, carry);
        let (s1, k1) = mul_add_step(z4[1], x4[1], w, k0);
        let (s2, k2) = mul_add_step(z4[2], x4[2], w, k1);
        let (s3, k3) = mul_add_step(z4[3], x4[3], w, k2);
        z4.copy_from_slice(&[s0, s1, s2, s3]);
        carry = k3;
    }
    for (zi, &xi) in zc.into_remainder().iter_mut().zip(xc.remainder()) {
        let (s, k) = mul_add_step(*zi, xi, w, carry);
        *zi = s;
        carry = k;
    }
    carry
}
