//! Portable word-vector arithmetic.
//!
//! Little-endian `u64` digit vectors. These are the reference
//! implementations; [`crate::kernels`] may swap in faster variants of the
//! hot loops at runtime.

use std::cmp::Ordering;

/// Add with carry: a + b + carry -> (sum, `new_carry`)
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn add_with_carry(a: u64, b: u64, carry: u64) -> (u64, u64) {
    let sum = u128::from(a) + u128::from(b) + u128::from(carry);
    (sum as u64, (sum >> 64) as u64)
}

/// Subtract with borrow: a - b - borrow -> (diff, `new_borrow`)
#[inline]
#[must_use]
pub fn sub_with_borrow(a: u64, b: u64, borrow: u64) -> (u64, u64) {
    let (d1, b1) = a.overflowing_sub(b);
    let (d2, b2) = d1.overflowing_sub(borrow);
    (d2, u64::from(b1 | b2))
}

/// Multiply: a * b -> (low, high)
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn mul_wide(a: u64, b: u64) -> (u64, u64) {
    let prod = u128::from(a) * u128::from(b);
    (prod as u64, (prod >> 64) as u64)
}

/// Add a scalar into a digit vector, returning the carry out.
pub fn add_scalar(data: &mut [u64], scalar: u64) -> u64 {
    let mut carry = scalar;
    for limb in data.iter_mut() {
        if carry == 0 {
            break;
        }
        let (sum, c) = limb.overflowing_add(carry);
        *limb = sum;
        carry = u64::from(c);
    }
    carry
}

/// Subtract a scalar from a digit vector, returning the borrow out.
pub fn sub_scalar(data: &mut [u64], scalar: u64) -> u64 {
    let mut borrow = scalar;
    for limb in data.iter_mut() {
        if borrow == 0 {
            break;
        }
        let (diff, b) = limb.overflowing_sub(borrow);
        *limb = diff;
        borrow = u64::from(b);
    }
    borrow
}

/// z = x + y + `carry_in` over equal-length vectors; returns the carry out.
pub fn add_vv_carry(z: &mut [u64], x: &[u64], y: &[u64], carry_in: u64) -> u64 {
    debug_assert!(z.len() == x.len() && x.len() == y.len());
    let mut carry = carry_in;
    for ((zi, &xi), &yi) in z.iter_mut().zip(x).zip(y) {
        let (s, c) = add_with_carry(xi, yi, carry);
        *zi = s;
        carry = c;
    }
    carry
}

/// z = x - y - `borrow_in` over equal-length vectors; returns the borrow out.
pub fn sub_vv_borrow(z: &mut [u64], x: &[u64], y: &[u64], borrow_in: u64) -> u64 {
    debug_assert!(z.len() == x.len() && x.len() == y.len());
    let mut borrow = borrow_in;
    for ((zi, &xi), &yi) in z.iter_mut().zip(x).zip(y) {
        let (d, b) = sub_with_borrow(xi, yi, borrow);
        *zi = d;
        borrow = b;
    }
    borrow
}

/// z += y + `carry_in` over equal-length vectors; returns the carry out.
pub fn add_assign_vv_carry(z: &mut [u64], y: &[u64], carry_in: u64) -> u64 {
    debug_assert_eq!(z.len(), y.len());
    let mut carry = carry_in;
    for (zi, &yi) in z.iter_mut().zip(y) {
        let (s, c) = add_with_carry(*zi, yi, carry);
        *zi = s;
        carry = c;
    }
    carry
}

/// z -= y + `borrow_in` over equal-length vectors; returns the borrow out.
pub fn sub_assign_vv_borrow(z: &mut [u64], y: &[u64], borrow_in: u64) -> u64 {
    debug_assert_eq!(z.len(), y.len());
    let mut borrow = borrow_in;
    for (zi, &yi) in z.iter_mut().zip(y) {
        let (d, b) = sub_with_borrow(*zi, yi, borrow);
        *zi = d;
        borrow = b;
    }
    borrow
}

/// z = x + y; returns the carry out.
pub fn add_vv(z: &mut [u64], x: &[u64], y: &[u64]) -> u64 {
    add_vv_carry(z, x, y, 0)
}

/// z = x - y; returns the borrow out.
pub fn sub_vv(z: &mut [u64], x: &[u64], y: &[u64]) -> u64 {
    sub_vv_borrow(z, x, y, 0)
}

/// z += y; returns the carry out.
pub fn add_assign_vv(z: &mut [u64], y: &[u64]) -> u64 {
    add_assign_vv_carry(z, y, 0)
}

/// z -= y; returns the borrow out.
pub fn sub_assign_vv(z: &mut [u64], y: &[u64]) -> u64 {
    sub_assign_vv_borrow(z, y, 0)
}

/// z += x * y over `z.len() == x.len()`; returns the high carry word.
pub fn mul_add_vww(z: &mut [u64], x: &[u64], y: u64) -> u64 {
    debug_assert_eq!(z.len(), x.len());
    let mut carry = 0u64;
    for (zi, &xi) in z.iter_mut().zip(x) {
        let (lo, hi) = mul_wide(xi, y);
        let (s1, c1) = add_with_carry(*zi, lo, 0);
        let (s2, c2) = add_with_carry(s1, carry, 0);
        *zi = s2;
        carry = hi + c1 + c2;
    }
    carry
}

/// Shift left by `s < 64` bits in place; returns the bits shifted out.
pub fn shl_assign(z: &mut [u64], s: u32) -> u64 {
    debug_assert!(s < 64);
    if s == 0 {
        return 0;
    }
    let mut carry = 0u64;
    for limb in z.iter_mut() {
        let next = *limb >> (64 - s);
        *limb = (*limb << s) | carry;
        carry = next;
    }
    carry
}

/// Compare two digit vectors by value (ignores trailing zero words).
#[must_use]
pub fn cmp(x: &[u64], y: &[u64]) -> Ordering {
    let x = &x[..trimmed_len(x)];
    let y = &y[..trimmed_len(y)];
    x.len()
        .cmp(&y.len())
        .then_with(|| x.iter().rev().cmp(y.iter().rev()))
}

/// Length of `x` with trailing zero words removed.
#[must_use]
pub fn trimmed_len(x: &[u64]) -> usize {
    x.iter().rposition(|&w| w != 0).map_or(0, |i| i + 1)
}

/// Schoolbook product using `mul_add`: z = x * y, `z.len() >= x.len() + y.len()`.
pub fn basic_mul_with(
    z: &mut [u64],
    x: &[u64],
    y: &[u64],
    mul_add: fn(&mut [u64], &[u64], u64) -> u64,
) {
    debug_assert!(z.len() >= x.len() + y.len());
    z.fill(0);
    let nx = x.len();
    for (i, &yi) in y.iter().enumerate() {
        if yi != 0 {
            z[nx + i] = mul_add(&mut z[i..i + nx], x, yi);
        }
    }
}

/// Schoolbook square using `mul_add`: z = x², `z.len() >= 2 * x.len()`.
///
/// Off-diagonal products are computed once and doubled.
pub fn basic_sqr_with(z: &mut [u64], x: &[u64], mul_add: fn(&mut [u64], &[u64], u64) -> u64) {
    let n = x.len();
    debug_assert!(z.len() >= 2 * n);
    z.fill(0);
    if n == 0 {
        return;
    }
    for i in 0..n - 1 {
        if x[i] != 0 {
            z[i + n] = mul_add(&mut z[2 * i + 1..i + n], &x[i + 1..], x[i]);
        }
    }
    shl_assign(&mut z[..2 * n], 1);
    let mut carry = 0u64;
    for (i, &xi) in x.iter().enumerate() {
        let (lo, hi) = mul_wide(xi, xi);
        let (s0, c0) = add_with_carry(z[2 * i], lo, carry);
        let (s1, c1) = add_with_carry(z[2 * i + 1], hi, c0);
        z[2 * i] = s0;
        z[2 * i + 1] = s1;
        carry = c1;
    }
    debug_assert_eq!(carry, 0);
}

/// Schoolbook product with the portable kernel.
pub fn basic_mul(z: &mut [u64], x: &[u64], y: &[u64]) {
    basic_mul_with(z, x, y, mul_add_vww);
}

/// Schoolbook square with the portable kernel.
pub fn basic_sqr(z: &mut [u64], x: &[u64]) {
    basic_sqr_with(z, x, mul_add_vww);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_carry() {
        let (sum, carry) = add_with_carry(u64::MAX, 1, 0);
        assert_eq!(sum, 0);
        assert_eq!(carry, 1);
    }

    #[test]
    fn add_carry_max_plus_max_plus_carry() {
        let (sum, carry) = add_with_carry(u64::MAX, u64::MAX, 1);
        assert_eq!(sum, u64::MAX);
        assert_eq!(carry, 1);
    }

    #[test]
    fn sub_borrow() {
        let (diff, borrow) = sub_with_borrow(0, 1, 0);
        assert_eq!(diff, u64::MAX);
        assert_eq!(borrow, 1);
    }

    #[test]
    fn sub_borrow_with_borrow_in() {
        let (diff, borrow) = sub_with_borrow(0, 0, 1);
        assert_eq!(diff, u64::MAX);
        assert_eq!(borrow, 1);
        let (diff, borrow) = sub_with_borrow(1, u64::MAX, 0);
        assert_eq!(diff, 2);
        assert_eq!(borrow, 1);
    }

    #[test]
    fn sub_borrow_max_minus_max_with_borrow() {
        let (diff, borrow) = sub_with_borrow(u64::MAX, u64::MAX, 1);
        assert_eq!(diff, u64::MAX);
        assert_eq!(borrow, 1);
    }

    #[test]
    fn mul_wide_max_times_max() {
        let (low, high) = mul_wide(u64::MAX, u64::MAX);
        assert_eq!(low, 1);
        assert_eq!(high, u64::MAX - 1);
    }

    #[test]
    fn add_scalar_carry_propagates_through_all() {
        let mut data = vec![u64::MAX, u64::MAX, u64::MAX];
        let carry = add_scalar(&mut data, 1);
        assert_eq!(data, vec![0, 0, 0]);
        assert_eq!(carry, 1);
    }

    #[test]
    fn add_scalar_empty_returns_scalar() {
        let mut data: Vec<u64> = vec![];
        assert_eq!(add_scalar(&mut data, 42), 42);
    }

    #[test]
    fn sub_scalar_with_propagation() {
        let mut data = vec![0, 1, 0];
        let borrow = sub_scalar(&mut data, 1);
        assert_eq!(data, vec![u64::MAX, 0, 0]);
        assert_eq!(borrow, 0);
    }

    #[test]
    fn sub_scalar_borrow_propagates_through_all() {
        let mut data = vec![0, 0, 0];
        let borrow = sub_scalar(&mut data, 1);
        assert_eq!(data, vec![u64::MAX, u64::MAX, u64::MAX]);
        assert_eq!(borrow, 1);
    }

    #[test]
    fn add_vv_carries_out() {
        let mut z = [0u64; 2];
        let c = add_vv(&mut z, &[u64::MAX, u64::MAX], &[1, 0]);
        assert_eq!(z, [0, 0]);
        assert_eq!(c, 1);
    }

    #[test]
    fn sub_vv_borrows_out() {
        let mut z = [0u64; 2];
        let b = sub_vv(&mut z, &[0, 0], &[1, 0]);
        assert_eq!(z, [u64::MAX, u64::MAX]);
        assert_eq!(b, 1);
    }

    #[test]
    fn assign_variants_match_three_operand_forms() {
        let x = [5u64, u64::MAX, 7];
        let y = [u64::MAX, 3, 1];
        let mut z = [0u64; 3];
        let c1 = add_vv(&mut z, &x, &y);
        let mut w = x;
        let c2 = add_assign_vv(&mut w, &y);
        assert_eq!((z, c1), (w, c2));

        let b1 = sub_vv(&mut z, &x, &y);
        let mut w = x;
        let b2 = sub_assign_vv(&mut w, &y);
        assert_eq!((z, b1), (w, b2));
    }

    #[test]
    fn mul_add_accumulates() {
        let mut z = [1u64, 0];
        let c = mul_add_vww(&mut z, &[u64::MAX, u64::MAX], 2);
        // 1 + (2^128 - 1) * 2 = 2^129 - 1
        assert_eq!(z, [u64::MAX, u64::MAX]);
        assert_eq!(c, 1);
    }

    #[test]
    fn shl_assign_moves_bits_out() {
        let mut z = [1u64 << 63, 1];
        let out = shl_assign(&mut z, 1);
        assert_eq!(z, [0, 3]);
        assert_eq!(out, 0);
        let mut z = [0u64, 1u64 << 63];
        assert_eq!(shl_assign(&mut z, 4), 8);
    }

    #[test]
    fn cmp_ignores_trailing_zeros() {
        assert_eq!(cmp(&[1, 0, 0], &[1]), Ordering::Equal);
        assert_eq!(cmp(&[0, 1], &[u64::MAX]), Ordering::Greater);
        assert_eq!(cmp(&[], &[1]), Ordering::Less);
        assert_eq!(trimmed_len(&[0, 0]), 0);
    }

    #[test]
    fn basic_mul_small_values() {
        let mut z = [0u64; 4];
        basic_mul(&mut z, &[u64::MAX, 0], &[u64::MAX, 0]);
        assert_eq!(z, [1, u64::MAX - 1, 0, 0]);
    }

    #[test]
    fn basic_sqr_matches_basic_mul() {
        let mut seed = 0x9E37_79B9_7F4A_7C15u64;
        for n in 1..40 {
            let x: Vec<u64> = (0..n)
                .map(|_| {
                    seed ^= seed << 13;
                    seed ^= seed >> 7;
                    seed ^= seed << 17;
                    seed
                })
                .collect();
            let mut zm = vec![0u64; 2 * n];
            let mut zs = vec![0u64; 2 * n];
            basic_mul(&mut zm, &x, &x);
            basic_sqr(&mut zs, &x);
            assert_eq!(zm, zs, "n={n}");
        }
    }

    #[test]
    fn basic_sqr_all_ones() {
        let x = [u64::MAX; 3];
        let mut zm = [0u64; 6];
        let mut zs = [0u64; 6];
        basic_mul(&mut zm, &x, &x);
        basic_sqr(&mut zs, &x);
        assert_eq!(zm, zs);
    }
}
