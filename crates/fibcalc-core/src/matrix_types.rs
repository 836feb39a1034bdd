//! Matrix types for the Matrix Exponentiation algorithm.

use num_bigint::BigUint;

/// 2x2 matrix of `BigUint` values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix {
    /// Row 0, column 0.
    pub a: BigUint,
    /// Row 0, column 1.
    pub b: BigUint,
    /// Row 1, column 0.
    pub c: BigUint,
    /// Row 1, column 1.
    pub d: BigUint,
}

impl Matrix {
    /// Create the identity matrix.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            a: BigUint::from(1u32),
            b: BigUint::ZERO,
            c: BigUint::ZERO,
            d: BigUint::from(1u32),
        }
    }

    /// Create the Fibonacci Q matrix [[1,1],[1,0]].
    #[must_use]
    pub fn fibonacci_q() -> Self {
        Self {
            a: BigUint::from(1u32),
            b: BigUint::from(1u32),
            c: BigUint::from(1u32),
            d: BigUint::ZERO,
        }
    }

    /// Check if this is the identity matrix.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    /// Whether b == c. Every power of Q is symmetric.
    #[must_use]
    pub fn is_symmetric(&self) -> bool {
        self.b == self.c
    }

    /// Bit length of the largest element.
    #[must_use]
    pub fn max_bits(&self) -> u64 {
        self.a
            .bits()
            .max(self.b.bits())
            .max(self.c.bits())
            .max(self.d.bits())
    }
}

/// State for matrix exponentiation: the running product and the current
/// power of Q.
#[derive(Debug)]
pub struct MatrixState {
    /// Product of the powers consumed so far.
    pub result: Matrix,
    /// Q^(2^i) for the bit being processed.
    pub base: Matrix,
}

impl MatrixState {
    /// Create a new matrix state for computing Q^n.
    #[must_use]
    pub fn new() -> Self {
        Self {
            result: Matrix::identity(),
            base: Matrix::fibonacci_q(),
        }
    }

    /// Reset state for reuse.
    pub fn reset(&mut self) {
        self.result = Matrix::identity();
        self.base = Matrix::fibonacci_q();
    }

    /// Move F(n) = result[0][1] out, leaving an empty integer in its place.
    pub fn take_result(&mut self) -> BigUint {
        std::mem::replace(&mut self.result.b, BigUint::ZERO)
    }

    /// Bit length of the largest element held.
    #[must_use]
    pub fn max_bits(&self) -> u64 {
        self.result.max_bits().max(self.base.max_bits())
    }
}

impl Default for MatrixState {
    fn default() -> Self {
        Self::new()
    }
}
