//! Matrix multiplication operations including Strassen.
//!
//! Every element product goes through a [`Multiplier`], so the matrix
//! algorithm shares tier routing with fast doubling.

use num_bigint::{BigInt, BigUint, Sign};

use crate::calculator::FibError;
use crate::common::MulTask;
use crate::context::CalcContext;
use crate::matrix_types::Matrix;
use crate::progress::CancellationToken;
use crate::strategy::{parallel_enabled, run_step, Multiplier};

/// Matrix arithmetic bound to a multiplier and its thresholds.
pub struct MatrixOps<'a> {
    ctx: &'a CalcContext,
    multiplier: &'a dyn Multiplier,
    strassen_threshold: usize,
    parallel_threshold: usize,
    cancel: &'a CancellationToken,
}

impl<'a> MatrixOps<'a> {
    /// Bind `multiplier` to the given thresholds. A threshold of 0 disables
    /// Strassen or parallel products.
    #[must_use]
    pub fn new(
        ctx: &'a CalcContext,
        multiplier: &'a dyn Multiplier,
        strassen_threshold: usize,
        parallel_threshold: usize,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            ctx,
            multiplier,
            strassen_threshold,
            parallel_threshold,
            cancel,
        }
    }

    /// Whether a product of matrices with elements of `bits` bits uses
    /// Strassen's scheme.
    #[must_use]
    pub fn uses_strassen(&self, bits: u64) -> bool {
        self.strassen_threshold > 0 && bits > self.strassen_threshold as u64
    }

    fn run<const N: usize>(&self, tasks: &[MulTask<'_>; N]) -> Result<[BigUint; N], FibError> {
        let bits = tasks.iter().map(|t| t.max_bits()).max().unwrap_or(0);
        let parallel = parallel_enabled(self.parallel_threshold, bits);
        let products = run_step(self.ctx, self.multiplier, tasks, parallel, self.cancel)?;
        products.try_into().map_err(|v: Vec<BigUint>| {
            FibError::InternalFault(format!("expected {N} products, got {}", v.len()))
        })
    }

    /// m², with 4 products when m is symmetric.
    pub fn square(&self, m: &Matrix) -> Result<Matrix, FibError> {
        if m.is_symmetric() {
            self.square_symmetric(m)
        } else {
            self.multiply(m, m)
        }
    }

    /// Square a symmetric matrix [[a,b],[b,d]]:
    ///
    /// ```text
    /// [[a² + b², b(a + d)], [b(a + d), b² + d²]]
    /// ```
    pub fn square_symmetric(&self, m: &Matrix) -> Result<Matrix, FibError> {
        let trace = &m.a + &m.d;
        let tasks = [
            MulTask::Square(&m.a),
            MulTask::Square(&m.b),
            MulTask::Square(&m.d),
            MulTask::Multiply(&m.b, &trace),
        ];
        let [a2, b2, d2, off] = self.run(&tasks)?;
        Ok(Matrix {
            a: &a2 + &b2,
            b: off.clone(),
            c: off,
            d: b2 + d2,
        })
    }

    /// x · y, switching to Strassen above the threshold.
    pub fn multiply(&self, x: &Matrix, y: &Matrix) -> Result<Matrix, FibError> {
        if self.uses_strassen(x.max_bits().max(y.max_bits())) {
            self.multiply_strassen(x, y)
        } else {
            self.multiply_standard(x, y)
        }
    }

    /// Row-by-column product with 8 element multiplications.
    pub fn multiply_standard(&self, x: &Matrix, y: &Matrix) -> Result<Matrix, FibError> {
        let tasks = [
            MulTask::Multiply(&x.a, &y.a),
            MulTask::Multiply(&x.b, &y.c),
            MulTask::Multiply(&x.a, &y.b),
            MulTask::Multiply(&x.b, &y.d),
            MulTask::Multiply(&x.c, &y.a),
            MulTask::Multiply(&x.d, &y.c),
            MulTask::Multiply(&x.c, &y.b),
            MulTask::Multiply(&x.d, &y.d),
        ];
        let [p0, p1, p2, p3, p4, p5, p6, p7] = self.run(&tasks)?;
        Ok(Matrix {
            a: p0 + p1,
            b: p2 + p3,
            c: p4 + p5,
            d: p6 + p7,
        })
    }

    /// Strassen's 7-multiplication product.
    pub fn multiply_strassen(&self, x: &Matrix, y: &Matrix) -> Result<Matrix, FibError> {
        let signed = |v: &BigUint| BigInt::from(v.clone());
        let (a11, a12, a21, a22) = (signed(&x.a), signed(&x.b), signed(&x.c), signed(&x.d));
        let (b11, b12, b21, b22) = (signed(&y.a), signed(&y.b), signed(&y.c), signed(&y.d));

        let factors = [
            (&a11 + &a22, &b11 + &b22),
            (&a21 + &a22, b11.clone()),
            (a11.clone(), &b12 - &b22),
            (a22.clone(), &b21 - &b11),
            (&a11 + &a12, b22.clone()),
            (&a21 - &a11, &b11 + &b12),
            (&a12 - &a22, &b21 + &b22),
        ];
        let tasks: [MulTask<'_>; 7] = std::array::from_fn(|i| {
            MulTask::Multiply(factors[i].0.magnitude(), factors[i].1.magnitude())
        });
        let magnitudes = self.run(&tasks)?;

        let signed_products: Vec<BigInt> = magnitudes
            .into_iter()
            .zip(&factors)
            .map(|(mag, (l, r))| BigInt::from_biguint(l.sign() * r.sign(), mag))
            .collect();
        let [m1, m2, m3, m4, m5, m6, m7]: [BigInt; 7] =
            signed_products.try_into().map_err(|_: Vec<BigInt>| {
                FibError::InternalFault("Strassen step lost a product".into())
            })?;

        Ok(Matrix {
            a: unsigned(&m1 + &m4 - &m5 + m7)?,
            b: unsigned(&m3 + &m5)?,
            c: unsigned(&m2 + &m4)?,
            d: unsigned(m1 - m2 + m3 + m6)?,
        })
    }
}

fn unsigned(v: BigInt) -> Result<BigUint, FibError> {
    match v.sign() {
        Sign::Minus => Err(FibError::InternalFault(
            "negative element in matrix product".into(),
        )),
        _ => Ok(v.into_parts().1),
    }
}
