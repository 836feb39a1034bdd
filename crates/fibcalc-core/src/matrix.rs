//! Matrix Exponentiation algorithm for Fibonacci computation.
//!
//! Computes F(n) via Q^n where Q = [[1,1],[1,0]], using binary
//! exponentiation (square-and-multiply). Squares of the symmetric powers
//! of Q take 4 element products; general products switch to Strassen's
//! 7-product scheme above the Strassen threshold.

use std::sync::Arc;

use num_bigint::BigUint;

use crate::calculator::{CoreCalculator, FibError};
use crate::context::CalcContext;
use crate::matrix_framework::calculate_with_matrix;
use crate::observer::{ProgressObserver, StepReporter};
use crate::options::Options;
use crate::progress::CancellationToken;
use crate::strategy::AdaptiveStrategy;

/// Matrix Exponentiation calculator.
pub struct MatrixExponentiation {
    ctx: Arc<CalcContext>,
}

impl MatrixExponentiation {
    /// Create a calculator drawing on `ctx`.
    #[must_use]
    pub fn new(ctx: Arc<CalcContext>) -> Self {
        Self { ctx }
    }
}

impl CoreCalculator for MatrixExponentiation {
    fn calculate_core(
        &self,
        cancel: &CancellationToken,
        observer: &dyn ProgressObserver,
        calc_index: usize,
        n: u64,
        opts: &Options,
    ) -> Result<BigUint, FibError> {
        let strategy = AdaptiveStrategy::new(Arc::clone(&self.ctx), opts);
        let steps = 64 - n.leading_zeros();
        let reporter = StepReporter::new(observer, calc_index, self.name(), steps);
        calculate_with_matrix(&self.ctx, &strategy, cancel, &reporter, n, opts)
    }

    fn name(&self) -> &'static str {
        "MatrixExponentiation"
    }
}
