//! FFT-based Fibonacci calculator.
//!
//! Runs the fast doubling loop with every product sent through the Fermat
//! FFT, whatever the operand size.

use std::sync::Arc;

use num_bigint::BigUint;
use tracing::debug;

use crate::calculator::{CoreCalculator, FibError};
use crate::context::CalcContext;
use crate::doubling_framework::calculate_with_executor;
use crate::observer::{ProgressObserver, StepReporter};
use crate::options::Options;
use crate::progress::CancellationToken;
use crate::strategy::FftOnlyStrategy;

/// FFT-based Fibonacci calculator.
pub struct FftBasedCalculator {
    ctx: Arc<CalcContext>,
}

impl FftBasedCalculator {
    /// Create a calculator drawing on `ctx`.
    #[must_use]
    pub fn new(ctx: Arc<CalcContext>) -> Self {
        Self { ctx }
    }
}

impl CoreCalculator for FftBasedCalculator {
    fn calculate_core(
        &self,
        cancel: &CancellationToken,
        observer: &dyn ProgressObserver,
        calc_index: usize,
        n: u64,
        opts: &Options,
    ) -> Result<BigUint, FibError> {
        let warmed = self.ctx.fft().ensure_pools_warmed(n);
        debug!(n, warmed, "FFT pools ready");
        let strategy = FftOnlyStrategy::new(Arc::clone(&self.ctx));
        let steps = 64 - n.leading_zeros();
        let reporter = StepReporter::new(observer, calc_index, self.name(), steps);
        calculate_with_executor(&self.ctx, &strategy, cancel, &reporter, n, opts)
    }

    fn name(&self) -> &'static str {
        "FFTBased"
    }
}
