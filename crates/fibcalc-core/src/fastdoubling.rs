//! Optimized Fast Doubling algorithm for Fibonacci computation.
//!
//! Uses the doubling identities:
//!   F(2k)   = F(k) · (2·F(k+1) − F(k))
//!   F(2k+1) = F(k+1)² + F(k)²
//!
//! Scratch integers live in a pooled [`CalculationState`]; the adaptive
//! strategy picks schoolbook, intermediate or FFT products per step.

use std::sync::Arc;

use num_bigint::BigUint;
use num_traits::{One, Zero};
use tracing::debug;

use crate::calculator::{CoreCalculator, FibError};
use crate::context::CalcContext;
use crate::doubling_framework::{calculate_with_executor, estimated_bits};
use crate::observer::{ProgressObserver, StepReporter};
use crate::options::Options;
use crate::progress::CancellationToken;
use crate::strategy::AdaptiveStrategy;

/// Scratch integers of one doubling calculation, recycled through a pool.
#[derive(Debug)]
pub struct CalculationState {
    /// Current F(k).
    pub fk: BigUint,
    /// Current F(k+1).
    pub fk1: BigUint,
    /// 2·F(k+1) − F(k).
    pub t1: BigUint,
    /// F(k+1)², then F(2k+1).
    pub t2: BigUint,
    /// F(k)².
    pub t3: BigUint,
}

impl CalculationState {
    /// Create a new calculation state initialized for F(0)=0, F(1)=1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            fk: BigUint::ZERO,
            fk1: BigUint::from(1u32),
            t1: BigUint::ZERO,
            t2: BigUint::ZERO,
            t3: BigUint::ZERO,
        }
    }

    /// Reset state for reuse.
    pub fn reset(&mut self) {
        self.fk.set_zero();
        self.fk1.set_one();
        self.t1.set_zero();
        self.t2.set_zero();
        self.t3.set_zero();
    }

    /// Move F(k) out, leaving an empty integer in its place.
    pub fn take_result(&mut self) -> BigUint {
        std::mem::replace(&mut self.fk, BigUint::ZERO)
    }

    /// Bit length of the largest integer held.
    #[must_use]
    pub fn max_bits(&self) -> u64 {
        [&self.fk, &self.fk1, &self.t1, &self.t2, &self.t3]
            .iter()
            .map(|x| x.bits())
            .max()
            .unwrap_or(0)
    }
}

impl Default for CalculationState {
    fn default() -> Self {
        Self::new()
    }
}

/// Optimized Fast Doubling calculator.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use fibcalc_core::calculator::CoreCalculator;
/// use fibcalc_core::context::CalcContext;
/// use fibcalc_core::fastdoubling::OptimizedFastDoubling;
/// use fibcalc_core::observers::NoOpObserver;
/// use fibcalc_core::options::Options;
/// use fibcalc_core::progress::CancellationToken;
///
/// let calc = OptimizedFastDoubling::new(Arc::new(CalcContext::default()));
/// let cancel = CancellationToken::new();
/// let observer = NoOpObserver::new();
/// let result = calc.calculate_core(&cancel, &observer, 0, 100, &Options::default()).unwrap();
/// assert_eq!(result.to_string(), "354224848179261915075");
/// ```
pub struct OptimizedFastDoubling {
    ctx: Arc<CalcContext>,
}

impl OptimizedFastDoubling {
    /// Create a calculator drawing on `ctx`.
    #[must_use]
    pub fn new(ctx: Arc<CalcContext>) -> Self {
        Self { ctx }
    }
}

impl CoreCalculator for OptimizedFastDoubling {
    fn calculate_core(
        &self,
        cancel: &CancellationToken,
        observer: &dyn ProgressObserver,
        calc_index: usize,
        n: u64,
        opts: &Options,
    ) -> Result<BigUint, FibError> {
        if opts.fft_threshold > 0 && estimated_bits(n) > opts.fft_threshold {
            let warmed = self.ctx.fft().ensure_pools_warmed(n);
            debug!(n, warmed, "FFT pools ready");
        }
        let strategy = AdaptiveStrategy::new(Arc::clone(&self.ctx), opts);
        let steps = 64 - n.leading_zeros();
        let reporter = StepReporter::new(observer, calc_index, self.name(), steps);
        calculate_with_executor(&self.ctx, &strategy, cancel, &reporter, n, opts)
    }

    fn name(&self) -> &'static str {
        "FastDoubling"
    }
}
