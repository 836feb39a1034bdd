//! Generic doubling framework for Fast Doubling algorithms.
//!
//! The loop walks the index from its most significant bit down:
//!
//! ```text
//! F(2k)   = F(k) · (2·F(k+1) − F(k))
//! F(2k+1) = F(k+1)² + F(k)²
//! ```
//!
//! followed by one addition when the current bit is set.

use std::time::Instant;

use num_bigint::BigUint;

use crate::calculator::FibError;
use crate::constants::BITS_PER_INDEX;
use crate::context::CalcContext;
use crate::dynamic_threshold::DynamicThresholdManager;
use crate::fastdoubling::CalculationState;
use crate::observer::StepReporter;
use crate::options::{DynamicOptions, Options};
use crate::progress::CancellationToken;
use crate::strategy::{DoublingStepExecutor, TunableThresholds};
use crate::threshold_types::{DynamicThresholdConfig, IterationMetric};

/// Drive `executor` through the bits of `n`, leaving F(n) in `state.fk`
/// and F(n+1) in `state.fk1`.
///
/// `state` must start at (F(0), F(1)).
pub fn execute_doubling_loop(
    n: u64,
    executor: &dyn DoublingStepExecutor,
    state: &mut CalculationState,
    cancel: &CancellationToken,
    reporter: &StepReporter<'_>,
    dynamic: &DynamicOptions,
) -> Result<(), FibError> {
    let num_bits = 64 - n.leading_zeros();
    let mut tuner = dynamic
        .enabled
        .then(|| executor.tunable())
        .flatten()
        .map(|t| Tuner::new(t, dynamic.check_interval));

    for (done, i) in (0..num_bits).rev().enumerate() {
        cancel.check_cancelled()?;
        let started = tuner.as_ref().map(|_| Instant::now());
        let operand_bits = bit_len(&state.fk);

        // t1 = 2·F(k+1) − F(k)
        state.t1.clone_from(&state.fk1);
        state.t1 <<= 1u32;
        state.t1 -= &state.fk;

        let (fk_t, fk1_sq, fk_sq) =
            executor.doubling_products(&state.fk, &state.fk1, &state.t1, cancel)?;
        state.t2 = fk1_sq;
        state.t3 = fk_sq;
        state.t2 += &state.t3;
        state.fk = fk_t;
        std::mem::swap(&mut state.fk1, &mut state.t2);

        if (n >> i) & 1 == 1 {
            std::mem::swap(&mut state.fk, &mut state.fk1);
            state.fk1 += &state.fk;
        }

        #[allow(clippy::cast_possible_truncation)]
        let done = done as u32 + 1;
        if let (Some(tuner), Some(started)) = (tuner.as_mut(), started) {
            tuner.observe(operand_bits, started, done);
        }
        reporter.step(done);
    }
    Ok(())
}

/// Run a whole doubling calculation of F(n) on pooled state from `ctx`.
///
/// On success the state goes back to the pool with an empty result slot; on
/// failure it is dropped.
pub fn calculate_with_executor(
    ctx: &CalcContext,
    executor: &dyn DoublingStepExecutor,
    cancel: &CancellationToken,
    reporter: &StepReporter<'_>,
    n: u64,
    opts: &Options,
) -> Result<BigUint, FibError> {
    ctx.apply_cache_options(opts);
    let mut state = ctx.acquire_state();
    execute_doubling_loop(n, executor, &mut state, cancel, reporter, &opts.dynamic)?;
    let result = state.take_result();
    ctx.release_state(state);
    Ok(result)
}

/// Approximate bit length of F(n).
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn estimated_bits(n: u64) -> usize {
    (n as f64 * BITS_PER_INDEX) as usize
}

#[allow(clippy::cast_possible_truncation)]
fn bit_len(x: &BigUint) -> usize {
    x.bits() as usize
}

/// Feeds iteration timings to a threshold manager and pushes its decisions
/// back into the strategy.
struct Tuner<'a> {
    thresholds: &'a TunableThresholds,
    manager: DynamicThresholdManager,
    interval: u32,
}

impl<'a> Tuner<'a> {
    fn new(thresholds: &'a TunableThresholds, interval: usize) -> Self {
        let manager = DynamicThresholdManager::new(
            DynamicThresholdConfig::default(),
            thresholds.parallel_threshold(),
            thresholds.fft_threshold(),
        );
        Self {
            thresholds,
            manager,
            interval: u32::try_from(interval.max(1)).unwrap_or(u32::MAX),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn observe(&mut self, bits: usize, started: Instant, done: u32) {
        let fft = self.thresholds.fft_threshold();
        let used_fft = fft > 0 && bits > fft;
        let used_parallel = !used_fft && self.thresholds.wants_parallel(bits);
        self.manager.record(IterationMetric::new(
            bits,
            started.elapsed().as_nanos() as u64,
            used_fft,
            used_parallel,
        ));
        if done % self.interval == 0 && self.manager.adjust() {
            self.thresholds
                .set(self.manager.fft_threshold(), self.manager.parallel_threshold());
        }
    }
}
