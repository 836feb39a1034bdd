//! Multiplication strategy traits and implementations.
//!
//! `Multiplier` is the narrow interface for multiply/square operations.
//! `DoublingStepExecutor` extends it with the three products of a
//! fast-doubling step so that strategies can share transforms across them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use fibcalc_bigfft::NeverInterrupt;
use num_bigint::BigUint;

use crate::calculator::FibError;
use crate::common::{execute_tasks, MulTask};
use crate::context::CalcContext;
use crate::fft_wrappers::{multiply_with, select_tier, square_with, MulTier};
use crate::options::Options;
use crate::progress::CancellationToken;

/// Narrow interface for multiplication operations.
pub trait Multiplier: Send + Sync {
    /// Multiply two big unsigned integers.
    fn multiply(&self, a: &BigUint, b: &BigUint) -> Result<BigUint, FibError>;

    /// Square a big unsigned integer (may be optimized over multiply).
    fn square(&self, a: &BigUint) -> Result<BigUint, FibError> {
        self.multiply(a, a)
    }

    /// Get the name of this multiplication strategy.
    fn name(&self) -> &'static str;
}

/// Extended interface for fast-doubling steps.
pub trait DoublingStepExecutor: Multiplier {
    /// The three products of a doubling step: `(fk·t, fk1², fk²)` where
    /// `t = 2·fk1 − fk`.
    fn doubling_products(
        &self,
        fk: &BigUint,
        fk1: &BigUint,
        t: &BigUint,
        cancel: &CancellationToken,
    ) -> Result<(BigUint, BigUint, BigUint), FibError>;

    /// Given F(k) and F(k+1), compute (F(2k), F(2k+1)).
    fn execute_doubling_step(
        &self,
        fk: &BigUint,
        fk1: &BigUint,
        cancel: &CancellationToken,
    ) -> Result<(BigUint, BigUint), FibError> {
        let t = (fk1 << 1u32) - fk;
        let (f2k, fk1_sq, fk_sq) = self.doubling_products(fk, fk1, &t, cancel)?;
        Ok((f2k, fk1_sq + fk_sq))
    }

    /// Thresholds the runtime adjuster may retune, if the strategy has any.
    fn tunable(&self) -> Option<&TunableThresholds> {
        None
    }
}

/// FFT and parallel thresholds that can change while a calculation runs.
#[derive(Debug)]
pub struct TunableThresholds {
    fft: AtomicUsize,
    parallel: AtomicUsize,
}

impl TunableThresholds {
    /// Start from the given thresholds.
    #[must_use]
    pub fn new(fft: usize, parallel: usize) -> Self {
        Self {
            fft: AtomicUsize::new(fft),
            parallel: AtomicUsize::new(parallel),
        }
    }

    /// Current FFT threshold in bits.
    #[must_use]
    pub fn fft_threshold(&self) -> usize {
        self.fft.load(Ordering::Relaxed)
    }

    /// Current parallel threshold in bits.
    #[must_use]
    pub fn parallel_threshold(&self) -> usize {
        self.parallel.load(Ordering::Relaxed)
    }

    /// Replace both thresholds.
    pub fn set(&self, fft: usize, parallel: usize) {
        self.fft.store(fft, Ordering::Relaxed);
        self.parallel.store(parallel, Ordering::Relaxed);
    }

    /// Whether operands of `bits` bits run their products concurrently.
    #[must_use]
    pub fn wants_parallel(&self, bits: usize) -> bool {
        parallel_enabled(self.parallel_threshold(), bits)
    }
}

pub(crate) fn parallel_enabled(threshold: usize, bits: usize) -> bool {
    threshold > 0 && bits >= threshold
}

#[allow(clippy::cast_possible_truncation)]
fn bit_len(x: &BigUint) -> usize {
    x.bits() as usize
}

/// Run a step's products, concurrently when `parallel` is set and a task
/// slot is free.
pub(crate) fn run_step(
    ctx: &CalcContext,
    multiplier: &dyn Multiplier,
    tasks: &[MulTask<'_>],
    parallel: bool,
    cancel: &CancellationToken,
) -> Result<Vec<BigUint>, FibError> {
    let slot = if parallel { ctx.tasks().try_acquire() } else { None };
    let out = execute_tasks(tasks, multiplier, slot.is_some(), cancel);
    drop(slot);
    out
}

fn doubling_tasks<'a>(fk: &'a BigUint, fk1: &'a BigUint, t: &'a BigUint) -> [MulTask<'a>; 3] {
    [MulTask::Multiply(fk, t), MulTask::Square(fk1), MulTask::Square(fk)]
}

fn into_triple(products: Vec<BigUint>) -> Result<(BigUint, BigUint, BigUint), FibError> {
    let mut it = products.into_iter();
    match (it.next(), it.next(), it.next()) {
        (Some(a), Some(b), Some(c)) => Ok((a, b, c)),
        _ => Err(FibError::InternalFault(
            "doubling step produced fewer than three products".into(),
        )),
    }
}

/// Routes each product to schoolbook, intermediate or FFT by operand size.
pub struct AdaptiveStrategy {
    ctx: Arc<CalcContext>,
    thresholds: TunableThresholds,
    intermediate_threshold: usize,
}

impl AdaptiveStrategy {
    /// Build a strategy over `ctx` with the thresholds from `opts`.
    #[must_use]
    pub fn new(ctx: Arc<CalcContext>, opts: &Options) -> Self {
        Self {
            ctx,
            thresholds: TunableThresholds::new(opts.fft_threshold, opts.parallel_threshold),
            intermediate_threshold: opts.intermediate_threshold,
        }
    }

    /// Tier for two operands under the current thresholds.
    #[must_use]
    pub fn tier(&self, a_bits: usize, b_bits: usize) -> MulTier {
        select_tier(
            a_bits,
            b_bits,
            self.thresholds.fft_threshold(),
            self.intermediate_threshold,
        )
    }
}

impl Multiplier for AdaptiveStrategy {
    fn multiply(&self, a: &BigUint, b: &BigUint) -> Result<BigUint, FibError> {
        let tier = self.tier(bit_len(a), bit_len(b));
        multiply_with(tier, self.ctx.fft(), a, b, &NeverInterrupt)
    }

    fn square(&self, a: &BigUint) -> Result<BigUint, FibError> {
        let bits = bit_len(a);
        square_with(self.tier(bits, bits), self.ctx.fft(), a, &NeverInterrupt)
    }

    fn name(&self) -> &'static str {
        "Adaptive"
    }
}

impl DoublingStepExecutor for AdaptiveStrategy {
    fn doubling_products(
        &self,
        fk: &BigUint,
        fk1: &BigUint,
        t: &BigUint,
        cancel: &CancellationToken,
    ) -> Result<(BigUint, BigUint, BigUint), FibError> {
        // fk is the smallest of the three operands, so it decides whether
        // every product clears the FFT threshold.
        let small = bit_len(fk);
        let large = bit_len(fk1).max(bit_len(t));
        if self.tier(small, large) == MulTier::Fft {
            return Ok(self.ctx.fft().doubling_products(fk, fk1, t, cancel)?);
        }
        let parallel = self.thresholds.wants_parallel(large);
        let products = run_step(&self.ctx, self, &doubling_tasks(fk, fk1, t), parallel, cancel)?;
        into_triple(products)
    }

    fn tunable(&self) -> Option<&TunableThresholds> {
        Some(&self.thresholds)
    }
}

/// Always multiplies through the FFT.
pub struct FftOnlyStrategy {
    ctx: Arc<CalcContext>,
}

impl FftOnlyStrategy {
    /// Build a strategy over `ctx`.
    #[must_use]
    pub fn new(ctx: Arc<CalcContext>) -> Self {
        Self { ctx }
    }
}

impl Multiplier for FftOnlyStrategy {
    fn multiply(&self, a: &BigUint, b: &BigUint) -> Result<BigUint, FibError> {
        Ok(self.ctx.fft().multiply(a, b)?)
    }

    fn square(&self, a: &BigUint) -> Result<BigUint, FibError> {
        Ok(self.ctx.fft().square(a)?)
    }

    fn name(&self) -> &'static str {
        "FFT"
    }
}

impl DoublingStepExecutor for FftOnlyStrategy {
    fn doubling_products(
        &self,
        fk: &BigUint,
        fk1: &BigUint,
        t: &BigUint,
        cancel: &CancellationToken,
    ) -> Result<(BigUint, BigUint, BigUint), FibError> {
        Ok(self.ctx.fft().doubling_products(fk, fk1, t, cancel)?)
    }
}

/// Always uses num-bigint's sub-quadratic product.
pub struct IntermediateOnlyStrategy {
    ctx: Arc<CalcContext>,
    parallel_threshold: usize,
}

impl IntermediateOnlyStrategy {
    /// Build a strategy over `ctx`; steps run concurrently above
    /// `parallel_threshold` bits (0 disables).
    #[must_use]
    pub fn new(ctx: Arc<CalcContext>, parallel_threshold: usize) -> Self {
        Self {
            ctx,
            parallel_threshold,
        }
    }
}

impl Multiplier for IntermediateOnlyStrategy {
    fn multiply(&self, a: &BigUint, b: &BigUint) -> Result<BigUint, FibError> {
        Ok(a * b)
    }

    fn square(&self, a: &BigUint) -> Result<BigUint, FibError> {
        Ok(a * a)
    }

    fn name(&self) -> &'static str {
        "Intermediate"
    }
}

impl DoublingStepExecutor for IntermediateOnlyStrategy {
    fn doubling_products(
        &self,
        fk: &BigUint,
        fk1: &BigUint,
        t: &BigUint,
        cancel: &CancellationToken,
    ) -> Result<(BigUint, BigUint, BigUint), FibError> {
        let parallel = parallel_enabled(self.parallel_threshold, bit_len(fk1).max(bit_len(t)));
        let products = run_step(&self.ctx, self, &doubling_tasks(fk, fk1, t), parallel, cancel)?;
        into_triple(products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> Arc<CalcContext> {
        Arc::new(CalcContext::default())
    }

    fn fib_pair(k: u32) -> (BigUint, BigUint) {
        let (mut a, mut b) = (BigUint::ZERO, BigUint::from(1u8));
        for _ in 0..k {
            let next = &a + &b;
            a = std::mem::replace(&mut b, next);
        }
        (a, b)
    }

    fn strategies(opts: &Options) -> Vec<Box<dyn DoublingStepExecutor>> {
        let ctx = ctx();
        vec![
            Box::new(AdaptiveStrategy::new(Arc::clone(&ctx), opts)),
            Box::new(FftOnlyStrategy::new(Arc::clone(&ctx))),
            Box::new(IntermediateOnlyStrategy::new(ctx, opts.parallel_threshold)),
        ]
    }

    #[test]
    fn doubling_step_small() {
        let cancel = CancellationToken::new();
        for strat in strategies(&Options::default()) {
            // F(5), F(6) -> F(10), F(11)
            let (f2k, f2k1) = strat
                .execute_doubling_step(&BigUint::from(5u8), &BigUint::from(8u8), &cancel)
                .unwrap();
            assert_eq!(f2k, BigUint::from(55u8), "{}", strat.name());
            assert_eq!(f2k1, BigUint::from(89u8), "{}", strat.name());
        }
    }

    #[test]
    fn doubling_step_from_zero() {
        let cancel = CancellationToken::new();
        for strat in strategies(&Options::default()) {
            let (f0, f1) = strat
                .execute_doubling_step(&BigUint::ZERO, &BigUint::from(1u8), &cancel)
                .unwrap();
            assert_eq!(f0, BigUint::ZERO);
            assert_eq!(f1, BigUint::from(1u8));
        }
    }

    #[test]
    fn strategies_agree_across_tiers() {
        let opts = Options {
            fft_threshold: 20_000,
            intermediate_threshold: 2_000,
            parallel_threshold: 1,
            ..Options::default()
        };
        let cancel = CancellationToken::new();
        // F(10000) has about 6900 bits, F(40000) about 27700.
        for k in [500, 10_000, 40_000] {
            let (fk, fk1) = fib_pair(k);
            let (e2k, e2k1) = fib_pair(2 * k);
            let expected_next = &e2k + &e2k1;
            for strat in strategies(&opts) {
                let (f2k, f2k1) = strat.execute_doubling_step(&fk, &fk1, &cancel).unwrap();
                assert_eq!(f2k, e2k, "{} at k={k}", strat.name());
                assert_eq!(&f2k + &f2k1, expected_next, "{} at k={k}", strat.name());
            }
        }
    }

    #[test]
    fn multiply_and_square_agree() {
        let (a, b) = fib_pair(30_000);
        for strat in strategies(&Options::default()) {
            assert_eq!(strat.multiply(&a, &b).unwrap(), &a * &b);
            assert_eq!(strat.square(&a).unwrap(), strat.multiply(&a, &a).unwrap());
        }
    }

    #[test]
    fn adaptive_tiers_follow_thresholds() {
        let opts = Options {
            fft_threshold: 10_000,
            intermediate_threshold: 1_000,
            ..Options::default()
        };
        let strat = AdaptiveStrategy::new(ctx(), &opts);
        assert_eq!(strat.tier(500, 500), MulTier::Schoolbook);
        assert_eq!(strat.tier(5_000, 5_000), MulTier::Intermediate);
        assert_eq!(strat.tier(20_000, 20_000), MulTier::Fft);

        let tunable = strat.tunable().unwrap();
        tunable.set(100_000, 0);
        assert_eq!(strat.tier(20_000, 20_000), MulTier::Intermediate);
        assert!(!tunable.wants_parallel(usize::MAX));
    }

    #[test]
    fn only_adaptive_is_tunable() {
        let opts = Options::default();
        let s = strategies(&opts);
        assert!(s[0].tunable().is_some());
        assert!(s[1].tunable().is_none());
        assert!(s[2].tunable().is_none());
    }

    #[test]
    fn cancelled_step_fails() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (fk, fk1) = fib_pair(1_000);
        for strat in strategies(&Options::default()) {
            let err = strat.execute_doubling_step(&fk, &fk1, &cancel);
            // Small FFT-only steps may finish without reaching a checkpoint.
            if strat.name() != "FFT" {
                assert_eq!(err.unwrap_err(), FibError::Cancelled, "{}", strat.name());
            }
        }
    }

    #[test]
    fn tunable_thresholds() {
        let t = TunableThresholds::new(500_000, 4096);
        assert_eq!(t.fft_threshold(), 500_000);
        assert!(t.wants_parallel(4096));
        assert!(!t.wants_parallel(4095));
        t.set(1, 0);
        assert_eq!(t.fft_threshold(), 1);
        assert!(!t.wants_parallel(1 << 30));
    }
}
