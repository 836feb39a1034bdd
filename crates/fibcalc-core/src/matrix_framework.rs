//! Generic matrix exponentiation framework.
//!
//! Square-and-multiply over the bits of n, most significant first:
//! the running product is squared every iteration and multiplied by Q
//! when the bit is set. F(n) ends up in Q^n[0][1].

use num_bigint::BigUint;

use crate::calculator::FibError;
use crate::context::CalcContext;
use crate::matrix_ops::MatrixOps;
use crate::matrix_types::MatrixState;
use crate::observer::StepReporter;
use crate::options::Options;
use crate::progress::CancellationToken;
use crate::strategy::Multiplier;

/// Raise `state.base` to the n-th power into `state.result`.
///
/// `state` must start with the identity as result.
pub fn execute_matrix_loop(
    n: u64,
    ops: &MatrixOps<'_>,
    state: &mut MatrixState,
    cancel: &CancellationToken,
    reporter: &StepReporter<'_>,
) -> Result<(), FibError> {
    let num_bits = 64 - n.leading_zeros();
    for (done, i) in (0..num_bits).rev().enumerate() {
        cancel.check_cancelled()?;
        // The identity squares to itself.
        if !state.result.is_identity() {
            state.result = ops.square(&state.result)?;
        }
        if (n >> i) & 1 == 1 {
            state.result = ops.multiply(&state.result, &state.base)?;
        }
        #[allow(clippy::cast_possible_truncation)]
        reporter.step(done as u32 + 1);
    }
    Ok(())
}

/// Compute F(n) by matrix exponentiation on pooled state from `ctx`.
///
/// The state returns to the pool on success and is dropped on failure.
pub fn calculate_with_matrix(
    ctx: &CalcContext,
    multiplier: &dyn Multiplier,
    cancel: &CancellationToken,
    reporter: &StepReporter<'_>,
    n: u64,
    opts: &Options,
) -> Result<BigUint, FibError> {
    ctx.apply_cache_options(opts);
    let ops = MatrixOps::new(
        ctx,
        multiplier,
        opts.strassen_threshold,
        opts.parallel_threshold,
        cancel,
    );
    let mut state = ctx.acquire_matrix_state();
    execute_matrix_loop(n, &ops, &mut state, cancel, reporter)?;
    let result = state.take_result();
    ctx.release_matrix_state(state);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observers::NoOpObserver;
    use crate::strategy::{AdaptiveStrategy, FftOnlyStrategy};
    use std::sync::Arc;

    fn fib_reference(n: u64) -> BigUint {
        let (mut a, mut b) = (BigUint::ZERO, BigUint::from(1u8));
        for _ in 0..n {
            let next = &a + &b;
            a = std::mem::replace(&mut b, next);
        }
        a
    }

    fn run(multiplier: &dyn Multiplier, ctx: &CalcContext, n: u64, opts: &Options) -> BigUint {
        let observer = NoOpObserver::new();
        let reporter = StepReporter::new(&observer, 0, "test", 64 - n.leading_zeros());
        calculate_with_matrix(ctx, multiplier, &CancellationToken::new(), &reporter, n, opts)
            .unwrap()
    }

    #[test]
    fn matrix_framework_computes_correctly() {
        let ctx = Arc::new(CalcContext::default());
        let strategy = AdaptiveStrategy::new(Arc::clone(&ctx), &Options::default());
        let result = run(&strategy, &ctx, 100, &Options::default());
        assert_eq!(result.to_string(), "354224848179261915075");
    }

    #[test]
    fn edge_indices() {
        let ctx = Arc::new(CalcContext::default());
        let strategy = AdaptiveStrategy::new(Arc::clone(&ctx), &Options::default());
        for n in [0, 1, 2, 3, 4, 64, 127, 128] {
            assert_eq!(run(&strategy, &ctx, n, &Options::default()), fib_reference(n), "n={n}");
        }
    }

    #[test]
    fn strassen_and_parallel_settings_agree() {
        let ctx = Arc::new(CalcContext::default());
        let n = 9_001;
        let expected = fib_reference(n);
        for (strassen, parallel) in [(0, 0), (1, 0), (0, 1), (256, 512)] {
            let opts = Options {
                strassen_threshold: strassen,
                parallel_threshold: parallel,
                ..Options::default()
            };
            let strategy = AdaptiveStrategy::new(Arc::clone(&ctx), &opts);
            assert_eq!(run(&strategy, &ctx, n, &opts), expected, "{strassen}/{parallel}");
        }
    }

    #[test]
    fn fft_only_multiplier() {
        let ctx = Arc::new(CalcContext::default());
        let strategy = FftOnlyStrategy::new(Arc::clone(&ctx));
        assert_eq!(run(&strategy, &ctx, 3_000, &Options::default()), fib_reference(3_000));
    }

    #[test]
    fn cancelled_loop_drops_state() {
        let ctx = Arc::new(CalcContext::default());
        let strategy = AdaptiveStrategy::new(Arc::clone(&ctx), &Options::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let observer = NoOpObserver::new();
        let reporter = StepReporter::new(&observer, 0, "test", 10);
        let err =
            calculate_with_matrix(&ctx, &strategy, &cancel, &reporter, 1000, &Options::default())
                .unwrap_err();
        assert_eq!(err, FibError::Cancelled);
        assert_eq!(ctx.pooled_matrix_states(), 0);
    }

    #[test]
    fn successful_loop_returns_state() {
        let ctx = Arc::new(CalcContext::default());
        let strategy = AdaptiveStrategy::new(Arc::clone(&ctx), &Options::default());
        run(&strategy, &ctx, 500, &Options::default());
        assert_eq!(ctx.pooled_matrix_states(), 1);
        assert!(ctx.acquire_matrix_state().result.is_identity());
    }
}
