//! Multiplication tasks and their concurrent execution.

use std::sync::atomic::{AtomicBool, Ordering};

use num_bigint::BigUint;
use rayon::prelude::*;

use crate::calculator::FibError;
use crate::progress::CancellationToken;
use crate::strategy::Multiplier;

/// One product of a step.
#[derive(Debug, Clone, Copy)]
pub enum MulTask<'a> {
    /// a · b.
    Multiply(&'a BigUint, &'a BigUint),
    /// a².
    Square(&'a BigUint),
}

impl MulTask<'_> {
    /// Run the task on `multiplier`.
    pub fn run(self, multiplier: &dyn Multiplier) -> Result<BigUint, FibError> {
        match self {
            Self::Multiply(a, b) => multiplier.multiply(a, b),
            Self::Square(a) => multiplier.square(a),
        }
    }

    /// Larger operand size in bits.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn max_bits(self) -> usize {
        match self {
            Self::Multiply(a, b) => a.bits().max(b.bits()) as usize,
            Self::Square(a) => a.bits() as usize,
        }
    }
}

/// Run `tasks` and return their products in order.
///
/// With `parallel` set the tasks run on the rayon pool with
/// first-error-wins semantics: once one task fails, tasks that have not
/// started yet are skipped and the first real error is returned.
/// Cancellation is checked before each task starts.
pub fn execute_tasks(
    tasks: &[MulTask<'_>],
    multiplier: &dyn Multiplier,
    parallel: bool,
    cancel: &CancellationToken,
) -> Result<Vec<BigUint>, FibError> {
    if !parallel {
        return tasks
            .iter()
            .map(|task| {
                cancel.check_cancelled()?;
                task.run(multiplier)
            })
            .collect();
    }

    let failed = AtomicBool::new(false);
    let results: Vec<Result<BigUint, FibError>> = tasks
        .par_iter()
        .map(|task| {
            if failed.load(Ordering::Relaxed) {
                return Err(FibError::Cancelled);
            }
            let result = cancel.check_cancelled().and_then(|()| task.run(multiplier));
            if result.is_err() {
                failed.store(true, Ordering::Relaxed);
            }
            result
        })
        .collect();

    first_error(results)
}

/// Collect results, preferring a real failure over the cancellations it
/// caused in sibling tasks.
fn first_error(results: Vec<Result<BigUint, FibError>>) -> Result<Vec<BigUint>, FibError> {
    let mut collected = Vec::with_capacity(results.len());
    let mut error: Option<FibError> = None;
    for result in results {
        match result {
            Ok(v) => collected.push(v),
            Err(FibError::Cancelled) if error.is_some() => {}
            Err(e) => {
                if error.is_none() || matches!(error, Some(FibError::Cancelled)) {
                    error = Some(e);
                }
            }
        }
    }
    match error {
        Some(e) => Err(e),
        None => Ok(collected),
    }
}

/// Default bound on concurrent multiplication tasks: twice the logical cores.
#[must_use]
pub fn default_parallelism() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(std::num::NonZero::get)
        .unwrap_or(4);
    cpus * 2
}
