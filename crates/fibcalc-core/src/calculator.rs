//! Calculator traits and the `FibCalculator` decorator.
//!
//! `Calculator` is the public trait consumed by an orchestration layer.
//! `CoreCalculator` is the internal trait implemented by algorithms.
//! `FibCalculator` adds the small-index fast path, option validation and
//! the final progress update.

use std::sync::Arc;

use fibcalc_bigfft::FftError;
use num_bigint::BigUint;

use crate::constants::{FIB_TABLE, MAX_FIB_U64};
use crate::memory_budget::MemoryEstimate;
use crate::observer::ProgressObserver;
use crate::options::Options;
use crate::progress::{CancellationToken, ProgressUpdate};

/// Error type for Fibonacci calculations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FibError {
    /// An invariant broke inside the multiplication pipeline.
    #[error("internal fault: {0}")]
    InternalFault(String),

    /// Calculation was cancelled.
    #[error("calculation cancelled")]
    Cancelled,

    /// A threshold, size or limit is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl From<FftError> for FibError {
    fn from(err: FftError) -> Self {
        match err {
            FftError::InternalFault(msg) => Self::InternalFault(msg),
            FftError::Cancelled => Self::Cancelled,
            FftError::InvalidConfiguration(msg) => Self::InvalidConfiguration(msg),
        }
    }
}

/// Public trait for Fibonacci calculators, consumed by orchestration.
pub trait Calculator: Send + Sync {
    /// Calculate F(n) with the given options.
    fn calculate(
        &self,
        cancel: &CancellationToken,
        observer: &dyn ProgressObserver,
        calc_index: usize,
        n: u64,
        opts: &Options,
    ) -> Result<BigUint, FibError>;

    /// Get the name of this calculator.
    fn name(&self) -> &'static str;
}

/// Internal trait for algorithm implementations.
/// Wrapped by `FibCalculator` which adds the fast path and the final update.
pub trait CoreCalculator: Send + Sync {
    /// Perform the core calculation for n > 93.
    fn calculate_core(
        &self,
        cancel: &CancellationToken,
        observer: &dyn ProgressObserver,
        calc_index: usize,
        n: u64,
        opts: &Options,
    ) -> Result<BigUint, FibError>;

    /// Get the name of this algorithm.
    fn name(&self) -> &'static str;
}

/// Decorator that wraps a `CoreCalculator` with fast path and progress reporting.
pub struct FibCalculator {
    inner: Arc<dyn CoreCalculator>,
}

impl FibCalculator {
    /// Create a new `FibCalculator` wrapping the given core calculator.
    #[must_use]
    pub fn new(inner: Arc<dyn CoreCalculator>) -> Self {
        Self { inner }
    }

    /// Fast path for small n (n <= 93) using the precomputed table.
    #[allow(clippy::cast_possible_truncation)]
    fn calculate_small(n: u64) -> BigUint {
        BigUint::from(FIB_TABLE[n as usize])
    }

    fn check_budget(n: u64, opts: &Options) -> Result<(), FibError> {
        let Some(limit) = opts.effective_memory_limit() else {
            return Ok(());
        };
        let estimate = MemoryEstimate::estimate(n);
        if estimate.fits_in(Some(limit)) {
            Ok(())
        } else {
            Err(FibError::InvalidConfiguration(format!(
                "F({n}) needs about {} but the memory limit is {}",
                crate::memory_budget::format_bytes(estimate.total_bytes),
                crate::memory_budget::format_bytes(limit),
            )))
        }
    }
}

impl Calculator for FibCalculator {
    fn calculate(
        &self,
        cancel: &CancellationToken,
        observer: &dyn ProgressObserver,
        calc_index: usize,
        n: u64,
        opts: &Options,
    ) -> Result<BigUint, FibError> {
        opts.validate()?;
        cancel.check_cancelled()?;

        if n <= MAX_FIB_U64 {
            observer.on_progress(&ProgressUpdate::done(calc_index, self.inner.name()));
            return Ok(Self::calculate_small(n));
        }

        Self::check_budget(n, opts)?;

        let result = self
            .inner
            .calculate_core(cancel, observer, calc_index, n, opts)?;
        observer.on_progress(&ProgressUpdate::done(calc_index, self.inner.name()));
        Ok(result)
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
