//! # fibcalc-core
//!
//! Exponentiation engine for arbitrarily large Fibonacci numbers.
//! Implements Fast Doubling, Matrix Exponentiation and an FFT-only doubling
//! calculator on top of three-tier multiplication routing (schoolbook,
//! num-bigint, Fermat FFT) with optional runtime threshold adjustment.

pub mod calculator;
pub(crate) mod common;
pub mod constants;
pub mod context;
pub mod doubling_framework;
pub mod dynamic_threshold;
pub mod fastdoubling;
pub mod fft_based;
pub mod fft_wrappers;
pub mod matrix;
pub mod matrix_framework;
pub mod matrix_ops;
pub mod matrix_types;
pub mod memory_budget;
pub mod observer;
pub mod observers;
pub mod options;
pub mod progress;
pub mod registry;
pub mod strategy;
pub mod threshold_types;

// Re-exports
pub use calculator::{Calculator, CoreCalculator, FibCalculator, FibError};
pub use constants::{
    DEFAULT_FFT_THRESHOLD, DEFAULT_INTERMEDIATE_THRESHOLD, DEFAULT_PARALLEL_THRESHOLD,
    DEFAULT_STRASSEN_THRESHOLD, FIB_TABLE, MAX_FIB_U64, PROGRESS_REPORT_THRESHOLD,
};
pub use context::CalcContext;
pub use dynamic_threshold::DynamicThresholdManager;
pub use memory_budget::{estimate_memory_usage, MemoryEstimate};
pub use observer::{ProgressObserver, ProgressSubject};
pub use options::Options;
pub use progress::{CancellationToken, ProgressUpdate};
pub use registry::{CalculatorFactory, DefaultFactory};
pub use strategy::{DoublingStepExecutor, Multiplier};

use std::sync::Arc;

use num_bigint::BigUint;

/// Compute F(n) with fast doubling on a fresh context and default options.
///
/// For progress, cancellation, shared pools or memory limits, build a
/// [`CalcContext`] and use the [`Calculator`] trait directly.
///
/// # Errors
///
/// Returns [`FibError::InternalFault`] if the multiplication pipeline fails.
///
/// # Example
/// ```
/// assert_eq!(fibcalc_core::fibonacci(10).unwrap().to_string(), "55");
/// assert_eq!(fibcalc_core::fibonacci(0).unwrap().to_string(), "0");
/// ```
pub fn fibonacci(n: u64) -> Result<BigUint, FibError> {
    let ctx = Arc::new(CalcContext::default());
    let calc = FibCalculator::new(Arc::new(fastdoubling::OptimizedFastDoubling::new(ctx)));
    calc.calculate(
        &CancellationToken::new(),
        &observers::NoOpObserver::new(),
        0,
        n,
        &Options::default(),
    )
}
