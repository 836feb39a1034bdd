//! Progress tracking types and cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fibcalc_bigfft::Interrupt;

use crate::calculator::FibError;

/// Progress update sent from calculators to observers.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    /// Calculator index (for multi-calculator runs).
    pub calc_index: usize,
    /// Name of the algorithm producing this update.
    pub algorithm: &'static str,
    /// Current progress as a fraction in [0.0, 1.0].
    pub progress: f64,
    /// Current iteration/step number.
    pub current_step: u64,
    /// Total number of steps.
    pub total_steps: u64,
    /// Whether this is the final update.
    pub done: bool,
}

impl ProgressUpdate {
    /// Create a new progress update.
    #[must_use]
    pub fn new(
        calc_index: usize,
        algorithm: &'static str,
        progress: f64,
        current: u64,
        total: u64,
    ) -> Self {
        Self {
            calc_index,
            algorithm,
            progress,
            current_step: current,
            total_steps: total,
            done: false,
        }
    }

    /// Create a completion update.
    #[must_use]
    pub fn done(calc_index: usize, algorithm: &'static str) -> Self {
        Self {
            calc_index,
            algorithm,
            progress: 1.0,
            current_step: 0,
            total_steps: 0,
            done: true,
        }
    }
}

/// Precomputed powers of 4 for work estimation (4^0 through 4^63).
const POWERS_OF_4: [f64; 64] = {
    let mut table = [0.0f64; 64];
    table[0] = 1.0;
    let mut i = 1;
    while i < 64 {
        table[i] = table[i - 1] * 4.0;
        i += 1;
    }
    table
};

/// Total work of a loop over `n`'s bits.
///
/// Each bit position costs about four times the previous one: the operands
/// double in size and multiplication is superlinear.
#[must_use]
pub fn calc_total_work(n: u64) -> f64 {
    let num_bits = (64 - n.leading_zeros()) as usize;
    POWERS_OF_4[..num_bits].iter().sum()
}

/// Fraction of the work done after `done` of `total` bit positions.
#[must_use]
pub fn work_progress(done: u32, total: u32) -> f64 {
    if total == 0 || done >= total {
        return 1.0;
    }
    let total = total.min(64) as usize;
    let done = (done as usize).min(total);
    let all: f64 = POWERS_OF_4[..total].iter().sum();
    let finished: f64 = POWERS_OF_4[..done].iter().sum();
    finished / all
}

/// Cooperative cancellation token shared by a calculation and its callers.
///
/// # Example
/// ```
/// use fibcalc_core::progress::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// assert!(token.check_cancelled().is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Check for cancellation, returning an error if cancelled.
    ///
    /// ```
    /// use fibcalc_core::progress::CancellationToken;
    ///
    /// let token = CancellationToken::new();
    /// assert!(token.check_cancelled().is_ok());
    ///
    /// token.cancel();
    /// assert!(token.check_cancelled().is_err());
    /// ```
    pub fn check_cancelled(&self) -> Result<(), FibError> {
        if self.is_cancelled() {
            Err(FibError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Interrupt for CancellationToken {
    fn is_interrupted(&self) -> bool {
        self.is_cancelled()
    }
}
