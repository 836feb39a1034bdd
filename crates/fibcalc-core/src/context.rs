//! The calculation context.
//!
//! Everything calculations share lives here instead of in process-wide
//! statics: the FFT engine, the task semaphore bounding concurrent
//! multiplications, and the pools of per-calculation state. Tests build
//! isolated contexts; production code usually builds one and hands an
//! `Arc` to every calculator.

use std::sync::{Arc, OnceLock};

use fibcalc_bigfft::{CacheConfig, FftContext, WorkerSlots};
use fibcalc_memory::ObjectPool;
use tracing::debug;

use crate::calculator::FibError;
use crate::common::default_parallelism;
use crate::constants::MAX_POOLED_BIT_LEN;
use crate::fastdoubling::CalculationState;
use crate::matrix_types::MatrixState;
use crate::options::Options;

/// Calculation states retained per pool.
const STATE_POOL_SIZE: usize = 8;

/// Shared resources of every calculation.
pub struct CalcContext {
    fft: Arc<FftContext>,
    cache_config: OnceLock<CacheConfig>,
    tasks: WorkerSlots,
    states: ObjectPool<CalculationState>,
    matrices: ObjectPool<MatrixState>,
}

impl CalcContext {
    /// Build a context around an existing FFT engine.
    #[must_use]
    pub fn new(fft: Arc<FftContext>) -> Self {
        Self {
            fft,
            cache_config: OnceLock::new(),
            tasks: WorkerSlots::new(default_parallelism()),
            states: ObjectPool::new(STATE_POOL_SIZE),
            matrices: ObjectPool::new(STATE_POOL_SIZE),
        }
    }

    /// Build a context whose FFT engine is tuned by `opts`.
    ///
    /// The engine's tuning and cache configuration are both fixed here.
    pub fn from_options(opts: &Options) -> Result<Self, FibError> {
        opts.validate()?;
        let fft = FftContext::new(opts.fft_config())?;
        let ctx = Self::new(Arc::new(fft));
        let _ = ctx.cache_config.set(opts.cache.into());
        Ok(ctx)
    }

    /// The FFT engine.
    #[must_use]
    pub fn fft(&self) -> &FftContext {
        &self.fft
    }

    /// A shared handle to the FFT engine.
    #[must_use]
    pub fn fft_handle(&self) -> Arc<FftContext> {
        Arc::clone(&self.fft)
    }

    /// Semaphore bounding concurrent multiplication tasks.
    #[must_use]
    pub fn tasks(&self) -> &WorkerSlots {
        &self.tasks
    }

    /// Configure the shared cache from the first options it sees.
    ///
    /// The cache is configured at most once per context, so concurrent
    /// calculations never resize or clear it under each other. Later
    /// options with different cache settings are ignored.
    pub fn apply_cache_options(&self, opts: &Options) {
        let wanted: CacheConfig = opts.cache.into();
        let current = *self.cache_config.get_or_init(|| {
            if self.fft.cache().config() != wanted {
                debug!(?wanted, "configuring transform cache");
                self.fft.reconfigure_cache(wanted);
            }
            wanted
        });
        if current != wanted {
            debug!(?current, ?wanted, "transform cache already configured, keeping it");
        }
    }

    /// Cache configuration fixed for this context, if any calculation or
    /// [`CalcContext::from_options`] has set it yet.
    #[must_use]
    pub fn cache_config(&self) -> Option<CacheConfig> {
        self.cache_config.get().copied()
    }

    /// Take a doubling state initialised to (F(0), F(1)).
    #[must_use]
    pub fn acquire_state(&self) -> CalculationState {
        self.states
            .acquire(CalculationState::new, CalculationState::reset)
    }

    /// Return a doubling state. Oversized states are dropped.
    pub fn release_state(&self, state: CalculationState) {
        if state.max_bits() <= MAX_POOLED_BIT_LEN {
            self.states.release(state);
        }
    }

    /// Take a matrix state initialised to the identity and the Fibonacci matrix.
    #[must_use]
    pub fn acquire_matrix_state(&self) -> MatrixState {
        self.matrices.acquire(MatrixState::new, MatrixState::reset)
    }

    /// Return a matrix state. Oversized states are dropped.
    pub fn release_matrix_state(&self, state: MatrixState) {
        if state.max_bits() <= MAX_POOLED_BIT_LEN {
            self.matrices.release(state);
        }
    }

    /// Doubling states ready for reuse.
    #[must_use]
    pub fn pooled_states(&self) -> usize {
        self.states.available()
    }

    /// Matrix states ready for reuse.
    #[must_use]
    pub fn pooled_matrix_states(&self) -> usize {
        self.matrices.available()
    }
}

impl Default for CalcContext {
    fn default() -> Self {
        Self::new(Arc::new(FftContext::default()))
    }
}

impl std::fmt::Debug for CalcContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalcContext")
            .field("fft", &self.fft)
            .field("task_slots", &self.tasks.capacity())
            .field("pooled_states", &self.states.available())
            .field("pooled_matrices", &self.matrices.available())
            .finish()
    }
}
