//! The multiplication engine.
//!
//! An [`FftContext`] owns everything a multiplication shares across calls:
//! the kernel table, the buffer pools, the transform cache, and the worker
//! slots bounding fan-out. Contexts are `Sync`; one is normally built per
//! process and handed to every calculation.

use std::panic::{catch_unwind, AssertUnwindSafe};

use fibcalc_memory::{BumpArena, MemoryPools, PoolConfig, PoolStats, WarmTier, WarmupLatch};
use num_bigint::BigUint;
use num_traits::Zero;
use tracing::{debug, trace};

use crate::convert::{assign_from_words, biguint_from_words, copy_words, word_len};
use crate::error::{FftError, Result};
use crate::fermat::{FermatOps, DEFAULT_MUL_THRESHOLD, WORD_BITS};
use crate::fft_cache::{CacheConfig, CacheStats, TransformCache, TransformKey};
use crate::fft_core::Fourier;
use crate::fft_poly::{PolValues, Poly};
use crate::kernels::Kernels;
use crate::params::FftParams;
use crate::parallel::{available_cores, RecursionGate, WorkerSlots};
use crate::pool_warming::{warm_pools, WarmingConfig};

/// Cooperative cancellation, polled before every fan-out.
pub trait Interrupt: Sync {
    /// Whether the caller wants the work abandoned.
    fn is_interrupted(&self) -> bool;
}

/// An interrupt that never fires.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverInterrupt;

impl Interrupt for NeverInterrupt {
    fn is_interrupted(&self) -> bool {
        false
    }
}

/// Tuning knobs of an [`FftContext`].
#[derive(Debug, Clone)]
pub struct FftConfig {
    /// Ring width (words) below which element products use schoolbook.
    pub fermat_mul_threshold: usize,
    /// Smallest transform order whose halves may run in parallel.
    pub parallel_min_log_size: u32,
    /// Deepest transform recursion level that may still fork.
    pub parallel_max_depth: u32,
    /// Concurrent forks allowed across the whole context.
    pub worker_slots: usize,
    /// Transform cache settings.
    pub cache: CacheConfig,
    /// Buffer pool limits.
    pub pools: PoolConfig,
    /// Stage transform inputs in a per-call bump arena.
    pub use_arena: bool,
    /// Skip CPU detection and use the portable kernels.
    pub force_portable_kernels: bool,
}

impl Default for FftConfig {
    fn default() -> Self {
        Self {
            fermat_mul_threshold: DEFAULT_MUL_THRESHOLD,
            parallel_min_log_size: RecursionGate::default().min_log_size,
            parallel_max_depth: RecursionGate::default().max_depth,
            worker_slots: available_cores(),
            cache: CacheConfig::default(),
            pools: PoolConfig::default(),
            use_arena: true,
            force_portable_kernels: false,
        }
    }
}

impl FftConfig {
    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.fermat_mul_threshold == 0 {
            return Err(FftError::InvalidConfiguration(
                "fermat_mul_threshold must be at least 1".into(),
            ));
        }
        if self.worker_slots == 0 {
            return Err(FftError::InvalidConfiguration(
                "worker_slots must be at least 1".into(),
            ));
        }
        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err(FftError::InvalidConfiguration(
                "cache.max_entries must be positive when the cache is enabled".into(),
            ));
        }
        if self.pools.max_per_class == 0 {
            return Err(FftError::InvalidConfiguration(
                "pools.max_per_class must be positive".into(),
            ));
        }
        Ok(())
    }

    fn gate(&self) -> RecursionGate {
        RecursionGate {
            min_log_size: self.parallel_min_log_size,
            max_depth: self.parallel_max_depth,
        }
    }
}

/// Shared state of the FFT multiplier.
pub struct FftContext {
    config: FftConfig,
    ops: FermatOps,
    pools: MemoryPools,
    cache: TransformCache,
    slots: WorkerSlots,
    warmup: WarmupLatch,
}

impl FftContext {
    /// Build a context after validating `config`.
    pub fn new(config: FftConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    pub(crate) fn build(config: FftConfig) -> Self {
        let kernels = if config.force_portable_kernels {
            Kernels::portable()
        } else {
            Kernels::detect()
        };
        debug!(
            kernels = kernels.name(),
            worker_slots = config.worker_slots,
            cache_enabled = config.cache.enabled,
            "fft context ready"
        );
        Self {
            ops: FermatOps::new(kernels, config.fermat_mul_threshold),
            pools: MemoryPools::new(config.pools),
            cache: TransformCache::new(config.cache),
            slots: WorkerSlots::new(config.worker_slots),
            warmup: WarmupLatch::new(),
            config,
        }
    }

    /// The configuration in effect.
    #[must_use]
    pub fn config(&self) -> &FftConfig {
        &self.config
    }

    /// The kernel table chosen at construction.
    #[must_use]
    pub fn kernels(&self) -> &Kernels {
        self.ops.kernels()
    }

    /// Ring arithmetic bound to this context's kernels.
    #[must_use]
    pub fn fermat_ops(&self) -> &FermatOps {
        &self.ops
    }

    /// The buffer pools.
    #[must_use]
    pub fn pools(&self) -> &MemoryPools {
        &self.pools
    }

    /// The transform cache.
    #[must_use]
    pub fn cache(&self) -> &TransformCache {
        &self.cache
    }

    /// Worker slots bounding transform fan-out.
    #[must_use]
    pub fn slots(&self) -> &WorkerSlots {
        &self.slots
    }

    /// Cache counters.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Pool counters summed over every family.
    #[must_use]
    pub fn pool_stats(&self) -> PoolStats {
        self.pools.stats()
    }

    /// Replace the cache settings.
    pub fn reconfigure_cache(&self, config: CacheConfig) {
        self.cache.reconfigure(config);
    }

    /// x · y.
    pub fn multiply(&self, x: &BigUint, y: &BigUint) -> Result<BigUint> {
        self.multiply_interruptible(x, y, &NeverInterrupt)
    }

    /// x · y, abandoning the work if `interrupt` fires.
    pub fn multiply_interruptible(
        &self,
        x: &BigUint,
        y: &BigUint,
        interrupt: &dyn Interrupt,
    ) -> Result<BigUint> {
        if x.is_zero() || y.is_zero() {
            return Ok(BigUint::zero());
        }
        let words = self.guarded(|| self.product_words(x, Some(y), interrupt))?;
        Ok(biguint_from_words(&words))
    }

    /// dst = x · y, reusing `dst`'s allocation.
    pub fn multiply_into(&self, dst: &mut BigUint, x: &BigUint, y: &BigUint) -> Result<()> {
        if x.is_zero() || y.is_zero() {
            dst.set_zero();
            return Ok(());
        }
        let words = self.guarded(|| self.product_words(x, Some(y), &NeverInterrupt))?;
        assign_from_words(dst, &words);
        Ok(())
    }

    /// x².
    pub fn square(&self, x: &BigUint) -> Result<BigUint> {
        self.square_interruptible(x, &NeverInterrupt)
    }

    /// x², abandoning the work if `interrupt` fires.
    pub fn square_interruptible(&self, x: &BigUint, interrupt: &dyn Interrupt) -> Result<BigUint> {
        if x.is_zero() {
            return Ok(BigUint::zero());
        }
        let words = self.guarded(|| self.product_words(x, None, interrupt))?;
        Ok(biguint_from_words(&words))
    }

    /// dst = x², reusing `dst`'s allocation.
    pub fn square_into(&self, dst: &mut BigUint, x: &BigUint) -> Result<()> {
        if x.is_zero() {
            dst.set_zero();
            return Ok(());
        }
        let words = self.guarded(|| self.product_words(x, None, &NeverInterrupt))?;
        assign_from_words(dst, &words);
        Ok(())
    }

    /// The three products of one fast-doubling step: `(fk·t, fk1², fk²)`.
    ///
    /// All three share one transform shape, so `fk` is transformed once and
    /// feeds both of its products.
    pub fn doubling_products(
        &self,
        fk: &BigUint,
        fk1: &BigUint,
        t: &BigUint,
        interrupt: &dyn Interrupt,
    ) -> Result<(BigUint, BigUint, BigUint)> {
        if fk.is_zero() || fk1.is_zero() || t.is_zero() {
            return Ok((fk * t, fk1 * fk1, fk * fk));
        }
        self.guarded(|| self.doubling_words(fk, fk1, t, interrupt))
    }

    /// Warm the pools once per size tier for a computation of F(n).
    ///
    /// Returns `true` if this call did the warming.
    pub fn ensure_pools_warmed(&self, n: u64) -> bool {
        let Some(tier) = WarmTier::for_index(n) else {
            return false;
        };
        self.warmup.run_once(tier, || {
            warm_pools(&self.pools, n, &WarmingConfig::default());
        })
    }

    fn guarded<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic in multiplication".to_owned());
            Err(FftError::InternalFault(msg))
        })
    }

    fn fourier<'a>(&'a self, params: FftParams, interrupt: &'a dyn Interrupt) -> Fourier<'a> {
        Fourier {
            ops: &self.ops,
            pools: &self.pools,
            slots: &self.slots,
            gate: self.config.gate(),
            interrupt,
            n: params.n,
            k: params.k,
        }
    }

    fn operand_words(&self, x: &BigUint) -> Result<Vec<u64>> {
        let mut words = self.pools.words().acquire(word_len(x));
        if !copy_words(x, &mut words) {
            return Err(FftError::fault("operand does not fit its word buffer"));
        }
        Ok(words)
    }

    fn log_params(&self, params: FftParams, words: usize) {
        if words * WORD_BITS >= self.config.cache.min_bit_len {
            debug!(k = params.k, m = params.m, n = params.n, words, "fft parameters");
        } else {
            trace!(k = params.k, m = params.m, n = params.n, words, "fft parameters");
        }
    }

    fn wants_parallel(&self, params: FftParams) -> bool {
        params.k >= self.config.parallel_min_log_size && self.config.worker_slots > 1
    }

    // x·y when `y` is given, x² otherwise.
    fn product_words(
        &self,
        x: &BigUint,
        y: Option<&BigUint>,
        interrupt: &dyn Interrupt,
    ) -> Result<Vec<u64>> {
        let xw = self.operand_words(x)?;
        let yw = y.map(|y| self.operand_words(y)).transpose()?;
        let params = match &yw {
            Some(yw) => FftParams::for_words(xw.len(), yw.len()),
            None => FftParams::for_square(xw.len()),
        };
        self.log_params(params, xw.len());
        let arena = self
            .config
            .use_arena
            .then(|| BumpArena::for_transform(params.k, params.n));
        let fourier = self.fourier(params, interrupt);
        let parallel = self.wants_parallel(params);

        let vx;
        let product = match &yw {
            Some(yw) => {
                let (a, b) = self.transform_pair(&xw, yw, params, &fourier, arena.as_ref())?;
                let p = a.pointwise_mul(&b, &self.ops, &self.pools, parallel)?;
                b.release(&self.pools);
                vx = a;
                p
            }
            None => {
                vx = self.transform_cached(&xw, params, &fourier, arena.as_ref())?;
                vx.pointwise_sqr(&self.ops, &self.pools, parallel)?
            }
        };
        vx.release(&self.pools);
        self.pools.words().release(xw);
        if let Some(yw) = yw {
            self.pools.words().release(yw);
        }

        let out = self.finish(&product, params, &fourier)?;
        product.release(&self.pools);
        if let Some(arena) = &arena {
            trace!(
                used = arena.used_words(),
                capacity = arena.capacity_words(),
                fallbacks = arena.fallback_count(),
                "arena usage"
            );
        }
        Ok(out)
    }

    fn doubling_words(
        &self,
        fk: &BigUint,
        fk1: &BigUint,
        t: &BigUint,
        interrupt: &dyn Interrupt,
    ) -> Result<(BigUint, BigUint, BigUint)> {
        let a = self.operand_words(fk)?;
        let b = self.operand_words(fk1)?;
        let c = self.operand_words(t)?;
        let widest = a.len().max(b.len()).max(c.len());
        let params = FftParams::for_square(widest);
        self.log_params(params, widest);
        let arena = self
            .config
            .use_arena
            .then(|| BumpArena::for_operands(params.k, params.n, 3));
        let fourier = self.fourier(params, interrupt);
        let parallel = self.wants_parallel(params);

        let va = self.transform_cached(&a, params, &fourier, arena.as_ref())?;
        let vb = self.transform_cached(&b, params, &fourier, arena.as_ref())?;
        let vc = self.transform_cached(&c, params, &fourier, arena.as_ref())?;
        for w in [a, b, c] {
            self.pools.words().release(w);
        }

        let product = |x: &PolValues, y: Option<&PolValues>| -> Result<BigUint> {
            let p = match y {
                Some(y) => x.pointwise_mul(y, &self.ops, &self.pools, parallel)?,
                None => x.pointwise_sqr(&self.ops, &self.pools, parallel)?,
            };
            let words = self.finish(&p, params, &fourier)?;
            p.release(&self.pools);
            Ok(biguint_from_words(&words))
        };

        let slot = if parallel { self.slots.try_acquire() } else { None };
        let out = if slot.is_some() {
            if interrupt.is_interrupted() {
                Err(FftError::Cancelled)
            } else {
                let (pk_t, (pk1_sq, pk_sq)) = rayon::join(
                    || product(&va, Some(&vc)),
                    || rayon::join(|| product(&vb, None), || product(&va, None)),
                );
                pk_t.and_then(|a| Ok((a, pk1_sq?, pk_sq?)))
            }
        } else {
            product(&va, Some(&vc))
                .and_then(|a| Ok((a, product(&vb, None)?, product(&va, None)?)))
        };
        drop(slot);
        for v in [va, vb, vc] {
            v.release(&self.pools);
        }
        out
    }

    // Forward transforms of both operands, side by side when a slot is free.
    fn transform_pair(
        &self,
        x: &[u64],
        y: &[u64],
        params: FftParams,
        fourier: &Fourier<'_>,
        arena: Option<&BumpArena>,
    ) -> Result<(PolValues, PolValues)> {
        let slot = if self.wants_parallel(params) {
            self.slots.try_acquire()
        } else {
            None
        };
        if slot.is_some() {
            if fourier.interrupt.is_interrupted() {
                return Err(FftError::Cancelled);
            }
            let (a, b) = rayon::join(
                || self.transform_cached(x, params, fourier, None),
                || self.transform_cached(y, params, fourier, None),
            );
            return Ok((a?, b?));
        }
        let a = self.transform_cached(x, params, fourier, arena)?;
        let b = self.transform_cached(y, params, fourier, arena)?;
        Ok((a, b))
    }

    fn transform_cached(
        &self,
        words: &[u64],
        params: FftParams,
        fourier: &Fourier<'_>,
        arena: Option<&BumpArena>,
    ) -> Result<PolValues> {
        let cacheable = self.cache.accepts(words.len() * WORD_BITS);
        let key = cacheable.then(|| TransformKey::new(words, params.k, params.m, params.n));
        if let Some(key) = &key {
            if let Some(hit) = self.cache.lookup(key, words, |v| self.pooled_copy(v)) {
                trace!(k = params.k, words = words.len(), "transform cache hit");
                return Ok(hit);
            }
            trace!(k = params.k, words = words.len(), "transform cache miss");
        }
        let poly = Poly::from_words(words, params.k, params.m, &self.pools)?;
        let values = poly.transform(fourier, arena)?;
        poly.release(&self.pools);
        if let Some(key) = key {
            self.cache.put(key, words, &values);
        }
        Ok(values)
    }

    fn pooled_copy(&self, values: &PolValues) -> PolValues {
        let src = values.as_words();
        let mut buf = self.pools.fermat_slices().acquire(src.len());
        buf.copy_from_slice(src);
        PolValues::from_parts(values.k(), values.n(), buf)
    }

    fn finish(&self, product: &PolValues, params: FftParams, fourier: &Fourier<'_>) -> Result<Vec<u64>> {
        let poly = product.inverse(params.m, fourier)?;
        let words = poly.reassemble();
        poly.release(&self.pools);
        Ok(words)
    }
}

impl Default for FftContext {
    fn default() -> Self {
        Self::build(FftConfig::default())
    }
}

impl std::fmt::Debug for FftContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FftContext")
            .field("config", &self.config)
            .field("kernels", &self.kernels().name())
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
