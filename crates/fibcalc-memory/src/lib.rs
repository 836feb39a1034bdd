//! # fibcalc-memory
//!
//! Memory substrate for the `FibCalc` multiplication engine.
//!
//! Provides size-classed word pools in four families, a bounded object pool
//! for calculation state, a per-call bump arena with heap fallback, and the
//! single-flight latch behind pool pre-warming.
#![warn(missing_docs)]

pub mod arena;
pub mod object_pool;
pub mod pool;
pub mod size_class;
pub mod stats;
pub mod warming;

pub use arena::{estimate_staging_words, estimate_transform_words, ArenaWords, BumpArena};
pub use object_pool::ObjectPool;
pub use pool::{MemoryPools, PoolConfig, PoolFamily, WordPool};
pub use stats::PoolStats;
pub use warming::{WarmTier, WarmupLatch};
