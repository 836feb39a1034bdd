//! # fibcalc-bigfft
//!
//! Schönhage–Strassen multiplication of `BigUint`s over the Fermat rings
//! Z/(2^(64n)+1): operands are cut into polynomials, transformed with a
//! recursive radix-2 FFT whose twiddles are bit shifts, multiplied
//! pointwise, and transformed back.

pub mod arith;
pub mod context;
pub mod convert;
pub mod error;
pub mod fermat;
pub mod fft;
pub mod fft_cache;
pub mod fft_core;
pub mod fft_poly;
pub mod kernels;
pub mod memory_est;
pub mod parallel;
pub mod params;
pub mod pool_warming;

// Re-exports
pub use context::{FftConfig, FftContext, Interrupt, NeverInterrupt};
pub use error::{FftError, Result};
pub use fermat::FermatOps;
pub use fft::{
    default_context, multiply, multiply_into, schoolbook_multiply, schoolbook_square, square,
    square_into,
};
pub use fft_cache::{CacheConfig, CacheStats, TransformCache, TransformKey};
pub use fft_poly::{PolValues, Poly};
pub use kernels::Kernels;
pub use memory_est::estimate_fft_memory;
pub use parallel::{available_cores, RecursionGate, SlotGuard, WorkerSlots};
pub use params::FftParams;
