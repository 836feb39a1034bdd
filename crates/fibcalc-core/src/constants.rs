//! Constants for Fibonacci calculation thresholds and configuration.

/// Default threshold (in bits) above which a doubling step's three
/// multiplications run concurrently.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 4096;

/// Default threshold (in bits) for FFT multiplication.
pub const DEFAULT_FFT_THRESHOLD: usize = 500_000;

/// Default threshold (in bits) for the sub-quadratic num-bigint product.
pub const DEFAULT_INTERMEDIATE_THRESHOLD: usize = 2560;

/// Default threshold (in bits) for Strassen matrix multiplication.
pub const DEFAULT_STRASSEN_THRESHOLD: usize = 3072;

/// Default number of iterations between dynamic threshold checks.
pub const DEFAULT_CHECK_INTERVAL: usize = 5;

/// Minimum progress change (1%) before reporting an update.
pub const PROGRESS_REPORT_THRESHOLD: f64 = 0.01;

/// Maximum Fibonacci index that fits in a u64.
/// F(93) = 12200160415121876738
pub const MAX_FIB_U64: u64 = 93;

/// Pooled calculation states holding integers above this many bits are
/// dropped instead of retained.
pub const MAX_POOLED_BIT_LEN: u64 = 100_000_000;

/// log2 of the golden ratio: F(n) has about n · this many bits.
pub const BITS_PER_INDEX: f64 = 0.694_24;

/// Precomputed Fibonacci values for n = 0..=93 (fast path).
///
/// F(93) = 12,200,160,415,121,876,738 is the largest Fibonacci number
/// that fits in `u64`. F(94) = 19,740,274,219,868,223,167 overflows
/// `u64::MAX` (18,446,744,073,709,551,615).
pub const FIB_TABLE: [u64; 94] = {
    let mut table = [0u64; 94];
    table[0] = 0;
    table[1] = 1;
    let mut i = 2;
    while i < 94 {
        table[i] = table[i - 1] + table[i - 2];
        i += 1;
    }
    table
};
