//! Pool warming: pre-populate buffer pools based on computation size.
//!
//! Predicts the buffer sizes a Fibonacci computation of a given index will
//! request from each pool family, so the hot loop starts with warm pools
//! instead of paying first-allocation cost.

use fibcalc_memory::{MemoryPools, PoolFamily};
use tracing::debug;

use crate::fermat::{mul_scratch_len, WORD_BITS};
use crate::params::FftParams;

/// Configuration for pool warming thresholds.
#[derive(Debug, Clone)]
pub struct WarmingConfig {
    /// Minimum N to trigger warming (below this, allocation is cheap).
    pub min_n: u64,
    /// Index from which transform buffers are warmed too.
    pub medium_threshold: u64,
    /// Index from which every prediction is doubled.
    pub large_threshold: u64,
}

impl Default for WarmingConfig {
    fn default() -> Self {
        Self {
            min_n: 1_000,
            medium_threshold: 100_000,
            large_threshold: 1_000_000,
        }
    }
}

/// One predicted group of buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarmRequest {
    /// Pool family serving the buffers.
    pub family: PoolFamily,
    /// Buffer length in words.
    pub len: usize,
    /// Number of buffers.
    pub count: usize,
}

/// Predicted sizes needed for a computation.
#[derive(Debug, Clone)]
pub struct SizePrediction {
    /// Estimated result bit-size: F(n) has approximately n * log2(phi) bits.
    pub result_bits: usize,
    /// Buffers to pre-allocate.
    pub requests: Vec<WarmRequest>,
}

/// Predict the buffers needed for computing F(n).
///
/// The doubling loop keeps about six full-size temporaries alive and
/// passes through every smaller size on the way up; large results also
/// exercise the transform buffers of a full-size square.
#[must_use]
pub fn predict_sizes(n: u64, config: &WarmingConfig) -> SizePrediction {
    let result_bits = estimate_result_bits(n);
    let words = result_bits / WORD_BITS + 1;
    let scale = if n >= config.large_threshold { 2 } else { 1 };

    let mut requests = Vec::new();
    let mut push = |family, len, count: usize| {
        requests.push(WarmRequest {
            family,
            len,
            count: count * scale,
        });
    };

    if result_bits <= 10_000 {
        push(PoolFamily::Words, words, 6);
        push(PoolFamily::Words, words / 2 + 1, 4);
    } else {
        push(PoolFamily::Words, words, 8);
        push(PoolFamily::Words, words / 2 + 1, 6);
        push(PoolFamily::Words, words / 4 + 1, 4);
    }

    if n >= config.medium_threshold {
        let p = FftParams::for_square(words);
        let w = p.element_width();
        push(PoolFamily::FermatSlices, w << p.k, 3);
        push(PoolFamily::CoefficientSlices, p.m << p.k, 2);
        push(PoolFamily::FermatElements, w, 4);
        push(PoolFamily::Words, mul_scratch_len(w), 2);
    }

    SizePrediction {
        result_bits,
        requests,
    }
}

/// Estimate the number of bits in F(n).
///
/// F(n) ~ phi^n / sqrt(5), so log2(F(n)) ~ n * log2(phi) ~ n * 0.6942.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn estimate_result_bits(n: u64) -> usize {
    if n <= 1 {
        return 1;
    }
    // log2(phi) ≈ 0.69424191363
    let bits = (n as f64 * 0.694_241_913_63).ceil() as usize;
    bits.max(1)
}

/// Warm `pools` for computing F(n). Returns the number of buffers added.
pub fn warm_pools(pools: &MemoryPools, n: u64, config: &WarmingConfig) -> usize {
    if n < config.min_n {
        return 0;
    }
    let prediction = predict_sizes(n, config);
    let added = prediction
        .requests
        .iter()
        .map(|r| pools.warm(r.family, r.len, r.count))
        .sum();
    debug!(n, result_bits = prediction.result_bits, added, "pools warmed");
    added
}

/// Warm `pools` with the default configuration.
pub fn warm_pools_default(pools: &MemoryPools, n: u64) -> usize {
    warm_pools(pools, n, &WarmingConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_result_bits_small() {
        assert_eq!(estimate_result_bits(0), 1);
        assert_eq!(estimate_result_bits(1), 1);
        // F(10) = 55, which is 6 bits. Estimate: ceil(10 * 0.6942) = 7
        assert!(estimate_result_bits(10) >= 6);
        assert!(estimate_result_bits(10) <= 8);
    }

    #[test]
    fn estimate_result_bits_medium() {
        // F(1000) has 209 digits ≈ 694 bits.
        let est = estimate_result_bits(1000);
        assert!((690..=700).contains(&est));
    }

    #[test]
    fn estimate_result_bits_large() {
        let est = estimate_result_bits(1_000_000);
        assert!((694_000..=695_000).contains(&est));
    }

    #[test]
    fn predict_sizes_small_uses_word_buffers_only() {
        let prediction = predict_sizes(5_000, &WarmingConfig::default());
        assert_eq!(prediction.result_bits, estimate_result_bits(5_000));
        assert!(prediction
            .requests
            .iter()
            .all(|r| r.family == PoolFamily::Words));
    }

    #[test]
    fn predict_sizes_medium_includes_transform_buffers() {
        let prediction = predict_sizes(200_000, &WarmingConfig::default());
        for family in PoolFamily::ALL {
            assert!(
                prediction.requests.iter().any(|r| r.family == family),
                "{family} missing"
            );
        }
    }

    #[test]
    fn large_predictions_are_doubled() {
        let config = WarmingConfig::default();
        let medium = predict_sizes(999_999, &config);
        let large = predict_sizes(1_000_000, &config);
        assert_eq!(large.requests[0].count, 2 * medium.requests[0].count);
    }

    #[test]
    fn warm_below_threshold_is_noop() {
        let pools = MemoryPools::default();
        assert_eq!(warm_pools_default(&pools, 100), 0);
        assert_eq!(pools.total_pooled(), 0);
    }

    #[test]
    fn warm_medium_fills_pools() {
        let pools = MemoryPools::default();
        let added = warm_pools_default(&pools, 10_000);
        assert!(added > 0);
        assert_eq!(pools.total_pooled(), added);
    }

    #[test]
    fn warm_custom_config() {
        let pools = MemoryPools::default();
        let config = WarmingConfig {
            min_n: 10,
            medium_threshold: 50,
            large_threshold: 10_000,
        };
        assert!(warm_pools(&pools, 100, &config) > 0);
        assert!(pools.fermat_slices().total_pooled() > 0);
    }

    #[test]
    fn warming_config_default() {
        let config = WarmingConfig::default();
        assert_eq!(config.min_n, 1_000);
        assert_eq!(config.medium_threshold, 100_000);
        assert_eq!(config.large_threshold, 1_000_000);
    }
}
