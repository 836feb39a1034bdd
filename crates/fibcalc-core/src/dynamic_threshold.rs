//! Runtime threshold adjustment.
//!
//! Iteration timings go into a fixed ring buffer. On each check the
//! manager compares the normalized cost of iterations that used a feature
//! (FFT, concurrent products) against those that did not, and moves the
//! feature's threshold only when the speedup ratio clears
//! `min_speedup + hysteresis` in either direction.

use tracing::debug;

use crate::constants::{DEFAULT_FFT_THRESHOLD, DEFAULT_PARALLEL_THRESHOLD};
use crate::threshold_types::{
    DynamicThresholdConfig, IterationMetric, ThresholdAdjustment, ThresholdSnapshot, ThresholdStats,
};

/// Adjustments kept in the history.
const MAX_HISTORY: usize = 64;

/// Manager for dynamically adjusting multiplication thresholds.
pub struct DynamicThresholdManager {
    config: DynamicThresholdConfig,
    metrics: Vec<IterationMetric>,
    ring_pos: usize,
    ring_full: bool,
    initial_parallel: usize,
    initial_fft: usize,
    current_parallel: usize,
    current_fft: usize,
    adjustment_count: usize,
    adjustment_history: Vec<ThresholdAdjustment>,
}

impl DynamicThresholdManager {
    /// Create a manager starting from the given thresholds.
    #[must_use]
    pub fn new(config: DynamicThresholdConfig, parallel: usize, fft: usize) -> Self {
        let ring_size = config.ring_buffer_size.max(1);
        Self {
            config,
            metrics: Vec::with_capacity(ring_size),
            ring_pos: 0,
            ring_full: false,
            initial_parallel: parallel,
            initial_fft: fft,
            current_parallel: parallel,
            current_fft: fft,
            adjustment_count: 0,
            adjustment_history: Vec::new(),
        }
    }

    /// Record a metric from an iteration, overwriting the oldest when full.
    pub fn record(&mut self, metric: IterationMetric) {
        let ring_size = self.config.ring_buffer_size.max(1);
        if self.metrics.len() < ring_size {
            self.metrics.push(metric);
        } else {
            self.metrics[self.ring_pos] = metric;
            self.ring_full = true;
        }
        self.ring_pos = (self.ring_pos + 1) % ring_size;
    }

    /// Get the number of recorded metrics.
    #[must_use]
    pub fn metric_count(&self) -> usize {
        self.metrics.len()
    }

    /// Re-evaluate both thresholds. Returns `true` if either moved.
    ///
    /// A disabled threshold (0) is never touched.
    pub fn adjust(&mut self) -> bool {
        if self.metrics.is_empty() {
            return false;
        }
        let stats = self.compute_stats();
        let mut changed = false;

        if let Some(ratio) = stats.fft_ratio {
            if let Some(next) = self.next_value(self.current_fft, ratio, self.config.fft_floor) {
                let old = std::mem::replace(&mut self.current_fft, next);
                self.record_adjustment("fft", old, next, ratio);
                changed = true;
            }
        }
        if let Some(ratio) = stats.parallel_ratio {
            if let Some(next) =
                self.next_value(self.current_parallel, ratio, self.config.parallel_floor)
            {
                let old = std::mem::replace(&mut self.current_parallel, next);
                self.record_adjustment("parallel", old, next, ratio);
                changed = true;
            }
        }
        changed
    }

    // Lower the threshold when the feature pays off, raise it when it hurts.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn next_value(&self, current: usize, ratio: f64, floor: usize) -> Option<usize> {
        if current == 0 || ratio <= 0.0 {
            return None;
        }
        let gate = self.config.min_speedup + self.config.hysteresis;
        let step = self.config.max_adjustment.clamp(0.0, 0.5);
        let next = if ratio > gate {
            ((current as f64 * (1.0 - step)) as usize).max(floor)
        } else if ratio.recip() > gate {
            (current as f64 * (1.0 + step)) as usize
        } else {
            return None;
        };
        (next != current).then_some(next)
    }

    fn record_adjustment(&mut self, name: &str, old: usize, new: usize, ratio: f64) {
        debug!(threshold = name, old, new, ratio, "threshold adjusted");
        self.adjustment_count += 1;
        self.adjustment_history.push(ThresholdAdjustment {
            threshold_name: name.to_string(),
            old_value: old,
            new_value: new,
            trigger_ratio: ratio,
        });
        if self.adjustment_history.len() > MAX_HISTORY {
            self.adjustment_history.remove(0);
        }
    }

    fn compute_stats(&self) -> ThresholdStats {
        let fft = class_ratio(&self.metrics, |m| m.used_fft);
        let parallel = class_ratio(&self.metrics, |m| m.used_parallel);
        ThresholdStats {
            sample_count: self.metrics.len(),
            fft_samples: fft.1,
            parallel_samples: parallel.1,
            fft_ratio: fft.0,
            parallel_ratio: parallel.0,
        }
    }

    /// Get current parallel threshold.
    #[must_use]
    pub fn parallel_threshold(&self) -> usize {
        self.current_parallel
    }

    /// Get current FFT threshold.
    #[must_use]
    pub fn fft_threshold(&self) -> usize {
        self.current_fft
    }

    /// Get a serializable snapshot of current thresholds and history.
    #[must_use]
    pub fn snapshot(&self) -> ThresholdSnapshot {
        ThresholdSnapshot {
            parallel_threshold: self.current_parallel,
            fft_threshold: self.current_fft,
            adjustment_count: self.adjustment_count,
            adjustment_history: self.adjustment_history.clone(),
        }
    }

    /// Get computed statistics from the current metrics buffer.
    #[must_use]
    pub fn stats(&self) -> Option<ThresholdStats> {
        if self.metrics.is_empty() {
            return None;
        }
        Some(self.compute_stats())
    }

    /// Clear all metrics and history and return to the starting thresholds.
    pub fn reset(&mut self) {
        self.metrics.clear();
        self.ring_pos = 0;
        self.ring_full = false;
        self.current_parallel = self.initial_parallel;
        self.current_fft = self.initial_fft;
        self.adjustment_count = 0;
        self.adjustment_history.clear();
    }

    /// Whether the ring buffer is full (has wrapped around at least once).
    #[must_use]
    pub fn is_ring_full(&self) -> bool {
        self.ring_full
    }

    /// Number of threshold adjustments made so far.
    #[must_use]
    pub fn adjustment_count(&self) -> usize {
        self.adjustment_count
    }
}

impl Default for DynamicThresholdManager {
    fn default() -> Self {
        Self::new(
            DynamicThresholdConfig::default(),
            DEFAULT_PARALLEL_THRESHOLD,
            DEFAULT_FFT_THRESHOLD,
        )
    }
}

/// Cost without the feature over cost with it, and the number of samples
/// that used it.
#[allow(clippy::cast_precision_loss)]
fn class_ratio(
    metrics: &[IterationMetric],
    uses: impl Fn(&IterationMetric) -> bool,
) -> (Option<f64>, usize) {
    let (mut with, mut with_n, mut without, mut without_n) = (0.0, 0usize, 0.0, 0usize);
    for m in metrics {
        if uses(m) {
            with += m.normalized_cost();
            with_n += 1;
        } else {
            without += m.normalized_cost();
            without_n += 1;
        }
    }
    if with_n == 0 || without_n == 0 || with <= 0.0 {
        return (None, with_n);
    }
    let ratio = (without / without_n as f64) / (with / with_n as f64);
    (Some(ratio), with_n)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BITS: usize = 1 << 20;

    fn metric(cost: u64, fft: bool, parallel: bool) -> IterationMetric {
        // BITS·log2(BITS) = 20·2^20, so `cost` is the normalized cost.
        IterationMetric::new(BITS, cost * 20 * BITS as u64, fft, parallel)
    }

    fn manager(ring: usize) -> DynamicThresholdManager {
        let config = DynamicThresholdConfig {
            ring_buffer_size: ring,
            ..DynamicThresholdConfig::default()
        };
        DynamicThresholdManager::new(config, 100_000, 1_000_000)
    }

    #[test]
    fn default_thresholds() {
        let mgr = DynamicThresholdManager::default();
        assert_eq!(mgr.parallel_threshold(), DEFAULT_PARALLEL_THRESHOLD);
        assert_eq!(mgr.fft_threshold(), DEFAULT_FFT_THRESHOLD);
        assert!(mgr.stats().is_none());
    }

    #[test]
    fn faster_fft_lowers_threshold() {
        let mut mgr = manager(8);
        mgr.record(metric(10, false, false));
        mgr.record(metric(5, true, false));
        assert!(mgr.adjust());
        assert_eq!(mgr.fft_threshold(), 900_000);
        // No parallel samples: parallel threshold untouched.
        assert_eq!(mgr.parallel_threshold(), 100_000);
    }

    #[test]
    fn slower_parallel_raises_threshold() {
        let mut mgr = manager(8);
        mgr.record(metric(10, false, false));
        mgr.record(metric(20, false, true));
        assert!(mgr.adjust());
        assert_eq!(mgr.parallel_threshold(), 110_000);
        assert_eq!(mgr.fft_threshold(), 1_000_000);
    }

    #[test]
    fn hysteresis_blocks_small_differences() {
        let mut mgr = manager(8);
        // Ratio 1.1 sits under 1.1 + 0.05.
        mgr.record(metric(110, false, false));
        mgr.record(metric(100, true, true));
        assert!(!mgr.adjust());
        assert_eq!(mgr.adjustment_count(), 0);
        assert_eq!(mgr.fft_threshold(), 1_000_000);
    }

    #[test]
    fn one_sided_samples_do_not_adjust() {
        let mut mgr = manager(8);
        for _ in 0..4 {
            mgr.record(metric(10, true, true));
        }
        assert!(!mgr.adjust());
        let stats = mgr.stats().unwrap();
        assert_eq!(stats.sample_count, 4);
        assert_eq!(stats.fft_samples, 4);
        assert!(stats.fft_ratio.is_none());
    }

    #[test]
    fn disabled_threshold_stays_disabled() {
        let mut mgr = DynamicThresholdManager::new(DynamicThresholdConfig::default(), 0, 0);
        mgr.record(metric(10, false, false));
        mgr.record(metric(1, true, true));
        assert!(!mgr.adjust());
        assert_eq!(mgr.fft_threshold(), 0);
        assert_eq!(mgr.parallel_threshold(), 0);
    }

    #[test]
    fn floors_hold() {
        let config = DynamicThresholdConfig {
            max_adjustment: 0.5,
            ..DynamicThresholdConfig::default()
        };
        let mut mgr = DynamicThresholdManager::new(config, 600, 20_000);
        mgr.record(metric(10, false, false));
        mgr.record(metric(1, true, true));
        for _ in 0..10 {
            mgr.adjust();
        }
        assert_eq!(mgr.fft_threshold(), 16_384);
        assert_eq!(mgr.parallel_threshold(), 512);
        // Pinned at the floor: further checks change nothing.
        assert!(!mgr.adjust());
    }

    #[test]
    fn ring_buffer_wraps() {
        let mut mgr = manager(4);
        for _ in 0..4 {
            mgr.record(metric(10, false, false));
        }
        assert_eq!(mgr.metric_count(), 4);
        assert!(!mgr.is_ring_full());
        mgr.record(metric(10, true, false));
        assert_eq!(mgr.metric_count(), 4);
        assert!(mgr.is_ring_full());
        assert_eq!(mgr.stats().unwrap().fft_samples, 1);
    }

    #[test]
    fn history_is_capped() {
        let mut mgr =
            DynamicThresholdManager::new(DynamicThresholdConfig::default(), 0, usize::MAX / 4);
        mgr.record(metric(10, false, false));
        mgr.record(metric(1, true, false));
        for _ in 0..100 {
            mgr.adjust();
        }
        let snap = mgr.snapshot();
        assert_eq!(snap.adjustment_count, 100);
        assert_eq!(snap.adjustment_history.len(), MAX_HISTORY);
        assert!(snap.adjustment_history.iter().all(|a| a.threshold_name == "fft"));
    }

    #[test]
    fn reset_restores_start() {
        let mut mgr = manager(8);
        mgr.record(metric(10, false, false));
        mgr.record(metric(1, true, true));
        mgr.adjust();
        assert_ne!(mgr.fft_threshold(), 1_000_000);

        mgr.reset();
        assert_eq!(mgr.fft_threshold(), 1_000_000);
        assert_eq!(mgr.parallel_threshold(), 100_000);
        assert_eq!(mgr.metric_count(), 0);
        assert_eq!(mgr.adjustment_count(), 0);
        assert!(mgr.snapshot().adjustment_history.is_empty());
    }
}
