//! Types for dynamic threshold management.

use serde::{Deserialize, Serialize};

/// Timing of one loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationMetric {
    /// Bit length of the operands in this iteration.
    pub bit_length: usize,
    /// Wall time of the iteration in nanoseconds.
    pub duration_ns: u64,
    /// Whether the products went through the FFT.
    pub used_fft: bool,
    /// Whether the products ran concurrently.
    pub used_parallel: bool,
}

impl IterationMetric {
    /// Create a metric.
    #[must_use]
    pub fn new(bit_length: usize, duration_ns: u64, used_fft: bool, used_parallel: bool) -> Self {
        Self {
            bit_length,
            duration_ns,
            used_fft,
            used_parallel,
        }
    }

    /// Duration per unit of n·log₂n work, comparable across sizes.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn normalized_cost(&self) -> f64 {
        let bits = self.bit_length.max(2) as f64;
        self.duration_ns as f64 / (bits * bits.log2())
    }
}

/// Aggregated view of the metric buffer.
///
/// A ratio above 1 means the feature was faster than going without it; it is
/// `None` when one side has no samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdStats {
    /// Samples in the buffer.
    pub sample_count: usize,
    /// Samples that used the FFT.
    pub fft_samples: usize,
    /// Samples that ran their products concurrently.
    pub parallel_samples: usize,
    /// Non-FFT cost over FFT cost.
    pub fft_ratio: Option<f64>,
    /// Sequential cost over parallel cost.
    pub parallel_ratio: Option<f64>,
}

/// Serializable snapshot of the current threshold state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSnapshot {
    /// Current parallel threshold.
    pub parallel_threshold: usize,
    /// Current FFT threshold.
    pub fft_threshold: usize,
    /// Number of adjustments made.
    pub adjustment_count: usize,
    /// Most recent adjustments, oldest first.
    pub adjustment_history: Vec<ThresholdAdjustment>,
}

/// Record of a single threshold adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdAdjustment {
    /// Which threshold was adjusted.
    pub threshold_name: String,
    /// Old value.
    pub old_value: usize,
    /// New value.
    pub new_value: usize,
    /// Speedup ratio that triggered the adjustment.
    pub trigger_ratio: f64,
}

/// Configuration for the `DynamicThresholdManager`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicThresholdConfig {
    /// Capacity of the metric ring buffer.
    pub ring_buffer_size: usize,
    /// Speedup a feature must show before its threshold moves.
    pub min_speedup: f64,
    /// Margin added to `min_speedup` to keep thresholds from oscillating.
    pub hysteresis: f64,
    /// Largest relative change per adjustment.
    pub max_adjustment: f64,
    /// Lowest FFT threshold the manager will set.
    pub fft_floor: usize,
    /// Lowest parallel threshold the manager will set.
    pub parallel_floor: usize,
}

impl Default for DynamicThresholdConfig {
    fn default() -> Self {
        Self {
            ring_buffer_size: 32,
            min_speedup: 1.1,
            hysteresis: 0.05,
            max_adjustment: 0.1,
            fft_floor: 16_384,
            parallel_floor: 512,
        }
    }
}
