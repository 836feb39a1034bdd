//! Calculation options and configuration loading.
//!
//! Options come from defaults, an optional JSON document, and `FIBCALC_*`
//! environment variables, in that order. Any multiplication threshold set to
//! 0 disables its tier.

use std::path::Path;

use fibcalc_bigfft::{available_cores, CacheConfig, FftConfig};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::calculator::FibError;
use crate::constants::{
    DEFAULT_CHECK_INTERVAL, DEFAULT_FFT_THRESHOLD, DEFAULT_INTERMEDIATE_THRESHOLD,
    DEFAULT_PARALLEL_THRESHOLD, DEFAULT_STRASSEN_THRESHOLD,
};
use crate::memory_budget::parse_memory_limit;

/// Transform cache knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheOptions {
    /// Whether forward transforms are cached at all.
    pub enabled: bool,
    /// Entries retained before LRU eviction.
    pub max_entries: usize,
    /// Operands below this many bits are never cached.
    pub min_bit_length: usize,
}

impl Default for CacheOptions {
    fn default() -> Self {
        let cache = CacheConfig::default();
        Self {
            enabled: cache.enabled,
            max_entries: cache.max_entries,
            min_bit_length: cache.min_bit_len,
        }
    }
}

impl From<CacheOptions> for CacheConfig {
    fn from(opts: CacheOptions) -> Self {
        Self {
            enabled: opts.enabled,
            max_entries: opts.max_entries,
            min_bit_len: opts.min_bit_length,
        }
    }
}

/// Runtime threshold adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicOptions {
    /// Whether the adjuster runs.
    pub enabled: bool,
    /// Iterations between two adjustment checks.
    pub check_interval: usize,
}

impl Default for DynamicOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }
}

/// Engine constants tuned per machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FftTuning {
    /// Ring width (words) below which element products use schoolbook.
    pub fermat_mul_threshold: usize,
    /// Smallest transform order whose halves may run in parallel.
    pub parallel_min_log_size: u32,
    /// Deepest transform recursion level that may still fork.
    pub parallel_max_depth: u32,
    /// Concurrent transform forks.
    pub worker_slots: usize,
}

impl Default for FftTuning {
    fn default() -> Self {
        let fft = FftConfig::default();
        Self {
            fermat_mul_threshold: fft.fermat_mul_threshold,
            parallel_min_log_size: fft.parallel_min_log_size,
            parallel_max_depth: fft.parallel_max_depth,
            worker_slots: available_cores(),
        }
    }
}

/// Options for Fibonacci calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Threshold (in bits) for running a step's multiplications concurrently.
    pub parallel_threshold: usize,
    /// Threshold (in bits) for FFT multiplication.
    pub fft_threshold: usize,
    /// Threshold (in bits) for the sub-quadratic num-bigint product.
    pub intermediate_threshold: usize,
    /// Threshold (in bits) for Strassen matrix multiplication.
    pub strassen_threshold: usize,
    /// Transform cache.
    pub cache: CacheOptions,
    /// Runtime threshold adjustment.
    pub dynamic: DynamicOptions,
    /// FFT engine tuning.
    pub fft: FftTuning,
    /// Memory limit in bytes; accepts "512M"-style strings in JSON.
    #[serde(deserialize_with = "deserialize_memory_limit")]
    pub memory_limit: Option<u64>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            fft_threshold: DEFAULT_FFT_THRESHOLD,
            intermediate_threshold: DEFAULT_INTERMEDIATE_THRESHOLD,
            strassen_threshold: DEFAULT_STRASSEN_THRESHOLD,
            cache: CacheOptions::default(),
            dynamic: DynamicOptions::default(),
            fft: FftTuning::default(),
            memory_limit: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MemoryLimitRepr {
    Bytes(u64),
    Text(String),
}

fn deserialize_memory_limit<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<MemoryLimitRepr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(MemoryLimitRepr::Bytes(b)) => Ok(Some(b)),
        Some(MemoryLimitRepr::Text(s)) => parse_memory_limit(&s)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

impl Options {
    /// Parse options from a JSON document. Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, FibError> {
        serde_json::from_str(json)
            .map_err(|e| FibError::InvalidConfiguration(format!("invalid options JSON: {e}")))
    }

    /// Read options from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, FibError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            FibError::InvalidConfiguration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&content)
    }

    /// Apply `FIBCALC_*` environment variables on top of these options.
    #[must_use]
    pub fn apply_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any `FIBCALC_*` lookup. Unparseable values are
    /// skipped with a warning.
    #[must_use]
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        override_parsed(&get, "FIBCALC_THRESHOLD", &mut self.parallel_threshold);
        override_parsed(&get, "FIBCALC_FFT_THRESHOLD", &mut self.fft_threshold);
        override_parsed(
            &get,
            "FIBCALC_INTERMEDIATE_THRESHOLD",
            &mut self.intermediate_threshold,
        );
        override_parsed(&get, "FIBCALC_STRASSEN_THRESHOLD", &mut self.strassen_threshold);
        override_bool(&get, "FIBCALC_CACHE_ENABLED", &mut self.cache.enabled);
        override_parsed(&get, "FIBCALC_CACHE_MAX_ENTRIES", &mut self.cache.max_entries);
        override_parsed(&get, "FIBCALC_CACHE_MIN_BITS", &mut self.cache.min_bit_length);
        override_bool(&get, "FIBCALC_DYNAMIC_THRESHOLDS", &mut self.dynamic.enabled);
        override_parsed(&get, "FIBCALC_DYNAMIC_INTERVAL", &mut self.dynamic.check_interval);

        if let Some(raw) = get("FIBCALC_MEMORY_LIMIT") {
            match parse_memory_limit(&raw) {
                Ok(limit) => self.memory_limit = Some(limit),
                Err(e) => warn!(key = "FIBCALC_MEMORY_LIMIT", value = %raw, error = %e, "ignoring override"),
            }
        }
        self
    }

    /// Reject option combinations the engine cannot run with.
    pub fn validate(&self) -> Result<(), FibError> {
        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err(FibError::InvalidConfiguration(
                "cache.max_entries must be positive when the cache is enabled".into(),
            ));
        }
        if self.dynamic.enabled && self.dynamic.check_interval == 0 {
            return Err(FibError::InvalidConfiguration(
                "dynamic.check_interval must be positive when adjustment is enabled".into(),
            ));
        }
        if self.fft.worker_slots == 0 {
            return Err(FibError::InvalidConfiguration(
                "fft.worker_slots must be at least 1".into(),
            ));
        }
        if self.fft.fermat_mul_threshold == 0 {
            return Err(FibError::InvalidConfiguration(
                "fft.fermat_mul_threshold must be at least 1".into(),
            ));
        }
        if self.fft_threshold > 0
            && self.intermediate_threshold > 0
            && self.fft_threshold < self.intermediate_threshold
        {
            return Err(FibError::InvalidConfiguration(format!(
                "fft_threshold ({}) is below intermediate_threshold ({})",
                self.fft_threshold, self.intermediate_threshold
            )));
        }
        Ok(())
    }

    /// The memory limit, with 0 meaning unlimited.
    #[must_use]
    pub fn effective_memory_limit(&self) -> Option<u64> {
        self.memory_limit.filter(|&l| l > 0)
    }

    /// Engine configuration for a multiplication context built from these options.
    #[must_use]
    pub fn fft_config(&self) -> FftConfig {
        FftConfig {
            fermat_mul_threshold: self.fft.fermat_mul_threshold,
            parallel_min_log_size: self.fft.parallel_min_log_size,
            parallel_max_depth: self.fft.parallel_max_depth,
            worker_slots: self.fft.worker_slots,
            cache: self.cache.into(),
            ..FftConfig::default()
        }
    }
}

fn override_parsed<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) {
    let Some(raw) = get(key) else { return };
    match raw.trim().parse() {
        Ok(v) => *target = v,
        Err(_) => warn!(key, value = %raw, "ignoring unparseable override"),
    }
}

fn override_bool(get: &impl Fn(&str) -> Option<String>, key: &str, target: &mut bool) {
    let Some(raw) = get(key) else { return };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => *target = true,
        "false" | "0" | "no" => *target = false,
        _ => warn!(key, value = %raw, "ignoring unparseable boolean override"),
    }
}
