//! Memory budget estimation and validation.

use std::fmt;

use crate::calculator::FibError;
use crate::constants::BITS_PER_INDEX;

/// Memory estimate for a Fibonacci computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryEstimate {
    /// The five state integers of a doubling calculation.
    pub state_bytes: u64,
    /// Bump arena and transform buffers.
    pub fft_buffer_bytes: u64,
    /// Transform cache.
    pub cache_bytes: u64,
    /// Allocator and runtime overhead.
    pub overhead_bytes: u64,
    /// Sum of the above.
    pub total_bytes: u64,
}

impl MemoryEstimate {
    /// Estimate memory usage for computing F(n).
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn estimate(n: u64) -> Self {
        let bits = n as f64 * BITS_PER_INDEX;
        let words = (bits / 64.0) as u64 + 1;
        let per_fib = words * 8;

        let state_bytes = per_fib * 5;
        let fft_buffer_bytes = per_fib * 3;
        let cache_bytes = per_fib * 2;
        let overhead_bytes = per_fib;
        Self {
            state_bytes,
            fft_buffer_bytes,
            cache_bytes,
            overhead_bytes,
            total_bytes: state_bytes + fft_buffer_bytes + cache_bytes + overhead_bytes,
        }
    }

    /// Check if the computation fits within the given memory limit.
    ///
    /// `None` means unlimited (always fits).
    #[must_use]
    pub fn fits_in(&self, limit: Option<u64>) -> bool {
        match limit {
            None => true,
            Some(l) => self.total_bytes <= l,
        }
    }
}

impl fmt::Display for MemoryEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "State: {}, FFT: {}, Cache: {}, Overhead: {}, Total: {}",
            format_bytes(self.state_bytes),
            format_bytes(self.fft_buffer_bytes),
            format_bytes(self.cache_bytes),
            format_bytes(self.overhead_bytes),
            format_bytes(self.total_bytes),
        )
    }
}

/// Estimate memory usage for computing F(n).
#[must_use]
pub fn estimate_memory_usage(n: u64) -> MemoryEstimate {
    MemoryEstimate::estimate(n)
}

/// Human-readable byte count in B, KB, MB or GB.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    match bytes {
        b if b >= GB => format!("{:.1} GB", b as f64 / GB as f64),
        b if b >= MB => format!("{:.1} MB", b as f64 / MB as f64),
        b if b >= KB => format!("{:.1} KB", b as f64 / KB as f64),
        b => format!("{b} B"),
    }
}

/// Parse a memory limit such as "8G", "512M", "1024K" or "4096".
///
/// # Errors
///
/// `InvalidConfiguration` for an empty string, an unknown format or an
/// overflowing value.
pub fn parse_memory_limit(s: &str) -> Result<u64, FibError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(FibError::InvalidConfiguration("empty memory limit".into()));
    }

    let (digits, multiplier) = match s.as_bytes()[s.len() - 1] {
        b'K' | b'k' => (&s[..s.len() - 1], 1024),
        b'M' | b'm' => (&s[..s.len() - 1], 1024 * 1024),
        b'G' | b'g' => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        b'B' | b'b' => (&s[..s.len() - 1], 1),
        _ => (s, 1u64),
    };

    let value: u64 = digits.trim().parse().map_err(|e| {
        FibError::InvalidConfiguration(format!("invalid memory limit {s:?}: {e}"))
    })?;
    value
        .checked_mul(multiplier)
        .ok_or_else(|| FibError::InvalidConfiguration(format!("memory limit {s:?} overflows")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_small() {
        let est = MemoryEstimate::estimate(100);
        assert!(est.state_bytes > 0);
        assert!(est.total_bytes > est.state_bytes);
    }

    #[test]
    fn estimate_component_ratios() {
        let est = MemoryEstimate::estimate(10_000_000);
        // F(10M) has about 6.94M bits, roughly 108k words.
        let per_fib = est.overhead_bytes;
        assert!((108_000 * 8..109_000 * 8).contains(&per_fib));
        assert_eq!(est.state_bytes, 5 * per_fib);
        assert_eq!(est.fft_buffer_bytes, 3 * per_fib);
        assert_eq!(est.cache_bytes, 2 * per_fib);
        assert_eq!(est.total_bytes, 11 * per_fib);
    }

    #[test]
    fn fits_in_limits() {
        let est = MemoryEstimate::estimate(100_000_000);
        assert!(est.fits_in(None));
        assert!(!est.fits_in(Some(1024)));
        assert!(est.fits_in(Some(est.total_bytes)));
    }

    #[test]
    fn parse_memory_limit_values() {
        assert_eq!(parse_memory_limit("8G").unwrap(), 8 * 1024 * 1024 * 1024);
        assert_eq!(parse_memory_limit("512M").unwrap(), 512 * 1024 * 1024);
        assert_eq!(parse_memory_limit("512m").unwrap(), 512 * 1024 * 1024);
        assert_eq!(parse_memory_limit("1024K").unwrap(), 1024 * 1024);
        assert_eq!(parse_memory_limit(" 4096 ").unwrap(), 4096);
    }

    #[test]
    fn parse_memory_limit_invalid() {
        assert!(parse_memory_limit("abc").is_err());
        assert!(parse_memory_limit("").is_err());
        assert!(parse_memory_limit("G").is_err());
        assert!(parse_memory_limit("99999999999999999999G").is_err());
    }

    #[test]
    fn display_formats_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.0 GB");
        let text = MemoryEstimate::estimate(1_000_000).to_string();
        assert!(text.starts_with("State: "));
        assert!(text.contains("Total: "));
    }
}
