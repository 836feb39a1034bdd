//! Shared fixtures for the workspace integration tests.

use std::path::Path;
use std::sync::Once;

use anyhow::Context;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

/// Contents of `tests/testdata/fibonacci_golden.json`.
#[derive(Debug, Deserialize)]
pub struct GoldenData {
    /// Free-form note about where the values come from.
    pub description: String,
    /// Reference entries, exact or abbreviated.
    pub values: Vec<GoldenEntry>,
}

/// One reference value. Small indices carry the exact decimal string,
/// large ones only its leading and trailing digits and its length.
#[derive(Debug, Deserialize)]
pub struct GoldenEntry {
    pub n: u64,
    #[serde(default)]
    pub fib: Option<String>,
    #[serde(default)]
    pub fib_prefix: Option<String>,
    #[serde(default)]
    pub fib_suffix: Option<String>,
    #[serde(default)]
    pub fib_digits: Option<usize>,
}

impl GoldenEntry {
    /// Check a decimal rendering of F(n) against this entry.
    pub fn check(&self, decimal: &str) -> anyhow::Result<()> {
        if let Some(exact) = &self.fib {
            anyhow::ensure!(decimal == exact, "F({}) = {decimal}, expected {exact}", self.n);
        }
        if let Some(prefix) = &self.fib_prefix {
            anyhow::ensure!(
                decimal.starts_with(prefix.as_str()),
                "F({}) starts with {}, expected {prefix}",
                self.n,
                &decimal[..prefix.len().min(decimal.len())]
            );
        }
        if let Some(suffix) = &self.fib_suffix {
            anyhow::ensure!(
                decimal.ends_with(suffix.as_str()),
                "F({}) does not end with {suffix}",
                self.n
            );
        }
        if let Some(digits) = self.fib_digits {
            anyhow::ensure!(
                decimal.len() == digits,
                "F({}) has {} digits, expected {digits}",
                self.n,
                decimal.len()
            );
        }
        Ok(())
    }
}

/// Load the golden file shipped with the tests.
pub fn load_golden_data() -> anyhow::Result<GoldenData> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/testdata/fibonacci_golden.json");
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Route `tracing` output to the test harness, filtered by `RUST_LOG`.
pub fn init_test_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}
