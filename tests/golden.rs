//! Golden file integration tests.
//!
//! Reads tests/testdata/fibonacci_golden.json and verifies all 3 algorithms
//! produce the correct values for known Fibonacci numbers.

use std::sync::Arc;
use std::time::Duration;

use num_bigint::BigUint;

use fibcalc_core::calculator::{Calculator, CoreCalculator, FibError};
use fibcalc_core::context::CalcContext;
use fibcalc_core::fastdoubling::OptimizedFastDoubling;
use fibcalc_core::fft_based::FftBasedCalculator;
use fibcalc_core::matrix::MatrixExponentiation;
use fibcalc_core::observers::NoOpObserver;
use fibcalc_core::options::Options;
use fibcalc_core::progress::CancellationToken;
use fibcalc_core::registry::{CalculatorFactory, DefaultFactory};
use fibcalc_tests::load_golden_data;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn core_algorithms(ctx: &Arc<CalcContext>) -> Vec<Box<dyn CoreCalculator>> {
    vec![
        Box::new(OptimizedFastDoubling::new(Arc::clone(ctx))),
        Box::new(MatrixExponentiation::new(Arc::clone(ctx))),
        Box::new(FftBasedCalculator::new(Arc::clone(ctx))),
    ]
}

fn compute_with_core(core: &dyn CoreCalculator, n: u64) -> BigUint {
    let cancel = CancellationToken::new();
    let observer = NoOpObserver::new();
    core.calculate_core(&cancel, &observer, 0, n, &Options::default())
        .unwrap()
}

fn compute_with_calculator(calc: &dyn Calculator, n: u64) -> BigUint {
    let cancel = CancellationToken::new();
    let observer = NoOpObserver::new();
    calc.calculate(&cancel, &observer, 0, n, &Options::default())
        .unwrap()
}

// ---------------------------------------------------------------------------
// Golden: exact values
// ---------------------------------------------------------------------------

#[test]
fn golden_exact_core_algorithms() {
    let ctx = Arc::new(CalcContext::default());
    let data = load_golden_data().unwrap();
    for algo in core_algorithms(&ctx) {
        for entry in &data.values {
            if let Some(expected) = &entry.fib {
                let result = compute_with_core(algo.as_ref(), entry.n);
                assert_eq!(
                    result.to_string(),
                    *expected,
                    "{} mismatch at n={}",
                    algo.name(),
                    entry.n,
                );
            }
        }
    }
}

#[test]
fn golden_via_factory() {
    let factory = DefaultFactory::default();
    let data = load_golden_data().unwrap();
    for name in factory.available() {
        let calc = factory.get(name).unwrap();
        for entry in &data.values {
            if let Some(expected) = &entry.fib {
                let result = compute_with_calculator(calc.as_ref(), entry.n);
                assert_eq!(result.to_string(), *expected, "{name} mismatch at n={}", entry.n);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Golden: prefix, suffix & digit count
// ---------------------------------------------------------------------------

#[test]
fn golden_prefix_and_digits() {
    let ctx = Arc::new(CalcContext::default());
    let data = load_golden_data().unwrap();
    for algo in core_algorithms(&ctx) {
        for entry in &data.values {
            if entry.n > 25_000 || entry.fib.is_some() {
                continue;
            }
            let s = compute_with_core(algo.as_ref(), entry.n).to_string();
            entry.check(&s).unwrap_or_else(|e| panic!("{}: {e}", algo.name()));
        }
    }
}

#[test]
#[ignore]
fn golden_large_n_100000() {
    let ctx = Arc::new(CalcContext::default());
    let data = load_golden_data().unwrap();
    for algo in core_algorithms(&ctx) {
        for entry in data.values.iter().filter(|e| e.n == 100_000) {
            let s = compute_with_core(algo.as_ref(), entry.n).to_string();
            entry.check(&s).unwrap_or_else(|e| panic!("{}: {e}", algo.name()));
        }
    }
}

// ---------------------------------------------------------------------------
// Edge cases: boundary values
// ---------------------------------------------------------------------------

#[test]
fn edge_cases_small_indices() {
    let ctx = Arc::new(CalcContext::default());
    for algo in core_algorithms(&ctx) {
        assert_eq!(compute_with_core(algo.as_ref(), 0), BigUint::ZERO, "{}", algo.name());
        assert_eq!(compute_with_core(algo.as_ref(), 1), BigUint::from(1u8), "{}", algo.name());
        assert_eq!(compute_with_core(algo.as_ref(), 2), BigUint::from(1u8), "{}", algo.name());
    }
}

#[test]
fn edge_case_n93_fast_path_boundary() {
    let factory = DefaultFactory::default();
    let calc = factory.get("fast").unwrap();
    let result = compute_with_calculator(calc.as_ref(), 93);
    assert_eq!(result, BigUint::from(12_200_160_415_121_876_738u64));
}

#[test]
fn edge_case_n94_first_big_number() {
    let ctx = Arc::new(CalcContext::default());
    let expected = BigUint::parse_bytes(b"19740274219868223167", 10).unwrap();
    for algo in core_algorithms(&ctx) {
        assert_eq!(compute_with_core(algo.as_ref(), 94), expected, "{}", algo.name());
    }
    let factory = DefaultFactory::new(ctx);
    let calc = factory.get("fast").unwrap();
    assert_eq!(compute_with_calculator(calc.as_ref(), 94), expected);
}

#[test]
fn edge_case_large_n_with_timeout() {
    // n=100000 should complete within 30 seconds
    let algo = OptimizedFastDoubling::new(Arc::new(CalcContext::default()));
    let cancel = CancellationToken::new();
    let observer = NoOpObserver::new();

    let cancel_clone = cancel.clone();
    let timeout_handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_secs(30));
        cancel_clone.cancel();
    });

    let result = algo.calculate_core(&cancel, &observer, 0, 100_000, &Options::default());
    assert!(result.is_ok(), "F(100000) computation failed or timed out");
    assert_eq!(result.unwrap().to_string().len(), 20899);

    // The watchdog thread is detached; it only flips a token nobody reads.
    drop(timeout_handle);
}

// ---------------------------------------------------------------------------
// Cancellation and configuration errors
// ---------------------------------------------------------------------------

#[test]
fn edge_case_cancellation() {
    let ctx = Arc::new(CalcContext::default());
    let cancel = CancellationToken::new();
    cancel.cancel();
    for algo in core_algorithms(&ctx) {
        let result =
            algo.calculate_core(&cancel, &NoOpObserver::new(), 0, 10_000, &Options::default());
        assert!(matches!(result, Err(FibError::Cancelled)), "{}", algo.name());
    }
    let calc = DefaultFactory::default().get("matrix").unwrap();
    let result = calc.calculate(&cancel, &NoOpObserver::new(), 0, 10_000, &Options::default());
    assert!(matches!(result, Err(FibError::Cancelled)));
}

#[test]
fn memory_limit_rejects_large_index() {
    let calc = DefaultFactory::default().get("fast").unwrap();
    let opts = Options {
        memory_limit: Some(1024),
        ..Options::default()
    };
    let cancel = CancellationToken::new();
    let result = calc.calculate(&cancel, &NoOpObserver::new(), 0, 1_000_000, &opts);
    assert!(matches!(result, Err(FibError::InvalidConfiguration(_))));
}

#[test]
fn invalid_options_are_rejected() {
    let calc = DefaultFactory::default().get("fast").unwrap();
    let mut opts = Options::default();
    opts.cache.max_entries = 0;
    let result = calc.calculate(&CancellationToken::new(), &NoOpObserver::new(), 0, 500, &opts);
    assert!(matches!(result, Err(FibError::InvalidConfiguration(_))));
}

// ---------------------------------------------------------------------------
// Cross-algorithm agreement
// ---------------------------------------------------------------------------

#[test]
fn all_algorithms_agree_medium_values() {
    let ctx = Arc::new(CalcContext::default());
    let algos = core_algorithms(&ctx);
    for n in [94, 100, 200, 300, 500, 1000, 2000, 5000, 12_345] {
        let reference = compute_with_core(algos[0].as_ref(), n);
        for algo in &algos[1..] {
            assert_eq!(
                compute_with_core(algo.as_ref(), n),
                reference,
                "{} disagrees at n={n}",
                algo.name()
            );
        }
    }
}
