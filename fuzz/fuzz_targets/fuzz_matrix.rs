#![no_main]

use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

use fibcalc_core::calculator::{Calculator, FibCalculator};
use fibcalc_core::context::CalcContext;
use fibcalc_core::matrix::MatrixExponentiation;
use fibcalc_core::observers::NoOpObserver;
use fibcalc_core::options::Options;
use fibcalc_core::progress::CancellationToken;

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }
    // Use first 4 bytes as n, capped at 50000 for speed
    let n = u64::from(u32::from_le_bytes([data[0], data[1], data[2], data[3]])) % 50_000;
    let strassen_threshold = data.get(4).map_or(0, |b| usize::from(*b) * 16);

    let calc = FibCalculator::new(Arc::new(MatrixExponentiation::new(Arc::new(
        CalcContext::default(),
    ))));
    let opts = Options {
        strassen_threshold,
        ..Options::default()
    };
    let f_n = calc
        .calculate(&CancellationToken::new(), &NoOpObserver::new(), 0, n, &opts)
        .unwrap();
    let f_n1 = calc
        .calculate(&CancellationToken::new(), &NoOpObserver::new(), 0, n + 1, &opts)
        .unwrap();
    let f_n2 = calc
        .calculate(&CancellationToken::new(), &NoOpObserver::new(), 0, n + 2, &opts)
        .unwrap();
    assert_eq!(f_n + f_n1, f_n2);
});
