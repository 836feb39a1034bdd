#![no_main]

use libfuzzer_sys::fuzz_target;
use std::sync::{Arc, OnceLock};

use fibcalc_core::calculator::Calculator;
use fibcalc_core::context::CalcContext;
use fibcalc_core::observers::NoOpObserver;
use fibcalc_core::options::Options;
use fibcalc_core::progress::CancellationToken;
use fibcalc_core::registry::{CalculatorFactory, DefaultFactory};

fn factory() -> &'static DefaultFactory {
    static FACTORY: OnceLock<DefaultFactory> = OnceLock::new();
    FACTORY.get_or_init(|| DefaultFactory::new(Arc::new(CalcContext::default())))
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 6 {
        return;
    }
    // First 4 bytes pick n (capped for speed), the next two scale thresholds
    // so that every multiplication tier gets exercised.
    let n = u64::from(u32::from_le_bytes([data[0], data[1], data[2], data[3]])) % 10_000;
    let fft_threshold = usize::from(data[4]) * 64;
    let intermediate_threshold = (usize::from(data[5]) * 16).min(fft_threshold);
    let opts = Options {
        fft_threshold,
        intermediate_threshold,
        strassen_threshold: usize::from(data[5]) * 32,
        parallel_threshold: usize::from(data[4]) * 128,
        ..Options::default()
    };

    let cancel = CancellationToken::new();
    let observer = NoOpObserver::new();
    let mut results = Vec::new();
    for name in ["fast", "matrix", "fft"] {
        let calc = factory().get(name).unwrap();
        results.push(calc.calculate(&cancel, &observer, 0, n, &opts).unwrap());
    }
    assert_eq!(results[0], results[1], "FastDoubling != Matrix at n={n}");
    assert_eq!(results[0], results[2], "FastDoubling != FFT at n={n}");
});
