#![no_main]

use libfuzzer_sys::fuzz_target;
use num_bigint::BigUint;
use std::sync::OnceLock;

use fibcalc_bigfft::FftContext;

fn context() -> &'static FftContext {
    static CTX: OnceLock<FftContext> = OnceLock::new();
    CTX.get_or_init(FftContext::default)
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let split = usize::from(data[0]) % data.len();
    let (a, b) = data[1..].split_at(split);
    let a = BigUint::from_bytes_le(a);
    let b = BigUint::from_bytes_le(b);

    let ctx = context();
    assert_eq!(ctx.multiply(&a, &b).unwrap(), &a * &b);
    assert_eq!(ctx.square(&a).unwrap(), &a * &a);
});
