#![no_main]
use libfuzzer_sys::fuzz_target;
use zendib::{DecodeRequest, Limits, RleDeltaMode};

fuzz_target!(|data: &[u8]| {
    // Keep huge declared dimensions from turning into huge allocations
    let limits = Limits {
        max_memory_bytes: Some(64 * 1024 * 1024),
        ..Default::default()
    };

    // Every entry point must return an error instead of panicking
    let _ = zendib::prepass(data);
    let _ = DecodeRequest::new(data)
        .with_limits(&limits)
        .decode(enough::Unstoppable);
    let _ = DecodeRequest::new(data)
        .with_limits(&limits)
        .with_rle_delta(RleDeltaMode::Fill(1))
        .decode(enough::Unstoppable);
    let _ = DecodeRequest::new(data)
        .with_limits(&limits)
        .decode_dib(enough::Unstoppable);
});
