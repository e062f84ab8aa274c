#![no_main]
use libfuzzer_sys::fuzz_target;
use zendib::*;

fuzz_target!(|data: &[u8]| {
    let limits = Limits {
        max_memory_bytes: Some(64 * 1024 * 1024),
        ..Default::default()
    };
    // If it reads as a DIB, re-encoding must read back to the same DIB
    let Ok(dib) = DecodeRequest::new(data)
        .with_limits(&limits)
        .decode_dib(enough::Unstoppable)
    else {
        return;
    };

    let encoded = encode_dib(&dib, enough::Unstoppable).expect("encoding a decoded DIB failed");
    let Ok(again) = decode_dib(&encoded, enough::Unstoppable) else {
        panic!("re-encoded data failed to decode");
    };
    assert_eq!(dib, again, "DIB roundtrip mismatch");

    // Both copies must decode to identical pixels, or fail identically
    let first = dib.to_bitmap(enough::Unstoppable).ok();
    let second = again.to_bitmap(enough::Unstoppable).ok();
    assert_eq!(first, second, "bitmap mismatch after roundtrip");
});
