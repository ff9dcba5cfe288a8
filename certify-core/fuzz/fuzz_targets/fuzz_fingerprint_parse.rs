#![no_main]

//! Fuzz target for Fingerprint::parse()
//!
//! Parsing arbitrary user input must never panic, and accepted input must
//! round-trip to its lowercase form.
//!
//! Run with: cargo +nightly fuzz run fuzz_fingerprint_parse

use certify_core::Fingerprint;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(fingerprint) = Fingerprint::parse(input) {
        assert_eq!(fingerprint.to_hex(), input.trim().to_ascii_lowercase());
    }
});
