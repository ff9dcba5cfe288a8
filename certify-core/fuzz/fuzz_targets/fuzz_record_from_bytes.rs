#![no_main]

//! Fuzz target for CanonicalRecord::from_bytes()
//!
//! Any input that parses must re-serialize to exactly the same bytes and
//! therefore fingerprint to the hash of the input.
//!
//! Run with: cargo +nightly fuzz run fuzz_record_from_bytes

use certify_core::{CanonicalRecord, Fingerprint};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(record) = CanonicalRecord::from_bytes(data) {
        let bytes = record.to_bytes().expect("parsed record serializes");
        assert_eq!(bytes, data);
        assert_eq!(
            record.fingerprint().expect("fingerprint"),
            Fingerprint::of_bytes(data)
        );
    }
});
