//! Fuzz target for the Content-Disposition filename parser.
//!
//! Run with: cargo +nightly fuzz run disposition_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use sorteio_core::parse_disposition_filename;

fuzz_target!(|data: &[u8]| {
    if let Ok(header) = std::str::from_utf8(data) {
        if let Some(filename) = parse_disposition_filename(header) {
            assert!(!filename.is_empty());
            assert!(!filename.contains('/'));
            assert!(!filename.contains('\\'));
        }
    }
});
