//! Fuzz target for reference classification.
//!
//! Run with: cargo +nightly fuzz run classify_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use sorteio_core::{is_valid_filename, Classification, ReferenceClassifier};

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    let classifier = ReferenceClassifier::default();
    match classifier.classify(input) {
        Classification::Absent => assert!(input.trim().is_empty()),
        Classification::Direct(url) => assert_eq!(url, input.trim()),
        Classification::Candidate { reference, filename } => {
            assert_eq!(reference, input.trim());
            assert!(is_valid_filename(&filename));
            assert!(!filename.contains('/') && !filename.contains('\\'));
            // Candidates are stable under re-classification.
            assert_eq!(classifier.candidate_segment(&filename), Some(filename.clone()));
        }
        Classification::Unresolvable { reference } => {
            assert_eq!(classifier.candidate_segment(&reference), None);
        }
    }
});
