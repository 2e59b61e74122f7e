//! Fuzz target: irrigation event-time CSV parser.
//!
//! The CSV comes straight from a user-facing configuration surface, so it
//! must be total: any byte sequence either yields in-range event times or
//! is dropped token-by-token.
//!
//! Invariants checked:
//! - No panics under any byte sequence
//! - Every parsed time is a valid minutes-since-midnight value
//!
//! cargo fuzz run fuzz_irrigation_csv

#![no_main]

use growbox::automation::parse_event_times;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = core::str::from_utf8(data) else {
        return;
    };
    for t in parse_event_times(s) {
        assert!(t < 24 * 60, "event time {} out of range", t);
    }
});
