//! Property tests for the parsing and timing primitives.
//!
//! Runs on host (x86_64) only — proptest is not available for ESP32
//! targets.  On ESP32, these tests are compiled out.

#![cfg(not(target_os = "espidf"))]

use growbox::app::ports::wrap_deadline_reached;
use growbox::automation::parse_event_times;
use proptest::prelude::*;

proptest! {
    /// Arbitrary input never panics and never yields an out-of-range time.
    #[test]
    fn csv_parser_total(s in "\\PC*") {
        for t in parse_event_times(&s) {
            prop_assert!(t < 24 * 60);
        }
    }

    /// Well-formed tokens always parse to the expected minute value.
    #[test]
    fn csv_parser_round_trip(h in 0u16..24, m in 0u16..60) {
        let csv = format!("{:02}:{:02}", h, m);
        prop_assert_eq!(parse_event_times(&csv), vec![h * 60 + m]);
    }

    /// Invalid tokens are dropped without disturbing their neighbours.
    #[test]
    fn csv_parser_skips_garbage(h in 0u16..24, m in 0u16..60, junk in "[a-z]{1,8}") {
        let csv = format!("{}, {:02}:{:02}", junk, h, m);
        prop_assert_eq!(parse_event_times(&csv), vec![h * 60 + m]);
    }

    /// A deadline in the future is never "reached", a deadline up to
    /// `i32::MAX` ms in the past always is — wherever the counter sits.
    #[test]
    fn deadline_check_wrap_safe(now in any::<u32>(), ahead in 1u32..=i32::MAX as u32) {
        let future = now.wrapping_add(ahead);
        prop_assert!(!wrap_deadline_reached(now, future));

        let past = now.wrapping_sub(ahead);
        prop_assert!(wrap_deadline_reached(now, past));
    }

    /// The deadline moment itself counts as reached.
    #[test]
    fn deadline_exact_moment(now in any::<u32>()) {
        prop_assert!(wrap_deadline_reached(now, now));
    }
}
