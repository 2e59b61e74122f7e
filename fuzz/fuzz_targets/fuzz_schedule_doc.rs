//! Fuzz target: persisted schedule document decoding.
//!
//! NVS blobs can be truncated or corrupted by power loss mid-commit; the
//! decoder must reject garbage cleanly rather than panic or produce
//! entries the scheduler would mis-handle.
//!
//! cargo fuzz run fuzz_schedule_doc

#![no_main]

use growbox::scheduler::ScheduleEntry;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Decoding arbitrary bytes must never panic; success is fine, the
    // entries just have to survive re-encoding.
    if let Ok(entries) = postcard::from_bytes::<Vec<ScheduleEntry>>(data) {
        let _ = postcard::to_allocvec(&entries);
    }
});
