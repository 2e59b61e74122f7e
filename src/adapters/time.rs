//! ESP32 clock adapter.
//!
//! Implements [`ClockPort`] for the controller.
//!
//! - **`target_os = "espidf"`** — elapsed time wraps `esp_timer_get_time()`
//!   (monotonic, microsecond precision) down to a wrapping u32 millisecond
//!   counter; wall-clock queries go through `gettimeofday` + `localtime_r`
//!   and report `None` until SNTP has synced the system clock.
//! - **`not(target_os = "espidf")`** — `std::time::Instant` for the elapsed
//!   counter and the host's `SystemTime` for the epoch; the calendar
//!   breakdown is unavailable (host runs use simulated clocks instead).

use crate::app::ports::{ClockPort, WallClock};

/// Reject obviously unsynced time (before 2020-01-01).
#[cfg(target_os = "espidf")]
const EPOCH_2020: i64 = 1_577_836_800;

pub struct Esp32Clock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for Esp32Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32Clock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    #[cfg(target_os = "espidf")]
    fn synced_epoch() -> Option<i64> {
        use core::ptr;
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, ptr::null_mut()) } != 0 {
            return None;
        }
        let secs = tv.tv_sec as i64;
        (secs >= EPOCH_2020).then_some(secs)
    }
}

impl ClockPort for Esp32Clock {
    #[cfg(target_os = "espidf")]
    fn elapsed_ms(&self) -> u32 {
        ((unsafe { esp_idf_svc::sys::esp_timer_get_time() }) / 1000) as u32
    }

    #[cfg(not(target_os = "espidf"))]
    fn elapsed_ms(&self) -> u32 {
        self.start.elapsed().as_millis() as u32
    }

    #[cfg(target_os = "espidf")]
    fn wall_clock(&self) -> Option<WallClock> {
        let epoch = Self::synced_epoch()?;
        let secs = epoch as esp_idf_svc::sys::time_t;
        let mut tm: esp_idf_svc::sys::tm = unsafe { core::mem::zeroed() };
        if unsafe { esp_idf_svc::sys::localtime_r(&secs, &mut tm) }.is_null() {
            return None;
        }
        Some(WallClock {
            year: (tm.tm_year + 1900) as u16,
            day_of_year: tm.tm_yday as u16,
            weekday: tm.tm_wday as u8,
            hour: tm.tm_hour as u8,
            minute: tm.tm_min as u8,
            second: tm.tm_sec as u8,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn wall_clock(&self) -> Option<WallClock> {
        None
    }

    #[cfg(target_os = "espidf")]
    fn epoch_secs(&self) -> Option<i64> {
        Self::synced_epoch()
    }

    #[cfg(not(target_os = "espidf"))]
    fn epoch_secs(&self) -> Option<i64> {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .ok()
            .map(|d| d.as_secs() as i64)
    }
}
