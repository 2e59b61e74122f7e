//! DHT22 temperature/humidity sensor pair (interior + exterior).
//!
//! The DHT22 speaks a single-wire protocol: the host pulls the line low
//! for >1 ms, releases it, and the sensor answers with 40 bits encoded in
//! pulse widths.  The sensor needs at least 2 s between samples, so each
//! read is cached and refreshed on its own cadence; a failed refresh keeps
//! reporting the previous value for a short grace period before going
//! absent.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: bit-banged read over the configured GPIO.
//! On host/test: readings come from static atomics for injection (NaN bit
//! pattern = no reading).

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicU32, Ordering};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::warn;

use crate::pins;

/// Minimum interval between DHT22 samples.
const SAMPLE_INTERVAL_MS: u32 = 2_500;
/// Keep serving a stale value for this long after a failed refresh.
const STALE_GRACE_MS: u32 = 30_000;

#[derive(Debug, Clone, Copy)]
pub struct DhtReading {
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

// ── Host injection ────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
static SIM_INTERIOR_T: AtomicU32 = AtomicU32::new(f32::NAN.to_bits());
#[cfg(not(target_os = "espidf"))]
static SIM_INTERIOR_RH: AtomicU32 = AtomicU32::new(f32::NAN.to_bits());
#[cfg(not(target_os = "espidf"))]
static SIM_EXTERIOR_T: AtomicU32 = AtomicU32::new(f32::NAN.to_bits());
#[cfg(not(target_os = "espidf"))]
static SIM_EXTERIOR_RH: AtomicU32 = AtomicU32::new(f32::NAN.to_bits());

/// Inject an interior reading (sim only).  NaN clears it.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_interior(temperature_c: f32, humidity_pct: f32) {
    SIM_INTERIOR_T.store(temperature_c.to_bits(), Ordering::Relaxed);
    SIM_INTERIOR_RH.store(humidity_pct.to_bits(), Ordering::Relaxed);
}

/// Inject an exterior reading (sim only).  NaN clears it.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_exterior(temperature_c: f32, humidity_pct: f32) {
    SIM_EXTERIOR_T.store(temperature_c.to_bits(), Ordering::Relaxed);
    SIM_EXTERIOR_RH.store(humidity_pct.to_bits(), Ordering::Relaxed);
}

#[cfg(not(target_os = "espidf"))]
fn sim_load(t: &AtomicU32, rh: &AtomicU32) -> Option<DhtReading> {
    let temperature_c = f32::from_bits(t.load(Ordering::Relaxed));
    let humidity_pct = f32::from_bits(rh.load(Ordering::Relaxed));
    (!temperature_c.is_nan()).then_some(DhtReading {
        temperature_c,
        humidity_pct,
    })
}

// ── Sensor ────────────────────────────────────────────────────

pub struct DhtSensor {
    gpio: i32,
    last_attempt_ms: Option<u32>,
    last_ok_ms: Option<u32>,
    cached: Option<DhtReading>,
}

impl DhtSensor {
    pub fn new(gpio: i32) -> Self {
        Self {
            gpio,
            last_attempt_ms: None,
            last_ok_ms: None,
            cached: None,
        }
    }

    /// Current reading, refreshed on the sensor's own cadence.
    /// `None` when no sufficiently fresh sample exists.
    #[cfg(target_os = "espidf")]
    pub fn read(&mut self, now_ms: u32) -> Option<DhtReading> {
        let due = self
            .last_attempt_ms
            .is_none_or(|at| now_ms.wrapping_sub(at) >= SAMPLE_INTERVAL_MS);
        if due {
            self.last_attempt_ms = Some(now_ms);
            match self.sample() {
                Some(reading) => {
                    self.cached = Some(reading);
                    self.last_ok_ms = Some(now_ms);
                }
                None => warn!("DHT on GPIO{} read failed", self.gpio),
            }
        }
        let fresh = self
            .last_ok_ms
            .is_some_and(|at| now_ms.wrapping_sub(at) <= STALE_GRACE_MS);
        if !fresh {
            self.cached = None;
        }
        self.cached
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn read(&mut self, _now_ms: u32) -> Option<DhtReading> {
        if self.gpio == pins::DHT_INTERIOR_GPIO {
            sim_load(&SIM_INTERIOR_T, &SIM_INTERIOR_RH)
        } else {
            sim_load(&SIM_EXTERIOR_T, &SIM_EXTERIOR_RH)
        }
    }

    /// One bit-banged DHT22 transaction.
    #[cfg(target_os = "espidf")]
    fn sample(&self) -> Option<DhtReading> {
        let pin = self.gpio;

        // Start signal: drive low >1 ms, then release.
        // SAFETY: pin was configured by hw_init; single main-task access.
        unsafe {
            gpio_set_direction(pin, gpio_mode_t_GPIO_MODE_OUTPUT);
            gpio_set_level(pin, 0);
            esp_rom_delay_us(1_100);
            gpio_set_level(pin, 1);
            esp_rom_delay_us(30);
            gpio_set_direction(pin, gpio_mode_t_GPIO_MODE_INPUT);
        }

        // Response preamble: ~80 us low, ~80 us high.
        Self::wait_level(pin, false, 90)?;
        Self::wait_level(pin, true, 90)?;
        Self::wait_level(pin, false, 90)?;

        // 40 data bits: 50 us low, then 26-28 us high (0) or ~70 us high (1).
        let mut data = [0u8; 5];
        for bit in 0..40 {
            Self::wait_level(pin, true, 70)?;
            let high_us = Self::level_duration(pin, true, 100)?;
            if high_us > 45 {
                data[bit / 8] |= 1 << (7 - bit % 8);
            }
        }

        let checksum = data[0]
            .wrapping_add(data[1])
            .wrapping_add(data[2])
            .wrapping_add(data[3]);
        if checksum != data[4] {
            return None;
        }

        let humidity_pct = (u16::from_be_bytes([data[0], data[1]])) as f32 / 10.0;
        let raw_t = u16::from_be_bytes([data[2], data[3]]);
        let mut temperature_c = (raw_t & 0x7FFF) as f32 / 10.0;
        if raw_t & 0x8000 != 0 {
            temperature_c = -temperature_c;
        }
        if !(0.0..=100.0).contains(&humidity_pct) {
            return None;
        }
        Some(DhtReading {
            temperature_c,
            humidity_pct,
        })
    }

    /// Busy-wait until the line reaches `level`.  `None` on timeout.
    #[cfg(target_os = "espidf")]
    fn wait_level(pin: i32, level: bool, timeout_us: u32) -> Option<()> {
        let want = i32::from(level);
        for _ in 0..timeout_us {
            // SAFETY: register read on a configured input pin.
            if unsafe { gpio_get_level(pin) } == want {
                return Some(());
            }
            unsafe { esp_rom_delay_us(1) };
        }
        None
    }

    /// Microseconds the line stays at `level`.  `None` on timeout.
    #[cfg(target_os = "espidf")]
    fn level_duration(pin: i32, level: bool, timeout_us: u32) -> Option<u32> {
        let want = i32::from(level);
        for us in 0..timeout_us {
            // SAFETY: register read on a configured input pin.
            if unsafe { gpio_get_level(pin) } != want {
                return Some(us);
            }
            unsafe { esp_rom_delay_us(1) };
        }
        None
    }
}

/// The interior/exterior sensor pair.
pub struct ClimateSensors {
    pub interior: DhtSensor,
    pub exterior: DhtSensor,
}

impl Default for ClimateSensors {
    fn default() -> Self {
        Self::new()
    }
}

impl ClimateSensors {
    pub fn new() -> Self {
        Self {
            interior: DhtSensor::new(pins::DHT_INTERIOR_GPIO),
            exterior: DhtSensor::new(pins::DHT_EXTERIOR_GPIO),
        }
    }
}
