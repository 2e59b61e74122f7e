//! Hardware adapter — bridges real peripherals to domain port traits.
//!
//! Owns the relay bank and the DHT sensor pair, exposing them through
//! [`RelayPort`] and [`ClimatePort`].  This is the only module in the
//! system that touches actual hardware.  On non-espidf targets, the
//! underlying drivers use cfg-gated simulation stubs.

use crate::app::ports::{ClimatePort, ClockPort, RelayPort};
use crate::app::ports::ClimateSnapshot;
use crate::adapters::time::Esp32Clock;
use crate::drivers::relay::RelayBank;
use crate::sensors::climate::ClimateSensors;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter {
    relays: RelayBank,
    climate: ClimateSensors,
    clock: Esp32Clock,
}

impl HardwareAdapter {
    pub fn new(relays: RelayBank, climate: ClimateSensors) -> Self {
        Self {
            relays,
            climate,
            clock: Esp32Clock::new(),
        }
    }
}

// ── RelayPort implementation ──────────────────────────────────

impl RelayPort for HardwareAdapter {
    fn write_channel(&mut self, index: usize, on: bool) {
        self.relays.write(index, on);
    }
}

// ── ClimatePort implementation ────────────────────────────────

impl ClimatePort for HardwareAdapter {
    fn read_climate(&mut self) -> ClimateSnapshot {
        let now_ms = self.clock.elapsed_ms();
        let interior = self.climate.interior.read(now_ms);
        let exterior = self.climate.exterior.read(now_ms);
        ClimateSnapshot {
            interior_c: interior.map(|r| r.temperature_c),
            interior_rh: interior.map(|r| r.humidity_pct),
            exterior_c: exterior.map(|r| r.temperature_c),
            exterior_rh: exterior.map(|r| r.humidity_pct),
        }
    }
}
