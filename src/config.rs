//! System configuration parameters
//!
//! Static wiring of the enclosure: which relay channel drives which load,
//! relay polarity, and control-loop timing. Channel-to-pin mapping is fixed
//! at build time; per-component settings (thermostat, automation, schedules)
//! live in their own persisted documents instead.

use serde::{Deserialize, Serialize};

/// Number of relay channels on the board (CH1..CH6).
pub const CHANNEL_COUNT: usize = 6;

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Channel roles (1-based, matching the board silkscreen) ---
    /// Relay channel wired to the heater.
    pub heater_channel: u8,
    /// Relay channel wired to the grow lights.
    pub lights_channel: u8,
    /// Relay channel wired to the irrigation valve/pump.
    pub irrigation_channel: u8,

    // --- Lights protection ---
    /// Standing minimum-on duration for the lights channel (seconds).
    pub lights_min_on_secs: u32,

    // --- Relay board ---
    /// True if the relay board is active LOW (typical opto-isolated boards).
    pub relay_active_low: bool,

    // --- Timing ---
    /// Control loop interval (milliseconds).
    pub control_loop_interval_ms: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            heater_channel: 1,
            lights_channel: 2,
            irrigation_channel: 3,

            // 12 hours — grow lights are damaged by rapid cycling.
            lights_min_on_secs: 12 * 3600,

            relay_active_low: true,

            control_loop_interval_ms: 10,
        }
    }
}
