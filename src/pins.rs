//! GPIO pin assignments for the Growbox main board (ESP32-S3).
//!
//! Single source of truth — every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.

// ---------------------------------------------------------------------------
// Relay outputs (board labelled CH1..CH6)
// ---------------------------------------------------------------------------

// GPIO1/GPIO2 are UART0 TX/RX on this board; CH1/CH2 sit on GPIO4/GPIO5 to
// keep the boot/upload serial path clean.

/// Relay channel GPIOs, indexed CH1..CH6.
pub const RELAY_GPIOS: [i32; 6] = [4, 5, 41, 42, 45, 46];

// ---------------------------------------------------------------------------
// Climate sensors (DHT22, one-wire data pins with 4.7k pull-ups)
// ---------------------------------------------------------------------------

/// Interior temperature/humidity sensor data pin.
pub const DHT_INTERIOR_GPIO: i32 = 21;
/// Exterior temperature/humidity sensor data pin.
pub const DHT_EXTERIOR_GPIO: i32 = 20;
