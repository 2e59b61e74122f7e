//! Adapters binding the domain ports to the ESP32 platform.

pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod time;
