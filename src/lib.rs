//! Growbox firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod automation;
pub mod channels;
pub mod config;
pub mod scheduler;
pub mod thermostat;

mod pins;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export the ESP-IDF-backed modules so the crate compiles on every
// target; the hardware implementations are guarded by cfg attributes inside.
pub mod adapters;
pub mod drivers;
pub mod sensors;
