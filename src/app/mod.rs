//! Application core — pure domain logic, zero I/O.
//!
//! This module contains the orchestration layer for the Growbox system:
//! the per-cycle tick ordering across the channel bank, thermostat,
//! automation engine, and scheduler, plus the port traits and events that
//! connect the core to the outside world.  All interaction with hardware
//! happens through **port traits** defined in [`ports`], keeping this layer
//! fully testable without real peripherals.

pub mod events;
pub mod ports;
pub mod service;
