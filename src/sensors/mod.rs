//! Environmental sensors.

pub mod climate;
