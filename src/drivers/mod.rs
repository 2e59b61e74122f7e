//! Hardware drivers: one-shot peripheral init and the relay bank.

pub mod hw_init;
pub mod relay;
