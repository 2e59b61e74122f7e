//! Six-channel relay bank.
//!
//! Translates logical on/off into electrical levels.  Most relay boards
//! for this controller are active-low (energise on a low level); the
//! polarity is a constructor parameter so an active-high board is a
//! one-line config change.
//!
//! On the host the driven levels are recorded for inspection instead of
//! touching GPIO.

use log::debug;

use crate::config::CHANNEL_COUNT;
use crate::drivers::hw_init;
use crate::pins;

pub struct RelayBank {
    active_low: bool,
    #[cfg(not(target_os = "espidf"))]
    on: [bool; CHANNEL_COUNT],
}

impl RelayBank {
    /// Build the bank and drive every channel to its off level.
    pub fn new(active_low: bool) -> Self {
        let mut bank = Self {
            active_low,
            #[cfg(not(target_os = "espidf"))]
            on: [false; CHANNEL_COUNT],
        };
        for idx in 0..CHANNEL_COUNT {
            bank.write(idx, false);
        }
        bank
    }

    /// Drive one channel (0-based index) to a logical state.
    pub fn write(&mut self, index: usize, on: bool) {
        if index >= CHANNEL_COUNT {
            return;
        }
        let level = on != self.active_low;
        hw_init::gpio_write(pins::RELAY_GPIOS[index], level);
        debug!("relay[{}] = {} (level {})", index, on, level);
        #[cfg(not(target_os = "espidf"))]
        {
            self.on[index] = on;
        }
    }

    /// Logical states as last driven (sim only).
    #[cfg(not(target_os = "espidf"))]
    pub fn driven(&self) -> [bool; CHANNEL_COUNT] {
        self.on
    }
}
