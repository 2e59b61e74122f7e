//! In-memory port doubles shared by the unit tests.

use std::collections::HashMap;

use crate::app::events::AppEvent;
use crate::app::ports::{
    ClockPort, EventSink, RelayPort, StorageError, StoragePort, WallClock,
};
use crate::config::CHANNEL_COUNT;

/// Fully scripted clock: elapsed counter, epoch, and wall clock are all
/// set explicitly by the test.
pub struct SimClock {
    elapsed_ms: u32,
    epoch: Option<i64>,
    wall: Option<WallClock>,
}

impl SimClock {
    pub fn new() -> Self {
        Self {
            elapsed_ms: 0,
            epoch: None,
            wall: None,
        }
    }

    pub fn advance_ms(&mut self, ms: u32) {
        self.elapsed_ms = self.elapsed_ms.wrapping_add(ms);
    }

    pub fn set_epoch(&mut self, secs: i64) {
        self.epoch = Some(secs);
    }

    pub fn set_wall(&mut self, wall: WallClock) {
        self.wall = Some(wall);
    }

    pub fn clear_wall(&mut self) {
        self.wall = None;
        self.epoch = None;
    }
}

/// Build a wall clock with second = 0.
pub fn wall(year: u16, day_of_year: u16, weekday: u8, hour: u8, minute: u8) -> WallClock {
    WallClock {
        year,
        day_of_year,
        weekday,
        hour,
        minute,
        second: 0,
    }
}

impl ClockPort for SimClock {
    fn elapsed_ms(&self) -> u32 {
        self.elapsed_ms
    }

    fn wall_clock(&self) -> Option<WallClock> {
        self.wall
    }

    fn epoch_secs(&self) -> Option<i64> {
        self.epoch
    }
}

/// Records the logical level of each relay channel.
pub struct RelaySpy {
    pub levels: [bool; CHANNEL_COUNT],
}

impl RelaySpy {
    pub fn new() -> Self {
        Self {
            levels: [false; CHANNEL_COUNT],
        }
    }
}

impl RelayPort for RelaySpy {
    fn write_channel(&mut self, index: usize, on: bool) {
        if index < CHANNEL_COUNT {
            self.levels[index] = on;
        }
    }
}

/// HashMap-backed storage double.
pub struct MemoryStorage {
    store: HashMap<String, Vec<u8>>,
    /// When set, every write/delete fails — persistence-degradation tests.
    pub fail_writes: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            store: HashMap::new(),
            fail_writes: false,
        }
    }

    fn composite(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }
}

impl StoragePort for MemoryStorage {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        match self.store.get(&Self::composite(namespace, key)) {
            Some(data) => {
                let len = data.len().min(buf.len());
                buf[..len].copy_from_slice(&data[..len]);
                Ok(len)
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::IoError);
        }
        self.store
            .insert(Self::composite(namespace, key), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::IoError);
        }
        self.store.remove(&Self::composite(namespace, key));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.store.contains_key(&Self::composite(namespace, key))
    }
}

/// Discards every event.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: &AppEvent) {}
}

/// Records every event for assertions.
pub struct SinkSpy {
    pub events: Vec<AppEvent>,
}

impl SinkSpy {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }
}

impl EventSink for SinkSpy {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
