//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (clock, sensors, relays, storage, event sinks) implement
//! these traits.  The [`AppService`](super::service::AppService) and the
//! domain components consume them via generics, so the core never touches
//! hardware directly.

use crate::config::CHANNEL_COUNT;

// ───────────────────────────────────────────────────────────────
// Clock port (driven adapter: timers / SNTP → domain)
// ───────────────────────────────────────────────────────────────

/// Calendar date/time, available only once a network time source has been
/// acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallClock {
    pub year: u16,
    /// Day of year, 0..=365.
    pub day_of_year: u16,
    /// Day of week, Sunday = 0.
    pub weekday: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl WallClock {
    /// Minutes since midnight (0..1439).
    pub fn minutes_since_midnight(&self) -> u16 {
        u16::from(self.hour) * 60 + u16::from(self.minute)
    }
}

/// Read-side time port.
///
/// The elapsed counter is monotonic and **wraps** at `u32::MAX`
/// milliseconds (~49.7 days); every deadline comparison against it must go
/// through [`wrap_deadline_reached`].  The wall clock is fallible: the board
/// has no RTC backup, so calendar time exists only after SNTP sync.
pub trait ClockPort {
    /// Milliseconds since boot, wrapping at `u32::MAX`.
    fn elapsed_ms(&self) -> u32;

    /// Calendar date/time, or `None` when no time source has been acquired.
    fn wall_clock(&self) -> Option<WallClock>;

    /// Unix epoch seconds, or `None` when no time source has been acquired.
    fn epoch_secs(&self) -> Option<i64>;
}

/// Wrap-safe deadline check on the elapsed-time counter.
///
/// Uses signed-difference arithmetic so deadlines remain correct across the
/// counter wrapping, as long as `now` and `deadline` are within `i32::MAX`
/// milliseconds (~24.8 days) of each other.
pub fn wrap_deadline_reached(now_ms: u32, deadline_ms: u32) -> bool {
    (now_ms.wrapping_sub(deadline_ms) as i32) >= 0
}

// ───────────────────────────────────────────────────────────────
// Climate port (driven adapter: sensors → domain)
// ───────────────────────────────────────────────────────────────

/// A point-in-time reading of the interior and exterior climate sensors.
///
/// A failed or disconnected sensor reads as `None` — absence, not error.
/// Consumers hold their previous decision rather than flap on a glitch.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClimateSnapshot {
    pub interior_c: Option<f32>,
    pub exterior_c: Option<f32>,
    pub interior_rh: Option<f32>,
    pub exterior_rh: Option<f32>,
}

/// Read-side port: the domain calls this once per control cycle.
pub trait ClimatePort {
    fn read_climate(&mut self) -> ClimateSnapshot;
}

// ───────────────────────────────────────────────────────────────
// Relay port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port: relay-safe channel writes.
///
/// `index` is 0-based (`0..CHANNEL_COUNT`); `on` is the *logical* state —
/// active-low polarity is the driver's concern, never the domain's.
/// Implementations must tolerate out-of-range indices (ignore them); the
/// [`ChannelBank`](crate::channels::ChannelBank) validates before calling.
pub trait RelayPort {
    fn write_channel(&mut self, index: usize, on: bool);

    /// Drive every channel to its off level (boot / fail-safe).
    fn all_off(&mut self) {
        for idx in 0..CHANNEL_COUNT {
            self.write_channel(idx, false);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go (serial log, MQTT,
/// a web SSE stream, etc.).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage for component documents.
///
/// - Keys are namespaced to prevent collisions between subsystems.
/// - Write operations MUST be atomic — no partial blobs on power loss.
///   The ESP-IDF NVS API guarantees this natively; the in-memory simulation
///   achieves it trivially.
/// - A failing write degrades the owning component to in-memory operation;
///   it is never fatal to the tick path.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
