//! Actuator channel layer.
//!
//! Exclusive owner of the logical state of the six relay channels.  Every
//! component that wants to move a relay goes through [`ChannelBank::set`];
//! nothing else writes hardware state.  Writes are last-committed-wins —
//! the scheduler and the automation engine may both command the same
//! channel with no arbitration.  Funnelling every write through this one
//! entry point is what keeps that policy replaceable later.
//!
//! The lights channel carries amended semantics: grow lights are damaged by
//! rapid power cycling, so a minimum-on duration is enforced.  Turning the
//! lights *on* always takes effect immediately; turning them *off* before
//! the minimum has elapsed is deferred — the request is accepted, a
//! deadline is armed, and [`ChannelBank::tick`] drives the relay off once
//! the deadline passes.
//!
//! The moment the lights turn on is persisted as a wall-clock epoch so the
//! minimum-on guarantee can survive a reboot.  Recovery is best-effort: if
//! the wall clock is unavailable when the lights turn on (pre-NTP), the
//! on-time is recorded as unknown and the guarantee is skipped after the
//! next restart.  A known degradation, not a silent wrong answer.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::events::AppEvent;
use crate::app::ports::{
    ClockPort, EventSink, RelayPort, StoragePort, wrap_deadline_reached,
};
use crate::config::{CHANNEL_COUNT, SystemConfig};

const NVS_NAMESPACE: &str = "relays";
const NVS_KEY: &str = "lights_on";

/// Persisted half of the lights timer.  Present in storage only while the
/// lights are on and the epoch was known when they turned on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct LightsTimerDoc {
    lights_on_since_epoch: i64,
}

/// Minimum-on bookkeeping for the lights channel.
#[derive(Debug, Clone, Copy)]
struct LightsTimer {
    /// Standing (or ad hoc, during budget catch-up) minimum-on duration.
    min_on_secs: u32,
    /// Elapsed-counter timestamp of the last off→on edge.  `None` = the
    /// on-time is unknown; an off request then takes effect immediately.
    on_since_ms: Option<u32>,
    /// Wall-clock twin of `on_since_ms`, mirrored to storage.
    on_since_epoch: Option<i64>,
    /// Armed deferred-off deadline on the elapsed counter.
    deferred_off_at_ms: Option<u32>,
}

/// Logical owner of the relay channels plus the lights minimum-on timer.
pub struct ChannelBank {
    lights_channel: u8,
    states: [bool; CHANNEL_COUNT],
    lights: LightsTimer,
}

impl ChannelBank {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            lights_channel: config.lights_channel,
            states: [false; CHANNEL_COUNT],
            lights: LightsTimer {
                min_on_secs: config.lights_min_on_secs,
                on_since_ms: None,
                on_since_epoch: None,
                deferred_off_at_ms: None,
            },
        }
    }

    /// Best-effort reconstruction of the lights on-time after a reboot.
    ///
    /// Valid only when the lights channel is already (again) on and the
    /// wall clock is available and ahead of the persisted epoch; any other
    /// combination leaves the on-time unknown.
    pub fn restore(
        &mut self,
        clock: &impl ClockPort,
        storage: &impl StoragePort,
    ) {
        let mut buf = [0u8; 32];
        let doc: LightsTimerDoc = match storage
            .read(NVS_NAMESPACE, NVS_KEY, &mut buf)
            .ok()
            .and_then(|len| postcard::from_bytes(&buf[..len]).ok())
        {
            Some(doc) => doc,
            None => return,
        };
        if doc.lights_on_since_epoch <= 0 || !self.get(self.lights_channel) {
            return;
        }
        let now_ms = clock.elapsed_ms();
        match clock.epoch_secs() {
            Some(now) if now > doc.lights_on_since_epoch => {
                let elapsed_secs = (now - doc.lights_on_since_epoch) as u32;
                self.lights.on_since_ms =
                    Some(now_ms.wrapping_sub(elapsed_secs.saturating_mul(1000)));
                self.lights.on_since_epoch = Some(doc.lights_on_since_epoch);
                info!(
                    "Lights on-time restored: on for {} s before reboot",
                    elapsed_secs
                );
            }
            _ => {
                // Cannot compute the true elapsed time; count from now.
                self.lights.on_since_ms = Some(now_ms);
                self.lights.on_since_epoch = None;
                warn!("Lights on-time unrecoverable, counting from boot");
            }
        }
    }

    /// Command a channel to a logical state.  1-based channel number.
    ///
    /// Idempotent for the general case.  For the lights channel an early
    /// off request is deferred (the call still reports success — the
    /// caller's intent is honoured once the minimum-on duration elapses).
    /// Invalid channel numbers are rejected with `false`, nothing mutated.
    pub fn set(
        &mut self,
        ch: u8,
        on: bool,
        clock: &impl ClockPort,
        relays: &mut impl RelayPort,
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) -> bool {
        let Some(idx) = Self::index(ch) else {
            return false;
        };
        if ch == self.lights_channel {
            if on {
                self.lights_on(idx, clock, relays, storage, sink);
            } else {
                self.lights_off_request(idx, clock, relays, storage, sink);
            }
            return true;
        }

        if self.states[idx] != on {
            relays.write_channel(idx, on);
            self.states[idx] = on;
            sink.emit(&AppEvent::ChannelChanged { ch, on });
        }
        true
    }

    /// Current logical state.  Invalid channels read as off.
    pub fn get(&self, ch: u8) -> bool {
        Self::index(ch).is_some_and(|idx| self.states[idx])
    }

    /// Resolve a pending deferred-off.  Must run before the thermostat,
    /// automation, and scheduler ticks so a channel forced off this cycle
    /// is visible to them within the same cycle.
    pub fn tick(
        &mut self,
        clock: &impl ClockPort,
        relays: &mut impl RelayPort,
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        let Some(deadline) = self.lights.deferred_off_at_ms else {
            return;
        };
        if !wrap_deadline_reached(clock.elapsed_ms(), deadline) {
            return;
        }
        let idx = (self.lights_channel - 1) as usize;
        relays.write_channel(idx, false);
        self.states[idx] = false;
        self.clear_lights_timer(storage);
        info!("Lights auto-turned off after minimum duration");
        sink.emit(&AppEvent::ChannelChanged {
            ch: self.lights_channel,
            on: false,
        });
    }

    /// Replace the lights minimum-on duration (standing or ad hoc).
    pub fn set_lights_min_duration(&mut self, secs: u32) {
        self.lights.min_on_secs = secs;
    }

    pub fn lights_min_duration(&self) -> u32 {
        self.lights.min_on_secs
    }

    /// Arm (or with `secs == 0` cancel) an ad hoc deferred-off, used by the
    /// automation engine to end a daily-budget catch-up run.
    pub fn schedule_lights_off_after(&mut self, secs: u32, clock: &impl ClockPort) {
        if secs == 0 {
            self.lights.deferred_off_at_ms = None;
            return;
        }
        self.lights.deferred_off_at_ms =
            Some(clock.elapsed_ms().wrapping_add(secs.saturating_mul(1000)));
    }

    /// Elapsed-counter timestamp of the lights' last off→on edge.
    pub fn lights_on_since_ms(&self) -> Option<u32> {
        self.lights.on_since_ms
    }

    /// 1-based channel number of the lights channel.
    pub fn lights_channel(&self) -> u8 {
        self.lights_channel
    }

    /// Logical states of all channels, indexed CH1..CH6.
    pub fn states(&self) -> [bool; CHANNEL_COUNT] {
        self.states
    }

    // ── Internal ──────────────────────────────────────────────

    fn index(ch: u8) -> Option<usize> {
        (1..=CHANNEL_COUNT as u8)
            .contains(&ch)
            .then(|| (ch - 1) as usize)
    }

    fn lights_on(
        &mut self,
        idx: usize,
        clock: &impl ClockPort,
        relays: &mut impl RelayPort,
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        if self.states[idx] {
            return;
        }
        relays.write_channel(idx, true);
        self.states[idx] = true;
        self.lights.on_since_ms = Some(clock.elapsed_ms());
        self.lights.deferred_off_at_ms = None;
        match clock.epoch_secs() {
            Some(epoch) => {
                self.lights.on_since_epoch = Some(epoch);
                let doc = LightsTimerDoc {
                    lights_on_since_epoch: epoch,
                };
                match postcard::to_allocvec(&doc) {
                    Ok(bytes) => {
                        if let Err(e) = storage.write(NVS_NAMESPACE, NVS_KEY, &bytes) {
                            warn!("Lights on-time persist failed: {}", e);
                        }
                    }
                    Err(_) => warn!("Lights on-time encode failed"),
                }
            }
            None => {
                // Pre-NTP: the on-time cannot survive a reboot.
                self.lights.on_since_epoch = None;
            }
        }
        sink.emit(&AppEvent::ChannelChanged {
            ch: self.lights_channel,
            on: true,
        });
    }

    fn lights_off_request(
        &mut self,
        idx: usize,
        clock: &impl ClockPort,
        relays: &mut impl RelayPort,
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        if !self.states[idx] {
            return;
        }
        let now_ms = clock.elapsed_ms();
        let min_ms = self.lights.min_on_secs.saturating_mul(1000);
        match self.lights.on_since_ms {
            Some(since) if now_ms.wrapping_sub(since) < min_ms => {
                let deadline = since.wrapping_add(min_ms);
                self.lights.deferred_off_at_ms = Some(deadline);
                let delay_secs =
                    (min_ms - now_ms.wrapping_sub(since)) / 1000;
                info!("Lights off deferred, will allow in {} s", delay_secs);
                sink.emit(&AppEvent::LightsOffDeferred { delay_secs });
            }
            _ => {
                // Minimum satisfied, or on-time unknown: off immediately.
                relays.write_channel(idx, false);
                self.states[idx] = false;
                self.clear_lights_timer(storage);
                sink.emit(&AppEvent::ChannelChanged {
                    ch: self.lights_channel,
                    on: false,
                });
            }
        }
    }

    fn clear_lights_timer(&mut self, storage: &mut impl StoragePort) {
        self.lights.on_since_ms = None;
        self.lights.on_since_epoch = None;
        self.lights.deferred_off_at_ms = None;
        if let Err(e) = storage.delete(NVS_NAMESPACE, NVS_KEY) {
            warn!("Lights on-time erase failed: {}", e);
        }
    }
}
