//! Daily-accumulation and irrigation automation engine.
//!
//! Two cooperating sub-machines share one day-boundary detector:
//!
//! - **Light budget** — accumulates how long the lights channel has been on
//!   today (channel-state-driven, so it counts light from the scheduler or
//!   manual commands just the same), rolls the total into a capped history
//!   at the day boundary, and if the day under-delivered forces the lights
//!   on for exactly the shortfall.
//! - **Irrigation** — fires each configured minutes-since-midnight event at
//!   most once per day, running the irrigation channel for the configured
//!   duration via an elapsed-time deferred off.
//!
//! Event times come in two mutually exclusive modes: *computed* (evenly
//! spaced from a start hour and per-day count) or *explicit* (user-supplied
//! `HH:MM` list).  Reconfiguring either way resets the per-event runtime
//! trackers — nothing is "already triggered" right after a change.
//!
//! Coinciding events collapse onto the single irrigation channel; the last
//! writer's duration wins.  A trigger minute missed because the wall clock
//! was unavailable is lost for that day — there is no catch-up.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::events::AppEvent;
use crate::app::ports::{
    ClockPort, EventSink, RelayPort, StoragePort, WallClock, wrap_deadline_reached,
};
use crate::channels::ChannelBank;
use crate::config::SystemConfig;

const NVS_NAMESPACE: &str = "automation";
const NVS_KEY: &str = "config";

/// Retains roughly four months of daily totals.
pub const HISTORY_CAP: usize = 120;

const MINUTES_PER_DAY: u16 = 24 * 60;

/// One finished day of light accumulation.  Immutable once written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightHistoryRecord {
    pub year: u16,
    pub day_of_year: u16,
    pub accum_secs: u32,
}

/// Persisted automation document.
#[derive(Debug, Serialize, Deserialize)]
struct AutomationDoc {
    daily_min_secs: u32,
    accum_secs: u32,
    irrigation_count: u8,
    irrigation_duration_secs: u16,
    irrigation_start_hour: u8,
    /// Present only in explicit mode.
    explicit_times: Option<Vec<u16>>,
    history: heapless::Vec<LightHistoryRecord, HISTORY_CAP>,
}

/// Volatile per-event state, parallel to the event-time list.  Re-derived
/// as "not yet triggered today" on boot: a trigger missed across a reboot
/// simply waits for the next matching minute.
#[derive(Debug, Clone, Copy, Default)]
struct EventRuntime {
    last_triggered_yday: Option<u16>,
    pending_off_at_ms: Option<u32>,
}

/// Read-model for the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct AutomationStatus {
    pub daily_light_min_hours: f32,
    pub daily_light_accum_hours: f32,
    pub irrigation_count: u8,
    pub irrigation_duration_secs: u16,
    pub irrigation_start_hour: u8,
    pub irrigation_explicit: bool,
    /// Minutes since midnight, one per event.
    pub irrigation_times: Vec<u16>,
    pub history: Vec<LightHistoryRecord>,
}

pub struct Automation {
    lights_channel: u8,
    irrigation_channel: u8,

    daily_min_secs: u32,
    accum_secs: u32,
    /// Sub-second carry so a 10 ms tick still accumulates correctly.
    accum_ms_rem: u32,
    last_day_of_year: Option<u16>,
    history: heapless::Vec<LightHistoryRecord, HISTORY_CAP>,

    irrigation_count: u8,
    irrigation_duration_secs: u16,
    irrigation_start_hour: u8,
    explicit: bool,
    /// Minutes since midnight, parallel to `events_rt`.
    times: Vec<u16>,
    events_rt: Vec<EventRuntime>,

    last_tick_ms: Option<u32>,
}

/// Parse a comma-separated list of `HH:MM` tokens into minutes since
/// midnight.  Invalid tokens are skipped; order is preserved.
pub fn parse_event_times(csv: &str) -> Vec<u16> {
    csv.split(',')
        .filter_map(|token| {
            let token = token.trim();
            let (h, m) = token.split_once(':')?;
            let h: u16 = h.trim().parse().ok()?;
            let m: u16 = m.trim().parse().ok()?;
            (h < 24 && m < 60).then_some(h * 60 + m)
        })
        .collect()
}

impl Automation {
    /// Load persisted state (or defaults on first boot).
    pub fn new(config: &SystemConfig, storage: &impl StoragePort) -> Self {
        let mut auto = Self {
            lights_channel: config.lights_channel,
            irrigation_channel: config.irrigation_channel,
            daily_min_secs: 12 * 3600,
            accum_secs: 0,
            accum_ms_rem: 0,
            last_day_of_year: None,
            history: heapless::Vec::new(),
            irrigation_count: 3,
            irrigation_duration_secs: 60,
            irrigation_start_hour: 6,
            explicit: false,
            times: Vec::new(),
            events_rt: Vec::new(),
            last_tick_ms: None,
        };

        let mut buf = [0u8; 2048];
        if let Some(doc) = storage
            .read(NVS_NAMESPACE, NVS_KEY, &mut buf)
            .ok()
            .and_then(|len| postcard::from_bytes::<AutomationDoc>(&buf[..len]).ok())
        {
            auto.daily_min_secs = doc.daily_min_secs;
            auto.accum_secs = doc.accum_secs;
            auto.irrigation_count = doc.irrigation_count;
            auto.irrigation_duration_secs = doc.irrigation_duration_secs;
            auto.irrigation_start_hour = doc.irrigation_start_hour;
            auto.history = doc.history;
            if let Some(times) = doc.explicit_times.filter(|t| !t.is_empty()) {
                auto.irrigation_count = times.len().min(u8::MAX as usize) as u8;
                auto.times = times;
                auto.explicit = true;
            }
        }

        auto.regenerate_times();
        auto
    }

    /// One control cycle.
    pub fn tick(
        &mut self,
        clock: &impl ClockPort,
        channels: &mut ChannelBank,
        relays: &mut impl RelayPort,
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        let now_ms = clock.elapsed_ms();
        let delta_ms = now_ms.wrapping_sub(self.last_tick_ms.unwrap_or(now_ms));
        self.last_tick_ms = Some(now_ms);

        // Accumulate lights-on time no matter who turned the channel on.
        if delta_ms > 0 && channels.get(self.lights_channel) {
            self.accum_ms_rem += delta_ms;
            self.accum_secs = self.accum_secs.saturating_add(self.accum_ms_rem / 1000);
            self.accum_ms_rem %= 1000;
        }

        // Pending deferred-offs run on the elapsed counter and are resolved
        // even while the wall clock is unavailable.
        for rt in &mut self.events_rt {
            if let Some(off_at) = rt.pending_off_at_ms {
                if wrap_deadline_reached(now_ms, off_at) {
                    channels.set(
                        self.irrigation_channel,
                        false,
                        clock,
                        relays,
                        storage,
                        sink,
                    );
                    rt.pending_off_at_ms = None;
                }
            }
        }

        // Day boundaries and trigger minutes need calendar time.
        let Some(wc) = clock.wall_clock() else {
            return;
        };

        match self.last_day_of_year {
            None => self.last_day_of_year = Some(wc.day_of_year),
            Some(prev) if prev != wc.day_of_year => {
                self.roll_day(prev, &wc, clock, channels, relays, storage, sink);
            }
            _ => {}
        }

        let now_min = wc.minutes_since_midnight();
        for i in 0..self.times.len() {
            let rt = &mut self.events_rt[i];
            if rt.last_triggered_yday == Some(wc.day_of_year) {
                continue;
            }
            if self.times[i] == now_min {
                info!(
                    "Irrigation event {} at {:02}:{:02} for {} s",
                    i, wc.hour, wc.minute, self.irrigation_duration_secs
                );
                rt.pending_off_at_ms = Some(
                    now_ms.wrapping_add(u32::from(self.irrigation_duration_secs) * 1000),
                );
                rt.last_triggered_yday = Some(wc.day_of_year);
                channels.set(self.irrigation_channel, true, clock, relays, storage, sink);
                sink.emit(&AppEvent::IrrigationTriggered {
                    event: i,
                    duration_secs: self.irrigation_duration_secs,
                });
            }
        }
    }

    // ── Configuration ─────────────────────────────────────────

    /// Set the daily lighting budget in hours.  Negative values rejected.
    pub fn set_daily_light_min_hours(&mut self, hours: f32, storage: &mut impl StoragePort) -> bool {
        if hours < 0.0 {
            return false;
        }
        self.daily_min_secs = (hours * 3600.0) as u32;
        self.save(storage);
        true
    }

    /// Switch to computed mode: `count` evenly spaced events starting at
    /// `start_hour`.  `count = 0` yields an empty schedule.
    pub fn set_irrigation_cadence(
        &mut self,
        count: u8,
        duration_secs: u16,
        start_hour: u8,
        storage: &mut impl StoragePort,
    ) -> bool {
        if count > 24 || duration_secs == 0 {
            return false;
        }
        self.irrigation_count = count;
        self.irrigation_duration_secs = duration_secs;
        self.irrigation_start_hour = start_hour % 24;
        self.explicit = false;
        self.regenerate_times();
        self.save(storage);
        true
    }

    /// Switch to explicit mode from a CSV of `HH:MM` tokens.  Invalid
    /// tokens are skipped; the call fails — leaving the prior schedule
    /// untouched — when no valid token remains or the duration is zero.
    pub fn set_irrigation_times_csv(
        &mut self,
        csv: &str,
        duration_secs: u16,
        storage: &mut impl StoragePort,
    ) -> bool {
        if duration_secs == 0 {
            return false;
        }
        let times = parse_event_times(csv);
        if times.is_empty() {
            return false;
        }
        self.irrigation_count = times.len().min(u8::MAX as usize) as u8;
        self.irrigation_duration_secs = duration_secs;
        self.times = times;
        self.explicit = true;
        self.reset_event_runtime();
        self.save(storage);
        true
    }

    pub fn status(&self) -> AutomationStatus {
        AutomationStatus {
            daily_light_min_hours: self.daily_min_secs as f32 / 3600.0,
            daily_light_accum_hours: self.accum_secs as f32 / 3600.0,
            irrigation_count: self.irrigation_count,
            irrigation_duration_secs: self.irrigation_duration_secs,
            irrigation_start_hour: self.irrigation_start_hour,
            irrigation_explicit: self.explicit,
            irrigation_times: self.times.clone(),
            history: self.history.iter().copied().collect(),
        }
    }

    pub fn event_times(&self) -> &[u16] {
        &self.times
    }

    pub fn accumulated_secs_today(&self) -> u32 {
        self.accum_secs
    }

    pub fn history(&self) -> &[LightHistoryRecord] {
        &self.history
    }

    // ── Internal ──────────────────────────────────────────────

    /// Day boundary: archive yesterday, enforce the budget, reset trackers.
    fn roll_day(
        &mut self,
        prev_day: u16,
        wc: &WallClock,
        clock: &impl ClockPort,
        channels: &mut ChannelBank,
        relays: &mut impl RelayPort,
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        // 1. Archive the finished day, oldest record out first.
        if self.history.is_full() {
            self.history.remove(0);
        }
        let record = LightHistoryRecord {
            year: wc.year,
            day_of_year: prev_day,
            accum_secs: self.accum_secs,
        };
        // Cannot fail: capacity was just ensured.
        let _ = self.history.push(record);
        sink.emit(&AppEvent::DayRollover {
            year: wc.year,
            day_of_year: prev_day,
            accum_secs: self.accum_secs,
        });

        // 2. Persist before mutating today's state.
        self.save(storage);

        // 3. Budget catch-up: force the lights on for exactly the
        // shortfall, protected by an ad hoc minimum-on duration.
        if self.accum_secs < self.daily_min_secs {
            let shortfall = self.daily_min_secs - self.accum_secs;
            info!("Daily lights short by {} s, enforcing now", shortfall);
            channels.set(self.lights_channel, true, clock, relays, storage, sink);
            channels.schedule_lights_off_after(shortfall, clock);
            channels.set_lights_min_duration(shortfall);
            sink.emit(&AppEvent::LightsBudgetEnforced {
                shortfall_secs: shortfall,
            });
        }

        // 4. Fresh accumulator for the new day.
        self.accum_secs = 0;
        self.accum_ms_rem = 0;

        // 5. Every irrigation event may fire again today.
        for rt in &mut self.events_rt {
            rt.last_triggered_yday = None;
        }

        self.last_day_of_year = Some(wc.day_of_year);
    }

    /// Rebuild the event-time list for the current mode and reset the
    /// per-event runtime trackers.
    fn regenerate_times(&mut self) {
        if !self.explicit {
            self.times.clear();
            if self.irrigation_count > 0 {
                let interval = MINUTES_PER_DAY / u16::from(self.irrigation_count);
                let base = u16::from(self.irrigation_start_hour) * 60;
                for i in 0..u16::from(self.irrigation_count) {
                    self.times.push((base + i * interval) % MINUTES_PER_DAY);
                }
            }
        }
        self.reset_event_runtime();
    }

    fn reset_event_runtime(&mut self) {
        self.events_rt = vec![EventRuntime::default(); self.times.len()];
    }

    fn save(&self, storage: &mut impl StoragePort) {
        let doc = AutomationDoc {
            daily_min_secs: self.daily_min_secs,
            accum_secs: self.accum_secs,
            irrigation_count: self.irrigation_count,
            irrigation_duration_secs: self.irrigation_duration_secs,
            irrigation_start_hour: self.irrigation_start_hour,
            explicit_times: self.explicit.then(|| self.times.clone()),
            history: self.history.clone(),
        };
        match postcard::to_allocvec(&doc) {
            Ok(bytes) => {
                if let Err(e) = storage.write(NVS_NAMESPACE, NVS_KEY, &bytes) {
                    warn!("Automation persist failed: {}", e);
                }
            }
            Err(_) => warn!("Automation doc encode failed"),
        }
    }
}
