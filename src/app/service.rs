//! Application service: owns the domain components and runs the control
//! cycle.
//!
//! ```text
//!              ┌──────────────────────────────────────┐
//!   ClockPort ─┤  AppService                          │
//! ClimatePort ─┤   channel bank ─ thermostat          ├─ RelayPort
//! StoragePort ─┤   automation   ─ scheduler           ├─ EventSink
//!              └──────────────────────────────────────┘
//! ```
//!
//! Tick order is fixed: channel bank (deferred-off resolution) first so a
//! forced-off channel is visible to everything downstream within the same
//! cycle, then thermostat, automation, scheduler.  The climate sensors are
//! read once per cycle and the snapshot shared.

use log::info;
use serde::Serialize;

use crate::app::events::AppEvent;
use crate::app::ports::{ClimatePort, ClockPort, EventSink, RelayPort, StoragePort};
use crate::automation::{Automation, AutomationStatus};
use crate::channels::ChannelBank;
use crate::config::{CHANNEL_COUNT, SystemConfig};
use crate::scheduler::{ScheduleEntry, Scheduler};
use crate::thermostat::{Thermostat, ThermostatStatus};

/// Combined read-model, rendered as JSON for status consumers (serial
/// console today, a web endpoint later).
#[derive(Serialize)]
pub struct StatusReport<'a> {
    pub channels: [bool; CHANNEL_COUNT],
    pub thermostat: ThermostatStatus,
    pub automation: AutomationStatus,
    pub schedule: &'a [ScheduleEntry],
}

pub struct AppService {
    channels: ChannelBank,
    thermostat: Thermostat,
    automation: Automation,
    scheduler: Scheduler,
}

impl AppService {
    /// Build the service, loading each component's persisted state.
    pub fn new(config: &SystemConfig, storage: &impl StoragePort) -> Self {
        Self {
            channels: ChannelBank::new(config),
            thermostat: Thermostat::new(config, storage),
            automation: Automation::new(config, storage),
            scheduler: Scheduler::new(storage),
        }
    }

    /// Post-boot recovery: re-arm the lights minimum-on timer from the
    /// persisted epoch, then announce the start.
    pub fn restore(
        &mut self,
        clock: &impl ClockPort,
        storage: &impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        self.channels.restore(clock, storage);
        info!("Application service started");
        sink.emit(&AppEvent::Started);
    }

    /// One control cycle.  Call at the configured loop interval.
    pub fn tick(
        &mut self,
        clock: &impl ClockPort,
        hw: &mut (impl RelayPort + ClimatePort),
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        self.channels.tick(clock, hw, storage, sink);
        let snap = hw.read_climate();
        self.thermostat
            .tick(&snap, clock, &mut self.channels, hw, storage, sink);
        self.automation
            .tick(clock, &mut self.channels, hw, storage, sink);
        self.scheduler
            .tick(clock, &mut self.channels, hw, storage, sink);
    }

    // ── Channels ──────────────────────────────────────────────

    pub fn set_channel(
        &mut self,
        ch: u8,
        on: bool,
        clock: &impl ClockPort,
        relays: &mut impl RelayPort,
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) -> bool {
        self.channels.set(ch, on, clock, relays, storage, sink)
    }

    pub fn channel_state(&self, ch: u8) -> bool {
        self.channels.get(ch)
    }

    pub fn channel_states(&self) -> [bool; CHANNEL_COUNT] {
        self.channels.states()
    }

    pub fn set_lights_min_duration(&mut self, secs: u32) {
        self.channels.set_lights_min_duration(secs);
    }

    // ── Thermostat ────────────────────────────────────────────

    pub fn configure_thermostat(
        &mut self,
        setpoint_c: f32,
        hysteresis_c: f32,
        enabled: bool,
        storage: &mut impl StoragePort,
    ) -> bool {
        self.thermostat
            .configure(setpoint_c, hysteresis_c, enabled, storage)
    }

    pub fn configure_thermostat_advanced(
        &mut self,
        max_runtime_secs: u32,
        overtemp_cutoff_c: f32,
        exterior_limit_c: f32,
        logging_enabled: bool,
        storage: &mut impl StoragePort,
    ) -> bool {
        self.thermostat.configure_advanced(
            max_runtime_secs,
            overtemp_cutoff_c,
            exterior_limit_c,
            logging_enabled,
            storage,
        )
    }

    pub fn thermostat_status(&self, clock: &impl ClockPort) -> ThermostatStatus {
        self.thermostat.status(clock)
    }

    // ── Automation ────────────────────────────────────────────

    pub fn set_daily_light_min_hours(
        &mut self,
        hours: f32,
        storage: &mut impl StoragePort,
    ) -> bool {
        self.automation.set_daily_light_min_hours(hours, storage)
    }

    pub fn set_irrigation_cadence(
        &mut self,
        count: u8,
        duration_secs: u16,
        start_hour: u8,
        storage: &mut impl StoragePort,
    ) -> bool {
        self.automation
            .set_irrigation_cadence(count, duration_secs, start_hour, storage)
    }

    pub fn set_irrigation_times_csv(
        &mut self,
        csv: &str,
        duration_secs: u16,
        storage: &mut impl StoragePort,
    ) -> bool {
        self.automation
            .set_irrigation_times_csv(csv, duration_secs, storage)
    }

    pub fn automation_status(&self) -> AutomationStatus {
        self.automation.status()
    }

    // ── Scheduler ─────────────────────────────────────────────

    pub fn schedule_add(&mut self, entry: ScheduleEntry, storage: &mut impl StoragePort) -> bool {
        self.scheduler.add(entry, storage)
    }

    pub fn schedule_edit(
        &mut self,
        index: usize,
        entry: ScheduleEntry,
        storage: &mut impl StoragePort,
    ) -> bool {
        self.scheduler.edit(index, entry, storage)
    }

    pub fn schedule_remove(&mut self, index: usize, storage: &mut impl StoragePort) -> bool {
        self.scheduler.remove(index, storage)
    }

    pub fn schedule_set_enabled(
        &mut self,
        index: usize,
        enabled: bool,
        storage: &mut impl StoragePort,
    ) -> bool {
        self.scheduler.set_enabled(index, enabled, storage)
    }

    pub fn schedule_entries(&self) -> &[ScheduleEntry] {
        self.scheduler.entries()
    }

    // ── Status ────────────────────────────────────────────────

    pub fn status(&self, clock: &impl ClockPort) -> StatusReport<'_> {
        StatusReport {
            channels: self.channels.states(),
            thermostat: self.thermostat.status(clock),
            automation: self.automation.status(),
            schedule: self.scheduler.entries(),
        }
    }

    /// Full status document as JSON.
    pub fn status_json(&self, clock: &impl ClockPort) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.status(clock))
    }
}
