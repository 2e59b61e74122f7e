//! Hysteresis thermostat with safety interlocks.
//!
//! Bang-bang control of the heater channel around a setpoint, with three
//! interlocks evaluated each tick in priority order:
//!
//! 1. **Overtemp cutoff** — interior at or above the cutoff forces the
//!    heater off and disables the thermostat.  Hard trip: stays disabled
//!    until an operator reconfigures.
//! 2. **Exterior block** — while the exterior sensor reads at or above the
//!    block limit the heater may not turn on (and turns off if on).  Soft:
//!    recomputed every tick, never persisted.
//! 3. **Max runtime** — continuous heater runtime at or above the
//!    configured limit trips like overtemp.
//!
//! A missing interior reading holds the previous actuator state — flapping
//! the heater on every sensor glitch is worse than holding briefly.
//!
//! The heater is volatile state: it always boots off, regardless of what it
//! was doing before the power cut.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::app::events::{AppEvent, ThermostatSampleData, TripReason};
use crate::app::ports::{ClimateSnapshot, ClockPort, EventSink, RelayPort, StoragePort};
use crate::channels::ChannelBank;
use crate::config::SystemConfig;

const NVS_NAMESPACE: &str = "thermostat";
const NVS_KEY: &str = "config";

/// Persisted thermostat configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ThermostatConfig {
    pub setpoint_c: f32,
    /// Half-width of the dead band; never negative.
    pub hysteresis_c: f32,
    pub enabled: bool,
    /// Continuous-runtime trip limit in seconds; 0 disables the check.
    pub max_runtime_secs: u32,
    /// Interior temperature that forces a hard trip.
    pub overtemp_cutoff_c: f32,
    /// Exterior temperature at or above which the heater is blocked.
    pub exterior_limit_c: f32,
    pub logging_enabled: bool,
}

impl Default for ThermostatConfig {
    fn default() -> Self {
        Self {
            setpoint_c: 23.0,
            hysteresis_c: 0.5,
            enabled: false,
            max_runtime_secs: 0,
            // Deliberately far out of range until configured.
            overtemp_cutoff_c: 200.0,
            exterior_limit_c: 200.0,
            logging_enabled: false,
        }
    }
}

/// Read-model of the thermostat for the presentation layer.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ThermostatStatus {
    pub setpoint_c: f32,
    pub hysteresis_c: f32,
    pub enabled: bool,
    pub max_runtime_secs: u32,
    pub overtemp_cutoff_c: f32,
    pub exterior_limit_c: f32,
    pub logging_enabled: bool,
    pub heater_on: bool,
    /// Continuous runtime of the current heat cycle, 0 when off.
    pub heater_run_secs: u32,
}

pub struct Thermostat {
    cfg: ThermostatConfig,
    heater_channel: u8,
    heater_on: bool,
    heater_on_since_ms: Option<u32>,
    last_log_minute: Option<u8>,
}

impl Thermostat {
    /// Load persisted configuration (or defaults on first boot).
    pub fn new(config: &SystemConfig, storage: &impl StoragePort) -> Self {
        let mut buf = [0u8; 64];
        let cfg = storage
            .read(NVS_NAMESPACE, NVS_KEY, &mut buf)
            .ok()
            .and_then(|len| postcard::from_bytes(&buf[..len]).ok())
            .unwrap_or_default();
        Self {
            cfg,
            heater_channel: config.heater_channel,
            heater_on: false,
            heater_on_since_ms: None,
            last_log_minute: None,
        }
    }

    /// One control cycle.
    pub fn tick(
        &mut self,
        snap: &ClimateSnapshot,
        clock: &impl ClockPort,
        channels: &mut ChannelBank,
        relays: &mut impl RelayPort,
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        if !self.cfg.enabled {
            return;
        }
        // Sensor fault: hold state rather than flap.
        let Some(temp) = snap.interior_c else {
            return;
        };

        // 1. Overtemp cutoff — hard trip.
        if temp >= self.cfg.overtemp_cutoff_c {
            self.trip(TripReason::Overtemp, clock, channels, relays, storage, sink);
            return;
        }

        // 2. Exterior block — soft, recomputed every tick.
        let ext_block = snap
            .exterior_c
            .is_some_and(|t| t >= self.cfg.exterior_limit_c);

        // 3. Max runtime — hard trip.
        if self.heater_on && self.cfg.max_runtime_secs > 0 {
            if let Some(since) = self.heater_on_since_ms {
                let run_secs = clock.elapsed_ms().wrapping_sub(since) / 1000;
                if run_secs >= self.cfg.max_runtime_secs {
                    self.trip(TripReason::MaxRuntime, clock, channels, relays, storage, sink);
                    return;
                }
            }
        }

        // Bang-bang with hysteresis.  Inside the band: no change.
        if temp <= self.cfg.setpoint_c - self.cfg.hysteresis_c && !ext_block {
            if !self.heater_on {
                channels.set(self.heater_channel, true, clock, relays, storage, sink);
                self.heater_on = true;
                self.heater_on_since_ms = Some(clock.elapsed_ms());
            }
        } else if (temp >= self.cfg.setpoint_c + self.cfg.hysteresis_c || ext_block)
            && self.heater_on
        {
            channels.set(self.heater_channel, false, clock, relays, storage, sink);
            self.heater_on = false;
            self.heater_on_since_ms = None;
        }

        // Rate-limited sample: at most one per wall-clock minute.
        if self.cfg.logging_enabled {
            if let Some(wc) = clock.wall_clock() {
                if self.last_log_minute != Some(wc.minute) {
                    self.last_log_minute = Some(wc.minute);
                    sink.emit(&AppEvent::ThermostatSample(ThermostatSampleData {
                        interior_c: temp,
                        exterior_c: snap.exterior_c,
                        interior_rh: snap.interior_rh,
                        exterior_rh: snap.exterior_rh,
                        heater_on: self.heater_on,
                    }));
                }
            }
        }
    }

    /// Set the basic control parameters.  Rejects negative hysteresis.
    pub fn configure(
        &mut self,
        setpoint_c: f32,
        hysteresis_c: f32,
        enabled: bool,
        storage: &mut impl StoragePort,
    ) -> bool {
        if hysteresis_c < 0.0 {
            return false;
        }
        self.cfg.setpoint_c = setpoint_c;
        self.cfg.hysteresis_c = hysteresis_c;
        self.cfg.enabled = enabled;
        self.save(storage);
        true
    }

    /// Set the safety parameters.  Values are clamped by usage, not
    /// validation — there are no rejected inputs.
    pub fn configure_advanced(
        &mut self,
        max_runtime_secs: u32,
        overtemp_cutoff_c: f32,
        exterior_limit_c: f32,
        logging_enabled: bool,
        storage: &mut impl StoragePort,
    ) -> bool {
        self.cfg.max_runtime_secs = max_runtime_secs;
        self.cfg.overtemp_cutoff_c = overtemp_cutoff_c;
        self.cfg.exterior_limit_c = exterior_limit_c;
        self.cfg.logging_enabled = logging_enabled;
        self.save(storage);
        true
    }

    pub fn status(&self, clock: &impl ClockPort) -> ThermostatStatus {
        let heater_run_secs = match (self.heater_on, self.heater_on_since_ms) {
            (true, Some(since)) => clock.elapsed_ms().wrapping_sub(since) / 1000,
            _ => 0,
        };
        ThermostatStatus {
            setpoint_c: self.cfg.setpoint_c,
            hysteresis_c: self.cfg.hysteresis_c,
            enabled: self.cfg.enabled,
            max_runtime_secs: self.cfg.max_runtime_secs,
            overtemp_cutoff_c: self.cfg.overtemp_cutoff_c,
            exterior_limit_c: self.cfg.exterior_limit_c,
            logging_enabled: self.cfg.logging_enabled,
            heater_on: self.heater_on,
            heater_run_secs,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.cfg.enabled
    }

    // ── Internal ──────────────────────────────────────────────

    fn trip(
        &mut self,
        reason: TripReason,
        clock: &impl ClockPort,
        channels: &mut ChannelBank,
        relays: &mut impl RelayPort,
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        if self.heater_on {
            channels.set(self.heater_channel, false, clock, relays, storage, sink);
            self.heater_on = false;
            self.heater_on_since_ms = None;
        }
        self.cfg.enabled = false;
        self.save(storage);
        warn!("Thermostat disabled: {:?} trip", reason);
        sink.emit(&AppEvent::ThermostatTrip { reason });
    }

    fn save(&self, storage: &mut impl StoragePort) {
        match postcard::to_allocvec(&self.cfg) {
            Ok(bytes) => {
                if let Err(e) = storage.write(NVS_NAMESPACE, NVS_KEY, &bytes) {
                    warn!("Thermostat config persist failed: {}", e);
                }
            }
            Err(_) => warn!("Thermostat config encode failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MemoryStorage, NullSink, RelaySpy, SimClock, SinkSpy, wall};

    struct Rig {
        thermo: Thermostat,
        channels: ChannelBank,
        clock: SimClock,
        relays: RelaySpy,
        storage: MemoryStorage,
    }

    fn rig() -> Rig {
        let config = SystemConfig::default();
        let storage = MemoryStorage::new();
        Rig {
            thermo: Thermostat::new(&config, &storage),
            channels: ChannelBank::new(&config),
            clock: SimClock::new(),
            relays: RelaySpy::new(),
            storage,
        }
    }

    fn snap(interior: Option<f32>, exterior: Option<f32>) -> ClimateSnapshot {
        ClimateSnapshot {
            interior_c: interior,
            exterior_c: exterior,
            interior_rh: None,
            exterior_rh: None,
        }
    }

    fn tick(r: &mut Rig, interior: Option<f32>, exterior: Option<f32>) {
        let mut sink = NullSink;
        let s = snap(interior, exterior);
        r.thermo.tick(
            &s,
            &r.clock,
            &mut r.channels,
            &mut r.relays,
            &mut r.storage,
            &mut sink,
        );
    }

    #[test]
    fn cold_turns_heater_on_warm_turns_it_off() {
        let mut r = rig();
        assert!(r.thermo.configure(23.0, 0.5, true, &mut r.storage));

        tick(&mut r, Some(22.4), None);
        assert!(r.channels.get(1));

        tick(&mut r, Some(23.6), None);
        assert!(!r.channels.get(1));
    }

    #[test]
    fn inside_band_holds_state_both_directions() {
        let mut r = rig();
        r.thermo.configure(23.0, 0.5, true, &mut r.storage);

        // Approach from below: heater on, band reading keeps it on.
        tick(&mut r, Some(22.4), None);
        assert!(r.channels.get(1));
        tick(&mut r, Some(23.0), None);
        assert!(r.channels.get(1));

        // Approach from above: heater off, band reading keeps it off.
        tick(&mut r, Some(23.6), None);
        assert!(!r.channels.get(1));
        tick(&mut r, Some(23.0), None);
        assert!(!r.channels.get(1));
    }

    #[test]
    fn missing_reading_holds_state() {
        let mut r = rig();
        r.thermo.configure(23.0, 0.5, true, &mut r.storage);

        tick(&mut r, Some(22.0), None);
        assert!(r.channels.get(1));

        tick(&mut r, None, None);
        assert!(r.channels.get(1));
    }

    #[test]
    fn overtemp_trip_is_sticky() {
        let mut r = rig();
        r.thermo.configure(23.0, 0.5, true, &mut r.storage);
        r.thermo
            .configure_advanced(0, 40.0, 200.0, false, &mut r.storage);

        tick(&mut r, Some(22.0), None);
        assert!(r.channels.get(1));

        tick(&mut r, Some(40.0), None);
        assert!(!r.channels.get(1));
        assert!(!r.thermo.is_enabled());

        // Far below the cutoff afterwards: still disabled, heater stays off.
        tick(&mut r, Some(10.0), None);
        assert!(!r.channels.get(1));
        assert!(!r.thermo.is_enabled());
    }

    #[test]
    fn trip_emits_event_and_persists_disable() {
        let mut r = rig();
        r.thermo.configure(23.0, 0.5, true, &mut r.storage);
        r.thermo
            .configure_advanced(0, 40.0, 200.0, false, &mut r.storage);

        let mut sink = SinkSpy::new();
        let s = snap(Some(45.0), None);
        r.thermo.tick(
            &s,
            &r.clock,
            &mut r.channels,
            &mut r.relays,
            &mut r.storage,
            &mut sink,
        );
        assert!(sink.events.iter().any(|e| matches!(
            e,
            AppEvent::ThermostatTrip {
                reason: TripReason::Overtemp
            }
        )));

        // A fresh load sees the persisted disable.
        let reloaded = Thermostat::new(&SystemConfig::default(), &r.storage);
        assert!(!reloaded.is_enabled());
    }

    #[test]
    fn exterior_block_prevents_on_and_forces_off() {
        let mut r = rig();
        r.thermo.configure(23.0, 0.5, true, &mut r.storage);
        r.thermo
            .configure_advanced(0, 200.0, 30.0, false, &mut r.storage);

        // Cold inside but hot outside: may not turn on.
        tick(&mut r, Some(20.0), Some(35.0));
        assert!(!r.channels.get(1));

        // Exterior cools: heater allowed.
        tick(&mut r, Some(20.0), Some(10.0));
        assert!(r.channels.get(1));

        // Exterior heats back up: running heater is turned off.
        tick(&mut r, Some(20.0), Some(35.0));
        assert!(!r.channels.get(1));
        // Soft block: thermostat itself stays enabled.
        assert!(r.thermo.is_enabled());
    }

    #[test]
    fn max_runtime_trips_after_continuous_run() {
        let mut r = rig();
        r.thermo.configure(23.0, 0.5, true, &mut r.storage);
        r.thermo
            .configure_advanced(600, 200.0, 200.0, false, &mut r.storage);

        tick(&mut r, Some(20.0), None);
        assert!(r.channels.get(1));

        r.clock.advance_ms(599_000);
        tick(&mut r, Some(20.0), None);
        assert!(r.channels.get(1));

        r.clock.advance_ms(1_000);
        tick(&mut r, Some(20.0), None);
        assert!(!r.channels.get(1));
        assert!(!r.thermo.is_enabled());
    }

    #[test]
    fn negative_hysteresis_rejected() {
        let mut r = rig();
        assert!(!r.thermo.configure(23.0, -0.1, true, &mut r.storage));
        assert!(!r.thermo.is_enabled());
    }

    #[test]
    fn disabled_thermostat_never_commands() {
        let mut r = rig();
        tick(&mut r, Some(0.0), None);
        assert!(!r.channels.get(1));
    }

    #[test]
    fn sample_logged_at_most_once_per_minute() {
        let mut r = rig();
        r.thermo.configure(23.0, 0.5, true, &mut r.storage);
        r.thermo
            .configure_advanced(0, 200.0, 200.0, true, &mut r.storage);
        r.clock.set_wall(wall(2025, 100, 2, 12, 30));

        let mut sink = SinkSpy::new();
        for _ in 0..50 {
            let s = snap(Some(23.0), None);
            r.thermo.tick(
                &s,
                &r.clock,
                &mut r.channels,
                &mut r.relays,
                &mut r.storage,
                &mut sink,
            );
        }
        let samples = sink
            .events
            .iter()
            .filter(|e| matches!(e, AppEvent::ThermostatSample(_)))
            .count();
        assert_eq!(samples, 1);

        // Next minute: one more.
        r.clock.set_wall(wall(2025, 100, 2, 12, 31));
        let s = snap(Some(23.0), None);
        r.thermo.tick(
            &s,
            &r.clock,
            &mut r.channels,
            &mut r.relays,
            &mut r.storage,
            &mut sink,
        );
        let samples = sink
            .events
            .iter()
            .filter(|e| matches!(e, AppEvent::ThermostatSample(_)))
            .count();
        assert_eq!(samples, 2);
    }

    #[test]
    fn persist_failure_keeps_in_memory_config() {
        let mut r = rig();
        r.storage.fail_writes = true;
        assert!(r.thermo.configure(25.0, 1.0, true, &mut r.storage));
        assert!(r.thermo.is_enabled());
        let status = r.thermo.status(&r.clock);
        assert_eq!(status.setpoint_c, 25.0);
    }
}
