//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).
//! A future MQTT or web adapter would implement the same trait.

use log::info;

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started => {
                info!("START | engine running");
            }
            AppEvent::ChannelChanged { ch, on } => {
                info!("RELAY | CH{} -> {}", ch, if *on { "on" } else { "off" });
            }
            AppEvent::LightsOffDeferred { delay_secs } => {
                info!("LIGHT | off deferred {} s (minimum-on)", delay_secs);
            }
            AppEvent::LightsBudgetEnforced { shortfall_secs } => {
                info!("LIGHT | budget shortfall, forcing on for {} s", shortfall_secs);
            }
            AppEvent::DayRollover {
                year,
                day_of_year,
                accum_secs,
            } => {
                info!(
                    "DAY   | {} day {} closed with {} s of light",
                    year, day_of_year, accum_secs
                );
            }
            AppEvent::IrrigationTriggered {
                event,
                duration_secs,
            } => {
                info!("WATER | event {} running {} s", event, duration_secs);
            }
            AppEvent::ThermostatTrip { reason } => {
                info!("TRIP  | thermostat disabled: {:?}", reason);
            }
            AppEvent::ThermostatSample(s) => {
                info!(
                    "THERM | T_int={:.1}\u{00b0}C T_ext={} RH_int={} RH_ext={} heater={}",
                    s.interior_c,
                    fmt_opt(s.exterior_c),
                    fmt_opt(s.interior_rh),
                    fmt_opt(s.exterior_rh),
                    if s.heater_on { "on" } else { "off" },
                );
            }
            AppEvent::ScheduleFired { index, ch, on } => {
                info!(
                    "SCHED | entry {} -> CH{} {}",
                    index,
                    ch,
                    if *on { "on" } else { "off" }
                );
            }
        }
    }
}

fn fmt_opt(v: Option<f32>) -> heapless::String<16> {
    let mut s = heapless::String::new();
    match v {
        Some(v) => {
            let _ = core::fmt::write(&mut s, format_args!("{:.1}", v));
        }
        None => {
            let _ = s.push_str("n/a");
        }
    }
    s
}
