//! Outbound application events.
//!
//! The domain components emit these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them — log to serial, publish over MQTT,
//! push to a web client, etc.

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The application service has started.
    Started,

    /// A relay channel changed logical state (1-based channel number).
    ChannelChanged { ch: u8, on: bool },

    /// A lights-off request was deferred to honour the minimum-on duration.
    LightsOffDeferred { delay_secs: u32 },

    /// The daily light budget was under-delivered at the day boundary; the
    /// lights were forced on for exactly the shortfall.
    LightsBudgetEnforced { shortfall_secs: u32 },

    /// A wall-clock day boundary was crossed; carries the just-ended day.
    DayRollover {
        year: u16,
        day_of_year: u16,
        accum_secs: u32,
    },

    /// An irrigation event time was reached (index into the event list).
    IrrigationTriggered { event: usize, duration_secs: u16 },

    /// The thermostat disabled itself via a safety interlock.
    ThermostatTrip { reason: TripReason },

    /// Rate-limited thermostat sample (at most one per wall-clock minute).
    ThermostatSample(ThermostatSampleData),

    /// A schedule entry fired.
    ScheduleFired { index: usize, ch: u8, on: bool },
}

/// Why the thermostat tripped.  Trips are sticky: `enabled` flips to false
/// and stays there until an operator reconfigures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripReason {
    /// Interior temperature reached the overtemp cutoff.
    Overtemp,
    /// Heater ran continuously past the configured maximum runtime.
    MaxRuntime,
}

/// One thermostat log sample, suitable for a CSV or time-series sink.
#[derive(Debug, Clone, Copy)]
pub struct ThermostatSampleData {
    pub interior_c: f32,
    pub exterior_c: Option<f32>,
    pub interior_rh: Option<f32>,
    pub exterior_rh: Option<f32>,
    pub heater_on: bool,
}
