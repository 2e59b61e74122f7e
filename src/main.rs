//! Greenhouse controller firmware — main entry point.
//!
//! Hexagonal architecture: the domain core (channel bank, thermostat,
//! automation, scheduler) talks to the outside world only through port
//! traits, and the adapters constructed here bind those ports to the
//! ESP32 platform.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                 Adapters (outer ring)                │
//! │                                                      │
//! │  HardwareAdapter   LogEventSink   NvsAdapter         │
//! │  (Relay+Climate)   (EventSink)    (StoragePort)      │
//! │  Esp32Clock (ClockPort)                              │
//! │                                                      │
//! │  ───────────── Port Trait Boundary ──────────────    │
//! │                                                      │
//! │  ┌────────────────────────────────────────────────┐  │
//! │  │           AppService (pure logic)              │  │
//! │  │  channels · thermostat · automation · cron     │  │
//! │  └────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::info;

use growbox::adapters::hardware::HardwareAdapter;
use growbox::adapters::log_sink::LogEventSink;
use growbox::adapters::nvs::NvsAdapter;
use growbox::adapters::time::Esp32Clock;
use growbox::app::service::AppService;
use growbox::config::SystemConfig;
use growbox::drivers::relay::RelayBank;
use growbox::sensors::climate::ClimateSensors;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    #[cfg(target_os = "espidf")]
    {
        esp_idf_svc::sys::link_patches();
        esp_idf_logger::init()?;
    }

    info!("growbox v{} starting", env!("CARGO_PKG_VERSION"));

    let config = SystemConfig::default();

    // ── 2. Initialise hardware peripherals ────────────────────
    if let Err(e) = growbox::drivers::hw_init::init_peripherals(config.relay_active_low) {
        // Peripheral init failure is critical — log and halt.
        log::error!("HAL init failed: {} — halting", e);
        #[allow(clippy::empty_loop)]
        loop {}
    }

    // ── 3. Storage ────────────────────────────────────────────
    // A partly broken NVS is tolerated at runtime (components log and
    // continue on failed writes); a flash that will not even initialise
    // is not.
    let mut storage = NvsAdapter::new()
        .map_err(|e| anyhow::anyhow!("NVS init failed: {}", e))?;

    // ── 4. Construct adapters ─────────────────────────────────
    let clock = Esp32Clock::new();
    let mut hw = HardwareAdapter::new(
        RelayBank::new(config.relay_active_low),
        ClimateSensors::new(),
    );
    let mut log_sink = LogEventSink::new();

    // ── 5. Construct app service ──────────────────────────────
    let mut app = AppService::new(&config, &storage);
    app.restore(&clock, &storage, &mut log_sink);

    info!("System ready. Entering control loop.");

    // ── 6. Control loop ───────────────────────────────────────
    let interval = std::time::Duration::from_millis(u64::from(config.control_loop_interval_ms));
    loop {
        std::thread::sleep(interval);
        app.tick(&clock, &mut hw, &mut storage, &mut log_sink);
    }
}
