//! Shoe dryer firmware: main entry point.
//!
//! Hexagonal architecture, three pinned tasks sharing lock-free state.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  DhtProbeBank   OutputStage    PanelIo          LogEventSink   │
//! │  (ProbePort)    (ActuatorPort) (LEDs+Battery)   (EventSink)    │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  sensors (core 0, 3 s)   coordinator (core 1, 50 ms)           │
//! │  SensorFrontEnd ──▶ SENSORS ──▶ Coordinator ──Command──┐       │
//! │        │                          ▲   global + 2 shoe  │       │
//! │        └──────── Event ───────────┤   machines         ▼       │
//! │                                   └── Event ── ActuatorDriver  │
//! │                                          (core 1, 100 ms)      │
//! └────────────────────────────────────────────────────────────────┘
//! ```

#![deny(unused_must_use)]

use anyhow::{Context, Result};
use esp_idf_hal::gpio::{AnyIOPin, IOPin, PinDriver};
use esp_idf_hal::peripherals::Peripherals;
use log::{debug, error, info};

use shoedryer::actuator::ActuatorDriver;
use shoedryer::adapters::hardware::{DhtProbeBank, OutputStage, PanelIo, ProbePin};
use shoedryer::adapters::log_sink::LogEventSink;
use shoedryer::adapters::time::MonotonicClock;
use shoedryer::app::coordinator::Coordinator;
use shoedryer::app::display::DisplaySnapshot;
use shoedryer::bus::channels::ChannelBus;
use shoedryer::bus::snapshot::{ACTUATORS, SENSORS};
use shoedryer::config::DryerConfig;
use shoedryer::drivers::hw_init;
use shoedryer::drivers::task_pin::{Core, spawn_on_core};
use shoedryer::drivers::watchdog::Watchdog;
use shoedryer::sensors::SensorFrontEnd;

/// Telemetry and display refresh period.
const TELEMETRY_PERIOD_MS: u32 = 1_000;

fn sleep_until_next(clock: &MonotonicClock, started_ms: u32, period_ms: u32) {
    let spent = clock.now_ms().wrapping_sub(started_ms);
    std::thread::sleep(std::time::Duration::from_millis(
        u64::from(period_ms.saturating_sub(spent).max(1)),
    ));
}

fn open_probe(pin: AnyIOPin) -> Result<ProbePin> {
    let mut drv = PinDriver::input_output_od(pin)?;
    // Idle level is high; the driver pulls low only for the start pulse.
    drv.set_high()?;
    Ok(drv)
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  ShoeDryer v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Configuration ──────────────────────────────────────
    let config = DryerConfig::default();
    config.validate().context("default configuration rejected")?;
    match serde_json::to_string(&config) {
        Ok(json) => info!("Config: {json}"),
        Err(e) => error!("Config dump failed: {e}"),
    }

    // ── 3. Peripherals ────────────────────────────────────────
    if let Err(e) = hw_init::init_peripherals() {
        // Outputs are still in their reset state; nothing can run safely.
        error!("HAL init failed: {e}, halting");
        return Err(shoedryer::error::Error::from(e)).context("peripheral init");
    }
    if let Err(e) = hw_init::init_isr_service() {
        error!("ISR service init failed: {e}, buttons disabled");
    }

    let peripherals = Peripherals::take()?;
    let pins = peripherals.pins;
    let probes = DhtProbeBank::new([
        open_probe(pins.gpio17.downgrade())?,
        open_probe(pins.gpio16.downgrade())?,
        open_probe(pins.gpio4.downgrade())?,
    ]);

    let clock = MonotonicClock::new();

    // ── 4. Sensor task (core 0) ───────────────────────────────
    let sensor_cfg = config.clone();
    spawn_on_core(Core::Pro, 5, 6, "sensors\0", move || {
        let wdt = Watchdog::subscribe("sensors");
        let mut probes = probes;
        let mut front = SensorFrontEnd::new(&sensor_cfg);
        let mut bus = ChannelBus;
        loop {
            let now = clock.now_ms();
            let snap = front.sample(now, &mut probes, &mut bus);
            SENSORS.publish(&snap);
            wdt.feed();
            sleep_until_next(&clock, now, sensor_cfg.sensor_period_ms);
        }
    })?;

    // ── 5. Actuator task (core 1) ─────────────────────────────
    let act_cfg = config.clone();
    spawn_on_core(Core::App, 6, 6, "actuators\0", move || {
        let wdt = Watchdog::subscribe("actuators");
        let mut outputs = OutputStage::new();
        let mut driver = ActuatorDriver::new(&act_cfg);
        let mut bus = ChannelBus;
        loop {
            let now = clock.now_ms();
            let snap = SENSORS.load();
            driver.tick(now, &snap, &mut bus, &mut outputs);
            ACTUATORS.publish(&driver.status(now));
            wdt.feed();
            sleep_until_next(&clock, now, act_cfg.actuator_period_ms);
        }
    })?;

    // ── 6. Coordinator (this task, core 1) ────────────────────
    let wdt = Watchdog::subscribe("coordinator");
    let mut panel = PanelIo::new(config.debounce_ms);
    let mut bus = ChannelBus;

    #[cfg(feature = "telemetry-csv")]
    let mut sink = shoedryer::adapters::telemetry::CsvTelemetry::new(LogEventSink::new());
    #[cfg(not(feature = "telemetry-csv"))]
    let mut sink = LogEventSink::new();

    let period = config.coordinator_period_ms;
    let mut coord = Coordinator::new(config);
    coord.start(clock.now_ms(), &mut bus, &mut sink);
    let mut last_telemetry = clock.now_ms();

    info!("System ready. Entering coordinator loop.");

    loop {
        let now = clock.now_ms();
        panel.poll_buttons(now, &mut bus);

        let snap = SENSORS.load();
        coord.tick(now, &snap, &mut bus, &mut panel, &mut sink);

        if now.wrapping_sub(last_telemetry) >= TELEMETRY_PERIOD_MS {
            last_telemetry = now;
            let act = ACTUATORS.load();
            coord.emit_telemetry(&act, &mut sink);
            debug!("DISPLAY: {:?}", DisplaySnapshot::build(&coord, &snap, &act));
        }

        wdt.feed();
        sleep_until_next(&clock, now, period);
    }
}
