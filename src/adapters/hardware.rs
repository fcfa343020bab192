//! Hardware adapters: bridge real peripherals to the domain port traits.
//!
//! | Adapter         | Implements                  | Connects to                 |
//! |-----------------|-----------------------------|-----------------------------|
//! | `DhtProbeBank`  | ProbePort                   | 3 × DHT22 (open-drain GPIO) |
//! | `SimProbeBank`  | ProbePort                   | injected atomics (host)     |
//! | `OutputStage`   | ActuatorPort                | motor PWM, heater relays, UV|
//! | `PanelIo`       | IndicatorPort, BatteryPort  | LEDs, battery ADC, buttons  |
//!
//! These are the only types in the system that touch actual hardware.  On
//! non-espidf targets the underlying drivers fall back to in-memory stubs.

use log::warn;

use crate::app::ports::{ActuatorPort, BatteryPort, EventQueue, IndicatorPort, ProbePort, RawSample};
use crate::config::{PROBE_COUNT, SHOE_COUNT};
use crate::drivers::button::{Button, ButtonDriver};
use crate::drivers::heater::HeaterRelay;
use crate::drivers::indicator::IndicatorLeds;
use crate::drivers::motor::MotorPwm;
use crate::drivers::uvc::UvcDriver;
use crate::error::SensorError;
use crate::sensors::battery::BatteryMonitor;

// ── Probes (ESP-IDF) ──────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use esp::{DhtProbeBank, ProbePin};

#[cfg(target_os = "espidf")]
mod esp {
    use esp_idf_hal::delay::Ets;
    use esp_idf_hal::gpio::{AnyIOPin, InputOutput, PinDriver};

    use crate::app::ports::{ProbePort, RawSample};
    use crate::config::PROBE_COUNT;
    use crate::error::SensorError;
    use crate::sensors::dht::Dht22;

    /// Open-drain data line of one probe.
    pub type ProbePin = PinDriver<'static, AnyIOPin, InputOutput>;

    /// The three DHT22 probes, ambient first.
    pub struct DhtProbeBank {
        probes: [Dht22<ProbePin, Ets>; PROBE_COUNT],
    }

    impl DhtProbeBank {
        pub fn new(pins: [ProbePin; PROBE_COUNT]) -> Self {
            Self {
                probes: pins.map(|p| Dht22::new(p, Ets)),
            }
        }
    }

    impl ProbePort for DhtProbeBank {
        fn read_probe(&mut self, probe: usize) -> Result<RawSample, SensorError> {
            self.probes
                .get_mut(probe)
                .ok_or(SensorError::NoResponse)?
                .read()
        }
    }
}

// ── Probes (simulation) ───────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
mod sim {
    use crate::bus::snapshot::AtomicOptF32;
    use crate::config::PROBE_COUNT;

    pub(super) static SIM_TEMP: [AtomicOptF32; PROBE_COUNT] =
        [const { AtomicOptF32::none() }; PROBE_COUNT];
    pub(super) static SIM_RH: [AtomicOptF32; PROBE_COUNT] =
        [const { AtomicOptF32::none() }; PROBE_COUNT];
}

/// Inject what simulated probe `probe` reports; `None` makes it stop answering.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_probe(probe: usize, reading: Option<(f32, f32)>) {
    if probe < PROBE_COUNT {
        sim::SIM_TEMP[probe].store(reading.map(|r| r.0));
        sim::SIM_RH[probe].store(reading.map(|r| r.1));
    }
}

/// Probe bank reading the injected simulation values.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
pub struct SimProbeBank;

#[cfg(not(target_os = "espidf"))]
impl ProbePort for SimProbeBank {
    fn read_probe(&mut self, probe: usize) -> Result<RawSample, SensorError> {
        if probe >= PROBE_COUNT {
            return Err(SensorError::NoResponse);
        }
        match (sim::SIM_TEMP[probe].load(), sim::SIM_RH[probe].load()) {
            (Some(temp_c), Some(rh_pct)) => Ok(RawSample { temp_c, rh_pct }),
            _ => Err(SensorError::NoResponse),
        }
    }
}

// ── Output stage ──────────────────────────────────────────────

/// Both bays' motor and heater plus the shared UV lamp.
pub struct OutputStage {
    motors: [MotorPwm; SHOE_COUNT],
    heaters: [HeaterRelay; SHOE_COUNT],
    uv: UvcDriver,
}

impl Default for OutputStage {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputStage {
    pub fn new() -> Self {
        Self {
            motors: core::array::from_fn(MotorPwm::new),
            heaters: core::array::from_fn(HeaterRelay::new),
            uv: UvcDriver::new(),
        }
    }

    pub fn motor_duty(&self, shoe: usize) -> u8 {
        self.motors.get(shoe).map_or(0, MotorPwm::duty)
    }

    pub fn heater_on(&self, shoe: usize) -> bool {
        self.heaters.get(shoe).is_some_and(HeaterRelay::is_on)
    }

    pub fn uv_duty(&self) -> u8 {
        self.uv.current_duty()
    }
}

impl ActuatorPort for OutputStage {
    fn set_motor_duty(&mut self, shoe: usize, duty: u8) {
        let Some(m) = self.motors.get_mut(shoe) else {
            return;
        };
        if let Err(e) = m.set(duty) {
            warn!("OUT: motor {shoe}: {e}");
        }
    }

    fn set_heater(&mut self, shoe: usize, on: bool) {
        let Some(h) = self.heaters.get_mut(shoe) else {
            return;
        };
        if let Err(e) = h.set(on) {
            warn!("OUT: heater {shoe}: {e}");
        }
    }

    fn set_uv_duty(&mut self, duty: u8) {
        if let Err(e) = self.uv.set_duty(duty) {
            warn!("OUT: UV: {e}");
        }
    }

    fn all_off(&mut self) {
        for i in 0..SHOE_COUNT {
            self.set_motor_duty(i, 0);
            self.set_heater(i, false);
        }
        self.set_uv_duty(0);
    }
}

// ── Operator panel ────────────────────────────────────────────

/// LEDs, battery sense and the Start/Reset buttons.
pub struct PanelIo {
    leds: IndicatorLeds,
    battery: BatteryMonitor,
    buttons: [ButtonDriver; 2],
}

impl PanelIo {
    pub fn new(debounce_ms: u32) -> Self {
        Self {
            leds: IndicatorLeds::new(),
            battery: BatteryMonitor::new(),
            buttons: [
                ButtonDriver::new(Button::Start, debounce_ms),
                ButtonDriver::new(Button::Reset, debounce_ms),
            ],
        }
    }

    /// Post a press event for every debounced button edge.
    pub fn poll_buttons(&mut self, now_ms: u32, events: &mut impl EventQueue) {
        for b in &mut self.buttons {
            if let Some(ev) = b.tick(now_ms) {
                log::info!("PANEL: {:?} pressed", b.button());
                events.post(ev);
            }
        }
    }

    pub fn leds(&self) -> (bool, bool) {
        self.leds.levels()
    }
}

impl IndicatorPort for PanelIo {
    fn set_status_led(&mut self, on: bool) {
        self.leds.set_status(on);
    }

    fn set_error_led(&mut self, on: bool) {
        self.leds.set_error(on);
    }
}

impl BatteryPort for PanelIo {
    fn read_voltage(&mut self) -> Option<f32> {
        self.battery.read_voltage()
    }
}
