//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ SensorFrontEnd / Coordinator / ActuatorDriver
//! ```
//!
//! Driven adapters (probes, output stage, LEDs, battery, event sinks)
//! implement these traits.  The domain consumes them via generics, so the
//! control code never touches hardware directly and every test can swap in
//! a mock.

use crate::error::SensorError;

pub use crate::bus::{CommandPort, EventQueue};

// ───────────────────────────────────────────────────────────────
// Probe port (hardware → sensor front-end)
// ───────────────────────────────────────────────────────────────

/// One raw temperature / relative-humidity reading, not yet validated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    pub temp_c: f32,
    pub rh_pct: f32,
}

/// Reads a single probe.  Index 0 is ambient, 1 and 2 are the shoe probes.
pub trait ProbePort {
    fn read_probe(&mut self, probe: usize) -> Result<RawSample, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (actuator driver → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port owned exclusively by the actuator driver.
pub trait ActuatorPort {
    /// Motor PWM duty for one bay (0–100 %).
    fn set_motor_duty(&mut self, shoe: usize, duty: u8);

    /// Heater relay for one bay.
    fn set_heater(&mut self, shoe: usize, on: bool);

    /// Shared UV lamp PWM duty (0–100 %).
    fn set_uv_duty(&mut self, duty: u8);

    /// Kill every output immediately.
    fn all_off(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Indicator port (coordinator → LEDs)
// ───────────────────────────────────────────────────────────────

pub trait IndicatorPort {
    fn set_status_led(&mut self, on: bool);
    fn set_error_led(&mut self, on: bool);
}

// ───────────────────────────────────────────────────────────────
// Battery port
// ───────────────────────────────────────────────────────────────

pub trait BatteryPort {
    /// Averaged battery voltage, `None` if the ADC read failed.
    fn read_voltage(&mut self) -> Option<f32>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go (serial log, CSV).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}
