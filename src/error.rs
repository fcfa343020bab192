//! Unified error types for the shoe dryer firmware.
//!
//! A single `Error` enum that every subsystem converts into, so the task
//! loops handle failures uniformly.  All variants are `Copy` so they can be
//! logged and passed between tasks without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A probe could not be read or returned implausible data.
    Sensor(SensorError),
    /// An actuator command could not be applied.
    Actuator(ActuatorError),
    /// Peripheral initialisation failed.
    Init(&'static str),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The probe did not answer the start pulse.
    NoResponse,
    /// A bit or handshake edge did not arrive in time.
    Timeout,
    /// Frame checksum mismatch.
    Checksum,
    /// ADC read returned an error.
    AdcReadFailed,
    /// GPIO access failed.
    GpioFailed,
    /// Reading is outside the physically plausible range.
    OutOfRange,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoResponse => write!(f, "no response"),
            Self::Timeout => write!(f, "timed out"),
            Self::Checksum => write!(f, "checksum mismatch"),
            Self::AdcReadFailed => write!(f, "ADC read failed"),
            Self::GpioFailed => write!(f, "GPIO access failed"),
            Self::OutOfRange => write!(f, "reading out of range"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// Command addressed a bay that does not exist.
    InvalidShoe(u8),
    /// PWM duty-cycle write failed.
    PwmWriteFailed,
    /// GPIO set failed.
    GpioWriteFailed,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidShoe(i) => write!(f, "invalid shoe index {i}"),
            Self::PwmWriteFailed => write!(f, "PWM write failed"),
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Run faults
// ---------------------------------------------------------------------------

/// Conditions that end or abort a drying run.  Tracked as a bitmask so the
/// display can show every fault seen since the last reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Fault {
    /// All three probes stopped answering.
    ProbeTimeout = 0b0000_0001,
    /// A bay's motor ran past its continuous-run limit.
    SafetyTimeout = 0b0000_0010,
    /// Supply voltage below the low-battery threshold.
    LowBattery = 0b0000_0100,
}

impl Fault {
    pub const fn mask(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProbeTimeout => write!(f, "probe timeout"),
            Self::SafetyTimeout => write!(f, "motor safety timeout"),
            Self::LowBattery => write!(f, "low battery"),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
