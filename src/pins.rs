//! GPIO / peripheral pin assignments for the two-bay dryer board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.

use crate::config::SHOE_COUNT;

// ---------------------------------------------------------------------------
// Temperature / humidity probes (DHT22, single-wire, open-drain)
// ---------------------------------------------------------------------------

pub const PROBE_AMBIENT_GPIO: i32 = 17;
pub const PROBE_SHOE0_GPIO: i32 = 16;
pub const PROBE_SHOE1_GPIO: i32 = 4;

/// Probe data lines indexed like the sensor snapshot (ambient first).
pub const PROBE_GPIOS: [i32; 3] = [PROBE_AMBIENT_GPIO, PROBE_SHOE0_GPIO, PROBE_SHOE1_GPIO];

// ---------------------------------------------------------------------------
// Bay motors (LEDC PWM) and heater relays
// ---------------------------------------------------------------------------

pub const MOTOR0_PWM_GPIO: i32 = 25;
pub const MOTOR1_PWM_GPIO: i32 = 26;
pub const MOTOR_PWM_GPIOS: [i32; SHOE_COUNT] = [MOTOR0_PWM_GPIO, MOTOR1_PWM_GPIO];

/// Relay coil outputs, active HIGH.
pub const HEATER0_GPIO: i32 = 18;
pub const HEATER1_GPIO: i32 = 5;
pub const HEATER_GPIOS: [i32; SHOE_COUNT] = [HEATER0_GPIO, HEATER1_GPIO];

// ---------------------------------------------------------------------------
// UV sterilisation lamp (shared by both bays)
// ---------------------------------------------------------------------------

pub const UV_PWM_GPIO: i32 = 14;

// ---------------------------------------------------------------------------
// Operator panel
// ---------------------------------------------------------------------------

/// Input-only pins with external pull-ups; buttons pull LOW.
pub const START_BUTTON_GPIO: i32 = 35;
pub const RESET_BUTTON_GPIO: i32 = 34;

pub const STATUS_LED_GPIO: i32 = 32;
pub const ERROR_LED_GPIO: i32 = 33;

// ---------------------------------------------------------------------------
// Battery sense (ADC1 channel 3 = GPIO 39)
// ---------------------------------------------------------------------------

pub const BATTERY_ADC_GPIO: i32 = 39;

// ---------------------------------------------------------------------------
// PWM configuration
// ---------------------------------------------------------------------------

/// LEDC timer resolution (bits).  8-bit gives 0 – 255 duty levels.
pub const PWM_RESOLUTION_BITS: u32 = 8;
/// Motor PWM (25 kHz, inaudible).
pub const MOTOR_PWM_FREQ_HZ: u32 = 25_000;
/// UV lamp driver PWM.
pub const UV_PWM_FREQ_HZ: u32 = 1_000;
