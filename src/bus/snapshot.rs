//! Shared telemetry snapshots.
//!
//! The sensor task is the only writer of [`SENSORS`]; the coordinator, the
//! actuator task and the display read it.  Each field is its own atomic word
//! so readers never block the writer.  A reader may observe fields from two
//! different sample cycles; consumers tolerate that (the rate filter and the
//! moving-average window smooth over a torn sample).
//!
//! `Option<f32>` is stored as raw `f32` bits with NaN standing for `None`.
//! Validated readings are never NaN, so the encoding is lossless.

use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

use crate::config::{PROBE_COUNT, SHOE_COUNT};

// ---------------------------------------------------------------------------
// Plain snapshot types
// ---------------------------------------------------------------------------

/// One probe's validated reading plus its derived humidity.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProbeReading {
    pub temp_c: Option<f32>,
    pub rh_pct: Option<f32>,
    /// Absolute humidity (g/m³), offset applied.
    pub ah: Option<f32>,
    /// EMA-filtered absolute humidity (g/m³).
    pub ah_ema: Option<f32>,
    /// Consecutive failed read cycles.
    pub fail_streak: u8,
}

/// Per-bay derived signals.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ShoeSignals {
    /// AH_ema[shoe] − AH_ema[ambient]
    pub delta_ah: Option<f32>,
    /// EMA of `delta_ah`
    pub delta_ema: Option<f32>,
    /// ∂ΔAH/∂t in g/m³/min, 0 while the calculator warms up.
    pub rate: f32,
    pub is_wet: bool,
}

/// Everything the sensor front-end publishes per cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SensorSnapshot {
    /// Index 0 = ambient, 1 = shoe 0, 2 = shoe 1.
    pub probes: [ProbeReading; PROBE_COUNT],
    pub shoes: [ShoeSignals; SHOE_COUNT],
    /// Incremented every sample cycle.
    pub seq: u32,
    pub taken_ms: u32,
}

impl SensorSnapshot {
    pub fn ambient_temp(&self) -> Option<f32> {
        self.probes[0].temp_c
    }

    pub fn shoe_temp(&self, shoe: usize) -> Option<f32> {
        self.probes.get(shoe + 1).and_then(|p| p.temp_c)
    }
}

/// Per-bay actuator state as last applied by the driver.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ShoeOutputs {
    pub motor_duty: u8,
    pub heater_on: bool,
    pub active: bool,
    pub pid_mode: bool,
    /// Last PID output as a duty fraction, 0 when the PID has not run.
    pub pid_output: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ActuatorStatus {
    pub shoes: [ShoeOutputs; SHOE_COUNT],
    pub uv_duty: u8,
    pub uv_running: bool,
    pub uv_remaining_secs: u32,
}

// ---------------------------------------------------------------------------
// Atomic cells
// ---------------------------------------------------------------------------

/// `Option<f32>` in one atomic word.
pub struct AtomicOptF32(AtomicU32);

impl AtomicOptF32 {
    const NONE_BITS: u32 = 0x7FC0_0000; // canonical quiet NaN

    pub const fn none() -> Self {
        Self(AtomicU32::new(Self::NONE_BITS))
    }

    pub fn store(&self, v: Option<f32>) {
        let bits = match v {
            Some(x) if !x.is_nan() => x.to_bits(),
            _ => Self::NONE_BITS,
        };
        self.0.store(bits, Ordering::Release);
    }

    pub fn load(&self) -> Option<f32> {
        let x = f32::from_bits(self.0.load(Ordering::Acquire));
        (!x.is_nan()).then_some(x)
    }
}

struct ProbeCells {
    temp_c: AtomicOptF32,
    rh_pct: AtomicOptF32,
    ah: AtomicOptF32,
    ah_ema: AtomicOptF32,
    fail_streak: AtomicU8,
}

impl ProbeCells {
    const fn new() -> Self {
        Self {
            temp_c: AtomicOptF32::none(),
            rh_pct: AtomicOptF32::none(),
            ah: AtomicOptF32::none(),
            ah_ema: AtomicOptF32::none(),
            fail_streak: AtomicU8::new(0),
        }
    }
}

struct ShoeCells {
    delta_ah: AtomicOptF32,
    delta_ema: AtomicOptF32,
    rate_bits: AtomicU32,
    is_wet: AtomicBool,
}

impl ShoeCells {
    const fn new() -> Self {
        Self {
            delta_ah: AtomicOptF32::none(),
            delta_ema: AtomicOptF32::none(),
            rate_bits: AtomicU32::new(0),
            is_wet: AtomicBool::new(false),
        }
    }
}

// ---------------------------------------------------------------------------
// SharedSnapshot
// ---------------------------------------------------------------------------

/// Lock-free single-writer / many-reader sensor snapshot.
pub struct SharedSnapshot {
    probes: [ProbeCells; PROBE_COUNT],
    shoes: [ShoeCells; SHOE_COUNT],
    seq: AtomicU32,
    taken_ms: AtomicU32,
}

impl SharedSnapshot {
    pub const fn new() -> Self {
        Self {
            probes: [const { ProbeCells::new() }; PROBE_COUNT],
            shoes: [const { ShoeCells::new() }; SHOE_COUNT],
            seq: AtomicU32::new(0),
            taken_ms: AtomicU32::new(0),
        }
    }

    /// Write every field.  Must only be called from the sensor task.
    pub fn publish(&self, s: &SensorSnapshot) {
        for (cell, p) in self.probes.iter().zip(s.probes.iter()) {
            cell.temp_c.store(p.temp_c);
            cell.rh_pct.store(p.rh_pct);
            cell.ah.store(p.ah);
            cell.ah_ema.store(p.ah_ema);
            cell.fail_streak.store(p.fail_streak, Ordering::Release);
        }
        for (cell, sh) in self.shoes.iter().zip(s.shoes.iter()) {
            cell.delta_ah.store(sh.delta_ah);
            cell.delta_ema.store(sh.delta_ema);
            cell.rate_bits.store(sh.rate.to_bits(), Ordering::Release);
            cell.is_wet.store(sh.is_wet, Ordering::Release);
        }
        self.taken_ms.store(s.taken_ms, Ordering::Release);
        // seq last: readers polling for a new cycle see the fields first.
        self.seq.store(s.seq, Ordering::Release);
    }

    /// Read every field, one at a time.
    pub fn load(&self) -> SensorSnapshot {
        let mut out = SensorSnapshot {
            seq: self.seq.load(Ordering::Acquire),
            taken_ms: self.taken_ms.load(Ordering::Acquire),
            ..SensorSnapshot::default()
        };
        for (p, cell) in out.probes.iter_mut().zip(self.probes.iter()) {
            *p = ProbeReading {
                temp_c: cell.temp_c.load(),
                rh_pct: cell.rh_pct.load(),
                ah: cell.ah.load(),
                ah_ema: cell.ah_ema.load(),
                fail_streak: cell.fail_streak.load(Ordering::Acquire),
            };
        }
        for (sh, cell) in out.shoes.iter_mut().zip(self.shoes.iter()) {
            *sh = ShoeSignals {
                delta_ah: cell.delta_ah.load(),
                delta_ema: cell.delta_ema.load(),
                rate: f32::from_bits(cell.rate_bits.load(Ordering::Acquire)),
                is_wet: cell.is_wet.load(Ordering::Acquire),
            };
        }
        out
    }

    pub fn seq(&self) -> u32 {
        self.seq.load(Ordering::Acquire)
    }
}

impl Default for SharedSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

/// The sensor snapshot shared by every firmware task.
pub static SENSORS: SharedSnapshot = SharedSnapshot::new();

// ---------------------------------------------------------------------------
// Shared actuator status (written by the actuator task, read by the UI)
// ---------------------------------------------------------------------------

struct OutputCells {
    motor_duty: AtomicU8,
    heater_on: AtomicBool,
    active: AtomicBool,
    pid_mode: AtomicBool,
    pid_output_bits: AtomicU32,
}

impl OutputCells {
    const fn new() -> Self {
        Self {
            motor_duty: AtomicU8::new(0),
            heater_on: AtomicBool::new(false),
            active: AtomicBool::new(false),
            pid_mode: AtomicBool::new(false),
            pid_output_bits: AtomicU32::new(0),
        }
    }
}

pub struct SharedActuatorStatus {
    shoes: [OutputCells; SHOE_COUNT],
    uv_duty: AtomicU8,
    uv_running: AtomicBool,
    uv_remaining_secs: AtomicU32,
}

impl SharedActuatorStatus {
    pub const fn new() -> Self {
        Self {
            shoes: [const { OutputCells::new() }; SHOE_COUNT],
            uv_duty: AtomicU8::new(0),
            uv_running: AtomicBool::new(false),
            uv_remaining_secs: AtomicU32::new(0),
        }
    }

    pub fn publish(&self, s: &ActuatorStatus) {
        for (cell, o) in self.shoes.iter().zip(s.shoes.iter()) {
            cell.motor_duty.store(o.motor_duty, Ordering::Relaxed);
            cell.heater_on.store(o.heater_on, Ordering::Relaxed);
            cell.active.store(o.active, Ordering::Relaxed);
            cell.pid_mode.store(o.pid_mode, Ordering::Relaxed);
            cell.pid_output_bits
                .store(o.pid_output.to_bits(), Ordering::Relaxed);
        }
        self.uv_duty.store(s.uv_duty, Ordering::Relaxed);
        self.uv_running.store(s.uv_running, Ordering::Relaxed);
        self.uv_remaining_secs
            .store(s.uv_remaining_secs, Ordering::Relaxed);
    }

    pub fn load(&self) -> ActuatorStatus {
        let mut out = ActuatorStatus {
            uv_duty: self.uv_duty.load(Ordering::Relaxed),
            uv_running: self.uv_running.load(Ordering::Relaxed),
            uv_remaining_secs: self.uv_remaining_secs.load(Ordering::Relaxed),
            ..ActuatorStatus::default()
        };
        for (o, cell) in out.shoes.iter_mut().zip(self.shoes.iter()) {
            *o = ShoeOutputs {
                motor_duty: cell.motor_duty.load(Ordering::Relaxed),
                heater_on: cell.heater_on.load(Ordering::Relaxed),
                active: cell.active.load(Ordering::Relaxed),
                pid_mode: cell.pid_mode.load(Ordering::Relaxed),
                pid_output: f32::from_bits(cell.pid_output_bits.load(Ordering::Relaxed)),
            };
        }
        out
    }
}

impl Default for SharedActuatorStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Actuator state shared with the display / telemetry task.
pub static ACTUATORS: SharedActuatorStatus = SharedActuatorStatus::new();
