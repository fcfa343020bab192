//! Motor safety supervisor.
//!
//! The actuator driver runs the supervisor **every tick before ramping**.
//! The bound covers one continuous motor phase.  A bay is armed by
//! `MotorStart` (heated run), re-armed by `CoolingStart` (cooling run) and
//! disarmed by `MotorStop` / `AllOff`.  A bay that stays armed for
//! `motor_safety_max_ms` trips: the driver kills its motor and heater
//! without ramping and posts `SafetyTimeout(shoe)`.
//!
//! ## Fault lifecycle
//!
//! 1. `arm(shoe, now)` records the start of a continuous motor run.
//! 2. `check(now)` reports every bay whose run has reached the limit and
//!    latches the `SafetyTimeout` bit for it.
//! 3. A tripped bay is disarmed, so it is reported exactly once.
//! 4. `clear()` (Idle entry) drops the latched bits.

use log::{error, info};

use crate::config::SHOE_COUNT;
use crate::error::Fault;

pub struct MotorSafety {
    max_on_ms: u32,
    armed_at: [Option<u32>; SHOE_COUNT],
    /// Latched fault bitmask per bay.
    faults: [u8; SHOE_COUNT],
}

impl MotorSafety {
    pub fn new(max_on_ms: u32) -> Self {
        Self {
            max_on_ms,
            armed_at: [None; SHOE_COUNT],
            faults: [0; SHOE_COUNT],
        }
    }

    pub fn arm(&mut self, shoe: usize, now_ms: u32) {
        if let Some(slot) = self.armed_at.get_mut(shoe) {
            *slot = Some(now_ms);
        }
    }

    pub fn disarm(&mut self, shoe: usize) {
        if let Some(slot) = self.armed_at.get_mut(shoe) {
            *slot = None;
        }
    }

    pub fn disarm_all(&mut self) {
        self.armed_at = [None; SHOE_COUNT];
    }

    /// Milliseconds the bay has been running, `None` if disarmed.
    pub fn on_time(&self, shoe: usize, now_ms: u32) -> Option<u32> {
        self.armed_at
            .get(shoe)
            .copied()
            .flatten()
            .map(|t| now_ms.wrapping_sub(t))
    }

    /// Bays that reached the limit on this call.
    pub fn check(&mut self, now_ms: u32) -> [bool; SHOE_COUNT] {
        let mut tripped = [false; SHOE_COUNT];
        for (shoe, hit) in tripped.iter_mut().enumerate() {
            let Some(on) = self.on_time(shoe, now_ms) else {
                continue;
            };
            if on >= self.max_on_ms {
                error!(
                    "SAFETY FAULT SET: {} on shoe {shoe} after {}s",
                    Fault::SafetyTimeout,
                    on / 1000
                );
                self.faults[shoe] |= Fault::SafetyTimeout.mask();
                self.armed_at[shoe] = None;
                *hit = true;
            }
        }
        tripped
    }

    pub fn has_fault(&self, shoe: usize, fault: Fault) -> bool {
        self.faults.get(shoe).is_some_and(|f| f & fault.mask() != 0)
    }

    pub fn clear(&mut self) {
        if self.faults.iter().any(|&f| f != 0) {
            info!("SAFETY FAULT CLEARED: all bays");
        }
        self.faults = [0; SHOE_COUNT];
    }
}
