//! UV sterilisation lamp driver (constant-current buck, PWM dimmed).
//!
//! One lamp serves both bays.  The turn-on delay and soft-start ramp are
//! timed by the actuator driver's [`UvTimer`](crate::actuator::uv::UvTimer);
//! this driver only applies the duty and remembers the last fault.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives the LEDC channel via hw_init.
//! On host/test: tracks state in-memory only.

use log::warn;

use crate::drivers::hw_init;
use crate::error::ActuatorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UvcState {
    Off,
    On { duty: u8 },
    Faulted(&'static str),
}

pub struct UvcDriver {
    state: UvcState,
}

impl Default for UvcDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl UvcDriver {
    pub fn new() -> Self {
        Self { state: UvcState::Off }
    }

    pub fn set_duty(&mut self, duty: u8) -> Result<(), ActuatorError> {
        let duty = duty.min(100);
        if let Err(e) = hw_init::ledc_set(hw_init::LEDC_CH_UV, duty) {
            self.fault_shutdown("PWM write failed");
            warn!("UVC: {e}");
            return Err(ActuatorError::PwmWriteFailed);
        }
        self.state = if duty == 0 {
            UvcState::Off
        } else {
            UvcState::On { duty }
        };
        Ok(())
    }

    pub fn disable(&mut self) -> Result<(), ActuatorError> {
        self.set_duty(0)
    }

    pub fn fault_shutdown(&mut self, reason: &'static str) {
        // Best effort: the write that failed may fail again.
        let _ = hw_init::ledc_set(hw_init::LEDC_CH_UV, 0);
        self.state = UvcState::Faulted(reason);
        warn!("UVC fault shutdown: {}", reason);
    }

    pub fn state(&self) -> UvcState {
        self.state
    }

    pub fn is_on(&self) -> bool {
        matches!(self.state, UvcState::On { .. })
    }

    pub fn current_duty(&self) -> u8 {
        match self.state {
            UvcState::On { duty } => duty,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_duty_is_off() {
        let mut uv = UvcDriver::new();
        uv.set_duty(40).unwrap();
        assert_eq!(uv.state(), UvcState::On { duty: 40 });
        uv.set_duty(0).unwrap();
        assert!(!uv.is_on());
        assert_eq!(uv.current_duty(), 0);
    }
}
