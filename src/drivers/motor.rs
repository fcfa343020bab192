//! Bay fan motor driver (logic-level MOSFET on an LEDC PWM channel).
//!
//! A dumb actuator: ramping, PID and the safety timer live in the actuator
//! driver task.  This only writes the duty it is given.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: writes the LEDC channel via hw_init.
//! On host/test: tracks the duty in-memory only.

use crate::drivers::hw_init;
use crate::error::ActuatorError;

pub struct MotorPwm {
    channel: u32,
    duty: u8,
}

impl MotorPwm {
    pub fn new(shoe: usize) -> Self {
        Self {
            channel: hw_init::LEDC_CH_MOTOR[shoe.min(hw_init::LEDC_CH_MOTOR.len() - 1)],
            duty: 0,
        }
    }

    /// Set the duty in percent, clamped to 100.
    pub fn set(&mut self, duty: u8) -> Result<(), ActuatorError> {
        let duty = duty.min(100);
        hw_init::ledc_set(self.channel, duty).map_err(|_| ActuatorError::PwmWriteFailed)?;
        self.duty = duty;
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), ActuatorError> {
        self.set(0)
    }

    pub fn duty(&self) -> u8 {
        self.duty
    }

    pub fn is_running(&self) -> bool {
        self.duty > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duty_is_clamped() {
        let mut m = MotorPwm::new(1);
        m.set(140).unwrap();
        assert_eq!(m.duty(), 100);
        m.stop().unwrap();
        assert!(!m.is_running());
    }
}
