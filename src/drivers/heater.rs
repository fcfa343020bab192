//! Bay heater relay.
//!
//! On ESP-IDF the relay coil is a plain GPIO output (active HIGH).
//! On host/test the state is tracked in-memory only.

use crate::drivers::hw_init;
use crate::error::ActuatorError;
use crate::pins;

pub struct HeaterRelay {
    gpio: i32,
    on: bool,
}

impl HeaterRelay {
    pub fn new(shoe: usize) -> Self {
        Self {
            gpio: pins::HEATER_GPIOS[shoe.min(pins::HEATER_GPIOS.len() - 1)],
            on: false,
        }
    }

    pub fn set(&mut self, on: bool) -> Result<(), ActuatorError> {
        hw_init::gpio_write(self.gpio, on).map_err(|_| ActuatorError::GpioWriteFailed)?;
        self.on = on;
        Ok(())
    }

    pub fn is_on(&self) -> bool {
        self.on
    }
}
