//! Status and error LEDs (discrete, active HIGH).
//!
//! Patterns are computed by [`LedPatternEngine`](super::led_patterns::LedPatternEngine)
//! on the coordinator; this only drives the pins.

use log::warn;

use crate::drivers::hw_init;
use crate::pins;

pub struct IndicatorLeds {
    status: bool,
    error: bool,
}

impl Default for IndicatorLeds {
    fn default() -> Self {
        Self::new()
    }
}

impl IndicatorLeds {
    pub fn new() -> Self {
        Self {
            status: false,
            error: false,
        }
    }

    pub fn set_status(&mut self, on: bool) {
        if on != self.status {
            write_pin(pins::STATUS_LED_GPIO, on);
            self.status = on;
        }
    }

    pub fn set_error(&mut self, on: bool) {
        if on != self.error {
            write_pin(pins::ERROR_LED_GPIO, on);
            self.error = on;
        }
    }

    pub fn levels(&self) -> (bool, bool) {
        (self.status, self.error)
    }
}

fn write_pin(gpio: i32, on: bool) {
    if let Err(e) = hw_init::gpio_write(gpio, on) {
        warn!("LED: GPIO{gpio}: {e}");
    }
}
