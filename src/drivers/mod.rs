//! Output drivers, button input, hardware initialisation and task helpers.

pub mod button;
pub mod heater;
pub mod hw_init;
pub mod indicator;
pub mod led_patterns;
pub mod motor;
pub mod task_pin;
pub mod uvc;
pub mod watchdog;
