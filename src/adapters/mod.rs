//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements                 | Connects to                   |
//! |-------------|----------------------------|-------------------------------|
//! | `hardware`  | ProbePort                  | DHT22 probes (or sim atomics) |
//! |             | ActuatorPort               | motor PWM, heater relays, UV  |
//! |             | IndicatorPort, BatteryPort | LEDs, battery ADC, buttons    |
//! | `log_sink`  | EventSink                  | Serial log output             |
//! | `telemetry` | EventSink                  | CSV lines on the serial log   |
//! | `time`      | (clock)                    | ESP32 high-resolution timer   |

pub mod hardware;
pub mod log_sink;
#[cfg(feature = "telemetry-csv")]
pub mod telemetry;
pub mod time;
