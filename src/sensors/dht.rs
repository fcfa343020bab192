//! DHT22 / AM2302 single-wire temperature and humidity probe.
//!
//! ```text
//! host  ▔▔▔▁▁▁▁▁▁(≥1 ms)▁▁▁▔▔(20–40 µs)
//! probe                        ▁▁(80)▔▔(80)  40 × [▁▁(50) ▔▔(26 = 0 | 70 = 1)]
//! ```
//!
//! Bits are classified by comparing the length of each high pulse with the
//! 50 µs low pulse that precedes it, so the decoder does not depend on the
//! exact cost of one polling iteration.
//!
//! Generic over `embedded-hal` 1.0 so the same driver runs on an
//! open-drain `PinDriver` on the ESP32 and on a scripted pin in tests.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::app::ports::RawSample;
use crate::error::SensorError;

const START_LOW_US: u32 = 1_100;
const RESPONSE_TIMEOUT_US: u32 = 200;
const EDGE_TIMEOUT_US: u32 = 120;

pub struct Dht22<P, D> {
    pin: P,
    delay: D,
}

impl<P, D> Dht22<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    pub fn new(pin: P, delay: D) -> Self {
        Self { pin, delay }
    }

    /// Perform one full transaction and decode it.
    pub fn read(&mut self) -> Result<RawSample, SensorError> {
        let frame = self.read_frame()?;
        decode_frame(&frame)
    }

    fn read_frame(&mut self) -> Result<[u8; 5], SensorError> {
        self.pin.set_low().map_err(|_| SensorError::GpioFailed)?;
        self.delay.delay_us(START_LOW_US);
        self.pin.set_high().map_err(|_| SensorError::GpioFailed)?;

        // Line floats high until the probe answers.
        self.wait_while(true, RESPONSE_TIMEOUT_US)
            .map_err(|_| SensorError::NoResponse)?;
        self.wait_while(false, EDGE_TIMEOUT_US)?;
        self.wait_while(true, EDGE_TIMEOUT_US)?;

        let mut frame = [0u8; 5];
        for bit in 0..40 {
            let low = self.wait_while(false, EDGE_TIMEOUT_US)?;
            let high = self.wait_while(true, EDGE_TIMEOUT_US)?;
            if high > low {
                frame[bit / 8] |= 0x80 >> (bit % 8);
            }
        }
        Ok(frame)
    }

    /// Busy-wait while the line sits at `level`; returns the elapsed µs.
    fn wait_while(&mut self, level: bool, timeout_us: u32) -> Result<u32, SensorError> {
        let mut elapsed = 0;
        while self.pin.is_high().map_err(|_| SensorError::GpioFailed)? == level {
            if elapsed >= timeout_us {
                return Err(SensorError::Timeout);
            }
            self.delay.delay_us(1);
            elapsed += 1;
        }
        Ok(elapsed)
    }
}

/// Decode a 5-byte frame: RH×10, T×10 (sign in bit 15), checksum.
pub fn decode_frame(b: &[u8; 5]) -> Result<RawSample, SensorError> {
    let sum = b[0].wrapping_add(b[1]).wrapping_add(b[2]).wrapping_add(b[3]);
    if sum != b[4] {
        return Err(SensorError::Checksum);
    }
    let rh = u16::from_be_bytes([b[0], b[1]]) as f32 / 10.0;
    let magnitude = u16::from_be_bytes([b[2] & 0x7F, b[3]]) as f32 / 10.0;
    let temp = if b[2] & 0x80 != 0 { -magnitude } else { magnitude };
    Ok(RawSample {
        temp_c: temp,
        rh_pct: rh,
    })
}
