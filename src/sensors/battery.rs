//! Battery voltage sampler.
//!
//! The pack feeds ADC1 through a 33 kΩ / 10 kΩ divider.  Each reading
//! averages 32 one-shot conversions.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: reads the battery ADC channel configured by hw_init.
//! On host/test: reads a static atomic (`u16::MAX` simulates a failed read).

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicU16, Ordering};

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;

const R1_OHMS: f32 = 33_000.0;
const R2_OHMS: f32 = 10_000.0;
const ADC_FULL_SCALE_V: f32 = 3.28;
const ADC_MAX: f32 = 4095.0;
pub const BATTERY_SAMPLES: u32 = 32;

#[cfg(not(target_os = "espidf"))]
static SIM_BATTERY_ADC: AtomicU16 = AtomicU16::new(1_100);

/// Inject the raw ADC value the simulated battery channel returns.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_battery_adc(raw: u16) {
    SIM_BATTERY_ADC.store(raw, Ordering::Relaxed);
}

/// Raw ADC code that reads back as approximately `volts` at the pack.
pub fn voltage_to_adc(volts: f32) -> u16 {
    let at_pin = volts * R2_OHMS / (R1_OHMS + R2_OHMS);
    ((at_pin / ADC_FULL_SCALE_V) * ADC_MAX).round().clamp(0.0, ADC_MAX) as u16
}

/// Pack voltage for an averaged raw ADC code.
pub fn adc_to_voltage(raw: f32) -> f32 {
    raw / ADC_MAX * ADC_FULL_SCALE_V * (R1_OHMS + R2_OHMS) / R2_OHMS
}

pub struct BatteryMonitor {
    samples: u32,
}

impl Default for BatteryMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl BatteryMonitor {
    pub fn new() -> Self {
        Self {
            samples: BATTERY_SAMPLES,
        }
    }

    /// Averaged pack voltage, `None` if any conversion failed.
    pub fn read_voltage(&mut self) -> Option<f32> {
        let mut sum: u32 = 0;
        for _ in 0..self.samples {
            sum += u32::from(Self::read_adc()?);
        }
        Some(adc_to_voltage(sum as f32 / self.samples as f32))
    }

    #[cfg(target_os = "espidf")]
    fn read_adc() -> Option<u16> {
        hw_init::adc1_read(hw_init::ADC1_CH_BATTERY)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_adc() -> Option<u16> {
        let raw = SIM_BATTERY_ADC.load(Ordering::Relaxed);
        (raw != u16::MAX).then_some(raw)
    }
}
