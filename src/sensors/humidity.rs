//! Absolute humidity and EMI-resistant smoothing.
//!
//! AH is derived from temperature and relative humidity with the Magnus
//! form of the saturation vapour pressure:
//!
//! ```text
//! P_sat = 610.78 · exp(17.2694·T / (T + 237.3))      [Pa]
//! P_v   = RH/100 · P_sat
//! AH    = 1000 · P_v / (461.5 · (T + 273.15))        [g/m³]
//! ```

use log::debug;

/// Validated temperature range (°C).
pub const TEMP_MIN_C: f32 = -40.0;
pub const TEMP_MAX_C: f32 = 85.0;

const RV: f32 = 461.5; // specific gas constant of water vapour, J/(kg·K)

/// Absolute humidity in g/m³.  `None` if either input is missing.
pub fn absolute_humidity(temp_c: Option<f32>, rh_pct: Option<f32>) -> Option<f32> {
    let t = temp_c.filter(|v| !v.is_nan())?.clamp(TEMP_MIN_C, TEMP_MAX_C);
    let rh = rh_pct.filter(|v| !v.is_nan())?.clamp(0.0, 100.0);
    let p_sat = 610.78 * ((17.2694 * t) / (t + 237.3)).exp();
    let p_v = rh / 100.0 * p_sat;
    Some(1000.0 * p_v / (RV * (t + 273.15)))
}

// ---------------------------------------------------------------------------
// Rate-limited EMA
// ---------------------------------------------------------------------------

/// Exponential moving average that refuses samples jumping more than
/// `max_delta` away from the current average.  Such steps are motor-PWM
/// interference on the probe line, not real humidity changes.
///
/// A real step larger than the gate keeps getting refused, so after
/// `reseed_after` refusals in a row the average restarts from the latest
/// sample.  Zero never re-seeds.
#[derive(Debug, Clone)]
pub struct RateLimitedEma {
    alpha: f32,
    max_delta: f32,
    reseed_after: u8,
    streak: u8,
    value: Option<f32>,
    rejected: u32,
}

impl RateLimitedEma {
    pub fn new(alpha: f32, max_delta: f32) -> Self {
        Self {
            alpha,
            max_delta,
            reseed_after: 0,
            streak: 0,
            value: None,
            rejected: 0,
        }
    }

    pub fn with_reseed(mut self, after: u8) -> Self {
        self.reseed_after = after;
        self
    }

    /// Feed one sample.  `None` clears the average: a probe that has gone
    /// uninitialized must not keep publishing a stale value.
    pub fn update(&mut self, sample: Option<f32>) -> Option<f32> {
        match (sample, self.value) {
            (None, _) => {
                self.value = None;
                self.streak = 0;
            }
            (Some(x), None) => self.value = Some(x),
            (Some(x), Some(prev)) => {
                if (x - prev).abs() > self.max_delta {
                    self.rejected = self.rejected.wrapping_add(1);
                    self.streak = self.streak.saturating_add(1);
                    if self.reseed_after > 0 && self.streak >= self.reseed_after {
                        debug!("EMA: {} rejects in a row, re-seeding at {x:.2}", self.streak);
                        self.value = Some(x);
                        self.streak = 0;
                    }
                } else {
                    self.value = Some(self.alpha * x + (1.0 - self.alpha) * prev);
                    self.streak = 0;
                }
            }
        }
        self.value
    }

    pub fn value(&self) -> Option<f32> {
        self.value
    }

    /// Samples dropped by the rate limit so far.
    pub fn rejected(&self) -> u32 {
        self.rejected
    }

    pub fn reset(&mut self) {
        self.value = None;
        self.streak = 0;
    }
}
