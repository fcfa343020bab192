//! Rate-of-change calculator.

/// Clamp on computed rates (g/m³/min); larger values are arithmetic noise
/// from near-zero time deltas or torn samples.
pub const RATE_CLAMP: f32 = 120.0;

/// Produces dX/dt in units per minute at a cadence of at least
/// `min_interval_ms`.  Reports 0 until two samples are available.
#[derive(Debug, Clone)]
pub struct RateCalculator {
    min_interval_ms: u32,
    last: Option<(u32, f32)>,
    rate: Option<f32>,
}

impl RateCalculator {
    pub fn new(min_interval_ms: u32) -> Self {
        Self {
            min_interval_ms,
            last: None,
            rate: None,
        }
    }

    pub fn update(&mut self, now_ms: u32, value: Option<f32>) -> f32 {
        let Some(v) = value else {
            self.last = None;
            self.rate = None;
            return 0.0;
        };
        match self.last {
            None => self.last = Some((now_ms, v)),
            Some((t0, v0)) => {
                let dt_ms = now_ms.wrapping_sub(t0);
                if dt_ms >= self.min_interval_ms && dt_ms > 0 {
                    let per_min = (v - v0) / (dt_ms as f32 / 60_000.0);
                    self.rate = Some(per_min.clamp(-RATE_CLAMP, RATE_CLAMP));
                    self.last = Some((now_ms, v));
                }
            }
        }
        self.rate()
    }

    /// Latest rate, 0 while warming up.
    pub fn rate(&self) -> f32 {
        self.rate.unwrap_or(0.0)
    }

    pub fn is_warm(&self) -> bool {
        self.rate.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_until_second_sample() {
        let mut r = RateCalculator::new(1000);
        assert_eq!(r.update(0, Some(5.0)), 0.0);
        assert!(!r.is_warm());
        let rate = r.update(3000, Some(5.3));
        assert!((rate - 6.0).abs() < 1e-3, "0.3 per 3 s = 6 per min, got {rate}");
        assert!(r.is_warm());
    }

    #[test]
    fn holds_between_intervals() {
        let mut r = RateCalculator::new(1000);
        r.update(0, Some(1.0));
        r.update(1000, Some(2.0));
        let held = r.update(1500, Some(9.0));
        assert!((held - 60.0).abs() < 1e-3);
    }

    #[test]
    fn clamps_spikes() {
        let mut r = RateCalculator::new(1000);
        r.update(0, Some(0.0));
        assert_eq!(r.update(1000, Some(50.0)), RATE_CLAMP);
        assert_eq!(r.update(2000, Some(-50.0)), -RATE_CLAMP);
    }

    #[test]
    fn missing_value_restarts_warmup() {
        let mut r = RateCalculator::new(1000);
        r.update(0, Some(1.0));
        r.update(1000, Some(2.0));
        assert_eq!(r.update(2000, None), 0.0);
        assert_eq!(r.update(3000, Some(4.0)), 0.0);
    }

    #[test]
    fn survives_clock_wrap() {
        let mut r = RateCalculator::new(1000);
        r.update(u32::MAX - 999, Some(1.0));
        let rate = r.update(1000, Some(1.1));
        assert!((rate - 3.0).abs() < 1e-3);
    }
}
