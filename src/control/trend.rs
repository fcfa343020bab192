//! Trend-gated heater control.
//!
//! Bang-bang with a confirmation requirement: the heater is cut at the
//! upper threshold and only re-enabled once the shoe temperature has been
//! observed falling for `confirm_samples` consecutive samples.  A single
//! noisy dip does not toggle the relay.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaterDecision {
    On,
    Off,
    Hold,
}

#[derive(Debug, Clone)]
pub struct HeaterTrend {
    upper_c: f32,
    confirm_samples: u8,
    last_temp: Option<f32>,
    falling: u8,
}

impl HeaterTrend {
    pub fn new(upper_c: f32, confirm_samples: u8) -> Self {
        Self {
            upper_c,
            confirm_samples,
            last_temp: None,
            falling: 0,
        }
    }

    pub fn reset(&mut self) {
        self.last_temp = None;
        self.falling = 0;
    }

    /// Feed a temperature sample and get the heater decision.
    pub fn update(&mut self, temp_c: Option<f32>) -> HeaterDecision {
        let Some(t) = temp_c else {
            return HeaterDecision::Hold;
        };
        match self.last_temp {
            Some(prev) if t < prev => self.falling = self.falling.saturating_add(1),
            Some(prev) if t > prev => self.falling = 0,
            _ => {}
        }
        self.last_temp = Some(t);

        if t >= self.upper_c {
            HeaterDecision::Off
        } else if self.falling >= self.confirm_samples {
            HeaterDecision::On
        } else {
            HeaterDecision::Hold
        }
    }

    pub fn at_threshold(&self, temp_c: Option<f32>) -> bool {
        temp_c.is_some_and(|t| t >= self.upper_c)
    }
}
