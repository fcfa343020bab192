//! LED pattern engine.
//!
//! Turns a requested pattern into an on/off level each coordinator tick.
//! One engine per LED; the coordinator sets the pattern on state entry and
//! feeds the result to the [`IndicatorPort`](crate::app::ports::IndicatorPort).
//!
//! | Pattern | Output                                   |
//! |---------|------------------------------------------|
//! | Off     | low                                      |
//! | Solid   | high                                     |
//! | Blink   | square wave, `half_period_ms` high/low   |
//!
//! The phase restarts whenever the pattern changes, so a blink always
//! begins with the LED on.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LedPattern {
    #[default]
    Off,
    Solid,
    Blink {
        half_period_ms: u32,
    },
}

#[derive(Debug, Clone, Default)]
pub struct LedPatternEngine {
    pattern: LedPattern,
    phase_start_ms: Option<u32>,
    level: bool,
}

impl LedPatternEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, pattern: LedPattern) {
        if pattern != self.pattern {
            self.pattern = pattern;
            self.phase_start_ms = None;
        }
    }

    pub fn pattern(&self) -> LedPattern {
        self.pattern
    }

    /// Current level for `now_ms`.
    pub fn tick(&mut self, now_ms: u32) -> bool {
        self.level = match self.pattern {
            LedPattern::Off => false,
            LedPattern::Solid => true,
            LedPattern::Blink { half_period_ms } => {
                let start = *self.phase_start_ms.get_or_insert(now_ms);
                let half = half_period_ms.max(1);
                (now_ms.wrapping_sub(start) / half) % 2 == 0
            }
        };
        self.level
    }

    pub fn level(&self) -> bool {
        self.level
    }
}
