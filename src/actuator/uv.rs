//! Shared UV lamp timer.
//!
//! ```text
//!  UvStart                                              duration
//!    │◀── start delay ──▶│◀─ ramp ─▶│                      │
//!    │        0 %        │ 0 → 100 %│        100 %         │ off, UvComplete
//! ```
//!
//! The whole duration is counted from `UvStart`, delay and ramp included.

use log::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UvPhase {
    Off,
    Delay,
    Ramp,
    On,
}

#[derive(Debug, Clone)]
pub struct UvTimer {
    start_delay_ms: u32,
    ramp_ms: u32,
    started_ms: Option<u32>,
    duration_ms: u32,
    duty: u8,
    complete: bool,
}

impl UvTimer {
    pub fn new(start_delay_ms: u32, ramp_ms: u32) -> Self {
        Self {
            start_delay_ms,
            ramp_ms,
            started_ms: None,
            duration_ms: 0,
            duty: 0,
            complete: false,
        }
    }

    pub fn start(&mut self, now_ms: u32, duration_ms: u32) {
        info!("UV: start, {}s", duration_ms / 1000);
        self.started_ms = Some(now_ms);
        self.duration_ms = duration_ms;
        self.duty = 0;
        self.complete = false;
    }

    pub fn stop(&mut self) {
        if self.started_ms.take().is_some() {
            info!("UV: stopped");
        }
        self.duty = 0;
    }

    /// Advance the timer.  Returns `true` exactly once, on the call that
    /// finishes the cycle.
    pub fn tick(&mut self, now_ms: u32) -> bool {
        let Some(start) = self.started_ms else {
            self.duty = 0;
            return false;
        };
        let elapsed = now_ms.wrapping_sub(start);
        if elapsed >= self.duration_ms {
            self.started_ms = None;
            self.duty = 0;
            self.complete = true;
            info!("UV: cycle complete");
            return true;
        }

        self.duty = if elapsed < self.start_delay_ms {
            0
        } else if self.ramp_ms > 0 && elapsed < self.start_delay_ms + self.ramp_ms {
            let into = elapsed - self.start_delay_ms;
            (into as u64 * 100 / self.ramp_ms as u64) as u8
        } else {
            100
        };
        false
    }

    pub fn phase(&self, now_ms: u32) -> UvPhase {
        let Some(start) = self.started_ms else {
            return UvPhase::Off;
        };
        let elapsed = now_ms.wrapping_sub(start);
        if elapsed < self.start_delay_ms {
            UvPhase::Delay
        } else if elapsed < self.start_delay_ms + self.ramp_ms {
            UvPhase::Ramp
        } else {
            UvPhase::On
        }
    }

    pub fn duty(&self) -> u8 {
        self.duty
    }

    pub fn is_running(&self) -> bool {
        self.started_ms.is_some()
    }

    /// Set when a cycle ran to completion, cleared by the next `start`.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Whole seconds left, rounded up.  Zero when idle.
    pub fn remaining_secs(&self, now_ms: u32) -> u32 {
        match self.started_ms {
            Some(start) => {
                let left = self.duration_ms.saturating_sub(now_ms.wrapping_sub(start));
                left.div_ceil(1000)
            }
            None => 0,
        }
    }
}
