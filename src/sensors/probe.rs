//! Per-probe sample validation with last-valid hold.

use crate::app::ports::RawSample;

use super::humidity::{TEMP_MAX_C, TEMP_MIN_C};

/// Outcome of one read cycle for a probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProbeStatus {
    /// A fresh sample passed validation.
    Fresh,
    /// The cycle failed; the last valid sample is being held.
    Holding,
    /// Too many consecutive failures; the probe publishes nothing.
    Uninitialized,
}

/// Validation limits shared by all probes.
#[derive(Debug, Clone, Copy)]
pub struct ProbeLimits {
    pub max_temp_drop_c: f32,
    pub max_rh_jump_pct: f32,
    pub failure_streak: u8,
}

/// Tracks one probe's last valid sample and failure streak.
#[derive(Debug, Clone)]
pub struct ProbeValidator {
    limits: ProbeLimits,
    last_valid: Option<RawSample>,
    streak: u8,
}

impl ProbeValidator {
    pub fn new(limits: ProbeLimits) -> Self {
        Self {
            limits,
            last_valid: None,
            streak: 0,
        }
    }

    /// Check a raw sample against the absolute ranges and the step limits
    /// relative to the last valid sample.
    pub fn is_plausible(&self, s: &RawSample) -> bool {
        if s.temp_c.is_nan() || s.rh_pct.is_nan() {
            return false;
        }
        if !(TEMP_MIN_C..=TEMP_MAX_C).contains(&s.temp_c) {
            return false;
        }
        if !(0.0..=100.0).contains(&s.rh_pct) {
            return false;
        }
        if let Some(prev) = self.last_valid {
            if prev.temp_c - s.temp_c > self.limits.max_temp_drop_c {
                return false;
            }
            if (s.rh_pct - prev.rh_pct).abs() > self.limits.max_rh_jump_pct {
                return false;
            }
        }
        true
    }

    /// Record a validated sample.
    pub fn accept(&mut self, s: RawSample) {
        self.last_valid = Some(s);
        self.streak = 0;
    }

    /// Record a failed cycle.  After `failure_streak` consecutive failures
    /// the held sample is discarded so the next good read starts fresh.
    pub fn fail(&mut self) -> ProbeStatus {
        self.streak = self.streak.saturating_add(1);
        if self.streak >= self.limits.failure_streak {
            self.last_valid = None;
            ProbeStatus::Uninitialized
        } else if self.last_valid.is_some() {
            ProbeStatus::Holding
        } else {
            ProbeStatus::Uninitialized
        }
    }

    /// The sample to publish this cycle, if any.
    pub fn current(&self) -> Option<RawSample> {
        self.last_valid
    }

    pub fn streak(&self) -> u8 {
        self.streak
    }

    pub fn is_uninitialized(&self) -> bool {
        self.streak >= self.limits.failure_streak
    }
}
