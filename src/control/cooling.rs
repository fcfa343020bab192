//! Cooling-phase schedule and post-cooling dry check.

use heapless::HistoryBuffer;

use crate::config::DryerConfig;

/// Stabilization ring length.
pub const STABILIZE_RING: usize = 6;

/// Motor duty for the cooling phase from the shoe's temperature excess over
/// ambient.  Each retry bumps the duty one band higher.
pub fn cooling_duty(
    cfg: &DryerConfig,
    shoe_temp: Option<f32>,
    ambient_temp: Option<f32>,
    retries: u8,
) -> u8 {
    let [hi_band, mid_band, lo_band] = cfg.cooling_temp_bands_c;
    let [hi, mid, lo] = cfg.cooling_duty_pct;
    let ladder = [0, lo, mid, hi];

    let base = match (shoe_temp, ambient_temp) {
        (Some(s), Some(a)) => {
            let excess = s - a;
            if excess > hi_band {
                3
            } else if excess > mid_band {
                2
            } else if excess > lo_band {
                1
            } else {
                0
            }
        }
        // No reading to schedule against: run the middle band.
        _ => 2,
    };
    ladder[(base + retries as usize).min(ladder.len() - 1)]
}

/// Cooling motor duration from ΔAH at Cooling entry.  A retry never runs
/// shorter than the extended duration.
pub fn cooling_duration_ms(cfg: &DryerConfig, delta_at_entry: Option<f32>, retries: u8) -> u32 {
    let [base, extended, soaked] = cfg.cooling_secs;
    let [ext_at, soaked_at] = cfg.cooling_extend_delta;
    let secs = match delta_at_entry {
        Some(d) if d >= soaked_at => soaked,
        Some(d) if d >= ext_at => extended,
        _ => base,
    };
    let secs = if retries > 0 { secs.max(extended) } else { secs };
    secs * 1000
}

/// Temperature the shoe must reach before Cooling may end.
pub fn cooling_target(cfg: &DryerConfig, ambient_temp: Option<f32>) -> Option<f32> {
    ambient_temp.map(|a| a + cfg.cooling_target_margin_c)
}

/// Whether the shoe is still warmer than the cooling target.  Missing
/// readings never hold the phase open.
pub fn above_target(shoe_temp: Option<f32>, target: Option<f32>) -> bool {
    matches!((shoe_temp, target), (Some(t), Some(tgt)) if t > tgt)
}

// ---------------------------------------------------------------------------
// Stabilization sampler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DryVerdict {
    Dry,
    Wet,
    /// Moisture passes but the shoe is still warm.
    TooWarm,
}

/// ΔAH samples taken with the motor off.
#[derive(Debug, Clone)]
pub struct Stabilizer {
    interval_ms: u32,
    decline_delta: f32,
    ring: HistoryBuffer<f32, STABILIZE_RING>,
    last_sample_ms: Option<u32>,
}

impl Stabilizer {
    pub fn new(interval_ms: u32, decline_delta: f32) -> Self {
        Self {
            interval_ms,
            decline_delta,
            ring: HistoryBuffer::new(),
            last_sample_ms: None,
        }
    }

    pub fn reset(&mut self) {
        self.ring.clear();
        self.last_sample_ms = None;
    }

    /// Sample `delta` if an interval has passed since the last sample.
    pub fn update(&mut self, elapsed_ms: u32, delta: Option<f32>) {
        let due = self
            .last_sample_ms
            .is_none_or(|t| elapsed_ms.wrapping_sub(t) >= self.interval_ms);
        if !due {
            return;
        }
        if let Some(d) = delta {
            self.ring.write(d);
            self.last_sample_ms = Some(elapsed_ms);
        }
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.len() == 0
    }

    fn ordered(&self) -> ([f32; STABILIZE_RING], usize) {
        let mut out = [0.0f32; STABILIZE_RING];
        for (slot, v) in out.iter_mut().zip(self.ring.oldest_ordered()) {
            *slot = *v;
        }
        (out, self.ring.len())
    }

    /// Median of the newest three samples (fewer if not yet collected).
    pub fn median_recent(&self) -> Option<f32> {
        let (buf, n) = self.ordered();
        match n {
            0 => None,
            1 => Some(buf[0]),
            2 => Some((buf[0] + buf[1]) / 2.0),
            _ => {
                let mut w = [buf[n - 3], buf[n - 2], buf[n - 1]];
                w.sort_by(|a, b| a.total_cmp(b));
                Some(w[1])
            }
        }
    }

    /// Newest-three average below oldest-three average by more than the
    /// decline delta.  Needs a full ring.
    pub fn is_declining(&self) -> bool {
        let (buf, n) = self.ordered();
        if n < STABILIZE_RING {
            return false;
        }
        let old = (buf[0] + buf[1] + buf[2]) / 3.0;
        let new = (buf[3] + buf[4] + buf[5]) / 3.0;
        new - old < -self.decline_delta
    }

    /// Evaluate the dry check.  `shoe_temp` against `target` gates a moisture
    /// pass; a missing temperature reading does not block it.
    pub fn verdict(
        &self,
        cfg: &DryerConfig,
        shoe_temp: Option<f32>,
        target: Option<f32>,
    ) -> DryVerdict {
        let threshold = if self.is_declining() {
            cfg.lenient_dry_threshold
        } else {
            cfg.dry_threshold
        };
        match self.median_recent() {
            Some(m) if m <= threshold => {
                if above_target(shoe_temp, target) {
                    DryVerdict::TooWarm
                } else {
                    DryVerdict::Dry
                }
            }
            _ => DryVerdict::Wet,
        }
    }
}
