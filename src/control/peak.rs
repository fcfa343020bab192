//! Peak-evaporation detectors.
//!
//! Two independent detectors race during Wet; the first to fire declares
//! peak:
//!
//! 1. [`MovingAverageDetector`]: the evaporation rate has turned over and
//!    flattened below the tier's peak-rate threshold.
//! 2. [`RiseDetector`]: ΔAH has climbed back above its Wet minimum, i.e.
//!    the shoe's air is re-saturating instead of drying.

use heapless::HistoryBuffer;

/// Rate ring length.
pub const RATE_RING: usize = 8;
/// Samples per averaging window.
const WINDOW: usize = 3;

/// Tier-dependent thresholds for the moving-average detector.
#[derive(Debug, Clone, Copy)]
pub struct PeakGate {
    /// Earliest Wet time at which a peak is accepted (ms).
    pub valid_after_ms: u32,
    /// `recent` must be below this rate (g/m³/min).
    pub rate_threshold: f32,
}

#[derive(Debug, Clone)]
pub struct MovingAverageDetector {
    warmup_ms: u32,
    sample_interval_ms: u32,
    decline_threshold: f32,
    min_consecutive_neg: u8,
    ring: HistoryBuffer<f32, RATE_RING>,
    last_sample_ms: Option<u32>,
    consecutive_neg: u8,
}

impl MovingAverageDetector {
    pub fn new(
        warmup_ms: u32,
        sample_interval_ms: u32,
        decline_threshold: f32,
        min_consecutive_neg: u8,
    ) -> Self {
        Self {
            warmup_ms,
            sample_interval_ms,
            decline_threshold,
            min_consecutive_neg,
            ring: HistoryBuffer::new(),
            last_sample_ms: None,
            consecutive_neg: 0,
        }
    }

    pub fn reset(&mut self) {
        self.ring.clear();
        self.last_sample_ms = None;
        self.consecutive_neg = 0;
    }

    /// Feed the current rate.  Samples are taken every `sample_interval_ms`
    /// of Wet time once the warmup has elapsed.  Returns `true` when a peak
    /// is declared.
    pub fn update(&mut self, elapsed_ms: u32, rate: f32, gate: PeakGate) -> bool {
        if elapsed_ms < self.warmup_ms {
            return false;
        }
        if let Some(t) = self.last_sample_ms {
            if elapsed_ms.wrapping_sub(t) < self.sample_interval_ms {
                return false;
            }
        }
        self.last_sample_ms = Some(elapsed_ms);
        self.ring.write(rate);

        let Some((recent, prev)) = self.windows() else {
            return false;
        };
        let diff = recent - prev;
        if diff < 0.0 {
            self.consecutive_neg = self.consecutive_neg.saturating_add(1);
        } else {
            self.consecutive_neg = 0;
        }

        diff < self.decline_threshold
            && self.consecutive_neg >= self.min_consecutive_neg
            && recent < gate.rate_threshold
            && elapsed_ms >= gate.valid_after_ms
    }

    /// (average of the newest three, average of the three before them)
    fn windows(&self) -> Option<(f32, f32)> {
        let n = self.ring.len();
        if n < 2 * WINDOW {
            return None;
        }
        let mut ordered = [0.0f32; RATE_RING];
        for (slot, v) in ordered.iter_mut().zip(self.ring.oldest_ordered()) {
            *slot = *v;
        }
        let avg = |w: &[f32]| w.iter().sum::<f32>() / WINDOW as f32;
        let recent = avg(&ordered[n - WINDOW..n]);
        let prev = avg(&ordered[n - 2 * WINDOW..n - WINDOW]);
        Some((recent, prev))
    }

    pub fn consecutive_negative(&self) -> u8 {
        self.consecutive_neg
    }
}

/// Tracks the minimum ΔAH and fires on a rise above it.
#[derive(Debug, Clone, Default)]
pub struct RiseDetector {
    min: Option<f32>,
}

impl RiseDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.min = None;
    }

    /// Track `delta` and report whether it sits more than `threshold` above
    /// the minimum seen so far.  Only reports once `armed`.
    pub fn update(&mut self, delta: Option<f32>, threshold: f32, armed: bool) -> bool {
        let Some(d) = delta else {
            return false;
        };
        let min = self.min.map_or(d, |m| m.min(d));
        self.min = Some(min);
        armed && d - min > threshold
    }

    pub fn minimum(&self) -> Option<f32> {
        self.min
    }
}
