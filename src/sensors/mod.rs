//! Sensor front-end: probe reads → validated samples → AH, ΔAH, rate.
//!
//! ```text
//!  ProbePort ──▶ ProbeValidator ──▶ AH ──▶ RateLimitedEma ──┐
//!   (×3)          (retry, hold)     (+offset on ambient)   │
//!                                                          ▼
//!                             ΔAH = ema[shoe] − ema[ambient] ──▶ EMA ──▶ rate
//!                                        │
//!                                        └──▶ wet flag (hysteresis)
//! ```
//!
//! [`SensorFrontEnd::sample`] runs one cycle and returns a
//! [`SensorSnapshot`]; the sensor task publishes it to the shared atomics.
//! When every probe has been invalid for `probe_failure_streak` cycles a
//! single `ProbeTimeout` is posted; it re-arms once any probe recovers.

pub mod battery;
pub mod dht;
pub mod humidity;
pub mod probe;
pub mod rate;

use log::{debug, error, info, warn};

use crate::app::ports::{EventQueue, ProbePort};
use crate::bus::Event;
use crate::bus::snapshot::{ProbeReading, SensorSnapshot, ShoeSignals};
use crate::config::{DryerConfig, PROBE_COUNT, SHOE_COUNT};

use humidity::{RateLimitedEma, absolute_humidity};
use probe::{ProbeLimits, ProbeStatus, ProbeValidator};
use rate::RateCalculator;

pub struct SensorFrontEnd {
    validators: [ProbeValidator; PROBE_COUNT],
    ah_filters: [RateLimitedEma; PROBE_COUNT],
    delta_filters: [RateLimitedEma; SHOE_COUNT],
    rates: [RateCalculator; SHOE_COUNT],
    wet: [bool; SHOE_COUNT],
    read_attempts: u8,
    ambient_offset: f32,
    wet_threshold: f32,
    dry_threshold: f32,
    probe_timeout_latched: bool,
    seq: u32,
}

impl SensorFrontEnd {
    pub fn new(config: &DryerConfig) -> Self {
        let limits = ProbeLimits {
            max_temp_drop_c: config.max_temp_drop_c,
            max_rh_jump_pct: config.max_rh_jump_pct,
            failure_streak: config.probe_failure_streak,
        };
        let ah_ema = || {
            RateLimitedEma::new(config.ema_alpha, config.max_ah_delta_per_sample)
                .with_reseed(config.ema_reseed_after)
        };
        // ΔAH is already built from rate-limited inputs
        let delta_ema = || RateLimitedEma::new(config.ema_alpha, f32::INFINITY);
        Self {
            validators: core::array::from_fn(|_| ProbeValidator::new(limits)),
            ah_filters: core::array::from_fn(|_| ah_ema()),
            delta_filters: core::array::from_fn(|_| delta_ema()),
            rates: core::array::from_fn(|_| RateCalculator::new(config.rate_min_interval_ms)),
            wet: [false; SHOE_COUNT],
            read_attempts: config.probe_read_attempts,
            ambient_offset: config.ambient_ah_offset,
            wet_threshold: config.wet_threshold,
            dry_threshold: config.dry_threshold,
            probe_timeout_latched: false,
            seq: 0,
        }
    }

    /// Run one sample cycle.
    pub fn sample(
        &mut self,
        now_ms: u32,
        probes: &mut impl ProbePort,
        events: &mut impl EventQueue,
    ) -> SensorSnapshot {
        self.seq = self.seq.wrapping_add(1);
        let mut snap = SensorSnapshot {
            seq: self.seq,
            taken_ms: now_ms,
            ..SensorSnapshot::default()
        };

        for i in 0..PROBE_COUNT {
            snap.probes[i] = self.read_probe(i, probes);
        }
        self.check_probe_timeout(events);

        for shoe in 0..SHOE_COUNT {
            let signals = self.derive_shoe(shoe, now_ms, &snap);
            snap.shoes[shoe] = signals;
        }
        snap
    }

    fn read_probe(&mut self, i: usize, probes: &mut impl ProbePort) -> ProbeReading {
        let validator = &mut self.validators[i];
        let mut fresh = false;

        for attempt in 0..self.read_attempts {
            match probes.read_probe(i) {
                Ok(s) if validator.is_plausible(&s) => {
                    validator.accept(s);
                    fresh = true;
                    break;
                }
                Ok(s) => debug!(
                    "PROBE[{i}]: rejected {:.1}C {:.1}% (attempt {})",
                    s.temp_c,
                    s.rh_pct,
                    attempt + 1
                ),
                Err(e) => debug!("PROBE[{i}]: read failed: {e} (attempt {})", attempt + 1),
            }
        }

        if !fresh {
            let was_uninit = validator.is_uninitialized();
            match validator.fail() {
                ProbeStatus::Uninitialized if !was_uninit => {
                    warn!("PROBE[{i}]: {} failed cycles, marked uninitialized", validator.streak());
                }
                ProbeStatus::Holding => {
                    debug!("PROBE[{i}]: holding last valid (streak {})", validator.streak());
                }
                _ => {}
            }
        }

        let held = validator.current();
        let temp_c = held.map(|s| s.temp_c);
        let rh_pct = held.map(|s| s.rh_pct);
        let ah = absolute_humidity(temp_c, rh_pct).map(|a| {
            if i == 0 { a + self.ambient_offset } else { a }
        });

        let filter = &mut self.ah_filters[i];
        let ah_ema = if fresh {
            let before = filter.rejected();
            let v = filter.update(ah);
            if filter.rejected() != before {
                debug!("PROBE[{i}]: AH step rejected as interference");
            }
            v
        } else if held.is_none() {
            filter.update(None)
        } else {
            filter.value()
        };

        ProbeReading {
            temp_c,
            rh_pct,
            ah,
            ah_ema,
            fail_streak: validator.streak(),
        }
    }

    fn check_probe_timeout(&mut self, events: &mut impl EventQueue) {
        let all_dead = self.validators.iter().all(|v| v.is_uninitialized());
        if all_dead && !self.probe_timeout_latched {
            error!("PROBE: all probes unresponsive, raising ProbeTimeout");
            self.probe_timeout_latched = events.post(Event::ProbeTimeout);
        } else if !all_dead && self.probe_timeout_latched {
            info!("PROBE: probes recovered");
            self.probe_timeout_latched = false;
        }
    }

    fn derive_shoe(&mut self, shoe: usize, now_ms: u32, snap: &SensorSnapshot) -> ShoeSignals {
        let delta_ah = match (snap.probes[shoe + 1].ah_ema, snap.probes[0].ah_ema) {
            (Some(s), Some(a)) => Some(s - a),
            _ => None,
        };
        let delta_ema = self.delta_filters[shoe].update(delta_ah);
        let rate = self.rates[shoe].update(now_ms, delta_ema);

        if let Some(d) = delta_ah {
            if d > self.wet_threshold {
                self.wet[shoe] = true;
            } else if d < self.dry_threshold {
                self.wet[shoe] = false;
            }
        }

        ShoeSignals {
            delta_ah,
            delta_ema,
            rate,
            is_wet: self.wet[shoe],
        }
    }
}
