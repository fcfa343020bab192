//! System configuration parameters
//!
//! All tunable parameters for the two-bay dryer. Built once at boot from
//! [`DryerConfig::default`] and validated; recipes are not editable at
//! runtime.  Serde support exists so the active config can be dumped to the
//! serial log and round-tripped in tests.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Number of drying bays.
pub const SHOE_COUNT: usize = 2;
/// Number of temperature/humidity probes (ambient + one per bay).
pub const PROBE_COUNT: usize = 3;

// ---------------------------------------------------------------------------
// Moisture tiers
// ---------------------------------------------------------------------------

/// Load classification picked from the moisture differential at Wet entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MoistureTier {
    Barely = 0,
    Moderate = 1,
    VeryWet = 2,
    Soaked = 3,
}

impl MoistureTier {
    pub const COUNT: usize = 4;

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Barely => "barely-wet",
            Self::Moderate => "moderate",
            Self::VeryWet => "very-wet",
            Self::Soaked => "soaked",
        }
    }
}

/// Per-tier timing and detector thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierParams {
    /// Minimum time spent in Wet (seconds).
    pub min_wet_secs: u32,
    /// Time Wet continues after peak evaporation is declared (seconds).
    pub post_peak_buffer_secs: u32,
    /// Earliest Wet time at which the moving-average detector may fire (seconds).
    pub peak_valid_secs: u32,
    /// Rate (g/m³/min) below which evaporation is considered flattened.
    pub peak_rate_threshold: f32,
    /// Rise above the Wet minimum ΔAH (g/m³) that declares peak.
    pub rise_threshold: f32,
    /// Earliest Wet time at which the rise detector may fire (seconds).
    pub rise_window_secs: u32,
}

// ---------------------------------------------------------------------------
// DryerConfig
// ---------------------------------------------------------------------------

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DryerConfig {
    // --- Moisture thresholds (g/m³) ---
    /// ΔAH above which a shoe counts as wet
    pub wet_threshold: f32,
    /// ΔAH below which a shoe counts as dry (strict dry check)
    pub dry_threshold: f32,
    /// Dry-check threshold used when ΔAH is clearly declining
    pub lenient_dry_threshold: f32,
    /// EMA smoothing factor for absolute humidity
    pub ema_alpha: f32,
    /// Largest AH step accepted per sample before it is treated as EMI
    pub max_ah_delta_per_sample: f32,
    /// Rejected AH samples in a row after which the EMA restarts at the new level
    pub ema_reseed_after: u8,
    /// Fixed offset added to the ambient probe AH
    pub ambient_ah_offset: f32,

    // --- Probe validation ---
    /// Largest temperature drop accepted between samples (°C)
    pub max_temp_drop_c: f32,
    /// Largest RH jump accepted between samples (%)
    pub max_rh_jump_pct: f32,
    /// Read attempts per probe per cycle
    pub probe_read_attempts: u8,
    /// Consecutive failed cycles before a probe is marked uninitialized
    pub probe_failure_streak: u8,

    // --- Tiers ---
    /// Upper ΔAH bound of barely / moderate / very-wet
    pub tier_bounds: [f32; 3],
    pub tiers: [TierParams; MoistureTier::COUNT],

    // --- Wet phase ---
    /// Heater pre-warm before the motor starts, indexed cold → hot (ms):
    /// base, ≥25 °C, ≥30 °C, ≥35 °C
    pub heater_prewarm_ms: [u32; 4],
    /// Fixed-duty warmup after motor start (ms)
    pub wet_warmup_ms: u32,
    /// Warmup used when the shoe starts cold (ms)
    pub wet_warmup_cold_ms: u32,
    /// Shoe temperature below which the cold warmup applies (°C)
    pub cold_shoe_temp_c: f32,
    /// Motor duty during the Wet warmup (%)
    pub wet_warmup_duty_pct: u8,
    /// Heater cut-off temperature (°C)
    pub heater_upper_temp_c: f32,
    /// Falling samples required before the heater is re-enabled
    pub heater_falling_samples: u8,
    /// Shoe temperature considered "hot" at the end of the post-peak buffer (°C)
    pub hot_temp_c: f32,
    /// Extra buffer time when the shoe is still hot (ms)
    pub hot_extension_ms: u32,
    /// ΔAH gain over the initial value that re-tiers the buffer (g/m³)
    pub wetter_margin: f32,
    /// ΔAH below which a reading is treated as a glitch and Wet will not exit (g/m³)
    pub delta_collapse_margin: f32,

    // --- Moving-average peak detector ---
    /// Wet time before the moving-average detector arms (ms)
    pub peak_warmup_ms: u32,
    /// Rate sampling interval for the 8-sample ring (ms)
    pub peak_sample_interval_ms: u32,
    /// recent − prev below this counts as a decline
    pub peak_decline_threshold: f32,
    /// Consecutive negative deltas required
    pub peak_min_consecutive_neg: u8,

    // --- Re-evaporation ---
    /// Upper bound for a re-evaporation burst (ms)
    pub re_evap_max_ms: u32,
    /// Motor duty during re-evaporation (%)
    pub re_evap_duty_pct: u8,

    // --- Cooling ---
    /// Cooling motor durations: base / extended / soaked (seconds)
    pub cooling_secs: [u32; 3],
    /// ΔAH at cooling entry selecting extended / soaked durations
    pub cooling_extend_delta: [f32; 2],
    /// Extra margin over ambient the shoe must cool to (°C)
    pub cooling_target_margin_c: f32,
    /// Temperature-delta bands (°C over ambient) for high / medium / low duty
    pub cooling_temp_bands_c: [f32; 3],
    /// Duty for high / medium / low bands (%)
    pub cooling_duty_pct: [u8; 3],
    /// Cap on cooling motor extension while the shoe is above target (ms)
    pub cooling_extension_cap_ms: u32,
    /// Motor-off stabilization period (ms)
    pub stabilization_ms: u32,
    /// Stabilization ΔAH sampling interval (ms)
    pub stabilization_sample_ms: u32,
    /// Oldest-vs-newest drop that counts as a clear decline (g/m³)
    pub stabilization_decline_delta: f32,

    // --- Actuator driver ---
    /// Maximum continuous motor-on time per shoe (ms)
    pub motor_safety_max_ms: u32,
    /// Duty change per actuator tick (%)
    pub motor_ramp_step_pct: u8,
    /// PID grace period after MotorStart (ms)
    pub pid_grace_ms: u32,
    /// Fixed PID output while in grace (%)
    pub pid_warmup_duty_pct: u8,
    pub pid_kp: f32,
    pub pid_ki: f32,
    pub pid_kd: f32,
    /// PID sample interval (ms)
    pub pid_sample_ms: u32,
    /// Target ΔAH rate (g/m³/min)
    pub pid_setpoint: f32,
    /// Output limits as duty fraction
    pub pid_output_min: f32,
    pub pid_output_max: f32,

    // --- UV ---
    /// UV cycle length (seconds)
    pub uv_duration_secs: u32,
    /// Delay before the lamp is energised (ms)
    pub uv_start_delay_ms: u32,
    /// Linear ramp to full duty (ms)
    pub uv_ramp_ms: u32,

    // --- Coordinator ---
    /// Button debounce / duplicate-event window (ms)
    pub debounce_ms: u32,
    /// Probe settle time in Detecting (ms)
    pub sensor_equalize_ms: u32,
    /// Auto-reset delay in Done (ms)
    pub done_timeout_ms: u32,
    /// LED blink half-period (ms)
    pub blink_half_period_ms: u32,

    // --- Battery ---
    pub battery_low_v: f32,
    pub battery_recovery_v: f32,
    /// Battery poll interval (ms)
    pub battery_check_interval_ms: u32,

    // --- Timing ---
    /// Sensor task period (ms)
    pub sensor_period_ms: u32,
    /// Actuator task period (ms)
    pub actuator_period_ms: u32,
    /// Coordinator task period (ms)
    pub coordinator_period_ms: u32,
    /// UV timer poll period (ms)
    pub uv_poll_ms: u32,
    /// Minimum spacing of rate-of-change computations (ms)
    pub rate_min_interval_ms: u32,
}

impl Default for DryerConfig {
    fn default() -> Self {
        Self {
            // Moisture thresholds
            wet_threshold: 1.0,
            dry_threshold: 0.7,
            lenient_dry_threshold: 1.0,
            ema_alpha: 0.2,
            max_ah_delta_per_sample: 2.0,
            ema_reseed_after: 3,
            ambient_ah_offset: 0.0,

            // Probe validation
            max_temp_drop_c: 10.0,
            max_rh_jump_pct: 30.0,
            probe_read_attempts: 3,
            probe_failure_streak: 3,

            // Tiers
            tier_bounds: [1.5, 3.5, 5.0],
            tiers: [
                TierParams {
                    min_wet_secs: 180,
                    post_peak_buffer_secs: 40,
                    peak_valid_secs: 60,
                    peak_rate_threshold: 0.20,
                    rise_threshold: 0.4,
                    rise_window_secs: 60,
                },
                TierParams {
                    min_wet_secs: 360,
                    post_peak_buffer_secs: 75,
                    peak_valid_secs: 120,
                    peak_rate_threshold: 0.35,
                    rise_threshold: 0.6,
                    rise_window_secs: 90,
                },
                TierParams {
                    min_wet_secs: 480,
                    post_peak_buffer_secs: 100,
                    peak_valid_secs: 180,
                    peak_rate_threshold: 0.50,
                    rise_threshold: 0.8,
                    rise_window_secs: 120,
                },
                TierParams {
                    min_wet_secs: 600,
                    post_peak_buffer_secs: 120,
                    peak_valid_secs: 240,
                    peak_rate_threshold: 0.60,
                    rise_threshold: 1.0,
                    rise_window_secs: 150,
                },
            ],

            // Wet phase
            heater_prewarm_ms: [10_000, 7_000, 5_000, 3_000],
            wet_warmup_ms: 30_000,
            wet_warmup_cold_ms: 50_000,
            cold_shoe_temp_c: 20.0,
            wet_warmup_duty_pct: 60,
            heater_upper_temp_c: 38.5,
            heater_falling_samples: 2,
            hot_temp_c: 36.0,
            hot_extension_ms: 30_000,
            wetter_margin: 1.0,
            delta_collapse_margin: -0.5,

            // Moving-average peak detector
            peak_warmup_ms: 180_000,
            peak_sample_interval_ms: 15_000,
            peak_decline_threshold: -0.01,
            peak_min_consecutive_neg: 3,

            // Re-evaporation
            re_evap_max_ms: 60_000,
            re_evap_duty_pct: 85,

            // Cooling
            cooling_secs: [90, 150, 180],
            cooling_extend_delta: [1.5, 3.5],
            cooling_target_margin_c: 0.5,
            cooling_temp_bands_c: [5.0, 2.0, 0.5],
            cooling_duty_pct: [90, 75, 55],
            cooling_extension_cap_ms: 120_000,
            stabilization_ms: 90_000,
            stabilization_sample_ms: 15_000,
            stabilization_decline_delta: 0.05,

            // Actuator driver
            motor_safety_max_ms: 600_000,
            motor_ramp_step_pct: 5,
            pid_grace_ms: 30_000,
            pid_warmup_duty_pct: 75,
            pid_kp: 0.15,
            pid_ki: 0.03,
            pid_kd: 0.08,
            pid_sample_ms: 3_000,
            pid_setpoint: 0.5,
            pid_output_min: 0.5,
            pid_output_max: 1.0,

            // UV
            uv_duration_secs: 60,
            uv_start_delay_ms: 5_000,
            uv_ramp_ms: 2_000,

            // Coordinator
            debounce_ms: 300,
            sensor_equalize_ms: 6_000,
            done_timeout_ms: 10_000,
            blink_half_period_ms: 500,

            // Battery
            battery_low_v: 3.0,
            battery_recovery_v: 3.2,
            battery_check_interval_ms: 1_000,

            // Timing
            sensor_period_ms: 3_000,
            actuator_period_ms: 100,
            coordinator_period_ms: 50,
            uv_poll_ms: 200,
            rate_min_interval_ms: 1_000,
        }
    }
}

impl DryerConfig {
    /// Tier for a moisture differential.  A missing or NaN reading is
    /// classified as the lightest load.
    pub fn classify(&self, delta_ah: Option<f32>) -> MoistureTier {
        let Some(d) = delta_ah.filter(|d| !d.is_nan()) else {
            return MoistureTier::Barely;
        };
        let [b0, b1, b2] = self.tier_bounds;
        if d < b0 {
            MoistureTier::Barely
        } else if d < b1 {
            MoistureTier::Moderate
        } else if d < b2 {
            MoistureTier::VeryWet
        } else {
            MoistureTier::Soaked
        }
    }

    /// Parameters for `tier`.
    pub fn tier(&self, tier: MoistureTier) -> &TierParams {
        &self.tiers[tier.index()]
    }

    /// Heater pre-warm time for the shoe temperature at Wet entry.
    pub fn heater_prewarm_for(&self, shoe_temp_c: Option<f32>) -> u32 {
        let [base, warm, warmer, hot] = self.heater_prewarm_ms;
        match shoe_temp_c {
            Some(t) if t >= 35.0 => hot,
            Some(t) if t >= 30.0 => warmer,
            Some(t) if t >= 25.0 => warm,
            _ => base,
        }
    }

    /// Reject values that would make the control loops unsafe or meaningless.
    pub fn validate(&self) -> Result<(), Error> {
        if self.dry_threshold >= self.wet_threshold {
            return Err(Error::Config("dry_threshold must be below wet_threshold"));
        }
        if !(0.0..=1.0).contains(&self.ema_alpha) || self.ema_alpha == 0.0 {
            return Err(Error::Config("ema_alpha must be in (0, 1]"));
        }
        if !(self.tier_bounds[0] < self.tier_bounds[1] && self.tier_bounds[1] < self.tier_bounds[2])
        {
            return Err(Error::Config("tier_bounds must be strictly increasing"));
        }
        if self.pid_output_min < 0.0
            || self.pid_output_max > 1.0
            || self.pid_output_min >= self.pid_output_max
        {
            return Err(Error::Config("PID output limits must satisfy 0 <= min < max <= 1"));
        }
        if !(0.1..=2.0).contains(&self.pid_setpoint) {
            return Err(Error::Config("pid_setpoint out of range (0.1..=2.0 g/m3/min)"));
        }
        if self.battery_recovery_v <= self.battery_low_v {
            return Err(Error::Config("battery_recovery_v must exceed battery_low_v"));
        }
        if self.probe_read_attempts == 0 || self.probe_failure_streak == 0 {
            return Err(Error::Config("probe retry counts must be non-zero"));
        }
        if self.sensor_period_ms == 0
            || self.actuator_period_ms == 0
            || self.coordinator_period_ms == 0
            || self.pid_sample_ms == 0
            || self.stabilization_sample_ms == 0
            || self.peak_sample_interval_ms == 0
        {
            return Err(Error::Config("task and sample periods must be non-zero"));
        }
        if self.motor_ramp_step_pct == 0 {
            return Err(Error::Config("motor_ramp_step_pct must be non-zero"));
        }
        Ok(())
    }
}
