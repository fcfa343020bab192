//! PID controller for motor airflow.
//!
//! Regulates the ΔAH evaporation rate (g/m³/min) by modulating motor duty.
//! Output is a duty fraction.  The integrator is clamped to the output
//! range (anti-windup) and the derivative acts on the measurement so a
//! setpoint change produces no kick.

/// Bounds on the evaporation-rate setpoint (g/m³/min).
pub const SETPOINT_MIN: f32 = 0.1;
pub const SETPOINT_MAX: f32 = 2.0;

/// PID controller
#[derive(Debug, Clone)]
pub struct PidController {
    kp: f32,
    ki: f32,
    kd: f32,
    setpoint: f32,
    integral: f32,
    last_input: Option<f32>,
    output_min: f32,
    output_max: f32,
    last_output: Option<f32>,
}

impl PidController {
    pub fn new(kp: f32, ki: f32, kd: f32, setpoint: f32) -> Self {
        Self {
            kp,
            ki,
            kd,
            setpoint: setpoint.clamp(SETPOINT_MIN, SETPOINT_MAX),
            integral: 0.0,
            last_input: None,
            output_min: 0.0,
            output_max: 1.0,
            last_output: None,
        }
    }

    /// Set output limits
    pub fn set_limits(&mut self, min: f32, max: f32) {
        self.output_min = min;
        self.output_max = max;
        self.integral = self.integral.clamp(min, max);
    }

    /// Update setpoint, clamped to the supported rate band.
    pub fn set_target(&mut self, setpoint: f32) {
        self.setpoint = setpoint.clamp(SETPOINT_MIN, SETPOINT_MAX);
    }

    pub fn setpoint(&self) -> f32 {
        self.setpoint
    }

    /// Compute PID output given current measurement.  `dt_secs` is the time
    /// since the previous call.
    pub fn compute(&mut self, measurement: f32, dt_secs: f32) -> f32 {
        let error = self.setpoint - measurement;

        let p = self.kp * error;

        self.integral =
            (self.integral + self.ki * error * dt_secs).clamp(self.output_min, self.output_max);

        let d = match self.last_input {
            Some(prev) if dt_secs > 0.0 => -self.kd * (measurement - prev) / dt_secs,
            _ => 0.0,
        };
        self.last_input = Some(measurement);

        let output = (p + self.integral + d).clamp(self.output_min, self.output_max);
        self.last_output = Some(output);
        output
    }

    /// Reset controller state
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_input = None;
        self.last_output = None;
    }

    /// Bumpless start: seed the integrator so the first outputs sit near
    /// `output`.
    pub fn initialize(&mut self, output: f32) {
        self.integral = output.clamp(self.output_min, self.output_max);
        self.last_input = None;
    }

    /// Most recent output, `None` if the controller has not run since reset.
    pub fn last_output(&self) -> Option<f32> {
        self.last_output
    }
}
