//! Actuator driver.
//!
//! Sole owner of the two motor channels, the two heater relays and the UV
//! lamp.  Everything else asks for output changes through [`Command`]s.
//!
//! ```text
//!   CommandPort ──▶ apply() ──▶ per-bay targets ─┐
//!                                                ├─▶ tick() ──▶ ActuatorPort
//!   SensorSnapshot (rate, ΔAH) ──▶ PID ──────────┘      │
//!                                                       ├─▶ SafetyTimeout / DrySignal / UvComplete
//!                                                       └─▶ ActuatorStatus
//! ```
//!
//! Each tick, in order:
//! 1. drain and apply queued commands (program order preserved);
//! 2. run the motor safety supervisor;
//! 3. run the PID inner loop for bays in PID mode;
//! 4. ramp motor duty toward target by at most one step;
//! 5. advance the UV timer.

pub mod uv;

use log::{debug, error, info, warn};

use crate::bus::snapshot::{ActuatorStatus, SensorSnapshot, ShoeOutputs};
use crate::bus::{Command, CommandPort, Event, EventQueue, ShoeId};
use crate::config::{DryerConfig, SHOE_COUNT};
use crate::control::pid::PidController;
use crate::error::{ActuatorError, Result};
use crate::app::ports::ActuatorPort;
use crate::safety::MotorSafety;
use uv::UvTimer;

/// Who sets a bay's motor target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DutySource {
    Manual,
    Pid,
}

/// Per-bay output state.
struct Bay {
    active: bool,
    started_ms: u32,
    duty: u8,
    target: u8,
    heater: bool,
    source: DutySource,
    pid: PidController,
    last_pid_ms: Option<u32>,
    dry_signalled: bool,
}

impl Bay {
    fn new(cfg: &DryerConfig) -> Self {
        let mut pid = PidController::new(cfg.pid_kp, cfg.pid_ki, cfg.pid_kd, cfg.pid_setpoint);
        pid.set_limits(cfg.pid_output_min, cfg.pid_output_max);
        Self {
            active: false,
            started_ms: 0,
            duty: 0,
            target: 0,
            heater: false,
            source: DutySource::Manual,
            pid,
            last_pid_ms: None,
            dry_signalled: false,
        }
    }

    fn manual(&mut self, target: u8) {
        self.target = target.min(100);
        if self.source == DutySource::Pid {
            self.pid.reset();
            self.last_pid_ms = None;
        }
        self.source = DutySource::Manual;
    }
}

pub struct ActuatorDriver {
    bays: [Bay; SHOE_COUNT],
    uv: UvTimer,
    safety: MotorSafety,
    ramp_step: u8,
    pid_grace_ms: u32,
    pid_warmup_duty: u8,
    pid_sample_ms: u32,
    dry_threshold: f32,
    uv_poll_ms: u32,
    last_uv_poll_ms: Option<u32>,
}

impl ActuatorDriver {
    pub fn new(cfg: &DryerConfig) -> Self {
        Self {
            bays: [Bay::new(cfg), Bay::new(cfg)],
            uv: UvTimer::new(cfg.uv_start_delay_ms, cfg.uv_ramp_ms),
            safety: MotorSafety::new(cfg.motor_safety_max_ms),
            ramp_step: cfg.motor_ramp_step_pct.max(1),
            pid_grace_ms: cfg.pid_grace_ms,
            pid_warmup_duty: cfg.pid_warmup_duty_pct,
            pid_sample_ms: cfg.pid_sample_ms,
            dry_threshold: cfg.dry_threshold,
            uv_poll_ms: cfg.uv_poll_ms,
            last_uv_poll_ms: None,
        }
    }

    /// One actuator period.  `bus` supplies commands and receives the
    /// driver's events.
    pub fn tick<B, H>(&mut self, now_ms: u32, sensors: &SensorSnapshot, bus: &mut B, hw: &mut H)
    where
        B: CommandPort + EventQueue,
        H: ActuatorPort,
    {
        while let Some(cmd) = bus.next_command() {
            if let Err(e) = self.apply(now_ms, cmd, hw) {
                warn!("ACT: rejected {cmd:?}: {e}");
            }
        }

        for (shoe, hit) in self.safety.check(now_ms).into_iter().enumerate() {
            if hit {
                error!("ACT: shoe {shoe} safety timeout, forcing stop");
                self.kill_bay(shoe, hw);
                bus.post(Event::SafetyTimeout(shoe as ShoeId));
            }
        }

        for shoe in 0..SHOE_COUNT {
            self.run_pid(shoe, now_ms, sensors);
            self.check_dry(shoe, sensors, bus);
            self.ramp(shoe, hw);
        }

        let poll_due = self
            .last_uv_poll_ms
            .is_none_or(|t| now_ms.wrapping_sub(t) >= self.uv_poll_ms);
        if poll_due || !self.uv.is_running() {
            self.last_uv_poll_ms = Some(now_ms);
            let before = self.uv.duty();
            if self.uv.tick(now_ms) {
                bus.post(Event::UvComplete);
            }
            if self.uv.duty() != before {
                hw.set_uv_duty(self.uv.duty());
            }
        }
    }

    /// Execute a single command.
    pub fn apply<H: ActuatorPort>(&mut self, now_ms: u32, cmd: Command, hw: &mut H) -> Result<()> {
        if let Some(shoe) = cmd.shoe() {
            if shoe as usize >= SHOE_COUNT {
                return Err(ActuatorError::InvalidShoe(shoe).into());
            }
        }

        match cmd {
            Command::MotorStart(i) => {
                let i = i as usize;
                let bay = &mut self.bays[i];
                bay.active = true;
                bay.started_ms = now_ms;
                bay.dry_signalled = false;
                bay.manual(100);
                bay.heater = true;
                hw.set_heater(i, true);
                self.safety.arm(i, now_ms);
                info!("ACT: shoe {i} motor start");
            }
            Command::MotorStop(i) => {
                let i = i as usize;
                let bay = &mut self.bays[i];
                bay.active = false;
                bay.manual(0);
                bay.heater = false;
                hw.set_heater(i, false);
                self.safety.disarm(i);
                info!("ACT: shoe {i} motor stop");
            }
            Command::SetMotorDuty(i, pct) => {
                self.bays[i as usize].manual(pct);
                debug!("ACT: shoe {i} duty target {}%", pct.min(100));
            }
            Command::HeaterSet(i, on) => {
                let i = i as usize;
                if self.bays[i].heater != on {
                    debug!("ACT: shoe {i} heater {}", if on { "on" } else { "off" });
                }
                self.bays[i].heater = on;
                hw.set_heater(i, on);
            }
            Command::PidEnable(i) => {
                let bay = &mut self.bays[i as usize];
                bay.pid.reset();
                bay.pid.initialize(self.pid_warmup_duty as f32 / 100.0);
                bay.last_pid_ms = None;
                bay.source = DutySource::Pid;
                info!("ACT: shoe {i} PID enabled");
            }
            Command::CoolingStart(i, pct) => {
                let i = i as usize;
                let bay = &mut self.bays[i];
                bay.manual(pct);
                bay.heater = false;
                hw.set_heater(i, false);
                if bay.active {
                    self.safety.arm(i, now_ms);
                }
                info!("ACT: shoe {i} cooling at {}%", pct.min(100));
            }
            Command::UvStart { duration_ms } => {
                self.uv.start(now_ms, duration_ms);
                self.last_uv_poll_ms = None;
            }
            Command::UvStop => {
                self.uv.stop();
                hw.set_uv_duty(0);
            }
            Command::AllOff => {
                for shoe in 0..SHOE_COUNT {
                    self.kill_bay(shoe, hw);
                }
                self.safety.disarm_all();
                self.safety.clear();
                self.uv.stop();
                hw.all_off();
                info!("ACT: all outputs off");
            }
        }
        Ok(())
    }

    /// Immediate stop, no ramp.
    fn kill_bay<H: ActuatorPort>(&mut self, shoe: usize, hw: &mut H) {
        let bay = &mut self.bays[shoe];
        bay.active = false;
        bay.manual(0);
        bay.duty = 0;
        bay.heater = false;
        hw.set_motor_duty(shoe, 0);
        hw.set_heater(shoe, false);
    }

    fn run_pid(&mut self, shoe: usize, now_ms: u32, sensors: &SensorSnapshot) {
        let bay = &mut self.bays[shoe];
        if !bay.active || bay.source != DutySource::Pid {
            return;
        }
        if now_ms.wrapping_sub(bay.started_ms) < self.pid_grace_ms {
            bay.target = self.pid_warmup_duty;
            return;
        }
        let dt_ms = match bay.last_pid_ms {
            Some(t) if now_ms.wrapping_sub(t) < self.pid_sample_ms => return,
            Some(t) => now_ms.wrapping_sub(t),
            None => self.pid_sample_ms,
        };
        bay.last_pid_ms = Some(now_ms);
        let out = bay.pid.compute(sensors.shoes[shoe].rate, dt_ms as f32 / 1000.0);
        bay.target = (out * 100.0).round().clamp(0.0, 100.0) as u8;
        debug!(
            "ACT: shoe {shoe} pid rate={:.3} out={:.2}",
            sensors.shoes[shoe].rate, out
        );
    }

    fn check_dry<B: EventQueue>(&mut self, shoe: usize, sensors: &SensorSnapshot, bus: &mut B) {
        let bay = &mut self.bays[shoe];
        if !bay.active || bay.source != DutySource::Pid || bay.dry_signalled {
            return;
        }
        if sensors.shoes[shoe]
            .delta_ah
            .is_some_and(|d| d < self.dry_threshold)
        {
            bay.dry_signalled = true;
            info!("ACT: shoe {shoe} below dry threshold");
            bus.post(Event::DrySignal(shoe as ShoeId));
        }
    }

    fn ramp<H: ActuatorPort>(&mut self, shoe: usize, hw: &mut H) {
        let bay = &mut self.bays[shoe];
        if bay.duty == bay.target {
            return;
        }
        bay.duty = if bay.duty < bay.target {
            bay.duty.saturating_add(self.ramp_step).min(bay.target)
        } else {
            bay.duty.saturating_sub(self.ramp_step).max(bay.target)
        };
        hw.set_motor_duty(shoe, bay.duty);
    }

    pub fn status(&self, now_ms: u32) -> ActuatorStatus {
        let mut status = ActuatorStatus {
            uv_duty: self.uv.duty(),
            uv_running: self.uv.is_running(),
            uv_remaining_secs: self.uv.remaining_secs(now_ms),
            ..ActuatorStatus::default()
        };
        for (out, bay) in status.shoes.iter_mut().zip(&self.bays) {
            *out = ShoeOutputs {
                motor_duty: bay.duty,
                heater_on: bay.heater,
                active: bay.active,
                pid_mode: bay.source == DutySource::Pid,
                pid_output: bay.pid.last_output().unwrap_or(0.0),
            };
        }
        status
    }

    pub fn duty_source(&self, shoe: usize) -> Option<DutySource> {
        self.bays.get(shoe).map(|b| b.source)
    }

    pub fn uv_complete(&self) -> bool {
        self.uv.is_complete()
    }
}
