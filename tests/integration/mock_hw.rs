//! Mock hardware and a deterministic rig for integration tests.
//!
//! The rig runs the real coordinator and actuator driver on one
//! [`LocalBus`] at their firmware periods (50 ms / 100 ms).  Sensor
//! snapshots come from a small scripted plant instead of the probe
//! front-end: each shoe follows a [`ShoeProfile`] keyed to the phase its
//! machine is in, and shoe temperature follows the heater relay.

use shoedryer::app::coordinator::Coordinator;
use shoedryer::app::events::AppEvent;
use shoedryer::app::ports::{ActuatorPort, BatteryPort, EventSink, IndicatorPort};
use shoedryer::actuator::ActuatorDriver;
use shoedryer::bus::snapshot::SensorSnapshot;
use shoedryer::bus::{Event, EventQueue, LocalBus};
use shoedryer::config::{DryerConfig, SHOE_COUNT};
use shoedryer::fsm::global::GlobalState;
use shoedryer::fsm::shoe::ShoeState;

pub const COORD_MS: u32 = 50;
pub const ACT_MS: u32 = 100;
pub const SENSOR_MS: u32 = 3_000;

pub const AMBIENT_C: f32 = 22.0;
const HEATED_C: f32 = 38.0;
/// Fraction of the gap to the goal temperature closed per sensor cycle.
const THERMAL_STEP: f32 = 0.15;

// ── Actuator call record ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActuatorCall {
    Motor { shoe: usize, duty: u8 },
    Heater { shoe: usize, on: bool },
    Uv { duty: u8 },
    AllOff,
}

// ── MockHardware ──────────────────────────────────────────────

#[derive(Default)]
pub struct MockHardware {
    pub calls: Vec<ActuatorCall>,
    pub motor: [u8; SHOE_COUNT],
    pub heater: [bool; SHOE_COUNT],
    pub uv: u8,
    /// Off → on transitions of the UV lamp.
    pub uv_starts: usize,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn all_outputs_off(&self) -> bool {
        self.motor == [0; SHOE_COUNT] && self.heater == [false; SHOE_COUNT] && self.uv == 0
    }

    pub fn uv_ever_on(&self) -> bool {
        self.uv_starts > 0
    }
}

impl ActuatorPort for MockHardware {
    fn set_motor_duty(&mut self, shoe: usize, duty: u8) {
        self.motor[shoe] = duty;
        self.calls.push(ActuatorCall::Motor { shoe, duty });
    }

    fn set_heater(&mut self, shoe: usize, on: bool) {
        self.heater[shoe] = on;
        self.calls.push(ActuatorCall::Heater { shoe, on });
    }

    fn set_uv_duty(&mut self, duty: u8) {
        if self.uv == 0 && duty > 0 {
            self.uv_starts += 1;
        }
        self.uv = duty;
        self.calls.push(ActuatorCall::Uv { duty });
    }

    fn all_off(&mut self) {
        self.motor = [0; SHOE_COUNT];
        self.heater = [false; SHOE_COUNT];
        self.uv = 0;
        self.calls.push(ActuatorCall::AllOff);
    }
}

// ── Panel (LEDs + battery) ────────────────────────────────────

pub struct MockPanel {
    pub voltage: Option<f32>,
    pub reads: u32,
    pub status_led: bool,
    pub error_led: bool,
}

impl Default for MockPanel {
    fn default() -> Self {
        Self {
            voltage: Some(3.7),
            reads: 0,
            status_led: false,
            error_led: false,
        }
    }
}

impl IndicatorPort for MockPanel {
    fn set_status_led(&mut self, on: bool) {
        self.status_led = on;
    }

    fn set_error_led(&mut self, on: bool) {
        self.error_led = on;
    }
}

impl BatteryPort for MockPanel {
    fn read_voltage(&mut self) -> Option<f32> {
        self.reads += 1;
        self.voltage
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn global_path(&self) -> Vec<GlobalState> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::StateChanged { to, .. } => Some(*to),
                _ => None,
            })
            .collect()
    }

    pub fn shoe_path(&self, shoe: u8) -> Vec<ShoeState> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::ShoeStateChanged { shoe: s, to, .. } if *s == shoe => Some(*to),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Scripted plant ────────────────────────────────────────────

/// How one shoe's ΔAH evolves with its machine's phase.
#[derive(Debug, Clone)]
pub struct ShoeProfile {
    /// ΔAH at power-on.
    pub initial: f32,
    /// Rise over the first 150 s of a normal Wet pass.
    pub wet_rise: f32,
    /// ΔAH reached at the end of each Cooling pass; the last one repeats.
    pub dry_levels: Vec<f32>,
    /// Wet never peaks: ΔAH stays flat for the whole pass.
    pub stuck: bool,
}

#[allow(dead_code)]
impl ShoeProfile {
    /// A shoe that is already dry.
    pub fn dry(initial: f32) -> Self {
        Self {
            initial,
            wet_rise: 0.0,
            dry_levels: vec![initial],
            stuck: false,
        }
    }

    /// A wet shoe that peaks during Wet and reads `dry_levels` after Cooling.
    pub fn wet(initial: f32, wet_rise: f32, dry_levels: &[f32]) -> Self {
        Self {
            initial,
            wet_rise,
            dry_levels: dry_levels.to_vec(),
            stuck: false,
        }
    }

    /// A wet shoe whose evaporation never peaks.
    pub fn stuck(initial: f32) -> Self {
        Self {
            initial,
            wet_rise: 0.0,
            dry_levels: vec![initial],
            stuck: true,
        }
    }

    fn dry_level(&self, pass: usize) -> f32 {
        let last = self.dry_levels.len().saturating_sub(1);
        self.dry_levels.get(pass.min(last)).copied().unwrap_or(self.initial)
    }
}

fn lerp(a: f32, b: f32, f: f32) -> f32 {
    a + (b - a) * f.clamp(0.0, 1.0)
}

struct PlantShoe {
    profile: ShoeProfile,
    delta: f32,
    temp: f32,
    state: ShoeState,
    entered_ms: u32,
    entry_delta: f32,
    coolings: usize,
}

impl PlantShoe {
    fn new(profile: ShoeProfile) -> Self {
        Self {
            delta: profile.initial,
            profile,
            temp: AMBIENT_C,
            state: ShoeState::Idle,
            entered_ms: 0,
            entry_delta: 0.0,
            coolings: 0,
        }
    }

    fn observe(&mut self, state: ShoeState, now_ms: u32) {
        if state == self.state {
            return;
        }
        if state == ShoeState::Cooling {
            self.coolings += 1;
        }
        if state == ShoeState::Idle {
            self.delta = self.profile.initial;
            self.coolings = 0;
        }
        self.state = state;
        self.entered_ms = now_ms;
        self.entry_delta = self.delta;
    }

    fn step(&mut self, now_ms: u32, heater_on: bool) {
        let t = now_ms.wrapping_sub(self.entered_ms) as f32 / 1000.0;
        let p = &self.profile;
        match self.state {
            ShoeState::Wet if p.stuck => {}
            ShoeState::Wet if self.coolings > 0 => {
                // Re-evaporation burst: moisture comes back out of the lining.
                self.delta = self.entry_delta + 0.02 * t;
            }
            ShoeState::Wet => {
                let top = self.entry_delta + p.wet_rise;
                let target = p.dry_level(self.coolings) + 0.3;
                self.delta = if t <= 150.0 {
                    lerp(self.entry_delta, top, t / 150.0)
                } else {
                    lerp(top, target, (t - 150.0) / 180.0)
                };
            }
            ShoeState::Cooling => {
                let level = p.dry_level(self.coolings - 1);
                self.delta = lerp(self.entry_delta, level, t / 60.0);
            }
            _ => {}
        }

        let goal = if heater_on { HEATED_C } else { AMBIENT_C };
        self.temp += (goal - self.temp) * THERMAL_STEP;
    }
}

// ── Rig ───────────────────────────────────────────────────────

pub struct Rig {
    pub cfg: DryerConfig,
    pub coord: Coordinator,
    pub driver: ActuatorDriver,
    pub bus: LocalBus,
    pub hw: MockHardware,
    pub panel: MockPanel,
    pub sink: RecordingSink,
    pub snap: SensorSnapshot,
    pub now: u32,
    plant: [PlantShoe; SHOE_COUNT],
    last_sample_ms: Option<u32>,
    /// Set if both shoe machines were ever seen in Wet together.
    pub double_wet: bool,
}

#[allow(dead_code)]
impl Rig {
    pub fn new(profiles: [ShoeProfile; SHOE_COUNT]) -> Self {
        Self::with_config(DryerConfig::default(), profiles)
    }

    pub fn with_config(cfg: DryerConfig, profiles: [ShoeProfile; SHOE_COUNT]) -> Self {
        let [p0, p1] = profiles;
        let mut rig = Self {
            coord: Coordinator::new(cfg.clone()),
            driver: ActuatorDriver::new(&cfg),
            cfg,
            bus: LocalBus::new(),
            hw: MockHardware::default(),
            panel: MockPanel::default(),
            sink: RecordingSink::default(),
            snap: SensorSnapshot::default(),
            now: 0,
            plant: [PlantShoe::new(p0), PlantShoe::new(p1)],
            last_sample_ms: None,
            double_wet: false,
        };
        rig.sample();
        rig.coord.start(0, &mut rig.bus, &mut rig.sink);
        rig.driver.tick(0, &rig.snap, &mut rig.bus, &mut rig.hw);
        rig
    }

    fn sample(&mut self) {
        let prev = self.snap;
        let mut snap = SensorSnapshot {
            seq: prev.seq.wrapping_add(1),
            taken_ms: self.now,
            ..SensorSnapshot::default()
        };
        snap.probes[0].temp_c = Some(AMBIENT_C);
        for (i, shoe) in self.plant.iter_mut().enumerate() {
            shoe.step(self.now, self.hw.heater[i]);
            snap.probes[i + 1].temp_c = Some(shoe.temp);
            let sig = &mut snap.shoes[i];
            sig.delta_ah = Some(shoe.delta);
            sig.delta_ema = Some(shoe.delta);
            sig.rate = match (prev.shoes[i].delta_ah, self.last_sample_ms) {
                (Some(before), Some(_)) => (shoe.delta - before) * 60_000.0 / SENSOR_MS as f32,
                _ => 0.0,
            };
            sig.is_wet = if shoe.delta > self.cfg.wet_threshold {
                true
            } else if shoe.delta < self.cfg.dry_threshold {
                false
            } else {
                prev.shoes[i].is_wet
            };
        }
        self.snap = snap;
        self.last_sample_ms = Some(self.now);
    }

    /// Advance one coordinator period.
    pub fn step(&mut self) {
        self.now += COORD_MS;
        let sample_due = self
            .last_sample_ms
            .map_or(true, |t| self.now.wrapping_sub(t) >= SENSOR_MS);
        if sample_due {
            self.sample();
        }
        if self.now % ACT_MS == 0 {
            self.driver.tick(self.now, &self.snap, &mut self.bus, &mut self.hw);
        }
        self.coord
            .tick(self.now, &self.snap, &mut self.bus, &mut self.panel, &mut self.sink);

        let states = [self.coord.shoe_state(0), self.coord.shoe_state(1)];
        if states == [ShoeState::Wet; SHOE_COUNT] {
            self.double_wet = true;
        }
        for (i, s) in states.iter().enumerate() {
            self.plant[i].observe(*s, self.now);
        }
    }

    pub fn run_for(&mut self, ms: u32) {
        let end = self.now + ms;
        while self.now < end {
            self.step();
        }
    }

    /// Step until `done` holds or `limit_ms` passes; returns whether it held.
    pub fn run_until(&mut self, limit_ms: u32, mut done: impl FnMut(&Rig) -> bool) -> bool {
        let end = self.now + limit_ms;
        while self.now < end {
            self.step();
            if done(self) {
                return true;
            }
        }
        false
    }

    pub fn press(&mut self, ev: Event) {
        self.bus.post(ev);
    }

    pub fn state(&self) -> GlobalState {
        self.coord.state()
    }

    pub fn shoe(&self, i: usize) -> ShoeState {
        self.coord.shoe_state(i)
    }

    pub fn delta(&self, i: usize) -> f32 {
        self.plant[i].delta
    }
}
