//! Per-shoe drying machine: state identity, context and wrapper.
//!
//! ```text
//!  Idle ──InitWet──▶ Waiting ──SubStart──▶ Wet ──PeakConfirmed──▶ Cooling
//!   │                   ▲                                          │  │
//!   │                   └───────────────DryCheckFail───────────────┘  │
//!   └────InitDry────▶ Dry ◀────────────────DryCheckPass────────────────┘
//!                      │
//!                 UvComplete
//!                      ▼
//!                    Done
//! ```
//!
//! Handlers live in [`super::shoe_states`].  Everything a handler needs is
//! in [`ShoeCtx`]: the latest sensor snapshot, a view of the peer bay, the
//! shared evaporation slot and the per-phase bookkeeping in [`ShoeData`].

use crate::bus::ShoeId;
use crate::bus::snapshot::SensorSnapshot;
use crate::config::{DryerConfig, MoistureTier};
use crate::control::cooling::Stabilizer;
use crate::control::peak::{MovingAverageDetector, RiseDetector};
use crate::control::trend::HeaterTrend;

use super::shoe_states::SHOE_TABLE;
use super::{Fsm, MachineContext, Outbox, StateKind};

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ShoeState {
    Idle = 0,
    Waiting = 1,
    Wet = 2,
    Cooling = 3,
    Dry = 4,
    Done = 5,
}

impl ShoeState {
    pub const COUNT: usize = 6;

    /// Three-letter code for the display.
    pub fn abbrev(self) -> &'static str {
        match self {
            Self::Idle => "IDL",
            Self::Waiting => "WAI",
            Self::Wet => "WET",
            Self::Cooling => "COL",
            Self::Dry => "DRY",
            Self::Done => "DON",
        }
    }

    /// Heater may only be on in Wet.
    pub fn allows_heater(self) -> bool {
        self == Self::Wet
    }
}

impl StateKind for ShoeState {
    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoolingPhase {
    /// Motor on the temperature schedule for the selected duration.
    Motor,
    /// Duration elapsed but the shoe is still above target.
    Extension,
    /// Motor off, sampling ΔAH.
    Stabilizing,
    /// Dry-check result posted, waiting for it to be dispatched.
    Verdict,
}

// ---------------------------------------------------------------------------
// Peer view and slot arbitration
// ---------------------------------------------------------------------------

/// What one bay can see of the other.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeerView {
    pub id: ShoeId,
    pub state: ShoeState,
    pub delta: Option<f32>,
    pub cooling_motor: bool,
}

impl PeerView {
    pub fn idle(id: ShoeId) -> Self {
        Self {
            id,
            state: ShoeState::Idle,
            delta: None,
            cooling_motor: false,
        }
    }
}

/// Evaporation-slot arbitration for a bay in Waiting.
///
/// * the slot must be free;
/// * the peer's cooling motor must not be running;
/// * if the peer is also waiting, the higher ΔAH wins and a tie (or two
///   missing readings) goes to shoe 0.
pub fn may_acquire(me: ShoeId, my_delta: Option<f32>, slot: Option<ShoeId>, peer: &PeerView) -> bool {
    if slot.is_some() || peer.cooling_motor {
        return false;
    }
    if peer.state != ShoeState::Waiting {
        return true;
    }
    match (my_delta, peer.delta) {
        (Some(mine), Some(theirs)) if mine > theirs => true,
        (Some(mine), Some(theirs)) if mine < theirs => false,
        (Some(_), None) => true,
        (None, Some(_)) => false,
        _ => me < peer.id,
    }
}

// ---------------------------------------------------------------------------
// Per-phase bookkeeping
// ---------------------------------------------------------------------------

pub struct ShoeData {
    // ── Wet ───────────────────────────────────────────────
    pub tier: MoistureTier,
    pub initial_delta: Option<f32>,
    pub prewarm_ms: u32,
    pub motor_started_ms: Option<u32>,
    pub warmup_ms: u32,
    pub warmup_done: bool,
    /// Wet-elapsed time at which peak was declared.
    pub peak_at_ms: Option<u32>,
    pub buffer_ms: u32,
    pub retiered: bool,
    pub hot_extended: bool,
    pub collapse_logged: bool,
    pub heater_on: bool,
    pub exit_posted: bool,
    /// Next Wet entry runs the re-evaporation burst.
    pub re_evap: bool,
    pub re_evap_active: bool,
    pub ma: MovingAverageDetector,
    pub rise: RiseDetector,
    pub trend: HeaterTrend,
    pub last_seq: Option<u32>,

    // ── Cooling ───────────────────────────────────────────
    pub retries: u8,
    pub cooling_duration_ms: u32,
    pub cooling_target: Option<f32>,
    pub cooling_duty: u8,
    pub cooling_phase: CoolingPhase,
    pub extension_start_ms: u32,
    pub stabilize_start_ms: u32,
    pub stabilizer: Stabilizer,

    // ── Waiting ───────────────────────────────────────────
    pub start_posted_ms: Option<u32>,
}

impl ShoeData {
    pub fn new(cfg: &DryerConfig) -> Self {
        Self {
            tier: MoistureTier::Barely,
            initial_delta: None,
            prewarm_ms: 0,
            motor_started_ms: None,
            warmup_ms: cfg.wet_warmup_ms,
            warmup_done: false,
            peak_at_ms: None,
            buffer_ms: 0,
            retiered: false,
            hot_extended: false,
            collapse_logged: false,
            heater_on: false,
            exit_posted: false,
            re_evap: false,
            re_evap_active: false,
            ma: MovingAverageDetector::new(
                cfg.peak_warmup_ms,
                cfg.peak_sample_interval_ms,
                cfg.peak_decline_threshold,
                cfg.peak_min_consecutive_neg,
            ),
            rise: RiseDetector::new(),
            trend: HeaterTrend::new(cfg.heater_upper_temp_c, cfg.heater_falling_samples),
            last_seq: None,
            retries: 0,
            cooling_duration_ms: cfg.cooling_secs[0] * 1000,
            cooling_target: None,
            cooling_duty: 0,
            cooling_phase: CoolingPhase::Motor,
            extension_start_ms: 0,
            stabilize_start_ms: 0,
            stabilizer: Stabilizer::new(cfg.stabilization_sample_ms, cfg.stabilization_decline_delta),
            start_posted_ms: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

pub struct ShoeCtx {
    pub id: ShoeId,
    pub cfg: DryerConfig,
    pub now_ms: u32,
    /// Entry time of the current state.
    pub entered_ms: u32,
    pub snap: SensorSnapshot,
    pub peer: PeerView,
    /// Shared evaporation slot, synced by the coordinator around dispatch.
    pub slot: Option<ShoeId>,
    pub out: Outbox,
    pub data: ShoeData,
}

impl MachineContext for ShoeCtx {
    fn now_ms(&self) -> u32 {
        self.now_ms
    }

    fn mark_entered(&mut self, now_ms: u32) {
        self.entered_ms = now_ms;
    }
}

impl ShoeCtx {
    pub fn new(id: ShoeId, cfg: DryerConfig) -> Self {
        let data = ShoeData::new(&cfg);
        Self {
            id,
            cfg,
            now_ms: 0,
            entered_ms: 0,
            snap: SensorSnapshot::default(),
            peer: PeerView::idle(1 - id.min(1)),
            slot: None,
            out: Outbox::new(),
            data,
        }
    }

    pub fn idx(&self) -> usize {
        self.id as usize
    }

    pub fn elapsed(&self) -> u32 {
        self.now_ms.wrapping_sub(self.entered_ms)
    }

    pub fn delta(&self) -> Option<f32> {
        self.snap.shoes[self.idx()].delta_ah
    }

    pub fn rate(&self) -> f32 {
        self.snap.shoes[self.idx()].rate
    }

    pub fn temp(&self) -> Option<f32> {
        self.snap.shoe_temp(self.idx())
    }

    pub fn ambient(&self) -> Option<f32> {
        self.snap.ambient_temp()
    }

    /// `true` once per sensor cycle.
    pub fn fresh_sample(&mut self) -> bool {
        let seq = self.snap.seq;
        if self.data.last_seq == Some(seq) {
            return false;
        }
        self.data.last_seq = Some(seq);
        true
    }

    pub fn holds_slot(&self) -> bool {
        self.slot == Some(self.id)
    }

    pub fn release_slot(&mut self) {
        if self.holds_slot() {
            self.slot = None;
            log::info!("SHOE[{}]: evaporation slot released", self.id);
        }
    }

    pub fn reset(&mut self) {
        self.data = ShoeData::new(&self.cfg);
    }

    pub fn cooling_motor_running(&self, state: ShoeState) -> bool {
        state == ShoeState::Cooling
            && matches!(
                self.data.cooling_phase,
                CoolingPhase::Motor | CoolingPhase::Extension
            )
    }
}

// ---------------------------------------------------------------------------
// Shoe
// ---------------------------------------------------------------------------

const LABELS: [&str; 2] = ["SHOE[0]", "SHOE[1]"];

/// One bay: its machine plus its context.
pub struct Shoe {
    fsm: Fsm<ShoeState, ShoeCtx>,
    pub ctx: ShoeCtx,
}

impl Shoe {
    pub fn new(id: ShoeId, cfg: DryerConfig) -> Self {
        Self {
            fsm: Fsm::new(LABELS[(id as usize).min(1)], &SHOE_TABLE, ShoeState::Idle),
            ctx: ShoeCtx::new(id, cfg),
        }
    }

    pub fn start(&mut self) {
        self.fsm.start(&mut self.ctx);
    }

    pub fn state(&self) -> ShoeState {
        self.fsm.current()
    }

    pub fn is_started(&self) -> bool {
        self.fsm.is_started()
    }

    pub fn handle(&mut self, ev: &crate::bus::Event) -> bool {
        self.fsm.handle(&mut self.ctx, ev)
    }

    pub fn run(&mut self) -> bool {
        self.fsm.run(&mut self.ctx)
    }

    pub fn force(&mut self, state: ShoeState) {
        self.fsm.force(state, &mut self.ctx);
    }

    pub fn cooling_motor_running(&self) -> bool {
        self.ctx.cooling_motor_running(self.state())
    }

    /// Weighted progress through Wet, Cooling and UV, 0–100.
    ///
    /// `uv_remaining_secs` is `Some` while the shared lamp cycle runs.
    /// Only Done reports 100.
    pub fn progress(&self, uv_remaining_secs: Option<u32>) -> u8 {
        const WET_WEIGHT: u32 = 360;
        let cool = (self.ctx.data.cooling_duration_ms / 1000).max(1);
        let uv = self.ctx.cfg.uv_duration_secs.max(1);
        let total = WET_WEIGHT + cool + uv;
        let secs = self.ctx.elapsed() / 1000;

        let done = match self.state() {
            ShoeState::Idle | ShoeState::Waiting => 0,
            ShoeState::Wet => secs.min(WET_WEIGHT),
            ShoeState::Cooling => WET_WEIGHT + secs.min(cool),
            ShoeState::Dry => {
                let lit = uv_remaining_secs.map_or(0, |left| uv.saturating_sub(left));
                WET_WEIGHT + cool + lit
            }
            ShoeState::Done => return 100,
        };
        ((done * 100 / total).min(99)) as u8
    }
}
