//! Appliance-level machine: state identity and coordinator context.
//!
//! ```text
//!  Idle ──Start──▶ Detecting ──SensorTimeout──▶ Checking ──Start──▶ Running
//!   ▲ │                                            │                  │
//!   │ └─DebugRequested─▶ Debug               BatteryLow          AllSubsDone
//!   │                                              ▼                  ▼
//!   ├────────BatteryRecovered────────────── LowBattery               Done
//!   ├──────────────────────────DoneTimeout────────────────────────────┘
//!   │
//!   └── ResetPressed from any state        ProbeTimeout ──▶ Error
//! ```
//!
//! The coordinator context owns both [`Shoe`] machines.  Shoe dispatch goes
//! through [`CoordCtx::with_shoe`], which hands the shoe the current time,
//! snapshot, shared slot and a view of its peer, then collects its outbox.

use crate::bus::snapshot::SensorSnapshot;
use crate::bus::{Event, ShoeId};
use crate::config::{DryerConfig, SHOE_COUNT};
use crate::drivers::led_patterns::LedPattern;
use crate::error::Fault;

use super::shoe::{PeerView, Shoe, ShoeState};
use super::{MachineContext, Outbox, StateKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum GlobalState {
    Idle = 0,
    Detecting = 1,
    Checking = 2,
    Running = 3,
    Done = 4,
    LowBattery = 5,
    Error = 6,
    Debug = 7,
}

impl GlobalState {
    pub const COUNT: usize = 8;

    pub fn abbrev(self) -> &'static str {
        match self {
            Self::Idle => "IDL",
            Self::Detecting => "DET",
            Self::Checking => "CHK",
            Self::Running => "RUN",
            Self::Done => "DON",
            Self::LowBattery => "BAT",
            Self::Error => "ERR",
            Self::Debug => "DBG",
        }
    }
}

impl StateKind for GlobalState {
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

pub struct CoordCtx {
    pub cfg: DryerConfig,
    pub now_ms: u32,
    pub entered_ms: u32,
    pub snap: SensorSnapshot,
    /// Last battery reading, `None` until the first successful read.
    pub battery_v: Option<f32>,
    /// Evaporation slot owner.
    pub slot: Option<ShoeId>,
    pub uv_started: bool,
    pub uv_complete: bool,
    /// Bit `i` set once shoe `i` reported `SubDone`.
    pub sub_done: u8,
    /// A shoe was forced to Done by a safety timeout this run.
    pub aborted: bool,
    /// One-shot latch for the event the current state posts to itself.
    pub self_posted: bool,
    pub shoes: [Shoe; SHOE_COUNT],
    pub out: Outbox,
    pub status_led: LedPattern,
    pub error_led: LedPattern,
    /// [`Fault`] bitmask.
    pub faults: u8,
}

impl MachineContext for CoordCtx {
    fn now_ms(&self) -> u32 {
        self.now_ms
    }

    fn mark_entered(&mut self, now_ms: u32) {
        self.entered_ms = now_ms;
        self.self_posted = false;
    }
}

impl CoordCtx {
    pub fn new(cfg: DryerConfig) -> Self {
        let shoes = [Shoe::new(0, cfg.clone()), Shoe::new(1, cfg.clone())];
        Self {
            cfg,
            now_ms: 0,
            entered_ms: 0,
            snap: SensorSnapshot::default(),
            battery_v: None,
            slot: None,
            uv_started: false,
            uv_complete: false,
            sub_done: 0,
            aborted: false,
            self_posted: false,
            shoes,
            out: Outbox::new(),
            status_led: LedPattern::Off,
            error_led: LedPattern::Off,
            faults: 0,
        }
    }

    pub fn elapsed(&self) -> u32 {
        self.now_ms.wrapping_sub(self.entered_ms)
    }

    pub fn raise(&mut self, fault: Fault) {
        self.faults |= fault.mask();
    }

    pub fn has_fault(&self, fault: Fault) -> bool {
        self.faults & fault.mask() != 0
    }

    /// Post `ev` to self once per state visit.
    pub fn post_once(&mut self, ev: Event) {
        if !self.self_posted {
            self.self_posted = true;
            self.out.event(ev);
        }
    }

    pub fn shoe_state(&self, i: usize) -> ShoeState {
        self.shoes[i].state()
    }

    pub fn all_shoes(&self, f: impl Fn(ShoeState) -> bool) -> bool {
        self.shoes.iter().all(|s| f(s.state()))
    }

    /// Run `f` on shoe `i` with its context synced to ours, then pull the
    /// slot and outbox back.
    pub fn with_shoe<R>(&mut self, i: usize, f: impl FnOnce(&mut Shoe) -> R) -> R {
        let other = &self.shoes[1 - i];
        let peer = PeerView {
            id: other.ctx.id,
            state: other.state(),
            delta: self.snap.shoes[1 - i].delta_ah,
            cooling_motor: other.cooling_motor_running(),
        };

        let shoe = &mut self.shoes[i];
        shoe.ctx.now_ms = self.now_ms;
        shoe.ctx.snap = self.snap;
        shoe.ctx.slot = self.slot;
        shoe.ctx.peer = peer;

        let r = f(shoe);

        self.slot = shoe.ctx.slot;
        self.out.absorb(&mut shoe.ctx.out);
        r
    }

    /// Clear run state and put both shoes back in Idle.
    pub fn reset_run(&mut self) {
        self.slot = None;
        self.uv_started = false;
        self.uv_complete = false;
        self.sub_done = 0;
        self.aborted = false;
        for i in 0..SHOE_COUNT {
            self.with_shoe(i, |s| {
                if s.is_started() {
                    s.force(ShoeState::Idle);
                } else {
                    s.start();
                }
                s.ctx.reset();
            });
        }
        self.slot = None;
    }
}
