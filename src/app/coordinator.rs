//! Global coordinator: the single consumer of the event queue.
//!
//! [`Coordinator`] owns the appliance machine, which in turn owns both shoe
//! machines.  Each tick it drains the event queue, dispatches every event
//! in FIFO order, runs the periodic callbacks and flushes the resulting
//! commands to the actuator driver.
//!
//! ```text
//!   EventQueue ──▶ ┌──────────────────────────────┐ ──▶ CommandPort
//!                  │ Coordinator                  │
//!   SensorSnapshot │  DuplicateGuard · Fsm<Global>│ ──▶ IndicatorPort
//!         ────────▶│  Shoe[0] · Shoe[1]           │ ──▶ EventSink
//!   BatteryPort ──▶└──────────────────────────────┘
//! ```
//!
//! A transition and its entry actions complete, and their output is on the
//! bus, before the next event is dequeued.

use log::{debug, info};

use crate::bus::snapshot::{ActuatorStatus, SensorSnapshot};
use crate::bus::{Event, ShoeId};
use crate::config::{DryerConfig, SHOE_COUNT};
use crate::drivers::led_patterns::LedPatternEngine;
use crate::fsm::Fsm;
use crate::fsm::global::{CoordCtx, GlobalState};
use crate::fsm::global_states::GLOBAL_TABLE;
use crate::fsm::shoe::ShoeState;

use super::events::{AppEvent, TelemetryFrame};
use super::ports::{BatteryPort, CommandPort, EventQueue, EventSink, IndicatorPort};

/// Upper bound on events dispatched per tick.  Handlers may post follow-up
/// events; anything past the bound waits for the next tick.
const MAX_EVENTS_PER_TICK: usize = 16;

// ───────────────────────────────────────────────────────────────
// Duplicate guard
// ───────────────────────────────────────────────────────────────

/// Drops a `StartPressed` or `SubStart(i)` that repeats one dispatched less
/// than `window_ms` earlier.  `ResetPressed` clears it.
#[derive(Debug, Clone)]
pub struct DuplicateGuard {
    window_ms: u32,
    start: Option<u32>,
    sub_start: [Option<u32>; SHOE_COUNT],
}

impl DuplicateGuard {
    pub fn new(window_ms: u32) -> Self {
        Self {
            window_ms,
            start: None,
            sub_start: [None; SHOE_COUNT],
        }
    }

    pub fn admit(&mut self, now_ms: u32, ev: &Event) -> bool {
        let window = self.window_ms;
        let check = |last: &mut Option<u32>| {
            if last.is_some_and(|t| now_ms.wrapping_sub(t) < window) {
                return false;
            }
            *last = Some(now_ms);
            true
        };
        match *ev {
            Event::StartPressed => check(&mut self.start),
            Event::SubStart(i) => match self.sub_start.get_mut(i as usize) {
                Some(last) => check(last),
                None => true,
            },
            Event::ResetPressed => {
                self.clear();
                true
            }
            _ => true,
        }
    }

    pub fn clear(&mut self) {
        self.start = None;
        self.sub_start = [None; SHOE_COUNT];
    }
}

// ───────────────────────────────────────────────────────────────
// Coordinator
// ───────────────────────────────────────────────────────────────

pub struct Coordinator {
    fsm: Fsm<GlobalState, CoordCtx>,
    ctx: CoordCtx,
    guard: DuplicateGuard,
    status_led: LedPatternEngine,
    error_led: LedPatternEngine,
    last_battery_ms: Option<u32>,
    // Last values reported through the sink.
    seen_state: GlobalState,
    seen_shoes: [ShoeState; SHOE_COUNT],
    seen_faults: u8,
}

impl Coordinator {
    /// Build the coordinator.  Does **not** start the machine; call
    /// [`start`](Self::start) next.
    pub fn new(cfg: DryerConfig) -> Self {
        let guard = DuplicateGuard::new(cfg.debounce_ms);
        Self {
            fsm: Fsm::new("FSM", &GLOBAL_TABLE, GlobalState::Idle),
            ctx: CoordCtx::new(cfg),
            guard,
            status_led: LedPatternEngine::new(),
            error_led: LedPatternEngine::new(),
            last_battery_ms: None,
            seen_state: GlobalState::Idle,
            seen_shoes: [ShoeState::Idle; SHOE_COUNT],
            seen_faults: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Enter Idle (all outputs off) and push the entry commands to the bus.
    pub fn start<B>(&mut self, now_ms: u32, bus: &mut B, sink: &mut impl EventSink)
    where
        B: EventQueue + CommandPort,
    {
        self.ctx.now_ms = now_ms;
        self.fsm.start(&mut self.ctx);
        self.ctx.out.flush(bus);
        sink.emit(&AppEvent::Started(self.fsm.current()));
        info!("Coordinator started in {:?}", self.fsm.current());
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// One coordinator period: battery → events → run callbacks → LEDs.
    pub fn tick<B, P>(
        &mut self,
        now_ms: u32,
        snap: &SensorSnapshot,
        bus: &mut B,
        panel: &mut P,
        sink: &mut impl EventSink,
    ) where
        B: EventQueue + CommandPort,
        P: IndicatorPort + BatteryPort,
    {
        self.ctx.now_ms = now_ms;
        self.ctx.snap = *snap;

        let battery_due = self
            .last_battery_ms
            .is_none_or(|t| now_ms.wrapping_sub(t) >= self.ctx.cfg.battery_check_interval_ms);
        if battery_due {
            self.refresh_battery(now_ms, panel);
        }

        for _ in 0..MAX_EVENTS_PER_TICK {
            let Some(ev) = bus.next_event() else {
                break;
            };
            if !self.guard.admit(now_ms, &ev) {
                debug!("FSM: duplicate {ev:?} dropped");
                continue;
            }
            if ev == Event::SensorTimeout {
                // Checking entry decides on this reading.
                self.refresh_battery(now_ms, panel);
            }
            self.fsm.handle(&mut self.ctx, &ev);
            self.ctx.out.flush(bus);
            self.report(sink);
        }

        self.fsm.run(&mut self.ctx);
        self.ctx.out.flush(bus);
        self.report(sink);

        self.status_led.set(self.ctx.status_led);
        self.error_led.set(self.ctx.error_led);
        panel.set_status_led(self.status_led.tick(now_ms));
        panel.set_error_led(self.error_led.tick(now_ms));
    }

    fn refresh_battery(&mut self, now_ms: u32, panel: &mut impl BatteryPort) {
        self.last_battery_ms = Some(now_ms);
        self.ctx.battery_v = panel.read_voltage();
    }

    /// Emit state changes and fault changes since the last report.
    fn report(&mut self, sink: &mut impl EventSink) {
        let state = self.fsm.current();
        if state != self.seen_state {
            sink.emit(&AppEvent::StateChanged {
                from: self.seen_state,
                to: state,
            });
            self.seen_state = state;
        }

        for (i, seen) in self.seen_shoes.iter_mut().enumerate() {
            let now = self.ctx.shoe_state(i);
            if now != *seen {
                sink.emit(&AppEvent::ShoeStateChanged {
                    shoe: i as ShoeId,
                    from: *seen,
                    to: now,
                });
                *seen = now;
            }
        }

        let faults = self.ctx.faults;
        if faults & !self.seen_faults != 0 {
            sink.emit(&AppEvent::FaultRaised(faults));
        } else if faults == 0 && self.seen_faults != 0 {
            sink.emit(&AppEvent::FaultsCleared);
        }
        self.seen_faults = faults;
    }

    /// Emit one telemetry frame for the current state.
    pub fn emit_telemetry(&self, act: &ActuatorStatus, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::Telemetry(self.telemetry(act)));
    }

    pub fn telemetry(&self, act: &ActuatorStatus) -> TelemetryFrame {
        let states = core::array::from_fn(|i| self.ctx.shoe_state(i));
        TelemetryFrame::build(self.ctx.now_ms, &self.ctx.snap, act, states)
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> GlobalState {
        self.fsm.current()
    }

    pub fn shoe_state(&self, shoe: usize) -> ShoeState {
        self.ctx.shoe_state(shoe)
    }

    pub fn progress(&self, shoe: usize, act: &ActuatorStatus) -> u8 {
        let uv = act.uv_running.then_some(act.uv_remaining_secs);
        self.ctx.shoes[shoe].progress(uv)
    }

    pub fn elapsed_secs(&self) -> u32 {
        self.ctx.elapsed() / 1000
    }

    pub fn slot(&self) -> Option<ShoeId> {
        self.ctx.slot
    }

    pub fn faults(&self) -> u8 {
        self.ctx.faults
    }

    pub fn battery_v(&self) -> Option<f32> {
        self.ctx.battery_v
    }

    pub fn uv_started(&self) -> bool {
        self.ctx.uv_started
    }

    pub fn config(&self) -> &DryerConfig {
        &self.ctx.cfg
    }

    pub fn snapshot(&self) -> &SensorSnapshot {
        &self.ctx.snap
    }
}
