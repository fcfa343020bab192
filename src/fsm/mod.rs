//! Function-pointer finite state machine engine.
//!
//! Both the global coordinator and the two per-shoe machines run on this
//! engine.  A machine is a static table of plain `fn` pointers indexed by
//! its state enum:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                          │
//! │  ┌─────────┬──────────┬──────────┬──────────────┬──────────────────┐ │
//! │  │ state   │ on_enter │ on_exit  │ on_run       │ on_event         │ │
//! │  ├─────────┼──────────┼──────────┼──────────────┼──────────────────┤ │
//! │  │ Idle    │ fn(ctx)  │ fn(ctx)  │ fn(ctx)->Opt │ fn(ctx,ev)->Rx   │ │
//! │  │ Waiting │ fn(ctx)  │ fn(ctx)  │ fn(ctx)->Opt │ fn(ctx,ev)->Rx   │ │
//! │  │ ...     │          │          │              │                  │ │
//! │  └─────────┴──────────┴──────────┴──────────────┴──────────────────┘ │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! * `on_event` reacts to one dequeued [`Event`]: [`Reaction::Goto`] runs
//!   `on_exit(current)` then `on_enter(next)`; [`Reaction::Ignored`] is
//!   logged and otherwise has no effect.
//! * `on_run` is the periodic work while in a state; returning
//!   `Some(next)` transitions the same way.
//!
//! Handlers never touch hardware.  They write commands and follow-up events
//! into the context's [`Outbox`], which the owner flushes to the bus after
//! each dispatch so program order is preserved.

pub mod global;
pub mod global_states;
pub mod shoe;
pub mod shoe_states;

use heapless::Vec;
use log::{debug, info, warn};

use crate::bus::{COMMAND_DEPTH, Command, CommandPort, EVENT_DEPTH, Event, EventQueue};

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// A closed set of states usable as a table index.
pub trait StateKind: Copy + Eq + core::fmt::Debug + 'static {
    fn index(self) -> usize;
}

/// Context threaded through every handler.  The engine uses it to stamp the
/// entry time of each state.
pub trait MachineContext {
    fn now_ms(&self) -> u32;
    fn mark_entered(&mut self, now_ms: u32);
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Outcome of `on_event`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction<S> {
    /// No transition matches this event in this state.
    Ignored,
    /// Handled, no transition.
    Stay,
    Goto(S),
}

pub type StateActionFn<C> = fn(&mut C);
pub type StateRunFn<S, C> = fn(&mut C) -> Option<S>;
pub type StateEventFn<S, C> = fn(&mut C, &Event) -> Reaction<S>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

pub struct StateDescriptor<S, C> {
    pub id: S,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn<C>>,
    pub on_exit: Option<StateActionFn<C>>,
    pub on_run: Option<StateRunFn<S, C>>,
    pub on_event: StateEventFn<S, C>,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

pub struct Fsm<S: 'static, C: 'static> {
    /// Log tag, e.g. `"FSM"` or `"SHOE[1]"`.
    label: &'static str,
    table: &'static [StateDescriptor<S, C>],
    current: usize,
    started: bool,
}

impl<S: StateKind, C: MachineContext> Fsm<S, C> {
    pub fn new(label: &'static str, table: &'static [StateDescriptor<S, C>], initial: S) -> Self {
        debug_assert!(
            table.iter().enumerate().all(|(i, d)| d.id.index() == i),
            "state table out of order"
        );
        Self {
            label,
            table,
            current: initial.index(),
            started: false,
        }
    }

    /// Run the initial `on_enter`.  Call once before the first dispatch.
    pub fn start(&mut self, ctx: &mut C) {
        info!("{} starting in state: {}", self.label, self.table[self.current].name);
        self.started = true;
        let now = ctx.now_ms();
        ctx.mark_entered(now);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Dispatch one event.  Returns `true` if a transition happened.
    pub fn handle(&mut self, ctx: &mut C, event: &Event) -> bool {
        let table = self.table;
        let desc = &table[self.current];
        match (desc.on_event)(ctx, event) {
            Reaction::Goto(next) => {
                self.transition(next, ctx);
                true
            }
            Reaction::Stay => false,
            Reaction::Ignored => {
                debug!("{}: {:?} ignored in {}", self.label, event, desc.name);
                false
            }
        }
    }

    /// Periodic work for the current state.
    pub fn run(&mut self, ctx: &mut C) -> bool {
        let Some(run) = self.table[self.current].on_run else {
            return false;
        };
        match run(ctx) {
            Some(next) => {
                self.transition(next, ctx);
                true
            }
            None => false,
        }
    }

    /// Jump to `next` unless already there.
    pub fn force(&mut self, next: S, ctx: &mut C) {
        if next.index() != self.current {
            self.transition(next, ctx);
        }
    }

    pub fn current(&self) -> S {
        self.table[self.current].id
    }

    pub fn name(&self) -> &'static str {
        self.table[self.current].name
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next: S, ctx: &mut C) {
        let next_idx = next.index();
        if next_idx >= self.table.len() {
            warn!("{}: no state at index {next_idx}", self.label);
            return;
        }

        info!(
            "{} transition: {} -> {}",
            self.label, self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        let now = ctx.now_ms();
        ctx.mark_entered(now);

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}

// ---------------------------------------------------------------------------
// Outbox
// ---------------------------------------------------------------------------

/// Side effects produced by handlers, in the order they were requested.
#[derive(Debug, Default)]
pub struct Outbox {
    commands: Vec<Command, COMMAND_DEPTH>,
    events: Vec<Event, EVENT_DEPTH>,
}

impl Outbox {
    pub const fn new() -> Self {
        Self {
            commands: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn command(&mut self, cmd: Command) {
        if self.commands.push(cmd).is_err() {
            warn!("OUTBOX: command dropped {cmd:?}");
        }
    }

    pub fn event(&mut self, ev: Event) {
        if self.events.push(ev).is_err() {
            warn!("OUTBOX: event dropped {ev:?}");
        }
    }

    /// Move everything from `other` into `self`, keeping order.
    pub fn absorb(&mut self, other: &mut Outbox) {
        for &cmd in &other.commands {
            self.command(cmd);
        }
        for &ev in &other.events {
            self.event(ev);
        }
        other.clear();
    }

    pub fn flush<B: CommandPort + EventQueue>(&mut self, bus: &mut B) {
        for &cmd in &self.commands {
            bus.send(cmd);
        }
        for &ev in &self.events {
            bus.post(ev);
        }
        self.clear();
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Lamp {
        Dark,
        Lit,
    }

    impl StateKind for Lamp {
        fn index(self) -> usize {
            self as usize
        }
    }

    #[derive(Default)]
    struct Ctx {
        now: u32,
        entered: u32,
        enters: u32,
        exits: u32,
        runs: u32,
    }

    impl MachineContext for Ctx {
        fn now_ms(&self) -> u32 {
            self.now
        }
        fn mark_entered(&mut self, now_ms: u32) {
            self.entered = now_ms;
        }
    }

    fn on_enter(c: &mut Ctx) {
        c.enters += 1;
    }
    fn on_exit(c: &mut Ctx) {
        c.exits += 1;
    }
    fn dark_event(_: &mut Ctx, ev: &Event) -> Reaction<Lamp> {
        match ev {
            Event::StartPressed => Reaction::Goto(Lamp::Lit),
            _ => Reaction::Ignored,
        }
    }
    fn lit_event(_: &mut Ctx, ev: &Event) -> Reaction<Lamp> {
        match ev {
            Event::StartPressed => Reaction::Stay,
            _ => Reaction::Ignored,
        }
    }
    fn lit_run(c: &mut Ctx) -> Option<Lamp> {
        c.runs += 1;
        (c.now.wrapping_sub(c.entered) >= 1_000).then_some(Lamp::Dark)
    }

    static TABLE: [StateDescriptor<Lamp, Ctx>; 2] = [
        StateDescriptor {
            id: Lamp::Dark,
            name: "Dark",
            on_enter: None,
            on_exit: None,
            on_run: None,
            on_event: dark_event,
        },
        StateDescriptor {
            id: Lamp::Lit,
            name: "Lit",
            on_enter: Some(on_enter),
            on_exit: Some(on_exit),
            on_run: Some(lit_run),
            on_event: lit_event,
        },
    ];

    #[test]
    fn event_transition_runs_entry_and_stamps_time() {
        let mut ctx = Ctx::default();
        let mut fsm = Fsm::new("T", &TABLE, Lamp::Dark);
        fsm.start(&mut ctx);
        ctx.now = 500;
        assert!(fsm.handle(&mut ctx, &Event::StartPressed));
        assert_eq!(fsm.current(), Lamp::Lit);
        assert_eq!(ctx.enters, 1);
        assert_eq!(ctx.entered, 500);
    }

    #[test]
    fn stay_and_ignored_do_not_transition() {
        let mut ctx = Ctx::default();
        let mut fsm = Fsm::new("T", &TABLE, Lamp::Lit);
        fsm.start(&mut ctx);
        assert!(!fsm.handle(&mut ctx, &Event::StartPressed));
        assert!(!fsm.handle(&mut ctx, &Event::UvComplete));
        assert_eq!(fsm.current(), Lamp::Lit);
        assert_eq!(ctx.exits, 0);
    }

    #[test]
    fn run_callback_transitions() {
        let mut ctx = Ctx::default();
        let mut fsm = Fsm::new("T", &TABLE, Lamp::Lit);
        fsm.start(&mut ctx);
        ctx.now = 999;
        assert!(!fsm.run(&mut ctx));
        ctx.now = 1_000;
        assert!(fsm.run(&mut ctx));
        assert_eq!(fsm.current(), Lamp::Dark);
        assert_eq!(ctx.exits, 1);
        assert!(!fsm.run(&mut ctx), "Dark has no run callback");
    }

    #[test]
    fn force_skips_same_state() {
        let mut ctx = Ctx::default();
        let mut fsm = Fsm::new("T", &TABLE, Lamp::Lit);
        fsm.start(&mut ctx);
        fsm.force(Lamp::Lit, &mut ctx);
        assert_eq!(ctx.enters, 1);
        fsm.force(Lamp::Dark, &mut ctx);
        assert_eq!(ctx.exits, 1);
    }

    #[test]
    fn outbox_keeps_order() {
        let mut a = Outbox::new();
        let mut b = Outbox::new();
        a.command(Command::UvStop);
        b.command(Command::AllOff);
        b.event(Event::UvComplete);
        a.absorb(&mut b);
        assert!(b.is_empty());
        assert_eq!(a.commands(), &[Command::UvStop, Command::AllOff]);
        assert_eq!(a.events(), &[Event::UvComplete]);
    }
}
