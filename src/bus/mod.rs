//! Event and command bus.
//!
//! Two bounded FIFOs decouple the tasks: every event funnels into the
//! coordinator through one queue, and every actuator command funnels into
//! the actuator driver through another.
//!
//! ```text
//! ┌─────────────┐  Event   ┌──────────────┐  Command  ┌──────────────┐
//! │ Buttons     │─────────▶│              │──────────▶│              │
//! │ Sensor task │─────────▶│ Coordinator  │           │ Actuator     │
//! │ Actuator    │─────────▶│ (+ shoe FSMs)│           │ driver       │
//! └─────────────┘          └──────────────┘           └──────────────┘
//!        ▲                                                   │
//!        └──────────── SafetyTimeout / UvComplete ───────────┘
//! ```
//!
//! Enqueue never blocks: a full queue drops the item and logs a warning.
//! The same contract is implemented by [`LocalBus`] (owned, single thread)
//! and by [`channels::ChannelBus`] (static channels shared by firmware tasks).

pub mod channels;
pub mod snapshot;

use heapless::Deque;
use log::warn;

/// Event queue depth.
pub const EVENT_DEPTH: usize = 8;
/// Command queue depth.
pub const COMMAND_DEPTH: usize = 16;

/// Bay index carried by events and commands.  Valid values are 0 and 1;
/// the actuator driver rejects anything else.
pub type ShoeId = u8;

// ---------------------------------------------------------------------------
// Events (→ coordinator)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // ── Operator ──────────────────────────────────────────
    StartPressed,
    ResetPressed,
    DebugRequested,

    // ── Coordinator lifecycle ─────────────────────────────
    SensorTimeout,
    BatteryLow,
    BatteryRecovered,
    AllSubsDone,
    DoneTimeout,

    // ── Shoe machine ──────────────────────────────────────
    InitWet(ShoeId),
    InitDry(ShoeId),
    SubStart(ShoeId),
    PeakConfirmed(ShoeId),
    DryCheckPass(ShoeId),
    DryCheckFail(ShoeId),
    SubDone(ShoeId),

    // ── Actuator driver ───────────────────────────────────
    UvComplete,
    DrySignal(ShoeId),
    SafetyTimeout(ShoeId),

    // ── Sensor front-end ──────────────────────────────────
    ProbeTimeout,
}

impl Event {
    /// The bay this event targets, if it is shoe-specific.
    pub fn shoe(&self) -> Option<ShoeId> {
        match *self {
            Self::InitWet(i)
            | Self::InitDry(i)
            | Self::SubStart(i)
            | Self::PeakConfirmed(i)
            | Self::DryCheckPass(i)
            | Self::DryCheckFail(i)
            | Self::SubDone(i)
            | Self::DrySignal(i)
            | Self::SafetyTimeout(i) => Some(i),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Commands (→ actuator driver)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Mark the shoe active, start its safety timer, ramp to 100 %, heater on.
    MotorStart(ShoeId),
    /// Clear active, ramp to 0, heater off.
    MotorStop(ShoeId),
    /// New manual ramp target (0–100 %).  Leaves PID mode.
    SetMotorDuty(ShoeId, u8),
    HeaterSet(ShoeId, bool),
    /// Hand the shoe's duty to the PID loop.
    PidEnable(ShoeId),
    /// Wet→Cooling handoff: heater off, manual duty, and a fresh safety
    /// window for the cooling run.
    CoolingStart(ShoeId, u8),
    UvStart { duration_ms: u32 },
    UvStop,
    /// Zero every output immediately, no ramp.
    AllOff,
}

impl Command {
    pub fn shoe(&self) -> Option<ShoeId> {
        match *self {
            Self::MotorStart(i)
            | Self::MotorStop(i)
            | Self::SetMotorDuty(i, _)
            | Self::HeaterSet(i, _)
            | Self::PidEnable(i)
            | Self::CoolingStart(i, _) => Some(i),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Queue ports
// ---------------------------------------------------------------------------

/// Bounded FIFO of events feeding the coordinator.
pub trait EventQueue {
    /// Non-blocking enqueue.  Returns `false` if the event was dropped.
    fn post(&mut self, event: Event) -> bool;
    fn next_event(&mut self) -> Option<Event>;
}

/// Bounded FIFO of commands feeding the actuator driver.
pub trait CommandPort {
    /// Non-blocking enqueue.  Returns `false` if the command was dropped.
    fn send(&mut self, cmd: Command) -> bool;
    fn next_command(&mut self) -> Option<Command>;
}

// ---------------------------------------------------------------------------
// BoundedQueue
// ---------------------------------------------------------------------------

/// Fixed-capacity FIFO that drops (and counts) on overflow.
pub struct BoundedQueue<T, const N: usize> {
    name: &'static str,
    items: Deque<T, N>,
    dropped: u32,
}

impl<T: core::fmt::Debug, const N: usize> BoundedQueue<T, N> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            items: Deque::new(),
            dropped: 0,
        }
    }

    pub fn push(&mut self, item: T) -> bool {
        match self.items.push_back(item) {
            Ok(()) => true,
            Err(item) => {
                self.dropped = self.dropped.wrapping_add(1);
                warn!("BUS: {} queue full, dropped {:?}", self.name, item);
                false
            }
        }
    }

    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Items dropped on overflow since construction.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

// ---------------------------------------------------------------------------
// LocalBus
// ---------------------------------------------------------------------------

/// Both queues owned in-process.  Used when the coordinator and actuator
/// driver run on the same thread (host simulation, integration tests).
pub struct LocalBus {
    pub events: BoundedQueue<Event, EVENT_DEPTH>,
    pub commands: BoundedQueue<Command, COMMAND_DEPTH>,
}

impl LocalBus {
    pub const fn new() -> Self {
        Self {
            events: BoundedQueue::new("event"),
            commands: BoundedQueue::new("command"),
        }
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue for LocalBus {
    fn post(&mut self, event: Event) -> bool {
        self.events.push(event)
    }

    fn next_event(&mut self) -> Option<Event> {
        self.events.pop()
    }
}

impl CommandPort for LocalBus {
    fn send(&mut self, cmd: Command) -> bool {
        self.commands.push(cmd)
    }

    fn next_command(&mut self) -> Option<Command> {
        self.commands.pop()
    }
}
