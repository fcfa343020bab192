//! Inter-task channels.
//!
//! `embassy-sync` bounded MPMC channels shared by the firmware tasks.  The
//! sensor, actuator and button contexts all produce events; the coordinator
//! is the single consumer.  Commands flow the other way with the actuator
//! task as the single consumer.
//!
//! ```text
//! ┌──────────────┐   Event   ┌──────────────┐
//! │ sensor/act.  │──────────▶│ Coordinator  │
//! │ buttons      │           │              │
//! └──────────────┘           └──────┬───────┘
//!                          Command  │
//!                                   ▼
//!                            ┌──────────────┐
//!                            │ Actuator     │
//!                            └──────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

use super::{COMMAND_DEPTH, Command, CommandPort, EVENT_DEPTH, Event, EventQueue};

/// All producers → coordinator.
pub static EVENT_CHANNEL: Channel<CriticalSectionRawMutex, Event, EVENT_DEPTH> = Channel::new();

/// Coordinator → actuator task.
pub static COMMAND_CHANNEL: Channel<CriticalSectionRawMutex, Command, COMMAND_DEPTH> =
    Channel::new();

/// Zero-sized handle onto the static channels.  Each task holds its own
/// copy; every method is a non-blocking `try_*`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelBus;

impl EventQueue for ChannelBus {
    fn post(&mut self, event: Event) -> bool {
        match EVENT_CHANNEL.try_send(event) {
            Ok(()) => true,
            Err(_) => {
                warn!("BUS: event channel full, dropped {:?}", event);
                false
            }
        }
    }

    fn next_event(&mut self) -> Option<Event> {
        EVENT_CHANNEL.try_receive().ok()
    }
}

impl CommandPort for ChannelBus {
    fn send(&mut self, cmd: Command) -> bool {
        match COMMAND_CHANNEL.try_send(cmd) {
            Ok(()) => true,
            Err(_) => {
                warn!("BUS: command channel full, dropped {:?}", cmd);
                false
            }
        }
    }

    fn next_command(&mut self) -> Option<Command> {
        COMMAND_CHANNEL.try_receive().ok()
    }
}
