//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the log facade (UART in production, stderr under simulation).

use log::{debug, error, info};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => {
                let [s0, s1] = &t.shoes;
                debug!(
                    "TELEM | t={}ms | S0 {} d={:?} duty={}% | S1 {} d={:?} duty={}%",
                    t.time_ms,
                    s0.state.abbrev(),
                    s0.delta_ah,
                    s0.motor_duty,
                    s1.state.abbrev(),
                    s1.delta_ah,
                    s1.motor_duty,
                );
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {:?} -> {:?}", from, to);
            }
            AppEvent::ShoeStateChanged { shoe, from, to } => {
                info!("SHOE{} | {:?} -> {:?}", shoe, from, to);
            }
            AppEvent::FaultRaised(flags) => {
                error!("FAULT | raised, flags=0b{:08b}", flags);
            }
            AppEvent::FaultsCleared => {
                info!("FAULT | all cleared");
            }
            AppEvent::Started(state) => {
                info!("START | initial_state={:?}", state);
            }
        }
    }
}
