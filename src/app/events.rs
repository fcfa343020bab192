//! Outbound application events.
//!
//! The [`Coordinator`](super::coordinator::Coordinator) emits these through
//! the [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, stream CSV telemetry.

use crate::bus::snapshot::{ActuatorStatus, SensorSnapshot};
use crate::config::{PROBE_COUNT, SHOE_COUNT};
use crate::fsm::global::GlobalState;
use crate::fsm::shoe::ShoeState;

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The coordinator has started (carries initial state).
    Started(GlobalState),

    /// The appliance machine transitioned.
    StateChanged { from: GlobalState, to: GlobalState },

    /// A shoe machine transitioned.
    ShoeStateChanged {
        shoe: u8,
        from: ShoeState,
        to: ShoeState,
    },

    /// New fault bits were raised (the full mask is carried).
    FaultRaised(u8),

    /// All faults were cleared (Reset or Idle entry).
    FaultsCleared,

    /// Periodic telemetry frame.
    Telemetry(TelemetryFrame),
}

/// One bay's columns of a telemetry frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShoeTelemetry {
    pub temp_c: Option<f32>,
    pub delta_ah: Option<f32>,
    pub is_wet: bool,
    pub state: ShoeState,
    pub rate: f32,
    pub pid_output: f32,
    pub motor_duty: u8,
}

/// A point-in-time telemetry frame, one CSV line when streamed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryFrame {
    pub time_ms: u32,
    pub ah: [Option<f32>; PROBE_COUNT],
    pub shoes: [ShoeTelemetry; SHOE_COUNT],
}

impl TelemetryFrame {
    pub fn build(
        time_ms: u32,
        snap: &SensorSnapshot,
        act: &ActuatorStatus,
        states: [ShoeState; SHOE_COUNT],
    ) -> Self {
        let ah = snap.probes.map(|p| p.ah_ema);
        let shoes = core::array::from_fn(|i| ShoeTelemetry {
            temp_c: snap.shoe_temp(i),
            delta_ah: snap.shoes[i].delta_ah,
            is_wet: snap.shoes[i].is_wet,
            state: states[i],
            rate: snap.shoes[i].rate,
            pid_output: act.shoes[i].pid_output,
            motor_duty: act.shoes[i].motor_duty,
        });
        Self { time_ms, ah, shoes }
    }
}
