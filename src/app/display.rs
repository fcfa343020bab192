//! Snapshot handed to the character displays, about once a second.
//!
//! Rendering lives outside the crate; this only gathers what the two
//! screens show into one plain value.

use crate::bus::snapshot::{ActuatorStatus, SensorSnapshot};
use crate::config::{PROBE_COUNT, SHOE_COUNT};

use super::coordinator::Coordinator;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShoeLine {
    pub state: &'static str,
    pub progress_pct: u8,
    pub is_wet: bool,
    pub temp_c: Option<f32>,
    pub delta_ah: Option<f32>,
    pub motor_duty: u8,
    pub heater_on: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplaySnapshot {
    pub state: &'static str,
    pub elapsed_secs: u32,
    pub ah: [Option<f32>; PROBE_COUNT],
    pub ambient_temp_c: Option<f32>,
    pub shoes: [ShoeLine; SHOE_COUNT],
    pub uv_remaining_secs: u32,
    pub battery_v: Option<f32>,
}

impl DisplaySnapshot {
    pub fn build(coord: &Coordinator, snap: &SensorSnapshot, act: &ActuatorStatus) -> Self {
        let shoes = core::array::from_fn(|i| ShoeLine {
            state: coord.shoe_state(i).abbrev(),
            progress_pct: coord.progress(i, act),
            is_wet: snap.shoes[i].is_wet,
            temp_c: snap.shoe_temp(i),
            delta_ah: snap.shoes[i].delta_ah,
            motor_duty: act.shoes[i].motor_duty,
            heater_on: act.shoes[i].heater_on,
        });
        Self {
            state: coord.state().abbrev(),
            elapsed_secs: coord.elapsed_secs(),
            ah: snap.probes.map(|p| p.ah_ema),
            ambient_temp_c: snap.ambient_temp(),
            shoes,
            uv_remaining_secs: act.uv_remaining_secs,
            battery_v: coord.battery_v(),
        }
    }
}
