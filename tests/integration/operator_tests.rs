//! Operator panel behaviour: battery gate, Reset, Start repeats, Debug.

use shoedryer::bus::Event;
use shoedryer::error::Fault;
use shoedryer::fsm::global::GlobalState;
use shoedryer::fsm::shoe::ShoeState;

use crate::mock_hw::{ActuatorCall, Rig, ShoeProfile};

fn wet_pair() -> [ShoeProfile; 2] {
    [ShoeProfile::wet(2.0, 0.8, &[0.3]), ShoeProfile::dry(0.3)]
}

// ── Battery ───────────────────────────────────────────────────

#[test]
fn low_battery_blocks_start_until_recovery_voltage() {
    let mut rig = Rig::new(wet_pair());
    rig.panel.voltage = Some(2.9);
    rig.run_for(100);
    rig.press(Event::StartPressed);

    assert!(rig.run_until(20_000, |r| r.state() == GlobalState::LowBattery));
    assert_eq!(rig.shoe(0), ShoeState::Idle);
    assert_ne!(rig.coord.faults() & Fault::LowBattery.mask(), 0);
    rig.run_for(100);
    assert!(!rig.panel.status_led);
    assert!(rig.panel.error_led);
    assert!(rig.hw.all_outputs_off());

    // Polled about once a second while waiting.
    let reads = rig.panel.reads;
    rig.run_for(10_000);
    let polled = rig.panel.reads - reads;
    assert!((9..=11).contains(&polled), "{polled} reads in 10 s");

    // Between the thresholds: hysteresis holds.
    rig.panel.voltage = Some(3.1);
    rig.run_for(5_000);
    assert_eq!(rig.state(), GlobalState::LowBattery);

    // A failed read is never taken as recovered.
    rig.panel.voltage = None;
    rig.run_for(3_000);
    assert_eq!(rig.state(), GlobalState::LowBattery);

    rig.panel.voltage = Some(3.2);
    assert!(rig.run_until(2_000, |r| r.state() == GlobalState::Idle));
    assert_eq!(rig.coord.faults(), 0);
}

#[test]
fn reset_leaves_low_battery() {
    let mut rig = Rig::new(wet_pair());
    rig.panel.voltage = Some(2.5);
    rig.press(Event::StartPressed);
    assert!(rig.run_until(20_000, |r| r.state() == GlobalState::LowBattery));

    rig.press(Event::ResetPressed);
    rig.run_for(100);
    assert_eq!(rig.state(), GlobalState::Idle);
}

// ── Reset ─────────────────────────────────────────────────────

#[test]
fn reset_mid_cycle_stops_everything_within_a_tick() {
    let mut rig = Rig::new(wet_pair());
    rig.press(Event::StartPressed);
    assert!(rig.run_until(60_000, |r| r.shoe(0) == ShoeState::Wet));
    rig.run_for(30_000);
    assert!(rig.hw.heater[0]);
    assert!(rig.hw.motor[0] > 0);
    assert_eq!(rig.coord.slot(), Some(0));

    rig.press(Event::ResetPressed);
    rig.run_for(50);
    assert_eq!(rig.state(), GlobalState::Idle);
    assert_eq!(rig.shoe(0), ShoeState::Idle);
    assert_eq!(rig.shoe(1), ShoeState::Idle);
    assert_eq!(rig.coord.slot(), None);

    // AllOff bypasses the ramp on the next actuator tick.
    rig.run_for(100);
    assert!(rig.hw.all_outputs_off());
    assert!(rig.hw.calls.contains(&ActuatorCall::AllOff));
}

#[test]
fn start_reset_start_matches_a_single_start() {
    let mut once = Rig::new(wet_pair());
    once.press(Event::StartPressed);
    once.run_for(20_000);

    let mut again = Rig::new(wet_pair());
    again.press(Event::StartPressed);
    again.run_for(1_000);
    again.press(Event::ResetPressed);
    again.run_for(1_000);
    assert_eq!(again.state(), GlobalState::Idle);
    again.press(Event::StartPressed);
    again.run_for(20_000);

    assert_eq!(again.state(), once.state());
    assert_eq!(again.shoe(0), once.shoe(0));
    assert_eq!(again.shoe(1), once.shoe(1));
    assert_eq!(again.coord.slot(), once.coord.slot());
    assert_eq!(again.state(), GlobalState::Running);
}

#[test]
fn repeated_start_inside_debounce_window_is_dropped() {
    let mut rig = Rig::new(wet_pair());
    rig.press(Event::StartPressed);
    rig.press(Event::StartPressed);
    rig.run_for(100);
    assert_eq!(rig.state(), GlobalState::Detecting);

    // A second press while detecting does not restart the settle window.
    rig.run_for(1_000);
    rig.press(Event::StartPressed);
    assert!(rig.run_until(10_000, |r| r.state() == GlobalState::Running));
    assert!(rig.now <= 6_500);
}

#[test]
fn start_is_ignored_while_running() {
    let mut rig = Rig::new(wet_pair());
    rig.press(Event::StartPressed);
    assert!(rig.run_until(60_000, |r| r.shoe(0) == ShoeState::Wet));
    rig.press(Event::StartPressed);
    rig.run_for(1_000);
    assert_eq!(rig.state(), GlobalState::Running);
    assert_eq!(rig.shoe(0), ShoeState::Wet);
}

// ── Debug ─────────────────────────────────────────────────────

#[test]
fn debug_mode_lights_both_leds_with_outputs_off() {
    let mut rig = Rig::new(wet_pair());
    rig.press(Event::DebugRequested);
    rig.run_for(200);
    assert_eq!(rig.state(), GlobalState::Debug);
    assert!(rig.panel.status_led);
    assert!(rig.panel.error_led);
    assert!(rig.hw.all_outputs_off());

    rig.press(Event::StartPressed);
    rig.run_for(500);
    assert_eq!(rig.state(), GlobalState::Debug);

    rig.press(Event::ResetPressed);
    rig.run_for(100);
    assert_eq!(rig.state(), GlobalState::Idle);
}
