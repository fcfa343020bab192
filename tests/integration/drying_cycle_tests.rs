//! End-to-end drying cycles: coordinator, both shoe machines and the
//! actuator driver against the scripted plant.

use shoedryer::bus::Event;
use shoedryer::config::DryerConfig;
use shoedryer::error::Fault;
use shoedryer::fsm::global::GlobalState;
use shoedryer::fsm::shoe::ShoeState;

use crate::mock_hw::{Rig, ShoeProfile};

const MINUTE: u32 = 60_000;

fn started(cfg: DryerConfig, profiles: [ShoeProfile; 2]) -> Rig {
    let mut rig = Rig::with_config(cfg, profiles);
    rig.run_for(100);
    rig.press(Event::StartPressed);
    rig
}

// ── Both dry ──────────────────────────────────────────────────

#[test]
fn dry_pair_goes_straight_to_uv() {
    let mut rig = started(DryerConfig::default(), [ShoeProfile::dry(0.3), ShoeProfile::dry(0.3)]);

    assert!(rig.run_until(MINUTE, |r| r.state() == GlobalState::Running));
    // Detecting holds for the equalize window before the battery gate.
    assert!(rig.now >= 6_000);
    rig.run_for(1_000);
    assert_eq!(rig.shoe(0), ShoeState::Dry);
    assert_eq!(rig.shoe(1), ShoeState::Dry);
    assert!(rig.coord.uv_started());

    assert!(rig.run_until(2 * MINUTE, |r| r.state() == GlobalState::Done));
    assert_eq!(rig.shoe(0), ShoeState::Done);
    assert_eq!(rig.shoe(1), ShoeState::Done);
    assert_eq!(rig.hw.uv_starts, 1);
    assert_eq!(rig.hw.uv, 0);
    assert_eq!(rig.hw.motor, [0, 0]);

    let done_at = rig.now;
    assert!(rig.run_until(MINUTE, |r| r.state() == GlobalState::Idle));
    assert!(rig.now - done_at >= 10_000);
    assert_eq!(
        rig.sink.global_path(),
        vec![
            GlobalState::Detecting,
            GlobalState::Checking,
            GlobalState::Running,
            GlobalState::Done,
            GlobalState::Idle,
        ]
    );
    assert_eq!(
        rig.sink.shoe_path(0),
        vec![ShoeState::Dry, ShoeState::Done, ShoeState::Idle]
    );
}

// ── One wet shoe ──────────────────────────────────────────────

#[test]
fn single_wet_shoe_full_cycle() {
    let mut rig = started(
        DryerConfig::default(),
        [ShoeProfile::wet(2.0, 0.8, &[0.3]), ShoeProfile::dry(0.4)],
    );

    assert!(rig.run_until(MINUTE, |r| r.shoe(0) == ShoeState::Wet));
    assert_eq!(rig.shoe(1), ShoeState::Dry);
    let wet_at = rig.now;

    // Prewarm: heater first, motor later.
    rig.run_for(5_000);
    assert!(rig.hw.heater[0]);
    assert_eq!(rig.hw.motor[0], 0);
    rig.run_for(10_000);
    assert!(rig.hw.motor[0] > 0);

    assert!(rig.run_until(20 * MINUTE, |r| r.shoe(0) == ShoeState::Cooling));
    // Moderate tier minimum wet time.
    assert!(rig.now - wet_at >= 360_000);
    assert_eq!(rig.coord.slot(), None);
    rig.run_for(200);
    assert!(!rig.hw.heater[0]);

    assert!(rig.run_until(10 * MINUTE, |r| r.shoe(0) == ShoeState::Dry));
    assert!(rig.coord.uv_started());
    assert!(rig.run_until(2 * MINUTE, |r| r.state() == GlobalState::Done));

    assert_eq!(rig.hw.uv_starts, 1);
    assert!(!rig.double_wet);
    assert_eq!(rig.coord.faults(), 0);
    assert_eq!(
        rig.sink.shoe_path(0),
        vec![
            ShoeState::Waiting,
            ShoeState::Wet,
            ShoeState::Cooling,
            ShoeState::Dry,
            ShoeState::Done,
        ]
    );
}

// ── Two wet shoes share the evaporation slot ──────────────────

#[test]
fn wetter_shoe_evaporates_first_and_peer_waits_for_its_motor() {
    let mut rig = started(
        DryerConfig::default(),
        [ShoeProfile::wet(5.5, 1.2, &[0.3]), ShoeProfile::wet(2.1, 0.8, &[0.3])],
    );

    assert!(rig.run_until(MINUTE, |r| r.shoe(0) == ShoeState::Wet));
    assert_eq!(rig.shoe(1), ShoeState::Waiting);
    assert_eq!(rig.coord.slot(), Some(0));

    assert!(rig.run_until(30 * MINUTE, |r| r.shoe(0) == ShoeState::Cooling));
    let cooling_at = rig.now;
    assert_eq!(rig.shoe(1), ShoeState::Waiting);

    assert!(rig.run_until(10 * MINUTE, |r| r.shoe(1) == ShoeState::Wet));
    // The shared duct stays closed to the peer while shoe 0's cooling
    // motor runs (90 s for the ΔAH it entered Cooling with).
    assert!(rig.now - cooling_at >= 90_000);
    assert_ne!(rig.shoe(0), ShoeState::Wet);
    assert_eq!(rig.coord.slot(), Some(1));

    assert!(rig.run_until(30 * MINUTE, |r| r.state() == GlobalState::Done));
    assert_eq!(rig.hw.uv_starts, 1);
    assert!(!rig.double_wet);
    // Wet plus Cooling outlasts one safety window; each phase fits its own.
    assert_eq!(rig.coord.faults(), 0);
    for shoe in 0..2 {
        assert_eq!(
            rig.sink.shoe_path(shoe),
            vec![
                ShoeState::Waiting,
                ShoeState::Wet,
                ShoeState::Cooling,
                ShoeState::Dry,
                ShoeState::Done,
            ]
        );
    }
}

// ── Failed dry check ──────────────────────────────────────────

#[test]
fn failed_dry_check_runs_re_evaporation_then_passes() {
    let mut rig = started(
        DryerConfig::default(),
        [ShoeProfile::wet(2.0, 0.8, &[0.85, 0.3]), ShoeProfile::dry(0.3)],
    );

    assert!(rig.run_until(30 * MINUTE, |r| r.shoe(0) == ShoeState::Cooling));
    assert!(rig.run_until(10 * MINUTE, |r| r.shoe(0) == ShoeState::Waiting));
    assert!(!rig.coord.uv_started());

    assert!(rig.run_until(MINUTE, |r| r.shoe(0) == ShoeState::Wet));
    let burst_at = rig.now;
    rig.run_for(1_000);
    // Re-evaporation runs at a fixed high duty from the start.
    assert!(rig.hw.motor[0] > 0);

    assert!(rig.run_until(2 * MINUTE, |r| r.shoe(0) == ShoeState::Cooling));
    assert!(rig.now - burst_at <= 61_000);
    let retry_cooling_at = rig.now;

    assert!(rig.run_until(10 * MINUTE, |r| r.shoe(0) == ShoeState::Dry));
    // A retry never cools for less than the extended duration.
    assert!(rig.now - retry_cooling_at >= 150_000);

    assert!(rig.run_until(2 * MINUTE, |r| r.state() == GlobalState::Done));
    assert_eq!(rig.hw.uv_starts, 1);
    assert_eq!(
        rig.sink.shoe_path(0),
        vec![
            ShoeState::Waiting,
            ShoeState::Wet,
            ShoeState::Cooling,
            ShoeState::Waiting,
            ShoeState::Wet,
            ShoeState::Cooling,
            ShoeState::Dry,
            ShoeState::Done,
        ]
    );
}

// ── Motor safety timeout ──────────────────────────────────────

#[test]
fn stuck_shoe_is_cut_off_by_safety_timer() {
    let mut rig = started(
        DryerConfig::default(),
        [ShoeProfile::stuck(5.5), ShoeProfile::dry(0.3)],
    );

    assert!(rig.run_until(MINUTE, |r| r.shoe(0) == ShoeState::Wet));
    let wet_at = rig.now;

    assert!(rig.run_until(15 * MINUTE, |r| r.shoe(0) == ShoeState::Done));
    let ran = rig.now - wet_at;
    // 10 s prewarm, then the 600 s continuous-run limit.
    assert!(ran >= 600_000 && ran <= 615_000, "ran {ran} ms");
    assert_eq!(rig.hw.motor[0], 0);
    assert!(!rig.hw.heater[0]);
    assert_ne!(rig.coord.faults() & Fault::SafetyTimeout.mask(), 0);

    assert!(rig.run_until(MINUTE, |r| r.state() == GlobalState::Done));
    // An aborted cycle never sterilises.
    assert!(!rig.hw.uv_ever_on());
    assert_eq!(rig.shoe(1), ShoeState::Dry);

    assert!(rig.run_until(MINUTE, |r| r.state() == GlobalState::Idle));
    assert_eq!(rig.coord.faults(), 0);
}
