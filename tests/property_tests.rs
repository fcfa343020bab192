//! Property and fuzz-style tests for the signal chain and the machines.
//!
//! Runs on host (x86_64) only; proptest is not available for ESP32 targets.
//! On ESP32, these tests are compiled out.

#![cfg(not(target_os = "espidf"))]

use proptest::prelude::*;
use shoedryer::actuator::ActuatorDriver;
use shoedryer::app::coordinator::Coordinator;
use shoedryer::app::events::AppEvent;
use shoedryer::app::ports::{ActuatorPort, BatteryPort, EventSink, IndicatorPort};
use shoedryer::bus::snapshot::SensorSnapshot;
use shoedryer::bus::{Event, EventQueue, LocalBus};
use shoedryer::config::DryerConfig;
use shoedryer::control::pid::PidController;
use shoedryer::fsm::shoe::{PeerView, ShoeState, may_acquire};
use shoedryer::sensors::humidity::{RateLimitedEma, absolute_humidity};

// ── Absolute humidity ─────────────────────────────────────────

proptest! {
    #[test]
    fn ah_is_none_when_either_input_is_missing(t in -40.0f32..85.0, rh in 0.0f32..100.0) {
        prop_assert_eq!(absolute_humidity(None, Some(rh)), None);
        prop_assert_eq!(absolute_humidity(Some(t), None), None);
        prop_assert_eq!(absolute_humidity(Some(f32::NAN), Some(rh)), None);
    }

    #[test]
    fn ah_grows_with_relative_humidity(t in -10.0f32..60.0, rh in 0.0f32..99.0, step in 0.5f32..20.0) {
        let lo = absolute_humidity(Some(t), Some(rh)).unwrap();
        let hi = absolute_humidity(Some(t), Some((rh + step).min(100.0))).unwrap();
        prop_assert!(lo >= 0.0);
        prop_assert!(hi >= lo);
    }

    #[test]
    fn ah_grows_with_temperature_at_fixed_rh(t in 0.0f32..60.0, rh in 5.0f32..100.0) {
        let cool = absolute_humidity(Some(t), Some(rh)).unwrap();
        let warm = absolute_humidity(Some(t + 5.0), Some(rh)).unwrap();
        prop_assert!(warm > cool);
    }
}

// ── Rate-limited EMA ──────────────────────────────────────────

proptest! {
    /// An accepted sample moves the average toward it without overshoot;
    /// a rejected one leaves it untouched.
    #[test]
    fn ema_never_overshoots(
        seed in 0.0f32..30.0,
        samples in proptest::collection::vec(0.0f32..30.0, 1..40),
    ) {
        let mut ema = RateLimitedEma::new(0.3, 2.0);
        ema.update(Some(seed));
        for x in samples {
            let prev = ema.value().unwrap();
            let rejected = ema.rejected();
            let now = ema.update(Some(x)).unwrap();
            if (x - prev).abs() > 2.0 {
                prop_assert_eq!(now, prev);
                prop_assert_eq!(ema.rejected(), rejected + 1);
            } else {
                prop_assert!(now >= prev.min(x) - 1e-4 && now <= prev.max(x) + 1e-4);
            }
        }
    }

    #[test]
    fn ema_forgets_on_missing_input(samples in proptest::collection::vec(0.0f32..30.0, 1..10)) {
        let mut ema = RateLimitedEma::new(0.3, f32::INFINITY);
        for x in samples {
            ema.update(Some(x));
        }
        prop_assert_eq!(ema.update(None), None);
        prop_assert_eq!(ema.value(), None);
    }
}

// ── Moisture tiers ────────────────────────────────────────────

proptest! {
    #[test]
    fn tier_never_drops_as_delta_rises(a in -2.0f32..10.0, b in -2.0f32..10.0) {
        let cfg = DryerConfig::default();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(cfg.classify(Some(lo)).index() <= cfg.classify(Some(hi)).index());
    }

    #[test]
    fn longer_tiers_never_shorten_minimum_wet_time(a in 0.0f32..8.0, b in 0.0f32..8.0) {
        let cfg = DryerConfig::default();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let t_lo = cfg.tier(cfg.classify(Some(lo))).min_wet_secs;
        let t_hi = cfg.tier(cfg.classify(Some(hi))).min_wet_secs;
        prop_assert!(t_lo <= t_hi);
    }
}

// ── PID ───────────────────────────────────────────────────────

proptest! {
    #[test]
    fn pid_output_stays_within_limits(
        measurements in proptest::collection::vec(-20.0f32..20.0, 1..60),
        dt in 0.0f32..5.0,
    ) {
        let cfg = DryerConfig::default();
        let mut pid = PidController::new(cfg.pid_kp, cfg.pid_ki, cfg.pid_kd, cfg.pid_setpoint);
        pid.set_limits(cfg.pid_output_min, cfg.pid_output_max);
        for m in measurements {
            let out = pid.compute(m, dt);
            prop_assert!(out >= cfg.pid_output_min && out <= cfg.pid_output_max, "out {}", out);
        }
    }
}

// ── Evaporation slot ──────────────────────────────────────────

fn any_shoe_state() -> impl Strategy<Value = ShoeState> {
    prop_oneof![
        Just(ShoeState::Idle),
        Just(ShoeState::Waiting),
        Just(ShoeState::Wet),
        Just(ShoeState::Cooling),
        Just(ShoeState::Dry),
        Just(ShoeState::Done),
    ]
}

proptest! {
    #[test]
    fn held_slot_is_never_granted(
        me in 0u8..2,
        mine in proptest::option::of(0.0f32..8.0),
        theirs in proptest::option::of(0.0f32..8.0),
        state in any_shoe_state(),
        cooling_motor in any::<bool>(),
    ) {
        let peer = PeerView { id: 1 - me, state, delta: theirs, cooling_motor };
        prop_assert!(!may_acquire(me, mine, Some(1 - me), &peer));
        prop_assert!(!may_acquire(me, mine, Some(me), &peer));
        if cooling_motor {
            prop_assert!(!may_acquire(me, mine, None, &peer));
        }
    }

    /// Two waiting shoes with a free slot: exactly one may take it.
    #[test]
    fn waiting_pair_has_exactly_one_winner(
        d0 in proptest::option::of(0.0f32..8.0),
        d1 in proptest::option::of(0.0f32..8.0),
    ) {
        let peer_of_0 = PeerView { id: 1, state: ShoeState::Waiting, delta: d1, cooling_motor: false };
        let peer_of_1 = PeerView { id: 0, state: ShoeState::Waiting, delta: d0, cooling_motor: false };
        let a = may_acquire(0, d0, None, &peer_of_0);
        let b = may_acquire(1, d1, None, &peer_of_1);
        prop_assert!(a != b);
    }
}

// ── Coordinator under random event streams ────────────────────

struct Panel;

impl IndicatorPort for Panel {
    fn set_status_led(&mut self, _on: bool) {}
    fn set_error_led(&mut self, _on: bool) {}
}

impl BatteryPort for Panel {
    fn read_voltage(&mut self) -> Option<f32> {
        Some(3.8)
    }
}

struct Discard;

#[derive(Default)]
struct Outputs {
    motor: [u8; 2],
    heater: [bool; 2],
    uv: u8,
}

impl ActuatorPort for Outputs {
    fn set_motor_duty(&mut self, shoe: usize, duty: u8) {
        self.motor[shoe] = duty;
    }
    fn set_heater(&mut self, shoe: usize, on: bool) {
        self.heater[shoe] = on;
    }
    fn set_uv_duty(&mut self, duty: u8) {
        self.uv = duty;
    }
    fn all_off(&mut self) {
        *self = Self::default();
    }
}

impl EventSink for Discard {
    fn emit(&mut self, _event: &AppEvent) {}
}

fn any_event() -> impl Strategy<Value = Event> {
    let shoe = 0u8..2;
    prop_oneof![
        Just(Event::StartPressed),
        Just(Event::ResetPressed),
        Just(Event::SensorTimeout),
        Just(Event::UvComplete),
        Just(Event::ProbeTimeout),
        shoe.clone().prop_map(Event::InitWet),
        shoe.clone().prop_map(Event::InitDry),
        shoe.clone().prop_map(Event::SubStart),
        shoe.clone().prop_map(Event::PeakConfirmed),
        shoe.clone().prop_map(Event::DryCheckPass),
        shoe.clone().prop_map(Event::DryCheckFail),
        shoe.clone().prop_map(Event::DrySignal),
        shoe.prop_map(Event::SafetyTimeout),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Whatever arrives, a shoe in Wet owns the slot, the two shoes are
    /// never in Wet together, and a heater only runs for a shoe in Wet.
    #[test]
    fn at_most_one_shoe_evaporates(
        steps in proptest::collection::vec((any_event(), 50u32..5_000), 1..120),
        d0 in 0.0f32..6.0,
        d1 in 0.0f32..6.0,
    ) {
        let mut snap = SensorSnapshot::default();
        for (i, d) in [d0, d1].into_iter().enumerate() {
            snap.shoes[i].delta_ah = Some(d);
            snap.shoes[i].delta_ema = Some(d);
            snap.shoes[i].is_wet = d > 1.0;
        }
        snap.probes[0].temp_c = Some(22.0);
        snap.probes[1].temp_c = Some(30.0);
        snap.probes[2].temp_c = Some(30.0);

        let cfg = DryerConfig::default();
        let mut coord = Coordinator::new(cfg.clone());
        let mut driver = ActuatorDriver::new(&cfg);
        let mut hw = Outputs::default();
        let mut bus = LocalBus::new();
        coord.start(0, &mut bus, &mut Discard);
        let mut now = 0u32;

        for (ev, gap) in steps {
            bus.post(ev);
            let end = now + gap;
            while now < end {
                now += 50;
                snap.seq = snap.seq.wrapping_add(1);
                coord.tick(now, &snap, &mut bus, &mut Panel, &mut Discard);

                let states = [coord.shoe_state(0), coord.shoe_state(1)];
                prop_assert!(states != [ShoeState::Wet, ShoeState::Wet]);
                for (i, s) in states.iter().enumerate() {
                    if *s == ShoeState::Wet {
                        prop_assert_eq!(coord.slot(), Some(i as u8));
                    }
                }

                // Outputs lag the machines by at most one actuator period.
                if now % 100 != 0 {
                    continue;
                }
                driver.tick(now, &snap, &mut bus, &mut hw);
                for (i, s) in states.iter().enumerate() {
                    prop_assert!(
                        !hw.heater[i] || *s == ShoeState::Wet,
                        "heater {} on in {:?}", i, s
                    );
                }
                prop_assert!(!(hw.heater[0] && hw.heater[1]));
            }
        }
    }
}
