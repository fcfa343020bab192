//! Global coordinator state handlers and table.
//!
//! Shoe machines only run while the appliance is in Running.  Every
//! shoe-addressed event is routed to its shoe from here; `UvComplete` goes
//! to both.

use log::{error, info, warn};

use crate::bus::{Command, Event};
use crate::config::SHOE_COUNT;
use crate::drivers::led_patterns::LedPattern;
use crate::error::Fault;

use super::global::{CoordCtx, GlobalState};
use super::shoe::ShoeState;
use super::{Reaction, StateDescriptor};

// ═══════════════════════════════════════════════════════════════════════════
//  Table
// ═══════════════════════════════════════════════════════════════════════════

pub static GLOBAL_TABLE: [StateDescriptor<GlobalState, CoordCtx>; GlobalState::COUNT] = [
    StateDescriptor {
        id: GlobalState::Idle,
        name: "Idle",
        on_enter: Some(idle_enter),
        on_exit: None,
        on_run: None,
        on_event: idle_event,
    },
    StateDescriptor {
        id: GlobalState::Detecting,
        name: "Detecting",
        on_enter: Some(detecting_enter),
        on_exit: None,
        on_run: Some(detecting_run),
        on_event: detecting_event,
    },
    StateDescriptor {
        id: GlobalState::Checking,
        name: "Checking",
        on_enter: Some(checking_enter),
        on_exit: None,
        on_run: None,
        on_event: checking_event,
    },
    StateDescriptor {
        id: GlobalState::Running,
        name: "Running",
        on_enter: Some(running_enter),
        on_exit: None,
        on_run: Some(running_run),
        on_event: running_event,
    },
    StateDescriptor {
        id: GlobalState::Done,
        name: "Done",
        on_enter: Some(done_enter),
        on_exit: None,
        on_run: Some(done_run),
        on_event: done_event,
    },
    StateDescriptor {
        id: GlobalState::LowBattery,
        name: "LowBattery",
        on_enter: Some(low_battery_enter),
        on_exit: None,
        on_run: Some(low_battery_run),
        on_event: low_battery_event,
    },
    StateDescriptor {
        id: GlobalState::Error,
        name: "Error",
        on_enter: Some(error_enter),
        on_exit: None,
        on_run: None,
        on_event: reset_only,
    },
    StateDescriptor {
        id: GlobalState::Debug,
        name: "Debug",
        on_enter: Some(debug_enter),
        on_exit: None,
        on_run: None,
        on_event: reset_only,
    },
];

// ── Shared transitions ────────────────────────────────────────────────────

/// Reset from anywhere; a probe timeout is fatal from the operating states.
fn common(ctx: &mut CoordCtx, ev: &Event) -> Reaction<GlobalState> {
    match *ev {
        Event::ResetPressed => Reaction::Goto(GlobalState::Idle),
        Event::ProbeTimeout => {
            ctx.raise(Fault::ProbeTimeout);
            Reaction::Goto(GlobalState::Error)
        }
        _ => Reaction::Ignored,
    }
}

fn reset_only(_ctx: &mut CoordCtx, ev: &Event) -> Reaction<GlobalState> {
    match *ev {
        Event::ResetPressed => Reaction::Goto(GlobalState::Idle),
        _ => Reaction::Ignored,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(ctx: &mut CoordCtx) {
    ctx.out.command(Command::AllOff);
    ctx.reset_run();
    ctx.faults = 0;
    ctx.status_led = LedPattern::Solid;
    ctx.error_led = LedPattern::Off;
    info!("IDLE: outputs off, waiting for Start");
}

fn idle_event(ctx: &mut CoordCtx, ev: &Event) -> Reaction<GlobalState> {
    match *ev {
        Event::StartPressed => Reaction::Goto(GlobalState::Detecting),
        Event::DebugRequested => Reaction::Goto(GlobalState::Debug),
        _ => common(ctx, ev),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  DETECTING: let the probes settle
// ═══════════════════════════════════════════════════════════════════════════

fn detecting_enter(ctx: &mut CoordCtx) {
    info!(
        "DETECT: settling probes for {}s",
        ctx.cfg.sensor_equalize_ms / 1000
    );
}

fn detecting_run(ctx: &mut CoordCtx) -> Option<GlobalState> {
    if ctx.elapsed() >= ctx.cfg.sensor_equalize_ms {
        ctx.post_once(Event::SensorTimeout);
    }
    None
}

fn detecting_event(ctx: &mut CoordCtx, ev: &Event) -> Reaction<GlobalState> {
    match *ev {
        Event::SensorTimeout => Reaction::Goto(GlobalState::Checking),
        _ => common(ctx, ev),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  CHECKING: battery gate
// ═══════════════════════════════════════════════════════════════════════════

fn checking_enter(ctx: &mut CoordCtx) {
    let low = ctx.battery_v.is_some_and(|v| v < ctx.cfg.battery_low_v);
    if low {
        warn!("CHECK: battery low ({:?} V)", ctx.battery_v);
        ctx.out.event(Event::BatteryLow);
    } else {
        info!("CHECK: battery ok ({:?} V), starting", ctx.battery_v);
        ctx.out.event(Event::StartPressed);
    }
}

fn checking_event(ctx: &mut CoordCtx, ev: &Event) -> Reaction<GlobalState> {
    match *ev {
        Event::StartPressed => Reaction::Goto(GlobalState::Running),
        Event::BatteryLow => Reaction::Goto(GlobalState::LowBattery),
        _ => common(ctx, ev),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  RUNNING: both shoe machines active
// ═══════════════════════════════════════════════════════════════════════════

fn running_enter(ctx: &mut CoordCtx) {
    ctx.status_led = LedPattern::Off;
    ctx.error_led = LedPattern::Blink {
        half_period_ms: ctx.cfg.blink_half_period_ms,
    };
    for i in 0..SHOE_COUNT {
        let sig = ctx.snap.shoes[i];
        let id = i as u8;
        let ev = if sig.is_wet {
            Event::InitWet(id)
        } else {
            Event::InitDry(id)
        };
        info!("RUN: shoe {i} {} (ΔAH {:?})", if sig.is_wet { "wet" } else { "dry" }, sig.delta_ah);
        ctx.out.event(ev);
    }
}

fn running_run(ctx: &mut CoordCtx) -> Option<GlobalState> {
    for i in 0..SHOE_COUNT {
        ctx.with_shoe(i, |s| s.run());
    }

    if !ctx.uv_started && !ctx.aborted && ctx.all_shoes(|s| s == ShoeState::Dry) {
        ctx.uv_started = true;
        let duration_ms = ctx.cfg.uv_duration_secs * 1000;
        info!("RUN: both shoes dry, UV for {}s", ctx.cfg.uv_duration_secs);
        ctx.out.command(Command::UvStart { duration_ms });
    }

    let all_done = ctx.sub_done == (1 << SHOE_COUNT) - 1;
    let aborted_out = ctx.aborted && ctx.all_shoes(|s| matches!(s, ShoeState::Done | ShoeState::Dry));
    if all_done || aborted_out {
        ctx.post_once(Event::AllSubsDone);
    }
    None
}

fn running_event(ctx: &mut CoordCtx, ev: &Event) -> Reaction<GlobalState> {
    match *ev {
        Event::AllSubsDone => Reaction::Goto(GlobalState::Done),
        Event::SubDone(i) if (i as usize) < SHOE_COUNT => {
            ctx.sub_done |= 1 << i;
            Reaction::Stay
        }
        Event::SafetyTimeout(i) if (i as usize) < SHOE_COUNT => {
            let i = i as usize;
            error!("RUN: shoe {i} motor safety timeout, ending its cycle");
            ctx.aborted = true;
            ctx.raise(Fault::SafetyTimeout);
            ctx.with_shoe(i, |s| {
                if !matches!(s.state(), ShoeState::Dry | ShoeState::Done) {
                    s.force(ShoeState::Done);
                }
            });
            Reaction::Stay
        }
        Event::UvComplete => {
            ctx.uv_complete = true;
            for i in 0..SHOE_COUNT {
                ctx.with_shoe(i, |s| s.handle(ev));
            }
            Reaction::Stay
        }
        _ => match ev.shoe() {
            Some(i) if (i as usize) < SHOE_COUNT => {
                ctx.with_shoe(i as usize, |s| s.handle(ev));
                Reaction::Stay
            }
            _ => common(ctx, ev),
        },
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  DONE
// ═══════════════════════════════════════════════════════════════════════════

fn done_enter(ctx: &mut CoordCtx) {
    ctx.out.command(Command::UvStop);
    ctx.status_led = LedPattern::Blink {
        half_period_ms: ctx.cfg.blink_half_period_ms,
    };
    ctx.error_led = LedPattern::Off;
    info!(
        "DONE: cycle finished{}, idle in {}s",
        if ctx.aborted { " (safety stop)" } else { "" },
        ctx.cfg.done_timeout_ms / 1000
    );
}

fn done_run(ctx: &mut CoordCtx) -> Option<GlobalState> {
    if ctx.elapsed() >= ctx.cfg.done_timeout_ms {
        ctx.post_once(Event::DoneTimeout);
    }
    None
}

fn done_event(ctx: &mut CoordCtx, ev: &Event) -> Reaction<GlobalState> {
    match *ev {
        Event::DoneTimeout => Reaction::Goto(GlobalState::Idle),
        _ => common(ctx, ev),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  LOW BATTERY: hysteresis wait
// ═══════════════════════════════════════════════════════════════════════════

fn low_battery_enter(ctx: &mut CoordCtx) {
    ctx.raise(Fault::LowBattery);
    ctx.status_led = LedPattern::Off;
    ctx.error_led = LedPattern::Solid;
    warn!(
        "LOWBAT: waiting for {:.1} V (now {:?} V)",
        ctx.cfg.battery_recovery_v, ctx.battery_v
    );
}

fn low_battery_run(ctx: &mut CoordCtx) -> Option<GlobalState> {
    if ctx.battery_v.is_some_and(|v| v >= ctx.cfg.battery_recovery_v) {
        ctx.post_once(Event::BatteryRecovered);
    }
    None
}

fn low_battery_event(_ctx: &mut CoordCtx, ev: &Event) -> Reaction<GlobalState> {
    match *ev {
        Event::BatteryRecovered | Event::ResetPressed => Reaction::Goto(GlobalState::Idle),
        _ => Reaction::Ignored,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  ERROR / DEBUG
// ═══════════════════════════════════════════════════════════════════════════

fn error_enter(ctx: &mut CoordCtx) {
    ctx.out.command(Command::AllOff);
    ctx.status_led = LedPattern::Off;
    ctx.error_led = LedPattern::Solid;
    error!("ERROR: faults 0x{:02x}, press Reset", ctx.faults);
}

fn debug_enter(ctx: &mut CoordCtx) {
    ctx.out.command(Command::AllOff);
    ctx.status_led = LedPattern::Solid;
    ctx.error_led = LedPattern::Solid;
    info!("DEBUG: bench mode, outputs off");
}

#[cfg(test)]
mod tests {
    use super::super::Fsm;
    use super::*;
    use crate::config::DryerConfig;

    fn machine() -> (Fsm<GlobalState, CoordCtx>, CoordCtx) {
        let mut ctx = CoordCtx::new(DryerConfig::default());
        ctx.battery_v = Some(3.7);
        let mut fsm = Fsm::new("FSM", &GLOBAL_TABLE, GlobalState::Idle);
        fsm.start(&mut ctx);
        ctx.out.clear();
        (fsm, ctx)
    }

    #[test]
    fn idle_entry_kills_outputs() {
        let mut ctx = CoordCtx::new(DryerConfig::default());
        let mut fsm = Fsm::new("FSM", &GLOBAL_TABLE, GlobalState::Idle);
        fsm.start(&mut ctx);
        assert_eq!(ctx.out.commands().first(), Some(&Command::AllOff));
        assert_eq!(ctx.status_led, LedPattern::Solid);
        assert!(ctx.shoes.iter().all(|s| s.state() == ShoeState::Idle));
    }

    #[test]
    fn detecting_posts_sensor_timeout_once() {
        let (mut fsm, mut ctx) = machine();
        fsm.handle(&mut ctx, &Event::StartPressed);
        assert_eq!(fsm.current(), GlobalState::Detecting);
        ctx.now_ms = 5_999;
        fsm.run(&mut ctx);
        assert!(ctx.out.events().is_empty());
        ctx.now_ms = 6_000;
        fsm.run(&mut ctx);
        ctx.now_ms = 6_050;
        fsm.run(&mut ctx);
        assert_eq!(ctx.out.events(), &[Event::SensorTimeout]);
    }

    #[test]
    fn checking_routes_on_battery() {
        let (mut fsm, mut ctx) = machine();
        fsm.handle(&mut ctx, &Event::StartPressed);
        fsm.handle(&mut ctx, &Event::SensorTimeout);
        assert_eq!(ctx.out.events(), &[Event::StartPressed]);

        let (mut fsm, mut ctx) = machine();
        ctx.battery_v = Some(2.9);
        fsm.handle(&mut ctx, &Event::StartPressed);
        fsm.handle(&mut ctx, &Event::SensorTimeout);
        assert_eq!(ctx.out.events(), &[Event::BatteryLow]);
        fsm.handle(&mut ctx, &Event::BatteryLow);
        assert_eq!(fsm.current(), GlobalState::LowBattery);
        assert!(ctx.has_fault(Fault::LowBattery));
    }

    #[test]
    fn low_battery_needs_recovery_voltage() {
        let (mut fsm, mut ctx) = machine();
        fsm.force(GlobalState::LowBattery, &mut ctx);
        ctx.out.clear();
        ctx.battery_v = Some(3.1);
        fsm.run(&mut ctx);
        assert!(ctx.out.events().is_empty());
        ctx.battery_v = Some(3.2);
        fsm.run(&mut ctx);
        assert_eq!(ctx.out.events(), &[Event::BatteryRecovered]);
        fsm.handle(&mut ctx, &Event::BatteryRecovered);
        assert_eq!(fsm.current(), GlobalState::Idle);
        assert_eq!(ctx.faults, 0);
    }

    #[test]
    fn running_entry_posts_init_events() {
        let (mut fsm, mut ctx) = machine();
        ctx.snap.shoes[0].is_wet = true;
        fsm.force(GlobalState::Running, &mut ctx);
        assert_eq!(ctx.out.events(), &[Event::InitWet(0), Event::InitDry(1)]);
        assert_eq!(ctx.error_led, LedPattern::Blink { half_period_ms: 500 });
    }

    #[test]
    fn uv_starts_once_when_both_dry() {
        let (mut fsm, mut ctx) = machine();
        fsm.force(GlobalState::Running, &mut ctx);
        fsm.handle(&mut ctx, &Event::InitDry(0));
        fsm.handle(&mut ctx, &Event::InitDry(1));
        ctx.out.clear();
        fsm.run(&mut ctx);
        fsm.run(&mut ctx);
        let uv = ctx
            .out
            .commands()
            .iter()
            .filter(|c| matches!(c, Command::UvStart { .. }))
            .count();
        assert_eq!(uv, 1);
    }

    #[test]
    fn safety_timeout_forces_shoe_done() {
        let (mut fsm, mut ctx) = machine();
        fsm.force(GlobalState::Running, &mut ctx);
        fsm.handle(&mut ctx, &Event::InitWet(0));
        fsm.handle(&mut ctx, &Event::InitDry(1));
        fsm.handle(&mut ctx, &Event::SafetyTimeout(0));
        assert_eq!(ctx.shoe_state(0), ShoeState::Done);
        assert!(ctx.has_fault(Fault::SafetyTimeout));
        ctx.out.clear();
        fsm.run(&mut ctx);
        assert!(ctx.out.events().contains(&Event::AllSubsDone));
        assert!(!ctx.out.commands().iter().any(|c| matches!(c, Command::UvStart { .. })));
    }

    #[test]
    fn probe_timeout_is_fatal_until_reset() {
        let (mut fsm, mut ctx) = machine();
        fsm.force(GlobalState::Running, &mut ctx);
        fsm.handle(&mut ctx, &Event::ProbeTimeout);
        assert_eq!(fsm.current(), GlobalState::Error);
        assert!(ctx.out.commands().contains(&Command::AllOff));
        fsm.handle(&mut ctx, &Event::StartPressed);
        assert_eq!(fsm.current(), GlobalState::Error);
        fsm.handle(&mut ctx, &Event::ResetPressed);
        assert_eq!(fsm.current(), GlobalState::Idle);
    }

    #[test]
    fn debug_only_from_idle() {
        let (mut fsm, mut ctx) = machine();
        fsm.handle(&mut ctx, &Event::DebugRequested);
        assert_eq!(fsm.current(), GlobalState::Debug);
        assert_eq!(ctx.error_led, LedPattern::Solid);
        fsm.handle(&mut ctx, &Event::ResetPressed);
        fsm.handle(&mut ctx, &Event::StartPressed);
        fsm.handle(&mut ctx, &Event::DebugRequested);
        assert_eq!(fsm.current(), GlobalState::Detecting);
    }
}
