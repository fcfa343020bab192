//! Per-shoe state handlers and table.
//!
//! Wet is the long one.  Its timeline for a normal (first) pass:
//!
//! ```text
//!  entry      prewarm        warmup (30 s, 50 s cold)      active
//!    │ heater on │ MotorStart @60 % │ PidEnable ──────────────────────────▶
//!    │           │                  │ trend-gated heater, PID airflow
//!    │           │                  │ MA-decline ∥ rise-from-min ─▶ peak
//!    │           │                  │ post-peak buffer (+30 s if hot)
//!    │           │                  │ elapsed ≥ tier minimum ─▶ PeakConfirmed
//! ```
//!
//! A pass entered after a failed dry check is the re-evaporation burst:
//! fixed 85 % duty, heater unless already at threshold, exit on the
//! re-evap cap or a rise above the burst's ΔAH minimum.

use log::{info, warn};

use crate::bus::{Command, Event};
use crate::control::cooling::{self, DryVerdict};
use crate::control::peak::PeakGate;
use crate::control::trend::HeaterDecision;

use super::shoe::{CoolingPhase, ShoeCtx, ShoeState, may_acquire};
use super::{Reaction, StateDescriptor};

// ═══════════════════════════════════════════════════════════════════════════
//  Table
// ═══════════════════════════════════════════════════════════════════════════

pub static SHOE_TABLE: [StateDescriptor<ShoeState, ShoeCtx>; ShoeState::COUNT] = [
    StateDescriptor {
        id: ShoeState::Idle,
        name: "Idle",
        on_enter: Some(idle_enter),
        on_exit: None,
        on_run: None,
        on_event: idle_event,
    },
    StateDescriptor {
        id: ShoeState::Waiting,
        name: "Waiting",
        on_enter: Some(waiting_enter),
        on_exit: None,
        on_run: Some(waiting_run),
        on_event: waiting_event,
    },
    StateDescriptor {
        id: ShoeState::Wet,
        name: "Wet",
        on_enter: Some(wet_enter),
        on_exit: Some(wet_exit),
        on_run: Some(wet_run),
        on_event: wet_event,
    },
    StateDescriptor {
        id: ShoeState::Cooling,
        name: "Cooling",
        on_enter: Some(cooling_enter),
        on_exit: None,
        on_run: Some(cooling_run),
        on_event: cooling_event,
    },
    StateDescriptor {
        id: ShoeState::Dry,
        name: "Dry",
        on_enter: Some(dry_enter),
        on_exit: None,
        on_run: None,
        on_event: dry_event,
    },
    StateDescriptor {
        id: ShoeState::Done,
        name: "Done",
        on_enter: Some(done_enter),
        on_exit: None,
        on_run: None,
        on_event: done_event,
    },
];

// ── Helpers ───────────────────────────────────────────────────────────────

fn heater(ctx: &mut ShoeCtx, on: bool) {
    if ctx.data.heater_on != on {
        ctx.data.heater_on = on;
        ctx.out.command(Command::HeaterSet(ctx.id, on));
    }
}

fn apply_trend(ctx: &mut ShoeCtx) {
    match ctx.data.trend.update(ctx.temp()) {
        HeaterDecision::On => heater(ctx, true),
        HeaterDecision::Off => heater(ctx, false),
        HeaterDecision::Hold => {}
    }
}

fn post_once(ctx: &mut ShoeCtx, ev: Event) {
    if !ctx.data.exit_posted {
        ctx.data.exit_posted = true;
        ctx.out.event(ev);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(ctx: &mut ShoeCtx) {
    ctx.reset();
}

fn idle_event(ctx: &mut ShoeCtx, ev: &Event) -> Reaction<ShoeState> {
    match *ev {
        Event::InitWet(i) if i == ctx.id => Reaction::Goto(ShoeState::Waiting),
        Event::InitDry(i) if i == ctx.id => Reaction::Goto(ShoeState::Dry),
        _ => Reaction::Ignored,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  WAITING: queued for the evaporation slot, no hardware
// ═══════════════════════════════════════════════════════════════════════════

fn waiting_enter(ctx: &mut ShoeCtx) {
    ctx.data.start_posted_ms = None;
    info!(
        "WAIT[{}]: queued for slot{} (ΔAH {:?})",
        ctx.id,
        if ctx.data.re_evap { ", re-evap" } else { "" },
        ctx.delta()
    );
}

fn waiting_run(ctx: &mut ShoeCtx) -> Option<ShoeState> {
    if ctx.holds_slot() {
        // SubStart lost to a full queue: ask again.
        let stale = ctx
            .data
            .start_posted_ms
            .is_none_or(|t| ctx.now_ms.wrapping_sub(t) >= ctx.cfg.debounce_ms);
        if stale {
            ctx.data.start_posted_ms = Some(ctx.now_ms);
            ctx.out.event(Event::SubStart(ctx.id));
        }
        return None;
    }
    if may_acquire(ctx.id, ctx.delta(), ctx.slot, &ctx.peer) {
        ctx.slot = Some(ctx.id);
        ctx.data.start_posted_ms = Some(ctx.now_ms);
        info!("WAIT[{}]: evaporation slot acquired", ctx.id);
        ctx.out.event(Event::SubStart(ctx.id));
    }
    None
}

fn waiting_event(ctx: &mut ShoeCtx, ev: &Event) -> Reaction<ShoeState> {
    match *ev {
        Event::SubStart(i) if i == ctx.id && ctx.holds_slot() => Reaction::Goto(ShoeState::Wet),
        _ => Reaction::Ignored,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  WET: evaporation
// ═══════════════════════════════════════════════════════════════════════════

fn wet_enter(ctx: &mut ShoeCtx) {
    let id = ctx.id;
    let d = &mut ctx.data;
    d.exit_posted = false;
    d.peak_at_ms = None;
    d.retiered = false;
    d.hot_extended = false;
    d.collapse_logged = false;
    d.warmup_done = false;
    d.motor_started_ms = None;
    d.last_seq = None;
    d.ma.reset();
    d.rise.reset();
    d.trend.reset();

    if d.re_evap {
        d.re_evap = false;
        d.re_evap_active = true;
        d.warmup_done = true;
        d.motor_started_ms = Some(ctx.now_ms);
        let duty = ctx.cfg.re_evap_duty_pct;
        ctx.out.command(Command::MotorStart(id));
        ctx.out.command(Command::SetMotorDuty(id, duty));
        // MotorStart switches the heater on in the driver.
        ctx.data.heater_on = true;
        let hot = ctx.data.trend.at_threshold(ctx.temp());
        heater(ctx, !hot);
        info!(
            "WET[{id}]: re-evaporation burst, {}% for up to {}s (retry {})",
            duty,
            ctx.cfg.re_evap_max_ms / 1000,
            ctx.data.retries + 1
        );
        return;
    }

    let delta = ctx.delta();
    let tier = ctx.cfg.classify(delta);
    let temp = ctx.temp();
    let prewarm = ctx.cfg.heater_prewarm_for(temp);
    let cold = temp.is_some_and(|t| t < ctx.cfg.cold_shoe_temp_c);
    let d = &mut ctx.data;
    d.initial_delta = delta;
    d.tier = tier;
    d.prewarm_ms = prewarm;
    d.warmup_ms = if cold {
        ctx.cfg.wet_warmup_cold_ms
    } else {
        ctx.cfg.wet_warmup_ms
    };
    heater(ctx, true);
    info!(
        "WET[{id}]: tier {} (ΔAH {:?}), prewarm {}s",
        tier.name(),
        delta,
        prewarm / 1000
    );
}

fn wet_exit(ctx: &mut ShoeCtx) {
    ctx.data.heater_on = false;
    ctx.out.command(Command::HeaterSet(ctx.id, false));
    ctx.data.trend.reset();
    ctx.data.warmup_done = false;
}

fn wet_run(ctx: &mut ShoeCtx) -> Option<ShoeState> {
    let fresh = ctx.fresh_sample();
    if ctx.data.re_evap_active {
        re_evap_run(ctx, fresh);
        return None;
    }

    let id = ctx.id;
    let elapsed = ctx.elapsed();

    // ── Prewarm: heater only ─────────────────────────────
    let Some(motor_at) = ctx.data.motor_started_ms else {
        if elapsed >= ctx.data.prewarm_ms {
            ctx.data.motor_started_ms = Some(ctx.now_ms);
            ctx.out.command(Command::MotorStart(id));
            ctx.out
                .command(Command::SetMotorDuty(id, ctx.cfg.wet_warmup_duty_pct));
            info!("WET[{id}]: motor start, warmup {}s", ctx.data.warmup_ms / 1000);
        }
        return None;
    };

    if fresh {
        let tier = *ctx.cfg.tier(ctx.data.tier);
        let armed = elapsed >= tier.rise_window_secs * 1000;
        let risen = ctx.data.rise.update(ctx.delta(), tier.rise_threshold, armed);
        if risen && ctx.data.warmup_done && ctx.data.peak_at_ms.is_none() {
            declare_peak(ctx, elapsed, "rise-from-minimum");
        }
    }

    // ── Warmup: fixed duty, heater on ────────────────────
    if !ctx.data.warmup_done {
        let hot = ctx.data.trend.at_threshold(ctx.temp());
        if ctx.now_ms.wrapping_sub(motor_at) >= ctx.data.warmup_ms || hot {
            ctx.data.warmup_done = true;
            ctx.out.command(Command::PidEnable(id));
            info!(
                "WET[{id}]: warmup done after {}s{}",
                ctx.now_ms.wrapping_sub(motor_at) / 1000,
                if hot { " (at temperature)" } else { "" }
            );
        } else {
            return None;
        }
    }

    // ── Active ───────────────────────────────────────────
    if fresh {
        apply_trend(ctx);
    }

    let tier = *ctx.cfg.tier(ctx.data.tier);
    match ctx.data.peak_at_ms {
        None => {
            let gate = PeakGate {
                valid_after_ms: tier.peak_valid_secs * 1000,
                rate_threshold: tier.peak_rate_threshold,
            };
            let rate = ctx.rate();
            if ctx.data.ma.update(elapsed, rate, gate) {
                declare_peak(ctx, elapsed, "moving-average decline");
            }
        }
        Some(peak_at) => post_peak(ctx, elapsed, peak_at),
    }
    None
}

fn declare_peak(ctx: &mut ShoeCtx, elapsed: u32, by: &str) {
    let tier = ctx.cfg.tier(ctx.data.tier);
    ctx.data.peak_at_ms = Some(elapsed);
    ctx.data.buffer_ms = tier.post_peak_buffer_secs * 1000;
    info!(
        "WET[{}]: peak ({by}) at {}s, buffer {}s",
        ctx.id,
        elapsed / 1000,
        tier.post_peak_buffer_secs
    );
}

fn post_peak(ctx: &mut ShoeCtx, elapsed: u32, peak_at: u32) {
    let id = ctx.id;
    let delta = ctx.delta();

    if !ctx.data.retiered {
        let wetter = match (delta, ctx.data.initial_delta) {
            (Some(d), Some(init)) => d > init + ctx.cfg.wetter_margin,
            _ => false,
        };
        if wetter {
            let tier = ctx.cfg.classify(delta);
            if tier.index() > ctx.data.tier.index() {
                ctx.data.tier = tier;
                ctx.data.buffer_ms = ctx.cfg.tier(tier).post_peak_buffer_secs * 1000;
                info!(
                    "WET[{id}]: shoe got wetter, re-tiered {}, buffer {}s",
                    tier.name(),
                    ctx.data.buffer_ms / 1000
                );
            }
            ctx.data.retiered = true;
        }
    }

    if elapsed.wrapping_sub(peak_at) < ctx.data.buffer_ms {
        return;
    }

    let hot = ctx.temp().is_some_and(|t| t > ctx.cfg.hot_temp_c);
    if hot && !ctx.data.hot_extended {
        ctx.data.hot_extended = true;
        ctx.data.buffer_ms += ctx.cfg.hot_extension_ms;
        info!("WET[{id}]: still hot, buffer +{}s", ctx.cfg.hot_extension_ms / 1000);
        return;
    }

    if delta.is_none_or(|d| d < ctx.cfg.delta_collapse_margin) {
        if !ctx.data.collapse_logged {
            ctx.data.collapse_logged = true;
            warn!("WET[{id}]: ΔAH implausible ({delta:?}), holding Wet");
        }
        return;
    }

    let min_wet = ctx.cfg.tier(ctx.data.tier).min_wet_secs * 1000;
    if elapsed >= min_wet {
        info!("WET[{id}]: peak confirmed after {}s", elapsed / 1000);
        post_once(ctx, Event::PeakConfirmed(id));
    }
}

fn re_evap_run(ctx: &mut ShoeCtx, fresh: bool) {
    let id = ctx.id;
    if fresh {
        apply_trend(ctx);
        let threshold = ctx.cfg.tier(ctx.data.tier).rise_threshold;
        if ctx.data.rise.update(ctx.delta(), threshold, true) {
            info!("WET[{id}]: re-evap ended on ΔAH rise");
            post_once(ctx, Event::PeakConfirmed(id));
            return;
        }
    }
    if ctx.elapsed() >= ctx.cfg.re_evap_max_ms {
        info!("WET[{id}]: re-evap cap reached");
        post_once(ctx, Event::PeakConfirmed(id));
    }
}

fn wet_event(ctx: &mut ShoeCtx, ev: &Event) -> Reaction<ShoeState> {
    match *ev {
        Event::PeakConfirmed(i) if i == ctx.id => Reaction::Goto(ShoeState::Cooling),
        Event::DrySignal(i) if i == ctx.id => {
            let elapsed = ctx.elapsed();
            let valid = ctx.cfg.tier(ctx.data.tier).peak_valid_secs * 1000;
            if !ctx.data.re_evap_active && ctx.data.peak_at_ms.is_none() && elapsed >= valid {
                declare_peak(ctx, elapsed, "below dry threshold");
            }
            Reaction::Stay
        }
        Event::SubStart(i) if i == ctx.id => Reaction::Stay,
        _ => Reaction::Ignored,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  COOLING
// ═══════════════════════════════════════════════════════════════════════════

fn cooling_enter(ctx: &mut ShoeCtx) {
    ctx.release_slot();
    if ctx.data.re_evap_active {
        ctx.data.re_evap_active = false;
        ctx.data.retries = ctx.data.retries.saturating_add(1);
    }

    let (temp, ambient, delta) = (ctx.temp(), ctx.ambient(), ctx.delta());
    let retries = ctx.data.retries;
    let duty = cooling::cooling_duty(&ctx.cfg, temp, ambient, retries);
    let duration = cooling::cooling_duration_ms(&ctx.cfg, delta, retries);

    let d = &mut ctx.data;
    d.cooling_target = cooling::cooling_target(&ctx.cfg, ambient);
    d.cooling_duty = duty;
    d.cooling_duration_ms = duration;
    d.cooling_phase = CoolingPhase::Motor;
    d.exit_posted = false;
    d.last_seq = None;
    d.stabilizer.reset();

    ctx.out.command(Command::CoolingStart(ctx.id, duty));
    info!(
        "COOL[{}]: {}% for {}s, target {:?}C (retry {})",
        ctx.id,
        duty,
        duration / 1000,
        ctx.data.cooling_target,
        retries
    );
}

fn cooling_run(ctx: &mut ShoeCtx) -> Option<ShoeState> {
    let id = ctx.id;
    let fresh = ctx.fresh_sample();
    let elapsed = ctx.elapsed();

    match ctx.data.cooling_phase {
        CoolingPhase::Motor | CoolingPhase::Extension => {
            if fresh {
                let duty = cooling::cooling_duty(&ctx.cfg, ctx.temp(), ctx.ambient(), ctx.data.retries);
                if duty != ctx.data.cooling_duty {
                    ctx.data.cooling_duty = duty;
                    ctx.out.command(Command::SetMotorDuty(id, duty));
                }
            }
            let warm = cooling::above_target(ctx.temp(), ctx.data.cooling_target);
            if ctx.data.cooling_phase == CoolingPhase::Motor {
                if elapsed < ctx.data.cooling_duration_ms {
                    return None;
                }
                if warm {
                    ctx.data.cooling_phase = CoolingPhase::Extension;
                    ctx.data.extension_start_ms = ctx.now_ms;
                    info!("COOL[{id}]: above target, extending motor phase");
                    return None;
                }
            } else {
                let extended = ctx.now_ms.wrapping_sub(ctx.data.extension_start_ms);
                if warm && extended < ctx.cfg.cooling_extension_cap_ms {
                    return None;
                }
            }
            ctx.out.command(Command::MotorStop(id));
            ctx.data.cooling_phase = CoolingPhase::Stabilizing;
            ctx.data.stabilize_start_ms = ctx.now_ms;
            info!("COOL[{id}]: motor off after {}s, stabilizing", elapsed / 1000);
        }
        CoolingPhase::Stabilizing => {
            let since = ctx.now_ms.wrapping_sub(ctx.data.stabilize_start_ms);
            ctx.data.stabilizer.update(since, ctx.delta());
            if since < ctx.cfg.stabilization_ms {
                return None;
            }
            let verdict = ctx
                .data
                .stabilizer
                .verdict(&ctx.cfg, ctx.temp(), ctx.data.cooling_target);
            let median = ctx.data.stabilizer.median_recent();
            match verdict {
                DryVerdict::Dry => {
                    info!("COOL[{id}]: dry check pass, median ΔAH {median:?}");
                    ctx.data.cooling_phase = CoolingPhase::Verdict;
                    post_once(ctx, Event::DryCheckPass(id));
                }
                DryVerdict::Wet => {
                    info!("COOL[{id}]: dry check fail, median ΔAH {median:?}");
                    ctx.data.cooling_phase = CoolingPhase::Verdict;
                    post_once(ctx, Event::DryCheckFail(id));
                }
                DryVerdict::TooWarm => {
                    if since >= ctx.cfg.stabilization_ms + ctx.cfg.cooling_extension_cap_ms {
                        warn!("COOL[{id}]: temperature guard timed out, accepting dry");
                        ctx.data.cooling_phase = CoolingPhase::Verdict;
                        post_once(ctx, Event::DryCheckPass(id));
                    }
                }
            }
        }
        CoolingPhase::Verdict => {}
    }
    None
}

fn cooling_event(ctx: &mut ShoeCtx, ev: &Event) -> Reaction<ShoeState> {
    match *ev {
        Event::DryCheckPass(i) if i == ctx.id => Reaction::Goto(ShoeState::Dry),
        Event::DryCheckFail(i) if i == ctx.id => {
            ctx.data.re_evap = true;
            Reaction::Goto(ShoeState::Waiting)
        }
        _ => Reaction::Ignored,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  DRY: waiting for the shared UV cycle
// ═══════════════════════════════════════════════════════════════════════════

fn dry_enter(ctx: &mut ShoeCtx) {
    ctx.release_slot();
    ctx.data.heater_on = false;
    ctx.out.command(Command::MotorStop(ctx.id));
    info!("DRY[{}]: dry, waiting for UV", ctx.id);
}

fn dry_event(_ctx: &mut ShoeCtx, ev: &Event) -> Reaction<ShoeState> {
    match *ev {
        Event::UvComplete => Reaction::Goto(ShoeState::Done),
        _ => Reaction::Ignored,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  DONE
// ═══════════════════════════════════════════════════════════════════════════

fn done_enter(ctx: &mut ShoeCtx) {
    ctx.release_slot();
    ctx.out.event(Event::SubDone(ctx.id));
    info!("DONE[{}]: cycle complete", ctx.id);
}

fn done_event(_ctx: &mut ShoeCtx, _ev: &Event) -> Reaction<ShoeState> {
    Reaction::Ignored
}
