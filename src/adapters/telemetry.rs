//! CSV telemetry stream for bench tuning (feature `telemetry-csv`).
//!
//! Wraps another [`EventSink`]: every event is forwarded to it, and
//! telemetry frames are additionally rendered as one CSV line on the log.
//! Missing readings are left as empty fields.

use core::fmt::Write;

use log::info;

use crate::app::events::{AppEvent, TelemetryFrame};
use crate::app::ports::EventSink;

pub const CSV_HEADER: &str = "time_ms,ah0,ah1,ah2,\
s0_temp,s0_diff,s0_wet,s0_state,s0_rate,s0_pid,s0_duty,\
s1_temp,s1_diff,s1_wet,s1_state,s1_rate,s1_pid,s1_duty";

pub struct CsvTelemetry<S> {
    inner: S,
    header_sent: bool,
}

impl<S: EventSink> CsvTelemetry<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            header_sent: false,
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: EventSink> EventSink for CsvTelemetry<S> {
    fn emit(&mut self, event: &AppEvent) {
        if let AppEvent::Telemetry(frame) = event {
            if !self.header_sent {
                info!("{CSV_HEADER}");
                self.header_sent = true;
            }
            info!("{}", csv_line(frame));
        }
        self.inner.emit(event);
    }
}

fn opt(out: &mut String, v: Option<f32>, decimals: usize) {
    if let Some(x) = v {
        let _ = write!(out, "{x:.decimals$}");
    }
}

/// Render one frame in [`CSV_HEADER`] column order.
pub fn csv_line(t: &TelemetryFrame) -> String {
    let mut out = String::with_capacity(160);
    let _ = write!(out, "{}", t.time_ms);
    for ah in t.ah {
        out.push(',');
        opt(&mut out, ah, 2);
    }
    for s in &t.shoes {
        out.push(',');
        opt(&mut out, s.temp_c, 1);
        out.push(',');
        opt(&mut out, s.delta_ah, 2);
        let _ = write!(
            out,
            ",{},{},{:.3},{:.2},{}",
            u8::from(s.is_wet),
            s.state.abbrev(),
            s.rate,
            s.pid_output,
            s.motor_duty
        );
    }
    out
}
