//! ISR-debounced Start/Reset buttons.
//!
//! ## Hardware
//!
//! Active-low momentary switches with external pull-ups on input-only
//! pins. Each GPIO fires on the falling edge; the ISR records the raw
//! timestamp into that button's atomic, and `tick()` (called from the
//! coordinator loop) turns fresh edges into presses.
//!
//! ```text
//!  ISR edge ──► [ ISR_MS[b] ] ──tick()──► settle 50 ms ──► still low? ──► Press
//!                                                          └── lockout 300 ms
//! ```
//!
//! Edges arriving inside the lockout after an accepted press are swallowed,
//! so contact bounce and a held button produce exactly one press.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::bus::Event;

/// Edge must still read LOW this long after the ISR to count.
const SETTLE_MS: u32 = 50;

/// Raw ISR timestamps (milliseconds since boot, truncated to u32).
static START_ISR_MS: AtomicU32 = AtomicU32::new(0);
static RESET_ISR_MS: AtomicU32 = AtomicU32::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Start,
    Reset,
}

impl Button {
    fn isr_slot(self) -> &'static AtomicU32 {
        match self {
            Self::Start => &START_ISR_MS,
            Self::Reset => &RESET_ISR_MS,
        }
    }

    pub fn gpio(self) -> i32 {
        match self {
            Self::Start => crate::pins::START_BUTTON_GPIO,
            Self::Reset => crate::pins::RESET_BUTTON_GPIO,
        }
    }

    /// The event a debounced press of this button posts.
    pub fn event(self) -> Event {
        match self {
            Self::Start => Event::StartPressed,
            Self::Reset => Event::ResetPressed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Settling { edge_ms: u32 },
}

pub struct ButtonDriver {
    button: Button,
    source: &'static AtomicU32,
    debounce_ms: u32,
    phase: Phase,
    last_isr_ms: u32,
    last_press_ms: Option<u32>,
}

impl ButtonDriver {
    pub fn new(button: Button, debounce_ms: u32) -> Self {
        Self::with_source(button, button.isr_slot(), debounce_ms)
    }

    /// Read edges from `source` instead of the button's ISR slot.
    pub fn with_source(button: Button, source: &'static AtomicU32, debounce_ms: u32) -> Self {
        Self {
            button,
            source,
            debounce_ms,
            phase: Phase::Idle,
            last_isr_ms: source.load(Ordering::Acquire),
            last_press_ms: None,
        }
    }

    pub fn button(&self) -> Button {
        self.button
    }

    /// Returns the button's event once per debounced press.
    pub fn tick(&mut self, now_ms: u32) -> Option<Event> {
        let isr_ms = self.source.load(Ordering::Acquire);
        if isr_ms != self.last_isr_ms {
            self.last_isr_ms = isr_ms;
            let locked = self
                .last_press_ms
                .is_some_and(|t| isr_ms.wrapping_sub(t) < self.debounce_ms);
            if !locked && self.phase == Phase::Idle {
                self.phase = Phase::Settling { edge_ms: isr_ms };
            }
        }

        let Phase::Settling { edge_ms } = self.phase else {
            return None;
        };
        if now_ms.wrapping_sub(edge_ms) < SETTLE_MS {
            return None;
        }
        self.phase = Phase::Idle;
        if !self.is_pressed_hw() {
            // Glitch: released before it settled.
            return None;
        }
        self.last_press_ms = Some(edge_ms);
        Some(self.button.event())
    }

    #[cfg(target_os = "espidf")]
    fn is_pressed_hw(&self) -> bool {
        !crate::drivers::hw_init::gpio_read(self.button.gpio())
    }

    #[cfg(not(target_os = "espidf"))]
    fn is_pressed_hw(&self) -> bool {
        true
    }
}

/// ISR handler, registered on each button's falling edge.
/// Safe to call from interrupt context (lock-free atomic store).
#[allow(unused)]
pub fn button_isr_handler(button: Button, now_ms: u32) {
    // 0 means "never pressed".
    button.isr_slot().store(now_ms.max(1), Ordering::Release);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_events_without_press() {
        static SRC: AtomicU32 = AtomicU32::new(0);
        let mut btn = ButtonDriver::with_source(Button::Start, &SRC, 300);
        assert_eq!(btn.tick(100), None);
        assert_eq!(btn.tick(200), None);
    }

    #[test]
    fn press_reported_after_settle() {
        static SRC: AtomicU32 = AtomicU32::new(0);
        let mut btn = ButtonDriver::with_source(Button::Start, &SRC, 300);
        SRC.store(1000, Ordering::Release);
        assert_eq!(btn.tick(1010), None);
        assert_eq!(btn.tick(1060), Some(Event::StartPressed));
        assert_eq!(btn.tick(1100), None);
    }

    #[test]
    fn bounce_inside_lockout_is_swallowed() {
        static SRC: AtomicU32 = AtomicU32::new(0);
        let mut btn = ButtonDriver::with_source(Button::Reset, &SRC, 300);
        SRC.store(1000, Ordering::Release);
        assert_eq!(btn.tick(1050), Some(Event::ResetPressed));
        SRC.store(1200, Ordering::Release);
        assert_eq!(btn.tick(1260), None);
        SRC.store(1400, Ordering::Release);
        assert_eq!(btn.tick(1400), None);
        assert_eq!(btn.tick(1450), Some(Event::ResetPressed));
    }

    #[test]
    fn stale_edge_at_boot_is_ignored() {
        static SRC: AtomicU32 = AtomicU32::new(500);
        let mut btn = ButtonDriver::with_source(Button::Start, &SRC, 300);
        assert_eq!(btn.tick(2000), None);
    }
}
