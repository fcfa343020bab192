//! Drying-control algorithms.
//!
//! Pure, clock-free building blocks used by the per-shoe state machine and
//! the actuator driver.  Every type here takes elapsed times and readings as
//! arguments so the same code runs on target and in host tests.

pub mod cooling;
pub mod peak;
pub mod pid;
pub mod trend;
