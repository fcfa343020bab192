//! Application core: pure domain logic, zero I/O.
//!
//! The coordinator drives the appliance and per-shoe machines from the
//! event queue.  All interaction with hardware happens through **port
//! traits** defined in [`ports`], keeping this layer fully testable without
//! real peripherals.

pub mod coordinator;
pub mod display;
pub mod events;
pub mod ports;
