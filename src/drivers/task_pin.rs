//! Core-pinned thread spawning for the ESP32 dual-core.
//!
//! Wraps `esp_pthread_set_cfg()` so that `std::thread::spawn` creates a
//! FreeRTOS task pinned to a specific CPU core with explicit priority
//! and stack size. On non-ESP targets, falls back to plain thread spawn.
//!
//! `esp_pthread_set_cfg()` sets thread-local configuration that applies to
//! the *next* `pthread_create()` from the calling thread, so the
//! config→spawn pair must not be interleaved with other thread creation.

use std::io;
use std::thread::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Core {
    /// Core 0 (PRO_CPU): sensor sweep, bit-banged probe timing.
    Pro = 0,
    /// Core 1 (APP_CPU): coordinator and actuator loops.
    App = 1,
}

/// Spawn a thread pinned to `core`. `name` must be null-terminated
/// (e.g. `"sensors\0"`).
#[cfg(target_os = "espidf")]
pub fn spawn_on_core(
    core: Core,
    priority: u8,
    stack_kb: usize,
    name: &'static str,
    f: impl FnOnce() + Send + 'static,
) -> io::Result<JoinHandle<()>> {
    use esp_idf_svc::sys::{esp_create_default_pthread_config, esp_pthread_set_cfg, ESP_OK};

    // SAFETY: cfg lives on the stack for the duration of the call and
    // `name` is a 'static null-terminated string.
    let ret = unsafe {
        let mut cfg = esp_create_default_pthread_config();
        cfg.pin_to_core = core as i32;
        cfg.prio = priority as i32;
        cfg.stack_size = (stack_kb * 1024) as i32;
        cfg.thread_name = name.as_ptr() as *const _;
        esp_pthread_set_cfg(&cfg)
    };
    if ret != ESP_OK as i32 {
        return Err(io::Error::other(format!("esp_pthread_set_cfg failed: {ret}")));
    }

    let display_name = name.trim_end_matches('\0');
    log::info!("Spawning '{display_name}' on {core:?} (pri={priority}, stack={stack_kb}KB)");

    std::thread::Builder::new().name(display_name.into()).spawn(f)
}

/// Simulation fallback; ignores core affinity and priority.
#[cfg(not(target_os = "espidf"))]
pub fn spawn_on_core(
    _core: Core,
    _priority: u8,
    stack_kb: usize,
    name: &'static str,
    f: impl FnOnce() + Send + 'static,
) -> io::Result<JoinHandle<()>> {
    let display_name = name.trim_end_matches('\0');
    log::info!("Spawning '{display_name}' (sim, no core pinning, stack={stack_kb}KB)");

    std::thread::Builder::new()
        .name(display_name.into())
        .stack_size(stack_kb * 1024)
        .spawn(f)
}
