//! Task Watchdog Timer (TWDT) driver.
//!
//! Each control task subscribes itself and feeds once per loop iteration.
//! A task that stalls past the timeout panics the chip, which drops every
//! output to its reset state (motors, heaters and UV off).

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use log::info;

/// Shared timeout; the slowest task (sensor sweep, 3 s) must fit well inside.
pub const WATCHDOG_TIMEOUT_MS: u32 = 10_000;

pub struct Watchdog {
    task: &'static str,
    #[cfg(target_os = "espidf")]
    subscribed: bool,
}

impl Watchdog {
    /// Configure the TWDT (first caller wins) and subscribe the calling task.
    pub fn subscribe(task: &'static str) -> Self {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: plain TWDT API calls; null handle means "current task".
            unsafe {
                let cfg = esp_task_wdt_config_t {
                    timeout_ms: WATCHDOG_TIMEOUT_MS,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK {
                    log::debug!("Watchdog: reconfigure returned {ret} (already configured)");
                }

                let ret = esp_task_wdt_add(core::ptr::null_mut());
                let subscribed = ret == ESP_OK;
                if subscribed {
                    info!("Watchdog[{task}]: subscribed ({WATCHDOG_TIMEOUT_MS} ms, panic on trigger)");
                } else {
                    log::warn!("Watchdog[{task}]: failed to subscribe ({ret})");
                }
                Self { task, subscribed }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            info!("Watchdog[{task}](sim): no-op");
            Self { task }
        }
    }

    pub fn task(&self) -> &'static str {
        self.task
    }

    pub fn feed(&self) {
        #[cfg(target_os = "espidf")]
        if self.subscribed {
            // SAFETY: resets the calling task's own subscription.
            unsafe {
                esp_task_wdt_reset();
            }
        }
    }
}
