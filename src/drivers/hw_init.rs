//! One-shot hardware peripheral initialization.
//!
//! Configures the battery ADC channel, GPIO directions and LEDC
//! timers/channels using raw ESP-IDF sys calls.  Called once from `main()`
//! before the tasks are spawned.
//!
//! The probe data lines are not touched here: each DHT22 gets an
//! open-drain `PinDriver` from `esp-idf-hal` in `main`.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    GpioConfigFailed(i32),
    LedcInitFailed(i32),
    IsrInstallFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc) => write!(f, "ADC1 init failed (rc={rc})"),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={rc})"),
            Self::LedcInitFailed(rc) => write!(f, "LEDC timer/channel config failed (rc={rc})"),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={rc})"),
        }
    }
}

impl From<HwInitError> for crate::error::Error {
    fn from(e: HwInitError) -> Self {
        Self::Init(match e {
            HwInitError::AdcInitFailed(_) => "ADC1",
            HwInitError::GpioConfigFailed(_) => "GPIO",
            HwInitError::LedcInitFailed(_) => "LEDC",
            HwInitError::IsrInstallFailed(_) => "GPIO ISR service",
        })
    }
}

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::pins;

/// LEDC channel per bay motor, then the UV lamp.
pub const LEDC_CH_MOTOR: [u32; 2] = [0, 1];
pub const LEDC_CH_UV: u32 = 2;

/// ADC1 channel wired to the battery divider (GPIO 39).
pub const ADC1_CH_BATTERY: u32 = 3;

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before any task is spawned.
    unsafe {
        init_adc()?;
        init_gpio_inputs()?;
        init_gpio_outputs()?;
        init_ledc()?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── ADC (oneshot) ─────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static mut ADC1_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();

/// SAFETY: ADC1_HANDLE is written once in `init_adc()` before any reader
/// exists; afterwards only the coordinator task reads the battery channel.
#[cfg(target_os = "espidf")]
unsafe fn adc1_handle() -> adc_oneshot_unit_handle_t {
    unsafe { ADC1_HANDLE }
}

#[cfg(target_os = "espidf")]
unsafe fn init_adc() -> Result<(), HwInitError> {
    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    // SAFETY: ADC1_HANDLE is only written here, once at boot.
    let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &raw mut ADC1_HANDLE) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };
    let ret = unsafe { adc_oneshot_config_channel(adc1_handle(), ADC1_CH_BATTERY, &chan_cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    info!("hw_init: ADC1 configured (CH{ADC1_CH_BATTERY}=battery)");
    Ok(())
}

/// One raw conversion, `None` if the driver reports an error.
#[cfg(target_os = "espidf")]
pub fn adc1_read(channel: u32) -> Option<u16> {
    let mut raw: i32 = 0;
    // SAFETY: adc1_handle() contract; single reader task.
    let ret = unsafe { adc_oneshot_read(adc1_handle(), channel, &mut raw) };
    (ret == ESP_OK as i32).then(|| raw.max(0) as u16)
}

// ── GPIO Inputs ───────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_inputs() -> Result<(), HwInitError> {
    // GPIO 34/35 have no internal pull-ups; the board carries 10 kΩ.
    for pin in [pins::START_BUTTON_GPIO, pins::RESET_BUTTON_GPIO] {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_NEGEDGE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
    }
    info!("hw_init: button inputs configured");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: read-only register access on a configured input.
    (unsafe { gpio_get_level(pin) }) != 0
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(_pin: i32) -> bool {
    true
}

// ── GPIO Outputs ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_outputs() -> Result<(), HwInitError> {
    let output_pins = [
        pins::HEATER0_GPIO,
        pins::HEATER1_GPIO,
        pins::STATUS_LED_GPIO,
        pins::ERROR_LED_GPIO,
    ];

    for &pin in &output_pins {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
        unsafe { gpio_set_level(pin, 0) };
    }

    info!("hw_init: GPIO outputs configured (heaters off)");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) -> Result<(), HwInitError> {
    // SAFETY: the pin was configured as an output in init_gpio_outputs().
    let ret = unsafe { gpio_set_level(pin, u32::from(high)) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(_pin: i32, _high: bool) -> Result<(), HwInitError> {
    Ok(())
}

// ── LEDC PWM ─────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_ledc() -> Result<(), HwInitError> {
    let check = |ret: i32| {
        if ret == ESP_OK as i32 {
            Ok(())
        } else {
            Err(HwInitError::LedcInitFailed(ret))
        }
    };

    // Timer 0: bay motors (25 kHz, 8-bit)
    let timer0 = ledc_timer_config_t {
        speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
        timer_num: ledc_timer_t_LEDC_TIMER_0,
        duty_resolution: ledc_timer_bit_t_LEDC_TIMER_8_BIT,
        freq_hz: pins::MOTOR_PWM_FREQ_HZ,
        clk_cfg: soc_periph_ledc_clk_src_legacy_t_LEDC_AUTO_CLK,
        ..Default::default()
    };
    check(unsafe { ledc_timer_config(&timer0) })?;

    // Timer 1: UV lamp (1 kHz, 8-bit)
    let timer1 = ledc_timer_config_t {
        speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
        timer_num: ledc_timer_t_LEDC_TIMER_1,
        duty_resolution: ledc_timer_bit_t_LEDC_TIMER_8_BIT,
        freq_hz: pins::UV_PWM_FREQ_HZ,
        clk_cfg: soc_periph_ledc_clk_src_legacy_t_LEDC_AUTO_CLK,
        ..Default::default()
    };
    check(unsafe { ledc_timer_config(&timer1) })?;

    for (i, &gpio) in pins::MOTOR_PWM_GPIOS.iter().enumerate() {
        check(unsafe {
            ledc_channel_config(&ledc_channel_config_t {
                speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
                channel: LEDC_CH_MOTOR[i],
                timer_sel: ledc_timer_t_LEDC_TIMER_0,
                gpio_num: gpio,
                duty: 0,
                hpoint: 0,
                ..Default::default()
            })
        })?;
    }

    check(unsafe {
        ledc_channel_config(&ledc_channel_config_t {
            speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
            channel: LEDC_CH_UV,
            timer_sel: ledc_timer_t_LEDC_TIMER_1,
            gpio_num: pins::UV_PWM_GPIO,
            duty: 0,
            hpoint: 0,
            ..Default::default()
        })
    })?;

    info!("hw_init: LEDC configured (motor=CH0-1, uv=CH2)");
    Ok(())
}

/// Set a channel's duty in percent (scaled to the 8-bit timer).
#[cfg(target_os = "espidf")]
pub fn ledc_set(channel: u32, duty_pct: u8) -> Result<(), HwInitError> {
    let duty = u32::from(duty_pct.min(100)) * 255 / 100;
    // SAFETY: channels were configured in init_ledc(); only the actuator
    // task writes duty registers.
    let ret = unsafe {
        let r = ledc_set_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel, duty);
        if r == ESP_OK as i32 {
            ledc_update_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel)
        } else {
            r
        }
    };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::LedcInitFailed(ret));
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn ledc_set(_channel: u32, _duty_pct: u8) -> Result<(), HwInitError> {
    Ok(())
}

// ── GPIO ISR Service ──────────────────────────────────────────

#[cfg(target_os = "espidf")]
use crate::drivers::button::{Button, button_isr_handler};

#[cfg(target_os = "espidf")]
fn isr_now_ms() -> u32 {
    // SAFETY: esp_timer_get_time is an RTC counter read; safe in ISR context.
    (unsafe { esp_timer_get_time() } / 1_000) as u32
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn start_gpio_isr(_arg: *mut core::ffi::c_void) {
    button_isr_handler(Button::Start, isr_now_ms());
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn reset_gpio_isr(_arg: *mut core::ffi::c_void) {
    button_isr_handler(Button::Reset, isr_now_ms());
}

/// Install the per-pin GPIO ISR service and register the button handlers.
/// Call after init_peripherals().
#[cfg(target_os = "espidf")]
pub fn init_isr_service() -> Result<(), HwInitError> {
    // SAFETY: ESP_ERR_INVALID_STATE means the service is already installed.
    // The handlers only store a timestamp into an atomic.
    unsafe {
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK && ret != ESP_ERR_INVALID_STATE {
            return Err(HwInitError::IsrInstallFailed(ret));
        }

        gpio_isr_handler_add(pins::START_BUTTON_GPIO, Some(start_gpio_isr), core::ptr::null_mut());
        gpio_intr_enable(pins::START_BUTTON_GPIO);
        gpio_isr_handler_add(pins::RESET_BUTTON_GPIO, Some(reset_gpio_isr), core::ptr::null_mut());
        gpio_intr_enable(pins::RESET_BUTTON_GPIO);

        info!("hw_init: ISR service installed (start, reset)");
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_isr_service() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): ISR service skipped");
    Ok(())
}
