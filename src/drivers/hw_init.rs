//! One-shot hardware peripheral initialization and thin register helpers.
//!
//! Configures ADC channels, GPIO directions, the LEDC timer/channel for
//! the half bridge and the comparator interrupt using raw ESP-IDF sys
//! calls.  Called once from `main()` before the control loop starts.
//!
//! [`LedcPwm`] and [`GpioOut`] expose the configured peripherals through
//! the embedded-hal traits consumed by
//! [`PwmHalfBridge`](crate::adapters::half_bridge::PwmHalfBridge).  On
//! host targets they only track state in memory.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    GpioConfigFailed(i32),
    LedcInitFailed(i32),
    IsrInstallFailed(i32),
    TimerStartFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc) => write!(f, "ADC1 init failed (rc={})", rc),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::LedcInitFailed(rc) => write!(f, "LEDC timer/channel config failed (rc={})", rc),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={})", rc),
            Self::TimerStartFailed(rc) => write!(f, "esp_timer start failed (rc={})", rc),
        }
    }
}

impl std::error::Error for HwInitError {}

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before the control loop; single-threaded.
    unsafe {
        init_gpio_outputs()?;
        init_gpio_inputs()?;
        init_adc()?;
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

/// SAFETY: Must be called only from the single-threaded init path or the
/// control-loop ADC read path.
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
    let channels = [
        pins::ADC1_CH_HS_VOLTAGE,
        pins::ADC1_CH_LS_VOLTAGE,
        pins::ADC1_CH_LS_CURRENT,
        pins::ADC1_CH_MOSFET_NTC,
    ];
    for ch in channels {
        let ret = unsafe { adc_oneshot_config_channel(adc1_handle(), ch, &chan_cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::AdcInitFailed(ret));
        }
    }

    info!("hw_init: ADC1 configured (CH3=hs_v, CH4=ls_v, CH5=ls_i, CH6=ntc)");
    Ok(())
}

/// Raw 12-bit reading, or `None` if the conversion failed.
#[cfg(target_os = "espidf")]
pub fn adc1_read(channel: u32) -> Option<u16> {
    let mut raw: i32 = 0;
    // SAFETY: adc1_handle() contract, control-loop access only.
    let ret = unsafe { adc_oneshot_read(adc1_handle(), channel, &mut raw) };
    if ret != ESP_OK as i32 {
        return None;
    }
    Some(raw.clamp(0, i32::from(pins::ADC_MAX_RAW)) as u16)
}

/// No converter on host: every read fails.
#[cfg(not(target_os = "espidf"))]
pub fn adc1_read(_channel: u32) -> Option<u16> {
    None
}

// ── GPIO ──────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_outputs() -> Result<(), HwInitError> {
    for pin in [pins::GATE_ENABLE_GPIO, pins::KILL_GPIO] {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_ENABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
        // Drivers disabled, kill line released.
        unsafe { gpio_set_level(pin, 0) };
    }

    info!("hw_init: GPIO outputs configured");
    Ok(())
}

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_inputs() -> Result<(), HwInitError> {
    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pins::COMPARATOR_TRIP_GPIO,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_NEGEDGE,
    };
    let ret = unsafe { gpio_config(&cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }
    info!("hw_init: GPIO inputs configured");
    Ok(())
}

/// Push-pull output configured in [`init_peripherals`].
pub struct GpioOut {
    #[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
    pin: i32,
    high: bool,
}

impl GpioOut {
    pub const fn new(pin: i32) -> Self {
        Self { pin, high: false }
    }

    pub fn is_set_high(&self) -> bool {
        self.high
    }
}

/// An ESP-IDF error code from a GPIO or LEDC call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EspError(pub i32);

impl embedded_hal::digital::Error for EspError {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

impl embedded_hal::pwm::Error for EspError {
    fn kind(&self) -> embedded_hal::pwm::ErrorKind {
        embedded_hal::pwm::ErrorKind::Other
    }
}

impl embedded_hal::digital::ErrorType for GpioOut {
    type Error = EspError;
}

impl embedded_hal::digital::OutputPin for GpioOut {
    fn set_low(&mut self) -> Result<(), EspError> {
        self.write(false)
    }

    fn set_high(&mut self) -> Result<(), EspError> {
        self.write(true)
    }
}

impl GpioOut {
    #[cfg(target_os = "espidf")]
    fn write(&mut self, high: bool) -> Result<(), EspError> {
        // SAFETY: register write on an output configured at init.
        let ret = unsafe { gpio_set_level(self.pin, u32::from(high)) };
        if ret != ESP_OK as i32 {
            return Err(EspError(ret));
        }
        self.high = high;
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn write(&mut self, high: bool) -> Result<(), EspError> {
        self.high = high;
        Ok(())
    }
}

// ── LEDC PWM ─────────────────────────────────────────────────

const LEDC_CH_HALF_BRIDGE: u32 = 0;

#[cfg(target_os = "espidf")]
unsafe fn init_ledc() -> Result<(), HwInitError> {
    let timer = ledc_timer_config_t {
        speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
        timer_num: ledc_timer_t_LEDC_TIMER_0,
        duty_resolution: pins::PWM_RESOLUTION_BITS,
        freq_hz: pins::PWM_FREQ_HZ,
        clk_cfg: soc_periph_ledc_clk_src_legacy_t_LEDC_AUTO_CLK,
        ..Default::default()
    };
    let ret = unsafe { ledc_timer_config(&timer) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::LedcInitFailed(ret));
    }

    let ret = unsafe {
        ledc_channel_config(&ledc_channel_config_t {
            speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
            channel: LEDC_CH_HALF_BRIDGE,
            timer_sel: ledc_timer_t_LEDC_TIMER_0,
            gpio_num: pins::HALF_BRIDGE_PWM_GPIO,
            duty: 0,
            hpoint: 0,
            ..Default::default()
        })
    };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::LedcInitFailed(ret));
    }

    info!(
        "hw_init: LEDC configured (half bridge=CH0, {} kHz, {} bit)",
        pins::PWM_FREQ_HZ / 1000,
        pins::PWM_RESOLUTION_BITS
    );
    Ok(())
}

/// The half-bridge LEDC channel.
pub struct LedcPwm {
    duty: u16,
}

impl LedcPwm {
    pub const fn new() -> Self {
        Self { duty: 0 }
    }

    /// Last duty written, in timer ticks.
    pub fn duty(&self) -> u16 {
        self.duty
    }
}

impl Default for LedcPwm {
    fn default() -> Self {
        Self::new()
    }
}

impl embedded_hal::pwm::ErrorType for LedcPwm {
    type Error = EspError;
}

impl embedded_hal::pwm::SetDutyCycle for LedcPwm {
    fn max_duty_cycle(&self) -> u16 {
        ((1u32 << pins::PWM_RESOLUTION_BITS) - 1) as u16
    }

    #[cfg(target_os = "espidf")]
    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), EspError> {
        // SAFETY: channel configured in init_ledc(); only the control loop
        // writes the duty register.
        unsafe {
            let ret = ledc_set_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, LEDC_CH_HALF_BRIDGE, u32::from(duty));
            if ret != ESP_OK as i32 {
                return Err(EspError(ret));
            }
            let ret = ledc_update_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, LEDC_CH_HALF_BRIDGE);
            if ret != ESP_OK as i32 {
                return Err(EspError(ret));
            }
        }
        self.duty = duty;
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), EspError> {
        self.duty = duty;
        Ok(())
    }
}

// ── Comparator interrupt ──────────────────────────────────────

/// Allocation flags for the GPIO ISR service.  No `ESP_INTR_FLAG_IRAM`:
/// the handler chain lives in flash and must not run while the cache is
/// off during a flash write.
pub const ISR_SERVICE_FLAGS: i32 = 0;

/// Register `handler` on the comparator trip input (falling edge).
/// Call after [`init_peripherals`].
#[cfg(target_os = "espidf")]
pub fn init_isr_service(
    handler: unsafe extern "C" fn(*mut core::ffi::c_void),
) -> Result<(), HwInitError> {
    // SAFETY: ESP_ERR_INVALID_STATE means the service is already installed.
    // The handler only touches atomics and a GPIO register.
    unsafe {
        let ret = gpio_install_isr_service(ISR_SERVICE_FLAGS);
        if ret != ESP_OK && ret != ESP_ERR_INVALID_STATE {
            return Err(HwInitError::IsrInstallFailed(ret));
        }
        let ret = gpio_isr_handler_add(
            pins::COMPARATOR_TRIP_GPIO,
            Some(handler),
            core::ptr::null_mut(),
        );
        if ret != ESP_OK {
            return Err(HwInitError::IsrInstallFailed(ret));
        }
        gpio_intr_enable(pins::COMPARATOR_TRIP_GPIO);
    }
    info!("hw_init: comparator ISR installed");
    Ok(())
}
