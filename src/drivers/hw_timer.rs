//! Supervision timer using ESP-IDF's esp_timer API.
//!
//! Runs the tick-stall check independently of the control loop: if the
//! loop hangs, the timer callback still fires and trips the kill switch.
//! The callback executes in the ESP timer task, so it may only touch
//! atomics and GPIO registers.
//!
//! On simulation targets nothing is started; tests call the check
//! directly.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

use super::hw_init::HwInitError;

#[cfg(target_os = "espidf")]
static mut SUPERVISOR_TIMER: esp_timer_handle_t = core::ptr::null_mut();

/// Start `callback` as a periodic timer with `period_ms`.
#[cfg(target_os = "espidf")]
pub fn start_supervisor(
    callback: unsafe extern "C" fn(*mut core::ffi::c_void),
    period_ms: u32,
) -> Result<(), HwInitError> {
    // SAFETY: SUPERVISOR_TIMER is written here once at boot from the main
    // task before the timer can fire.
    unsafe {
        let args = esp_timer_create_args_t {
            callback: Some(callback),
            arg: core::ptr::null_mut(),
            dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
            name: b"supervisor\0".as_ptr() as *const _,
            skip_unhandled_events: true,
        };
        let ret = esp_timer_create(&args, &raw mut SUPERVISOR_TIMER);
        if ret != ESP_OK {
            return Err(HwInitError::TimerStartFailed(ret));
        }
        let ret = esp_timer_start_periodic(SUPERVISOR_TIMER, u64::from(period_ms) * 1_000);
        if ret != ESP_OK {
            return Err(HwInitError::TimerStartFailed(ret));
        }
    }
    info!("hw_timer: supervisor every {} ms", period_ms);
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn start_supervisor(
    _callback: unsafe extern "C" fn(*mut core::ffi::c_void),
    period_ms: u32,
) -> Result<(), HwInitError> {
    log::info!("hw_timer(sim): supervisor ({} ms) not started", period_ms);
    Ok(())
}
