//! Hardware kill line adapters.
//!
//! - **`target_os = "espidf"`**: [`GpioKillLine`] drives the gate-driver
//!   shutdown input with `gpio_set_level`, which is a plain register write
//!   and safe from interrupt context.
//! - **Host**: [`SimKillLine`] keeps the level in an atomic for tests and
//!   simulation.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::app::ports::KillLine;

/// In-memory kill line.
pub struct SimKillLine {
    asserted: AtomicBool,
}

impl SimKillLine {
    pub const fn new() -> Self {
        Self {
            asserted: AtomicBool::new(false),
        }
    }
}

impl Default for SimKillLine {
    fn default() -> Self {
        Self::new()
    }
}

impl KillLine for SimKillLine {
    fn assert_kill(&self) {
        self.asserted.store(true, Ordering::Release);
    }

    fn release(&self) {
        self.asserted.store(false, Ordering::Release);
    }

    fn is_asserted(&self) -> bool {
        self.asserted.load(Ordering::Acquire)
    }
}

/// Gate-driver shutdown pin, active high.
#[cfg(target_os = "espidf")]
pub struct GpioKillLine {
    pin: i32,
    asserted: AtomicBool,
}

#[cfg(target_os = "espidf")]
impl GpioKillLine {
    /// `pin` must already be configured as an output.
    pub const fn new(pin: i32) -> Self {
        Self {
            pin,
            asserted: AtomicBool::new(false),
        }
    }
}

#[cfg(target_os = "espidf")]
impl KillLine for GpioKillLine {
    #[inline]
    fn assert_kill(&self) {
        // SAFETY: register write on a configured output; ISR safe.
        unsafe {
            esp_idf_svc::sys::gpio_set_level(self.pin, 1);
        }
        self.asserted.store(true, Ordering::Release);
    }

    fn release(&self) {
        // SAFETY: as above.
        unsafe {
            esp_idf_svc::sys::gpio_set_level(self.pin, 0);
        }
        self.asserted.store(false, Ordering::Release);
    }

    fn is_asserted(&self) -> bool {
        self.asserted.load(Ordering::Acquire)
    }
}
