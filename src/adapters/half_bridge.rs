//! PWM half-bridge adapter.
//!
//! Drives a synchronous half bridge through two embedded-hal handles:
//!
//! - a [`SetDutyCycle`] channel for the complementary high-/low-side PWM
//!   (the driver IC inserts dead time), and
//! - an [`OutputPin`] for the gate-driver enable.
//!
//! The fractional duty is mapped onto `max_duty_cycle()` ticks.  The
//! hardware kill line is wired in series with the enable pin on the
//! board, so this adapter never has to observe it.

use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;

use crate::app::ports::HalfBridge;
use crate::error::ActuatorError;

pub struct PwmHalfBridge<P, E> {
    pwm: P,
    enable: E,
    running: bool,
    duty: f32,
}

impl<P: SetDutyCycle, E: OutputPin> PwmHalfBridge<P, E> {
    /// Wrap the handles.  The gate drivers are disabled immediately.
    pub fn new(pwm: P, mut enable: E) -> Result<Self, ActuatorError> {
        enable
            .set_low()
            .map_err(|_| ActuatorError::GpioWriteFailed)?;
        Ok(Self {
            pwm,
            enable,
            running: false,
            duty: 0.0,
        })
    }

    fn write_duty(&mut self, duty: f32) -> Result<(), ActuatorError> {
        let max = self.pwm.max_duty_cycle();
        let ticks = (duty.clamp(0.0, 1.0) * f32::from(max)) as u16;
        self.pwm
            .set_duty_cycle(ticks.min(max))
            .map_err(|_| ActuatorError::PwmWriteFailed)?;
        self.duty = duty;
        Ok(())
    }

    /// Release the underlying handles.
    pub fn release(self) -> (P, E) {
        (self.pwm, self.enable)
    }
}

impl<P: SetDutyCycle, E: OutputPin> HalfBridge for PwmHalfBridge<P, E> {
    fn start(&mut self, duty: f32) -> Result<(), ActuatorError> {
        // Duty first so the drivers never switch at a stale ratio.
        self.write_duty(duty)?;
        self.enable
            .set_high()
            .map_err(|_| ActuatorError::GpioWriteFailed)?;
        self.running = true;
        Ok(())
    }

    fn set_duty(&mut self, duty: f32) -> Result<(), ActuatorError> {
        self.write_duty(duty)
    }

    fn stop(&mut self) -> Result<(), ActuatorError> {
        self.running = false;
        let gate = self
            .enable
            .set_low()
            .map_err(|_| ActuatorError::GpioWriteFailed);
        let pwm = self
            .pwm
            .set_duty_cycle_fully_off()
            .map_err(|_| ActuatorError::PwmWriteFailed);
        self.duty = 0.0;
        gate.and(pwm)
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn duty(&self) -> f32 {
        self.duty
    }

    fn force_low_side_on(&mut self) -> Result<(), ActuatorError> {
        // Zero high-side duty: the complementary output holds the low-side
        // switch on for the whole period.
        self.pwm
            .set_duty_cycle_fully_off()
            .map_err(|_| ActuatorError::PwmWriteFailed)?;
        self.enable
            .set_high()
            .map_err(|_| ActuatorError::GpioWriteFailed)?;
        self.duty = 0.0;
        self.running = false;
        Ok(())
    }
}
