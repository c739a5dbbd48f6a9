//! Charge controller configuration.
//!
//! Split in two halves:
//!
//! - [`DcdcLimits`]: electrical and thermal ratings of the board.  These
//!   have sane defaults and may be tightened at runtime over the telemetry
//!   channel.
//! - [`Calibration`]: tuning constants of the control loop (MPPT step,
//!   proportional gains, low-power grace period, trip thresholds).  These
//!   are board specific and stability-tested per hardware revision, so
//!   there is intentionally no `Default`: the integrator must supply them.

use serde::{Deserialize, Serialize};

use crate::dcdc::OperationMode;
use crate::error::{Error, Result};

/// Temperature reported for a MOSFET sensor that reads open or shorted
/// (°C).  Every valid `mosfet_temperature_max` lies below it, so a broken
/// sensor always derates.
pub const MOSFET_SENSOR_FAULT_C: f32 = 150.0;

/// Electrical limits enforced by the CC/CV limiter and the start checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DcdcLimits {
    /// Maximum low-side (inductor) current magnitude (A).
    pub ls_current_max: f32,
    /// Maximum high-side voltage (V).
    pub hs_voltage_max: f32,
    /// Maximum low-side voltage (V).
    pub ls_voltage_max: f32,
    /// Minimum low-side voltage (V), e.g. for gate-driver supply.
    pub ls_voltage_min: f32,
    /// Output power below which the converter is switched off (W).
    pub output_power_min: f32,
    /// MOSFET temperature above which the stage derates (°C).
    pub mosfet_temperature_max: f32,
    /// How long to stay off after a stop before retrying (ms).
    pub restart_interval_ms: u64,
}

impl Default for DcdcLimits {
    fn default() -> Self {
        Self {
            ls_current_max: 20.0,
            hs_voltage_max: 55.0,
            ls_voltage_max: 16.0,
            ls_voltage_min: 9.0,
            output_power_min: 1.0,
            mosfet_temperature_max: 80.0,
            restart_interval_ms: 60_000,
        }
    }
}

/// Tuning constants of the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// Fixed perturb & observe duty-cycle step.
    pub mppt_step: f32,
    /// Minimum V_high − V_low before conversion may start (V).
    pub start_headroom_v: f32,
    /// Nanogrid mode: bus voltage at or above which the bus is treated as
    /// supplied and the battery is charged (buck); below it the battery
    /// supports the bus (boost).
    pub nanogrid_bus_voltage: f32,
    /// How long output power may stay below `output_power_min` (ms).
    pub low_power_grace_ms: u64,
    /// Proportional duty correction per ampere of overcurrent.
    pub current_gain: f32,
    /// Proportional duty correction per volt of voltage violation.
    pub voltage_gain: f32,
    /// Proportional duty correction per kelvin of overtemperature.
    pub temperature_gain: f32,
    /// Smallest duty cycle the half bridge accepts.
    pub duty_min: f32,
    /// Largest duty cycle the half bridge accepts.
    pub duty_max: f32,
    /// Low-side current magnitude that trips the fast path (A).
    pub fast_trip_current: f32,
    /// Port voltage that trips the fast path (V).
    pub fast_trip_voltage: f32,
    /// Heartbeat age after which the tick is considered stalled (ms).
    pub tick_stall_ms: u64,
}

/// Complete runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargerConfig {
    /// Which port is source and which is sink; fixed for the lifetime of
    /// the converter.
    pub operation_mode: OperationMode,
    pub limits: DcdcLimits,
    pub calibration: Calibration,
    /// Control loop period (ms).
    pub control_loop_interval_ms: u32,
    /// Telemetry publication period (ms).
    pub telemetry_interval_ms: u32,
}

impl ChargerConfig {
    /// Build a config from a board calibration, using default limits and
    /// a 10 Hz control loop with 1 Hz telemetry.
    pub fn new(operation_mode: OperationMode, calibration: Calibration) -> Self {
        Self {
            operation_mode,
            limits: DcdcLimits::default(),
            calibration,
            control_loop_interval_ms: 100,
            telemetry_interval_ms: 1000,
        }
    }

    /// Range-check every field. Invalid configs are rejected, never
    /// clamped.
    pub fn validate(&self) -> Result<()> {
        self.limits.validate()?;
        self.calibration.validate()?;
        if self.control_loop_interval_ms == 0 {
            return Err(Error::Config("control_loop_interval_ms must be > 0"));
        }
        if self.telemetry_interval_ms < self.control_loop_interval_ms {
            return Err(Error::Config(
                "telemetry_interval_ms must not be faster than the control loop",
            ));
        }
        Ok(())
    }
}

impl DcdcLimits {
    pub fn validate(&self) -> Result<()> {
        let values = [
            self.ls_current_max,
            self.hs_voltage_max,
            self.ls_voltage_max,
            self.ls_voltage_min,
            self.output_power_min,
            self.mosfet_temperature_max,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::Config("limits must be finite"));
        }
        if self.ls_current_max <= 0.0 {
            return Err(Error::Config("ls_current_max must be > 0"));
        }
        if self.ls_voltage_min < 0.0 || self.ls_voltage_min >= self.ls_voltage_max {
            return Err(Error::Config("ls_voltage_min must be in [0, ls_voltage_max)"));
        }
        if self.hs_voltage_max <= self.ls_voltage_max {
            return Err(Error::Config("hs_voltage_max must exceed ls_voltage_max"));
        }
        if self.output_power_min < 0.0 {
            return Err(Error::Config("output_power_min must be >= 0"));
        }
        if self.mosfet_temperature_max >= MOSFET_SENSOR_FAULT_C {
            return Err(Error::Config("mosfet_temperature_max must be below 150 °C"));
        }
        Ok(())
    }
}

impl Calibration {
    pub fn validate(&self) -> Result<()> {
        let values = [
            self.mppt_step,
            self.start_headroom_v,
            self.nanogrid_bus_voltage,
            self.current_gain,
            self.voltage_gain,
            self.temperature_gain,
            self.duty_min,
            self.duty_max,
            self.fast_trip_current,
            self.fast_trip_voltage,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::Config("calibration must be finite"));
        }
        if self.duty_min <= 0.0 || self.duty_max >= 1.0 || self.duty_min >= self.duty_max {
            return Err(Error::Config("duty range must satisfy 0 < duty_min < duty_max < 1"));
        }
        if self.mppt_step <= 0.0 || self.mppt_step >= self.duty_max - self.duty_min {
            return Err(Error::Config("mppt_step must be > 0 and smaller than the duty range"));
        }
        if self.current_gain <= 0.0 || self.voltage_gain <= 0.0 || self.temperature_gain <= 0.0 {
            return Err(Error::Config("proportional gains must be > 0"));
        }
        if self.start_headroom_v < 0.0 {
            return Err(Error::Config("start_headroom_v must be >= 0"));
        }
        if self.low_power_grace_ms == 0 {
            return Err(Error::Config("low_power_grace_ms must be > 0"));
        }
        if self.fast_trip_current <= 0.0 || self.fast_trip_voltage <= 0.0 {
            return Err(Error::Config("fast trip thresholds must be > 0"));
        }
        Ok(())
    }
}

/// Calibration used by unit tests across the crate.
#[cfg(test)]
pub(crate) fn test_calibration() -> Calibration {
    Calibration {
        mppt_step: 0.005,
        start_headroom_v: 1.0,
        nanogrid_bus_voltage: 30.0,
        low_power_grace_ms: 10_000,
        current_gain: 0.01,
        voltage_gain: 0.02,
        temperature_gain: 0.005,
        duty_min: 0.05,
        duty_max: 0.97,
        fast_trip_current: 30.0,
        fast_trip_voltage: 70.0,
        tick_stall_ms: 500,
    }
}
