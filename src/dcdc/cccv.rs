//! CC/CV limiter.
//!
//! Consulted every running tick before the MPPT step.  When a limit is
//! active it replaces the MPPT step with a proportional correction and
//! reports the limiting regime.  It never switches the stage off.
//!
//! Corrections are expressed in terms of output power: "reduce" moves the
//! duty in the direction that lowers power delivered to the sink, which is
//! down in buck and up in boost.  The low-side floor is the exception: a
//! higher duty always raises the low-side voltage (V_low = D · V_high).

use super::limits;
use super::{ControlState, DutyRange, PowerDirection};
use crate::config::{Calibration, DcdcLimits};
use crate::port::PortPair;

/// A limiting regime chosen by [`evaluate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limiting {
    pub state: ControlState,
    pub duty: f32,
}

fn reduce_output(direction: PowerDirection, duty: f32, step: f32, gain: f32, excess: f32) -> f32 {
    duty - direction.output_sign() * (step + gain * excess)
}

/// Check the limits in priority order, first match wins:
///
/// 1. low-side overcurrent → `ConstantCurrent`
/// 2. high- or low-side overvoltage → `ConstantVoltage`
/// 3. low-side undervoltage → `ConstantVoltage`, duty raised
/// 4. MOSFET over-temperature → `Derating`
///
/// Returns `None` when the MPPT step may run unmodified.
#[allow(clippy::too_many_arguments)]
pub fn evaluate(
    direction: PowerDirection,
    duty: f32,
    ports: &PortPair,
    mosfet_temperature: Option<f32>,
    limits: &DcdcLimits,
    calibration: &Calibration,
    range: DutyRange,
) -> Option<Limiting> {
    let step = calibration.mppt_step;

    let (state, target) = if let Some(excess) = limits::ls_overcurrent(limits, ports) {
        (
            ControlState::ConstantCurrent,
            reduce_output(direction, duty, step, calibration.current_gain, excess),
        )
    } else if let Some(excess) =
        limits::hs_overvoltage(limits, ports).or_else(|| limits::ls_overvoltage(limits, ports))
    {
        (
            ControlState::ConstantVoltage,
            reduce_output(direction, duty, step, calibration.voltage_gain, excess),
        )
    } else if let Some(deficit) = limits::ls_undervoltage(limits, ports) {
        (
            ControlState::ConstantVoltage,
            duty + step + calibration.voltage_gain * deficit,
        )
    } else if let Some(excess) = limits::over_temperature(limits, mosfet_temperature) {
        (
            ControlState::Derating,
            reduce_output(direction, duty, step, calibration.temperature_gain, excess),
        )
    } else {
        return None;
    };

    Some(Limiting {
        state,
        duty: range.clamp(target),
    })
}
