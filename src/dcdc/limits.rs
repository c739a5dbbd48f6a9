//! Limit policy: pure checks of the present measurements against the
//! configured thresholds.
//!
//! Each check returns the size of the violation (always positive) or
//! `None`.  The effective ceiling is the tighter of the converter limit and
//! the port's own rating.

use crate::config::DcdcLimits;
use crate::port::PortPair;

fn excess(value: f32, limit: f32) -> Option<f32> {
    let e = value - limit;
    (e > 0.0).then_some(e)
}

pub fn ls_current_limit(limits: &DcdcLimits, ports: &PortPair) -> f32 {
    limits.ls_current_max.min(ports.low.current_max)
}

pub fn ls_voltage_limit(limits: &DcdcLimits, ports: &PortPair) -> f32 {
    limits.ls_voltage_max.min(ports.low.voltage_max)
}

pub fn hs_voltage_limit(limits: &DcdcLimits, ports: &PortPair) -> f32 {
    limits.hs_voltage_max.min(ports.high.voltage_max)
}

/// Low-side current magnitude above its limit (A).
pub fn ls_overcurrent(limits: &DcdcLimits, ports: &PortPair) -> Option<f32> {
    excess(ports.low.current.abs(), ls_current_limit(limits, ports))
}

/// High-side voltage above its limit (V).
pub fn hs_overvoltage(limits: &DcdcLimits, ports: &PortPair) -> Option<f32> {
    excess(ports.high.voltage, hs_voltage_limit(limits, ports))
}

/// Low-side voltage above its limit (V).
pub fn ls_overvoltage(limits: &DcdcLimits, ports: &PortPair) -> Option<f32> {
    excess(ports.low.voltage, ls_voltage_limit(limits, ports))
}

/// Low-side voltage below its floor (V).
pub fn ls_undervoltage(limits: &DcdcLimits, ports: &PortPair) -> Option<f32> {
    excess(limits.ls_voltage_min, ports.low.voltage)
}

/// MOSFET temperature above its limit (K). Boards without a sensor never
/// derate thermally.
pub fn over_temperature(limits: &DcdcLimits, mosfet_temperature: Option<f32>) -> Option<f32> {
    mosfet_temperature.and_then(|t| excess(t, limits.mosfet_temperature_max))
}

/// True if any voltage window is violated right now. Used to refuse a
/// start, where no limiting regime is available yet.
pub fn voltage_window_violated(limits: &DcdcLimits, ports: &PortPair) -> bool {
    hs_overvoltage(limits, ports).is_some()
        || ls_overvoltage(limits, ports).is_some()
        || ls_undervoltage(limits, ports).is_some()
}

/// True if any monitored value is past its limit.
pub fn any_exceeded(limits: &DcdcLimits, ports: &PortPair, mosfet_temperature: Option<f32>) -> bool {
    ls_overcurrent(limits, ports).is_some()
        || voltage_window_violated(limits, ports)
        || over_temperature(limits, mosfet_temperature).is_some()
}
