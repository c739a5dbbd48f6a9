//! Start-condition evaluator.
//!
//! Consulted only while the converter is off.  Purely advisory: it decides
//! whether conversion may begin and in which direction, the state machine
//! performs the transition.

use log::debug;

use super::OperationMode;
use super::limits;
use crate::config::{Calibration, DcdcLimits};
use crate::port::PortPair;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartDecision {
    /// Power flows high side → low side.
    StartBuck,
    /// Power flows low side → high side.
    StartBoost,
    NoStart,
}

/// True once `restart_interval_ms` has passed since the last stop.
pub fn backoff_elapsed(off_timestamp: Option<u64>, now_ms: u64, restart_interval_ms: u64) -> bool {
    off_timestamp.is_none_or(|off| now_ms.saturating_sub(off) >= restart_interval_ms)
}

/// Decide whether the power stage may start.
///
/// The half bridge only converts while V_high > V_low, so the headroom is
/// checked between the high and low side in both directions.  The
/// direction must also be one the operation mode allows: an `MppBuck`
/// stage never starts in boost and vice versa.
pub fn evaluate(
    mode: OperationMode,
    ports: &PortPair,
    limits: &DcdcLimits,
    calibration: &Calibration,
    off_timestamp: Option<u64>,
    now_ms: u64,
) -> StartDecision {
    if !backoff_elapsed(off_timestamp, now_ms, limits.restart_interval_ms) {
        return StartDecision::NoStart;
    }

    if limits::voltage_window_violated(limits, ports) {
        return StartDecision::NoStart;
    }

    let headroom = ports.high.voltage - ports.low.voltage;
    if headroom <= calibration.start_headroom_v {
        debug!(
            "start: headroom {:.2}V <= {:.2}V, not starting",
            headroom, calibration.start_headroom_v
        );
        return StartDecision::NoStart;
    }

    match mode {
        OperationMode::MppBuck => StartDecision::StartBuck,
        OperationMode::MppBoost => StartDecision::StartBoost,
        OperationMode::Nanogrid => {
            if ports.high.voltage >= calibration.nanogrid_bus_voltage {
                StartDecision::StartBuck
            } else {
                StartDecision::StartBoost
            }
        }
    }
}
