//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (telemetry bus,
//! serial console) that the
//! [`ChargerService`](super::service::ChargerService) interprets and acts
//! upon.  Fuse destruction is deliberately not a command: it consumes the
//! service, see
//! [`ChargerService::fuse_destruction`](super::service::ChargerService::fuse_destruction).

use crate::config::{Calibration, DcdcLimits};

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone)]
pub enum ChargerCommand {
    /// `false` switches the stage off on the next tick.  `true` also
    /// re-arms a tripped kill switch.
    SetEnable(bool),

    /// Replace the electrical limits (validated first).
    UpdateLimits(DcdcLimits),

    /// Replace the control-loop calibration (validated first).
    UpdateCalibration(Calibration),
}
