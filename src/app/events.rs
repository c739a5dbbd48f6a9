//! Outbound application events.
//!
//! The [`ChargerService`](super::service::ChargerService) emits these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on
//! the other side decide what to do with them: log to serial, publish on
//! the telemetry bus, etc.

use serde::Serialize;

use crate::dcdc::{ControlState, OperationMode, PowerDirection, StopReason};
use crate::error::{Error, SafetyFault};
use crate::port::PowerPort;

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum ChargerEvent {
    /// The power stage switched on.
    Started { direction: PowerDirection, duty: f32 },

    /// The control state changed.
    StateChanged { from: ControlState, to: ControlState },

    /// The power stage switched off.
    Stopped(StopReason),

    /// The stage sacrificed itself; nothing follows.
    FuseDestruction(SafetyFault),

    /// Periodic telemetry snapshot.
    Telemetry(TelemetryData),

    /// A command carried an invalid configuration and was ignored.
    ConfigRejected(Error),
}

/// A point-in-time telemetry snapshot suitable for logging or transmission.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryData {
    pub state: ControlState,
    pub enable: bool,
    pub mode: OperationMode,
    pub direction: PowerDirection,
    pub duty: f32,
    pub high: PowerPort,
    pub low: PowerPort,
    pub mosfet_temperature: Option<f32>,
    pub previous_power: f32,
    pub step_sign: f32,
    pub off_timestamp_ms: Option<u64>,
    pub last_good_power_timestamp_ms: Option<u64>,
    pub fault_flags: u8,
}
