//! Port traits: the hexagonal boundary between the control core and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ChargerService (domain)
//! ```
//!
//! Driven adapters (ADC sensors, PWM half bridge, kill line, event sinks,
//! fault storage) implement these traits.  The
//! [`ChargerService`](super::service::ChargerService) consumes them via
//! generics, so the control core never touches hardware directly.

use crate::error::ActuatorError;
use crate::safety::FaultEntry;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Scaled measurements of one DC/DC stage.
///
/// Currents follow the port convention: positive when the converter
/// pushes power into the device on that port.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Measurements {
    pub hs_voltage: f32,
    pub hs_current: f32,
    pub ls_voltage: f32,
    pub ls_current: f32,
    /// `None` on boards without a MOSFET temperature sensor.
    pub mosfet_temperature: Option<f32>,
    /// The adapter has lost the converter: the values above are stale.
    pub sensor_fault: bool,
}

pub trait SensorPort {
    /// Read every channel once.  Must not block.
    fn read(&mut self) -> Measurements;
}

// ───────────────────────────────────────────────────────────────
// Half bridge (driven adapter: domain → PWM)
// ───────────────────────────────────────────────────────────────

/// Synchronous half bridge.  `duty` is the high-side on fraction, so
/// V_low ≈ duty · V_high in either direction.
pub trait HalfBridge {
    /// Enable the gate drivers and start switching at `duty`.
    fn start(&mut self, duty: f32) -> Result<(), ActuatorError>;

    /// Update the duty of a running bridge.
    fn set_duty(&mut self, duty: f32) -> Result<(), ActuatorError>;

    /// Stop switching and disable the gate drivers.
    fn stop(&mut self) -> Result<(), ActuatorError>;

    fn is_running(&self) -> bool;

    /// Duty currently applied, 0.0 when stopped.
    fn duty(&self) -> f32;

    /// Drive the low-side switch continuously on.  Irreversible use only.
    fn force_low_side_on(&mut self) -> Result<(), ActuatorError>;
}

// ───────────────────────────────────────────────────────────────
// Kill line (hardware-level disable)
// ───────────────────────────────────────────────────────────────

/// Gate-driver shutdown signal, independent of the PWM duty.
///
/// Methods take `&self` and must be callable from interrupt context.
pub trait KillLine {
    fn assert_kill(&self);
    fn release(&self);
    fn is_asserted(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured
/// [`ChargerEvent`](super::events::ChargerEvent)s through this port.
/// Adapters decide where they go (serial log, CAN, ...).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::ChargerEvent);
}

// ───────────────────────────────────────────────────────────────
// Fault recorder (driven adapter: domain → non-volatile log)
// ───────────────────────────────────────────────────────────────

/// Persists the reason for a fuse destruction.  Must complete before it
/// returns: the caller cuts its own power right after.
pub trait FaultRecorder {
    fn record(&mut self, entry: &FaultEntry) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// No room left for another entry.
    Full,
    /// The entry could not be serialized.
    Encode,
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Full => write!(f, "storage full"),
            Self::Encode => write!(f, "encoding failed"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
