//! Unified error types for the charge controller firmware.
//!
//! A single `Error` enum that the configuration and actuator boundaries
//! convert into. All types are `Copy` so they can be handed across the
//! control loop and the interrupt-side safety path without allocation.
//! [`SafetyFault`] is a bitmask value carried by the kill switch, not an
//! error returned from calls.
//!
//! Note that soft limit events (CC/CV/derating), low-power cut-off and
//! implausible start conditions are *not* errors: they are ordinary
//! control states and never show up here.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A half-bridge or gate-driver command failed.
    Actuator(ActuatorError),
    /// Configuration is invalid. The message names the offending field.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// PWM compare register write failed.
    PwmWriteFailed,
    /// Gate-driver enable GPIO write failed.
    GpioWriteFailed,
    /// The hardware kill line still cuts the gate drivers.
    KillLineAsserted,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PwmWriteFailed => write!(f, "PWM write failed"),
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
            Self::KillLineAsserted => write!(f, "kill line asserted"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Safety faults
// ---------------------------------------------------------------------------

/// Catastrophic faults handled by the safety layer.
///
/// Accumulated as a bitmask inside the [`KillSwitch`](crate::safety::KillSwitch)
/// so that several faults tripping in the same instant are all visible in
/// telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SafetyFault {
    /// Emergency stop requested from outside the control core.
    External = 0b0000_0001,
    /// Comparator / fast ADC path saw a current beyond the safe margin.
    Overcurrent = 0b0000_0010,
    /// Comparator / fast ADC path saw a voltage beyond the safe margin.
    Overvoltage = 0b0000_0100,
    /// The control tick stopped beating.
    TickStalled = 0b0000_1000,
    /// High-side switch suspected shorted (battery overcharge risk).
    ShortedHighSide = 0b0001_0000,
    /// The sensor front end stopped delivering conversions.
    SensorFailure = 0b0010_0000,
}

impl SafetyFault {
    pub const ALL: [Self; 6] = [
        Self::External,
        Self::Overcurrent,
        Self::Overvoltage,
        Self::TickStalled,
        Self::ShortedHighSide,
        Self::SensorFailure,
    ];

    /// Return the bitmask for this fault.
    pub const fn mask(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for SafetyFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::External => write!(f, "external emergency stop"),
            Self::Overcurrent => write!(f, "overcurrent"),
            Self::Overvoltage => write!(f, "overvoltage"),
            Self::TickStalled => write!(f, "control tick stalled"),
            Self::ShortedHighSide => write!(f, "shorted high-side switch"),
            Self::SensorFailure => write!(f, "sensor read failure"),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
