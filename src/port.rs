//! Electrical port records.
//!
//! A [`PowerPort`] is one terminal of the DC/DC stage.  The sensor adapter
//! writes the measurements; the control core only reads them.  The
//! ratings `voltage_max` / `current_max` are extra ceilings on top of
//! [`DcdcLimits`](crate::config::DcdcLimits); derating works on the duty,
//! not on these.
//!
//! Sign convention: `current` is positive when power flows from the
//! converter into the device attached to the port (the port sinks).  In
//! buck operation the low side is positive and the high side negative;
//! boost is the mirror image.  The core never flips these signs.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PowerPort {
    /// Terminal voltage (V).
    pub voltage: f32,
    /// Terminal current (A), see module docs for the sign.
    pub current: f32,
    /// `voltage * current` (W), same sign as `current`.
    pub power: f32,
    /// Hardware rating of the attached device (V).
    pub voltage_max: f32,
    /// Hardware rating of the attached device (A, magnitude).
    pub current_max: f32,
}

impl PowerPort {
    pub const fn new(voltage_max: f32, current_max: f32) -> Self {
        Self {
            voltage: 0.0,
            current: 0.0,
            power: 0.0,
            voltage_max,
            current_max,
        }
    }

    /// Store a fresh measurement and derive `power` from it.
    pub fn update(&mut self, voltage: f32, current: f32) {
        self.voltage = voltage;
        self.current = current;
        self.power = voltage * current;
    }
}

/// The two terminals of one DC/DC stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PortPair {
    /// High-voltage side (solar input in MPPT buck mode).
    pub high: PowerPort,
    /// Low-voltage, inductor side (battery in MPPT buck mode).
    pub low: PowerPort,
}

impl PortPair {
    pub const fn new(high: PowerPort, low: PowerPort) -> Self {
        Self { high, low }
    }
}
