//! Safety layer.
//!
//! Two execution contexts share the power stage:
//!
//! ```text
//! ┌──────────────────┐  emergency_stop   ┌────────────┐  is_tripped  ┌───────────┐
//! │ comparator ISR   │──────────────────▶│ KillSwitch │◀─────────────│ tick      │
//! │ ADC / timer ISR  │──▶ KillLine (HW)  │ (AtomicU8) │              │ (control) │
//! └──────────────────┘                   └────────────┘              └───────────┘
//! ```
//!
//! The interrupt side is the only writer of the fault mask.  It asserts the
//! hardware kill line first, so the gate drivers are cut even if the tick is
//! stalled or corrupted, then records the fault.  The tick only reads the
//! mask and latches it into `Converter::enable` on its next iteration.
//! Nothing here takes a lock.
//!
//! Fuse destruction is the one irreversible action and lives outside the
//! control state machine altogether.  It is also the only code that takes
//! the hardware line away from the interrupt side: it releases the line
//! and keeps it released so the low-side switch can conduct.

use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

use crate::app::ports::{HalfBridge, KillLine};
use crate::config::Calibration;
use crate::error::{ActuatorError, SafetyFault};

// ───────────────────────────────────────────────────────────────
// Kill switch
// ───────────────────────────────────────────────────────────────

/// Interrupt-owned disable flag, one bit per [`SafetyFault`].
pub struct KillSwitch {
    faults: AtomicU8,
    /// Set for good once fuse destruction needs the gate drivers.
    line_held: AtomicBool,
}

impl KillSwitch {
    pub const fn new() -> Self {
        Self {
            faults: AtomicU8::new(0),
            line_held: AtomicBool::new(false),
        }
    }

    /// Cut the power stage.  ISR safe: no lock, no logging, no allocation.
    ///
    /// Idempotent: a repeated call with the same fault changes nothing, a
    /// different fault only adds its bit.  While the line is held released
    /// for fuse destruction only the bit is recorded.
    #[inline]
    pub fn emergency_stop(&self, fault: SafetyFault, line: &impl KillLine) {
        if !self.line_held.load(Ordering::Acquire) {
            line.assert_kill();
        }
        self.faults.fetch_or(fault.mask(), Ordering::Release);
    }

    pub fn is_tripped(&self) -> bool {
        self.faults.load(Ordering::Acquire) != 0
    }

    /// Accumulated fault mask, 0 when armed.
    pub fn faults(&self) -> u8 {
        self.faults.load(Ordering::Acquire)
    }

    /// True if `fault` contributed to the trip.
    pub fn has_fault(&self, fault: SafetyFault) -> bool {
        self.faults() & fault.mask() != 0
    }

    /// Clear the faults and release the hardware line.  Only the explicit
    /// re-enable command calls this; the tick never does.
    ///
    /// A trip landing between the clear and the release is caught by the
    /// final check and puts the line back.
    pub fn rearm(&self, line: &impl KillLine) {
        self.faults.store(0, Ordering::Release);
        if self.line_held.load(Ordering::Acquire) {
            return;
        }
        line.release();
        if self.is_tripped() {
            line.assert_kill();
        }
    }

    /// Record `fault` and release the line so the gate drivers can hold
    /// the low-side switch on.  Later trips keep adding bits but no longer
    /// assert the line.
    fn hold_line_released(&self, fault: SafetyFault, line: &impl KillLine) {
        self.line_held.store(true, Ordering::Release);
        self.faults.fetch_or(fault.mask(), Ordering::Release);
        line.release();
    }

    /// Undo [`hold_line_released`](Self::hold_line_released) and cut the
    /// stage again.
    fn end_line_hold(&self, line: &impl KillLine) {
        self.line_held.store(false, Ordering::Release);
        line.assert_kill();
    }
}

impl Default for KillSwitch {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────────────────────────────────────────
// Fast trip (comparator-style check on raw samples)
// ───────────────────────────────────────────────────────────────

/// One fresh ADC sample, as seen from the DMA-complete interrupt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FastSample {
    pub hs_voltage: f32,
    pub ls_voltage: f32,
    pub ls_current: f32,
}

/// Check a raw sample against the hard trip thresholds.  These sit well
/// above the CC/CV limits; a hit means the control loop has already lost.
pub fn fast_trip(sample: &FastSample, calibration: &Calibration) -> Option<SafetyFault> {
    if sample.ls_current.abs() > calibration.fast_trip_current {
        Some(SafetyFault::Overcurrent)
    } else if sample.hs_voltage > calibration.fast_trip_voltage
        || sample.ls_voltage > calibration.fast_trip_voltage
    {
        Some(SafetyFault::Overvoltage)
    } else {
        None
    }
}

// ───────────────────────────────────────────────────────────────
// Tick heartbeat
// ───────────────────────────────────────────────────────────────

/// Stall detector for the control tick.
///
/// The tick calls [`beat`](Self::beat) every iteration; a timer interrupt
/// calls [`check`](Self::check).  Timestamps are kept as wrapping 32-bit
/// milliseconds because the target has no 64-bit atomics.
pub struct TickHeartbeat {
    last_ms: AtomicU32,
    armed: AtomicBool,
}

impl TickHeartbeat {
    pub const fn new() -> Self {
        Self {
            last_ms: AtomicU32::new(0),
            armed: AtomicBool::new(false),
        }
    }

    pub fn beat(&self, now_ms: u64) {
        self.last_ms.store(now_ms as u32, Ordering::Release);
        self.armed.store(true, Ordering::Release);
    }

    /// Trip [`SafetyFault::TickStalled`] if the last beat is older than
    /// `stall_ms`.  Does nothing before the first beat.  Returns `true` on
    /// a trip.
    pub fn check(&self, now_ms: u64, stall_ms: u64, kill: &KillSwitch, line: &impl KillLine) -> bool {
        if !self.armed.load(Ordering::Acquire) {
            return false;
        }
        let age = (now_ms as u32).wrapping_sub(self.last_ms.load(Ordering::Acquire));
        if u64::from(age) > stall_ms {
            kill.emergency_stop(SafetyFault::TickStalled, line);
            return true;
        }
        false
    }
}

impl Default for TickHeartbeat {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────────────────────────────────────────
// Fuse destruction
// ───────────────────────────────────────────────────────────────

/// Switch the low-side MOSFET permanently on to blow the battery fuse.
///
/// The kill line sits in series with the gate enable, so it is released
/// and held released for the rest of the stage's life; the trip stays
/// visible in the fault mask.  Returns `KillLineAsserted` if the line
/// could not be released, since the low side then never conducts.
///
/// The caller must have persisted the reason already: once the fuse blows
/// the controller may lose its own supply.
pub fn fuse_destruction(
    bridge: &mut impl HalfBridge,
    kill: &KillSwitch,
    line: &impl KillLine,
) -> Result<(), ActuatorError> {
    bridge.stop()?;
    kill.hold_line_released(SafetyFault::ShortedHighSide, line);
    if let Err(e) = bridge.force_low_side_on() {
        kill.end_line_hold(line);
        return Err(e);
    }
    // An interrupt that read the hold flag just before it was set may
    // have asserted the line again.
    line.release();
    if line.is_asserted() {
        return Err(ActuatorError::KillLineAsserted);
    }
    Ok(())
}

/// Record persisted before a fuse destruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultEntry {
    pub timestamp_ms: u64,
    /// Kill switch mask plus the triggering fault.
    pub faults: u8,
    pub reason: heapless::String<48>,
    pub hs_voltage: f32,
    pub ls_voltage: f32,
    pub ls_current: f32,
}

impl FaultEntry {
    /// Longest postcard encoding of an entry.
    pub const MAX_ENCODED_LEN: usize = 80;

    /// Encode with postcard into `buf`, returning the used prefix.
    pub fn encode<'a>(&self, buf: &'a mut [u8]) -> Result<&'a mut [u8], postcard::Error> {
        postcard::to_slice(self, buf)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}
