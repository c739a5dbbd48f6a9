//! Mock hardware adapters for integration tests.
//!
//! Records every half-bridge and recorder call in a shared journal so
//! tests can assert on the full command history, including the order of
//! fault recording and fuse actuation.

use std::cell::RefCell;
use std::rc::Rc;

use solar_charger::app::events::ChargerEvent;
use solar_charger::app::ports::{
    EventSink, FaultRecorder, HalfBridge, Measurements, SensorPort, StorageError,
};
use solar_charger::error::ActuatorError;
use solar_charger::safety::FaultEntry;

// ── Call journal ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Start(f32),
    SetDuty(f32),
    Stop,
    ForceLowSideOn,
    Record(u64),
}

pub type Journal = Rc<RefCell<Vec<Call>>>;

// ── MockHw ────────────────────────────────────────────────────

/// Sensor + half bridge double.  Tests set `meas` directly before each
/// tick.
pub struct MockHw {
    pub meas: Measurements,
    pub journal: Journal,
    pub fail_writes: bool,
    running: bool,
    duty: f32,
}

#[allow(dead_code)]
impl MockHw {
    pub fn new() -> Self {
        Self::with_journal(Journal::default())
    }

    pub fn with_journal(journal: Journal) -> Self {
        Self {
            meas: Measurements::default(),
            journal,
            fail_writes: false,
            running: false,
            duty: 0.0,
        }
    }

    /// Set a buck operating point: `ls_current` flows into the battery,
    /// the panel side sees the mirrored power.
    pub fn set_buck(&mut self, hs_voltage: f32, ls_voltage: f32, ls_current: f32) {
        self.meas = Measurements {
            hs_voltage,
            hs_current: -ls_current * ls_voltage / hs_voltage,
            ls_voltage,
            ls_current,
            mosfet_temperature: None,
            sensor_fault: false,
        };
    }

    /// Set a boost operating point: `hs_current` flows into the bus.
    pub fn set_boost(&mut self, hs_voltage: f32, ls_voltage: f32, hs_current: f32) {
        self.meas = Measurements {
            hs_voltage,
            hs_current,
            ls_voltage,
            ls_current: -hs_current * hs_voltage / ls_voltage,
            mosfet_temperature: None,
            sensor_fault: false,
        };
    }

    pub fn calls(&self) -> Vec<Call> {
        self.journal.borrow().clone()
    }

    pub fn last_call(&self) -> Option<Call> {
        self.journal.borrow().last().cloned()
    }

    pub fn clear(&mut self) {
        self.journal.borrow_mut().clear();
    }

    fn push(&self, call: Call) {
        self.journal.borrow_mut().push(call);
    }
}

impl Default for MockHw {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorPort for MockHw {
    fn read(&mut self) -> Measurements {
        self.meas
    }
}

impl HalfBridge for MockHw {
    fn start(&mut self, duty: f32) -> Result<(), ActuatorError> {
        self.push(Call::Start(duty));
        self.running = true;
        self.duty = duty;
        Ok(())
    }

    fn set_duty(&mut self, duty: f32) -> Result<(), ActuatorError> {
        if self.fail_writes {
            return Err(ActuatorError::PwmWriteFailed);
        }
        self.push(Call::SetDuty(duty));
        self.duty = duty;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ActuatorError> {
        self.push(Call::Stop);
        self.running = false;
        self.duty = 0.0;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn duty(&self) -> f32 {
        self.duty
    }

    fn force_low_side_on(&mut self) -> Result<(), ActuatorError> {
        self.push(Call::ForceLowSideOn);
        Ok(())
    }
}

// ── Fault recorder ────────────────────────────────────────────

pub struct JournalRecorder {
    journal: Journal,
    fail: bool,
    pub entries: Vec<FaultEntry>,
}

#[allow(dead_code)]
impl JournalRecorder {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            fail: false,
            entries: Vec::new(),
        }
    }

    pub fn failing(journal: Journal) -> Self {
        Self {
            fail: true,
            ..Self::new(journal)
        }
    }
}

impl FaultRecorder for JournalRecorder {
    fn record(&mut self, entry: &FaultEntry) -> Result<(), StorageError> {
        if self.fail {
            return Err(StorageError::IoError);
        }
        self.journal
            .borrow_mut()
            .push(Call::Record(entry.timestamp_ms));
        self.entries.push(entry.clone());
        Ok(())
    }
}

// ── Event sink ────────────────────────────────────────────────

/// Simple event sink that collects every event.
pub struct RecordingSink {
    pub events: Vec<ChargerEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn count(&self, pred: impl Fn(&ChargerEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &ChargerEvent) {
        self.events.push(event.clone());
    }
}
