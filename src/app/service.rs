//! Application service: the hexagonal core.
//!
//! [`ChargerService`] owns the [`Converter`], the two port records and the
//! live configuration, and borrows the interrupt-shared [`KillSwitch`],
//! [`TickHeartbeat`] and hardware [`KillLine`].  All I/O flows through
//! port traits injected at call sites, making the entire service testable
//! with mock adapters.
//!
//! ```text
//!  SensorPort ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!                 │      ChargerService       │
//!  HalfBridge ◀── │  Converter · KillSwitch   │ ──▶ FaultRecorder
//!                 └──────────────────────────┘
//! ```

use log::{error, info, warn};

use crate::config::ChargerConfig;
use crate::dcdc::{ControlState, Converter, TickOutcome};
use crate::error::{Result, SafetyFault};
use crate::port::PortPair;
use crate::safety::{self, FastSample, FaultEntry, KillSwitch, TickHeartbeat};

use super::commands::ChargerCommand;
use super::events::{ChargerEvent, TelemetryData};
use super::ports::{EventSink, FaultRecorder, HalfBridge, KillLine, SensorPort};

// ───────────────────────────────────────────────────────────────
// ChargerService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates one DC/DC stage.
pub struct ChargerService<'k, L: KillLine> {
    converter: Converter,
    ports: PortPair,
    kill: &'k KillSwitch,
    heartbeat: &'k TickHeartbeat,
    line: &'k L,
    config: ChargerConfig,
    test_mode: bool,
    tick_count: u64,
    last_telemetry_ms: Option<u64>,
}

impl<'k, L: KillLine> ChargerService<'k, L> {
    /// Construct the service.  `ports` carries the hardware ratings of the
    /// attached devices; measurements are filled in by [`tick`](Self::tick).
    ///
    /// Rejects an invalid configuration.
    pub fn new(
        config: ChargerConfig,
        ports: PortPair,
        kill: &'k KillSwitch,
        heartbeat: &'k TickHeartbeat,
        line: &'k L,
    ) -> Result<Self> {
        config.validate()?;
        let converter = Converter::new(config.operation_mode, config.limits, config.calibration);
        info!(
            "ChargerService: {:?}, loop {} ms",
            config.operation_mode, config.control_loop_interval_ms
        );
        Ok(Self {
            converter,
            ports,
            kill,
            heartbeat,
            line,
            config,
            test_mode: false,
            tick_count: 0,
            last_telemetry_ms: None,
        })
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one control cycle: heartbeat → read sensors → sensor fault and
    /// fast trip → control → events.
    ///
    /// The `hw` parameter satisfies **both** [`SensorPort`] and
    /// [`HalfBridge`], which avoids a double mutable borrow while keeping
    /// the port boundary explicit.
    pub fn tick(
        &mut self,
        now_ms: u64,
        hw: &mut (impl SensorPort + HalfBridge),
        sink: &mut impl EventSink,
    ) -> TickOutcome {
        self.tick_count += 1;
        self.heartbeat.beat(now_ms);

        let m = hw.read();
        self.ports.high.update(m.hs_voltage, m.hs_current);
        self.ports.low.update(m.ls_voltage, m.ls_current);
        self.converter.set_mosfet_temperature(m.mosfet_temperature);

        if m.sensor_fault {
            if !self.kill.has_fault(SafetyFault::SensorFailure) {
                error!("Sensor front end lost, stopping");
            }
            self.kill.emergency_stop(SafetyFault::SensorFailure, self.line);
        }

        let sample = FastSample {
            hs_voltage: m.hs_voltage,
            ls_voltage: m.ls_voltage,
            ls_current: m.ls_current,
        };
        if let Some(fault) = safety::fast_trip(&sample, &self.config.calibration) {
            if !self.kill.has_fault(fault) {
                error!("Fast trip: {fault}");
            }
            self.kill.emergency_stop(fault, self.line);
        }

        let prev_state = self.converter.state();
        let outcome = if self.test_mode {
            self.converter.test_ramp(&self.ports, now_ms, self.kill, hw)
        } else {
            self.converter.control(&self.ports, now_ms, self.kill, hw)
        };

        match outcome {
            TickOutcome::Started { direction, duty } => {
                sink.emit(&ChargerEvent::Started { direction, duty });
            }
            TickOutcome::Stopped(reason) => sink.emit(&ChargerEvent::Stopped(reason)),
            TickOutcome::Idle | TickOutcome::Running { .. } => {}
        }

        let new_state = self.converter.state();
        if new_state != prev_state {
            sink.emit(&ChargerEvent::StateChanged {
                from: prev_state,
                to: new_state,
            });
        }
        outcome
    }

    /// Emit a telemetry snapshot if `telemetry_interval_ms` has passed
    /// since the last one.  Returns `true` if one was emitted.
    pub fn publish_telemetry(&mut self, now_ms: u64, sink: &mut impl EventSink) -> bool {
        let interval = u64::from(self.config.telemetry_interval_ms);
        if self
            .last_telemetry_ms
            .is_some_and(|last| now_ms.saturating_sub(last) < interval)
        {
            return false;
        }
        self.last_telemetry_ms = Some(now_ms);
        sink.emit(&ChargerEvent::Telemetry(self.build_telemetry()));
        true
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command.
    pub fn handle_command(&mut self, cmd: ChargerCommand, sink: &mut impl EventSink) {
        match cmd {
            ChargerCommand::SetEnable(true) => {
                if self.kill.is_tripped() {
                    warn!(
                        "Re-arming kill switch (faults 0b{:06b})",
                        self.kill.faults()
                    );
                    self.kill.rearm(self.line);
                }
                self.converter.set_enable(true);
                info!("DC/DC enabled");
            }
            ChargerCommand::SetEnable(false) => {
                self.converter.set_enable(false);
                info!("DC/DC disabled");
            }
            ChargerCommand::UpdateLimits(limits) => match limits.validate() {
                Ok(()) => {
                    self.converter.set_limits(limits);
                    self.config.limits = limits;
                    info!("Limits updated at runtime");
                }
                Err(e) => {
                    warn!("Limits rejected: {e}");
                    sink.emit(&ChargerEvent::ConfigRejected(e));
                }
            },
            ChargerCommand::UpdateCalibration(calibration) => match calibration.validate() {
                Ok(()) => {
                    self.converter.set_calibration(calibration);
                    self.config.calibration = calibration;
                    info!("Calibration updated at runtime");
                }
                Err(e) => {
                    warn!("Calibration rejected: {e}");
                    sink.emit(&ChargerEvent::ConfigRejected(e));
                }
            },
        }
    }

    /// Switch between the normal control loop and the bench duty ramp.
    pub fn set_test_mode(&mut self, on: bool) {
        if on != self.test_mode {
            info!("Test mode {}", if on { "on" } else { "off" });
        }
        self.test_mode = on;
    }

    // ── Fuse destruction ──────────────────────────────────────

    /// Blow the battery fuse to protect it from a shorted high-side switch.
    ///
    /// The reason is recorded through `recorder` first.  A failed record is
    /// logged and destruction proceeds anyway.  A tripped kill line is
    /// released for it; the fault mask keeps the trip.  Consumes the
    /// service: a sacrificed stage cannot be controlled again.
    pub fn fuse_destruction(
        self,
        reason: &str,
        now_ms: u64,
        bridge: &mut impl HalfBridge,
        recorder: &mut impl FaultRecorder,
        sink: &mut impl EventSink,
    ) -> SacrificedStage {
        let fault = SafetyFault::ShortedHighSide;

        let mut text = heapless::String::new();
        for c in reason.chars() {
            if text.push(c).is_err() {
                break;
            }
        }
        let entry = FaultEntry {
            timestamp_ms: now_ms,
            faults: self.kill.faults() | fault.mask(),
            reason: text,
            hs_voltage: self.ports.high.voltage,
            ls_voltage: self.ports.low.voltage,
            ls_current: self.ports.low.current,
        };

        if let Err(e) = recorder.record(&entry) {
            error!("Fault record failed ({e}), destroying fuse anyway");
        }

        error!("FUSE DESTRUCTION: {} ({})", fault, entry.reason);
        let actuated = match safety::fuse_destruction(bridge, self.kill, self.line) {
            Ok(()) => true,
            Err(e) => {
                error!("Fuse destruction actuation failed: {e}");
                false
            }
        };
        sink.emit(&ChargerEvent::FuseDestruction(fault));

        SacrificedStage { entry, actuated }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Build a telemetry snapshot from the live converter state.
    pub fn build_telemetry(&self) -> TelemetryData {
        let c = &self.converter;
        TelemetryData {
            state: c.state(),
            enable: c.enable(),
            mode: c.mode(),
            direction: c.direction(),
            duty: c.duty(),
            high: self.ports.high,
            low: self.ports.low,
            mosfet_temperature: c.mosfet_temperature(),
            previous_power: c.mppt().previous_power(),
            step_sign: c.mppt().step_sign(),
            off_timestamp_ms: c.off_timestamp(),
            last_good_power_timestamp_ms: c.last_good_power_timestamp(),
            fault_flags: self.kill.faults(),
        }
    }

    pub fn state(&self) -> ControlState {
        self.converter.state()
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    pub fn ports(&self) -> &PortPair {
        &self.ports
    }

    pub fn config(&self) -> &ChargerConfig {
        &self.config
    }

    /// Total control ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }
}

/// What remains of a stage after [`ChargerService::fuse_destruction`].
/// Exposes the recorded fault and nothing that could drive the bridge.
#[derive(Debug)]
pub struct SacrificedStage {
    entry: FaultEntry,
    actuated: bool,
}

impl SacrificedStage {
    pub fn entry(&self) -> &FaultEntry {
        &self.entry
    }

    /// Whether the low-side switch was actually forced on.
    pub fn actuated(&self) -> bool {
        self.actuated
    }
}
