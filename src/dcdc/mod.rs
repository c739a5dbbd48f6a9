//! DC/DC converter control core.
//!
//! [`Converter`] is the central entity: one instance per physical half
//! bridge, bound to its [`OperationMode`] at construction.  The tick
//! context calls [`Converter::control`] once per control period:
//!
//! ```text
//!   kill switch tripped / disabled ──▶ Off
//!   Off ──▶ start::evaluate ──▶ Mppt (initial duty V_low / V_high)
//!   running ──▶ low-power cutoff ──▶ Off (restart backoff)
//!           ──▶ cccv::evaluate ──▶ ConstantCurrent | ConstantVoltage | Derating
//!           ──▶ mppt::step ──▶ Mppt
//! ```
//!
//! The interrupt side never touches this struct.  It only writes the
//! atomic [`KillSwitch`], which `control` observes on entry.

pub mod cccv;
pub mod limits;
pub mod mppt;
pub mod start;

use core::fmt;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::HalfBridge;
use crate::config::{Calibration, DcdcLimits};
use crate::port::PortPair;
use crate::safety::KillSwitch;

use self::mppt::PerturbObserve;
use self::start::StartDecision;

// ───────────────────────────────────────────────────────────────
// Modes and states
// ───────────────────────────────────────────────────────────────

/// Which device sits on which port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationMode {
    /// Solar panel on the high side, battery on the low side.
    MppBuck,
    /// Battery on the high side, solar panel on the low side.
    MppBoost,
    /// DC bus on the high side, battery on the low side; direction
    /// follows the bus voltage.
    Nanogrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum ControlState {
    Off = 0,
    Mppt = 1,
    ConstantCurrent = 2,
    ConstantVoltage = 3,
    Derating = 4,
}

impl ControlState {
    /// True for the states entered by the CC/CV limiter.
    pub const fn is_limiting(self) -> bool {
        matches!(
            self,
            Self::ConstantCurrent | Self::ConstantVoltage | Self::Derating
        )
    }
}

impl fmt::Display for ControlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Off => "Off",
            Self::Mppt => "Mppt",
            Self::ConstantCurrent => "CC",
            Self::ConstantVoltage => "CV",
            Self::Derating => "Derating",
        };
        f.write_str(s)
    }
}

/// Power-flow direction of a running stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PowerDirection {
    /// High side → low side.
    Buck,
    /// Low side → high side.
    Boost,
}

impl PowerDirection {
    /// Sign of the duty change that raises output power.
    pub const fn output_sign(self) -> f32 {
        match self {
            Self::Buck => 1.0,
            Self::Boost => -1.0,
        }
    }
}

/// Valid duty-cycle interval of the half bridge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DutyRange {
    pub min: f32,
    pub max: f32,
}

impl DutyRange {
    pub fn clamp(self, duty: f32) -> f32 {
        if duty.is_nan() {
            return self.min;
        }
        duty.clamp(self.min, self.max)
    }
}

/// Why a running stage was switched off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    /// `enable` was cleared by a command.
    Disabled,
    /// The kill switch tripped; carries the fault mask.
    EmergencyStop(u8),
    /// Output power stayed below the minimum for the grace period.
    LowPower,
    /// The half bridge rejected a command.
    ActuatorFault,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::EmergencyStop(mask) => write!(f, "emergency stop (faults 0b{mask:06b})"),
            Self::LowPower => write!(f, "low output power"),
            Self::ActuatorFault => write!(f, "actuator fault"),
        }
    }
}

/// Result of one control tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Off, and stayed off.
    Idle,
    /// Switched on this tick.
    Started { direction: PowerDirection, duty: f32 },
    /// Running; `state` and `duty` are what was committed this tick.
    Running { state: ControlState, duty: f32 },
    /// Switched off this tick.
    Stopped(StopReason),
}

// ───────────────────────────────────────────────────────────────
// Converter
// ───────────────────────────────────────────────────────────────

pub struct Converter {
    mode: OperationMode,
    enable: bool,
    state: ControlState,
    direction: PowerDirection,
    mosfet_temperature: Option<f32>,
    mppt: PerturbObserve,
    /// Last duty committed to the half bridge, 0.0 while off.
    duty: f32,
    off_timestamp: Option<u64>,
    last_good_power_timestamp: Option<u64>,
    limits: DcdcLimits,
    calibration: Calibration,
}

impl Converter {
    /// Create an enabled converter in `Off`.  The limits and calibration
    /// are expected to be validated already.
    pub fn new(mode: OperationMode, limits: DcdcLimits, calibration: Calibration) -> Self {
        Self {
            mode,
            enable: true,
            state: ControlState::Off,
            direction: PowerDirection::Buck,
            mosfet_temperature: None,
            mppt: PerturbObserve::new(),
            duty: 0.0,
            off_timestamp: None,
            last_good_power_timestamp: None,
            limits,
            calibration,
        }
    }

    /// Run one control tick.
    ///
    /// Commits at most one duty write to `bridge`.  Never blocks and never
    /// allocates.
    pub fn control(
        &mut self,
        ports: &PortPair,
        now_ms: u64,
        kill: &KillSwitch,
        bridge: &mut impl HalfBridge,
    ) -> TickOutcome {
        if let Some(outcome) = self.hold_off_if_disabled(now_ms, kill, bridge) {
            return outcome;
        }

        if self.state == ControlState::Off {
            return match self.start_direction(ports, now_ms) {
                Some(direction) => self.start(direction, ports, now_ms, bridge),
                None => TickOutcome::Idle,
            };
        }

        let power = self.output_power(ports);
        if power >= self.limits.output_power_min {
            self.last_good_power_timestamp = Some(now_ms);
        } else {
            let good = self.last_good_power_timestamp.unwrap_or(now_ms);
            if now_ms.saturating_sub(good) > self.calibration.low_power_grace_ms {
                return self.stop(now_ms, StopReason::LowPower, bridge);
            }
        }

        let previous = self.state;
        if !self.apply_limiter(ports) {
            if previous.is_limiting() {
                // Back from a limit: the stored power belongs to a
                // different operating point.
                self.mppt.reset(power);
            }
            self.duty = self.mppt.step(
                power,
                self.duty,
                self.calibration.mppt_step,
                self.duty_range(),
            );
            self.state = ControlState::Mppt;
        }

        self.commit(previous, now_ms, bridge)
    }

    /// Bench test: ramp the buck duty towards 50 % in `mppt_step`
    /// increments.  Honors `enable`, the kill switch and the CC/CV limiter
    /// but skips MPPT and the low-power cutoff.
    pub fn test_ramp(
        &mut self,
        ports: &PortPair,
        now_ms: u64,
        kill: &KillSwitch,
        bridge: &mut impl HalfBridge,
    ) -> TickOutcome {
        const TARGET: f32 = 0.5;

        if let Some(outcome) = self.hold_off_if_disabled(now_ms, kill, bridge) {
            return outcome;
        }

        if self.state == ControlState::Off {
            return match self.start_direction(ports, now_ms) {
                Some(_) => self.start(PowerDirection::Buck, ports, now_ms, bridge),
                None => TickOutcome::Idle,
            };
        }

        let previous = self.state;
        if !self.apply_limiter(ports) {
            let step = self.calibration.mppt_step;
            let next = if self.duty < TARGET - step {
                self.duty + step
            } else if self.duty > TARGET + step {
                self.duty - step
            } else {
                TARGET
            };
            self.duty = self.duty_range().clamp(next);
            self.state = ControlState::Mppt;
        }

        self.commit(previous, now_ms, bridge)
    }

    // ── Setters ───────────────────────────────────────────────

    /// `false` switches the stage off on the next tick.  `true` alone does
    /// not override a tripped kill switch.
    pub fn set_enable(&mut self, enable: bool) {
        self.enable = enable;
    }

    pub fn set_limits(&mut self, limits: DcdcLimits) {
        self.limits = limits;
    }

    pub fn set_calibration(&mut self, calibration: Calibration) {
        self.calibration = calibration;
    }

    pub fn set_mosfet_temperature(&mut self, temperature: Option<f32>) {
        self.mosfet_temperature = temperature;
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn mode(&self) -> OperationMode {
        self.mode
    }

    pub fn enable(&self) -> bool {
        self.enable
    }

    pub fn state(&self) -> ControlState {
        self.state
    }

    /// Direction of the current (or most recent) run.
    pub fn direction(&self) -> PowerDirection {
        self.direction
    }

    pub fn duty(&self) -> f32 {
        self.duty
    }

    pub fn mosfet_temperature(&self) -> Option<f32> {
        self.mosfet_temperature
    }

    pub fn mppt(&self) -> &PerturbObserve {
        &self.mppt
    }

    pub fn off_timestamp(&self) -> Option<u64> {
        self.off_timestamp
    }

    pub fn last_good_power_timestamp(&self) -> Option<u64> {
        self.last_good_power_timestamp
    }

    pub fn limits(&self) -> &DcdcLimits {
        &self.limits
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn duty_range(&self) -> DutyRange {
        DutyRange {
            min: self.calibration.duty_min,
            max: self.calibration.duty_max,
        }
    }

    /// Power delivered to the sink port for the current direction (W).
    pub fn output_power(&self, ports: &PortPair) -> f32 {
        match self.direction {
            PowerDirection::Buck => ports.low.power,
            PowerDirection::Boost => ports.high.power,
        }
    }

    // ── Internal ──────────────────────────────────────────────

    /// Latch the kill switch into `enable` and keep the stage off while
    /// disabled.  Returns `None` when the tick may proceed.
    fn hold_off_if_disabled(
        &mut self,
        now_ms: u64,
        kill: &KillSwitch,
        bridge: &mut impl HalfBridge,
    ) -> Option<TickOutcome> {
        if kill.is_tripped() && self.enable {
            warn!("dcdc: kill switch tripped (faults 0b{:06b})", kill.faults());
            self.enable = false;
        }
        if self.enable {
            return None;
        }

        if self.state != ControlState::Off {
            let reason = if kill.is_tripped() {
                StopReason::EmergencyStop(kill.faults())
            } else {
                StopReason::Disabled
            };
            return Some(self.stop(now_ms, reason, bridge));
        }

        if bridge.is_running() {
            if let Err(e) = bridge.stop() {
                error!("dcdc: failed to stop half bridge: {e}");
            }
        }
        self.duty = 0.0;
        Some(TickOutcome::Idle)
    }

    fn start_direction(&self, ports: &PortPair, now_ms: u64) -> Option<PowerDirection> {
        let decision = start::evaluate(
            self.mode,
            ports,
            &self.limits,
            &self.calibration,
            self.off_timestamp,
            now_ms,
        );
        let direction = match decision {
            StartDecision::StartBuck => PowerDirection::Buck,
            StartDecision::StartBoost => PowerDirection::Boost,
            StartDecision::NoStart => return None,
        };
        // Current and temperature would put the stage straight into a
        // limiting regime; wait for them to settle.
        if limits::any_exceeded(&self.limits, ports, self.mosfet_temperature) {
            debug!("dcdc: start deferred, limit exceeded");
            return None;
        }
        Some(direction)
    }

    fn start(
        &mut self,
        direction: PowerDirection,
        ports: &PortPair,
        now_ms: u64,
        bridge: &mut impl HalfBridge,
    ) -> TickOutcome {
        // Match the present voltage ratio so the stage starts without a
        // current surge.
        let duty = self.duty_range().clamp(ports.low.voltage / ports.high.voltage);

        if let Err(e) = bridge.start(duty) {
            error!("dcdc: half bridge start failed: {e}");
            return self.stop(now_ms, StopReason::ActuatorFault, bridge);
        }

        self.direction = direction;
        self.duty = duty;
        self.state = ControlState::Mppt;
        self.mppt.restart(self.output_power(ports), direction);
        self.last_good_power_timestamp = Some(now_ms);

        info!(
            "dcdc: {:?} start, hs {:.2}V ls {:.2}V, duty {:.3}",
            direction, ports.high.voltage, ports.low.voltage, duty
        );
        TickOutcome::Started { direction, duty }
    }

    /// Run the limiter.  Returns `true` if a limiting regime took over.
    fn apply_limiter(&mut self, ports: &PortPair) -> bool {
        match cccv::evaluate(
            self.direction,
            self.duty,
            ports,
            self.mosfet_temperature,
            &self.limits,
            &self.calibration,
            self.duty_range(),
        ) {
            Some(limiting) => {
                self.state = limiting.state;
                self.duty = limiting.duty;
                true
            }
            None => false,
        }
    }

    fn commit(
        &mut self,
        previous: ControlState,
        now_ms: u64,
        bridge: &mut impl HalfBridge,
    ) -> TickOutcome {
        if let Err(e) = bridge.set_duty(self.duty) {
            error!("dcdc: duty write failed: {e}");
            return self.stop(now_ms, StopReason::ActuatorFault, bridge);
        }
        if previous != self.state {
            info!("dcdc: {} -> {}", previous, self.state);
        }
        TickOutcome::Running {
            state: self.state,
            duty: self.duty,
        }
    }

    fn stop(&mut self, now_ms: u64, reason: StopReason, bridge: &mut impl HalfBridge) -> TickOutcome {
        if let Err(e) = bridge.stop() {
            // The kill line still gates the drivers.
            error!("dcdc: failed to stop half bridge: {e}");
        }
        self.duty = 0.0;
        self.state = ControlState::Off;
        self.off_timestamp = Some(now_ms);
        info!("dcdc: stopped at {now_ms} ms: {reason}");
        TickOutcome::Stopped(reason)
    }
}
