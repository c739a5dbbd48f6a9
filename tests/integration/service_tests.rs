//! Integration tests for the ChargerService → Converter → half bridge
//! pipeline.
//!
//! These run on the host (x86_64) and drive the full tick (sensor read,
//! fast trip, control, events) against the mock adapters.

use crate::mock_hw::{Call, JournalRecorder, MockHw, RecordingSink};

use solar_charger::adapters::kill_line::SimKillLine;
use solar_charger::app::commands::ChargerCommand;
use solar_charger::app::events::ChargerEvent;
use solar_charger::app::ports::KillLine;
use solar_charger::app::service::ChargerService;
use solar_charger::config::{Calibration, ChargerConfig, DcdcLimits};
use solar_charger::dcdc::{ControlState, OperationMode, PowerDirection, StopReason, TickOutcome};
use solar_charger::error::{Error, SafetyFault};
use solar_charger::port::{PortPair, PowerPort};
use solar_charger::safety::{KillSwitch, TickHeartbeat};

const STEP: f32 = 0.005;

fn calibration() -> Calibration {
    Calibration {
        mppt_step: STEP,
        start_headroom_v: 1.0,
        nanogrid_bus_voltage: 30.0,
        low_power_grace_ms: 10_000,
        current_gain: 0.01,
        voltage_gain: 0.02,
        temperature_gain: 0.005,
        duty_min: 0.05,
        duty_max: 0.97,
        fast_trip_current: 30.0,
        fast_trip_voltage: 70.0,
        tick_stall_ms: 500,
    }
}

struct Rig {
    kill: &'static KillSwitch,
    heartbeat: &'static TickHeartbeat,
    line: &'static SimKillLine,
    svc: ChargerService<'static, SimKillLine>,
    hw: MockHw,
    sink: RecordingSink,
}

fn rig(mode: OperationMode) -> Rig {
    // Leaked so the service can borrow them like the firmware's statics.
    let kill: &'static KillSwitch = Box::leak(Box::new(KillSwitch::new()));
    let heartbeat: &'static TickHeartbeat = Box::leak(Box::new(TickHeartbeat::new()));
    let line: &'static SimKillLine = Box::leak(Box::new(SimKillLine::new()));
    let ports = PortPair::new(PowerPort::new(60.0, 25.0), PowerPort::new(16.0, 25.0));
    let config = ChargerConfig::new(mode, calibration());
    let svc = ChargerService::new(config, ports, kill, heartbeat, line).unwrap();
    Rig {
        kill,
        heartbeat,
        line,
        svc,
        hw: MockHw::new(),
        sink: RecordingSink::new(),
    }
}

impl Rig {
    fn tick(&mut self, now_ms: u64) -> TickOutcome {
        self.svc.tick(now_ms, &mut self.hw, &mut self.sink)
    }

    /// Start in buck at 20 V / 12 V and settle one MPPT tick.
    fn running_buck(mut self) -> Self {
        self.hw.set_buck(20.0, 12.0, 5.0);
        assert!(matches!(self.tick(0), TickOutcome::Started { .. }));
        assert!(matches!(
            self.tick(100),
            TickOutcome::Running {
                state: ControlState::Mppt,
                ..
            }
        ));
        self
    }
}

// ── Start ─────────────────────────────────────────────────────

#[test]
fn buck_starts_at_voltage_ratio() {
    let mut r = rig(OperationMode::MppBuck);
    r.hw.set_buck(20.0, 12.0, 0.0);

    let outcome = r.tick(0);

    assert_eq!(
        outcome,
        TickOutcome::Started {
            direction: PowerDirection::Buck,
            duty: 0.6
        }
    );
    assert_eq!(r.svc.state(), ControlState::Mppt);
    assert_eq!(r.hw.calls(), vec![Call::Start(0.6)]);
    assert_eq!(
        r.sink.count(|e| matches!(
            e,
            ChargerEvent::StateChanged {
                from: ControlState::Off,
                to: ControlState::Mppt
            }
        )),
        1
    );
}

#[test]
fn no_start_without_headroom() {
    let mut r = rig(OperationMode::MppBuck);
    r.hw.set_buck(12.5, 12.0, 0.0);

    for t in 0..10 {
        assert_eq!(r.tick(t * 100), TickOutcome::Idle);
    }
    assert!(r.hw.calls().is_empty());
    assert!(r.sink.events.is_empty());
}

#[test]
fn nanogrid_boosts_when_bus_is_low() {
    let mut r = rig(OperationMode::Nanogrid);
    r.hw.set_boost(24.0, 12.0, 0.0);

    assert_eq!(
        r.tick(0),
        TickOutcome::Started {
            direction: PowerDirection::Boost,
            duty: 0.5
        }
    );
    assert_eq!(r.svc.converter().direction(), PowerDirection::Boost);
}

// ── Limiting ──────────────────────────────────────────────────

#[test]
fn overcurrent_enters_constant_current_and_cuts_duty() {
    let mut r = rig(OperationMode::MppBuck).running_buck();
    let before = r.svc.converter().duty();
    r.hw.clear();

    r.hw.set_buck(20.0, 12.0, 25.0);
    let outcome = r.tick(200);

    assert_eq!(r.svc.state(), ControlState::ConstantCurrent);
    let TickOutcome::Running { duty, .. } = outcome else {
        panic!("expected Running, got {outcome:?}");
    };
    // Larger than any single MPPT perturbation.
    assert!(duty < before - STEP, "duty {duty} vs {before}");
    // One write per tick.
    assert_eq!(r.hw.calls(), vec![Call::SetDuty(duty)]);
}

#[test]
fn tightened_current_limit_applies_on_next_tick() {
    let mut r = rig(OperationMode::MppBuck).running_buck();
    let limits = DcdcLimits {
        ls_current_max: 10.0,
        ..DcdcLimits::default()
    };
    r.svc
        .handle_command(ChargerCommand::UpdateLimits(limits), &mut r.sink);
    assert_eq!(r.svc.config().limits.ls_current_max, 10.0);

    r.hw.set_buck(20.0, 12.0, 12.0);
    r.tick(200);
    assert_eq!(r.svc.state(), ControlState::ConstantCurrent);
}

#[test]
fn invalid_limits_are_rejected_and_reported() {
    let mut r = rig(OperationMode::MppBuck);
    let bad = DcdcLimits {
        ls_voltage_min: 20.0,
        ..DcdcLimits::default()
    };

    r.svc
        .handle_command(ChargerCommand::UpdateLimits(bad), &mut r.sink);

    assert_eq!(r.svc.config().limits, DcdcLimits::default());
    assert_eq!(r.svc.converter().limits(), &DcdcLimits::default());
    assert_eq!(
        r.sink
            .count(|e| matches!(e, ChargerEvent::ConfigRejected(Error::Config(_)))),
        1
    );
}

// ── Stopping ──────────────────────────────────────────────────

#[test]
fn low_power_past_grace_period_switches_off() {
    let mut r = rig(OperationMode::MppBuck);
    r.hw.set_buck(20.0, 12.0, 0.05);
    assert!(matches!(r.tick(0), TickOutcome::Started { .. }));

    let mut t = 0;
    let stopped_at = loop {
        t += 100;
        assert!(t <= 20_000, "never switched off");
        if let TickOutcome::Stopped(reason) = r.tick(t) {
            assert_eq!(reason, StopReason::LowPower);
            break t;
        }
    };

    assert_eq!(stopped_at, 10_100);
    assert_eq!(r.svc.state(), ControlState::Off);
    assert_eq!(r.svc.converter().off_timestamp(), Some(stopped_at));
    assert_eq!(r.hw.last_call(), Some(Call::Stop));
    assert!(r.svc.converter().enable());
}

#[test]
fn no_restart_before_restart_interval() {
    let mut r = rig(OperationMode::MppBuck);
    r.hw.set_buck(20.0, 12.0, 0.05);
    r.tick(0);
    let mut t = 0;
    while !matches!(r.tick(t), TickOutcome::Stopped(_)) {
        t += 100;
    }
    let off = t;
    let interval = r.svc.config().limits.restart_interval_ms;

    r.hw.set_buck(20.0, 12.0, 5.0);
    assert_eq!(r.tick(off + 100), TickOutcome::Idle);
    assert_eq!(r.tick(off + interval - 1), TickOutcome::Idle);
    assert!(matches!(r.tick(off + interval), TickOutcome::Started { .. }));
}

#[test]
fn disable_command_stops_and_holds_off() {
    let mut r = rig(OperationMode::MppBuck).running_buck();

    r.svc
        .handle_command(ChargerCommand::SetEnable(false), &mut r.sink);
    assert_eq!(r.tick(200), TickOutcome::Stopped(StopReason::Disabled));
    r.hw.clear();

    for t in 3..20 {
        assert_eq!(r.tick(t * 100 + 100_000), TickOutcome::Idle);
    }
    assert!(r.hw.calls().is_empty());
}

#[test]
fn actuator_fault_stops_the_stage() {
    let mut r = rig(OperationMode::MppBuck).running_buck();
    r.hw.fail_writes = true;

    assert_eq!(r.tick(200), TickOutcome::Stopped(StopReason::ActuatorFault));
    assert_eq!(r.svc.state(), ControlState::Off);
    assert_eq!(r.hw.last_call(), Some(Call::Stop));
}

// ── Kill switch ───────────────────────────────────────────────

#[test]
fn emergency_stop_from_another_context_latches_off() {
    let mut r = rig(OperationMode::MppBuck).running_buck();
    let (kill, line) = (r.kill, r.line);

    std::thread::spawn(move || kill.emergency_stop(SafetyFault::External, line))
        .join()
        .unwrap();
    assert!(r.line.is_asserted());

    assert_eq!(
        r.tick(200),
        TickOutcome::Stopped(StopReason::EmergencyStop(SafetyFault::External.mask()))
    );
    assert!(!r.svc.converter().enable());
    assert_eq!(r.svc.state(), ControlState::Off);

    // Conditions are fine, but the stage stays off.
    for t in 3..10 {
        assert_eq!(r.tick(t * 100 + 100_000), TickOutcome::Idle);
        assert_eq!(r.svc.converter().duty(), 0.0);
    }
}

#[test]
fn fast_trip_on_measured_overcurrent() {
    let mut r = rig(OperationMode::MppBuck).running_buck();
    r.hw.set_buck(20.0, 12.0, 35.0);

    let outcome = r.tick(200);

    assert!(r.kill.has_fault(SafetyFault::Overcurrent));
    assert!(r.line.is_asserted());
    assert_eq!(
        outcome,
        TickOutcome::Stopped(StopReason::EmergencyStop(SafetyFault::Overcurrent.mask()))
    );
}

#[test]
fn lost_sensors_stop_running_stage() {
    let mut r = rig(OperationMode::MppBuck).running_buck();
    r.hw.meas.sensor_fault = true;

    let outcome = r.tick(200);

    assert!(r.kill.has_fault(SafetyFault::SensorFailure));
    assert!(r.line.is_asserted());
    assert_eq!(
        outcome,
        TickOutcome::Stopped(StopReason::EmergencyStop(SafetyFault::SensorFailure.mask()))
    );
}

#[test]
fn enable_rearms_after_trip_and_respects_backoff() {
    let mut r = rig(OperationMode::MppBuck).running_buck();
    r.hw.set_buck(20.0, 12.0, 35.0);
    r.tick(200);
    assert!(r.kill.is_tripped());

    r.svc
        .handle_command(ChargerCommand::SetEnable(true), &mut r.sink);
    assert!(!r.kill.is_tripped());
    assert!(!r.line.is_asserted());
    assert!(r.svc.converter().enable());

    r.hw.set_buck(20.0, 12.0, 5.0);
    assert_eq!(r.tick(300), TickOutcome::Idle);
    let interval = r.svc.config().limits.restart_interval_ms;
    assert!(matches!(r.tick(200 + interval), TickOutcome::Started { .. }));
}

#[test]
fn stalled_tick_trips_via_heartbeat() {
    let mut r = rig(OperationMode::MppBuck).running_buck();
    let stall = r.svc.config().calibration.tick_stall_ms;

    assert!(!r.heartbeat.check(100 + stall, stall, r.kill, r.line));
    assert!(r.heartbeat.check(101 + stall, stall, r.kill, r.line));
    assert!(r.line.is_asserted());

    assert_eq!(
        r.tick(200 + stall),
        TickOutcome::Stopped(StopReason::EmergencyStop(SafetyFault::TickStalled.mask()))
    );
}

// ── Telemetry ─────────────────────────────────────────────────

#[test]
fn telemetry_follows_configured_interval() {
    let mut r = rig(OperationMode::MppBuck);
    let interval = u64::from(r.svc.config().telemetry_interval_ms);

    assert!(r.svc.publish_telemetry(0, &mut r.sink));
    assert!(!r.svc.publish_telemetry(interval - 1, &mut r.sink));
    assert!(r.svc.publish_telemetry(interval, &mut r.sink));
    assert_eq!(
        r.sink.count(|e| matches!(e, ChargerEvent::Telemetry(_))),
        2
    );
}

#[test]
fn telemetry_reports_live_operating_point() {
    let r = rig(OperationMode::MppBuck).running_buck();
    let t = r.svc.build_telemetry();

    assert_eq!(t.state, ControlState::Mppt);
    assert_eq!(t.direction, PowerDirection::Buck);
    assert_eq!(t.low.power, 60.0);
    assert!(t.high.power < 0.0);
    assert_eq!(t.last_good_power_timestamp_ms, Some(100));
    assert_eq!(t.fault_flags, 0);
}

// ── Test mode ─────────────────────────────────────────────────

#[test]
fn test_mode_ramps_duty_to_half() {
    let mut r = rig(OperationMode::MppBuck);
    r.svc.set_test_mode(true);
    r.hw.set_buck(20.0, 12.0, 5.0);

    assert!(matches!(r.tick(0), TickOutcome::Started { duty, .. } if duty == 0.6));
    let mut last = 0.6;
    for t in 1..40 {
        r.tick(t * 100);
        let duty = r.svc.converter().duty();
        assert!(duty <= last);
        last = duty;
    }
    assert_eq!(last, 0.5);
}

// ── Fuse destruction ──────────────────────────────────────────

#[test]
fn fuse_destruction_records_before_acting() {
    let r = rig(OperationMode::MppBuck).running_buck();
    let Rig {
        svc,
        mut hw,
        mut sink,
        ..
    } = r;
    hw.clear();
    let mut recorder = JournalRecorder::new(hw.journal.clone());

    let stage = svc.fuse_destruction("hs switch shorted", 5_000, &mut hw, &mut recorder, &mut sink);

    assert!(stage.actuated());
    assert_eq!(
        hw.calls(),
        vec![Call::Record(5_000), Call::Stop, Call::ForceLowSideOn]
    );
    let entry = stage.entry();
    assert_eq!(entry.reason.as_str(), "hs switch shorted");
    assert_ne!(entry.faults & SafetyFault::ShortedHighSide.mask(), 0);
    assert_eq!(entry.ls_voltage, 12.0);
    assert_eq!(recorder.entries, vec![entry.clone()]);
    assert!(matches!(
        sink.events.last(),
        Some(ChargerEvent::FuseDestruction(SafetyFault::ShortedHighSide))
    ));
}

#[test]
fn fuse_destruction_after_trip_frees_gate_drivers() {
    let mut r = rig(OperationMode::MppBuck).running_buck();
    r.hw.set_buck(20.0, 12.0, 35.0);
    r.tick(200);
    assert!(r.line.is_asserted());

    let Rig {
        svc,
        kill,
        line,
        mut hw,
        mut sink,
        ..
    } = r;
    hw.clear();
    let mut recorder = JournalRecorder::new(hw.journal.clone());

    let stage = svc.fuse_destruction("hs switch shorted", 5_000, &mut hw, &mut recorder, &mut sink);

    assert!(stage.actuated());
    assert!(!line.is_asserted());
    assert_eq!(hw.last_call(), Some(Call::ForceLowSideOn));
    assert_ne!(stage.entry().faults & SafetyFault::Overcurrent.mask(), 0);
    assert!(kill.has_fault(SafetyFault::Overcurrent));
    assert!(kill.has_fault(SafetyFault::ShortedHighSide));

    // Fuse current hits the comparator: the trip is recorded, the low
    // side keeps conducting.
    kill.emergency_stop(SafetyFault::Overcurrent, line);
    assert!(!line.is_asserted());
}

#[test]
fn fuse_destruction_proceeds_when_record_fails() {
    let r = rig(OperationMode::MppBuck).running_buck();
    let Rig {
        svc,
        mut hw,
        mut sink,
        ..
    } = r;
    hw.clear();
    let mut recorder = JournalRecorder::failing(hw.journal.clone());

    let stage = svc.fuse_destruction("hs switch shorted", 5_000, &mut hw, &mut recorder, &mut sink);

    assert!(stage.actuated());
    assert_eq!(hw.calls(), vec![Call::Stop, Call::ForceLowSideOn]);
}

#[test]
fn fuse_destruction_truncates_long_reason() {
    let r = rig(OperationMode::MppBuck);
    let Rig {
        svc,
        mut hw,
        mut sink,
        ..
    } = r;
    let mut recorder = JournalRecorder::new(hw.journal.clone());
    let reason = "x".repeat(100);

    let stage = svc.fuse_destruction(&reason, 0, &mut hw, &mut recorder, &mut sink);

    assert_eq!(stage.entry().reason.len(), stage.entry().reason.capacity());
    assert!(reason.starts_with(stage.entry().reason.as_str()));
}
