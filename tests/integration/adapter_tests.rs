//! Integration tests running the service against the real adapters
//! (embedded-hal half bridge over the host peripheral stubs, RAM fault
//! log, log sink).

use solar_charger::adapters::fault_log::RamFaultLog;
use solar_charger::adapters::half_bridge::PwmHalfBridge;
use solar_charger::adapters::hardware::{HardwareAdapter, HardwareSensors, MAX_MISSED_READS};
use solar_charger::adapters::kill_line::SimKillLine;
use solar_charger::adapters::log_sink::LogEventSink;
use solar_charger::app::ports::{HalfBridge, KillLine, Measurements, SensorPort};
use solar_charger::app::service::ChargerService;
use solar_charger::config::{Calibration, ChargerConfig};
use solar_charger::dcdc::{OperationMode, TickOutcome};
use solar_charger::drivers::hw_init::{GpioOut, LedcPwm};
use solar_charger::error::{ActuatorError, SafetyFault};
use solar_charger::pins;
use solar_charger::port::{PortPair, PowerPort};
use solar_charger::safety::{KillSwitch, TickHeartbeat};

type Bridge = PwmHalfBridge<LedcPwm, GpioOut>;

/// Scripted sensors in front of the real PWM half bridge.
struct Bench {
    meas: Measurements,
    bridge: Bridge,
}

impl SensorPort for Bench {
    fn read(&mut self) -> Measurements {
        self.meas
    }
}

impl HalfBridge for Bench {
    fn start(&mut self, duty: f32) -> Result<(), ActuatorError> {
        self.bridge.start(duty)
    }
    fn set_duty(&mut self, duty: f32) -> Result<(), ActuatorError> {
        self.bridge.set_duty(duty)
    }
    fn stop(&mut self) -> Result<(), ActuatorError> {
        self.bridge.stop()
    }
    fn is_running(&self) -> bool {
        self.bridge.is_running()
    }
    fn duty(&self) -> f32 {
        self.bridge.duty()
    }
    fn force_low_side_on(&mut self) -> Result<(), ActuatorError> {
        self.bridge.force_low_side_on()
    }
}

fn calibration() -> Calibration {
    Calibration {
        mppt_step: 0.005,
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

fn ports() -> PortPair {
    PortPair::new(PowerPort::new(60.0, 25.0), PowerPort::new(16.0, 25.0))
}

fn bridge() -> Bridge {
    PwmHalfBridge::new(LedcPwm::new(), GpioOut::new(pins::GATE_ENABLE_GPIO)).unwrap()
}

#[test]
fn service_drives_pwm_and_gate_enable() {
    let kill = KillSwitch::new();
    let hb = TickHeartbeat::new();
    let line = SimKillLine::new();
    let config = ChargerConfig::new(OperationMode::MppBuck, calibration());
    let mut svc = ChargerService::new(config, ports(), &kill, &hb, &line).unwrap();
    let mut sink = LogEventSink::new();

    let mut bench = Bench {
        meas: Measurements {
            hs_voltage: 20.0,
            hs_current: -3.0,
            ls_voltage: 12.0,
            ls_current: 5.0,
            mosfet_temperature: Some(40.0),
            sensor_fault: false,
        },
        bridge: bridge(),
    };

    assert!(matches!(svc.tick(0, &mut bench, &mut sink), TickOutcome::Started { .. }));
    assert!(bench.bridge.is_running());

    svc.tick(100, &mut bench, &mut sink);
    let (pwm, enable) = bench.bridge.release();
    let expected = (svc.converter().duty() * 1023.0) as u16;
    assert_eq!(pwm.duty(), expected);
    assert!(enable.is_set_high());
}

#[test]
fn fuse_destruction_lands_in_fault_log() {
    let kill = KillSwitch::new();
    let hb = TickHeartbeat::new();
    let line = SimKillLine::new();
    let config = ChargerConfig::new(OperationMode::MppBuck, calibration());
    let svc = ChargerService::new(config, ports(), &kill, &hb, &line).unwrap();
    let mut sink = LogEventSink::new();
    let mut log = RamFaultLog::<4>::new();
    let mut bridge = bridge();

    let stage = svc.fuse_destruction("hs switch shorted", 1_234, &mut bridge, &mut log, &mut sink);

    assert!(stage.actuated());
    let latest = log.latest().unwrap();
    assert_eq!(&latest, stage.entry());
    assert_eq!(latest.timestamp_ms, 1_234);
    assert_eq!(latest.faults, SafetyFault::ShortedHighSide.mask());

    // Low side held on: PWM fully off, drivers enabled.
    let (pwm, enable) = bridge.release();
    assert_eq!(pwm.duty(), 0);
    assert!(enable.is_set_high());
}

#[test]
fn dead_adc_keeps_stage_off_and_trips() {
    let kill = KillSwitch::new();
    let hb = TickHeartbeat::new();
    let line = SimKillLine::new();
    let config = ChargerConfig::new(OperationMode::MppBuck, calibration());
    let mut svc = ChargerService::new(config, ports(), &kill, &hb, &line).unwrap();
    let mut sink = LogEventSink::new();
    // The host ADC has no converter behind it: every conversion fails.
    let mut hw = HardwareAdapter::new(HardwareSensors::new(false), bridge());

    for t in 0..u64::from(MAX_MISSED_READS) - 1 {
        assert_eq!(svc.tick(t * 100, &mut hw, &mut sink), TickOutcome::Idle);
        assert!(!kill.is_tripped());
    }
    for t in 0..5 {
        assert_eq!(svc.tick(1_000 + t * 100, &mut hw, &mut sink), TickOutcome::Idle);
    }
    assert!(!hw.is_running());
    assert!(kill.has_fault(SafetyFault::SensorFailure));
    assert!(line.is_asserted());
}
