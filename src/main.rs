//! Solar charge controller firmware: main entry point.
//!
//! Hexagonal architecture around a single DC/DC stage.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter        LogEventSink   GpioKillLine            │
//! │  (Sensor+HalfBridge)    (EventSink)    (KillLine)              │
//! │  MonotonicClock                                                │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            ChargerService (pure logic)                 │    │
//! │  │  Converter · MPPT · CC/CV limiter                      │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Comparator ISR · supervisor timer ─▶ KillSwitch (atomics)     │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{error, info};

use solar_charger::adapters::half_bridge::PwmHalfBridge;
use solar_charger::adapters::hardware::{HardwareAdapter, HardwareSensors};
use solar_charger::adapters::kill_line::GpioKillLine;
use solar_charger::adapters::log_sink::LogEventSink;
use solar_charger::adapters::time::{self, MonotonicClock};
use solar_charger::app::service::ChargerService;
use solar_charger::config::{Calibration, ChargerConfig};
use solar_charger::dcdc::OperationMode;
use solar_charger::drivers::{hw_init, hw_timer};
use solar_charger::error::{Error, SafetyFault};
use solar_charger::pins;
use solar_charger::port::{PortPair, PowerPort};
use solar_charger::safety::{KillSwitch, TickHeartbeat};

// ── Interrupt-shared state ────────────────────────────────────

static KILL_SWITCH: KillSwitch = KillSwitch::new();
static HEARTBEAT: TickHeartbeat = TickHeartbeat::new();
static KILL_LINE: GpioKillLine = GpioKillLine::new(pins::KILL_GPIO);

/// Board calibration for the 12 V / 60 V cell.
const BOARD_CALIBRATION: Calibration = Calibration {
    mppt_step: 0.004,
    start_headroom_v: 1.0,
    nanogrid_bus_voltage: 30.0,
    low_power_grace_ms: 10_000,
    current_gain: 0.01,
    voltage_gain: 0.02,
    temperature_gain: 0.005,
    duty_min: 0.05,
    duty_max: 0.97,
    fast_trip_current: 30.0,
    fast_trip_voltage: 65.0,
    tick_stall_ms: 500,
};

/// Solar input rating (V, A).
const PANEL_PORT: PowerPort = PowerPort::new(60.0, 25.0);
/// Battery rating (V, A).
const BATTERY_PORT: PowerPort = PowerPort::new(16.0, 25.0);

const SUPERVISOR_PERIOD_MS: u32 = 50;

// ── Interrupt callbacks ───────────────────────────────────────

/// Overcurrent comparator (falling edge).
unsafe extern "C" fn comparator_isr(_arg: *mut core::ffi::c_void) {
    KILL_SWITCH.emergency_stop(SafetyFault::Overcurrent, &KILL_LINE);
}

/// Tick-stall check, runs in the esp_timer task.
unsafe extern "C" fn supervisor_cb(_arg: *mut core::ffi::c_void) {
    HEARTBEAT.check(
        time::boot_time_ms(),
        BOARD_CALIBRATION.tick_stall_ms,
        &KILL_SWITCH,
        &KILL_LINE,
    );
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  solar-charger v{}                   ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Peripherals ────────────────────────────────────────
    if let Err(e) = hw_init::init_peripherals() {
        // Gate enable and kill line stay at their reset level (low), so
        // the bridge cannot switch. Halt here.
        error!("HAL init failed: {}, halting", e);
        #[allow(clippy::empty_loop)]
        loop {}
    }
    hw_init::init_isr_service(comparator_isr)?;
    hw_timer::start_supervisor(supervisor_cb, SUPERVISOR_PERIOD_MS)?;

    // ── 3. Adapters ───────────────────────────────────────────
    let bridge = PwmHalfBridge::new(
        hw_init::LedcPwm::new(),
        hw_init::GpioOut::new(pins::GATE_ENABLE_GPIO),
    )
    .map_err(Error::from)?;
    let mut hw = HardwareAdapter::new(HardwareSensors::new(true), bridge);
    let mut log_sink = LogEventSink::new();
    let clock = MonotonicClock::new();

    // ── 4. Service ────────────────────────────────────────────
    let config = ChargerConfig::new(OperationMode::MppBuck, BOARD_CALIBRATION);
    let loop_ms = u64::from(config.control_loop_interval_ms);
    let mut service = ChargerService::new(
        config,
        PortPair::new(PANEL_PORT, BATTERY_PORT),
        &KILL_SWITCH,
        &HEARTBEAT,
        &KILL_LINE,
    )?;

    info!("System ready. Entering control loop.");

    // ── 5. Control loop ───────────────────────────────────────
    loop {
        let now = clock.now_ms();
        service.tick(now, &mut hw, &mut log_sink);
        service.publish_telemetry(now, &mut log_sink);

        let elapsed = clock.now_ms().saturating_sub(now);
        std::thread::sleep(std::time::Duration::from_millis(
            loop_ms.saturating_sub(elapsed).max(1),
        ));
    }
}
