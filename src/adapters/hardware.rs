//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! [`HardwareSensors`] reads the four ADC channels and scales them with
//! the constants in [`pins`].  [`HardwareAdapter`] pairs it with a
//! [`HalfBridge`] so the service can take a single `SensorPort +
//! HalfBridge` handle.  On non-espidf targets the ADC reads come from
//! `hw_init`'s simulation stubs.
//!
//! Both failure modes of the front end fail safe: a run of missed
//! conversions raises `sensor_fault`, and a broken NTC on a board that
//! has one reads as [`MOSFET_SENSOR_FAULT_C`].

use log::warn;

use crate::app::ports::{HalfBridge, Measurements, SensorPort};
use crate::config::MOSFET_SENSOR_FAULT_C;
use crate::drivers::hw_init;
use crate::error::ActuatorError;
use crate::pins;

/// Raw ADC counts of one sampling pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    pub hs_voltage: u16,
    pub ls_voltage: u16,
    pub ls_current: u16,
    /// `None` if the NTC conversion failed.
    pub ntc: Option<u16>,
}

fn counts_to_volts(raw: u16) -> f32 {
    f32::from(raw) * pins::ADC_FULL_SCALE_V / f32::from(pins::ADC_MAX_RAW)
}

/// NTC temperature (°C) from the divider reading.  `None` for an open or
/// shorted sensor (reading pinned at a rail).
pub fn ntc_temperature(raw: u16) -> Option<f32> {
    if raw == 0 || raw >= pins::ADC_MAX_RAW {
        return None;
    }
    let v = counts_to_volts(raw);
    // NTC on the low side of the divider.
    let r = pins::NTC_SERIES_OHM * v / (pins::ADC_FULL_SCALE_V - v);
    let t0 = 298.15;
    let inv = 1.0 / t0 + (r / pins::NTC_R25_OHM).ln() / pins::NTC_BETA_K;
    Some(1.0 / inv - 273.15)
}

/// Scale a raw sample into engineering units.
///
/// Only the inductor current is sensed.  The high-side current is
/// derived from it assuming lossless conversion, with the opposite sign
/// per the port convention.
pub fn scale(raw: &RawSample) -> Measurements {
    let hs_voltage = counts_to_volts(raw.hs_voltage) * pins::HS_VOLTAGE_SCALE;
    let ls_voltage = counts_to_volts(raw.ls_voltage) * pins::LS_VOLTAGE_SCALE;
    let ls_current =
        (counts_to_volts(raw.ls_current) - pins::LS_CURRENT_OFFSET_V) * pins::LS_CURRENT_SCALE;
    let hs_current = if hs_voltage > 0.1 {
        -ls_current * ls_voltage / hs_voltage
    } else {
        0.0
    };
    Measurements {
        hs_voltage,
        hs_current,
        ls_voltage,
        ls_current,
        mosfet_temperature: raw.ntc.and_then(ntc_temperature),
        sensor_fault: false,
    }
}

/// Missed conversions in a row after which the readings count as lost.
pub const MAX_MISSED_READS: u8 = 3;

/// ADC front end of the power stage.
pub struct HardwareSensors {
    has_ntc: bool,
    last: Measurements,
    missed: u8,
}

impl HardwareSensors {
    /// `has_ntc` is false on board variants without a MOSFET sensor.
    pub fn new(has_ntc: bool) -> Self {
        Self {
            has_ntc,
            last: Measurements::default(),
            missed: 0,
        }
    }

    /// One sampling pass through `read`, which returns `None` for a failed
    /// conversion.
    fn sample(&mut self, read: impl Fn(u32) -> Option<u16>) -> Measurements {
        let (Some(hs_v), Some(ls_v), Some(ls_i)) = (
            read(pins::ADC1_CH_HS_VOLTAGE),
            read(pins::ADC1_CH_LS_VOLTAGE),
            read(pins::ADC1_CH_LS_CURRENT),
        ) else {
            // A single miss repeats the previous measurement rather than
            // reporting 0 V.
            self.missed = self.missed.saturating_add(1);
            if self.missed < MAX_MISSED_READS {
                return self.last;
            }
            if self.missed == MAX_MISSED_READS {
                warn!("ADC: {} conversions missed in a row", self.missed);
            }
            return Measurements {
                sensor_fault: true,
                ..self.last
            };
        };
        self.missed = 0;

        let raw = RawSample {
            hs_voltage: hs_v,
            ls_voltage: ls_v,
            ls_current: ls_i,
            ntc: if self.has_ntc {
                read(pins::ADC1_CH_MOSFET_NTC)
            } else {
                None
            },
        };
        let mut m = scale(&raw);
        if self.has_ntc && m.mosfet_temperature.is_none() {
            m.mosfet_temperature = Some(MOSFET_SENSOR_FAULT_C);
        }
        self.last = m;
        m
    }
}

impl SensorPort for HardwareSensors {
    fn read(&mut self) -> Measurements {
        self.sample(hw_init::adc1_read)
    }
}

/// Concrete adapter combining the sensors and the half bridge behind
/// port traits.
pub struct HardwareAdapter<B> {
    sensors: HardwareSensors,
    bridge: B,
}

impl<B: HalfBridge> HardwareAdapter<B> {
    pub fn new(sensors: HardwareSensors, bridge: B) -> Self {
        Self { sensors, bridge }
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl<B> SensorPort for HardwareAdapter<B> {
    fn read(&mut self) -> Measurements {
        self.sensors.read()
    }
}

// ── HalfBridge implementation ─────────────────────────────────

impl<B: HalfBridge> HalfBridge for HardwareAdapter<B> {
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
