//! GPIO / peripheral pin assignments and analog scaling for the charge
//! controller board (ESP32-S3).
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers or divider ratios.

// ---------------------------------------------------------------------------
// Half bridge (gate driver with single PWM input and internal dead time)
// ---------------------------------------------------------------------------

/// LEDC output carrying the high-side PWM; the driver derives the
/// complementary low-side signal.
pub const HALF_BRIDGE_PWM_GPIO: i32 = 11;
/// Digital output: gate-driver enable (active HIGH).
pub const GATE_ENABLE_GPIO: i32 = 12;
/// Digital output: gate-driver shutdown, wired in series with the enable
/// line. HIGH = drivers cut regardless of firmware state.
pub const KILL_GPIO: i32 = 13;
/// Digital input: open-drain output of the overcurrent comparator.
/// Falls LOW when the inductor current exceeds the hardware threshold.
pub const COMPARATOR_TRIP_GPIO: i32 = 14;

// ---------------------------------------------------------------------------
// PWM configuration
// ---------------------------------------------------------------------------

/// Switching frequency of the half bridge.
pub const PWM_FREQ_HZ: u32 = 70_000;
/// LEDC timer resolution (bits). 10 bits at 70 kHz fits the 80 MHz APB clock.
pub const PWM_RESOLUTION_BITS: u32 = 10;

// ---------------------------------------------------------------------------
// Sensors: analog (ADC1, 12-bit, 12 dB attenuation)
// ---------------------------------------------------------------------------

/// High-side voltage divider, ADC1 channel 3 (GPIO 4).
pub const ADC1_CH_HS_VOLTAGE: u32 = 3;
/// Low-side voltage divider, ADC1 channel 4 (GPIO 5).
pub const ADC1_CH_LS_VOLTAGE: u32 = 4;
/// Bidirectional inductor current-sense amplifier, ADC1 channel 5 (GPIO 6).
pub const ADC1_CH_LS_CURRENT: u32 = 5;
/// MOSFET NTC divider, ADC1 channel 6 (GPIO 7).
pub const ADC1_CH_MOSFET_NTC: u32 = 6;

/// Full-scale input voltage of the ADC (V).
pub const ADC_FULL_SCALE_V: f32 = 3.1;
/// Largest raw reading.
pub const ADC_MAX_RAW: u16 = 4095;

/// High-side divider: 240 kΩ / 10 kΩ.
pub const HS_VOLTAGE_SCALE: f32 = 25.0;
/// Low-side divider: 70 kΩ / 10 kΩ.
pub const LS_VOLTAGE_SCALE: f32 = 8.0;
/// Current-sense output at zero current (V).
pub const LS_CURRENT_OFFSET_V: f32 = 1.55;
/// Current-sense transconductance (A per volt of amplifier output).
pub const LS_CURRENT_SCALE: f32 = 25.0;

/// NTC: 10 kΩ at 25 °C, B = 3435 K, high-side 10 kΩ series resistor.
pub const NTC_R25_OHM: f32 = 10_000.0;
pub const NTC_BETA_K: f32 = 3435.0;
pub const NTC_SERIES_OHM: f32 = 10_000.0;
