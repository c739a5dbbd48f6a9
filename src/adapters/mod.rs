//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements            | Connects to                  |
//! |---------------|-----------------------|------------------------------|
//! | `fault_log`   | FaultRecorder         | RTC-retained RAM ring        |
//! | `half_bridge` | HalfBridge            | embedded-hal PWM + enable pin|
//! | `hardware`    | SensorPort            | ESP32 ADC1                   |
//! |               | HalfBridge            | (delegates to `half_bridge`) |
//! | `kill_line`   | KillLine              | Gate-driver shutdown GPIO    |
//! | `log_sink`    | EventSink             | Serial log output            |
//! | `time`        | (clock only)          | ESP32 system timer           |

pub mod fault_log;
pub mod half_bridge;
pub mod hardware;
pub mod kill_line;
pub mod log_sink;
pub mod time;
