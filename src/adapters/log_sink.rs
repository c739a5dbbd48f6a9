//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured charger events to the
//! ESP-IDF logger (UART / USB-CDC in production).  A CAN telemetry
//! adapter would implement the same trait.

use log::{error, info, warn};

use crate::app::events::ChargerEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`ChargerEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &ChargerEvent) {
        match event {
            ChargerEvent::Telemetry(t) => {
                info!(
                    "TELEM | {} {:?} | hs={:.2}V/{:.2}A ls={:.2}V/{:.2}A | \
                     duty={:.3} | T={} | en={} | faults=0b{:06b}",
                    t.state,
                    t.direction,
                    t.high.voltage,
                    t.high.current,
                    t.low.voltage,
                    t.low.current,
                    t.duty,
                    t.mosfet_temperature
                        .map_or_else(|| "n/a".into(), |v| format!("{v:.1}\u{00b0}C")),
                    t.enable,
                    t.fault_flags,
                );
            }
            ChargerEvent::StateChanged { from, to } => {
                info!("STATE | {} -> {}", from, to);
            }
            ChargerEvent::Started { direction, duty } => {
                info!("START | {:?} at duty {:.3}", direction, duty);
            }
            ChargerEvent::Stopped(reason) => {
                info!("STOP  | {}", reason);
            }
            ChargerEvent::FuseDestruction(fault) => {
                error!("FUSE  | destroyed: {}", fault);
            }
            ChargerEvent::ConfigRejected(e) => {
                warn!("CONFIG | rejected: {}", e);
            }
        }
    }
}
