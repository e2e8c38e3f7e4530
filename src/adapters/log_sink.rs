//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing interface events to the `log`
//! facade (UART / USB-CDC in production).

use log::{info, warn};

use crate::app::events::InterfaceEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`InterfaceEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &InterfaceEvent) {
        match event {
            InterfaceEvent::Initialised => info!("INIT  | expanders ready, outputs off"),
            InterfaceEvent::CodeLatched(code) => info!("LATCH | {}", code),
            InterfaceEvent::OutputsCleared => info!("CLEAR | all outputs off"),
            InterfaceEvent::CycleCompleted { cycles } => info!("CYCLE | #{}", cycles),
            InterfaceEvent::TransitionsMissed(n) => warn!("MISS  | {} transition(s) slept through", n),
            InterfaceEvent::Aborted(reason) => warn!("ABORT | {:?}", reason),
        }
    }
}
