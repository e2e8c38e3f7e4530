//! Mock hardware for integration tests.
//!
//! Records every register write so tests can assert on the full bus
//! history without touching a real I²C peripheral. The log is shared, so
//! it can be inspected while a session future still borrows the bus.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use caster_interface::app::events::InterfaceEvent;
use caster_interface::app::ports::{EventSink, RegisterBus};
use caster_interface::drivers::mcp23017::{Bank, Chip, Register};
use caster_interface::error::BusError;
use caster_interface::sensors::cycle::CycleSensor;
use embedded_hal::i2c::ErrorKind;
use futures_lite::future::{block_on, poll_once};

pub type Write = (Chip, Register, u8);

// ── Register log ──────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct BusLog(Arc<Mutex<Vec<Write>>>);

#[allow(dead_code)]
impl BusLog {
    pub fn writes(&self) -> Vec<Write> {
        self.0.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    /// Writes recorded after the first `from` entries.
    pub fn since(&self, from: usize) -> Vec<Write> {
        self.0.lock().unwrap()[from..].to_vec()
    }

    /// Last value written to a bank's output latch (0 if never written).
    pub fn gpio(&self, chip: Chip, bank: Bank) -> u8 {
        let register = Register::gpio(bank);
        self.0
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(c, r, _)| *c == chip && *r == register)
            .map_or(0, |(_, _, v)| *v)
    }

    /// All four latches in wiring order.
    pub fn outputs(&self) -> [u8; 4] {
        [
            self.gpio(Chip::Mcp0, Bank::A),
            self.gpio(Chip::Mcp0, Bank::B),
            self.gpio(Chip::Mcp1, Bank::A),
            self.gpio(Chip::Mcp1, Bank::B),
        ]
    }
}

// ── MockBus ───────────────────────────────────────────────────

/// Shared fault injection: writes to the selected register fail until
/// cleared. Usable while a session future borrows the bus.
#[derive(Clone, Default)]
pub struct Fault(Arc<Mutex<Option<(Chip, Register)>>>);

#[allow(dead_code)]
impl Fault {
    pub fn set(&self, chip: Chip, register: Register) {
        *self.0.lock().unwrap() = Some((chip, register));
    }

    pub fn clear(&self) {
        *self.0.lock().unwrap() = None;
    }

    fn hits(&self, chip: Chip, register: Register) -> bool {
        *self.0.lock().unwrap() == Some((chip, register))
    }
}

pub struct MockBus {
    log: BusLog,
    fault: Fault,
}

#[allow(dead_code)]
impl MockBus {
    pub fn new() -> Self {
        Self {
            log: BusLog::default(),
            fault: Fault::default(),
        }
    }

    /// Every write to `register` on `chip` fails with a NACK-style error.
    pub fn failing_on(chip: Chip, register: Register) -> Self {
        let bus = Self::new();
        bus.fault.set(chip, register);
        bus
    }

    pub fn log(&self) -> BusLog {
        self.log.clone()
    }

    pub fn fault(&self) -> Fault {
        self.fault.clone()
    }

    pub fn heal(&mut self) {
        self.fault.clear();
    }
}

impl RegisterBus for MockBus {
    fn write_register(&mut self, chip: Chip, register: Register, value: u8) -> Result<(), BusError> {
        if self.fault.hits(chip, register) {
            return Err(BusError {
                chip,
                register,
                kind: ErrorKind::Other,
            });
        }
        self.log.0.lock().unwrap().push((chip, register, value));
        Ok(())
    }
}

// ── Recording event sink ──────────────────────────────────────

#[derive(Clone, Default)]
pub struct RecordingSink(Arc<Mutex<Vec<InterfaceEvent>>>);

#[allow(dead_code)]
impl RecordingSink {
    pub fn events(&self) -> Vec<InterfaceEvent> {
        self.0.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &InterfaceEvent) {
        self.0.lock().unwrap().push(event.clone());
    }
}

// ── Synthetic edges ───────────────────────────────────────────

/// Feeds edges to a sensor on a virtual timeline that starts at the
/// sensor's construction instant.
pub struct EdgeFeeder {
    sensor: Arc<CycleSensor>,
    now_us: u64,
}

#[allow(dead_code)]
impl EdgeFeeder {
    pub fn new(sensor: &Arc<CycleSensor>) -> Self {
        Self {
            sensor: Arc::clone(sensor),
            now_us: sensor.snapshot().last_edge_us,
        }
    }

    /// One edge `after` the previous one.
    pub fn edge_after(&mut self, after: Duration) {
        self.now_us += after.as_micros() as u64;
        self.sensor.on_edge_at(self.now_us);
    }

    /// A clean transition: 50 ms of quiet, then an edge.
    pub fn toggle(&mut self) {
        self.edge_after(Duration::from_millis(50));
    }

    /// A clean transition followed by `n` bounces 1 ms apart.
    pub fn toggle_with_bounce(&mut self, n: usize) {
        self.toggle();
        for _ in 0..n {
            self.edge_after(Duration::from_millis(1));
        }
    }
}

/// Poll a pinned future exactly once.
pub fn poll<F: Future>(fut: Pin<&mut F>) -> Option<F::Output> {
    block_on(poll_once(fut))
}
