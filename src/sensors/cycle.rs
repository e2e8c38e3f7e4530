//! Debounced machine-cycle input.
//!
//! The caster closes a contact once per revolution. The GPIO fires on
//! every edge in both directions without saying which, and the contact
//! bounces. [`CycleSensor::on_edge`] runs in ISR context and turns that
//! into a clean `On`/`Off` state:
//!
//! - `gap = now - last_edge`
//! - `gap > threshold`: accepted, state toggles
//! - `gap <= threshold`: bounce, state unchanged
//! - `last_edge = now` either way
//!
//! Because every edge restarts the window, a burst of bounces is accepted
//! at most once, and only an edge after a full quiet period can toggle.
//!
//! ## Shared word
//!
//! State, a wrapping change counter, and the last-edge timestamp share one
//! `u64` behind a critical section, so a reader can never see a torn
//! combination. ESP32 targets have no 64-bit atomics.
//!
//! ```text
//!   63      62..48        47..0
//!  ┌────┬────────────┬───────────────┐
//!  │ On │ generation │ last edge, µs │
//!  └────┴────────────┴───────────────┘
//! ```
//!
//! The generation lets the controller ignore edges accepted before it
//! started waiting, and notice when it slept through more than one.

use core::cell::Cell;
use core::sync::atomic::{AtomicU32, Ordering};
use core::time::Duration;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

use crate::adapters::time::MonotonicClock;

const STATE_BIT: u64 = 1 << 63;
const GEN_SHIFT: u32 = 48;
/// Generation counter width (15 bits).
pub const GEN_MASK: u16 = 0x7FFF;
const STAMP_MASK: u64 = (1 << GEN_SHIFT) - 1;

/// Debounced logical level of the cycle input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputState {
    Off,
    On,
}

impl InputState {
    pub fn toggled(self) -> Self {
        match self {
            Self::Off => Self::On,
            Self::On => Self::Off,
        }
    }
}

/// Consistent view of the shared word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub state: InputState,
    /// Accepted transitions so far, modulo 2^15.
    pub generation: u16,
    /// Timestamp of the most recent edge, accepted or not (µs, 48-bit).
    pub last_edge_us: u64,
}

impl Snapshot {
    fn unpack(word: u64) -> Self {
        Self {
            state: if word & STATE_BIT != 0 { InputState::On } else { InputState::Off },
            generation: ((word >> GEN_SHIFT) as u16) & GEN_MASK,
            last_edge_us: word & STAMP_MASK,
        }
    }

    /// Accepted transitions between `earlier` and this snapshot.
    pub fn transitions_since(&self, earlier: u16) -> u16 {
        self.generation.wrapping_sub(earlier) & GEN_MASK
    }
}

/// Debounce filter plus the state it publishes.
///
/// Shared between the edge ISR and the controller (wrap in `Arc`).
pub struct CycleSensor {
    word: Mutex<CriticalSectionRawMutex, Cell<u64>>,
    threshold_us: u64,
    bounces: AtomicU32,
    changed: Signal<CriticalSectionRawMutex, ()>,
    clock: MonotonicClock,
}

impl CycleSensor {
    /// Starts `Off`, with the debounce window opened now.
    pub fn new(threshold: Duration) -> Self {
        let clock = MonotonicClock::new();
        let origin = clock.uptime_us() & STAMP_MASK;
        Self {
            word: Mutex::new(Cell::new(origin)),
            threshold_us: threshold.as_micros() as u64,
            bounces: AtomicU32::new(0),
            changed: Signal::new(),
            clock,
        }
    }

    /// Edge handler. Register this on the cycle GPIO, both edges.
    /// Holds the critical section for a few instructions; never blocks.
    pub fn on_edge(&self) {
        self.on_edge_at(self.clock.uptime_us());
    }

    /// Edge handler with an explicit timestamp (µs on this sensor's clock).
    pub fn on_edge_at(&self, now_us: u64) {
        let now = now_us & STAMP_MASK;
        let threshold = self.threshold_us;

        let accepted = self.word.lock(|cell| {
            let word = cell.get();
            let gap = now.wrapping_sub(word & STAMP_MASK) & STAMP_MASK;
            let accepted = gap > threshold;

            let mut next = (word & !STAMP_MASK) | now;
            if accepted {
                let generation = ((word >> GEN_SHIFT) as u16).wrapping_add(1) & GEN_MASK;
                next = (next & !(u64::from(GEN_MASK) << GEN_SHIFT)) | (u64::from(generation) << GEN_SHIFT);
                next ^= STATE_BIT;
            }
            cell.set(next);
            accepted
        });

        if accepted {
            self.changed.signal(());
        } else {
            self.bounces.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::unpack(self.word.lock(Cell::get))
    }

    pub fn state(&self) -> InputState {
        self.snapshot().state
    }

    /// Edges discarded as contact bounce since boot.
    pub fn bounces(&self) -> u32 {
        self.bounces.load(Ordering::Relaxed)
    }

    pub fn threshold(&self) -> Duration {
        Duration::from_micros(self.threshold_us)
    }

    /// Drop any pending change notification and return the generation to
    /// wait past. Changes accepted before this call never satisfy a
    /// subsequent [`wait_change`](Self::wait_change).
    pub fn arm(&self) -> u16 {
        self.changed.reset();
        self.snapshot().generation
    }

    /// Resolve once an accepted transition newer than `since` exists.
    pub async fn wait_change(&self, since: u16) -> Snapshot {
        loop {
            let snap = self.snapshot();
            if snap.generation != since {
                return snap;
            }
            self.changed.wait().await;
        }
    }

    /// Force the logical state, e.g. to match the physical line at boot.
    /// Leaves generation and timestamp untouched.
    pub fn resync(&self, state: InputState) {
        self.word.lock(|cell| {
            let word = cell.get();
            cell.set(match state {
                InputState::On => word | STATE_BIT,
                InputState::Off => word & !STATE_BIT,
            });
        });
    }
}
