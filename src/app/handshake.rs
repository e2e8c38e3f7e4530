//! Handshake controller: one output code per machine cycle.
//!
//! [`HandshakeController::transmit`] blocks the caller for exactly one
//! On→Off cycle of the debounced input:
//!
//! ```text
//!  IDLE ──call──▶ WAIT_ON ──On──▶ LATCHED ──Off──▶ IDLE (returns)
//!                    │  latch code     │  all-off
//!                    └──Off: all-off, returns
//! ```
//!
//! Both waiting states sleep on the sensor's change signal; there is no
//! polling interval. A session can end early through a [`CancelHandle`]
//! or a deadline, and in both cases the outputs are forced off.
//!
//! The controller owns the output latches for the duration of a call:
//! every method that writes takes `&mut self` and `&mut` the bus.

use core::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_io_mini::Timer;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use futures_lite::future;
use log::{debug, info, warn};

use crate::config::InterfaceConfig;
use crate::error::{Error, Result};
use crate::sensors::cycle::{CycleSensor, InputState, Snapshot};

use super::code::OutputCode;
use super::events::{AbortReason, InterfaceEvent};
use super::ports::{EventSink, RegisterBus};

// ───────────────────────────────────────────────────────────────
// Cancellation
// ───────────────────────────────────────────────────────────────

/// Aborts the in-flight session, if any. Cheap to clone; safe to use from
/// any thread. A cancel issued between sessions is discarded when the
/// next session starts.
#[derive(Clone)]
pub struct CancelHandle(Arc<Signal<CriticalSectionRawMutex, ()>>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.signal(());
    }
}

// ───────────────────────────────────────────────────────────────
// Statistics
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandshakeStats {
    pub cycles_completed: u32,
    pub codes_latched: u32,
    /// Accepted transitions the controller slept through.
    pub transitions_missed: u32,
    /// Sessions ended by cancel or timeout with outputs cleared.
    pub aborted: u32,
    /// Edges the filter discarded as bounce.
    pub bounces: u32,
}

impl core::fmt::Display for HandshakeStats {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "cycles={} latched={} missed={} aborted={} bounces={}",
            self.cycles_completed, self.codes_latched, self.transitions_missed, self.aborted, self.bounces
        )
    }
}

// ───────────────────────────────────────────────────────────────
// Controller
// ───────────────────────────────────────────────────────────────

enum Wake {
    Changed(Snapshot),
    Cancelled,
    TimedOut,
}

pub struct HandshakeController {
    sensor: Arc<CycleSensor>,
    cancel: Arc<Signal<CriticalSectionRawMutex, ()>>,
    timeout: Option<Duration>,
    stats: HandshakeStats,
}

impl HandshakeController {
    pub fn new(sensor: Arc<CycleSensor>, config: &InterfaceConfig) -> Self {
        Self {
            sensor,
            cancel: Arc::new(Signal::new()),
            timeout: config.cycle_timeout(),
            stats: HandshakeStats::default(),
        }
    }

    pub fn sensor(&self) -> &Arc<CycleSensor> {
        &self.sensor
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(Arc::clone(&self.cancel))
    }

    pub fn stats(&self) -> HandshakeStats {
        HandshakeStats {
            bounces: self.sensor.bounces(),
            ..self.stats
        }
    }

    // ── Direct output control ─────────────────────────────────

    /// Configure both chips as outputs and clear them.
    pub fn initialise(&mut self, bus: &mut impl RegisterBus, sink: &mut impl EventSink) -> Result<()> {
        bus.configure_outputs()?;
        bus.all_off()?;
        sink.emit(&InterfaceEvent::Initialised);
        info!("handshake: expanders configured, outputs off");
        Ok(())
    }

    /// Latch `code` immediately, outside any cycle.
    pub fn set_outputs(&mut self, code: &OutputCode, bus: &mut impl RegisterBus) -> Result<()> {
        bus.set_outputs(code)?;
        Ok(())
    }

    /// Drive every output low. Use after a failed `transmit` before retrying.
    pub fn all_off(&mut self, bus: &mut impl RegisterBus) -> Result<()> {
        bus.all_off()?;
        Ok(())
    }

    // ── Cycle-synchronised transmission ───────────────────────

    /// Send one code over one full machine cycle. Blocks until the cycle
    /// completes, the configured deadline passes, or the session is
    /// cancelled.
    pub fn transmit(
        &mut self,
        code: OutputCode,
        bus: &mut impl RegisterBus,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        let timeout = self.timeout;
        block_on(self.session(code, timeout, bus, sink))
    }

    /// Like [`transmit`](Self::transmit) with an explicit deadline.
    pub fn transmit_with_timeout(
        &mut self,
        code: OutputCode,
        timeout: Duration,
        bus: &mut impl RegisterBus,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        block_on(self.session(code, Some(timeout), bus, sink))
    }

    /// Async form of [`transmit`](Self::transmit).
    pub async fn transmit_async(
        &mut self,
        code: OutputCode,
        bus: &mut impl RegisterBus,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        let timeout = self.timeout;
        self.session(code, timeout, bus, sink).await
    }

    /// Send codes back to back, one cycle each. Stops at the first error;
    /// on success returns how many cycles were sent.
    pub fn transmit_all<'a>(
        &mut self,
        codes: impl IntoIterator<Item = &'a OutputCode>,
        bus: &mut impl RegisterBus,
        sink: &mut impl EventSink,
    ) -> Result<usize> {
        let mut sent = 0;
        for code in codes {
            if let Err(e) = self.transmit(*code, bus, sink) {
                warn!("handshake: sequence stopped after {} cycles: {}", sent, e);
                return Err(e);
            }
            sent += 1;
        }
        Ok(sent)
    }

    async fn session(
        &mut self,
        code: OutputCode,
        timeout: Option<Duration>,
        bus: &mut impl RegisterBus,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        let sensor = Arc::clone(&self.sensor);
        let cancel = Arc::clone(&self.cancel);
        let deadline = timeout.map(|t| Instant::now() + t);

        // Anything accepted before this point belongs to an earlier cycle.
        let mut seen = sensor.arm();
        cancel.reset();
        let mut latched = false;
        debug!("handshake: session for {} armed at gen {}", code, seen);

        loop {
            let wake = future::or(
                async {
                    cancel.wait().await;
                    Wake::Cancelled
                },
                future::or(
                    async { Wake::Changed(sensor.wait_change(seen).await) },
                    async move {
                        match deadline {
                            Some(at) => {
                                Timer::after(at.saturating_duration_since(Instant::now())).await;
                                Wake::TimedOut
                            }
                            None => future::pending().await,
                        }
                    },
                ),
            )
            .await;

            let snap = match wake {
                Wake::Changed(snap) => snap,
                Wake::Cancelled => return self.abort(AbortReason::Cancelled, bus, sink),
                Wake::TimedOut => return self.abort(AbortReason::TimedOut, bus, sink),
            };

            let steps = snap.transitions_since(seen);
            seen = snap.generation;
            if steps > 1 {
                let missed = steps - 1;
                warn!("handshake: {} transition(s) missed, acting on {:?}", missed, snap.state);
                self.stats.transitions_missed += u32::from(missed);
                sink.emit(&InterfaceEvent::TransitionsMissed(missed));
            }

            match snap.state {
                InputState::On => {
                    bus.set_outputs(&code)?;
                    latched = true;
                    self.stats.codes_latched += 1;
                    sink.emit(&InterfaceEvent::CodeLatched(code));
                }
                InputState::Off => {
                    bus.all_off()?;
                    if !latched {
                        warn!("handshake: cycle ended before {} was latched", code);
                    }
                    self.stats.cycles_completed += 1;
                    sink.emit(&InterfaceEvent::OutputsCleared);
                    sink.emit(&InterfaceEvent::CycleCompleted {
                        cycles: self.stats.cycles_completed,
                    });
                    return Ok(());
                }
            }
        }
    }

    fn abort(
        &mut self,
        reason: AbortReason,
        bus: &mut impl RegisterBus,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        warn!("handshake: session {:?}, forcing outputs off", reason);
        bus.all_off()?;
        self.stats.aborted += 1;
        sink.emit(&InterfaceEvent::OutputsCleared);
        sink.emit(&InterfaceEvent::Aborted(reason));
        Err(match reason {
            AbortReason::Cancelled => Error::Cancelled,
            AbortReason::TimedOut => Error::TimedOut,
        })
    }
}

/// Drive a session to completion on the calling thread. The ESP-IDF
/// executor's waker is safe to fire from the edge ISR.
#[cfg(target_os = "espidf")]
fn block_on<F: Future>(fut: F) -> F::Output {
    esp_idf_hal::task::block_on(fut)
}

#[cfg(not(target_os = "espidf"))]
fn block_on<F: Future>(fut: F) -> F::Output {
    future::block_on(fut)
}
