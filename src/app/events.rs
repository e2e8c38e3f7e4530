//! Outbound interface events.
//!
//! The [`HandshakeController`](super::handshake::HandshakeController) emits
//! these through the [`EventSink`](super::ports::EventSink) port. Adapters
//! decide where they go.

use super::code::OutputCode;

/// Why a session ended without completing its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    Cancelled,
    TimedOut,
}

/// Structured events emitted by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterfaceEvent {
    /// Both expanders configured as outputs and cleared.
    Initialised,

    /// `On` observed; the code is now held on the outputs.
    CodeLatched(OutputCode),

    /// `Off` observed (or abort); all outputs driven low.
    OutputsCleared,

    /// A full On→Off cycle finished. Carries the running total.
    CycleCompleted { cycles: u32 },

    /// More than one accepted transition happened between two wakeups.
    TransitionsMissed(u16),

    /// The session ended early; outputs were forced off.
    Aborted(AbortReason),
}
