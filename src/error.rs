//! Unified error types for the caster interface.
//!
//! A single `Error` enum that every fallible path funnels into. All
//! variants are `Copy` so they can be handed back from the handshake loop
//! and logged without allocation.

use core::fmt;

use embedded_hal::i2c::ErrorKind;

use crate::app::ports::ConfigError;
use crate::drivers::hw_init::HwInitError;
use crate::drivers::mcp23017::{Chip, Register};

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A register write did not reach the expander.
    Bus(BusError),
    /// The session was aborted through a [`CancelHandle`](crate::app::handshake::CancelHandle).
    Cancelled,
    /// The session deadline passed before a full cycle was observed.
    TimedOut,
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
    /// Peripheral initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "bus: {e}"),
            Self::Cancelled => write!(f, "session cancelled"),
            Self::TimedOut => write!(f, "session timed out"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Bus errors
// ---------------------------------------------------------------------------

/// A failed register write. Outputs are in an unknown state afterwards;
/// the caller must re-issue all-off before retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusError {
    pub chip: Chip,
    pub register: Register,
    pub kind: ErrorKind,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}.{:?} write failed ({})", self.chip, self.register, self.kind)
    }
}

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::Corrupted => Self::Config("stored config corrupted"),
            ConfigError::ValidationFailed(msg) => Self::Config(msg),
            ConfigError::IoError => Self::Config("storage I/O error"),
        }
    }
}

impl From<HwInitError> for Error {
    fn from(e: HwInitError) -> Self {
        match e {
            HwInitError::I2cInitFailed(_) => Self::Init("I2C master"),
            HwInitError::GpioConfigFailed(_) => Self::Init("cycle input GPIO"),
            HwInitError::IsrInstallFailed(_) => Self::Init("cycle input ISR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, Error>;
