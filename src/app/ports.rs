//! Port traits: the boundary between the handshake logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ HandshakeController (domain)
//! ```
//!
//! The bus transport, the input line, event reporting, and config storage
//! are all reached through these traits, so the controller runs unchanged
//! against real expanders or the mocks in `tests/`.

use crate::config::InterfaceConfig;
use crate::drivers::mcp23017::{ALL_OUTPUTS, Bank, Chip, Register};
use crate::error::BusError;

use super::code::OutputCode;
use super::events::InterfaceEvent;

// ───────────────────────────────────────────────────────────────
// Register bus (domain → expanders)
// ───────────────────────────────────────────────────────────────

/// Write-side port to the two chained expanders.
///
/// Only `write_register` touches the transport. The provided methods
/// issue exactly one write per register, with no retries, and stop at
/// the first failure.
pub trait RegisterBus {
    /// Write one byte to one register of one chip.
    fn write_register(&mut self, chip: Chip, register: Register, value: u8) -> Result<(), BusError>;

    /// Make every line on both chips an output.
    fn configure_outputs(&mut self) -> Result<(), BusError> {
        for chip in Chip::ALL {
            for bank in [Bank::A, Bank::B] {
                self.write_register(chip, Register::iodir(bank), ALL_OUTPUTS)?;
            }
        }
        Ok(())
    }

    /// Latch `code` onto the four banks (MCP0.A, MCP0.B, MCP1.A, MCP1.B).
    fn set_outputs(&mut self, code: &OutputCode) -> Result<(), BusError> {
        for (chip, register, value) in code.writes() {
            self.write_register(chip, register, value)?;
        }
        Ok(())
    }

    /// Drive every output line low.
    fn all_off(&mut self) -> Result<(), BusError> {
        self.set_outputs(&OutputCode::ALL_OFF)
    }
}

// ───────────────────────────────────────────────────────────────
// Input line (hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Raw level of the cycle input. Only used to seed the debounced state at
/// boot; the filter itself never re-reads the pin.
pub trait InputLine {
    fn read_input_line(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Event sink (domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The controller emits structured [`InterfaceEvent`]s through this port.
pub trait EventSink {
    fn emit(&mut self, event: &InterfaceEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists [`InterfaceConfig`].
///
/// Implementations MUST validate before persisting; out-of-range values
/// are rejected, not clamped.
pub trait ConfigPort {
    /// Load configuration. Returns [`InterfaceConfig::default()`] if nothing
    /// is stored.
    fn load(&self) -> Result<InterfaceConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &InterfaceConfig) -> Result<(), ConfigError>;
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A field failed range validation; the message names it.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::error::Error for ConfigError {}
