//! Interface configuration parameters
//!
//! All tunable parameters for the caster interface.
//! Values can be overridden via NVS.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::pins::{MCP_BASE_ADDRESS, MCP_LAST_ADDRESS, MCP0_DEFAULT_ADDRESS, MCP1_DEFAULT_ADDRESS};

/// Core interface configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceConfig {
    // --- Cycle input ---
    /// Quiet time (ms) an edge must follow to count as a real transition
    pub debounce_ms: u16,
    /// Whether a HIGH level on the cycle input means `On`
    pub input_active_high: bool,

    // --- Expanders ---
    /// I²C address of the first MCP23017
    pub mcp0_address: u8,
    /// I²C address of the second MCP23017
    pub mcp1_address: u8,
    /// I²C bus clock (Hz)
    pub i2c_baudrate_hz: u32,

    // --- Handshake ---
    /// Session deadline (ms); 0 waits forever
    pub cycle_timeout_ms: u32,
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 10,
            input_active_high: true,

            mcp0_address: MCP0_DEFAULT_ADDRESS,
            mcp1_address: MCP1_DEFAULT_ADDRESS,
            i2c_baudrate_hz: 100_000,

            cycle_timeout_ms: 0,
        }
    }
}

impl InterfaceConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(u64::from(self.debounce_ms))
    }

    /// `None` when sessions may wait indefinitely.
    pub fn cycle_timeout(&self) -> Option<Duration> {
        (self.cycle_timeout_ms > 0).then(|| Duration::from_millis(u64::from(self.cycle_timeout_ms)))
    }

    /// Range-check every field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=1000).contains(&self.debounce_ms) {
            return Err(ConfigError::ValidationFailed("debounce_ms must be 1–1000"));
        }
        let addresses = MCP_BASE_ADDRESS..=MCP_LAST_ADDRESS;
        if !addresses.contains(&self.mcp0_address) || !addresses.contains(&self.mcp1_address) {
            return Err(ConfigError::ValidationFailed(
                "mcp addresses must be 0x20–0x27",
            ));
        }
        if self.mcp0_address == self.mcp1_address {
            return Err(ConfigError::ValidationFailed(
                "mcp0_address and mcp1_address must differ",
            ));
        }
        if !(10_000..=1_000_000).contains(&self.i2c_baudrate_hz) {
            return Err(ConfigError::ValidationFailed(
                "i2c_baudrate_hz must be 10 kHz–1 MHz",
            ));
        }
        if self.cycle_timeout_ms != 0 && !(10..=3_600_000).contains(&self.cycle_timeout_ms) {
            return Err(ConfigError::ValidationFailed(
                "cycle_timeout_ms must be 0 or 10–3600000",
            ));
        }
        Ok(())
    }

    /// Parse a console-supplied JSON config and range-check it. Missing
    /// fields keep their defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(|_| ConfigError::Corrupted)?;
        config.validate()?;
        Ok(config)
    }
}
