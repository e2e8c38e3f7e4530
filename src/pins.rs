//! GPIO / bus assignments for the interface board.
//!
//! Single source of truth: drivers reference these constants rather than
//! hard-coding pin numbers or bus addresses.

// ---------------------------------------------------------------------------
// Machine cycle input
// ---------------------------------------------------------------------------

/// Digital input from the caster's cycle contact. Interrupts fire on both
/// edges; the line carries no direction information to the ISR.
pub const CYCLE_INPUT_GPIO: i32 = 4;

// ---------------------------------------------------------------------------
// I²C bus to the MCP23017 expanders
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 8;
pub const I2C_SCL_GPIO: i32 = 9;

/// MCP23017 base address with A2..A0 all tied low.
pub const MCP_BASE_ADDRESS: u8 = 0x20;
/// Highest address reachable with the three address pins.
pub const MCP_LAST_ADDRESS: u8 = 0x27;

/// First expander (A2..A0 = 000).
pub const MCP0_DEFAULT_ADDRESS: u8 = 0x20;
/// Second expander (A2..A0 = 001).
pub const MCP1_DEFAULT_ADDRESS: u8 = 0x21;
