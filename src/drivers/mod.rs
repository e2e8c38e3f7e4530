//! Expander driver and hardware initialisation.

pub mod hw_init;
pub mod mcp23017;
