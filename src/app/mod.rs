//! Application core: pure domain logic, zero I/O.
//!
//! The handshake controller and the code value type live here. All
//! interaction with hardware happens through **port traits** defined in
//! [`ports`], keeping this layer fully testable without real peripherals.

pub mod code;
pub mod events;
pub mod handshake;
pub mod ports;
