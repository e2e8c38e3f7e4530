//! MCP23017 16-line I²C output expander driver.
//!
//! ## Hardware
//!
//! Two chips share one I²C bus. Each chip has two 8-line banks (A: GPA0..7,
//! B: GPB0..7). A register write is a two-byte transaction `[register, value]`
//! addressed to the chip. Only four registers matter here:
//!
//! | Register | Address | Use                                  |
//! |----------|---------|--------------------------------------|
//! | IODIRA   | 0x00    | bank A direction (0 = output)        |
//! | IODIRB   | 0x01    | bank B direction                     |
//! | GPIOA    | 0x12    | bank A output latch                  |
//! | GPIOB    | 0x13    | bank B output latch                  |
//!
//! The address assumes the power-on `IOCON.BANK = 0` register layout.

use embedded_hal::i2c::{Error as _, I2c};
use log::{debug, info};

use crate::app::ports::RegisterBus;
use crate::error::BusError;

/// Direction byte that makes all eight lines of a bank outputs.
pub const ALL_OUTPUTS: u8 = 0x00;

/// Which of the two chained expanders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Chip {
    Mcp0 = 0,
    Mcp1 = 1,
}

impl Chip {
    pub const ALL: [Chip; 2] = [Chip::Mcp0, Chip::Mcp1];
}

/// One of the two 8-line banks on a chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bank {
    A,
    B,
}

/// Registers written by the interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Register {
    IodirA = 0x00,
    IodirB = 0x01,
    GpioA = 0x12,
    GpioB = 0x13,
}

impl Register {
    pub const fn addr(self) -> u8 {
        self as u8
    }

    /// Output latch register for `bank`.
    pub const fn gpio(bank: Bank) -> Self {
        match bank {
            Bank::A => Self::GpioA,
            Bank::B => Self::GpioB,
        }
    }

    /// Direction register for `bank`.
    pub const fn iodir(bank: Bank) -> Self {
        match bank {
            Bank::A => Self::IodirA,
            Bank::B => Self::IodirB,
        }
    }
}

/// Both expanders on one bus, exposed as a [`RegisterBus`].
pub struct ExpanderPair<I2C> {
    i2c: I2C,
    addresses: [u8; 2],
}

impl<I2C: I2c> ExpanderPair<I2C> {
    pub fn new(i2c: I2C, mcp0_address: u8, mcp1_address: u8) -> Self {
        info!(
            "mcp23017: pair at 0x{:02X} / 0x{:02X}",
            mcp0_address, mcp1_address
        );
        Self {
            i2c,
            addresses: [mcp0_address, mcp1_address],
        }
    }

    /// I²C address of `chip`.
    pub fn address(&self, chip: Chip) -> u8 {
        self.addresses[chip as usize]
    }

    /// Give the bus back (e.g. to re-create the pair after a reset).
    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2c> RegisterBus for ExpanderPair<I2C> {
    fn write_register(&mut self, chip: Chip, register: Register, value: u8) -> Result<(), BusError> {
        let address = self.address(chip);
        debug!("mcp23017: 0x{:02X}[0x{:02X}] <- 0x{:02X}", address, register.addr(), value);
        self.i2c
            .write(address, &[register.addr(), value])
            .map_err(|e| BusError {
                chip,
                register,
                kind: e.kind(),
            })
    }
}
