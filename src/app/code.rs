//! Output codes: the four bytes latched onto the expander banks for one
//! machine cycle.
//!
//! Byte order is fixed by the wiring:
//!
//! ```text
//!   b0 → MCP0 GPIOA    b1 → MCP0 GPIOB
//!   b2 → MCP1 GPIOA    b3 → MCP1 GPIOB
//! ```
//!
//! Codes can be written as text, one byte per token, in any of the integer
//! literal forms a C programmer would use: `0x11 53 0144 0b10101010`.

use core::fmt;
use core::str::FromStr;

use crate::drivers::mcp23017::{Bank, Chip, Register};

/// Four bytes destined for `(MCP0.A, MCP0.B, MCP1.A, MCP1.B)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OutputCode([u8; 4]);

impl OutputCode {
    /// Every output line low.
    pub const ALL_OFF: Self = Self([0; 4]);

    /// Bank each byte position is wired to.
    const LAYOUT: [(Chip, Bank); 4] = [
        (Chip::Mcp0, Bank::A),
        (Chip::Mcp0, Bank::B),
        (Chip::Mcp1, Bank::A),
        (Chip::Mcp1, Bank::B),
    ];

    pub const fn new(b0: u8, b1: u8, b2: u8, b3: u8) -> Self {
        Self([b0, b1, b2, b3])
    }

    pub const fn bytes(&self) -> [u8; 4] {
        self.0
    }

    pub fn is_all_off(&self) -> bool {
        self.0 == [0; 4]
    }

    /// `(chip, latch register, value)` for each byte, in write order.
    pub fn writes(&self) -> [(Chip, Register, u8); 4] {
        core::array::from_fn(|i| {
            let (chip, bank) = Self::LAYOUT[i];
            (chip, Register::gpio(bank), self.0[i])
        })
    }
}

impl From<[u8; 4]> for OutputCode {
    fn from(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for OutputCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [b0, b1, b2, b3] = self.0;
        write!(f, "0x{b0:02X} 0x{b1:02X} 0x{b2:02X} 0x{b3:02X}")
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseCodeError {
    /// Fewer or more than four tokens. Carries the count seen (capped).
    WrongByteCount(usize),
    /// Token `index` is not a valid integer literal.
    InvalidLiteral { index: usize },
    /// Token `index` does not fit in a byte.
    OutOfRange { index: usize },
}

impl fmt::Display for ParseCodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongByteCount(n) => write!(f, "expected 4 bytes, got {n}"),
            Self::InvalidLiteral { index } => write!(f, "byte {index}: not a number"),
            Self::OutOfRange { index } => write!(f, "byte {index}: exceeds 0xFF"),
        }
    }
}

impl core::error::Error for ParseCodeError {}

impl FromStr for OutputCode {
    type Err = ParseCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes: heapless::Vec<u8, 4> = heapless::Vec::new();
        let mut count = 0usize;

        for (index, token) in s
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .enumerate()
        {
            count = index + 1;
            let value = parse_byte(token, index)?;
            // Overflowing tokens are still counted for the error report.
            let _ = bytes.push(value);
        }

        if count != 4 {
            return Err(ParseCodeError::WrongByteCount(count));
        }
        let mut out = [0u8; 4];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

/// One integer literal: `0x`/`0X` hex, `0b`/`0B` binary, leading-zero
/// octal, otherwise decimal.
fn parse_byte(token: &str, index: usize) -> Result<u8, ParseCodeError> {
    let (digits, radix) = if let Some(rest) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        (rest, 16)
    } else if let Some(rest) = token.strip_prefix("0b").or_else(|| token.strip_prefix("0B")) {
        (rest, 2)
    } else if token.len() > 1 && token.starts_with('0') {
        (&token[1..], 8)
    } else {
        (token, 10)
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(ParseCodeError::InvalidLiteral { index });
    }
    let value = u32::from_str_radix(digits, radix).map_err(|_| ParseCodeError::OutOfRange { index })?;
    u8::try_from(value).map_err(|_| ParseCodeError::OutOfRange { index })
}
