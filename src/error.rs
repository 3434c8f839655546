use std::io;

use thiserror::Error;

/// Reasons a ROM image can't be turned into a [`Rom`](crate::Rom).
#[derive(Debug, Error)]
pub enum RomError {
    #[error("ROM is empty")]
    Empty,

    #[error("ROM size incorrect. Max size is {max} bytes but {size} bytes were provided")]
    TooLarge { size: usize, max: usize },

    #[error("error reading ROM: {0}")]
    Io(#[from] io::Error),
}

/// A condition raised by [`Chip8::step`](crate::Chip8::step).
///
/// A faulting step leaves the machine untouched, with `pc` still on the
/// offending instruction. The one exception is [`Fault::UnknownOpcode`], which
/// skips the word and carries on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Fault {
    #[error("program counter {pc:#06X} is outside of memory")]
    PcOutOfBounds { pc: u16 },

    #[error("access of {len} bytes at I = {index:#06X} is outside of memory")]
    IndexOutOfBounds { index: u16, len: usize },

    #[error("stack overflow calling from {pc:#06X}")]
    StackOverflow { pc: u16 },

    #[error("stack underflow returning from {pc:#06X}")]
    StackUnderflow { pc: u16 },

    #[error("unknown opcode {opcode:#06X} at {pc:#06X}")]
    UnknownOpcode { pc: u16, opcode: u16 },
}

impl Fault {
    /// Addressing faults mean the program has lost track of memory; a driver
    /// should normally stop on these.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Fault::PcOutOfBounds { .. } | Fault::IndexOutOfBounds { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("key code {0:#04X} is outside of the hex keypad")]
    OutOfRange(u8),
}
