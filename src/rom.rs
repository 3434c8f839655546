use std::fs;
use std::ops::Deref;
use std::path::Path;

use crate::chip8::{MAX_ROM_BYTES, PROGRAM_START};
use crate::error::RomError;

/// A Chip8 program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rom {
    code: Vec<u8>,
}

impl Rom {
    /// Returns a new Chip8 ROM.
    ///
    /// This function returns Err if `code.len() > MAX_ROM_BYTES || code.is_empty()`.
    pub fn with_code(code: Vec<u8>) -> Result<Self, RomError> {
        if code.is_empty() {
            return Err(RomError::Empty);
        }
        if code.len() > MAX_ROM_BYTES {
            return Err(RomError::TooLarge { size: code.len(), max: MAX_ROM_BYTES });
        }
        Ok(Rom { code })
    }

    /// Reads and validates a ROM from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RomError> {
        let bytes = fs::read(path)?;
        Rom::with_code(bytes)
    }

    /// Iterates over the ROM as (address, word) pairs, as they'd sit in memory.
    ///
    /// A trailing odd byte is yielded as a one-byte slice.
    pub fn words(&self) -> impl Iterator<Item = (u16, &[u8])> + '_ {
        self.code
            .chunks(2)
            .enumerate()
            .map(|(i, chunk)| (PROGRAM_START + (i * 2) as u16, chunk))
    }
}

impl Deref for Rom {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.code
    }
}
