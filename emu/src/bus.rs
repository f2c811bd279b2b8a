//! # Bus Interface
//!
//! The core only fetches instruction words. Data accesses are part of the
//! contract so a memory subsystem can be attached later, but the default
//! implementation rejects them and no executor in this crate calls them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bitwise::Bits;

/// Memory access error.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BusFault {
    #[error("unmapped address 0x{0:08X}")]
    Unmapped(u32),

    #[error("misaligned access at 0x{0:08X}")]
    Misaligned(u32),

    #[error("data access is not supported by this bus")]
    Unsupported,
}

/// Width of a data access.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Width {
    Byte,
    HalfWord,
    #[default]
    Word,
}

impl Width {
    #[must_use]
    pub const fn bytes(self) -> u32 {
        match self {
            Self::Byte => 1,
            Self::HalfWord => 2,
            Self::Word => 4,
        }
    }
}

/// Everything the core needs from the outside world.
///
/// All multi-byte accesses are little-endian.
pub trait Bus {
    fn fetch_word(&mut self, address: u32) -> Result<u32, BusFault>;

    fn read(&mut self, address: u32, width: Width) -> Result<u32, BusFault> {
        let _ = (address, width);
        Err(BusFault::Unsupported)
    }

    fn write(&mut self, address: u32, width: Width, value: u32) -> Result<(), BusFault> {
        let _ = (address, width, value);
        Err(BusFault::Unsupported)
    }
}

/// A little-endian byte vector mapped at `base`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatMemory {
    base: u32,
    bytes: Vec<u8>,
}

impl FlatMemory {
    #[must_use]
    pub const fn new(base: u32, bytes: Vec<u8>) -> Self {
        Self { base, bytes }
    }

    /// Lays out `words` one after another starting at `base`.
    #[must_use]
    pub fn from_words(base: u32, words: &[u32]) -> Self {
        let bytes = words.iter().flat_map(|word| word.to_le_bytes()).collect();
        Self { base, bytes }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn offset(&self, address: u32, width: Width) -> Result<usize, BusFault> {
        if address % width.bytes() != 0 {
            return Err(BusFault::Misaligned(address));
        }

        let offset = address
            .checked_sub(self.base)
            .ok_or(BusFault::Unmapped(address))? as usize;

        if offset + width.bytes() as usize > self.bytes.len() {
            return Err(BusFault::Unmapped(address));
        }

        Ok(offset)
    }
}

impl Bus for FlatMemory {
    fn fetch_word(&mut self, address: u32) -> Result<u32, BusFault> {
        self.read(address, Width::Word)
    }

    fn read(&mut self, address: u32, width: Width) -> Result<u32, BusFault> {
        let offset = self.offset(address, width)?;
        let part = |i: usize| u32::from(self.bytes[offset + i]);

        Ok(match width {
            Width::Byte => part(0),
            Width::HalfWord => part(1) << 8 | part(0),
            Width::Word => part(3) << 24 | part(2) << 16 | part(1) << 8 | part(0),
        })
    }

    fn write(&mut self, address: u32, width: Width, value: u32) -> Result<(), BusFault> {
        let offset = self.offset(address, width)?;

        for i in 0..width.bytes() as u8 {
            self.bytes[offset + i as usize] = value.get_bits(i * 8..=i * 8 + 7) as u8;
        }

        Ok(())
    }
}
