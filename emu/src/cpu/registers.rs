//! # ARM7TDMI Register File
//!
//! The 16 general-purpose registers visible at any time.
//!
//! - **R0-R12**: General purpose
//! - **R13 (SP)**: Stack pointer (by convention)
//! - **R14 (LR)**: Link register (return address)
//! - **R15 (PC)**: Program counter
//!
//! R15 follows the three-stage pipeline: while the instruction at `A` executes
//! it reads `A + 8`, and between steps it holds the next fetch address plus 8.
//! For register banking by mode, see [`register_bank`](super::register_bank).

use serde::{Deserialize, Serialize};

/// Stack Pointer register index.
pub const REG_SP: usize = 0xD;

/// Link Register index (return address for subroutines).
pub const REG_LR: usize = 0xE;

/// Program Counter register index.
pub const REG_PROGRAM_COUNTER: usize = 0xF;

/// The 16 general-purpose registers visible to the CPU.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers([u32; 16]);

impl Registers {
    #[must_use]
    pub const fn program_counter(&self) -> u32 {
        self.0[REG_PROGRAM_COUNTER]
    }

    pub const fn set_program_counter(&mut self, new_value: u32) {
        self.0[REG_PROGRAM_COUNTER] = new_value;
    }

    pub const fn advance_program_counter(&mut self, bytes: u32) {
        self.0[REG_PROGRAM_COUNTER] = self.0[REG_PROGRAM_COUNTER].wrapping_add(bytes);
    }

    pub fn set_register_at(&mut self, reg: usize, new_value: u32) {
        debug_assert!(reg <= 15, "Invalid register index: {reg} (0x{reg:X})");
        self.0[reg] = new_value;
    }

    #[must_use]
    pub const fn register_at(&self, reg: usize) -> u32 {
        self.0[reg]
    }

    /// R8-R12, the part of the file FIQ banks on top of SP and LR.
    #[must_use]
    pub fn high_registers(&self) -> [u32; 5] {
        let mut high = [0; 5];
        high.copy_from_slice(&self.0[8..=12]);
        high
    }

    pub fn set_high_registers(&mut self, values: [u32; 5]) {
        self.0[8..=12].copy_from_slice(&values);
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<u32> {
        self.0.as_slice().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn advance_wraps() {
        let mut registers = Registers::default();
        registers.set_program_counter(0xFFFF_FFFC);
        registers.advance_program_counter(8);
        assert_eq!(registers.program_counter(), 4);
    }

    #[test]
    fn high_registers_window() {
        let mut registers = Registers::default();
        for reg in 0..16 {
            registers.set_register_at(reg, reg as u32);
        }

        assert_eq!(registers.high_registers(), [8, 9, 10, 11, 12]);

        registers.set_high_registers([80, 90, 100, 110, 120]);
        assert_eq!(
            registers.to_vec(),
            vec![0, 1, 2, 3, 4, 5, 6, 7, 80, 90, 100, 110, 120, 13, 14, 15]
        );
    }
}
