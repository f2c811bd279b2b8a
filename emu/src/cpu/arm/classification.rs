//! # Opcode classification
//!
//! ARM encodings overlap: a multiply is also a valid-looking data processing
//! word, BX sits inside the data processing space, and so on. Classification
//! walks an ordered `(mask, value)` table and the first row with
//! `op_code & mask == value` wins, so narrower patterns are listed first.
//!
//! ```text
//!  #  Class                        Mask        Value
//!  1  BX                           0x0FFFFFF0  0x012FFF10
//!  2  MRS                          0x0FBF0FFF  0x010F0000
//!  3  MSR (register)               0x0FB0FFF0  0x0120F000
//!  4  MSR (immediate)              0x0FB0F000  0x0320F000
//!  5  Multiply                     0x0FC000F0  0x00000090
//!  6  Multiply Long                0x0F8000F0  0x00800090
//!  7  Single Data Swap             0x0FB00FF0  0x01000090
//!  8  Halfword, register offset    0x0E400F90  0x00000090
//!  9  Halfword, immediate offset   0x0E400090  0x00400090
//! 10  Undefined                    0x0E000010  0x06000010
//! 11  Single Data Transfer         0x0C000000  0x04000000
//! 12  Block Data Transfer          0x0E000000  0x08000000
//! 13  Branch                       0x0E000000  0x0A000000
//! 14  Coprocessor Data Transfer    0x0E000000  0x0C000000
//! 15  Coprocessor Data Operation   0x0F000010  0x0E000000
//! 16  Coprocessor Register Xfer    0x0F000010  0x0E000010
//! 17  Software Interrupt           0x0F000000  0x0F000000
//! 18  Data Processing              0x0C000000  0x00000000
//! ```
//!
//! Rows 11 to 18 partition bits 27-24 between them, so every word matches
//! at least one row.

use serde::{Deserialize, Serialize};

use crate::error::CpuError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstructionClass {
    BranchAndExchange,
    Mrs,
    MsrRegister,
    MsrImmediate,
    Multiply,
    MultiplyLong,
    SingleDataSwap,
    HalfwordDataTransferRegisterOffset,
    HalfwordDataTransferImmediateOffset,
    Undefined,
    SingleDataTransfer,
    BlockDataTransfer,
    Branch,
    CoprocessorDataTransfer,
    CoprocessorDataOperation,
    CoprocessorRegisterTransfer,
    SoftwareInterrupt,
    DataProcessing,
}

impl std::fmt::Display for InstructionClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::BranchAndExchange => "Branch and Exchange",
            Self::Mrs => "MRS",
            Self::MsrRegister => "MSR (register)",
            Self::MsrImmediate => "MSR (immediate)",
            Self::Multiply => "Multiply",
            Self::MultiplyLong => "Multiply Long",
            Self::SingleDataSwap => "Single Data Swap",
            Self::HalfwordDataTransferRegisterOffset => "Halfword Data Transfer (register offset)",
            Self::HalfwordDataTransferImmediateOffset => {
                "Halfword Data Transfer (immediate offset)"
            }
            Self::Undefined => "Undefined",
            Self::SingleDataTransfer => "Single Data Transfer",
            Self::BlockDataTransfer => "Block Data Transfer",
            Self::Branch => "Branch",
            Self::CoprocessorDataTransfer => "Coprocessor Data Transfer",
            Self::CoprocessorDataOperation => "Coprocessor Data Operation",
            Self::CoprocessorRegisterTransfer => "Coprocessor Register Transfer",
            Self::SoftwareInterrupt => "Software Interrupt",
            Self::DataProcessing => "Data Processing",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeClass {
    pub mask: u32,
    pub value: u32,
    pub class: InstructionClass,
}

impl OpcodeClass {
    const fn new(mask: u32, value: u32, class: InstructionClass) -> Self {
        Self { mask, value, class }
    }

    #[must_use]
    pub const fn matches(&self, op_code: u32) -> bool {
        op_code & self.mask == self.value
    }
}

pub const OPCODE_CLASSES: [OpcodeClass; 18] = {
    use InstructionClass::*;
    [
        OpcodeClass::new(0x0FFF_FFF0, 0x012F_FF10, BranchAndExchange),
        OpcodeClass::new(0x0FBF_0FFF, 0x010F_0000, Mrs),
        OpcodeClass::new(0x0FB0_FFF0, 0x0120_F000, MsrRegister),
        OpcodeClass::new(0x0FB0_F000, 0x0320_F000, MsrImmediate),
        OpcodeClass::new(0x0FC0_00F0, 0x0000_0090, Multiply),
        OpcodeClass::new(0x0F80_00F0, 0x0080_0090, MultiplyLong),
        OpcodeClass::new(0x0FB0_0FF0, 0x0100_0090, SingleDataSwap),
        OpcodeClass::new(0x0E40_0F90, 0x0000_0090, HalfwordDataTransferRegisterOffset),
        OpcodeClass::new(0x0E40_0090, 0x0040_0090, HalfwordDataTransferImmediateOffset),
        OpcodeClass::new(0x0E00_0010, 0x0600_0010, Undefined),
        OpcodeClass::new(0x0C00_0000, 0x0400_0000, SingleDataTransfer),
        OpcodeClass::new(0x0E00_0000, 0x0800_0000, BlockDataTransfer),
        OpcodeClass::new(0x0E00_0000, 0x0A00_0000, Branch),
        OpcodeClass::new(0x0E00_0000, 0x0C00_0000, CoprocessorDataTransfer),
        OpcodeClass::new(0x0F00_0010, 0x0E00_0000, CoprocessorDataOperation),
        OpcodeClass::new(0x0F00_0010, 0x0E00_0010, CoprocessorRegisterTransfer),
        OpcodeClass::new(0x0F00_0000, 0x0F00_0000, SoftwareInterrupt),
        OpcodeClass::new(0x0C00_0000, 0x0000_0000, DataProcessing),
    ]
};

/// Returns the class of the first table row matching `op_code`.
///
/// # Errors
///
/// [`CpuError::ClassificationFailure`] if no row matches, which the table
/// layout rules out for every 32-bit word.
pub fn classify(op_code: u32) -> Result<InstructionClass, CpuError> {
    OPCODE_CLASSES
        .iter()
        .find(|row| row.matches(op_code))
        .map(|row| row.class)
        .ok_or(CpuError::ClassificationFailure { opcode: op_code })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::Rng;

    #[test]
    fn classify_known_encodings() {
        use InstructionClass::*;
        let cases = [
            (0xE12F_FF11, BranchAndExchange), // BX R1
            (0xE10F_0000, Mrs),               // MRS R0, CPSR
            (0xE14F_1000, Mrs),               // MRS R1, SPSR
            (0xE129_F000, MsrRegister),       // MSR CPSR_fc, R0
            (0xE328_F00F, MsrImmediate),      // MSR CPSR_f, #0xF
            (0xE000_0291, Multiply),          // MUL R0, R1, R2
            (0xE021_3192, Multiply),          // MLA R1, R2, R1, R3
            (0xE081_0392, MultiplyLong),      // UMULL R0, R1, R2, R3
            (0xE0E1_0392, MultiplyLong),      // SMLAL R0, R1, R2, R3
            (0xE101_2093, SingleDataSwap),    // SWP R2, R3, [R1]
            (0xE181_00B2, HalfwordDataTransferRegisterOffset), // STRH R0, [R1, R2]
            (0xE1C0_10B0, HalfwordDataTransferImmediateOffset), // STRH R1, [R0]
            (0xE700_0010, Undefined),
            (0xE591_0004, SingleDataTransfer),      // LDR R0, [R1, #4]
            (0xE7D1_500C, SingleDataTransfer),      // LDRB R5, [R1, R12]
            (0xE92D_4000, BlockDataTransfer),       // STMFD SP!, {LR}
            (0xEB00_007F, Branch),                  // BL
            (0xEA00_0000, Branch),                  // B
            (0xED90_0100, CoprocessorDataTransfer), // LDC
            (0xEE00_0000, CoprocessorDataOperation),
            (0xEE00_0010, CoprocessorRegisterTransfer),
            (0xEF00_0000, SoftwareInterrupt),
            (0xE081_0002, DataProcessing), // ADD R0, R1, R2
            (0xE3A0_0001, DataProcessing), // MOV R0, #1
            (0xE1A0_0251, DataProcessing), // MOV R0, R1, ASR R2
            (0xE160_0000, DataProcessing), // CMN R0, R0 without S
        ];

        for (op_code, expected) in cases {
            assert_eq!(classify(op_code), Ok(expected), "0x{op_code:08X}");
        }
    }

    #[test]
    fn classification_is_total() {
        let mut rng = rand::thread_rng();
        for _ in 0..200_000 {
            let op_code = rng.gen_range(0..=u32::MAX);
            assert!(classify(op_code).is_ok(), "0x{op_code:08X}");
        }

        // Every combination of the discriminating bits 27-20 and 7-4.
        for high in 0..=0xFF_u32 {
            for low in 0..=0xF_u32 {
                for filler in [0, 0xF00F_FF0F] {
                    let op_code = filler | (high << 20) | (low << 4);
                    assert!(classify(op_code).is_ok(), "0x{op_code:08X}");
                }
            }
        }
    }

    #[test]
    fn values_fit_their_masks() {
        for row in OPCODE_CLASSES {
            assert_eq!(row.value & !row.mask, 0, "{}", row.class);
            assert_eq!(row.mask >> 28, 0, "{} looks at the condition", row.class);
        }
    }

    #[test]
    fn no_row_is_shadowed_by_a_broader_one() {
        // If two rows can match the same word, the earlier one must not be
        // strictly broader, otherwise the later one loses words it should own.
        for (i, earlier) in OPCODE_CLASSES.iter().enumerate() {
            for later in &OPCODE_CLASSES[i + 1..] {
                let common = earlier.mask & later.mask;
                let overlap = earlier.value & common == later.value & common;
                let earlier_strictly_broader =
                    earlier.mask & later.mask == earlier.mask && earlier.mask != later.mask;

                assert!(
                    !(overlap && earlier_strictly_broader),
                    "{} shadows {}",
                    earlier.class,
                    later.class
                );
            }
        }
    }

    #[test]
    fn every_row_owns_its_own_value() {
        // The canonical word of each row is classified as that row.
        for row in OPCODE_CLASSES {
            let first = OPCODE_CLASSES.iter().find(|r| r.matches(row.value)).unwrap();
            let owner = first.class;
            if owner != row.class {
                // Only allowed when the earlier row is narrower.
                assert_ne!(first.mask & row.mask, first.mask, "{} hides {}", owner, row.class);
            }
        }
    }
}
