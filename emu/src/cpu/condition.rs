//! # ARM Conditional Execution
//!
//! Every ARM instruction carries a condition in bits 31-28. The instruction
//! only executes when the CPSR flags satisfy it; otherwise it is skipped and
//! behaves like a NOP.
//!
//! ```text
//! ┌───────┬────────┬─────────────────────┬─────────────────────────────────┐
//! │ Code  │ Suffix │     Meaning         │          Flags Tested           │
//! ├───────┼────────┼─────────────────────┼─────────────────────────────────┤
//! │ 0000  │   EQ   │ Equal               │ Z=1                             │
//! │ 0001  │   NE   │ Not equal           │ Z=0                             │
//! │ 0010  │   CS   │ Carry set / ≥ (uns) │ C=1                             │
//! │ 0011  │   CC   │ Carry clear / < (u) │ C=0                             │
//! │ 0100  │   MI   │ Minus / negative    │ N=1                             │
//! │ 0101  │   PL   │ Plus / non-negative │ N=0                             │
//! │ 0110  │   VS   │ Overflow set        │ V=1                             │
//! │ 0111  │   VC   │ Overflow clear      │ V=0                             │
//! │ 1000  │   HI   │ Higher (unsigned)   │ C=1 AND Z=0                     │
//! │ 1001  │   LS   │ Lower/same (unsig)  │ C=0 OR Z=1                      │
//! │ 1010  │   GE   │ ≥ (signed)          │ N=V                             │
//! │ 1011  │   LT   │ < (signed)          │ N≠V                             │
//! │ 1100  │   GT   │ > (signed)          │ Z=0 AND N=V                     │
//! │ 1101  │   LE   │ ≤ (signed)          │ Z=1 OR N≠V                      │
//! │ 1110  │   AL   │ Always              │ (unconditional)                 │
//! │ 1111  │   --   │ Undefined           │ rejected, never executed        │
//! └───────┴────────┴─────────────────────┴─────────────────────────────────┘
//! ```
//!
//! The `1111` encoding is not a condition on ARMv4T: decoding it fails with
//! [`UndefinedReason::UndefinedCondition`].

use serde::{Deserialize, Serialize};

use crate::error::UndefinedReason;

/// Condition codes for ARM conditional execution.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub enum Condition {
    /// Equal (Z=1)
    EQ = 0x0,

    /// Not equal (Z=0)
    NE = 0x1,

    /// Carry set / unsigned higher or same (C=1)
    CS = 0x2,

    /// Carry clear / unsigned lower (C=0)
    CC = 0x3,

    /// Minus / negative (N=1)
    MI = 0x4,

    /// Plus / positive or zero (N=0)
    PL = 0x5,

    /// Overflow set (V=1)
    VS = 0x6,

    /// Overflow clear (V=0)
    VC = 0x7,

    /// Unsigned higher (C=1 AND Z=0)
    HI = 0x8,

    /// Unsigned lower or same (C=0 OR Z=1)
    LS = 0x9,

    /// Signed greater or equal (N=V)
    GE = 0xA,

    /// Signed less than (N≠V)
    LT = 0xB,

    /// Signed greater than (Z=0 AND N=V)
    GT = 0xC,

    /// Signed less than or equal (Z=1 OR N≠V)
    LE = 0xD,

    /// Always (unconditional)
    AL = 0xE,
}

impl TryFrom<u8> for Condition {
    type Error = UndefinedReason;

    fn try_from(item: u8) -> Result<Self, Self::Error> {
        Ok(match item & 0xF {
            0x0 => Self::EQ,
            0x1 => Self::NE,
            0x2 => Self::CS,
            0x3 => Self::CC,
            0x4 => Self::MI,
            0x5 => Self::PL,
            0x6 => Self::VS,
            0x7 => Self::VC,
            0x8 => Self::HI,
            0x9 => Self::LS,
            0xA => Self::GE,
            0xB => Self::LT,
            0xC => Self::GT,
            0xD => Self::LE,
            0xE => Self::AL,
            _ => return Err(UndefinedReason::UndefinedCondition),
        })
    }
}

impl TryFrom<u32> for Condition {
    type Error = UndefinedReason;

    /// Reads the condition field of a whole instruction word.
    fn try_from(op_code: u32) -> Result<Self, Self::Error> {
        Self::try_from((op_code >> 28) as u8)
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EQ => f.write_str("EQ"),
            Self::NE => f.write_str("NE"),
            Self::CS => f.write_str("CS"),
            Self::CC => f.write_str("CC"),
            Self::MI => f.write_str("MI"),
            Self::PL => f.write_str("PL"),
            Self::VS => f.write_str("VS"),
            Self::VC => f.write_str("VC"),
            Self::HI => f.write_str("HI"),
            Self::LS => f.write_str("LS"),
            Self::GE => f.write_str("GE"),
            Self::LT => f.write_str("LT"),
            Self::GT => f.write_str("GT"),
            Self::LE => f.write_str("LE"),
            Self::AL => Ok(()),
        }
    }
}
