//! # ALU operations and barrel shifter
//!
//! Operand 2 of every data processing instruction goes through the barrel
//! shifter before reaching the ALU:
//!
//! ```text
//! Immediate:  [rotate:4][imm8:8]            imm8 ROR (2 * rotate)
//! Register:   [amount:5][kind:2][0][Rm:4]   Rm <kind> #amount
//!             [Rs:4][0][kind:2][1][Rm:4]    Rm <kind> (Rs & 0xFF)
//! ```
//!
//! The shifter also produces a carry-out which logical operations copy into C.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::flags::ShiftKind;
use crate::error::CpuError;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum ArmModeAluInstruction {
    And = 0x0,
    Eor = 0x1,
    Sub = 0x2,
    Rsb = 0x3,
    Add = 0x4,
    Adc = 0x5,
    Sbc = 0x6,
    Rsc = 0x7,
    Tst = 0x8,
    Teq = 0x9,
    Cmp = 0xA,
    Cmn = 0xB,
    Orr = 0xC,
    Mov = 0xD,
    Bic = 0xE,
    Mvn = 0xF,
}

impl ArmModeAluInstruction {
    /// TST, TEQ, CMP and CMN only set flags, Rd is never written.
    #[must_use]
    pub const fn is_test(self) -> bool {
        matches!(self, Self::Tst | Self::Teq | Self::Cmp | Self::Cmn)
    }

    /// MOV and MVN ignore Rn.
    #[must_use]
    pub const fn is_move(self) -> bool {
        matches!(self, Self::Mov | Self::Mvn)
    }
}

impl Display for ArmModeAluInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::And => f.write_str("AND"),
            Self::Eor => f.write_str("EOR"),
            Self::Sub => f.write_str("SUB"),
            Self::Rsb => f.write_str("RSB"),
            Self::Add => f.write_str("ADD"),
            Self::Adc => f.write_str("ADC"),
            Self::Sbc => f.write_str("SBC"),
            Self::Rsc => f.write_str("RSC"),
            Self::Tst => f.write_str("TST"),
            Self::Teq => f.write_str("TEQ"),
            Self::Cmp => f.write_str("CMP"),
            Self::Cmn => f.write_str("CMN"),
            Self::Orr => f.write_str("ORR"),
            Self::Mov => f.write_str("MOV"),
            Self::Bic => f.write_str("BIC"),
            Self::Mvn => f.write_str("MVN"),
        }
    }
}

impl From<u32> for ArmModeAluInstruction {
    /// Takes the 4-bit opcode field (bits 24-21 moved down to bit 0).
    fn from(alu_op_code: u32) -> Self {
        use ArmModeAluInstruction::*;
        match alu_op_code & 0xF {
            0x0 => And,
            0x1 => Eor,
            0x2 => Sub,
            0x3 => Rsb,
            0x4 => Add,
            0x5 => Adc,
            0x6 => Sbc,
            0x7 => Rsc,
            0x8 => Tst,
            0x9 => Teq,
            0xA => Cmp,
            0xB => Cmn,
            0xC => Orr,
            0xD => Mov,
            0xE => Bic,
            _ => Mvn,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ArithmeticOpResult {
    pub result: u32,
    pub carry: bool,
    pub overflow: bool,
    pub sign: bool,
    pub zero: bool,
}

/// Where a register operand takes its shift amount from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShiftOperator {
    /// 5-bit amount encoded in bits 11-7.
    Immediate(u32),
    /// Register index from bits 11-8, only its low byte is used.
    Register(usize),
}

impl Display for ShiftOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Immediate(value) => write!(f, "#{value}"),
            Self::Register(register) => write!(f, "R{register}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AluSecondOperandInfo {
    Register {
        shift_op: ShiftOperator,
        shift_kind: ShiftKind,
        register: usize,
    },
    Immediate {
        base: u32,
        /// Rotate amount already doubled.
        shift: u32,
    },
}

impl AluSecondOperandInfo {
    /// A register-specified shift takes one more cycle, so r15 reads 4 further ahead.
    #[must_use]
    pub const fn shifts_by_register(self) -> bool {
        matches!(
            self,
            Self::Register {
                shift_op: ShiftOperator::Register(_),
                ..
            }
        )
    }
}

impl Display for AluSecondOperandInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Register {
                shift_op: ShiftOperator::Immediate(0),
                shift_kind: ShiftKind::Lsl,
                register,
            } => write!(f, "R{register}"),
            Self::Register {
                shift_op: ShiftOperator::Immediate(0),
                shift_kind: ShiftKind::Ror,
                register,
            } => write!(f, "R{register}, RRX"),
            Self::Register {
                shift_op,
                shift_kind,
                register,
            } => write!(f, "R{register}, {shift_kind} {shift_op}"),
            Self::Immediate { base, shift } => write!(f, "#0x{:X}", base.rotate_right(*shift)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PsrKind {
    Cpsr,
    Spsr,
}

impl Display for PsrKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cpsr => f.write_str("CPSR"),
            Self::Spsr => f.write_str("SPSR"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MsrOperand {
    Register(usize),
    Immediate { base: u32, shift: u32 },
}

impl Display for MsrOperand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Register(register) => write!(f, "R{register}"),
            Self::Immediate { base, shift } => write!(f, "#0x{:X}", base.rotate_right(*shift)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PsrOpKind {
    Mrs {
        destination_register: usize,
    },
    Msr {
        operand: MsrOperand,
        /// Field mask bit 19, N Z C V.
        write_flags: bool,
        /// Field mask bit 16, mode T F I.
        write_control: bool,
    },
}

/// Shift amount after operand fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftAmount {
    /// From the instruction word. Zero encodes LSR #32, ASR #32 and RRX.
    Immediate(u32),
    /// Low byte of Rs. Zero leaves the operand and C untouched.
    Register(u32),
}

const fn shifted(result: u32, carry: bool) -> ArithmeticOpResult {
    ArithmeticOpResult {
        result,
        carry,
        overflow: false,
        sign: false,
        zero: false,
    }
}

/// Runs the barrel shifter and returns the shifted value with its carry-out.
///
/// # Errors
///
/// An immediate rotate amount above 32 cannot be encoded and means the
/// operand was built wrong: [`CpuError::ShifterInconsistency`].
pub fn shift(
    kind: ShiftKind,
    shift_amount: ShiftAmount,
    rm: u32,
    carry: bool,
) -> Result<ArithmeticOpResult, CpuError> {
    let amount = match shift_amount {
        ShiftAmount::Register(0) => return Ok(shifted(rm, carry)),
        // ROR by n and by n - 32 only differ in the carry when n == 32.
        ShiftAmount::Register(amount) if kind == ShiftKind::Ror => (amount - 1) % 32 + 1,
        ShiftAmount::Register(amount) => amount,
        ShiftAmount::Immediate(0) => {
            return Ok(match kind {
                // LSL#0: No shift performed, ie. directly value=Rm, the C flag is NOT affected.
                ShiftKind::Lsl => shifted(rm, carry),
                ShiftKind::Lsr => shifted(0, rm.get_bit(31)),
                ShiftKind::Asr => shifted(((rm as i32) >> 31) as u32, rm.get_bit(31)),
                // RRX
                ShiftKind::Ror => shifted((u32::from(carry) << 31) | (rm >> 1), rm.get_bit(0)),
            });
        }
        ShiftAmount::Immediate(amount) => amount,
    };

    let result = match kind {
        ShiftKind::Lsl => match amount {
            1..=31 => shifted(rm << amount, rm.get_bit((32 - amount) as u8)),
            32 => shifted(0, rm.get_bit(0)),
            _ => shifted(0, false),
        },
        ShiftKind::Lsr => match amount {
            1..=31 => shifted(rm >> amount, rm.get_bit((amount - 1) as u8)),
            32 => shifted(0, rm.get_bit(31)),
            _ => shifted(0, false),
        },
        ShiftKind::Asr => match amount {
            1..=31 => shifted(
                ((rm as i32) >> amount) as u32,
                rm.get_bit((amount - 1) as u8),
            ),
            _ => shifted(((rm as i32) >> 31) as u32, rm.get_bit(31)),
        },
        ShiftKind::Ror => match amount {
            1..=32 => {
                let result = rm.rotate_right(amount);
                shifted(result, result.get_bit(31))
            }
            _ => return Err(CpuError::ShifterInconsistency { amount }),
        },
    };

    Ok(result)
}

/// Immediate operand 2: `base` rotated right by `shift` (already doubled).
#[must_use]
pub fn rotated_immediate(base: u32, shift: u32, carry: bool) -> ArithmeticOpResult {
    let result = base.rotate_right(shift);
    let carry = if shift == 0 { carry } else { result.get_bit(31) };
    shifted(result, carry)
}
