//! # ARM Instruction Decoding
//!
//! Turns a classified 32-bit word into its typed fields. Only the classes this
//! core executes are decoded field by field; load/store and coprocessor words
//! keep just their class.
//!
//! ## Instruction Encoding Example
//!
//! ```text
//! ADD R0, R1, R2, LSL #3
//!
//! 31-28  27-26  25  24-21  20  19-16  15-12  11-7   6-5  4  3-0
//! [1110] [ 00 ] [0] [0100] [0] [0001] [0000] [00011][00] [0][0010]
//!   ↑       ↑    ↑    ↑     ↑    ↑      ↑      ↑     ↑   ↑   ↑
//!   │       │    │    │     │    │      │      │     │   │   └─ Rm = R2
//!   │       │    │    │     │    │      │      │     │   └──── Shift by imm
//!   │       │    │    │     │    │      │      │     └──────── LSL
//!   │       │    │    │     │    │      │      └────────────── Shift = 3
//!   │       │    │    │     │    │      └───────────────────── Rd = R0
//!   │       │    │    │     │    └──────────────────────────── Rn = R1
//!   │       │    │    │     └───────────────────────────────── S = 0 (no flags)
//!   │       │    │    └─────────────────────────────────────── ADD opcode
//!   │       │    └──────────────────────────────────────────── Register operand
//!   │       └───────────────────────────────────────────────── Data processing
//!   └───────────────────────────────────────────────────────── Always execute
//! ```

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::arm::alu_instruction::{
    AluSecondOperandInfo, ArmModeAluInstruction, MsrOperand, PsrKind, PsrOpKind, ShiftOperator,
};
use crate::cpu::arm::classification::InstructionClass;
use crate::cpu::condition::Condition;
use crate::cpu::flags::{OperandKind, ShiftKind};
use crate::cpu::registers::REG_PROGRAM_COUNTER;
use crate::error::{CpuError, UndefinedReason};

/// A decoded ARM instruction, without its condition.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum ArmModeInstruction {
    /// Data Processing: ALU operations (AND, ADD, CMP, MOV, etc.)
    DataProcessing {
        alu_instruction: ArmModeAluInstruction,
        set_conditions: bool,
        op_kind: OperandKind,
        rn: usize,
        destination: usize,
        op2: AluSecondOperandInfo,
    },
    Multiply {
        variant: ArmModeMultiplyVariant,
        should_set_codes: bool,
        rd_destination_register: usize,
        rn_accumulate_register: usize,
        rs_operand_register: usize,
        rm_operand_register: usize,
    },
    MultiplyLong {
        variant: ArmModeMultiplyLongVariant,
        should_set_codes: bool,
        rdhi_destination_register: usize,
        rdlo_destination_register: usize,
        rs_operand_register: usize,
        rm_operand_register: usize,
    },
    PsrTransfer {
        psr_kind: PsrKind,
        kind: PsrOpKind,
    },
    BranchAndExchange {
        register: usize,
    },
    Branch {
        link: bool,
        /// Byte offset from r15, already sign extended.
        offset: i32,
    },
    SoftwareInterrupt {
        comment: u32,
    },
    /// Swap, halfword, single and block transfers.
    MemoryTransfer {
        class: InstructionClass,
    },
    Coprocessor {
        class: InstructionClass,
    },
    Undefined,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArmModeMultiplyVariant {
    Mul,
    Mla,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArmModeMultiplyLongVariant {
    Umull,
    Umlal,
    Smull,
    Smlal,
}

impl ArmModeMultiplyLongVariant {
    #[must_use]
    pub const fn is_signed(self) -> bool {
        matches!(self, Self::Smull | Self::Smlal)
    }

    #[must_use]
    pub const fn accumulates(self) -> bool {
        matches!(self, Self::Umlal | Self::Smlal)
    }
}

impl std::fmt::Display for ArmModeMultiplyLongVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Umull => f.write_str("UMULL"),
            Self::Umlal => f.write_str("UMLAL"),
            Self::Smull => f.write_str("SMULL"),
            Self::Smlal => f.write_str("SMLAL"),
        }
    }
}

impl From<u32> for ArmModeMultiplyVariant {
    /// Bit 21 is the accumulate bit.
    fn from(op_code: u32) -> Self {
        if op_code.get_bit(21) { Self::Mla } else { Self::Mul }
    }
}

impl From<u32> for ArmModeMultiplyLongVariant {
    /// Bit 22 selects signed, bit 21 accumulate.
    fn from(op_code: u32) -> Self {
        match op_code.get_bits(21..=22) {
            0b00 => Self::Umull,
            0b01 => Self::Umlal,
            0b10 => Self::Smull,
            _ => Self::Smlal,
        }
    }
}

fn register_at(op_code: u32, lowest_bit: u8) -> usize {
    op_code.get_bits(lowest_bit..=lowest_bit + 3) as usize
}

impl ArmModeInstruction {
    /// Decodes the fields of `op_code`, already known to be of `class`.
    ///
    /// # Errors
    ///
    /// Data processing words with a register-specified shift are rejected as
    /// [`CpuError::UndefinedInstruction`] when Rs is r15 or bit 7 is set.
    pub fn decode(class: InstructionClass, op_code: u32) -> Result<Self, CpuError> {
        use InstructionClass::*;
        let instruction = match class {
            DataProcessing => Self::decode_data_processing(op_code)?,
            Multiply => Self::Multiply {
                variant: ArmModeMultiplyVariant::from(op_code),
                should_set_codes: op_code.get_bit(20),
                rd_destination_register: register_at(op_code, 16),
                rn_accumulate_register: register_at(op_code, 12),
                rs_operand_register: register_at(op_code, 8),
                rm_operand_register: register_at(op_code, 0),
            },
            MultiplyLong => Self::MultiplyLong {
                variant: ArmModeMultiplyLongVariant::from(op_code),
                should_set_codes: op_code.get_bit(20),
                rdhi_destination_register: register_at(op_code, 16),
                rdlo_destination_register: register_at(op_code, 12),
                rs_operand_register: register_at(op_code, 8),
                rm_operand_register: register_at(op_code, 0),
            },
            Mrs => Self::PsrTransfer {
                psr_kind: Self::psr_kind(op_code),
                kind: PsrOpKind::Mrs {
                    destination_register: register_at(op_code, 12),
                },
            },
            MsrRegister | MsrImmediate => {
                let operand = if class == MsrImmediate {
                    MsrOperand::Immediate {
                        base: op_code.get_bits(0..=7),
                        shift: op_code.get_bits(8..=11) * 2,
                    }
                } else {
                    MsrOperand::Register(register_at(op_code, 0))
                };

                Self::PsrTransfer {
                    psr_kind: Self::psr_kind(op_code),
                    kind: PsrOpKind::Msr {
                        operand,
                        write_flags: op_code.get_bit(19),
                        write_control: op_code.get_bit(16),
                    },
                }
            }
            BranchAndExchange => Self::BranchAndExchange {
                register: register_at(op_code, 0),
            },
            Branch => Self::Branch {
                link: op_code.get_bit(24),
                offset: (op_code.get_bits(0..=23) << 2).sign_extended(26) as i32,
            },
            SoftwareInterrupt => Self::SoftwareInterrupt {
                comment: op_code.get_bits(0..=23),
            },
            SingleDataSwap
            | HalfwordDataTransferRegisterOffset
            | HalfwordDataTransferImmediateOffset
            | SingleDataTransfer
            | BlockDataTransfer => Self::MemoryTransfer { class },
            CoprocessorDataTransfer | CoprocessorDataOperation | CoprocessorRegisterTransfer => {
                Self::Coprocessor { class }
            }
            Undefined => Self::Undefined,
        };

        Ok(instruction)
    }

    fn psr_kind(op_code: u32) -> PsrKind {
        if op_code.get_bit(22) {
            PsrKind::Spsr
        } else {
            PsrKind::Cpsr
        }
    }

    fn decode_data_processing(op_code: u32) -> Result<Self, CpuError> {
        let op_kind = OperandKind::from(op_code.get_bit(25));

        let op2 = match op_kind {
            OperandKind::Immediate => AluSecondOperandInfo::Immediate {
                base: op_code.get_bits(0..=7),
                shift: op_code.get_bits(8..=11) * 2,
            },
            OperandKind::Register => {
                let shift_op = if op_code.get_bit(4) {
                    // Register shifts need bit 7 clear, the other
                    // combinations belong to multiplies and halfword transfers.
                    if op_code.get_bit(7) {
                        return Err(CpuError::undefined(
                            op_code,
                            UndefinedReason::UndefinedEncoding,
                        ));
                    }

                    let rs = register_at(op_code, 8);
                    if rs == REG_PROGRAM_COUNTER {
                        return Err(CpuError::undefined(
                            op_code,
                            UndefinedReason::ProgramCounterOperand,
                        ));
                    }
                    ShiftOperator::Register(rs)
                } else {
                    ShiftOperator::Immediate(op_code.get_bits(7..=11))
                };

                AluSecondOperandInfo::Register {
                    shift_op,
                    shift_kind: ShiftKind::from(op_code.get_bits(5..=6)),
                    register: register_at(op_code, 0),
                }
            }
        };

        Ok(Self::DataProcessing {
            alu_instruction: ArmModeAluInstruction::from(op_code.get_bits(21..=24)),
            set_conditions: op_code.get_bit(20),
            op_kind,
            rn: register_at(op_code, 16),
            destination: register_at(op_code, 12),
            op2,
        })
    }

    #[must_use]
    pub fn disassembler(&self, condition: Condition) -> String {
        let s = |set: bool| if set { "S" } else { "" };
        match self {
            Self::DataProcessing {
                alu_instruction,
                set_conditions,
                rn,
                destination,
                op2,
                ..
            } => {
                if alu_instruction.is_test() {
                    format!("{alu_instruction}{condition} R{rn}, {op2}")
                } else if alu_instruction.is_move() {
                    format!(
                        "{alu_instruction}{condition}{} R{destination}, {op2}",
                        s(*set_conditions)
                    )
                } else {
                    format!(
                        "{alu_instruction}{condition}{} R{destination}, R{rn}, {op2}",
                        s(*set_conditions)
                    )
                }
            }
            Self::Multiply {
                variant,
                should_set_codes,
                rd_destination_register,
                rn_accumulate_register,
                rs_operand_register,
                rm_operand_register,
            } => match variant {
                ArmModeMultiplyVariant::Mul => format!(
                    "MUL{condition}{} R{rd_destination_register}, R{rm_operand_register}, R{rs_operand_register}",
                    s(*should_set_codes)
                ),
                ArmModeMultiplyVariant::Mla => format!(
                    "MLA{condition}{} R{rd_destination_register}, R{rm_operand_register}, R{rs_operand_register}, R{rn_accumulate_register}",
                    s(*should_set_codes)
                ),
            },
            Self::MultiplyLong {
                variant,
                should_set_codes,
                rdhi_destination_register,
                rdlo_destination_register,
                rs_operand_register,
                rm_operand_register,
            } => format!(
                "{variant}{condition}{} R{rdlo_destination_register}, R{rdhi_destination_register}, R{rm_operand_register}, R{rs_operand_register}",
                s(*should_set_codes)
            ),
            Self::PsrTransfer { psr_kind, kind } => match kind {
                PsrOpKind::Mrs {
                    destination_register,
                } => format!("MRS{condition} R{destination_register}, {psr_kind}"),
                PsrOpKind::Msr {
                    operand,
                    write_flags,
                    write_control,
                } => {
                    let fields = match (*write_flags, *write_control) {
                        (true, true) => "_fc",
                        (true, false) => "_f",
                        (false, true) => "_c",
                        (false, false) => "",
                    };
                    format!("MSR{condition} {psr_kind}{fields}, {operand}")
                }
            },
            Self::BranchAndExchange { register } => format!("BX{condition} R{register}"),
            Self::Branch { link, offset } => {
                let link = if *link { "L" } else { "" };
                let sign = if offset.is_negative() { '-' } else { '+' };
                format!(
                    "B{link}{condition} PC{sign}0x{:X}",
                    offset.unsigned_abs()
                )
            }
            Self::SoftwareInterrupt { comment } => format!("SWI{condition} 0x{comment:06X}"),
            Self::MemoryTransfer { class } | Self::Coprocessor { class } => {
                format!("<{class}>{condition}")
            }
            Self::Undefined => format!("UND{condition}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::arm::classification::classify;
    use pretty_assertions::assert_eq;

    fn decode(op_code: u32) -> Result<ArmModeInstruction, CpuError> {
        ArmModeInstruction::decode(classify(op_code)?, op_code)
    }

    #[test]
    fn decode_branch() {
        let output = decode(0b1110_1011_0000_0000_0000_0000_0111_1111).unwrap();
        assert_eq!(
            output,
            ArmModeInstruction::Branch {
                link: true,
                offset: 508,
            }
        );
        assert_eq!("BL PC+0x1FC", output.disassembler(Condition::AL));
    }

    #[test]
    fn decode_branch_backwards() {
        // B . (offset -8 lands on itself)
        let output = decode(0xEAFF_FFFE).unwrap();
        assert_eq!(
            output,
            ArmModeInstruction::Branch {
                link: false,
                offset: -8,
            }
        );
        assert_eq!("BNE PC-0x8", output.disassembler(Condition::NE));
    }

    #[test]
    fn decode_data_processing() {
        let output = decode(0xE081_0182).unwrap();
        assert_eq!(
            output,
            ArmModeInstruction::DataProcessing {
                alu_instruction: ArmModeAluInstruction::Add,
                set_conditions: false,
                op_kind: OperandKind::Register,
                rn: 1,
                destination: 0,
                op2: AluSecondOperandInfo::Register {
                    shift_op: ShiftOperator::Immediate(3),
                    shift_kind: ShiftKind::Lsl,
                    register: 2,
                },
            }
        );
        assert_eq!("ADD R0, R1, R2, LSL #3", output.disassembler(Condition::AL));

        let output = decode(0xE3B0_0CFF).unwrap();
        assert_eq!("MOVS R0, #0xFF00", output.disassembler(Condition::AL));

        let output = decode(0xE155_0006).unwrap();
        assert_eq!("CMP R5, R6", output.disassembler(Condition::AL));
    }

    #[test]
    fn decode_register_shift_rejects_pc() {
        // MOV R0, R1, LSL R15
        assert_eq!(
            decode(0xE1A0_0F11),
            Err(CpuError::UndefinedInstruction {
                opcode: 0xE1A0_0F11,
                reason: UndefinedReason::ProgramCounterOperand,
            })
        );
    }

    #[test]
    fn decode_register_shift_rejects_bit_7() {
        assert_eq!(
            decode(0xE181_0391),
            Err(CpuError::UndefinedInstruction {
                opcode: 0xE181_0391,
                reason: UndefinedReason::UndefinedEncoding,
            })
        );
    }

    #[test]
    fn decode_multiply() {
        let output = decode(0xE021_3192).unwrap();
        assert_eq!(
            output,
            ArmModeInstruction::Multiply {
                variant: ArmModeMultiplyVariant::Mla,
                should_set_codes: false,
                rd_destination_register: 1,
                rn_accumulate_register: 3,
                rs_operand_register: 1,
                rm_operand_register: 2,
            }
        );
        assert_eq!("MLA R1, R2, R1, R3", output.disassembler(Condition::AL));
    }

    #[test]
    fn decode_multiply_long() {
        let output = decode(0xE0D1_0392).unwrap();
        assert_eq!(
            output,
            ArmModeInstruction::MultiplyLong {
                variant: ArmModeMultiplyLongVariant::Smull,
                should_set_codes: true,
                rdhi_destination_register: 1,
                rdlo_destination_register: 0,
                rs_operand_register: 3,
                rm_operand_register: 2,
            }
        );
        assert_eq!("SMULLS R0, R1, R2, R3", output.disassembler(Condition::AL));
    }

    #[test]
    fn decode_psr_transfer() {
        let output = decode(0xE14F_1000).unwrap();
        assert_eq!(
            output,
            ArmModeInstruction::PsrTransfer {
                psr_kind: PsrKind::Spsr,
                kind: PsrOpKind::Mrs {
                    destination_register: 1
                },
            }
        );
        assert_eq!("MRS R1, SPSR", output.disassembler(Condition::AL));

        let output = decode(0xE129_F00E).unwrap();
        assert_eq!(
            output,
            ArmModeInstruction::PsrTransfer {
                psr_kind: PsrKind::Cpsr,
                kind: PsrOpKind::Msr {
                    operand: MsrOperand::Register(14),
                    write_flags: true,
                    write_control: true,
                },
            }
        );
        assert_eq!("MSR CPSR_fc, R14", output.disassembler(Condition::AL));

        let output = decode(0xE328_F20F).unwrap();
        assert_eq!(
            output,
            ArmModeInstruction::PsrTransfer {
                psr_kind: PsrKind::Cpsr,
                kind: PsrOpKind::Msr {
                    operand: MsrOperand::Immediate { base: 0xF, shift: 4 },
                    write_flags: true,
                    write_control: false,
                },
            }
        );
        assert_eq!("MSR CPSR_f, #0xF0000000", output.disassembler(Condition::AL));
    }

    #[test]
    fn decode_unexecuted_classes() {
        assert_eq!(
            decode(0xE591_0004),
            Ok(ArmModeInstruction::MemoryTransfer {
                class: InstructionClass::SingleDataTransfer
            })
        );
        assert_eq!(
            decode(0xEE00_0010),
            Ok(ArmModeInstruction::Coprocessor {
                class: InstructionClass::CoprocessorRegisterTransfer
            })
        );
        assert_eq!(decode(0xE700_0010), Ok(ArmModeInstruction::Undefined));
        assert_eq!(
            decode(0xEF00_00AB),
            Ok(ArmModeInstruction::SoftwareInterrupt { comment: 0xAB })
        );
    }
}
