//! Errors surfaced by the core.
//!
//! A failing step never leaves a partial update behind: every executor
//! validates its operands before it touches a register or the CPSR.

use thiserror::Error;

use crate::bus::BusFault;
use crate::cpu::arm::classification::InstructionClass;
use crate::cpu::cpu_modes::Mode;

/// Why an instruction was rejected as undefined.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum UndefinedReason {
    #[error("condition code 0b1111 is reserved")]
    UndefinedCondition,

    #[error("r15 cannot be used as this operand")]
    ProgramCounterOperand,

    #[error("destination and source registers overlap")]
    RegisterConflict,

    #[error("there is no SPSR in {0} mode")]
    NoSpsr(Mode),

    #[error("control field can only be written from a register")]
    ControlWriteFromImmediate,

    #[error("control field is read-only in User mode")]
    ControlWriteInUserMode,

    #[error("0b{0:05b} is not a processor mode")]
    InvalidMode(u32),

    #[error("comparison encoded without the S bit")]
    MissingSetFlags,

    #[error("no coprocessor is attached")]
    NoCoprocessor,

    #[error("encoding is architecturally undefined")]
    UndefinedEncoding,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CpuError {
    #[error("undefined instruction 0x{opcode:08X}: {reason}")]
    UndefinedInstruction { opcode: u32, reason: UndefinedReason },

    #[error("0x{opcode:08X} matches no instruction class")]
    ClassificationFailure { opcode: u32 },

    #[error("instruction fetch at 0x{address:08X} failed: {fault}")]
    FetchFault { address: u32, fault: BusFault },

    #[error("{class} instruction 0x{opcode:08X} needs a memory subsystem")]
    Unsupported { opcode: u32, class: InstructionClass },

    #[error("Thumb state at 0x{address:08X}: no Thumb decoder")]
    ThumbState { address: u32 },

    #[error("barrel shifter got an unreduced rotate amount {amount}")]
    ShifterInconsistency { amount: u32 },
}

impl CpuError {
    pub(crate) const fn undefined(opcode: u32, reason: UndefinedReason) -> Self {
        Self::UndefinedInstruction { opcode, reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn display_undefined_instruction() {
        let error = CpuError::undefined(0xF000_0000, UndefinedReason::UndefinedCondition);
        assert_eq!(
            error.to_string(),
            "undefined instruction 0xF0000000: condition code 0b1111 is reserved"
        );

        let error = CpuError::undefined(0xE14F_0000, UndefinedReason::NoSpsr(Mode::User));
        assert_eq!(
            error.to_string(),
            "undefined instruction 0xE14F0000: there is no SPSR in usr mode"
        );
    }

    #[test]
    fn display_fetch_fault() {
        let error = CpuError::FetchFault {
            address: 0x100,
            fault: BusFault::Unmapped(0x100),
        };
        assert_eq!(
            error.to_string(),
            "instruction fetch at 0x00000100 failed: unmapped address 0x00000100"
        );
    }
}
