use crate::bitwise::Bits;
use crate::bus::Bus;
use crate::cpu::arm::alu_instruction::{
    AluSecondOperandInfo, ArithmeticOpResult, ArmModeAluInstruction, MsrOperand, PsrKind,
    PsrOpKind, ShiftAmount, ShiftOperator, rotated_immediate, shift,
};
use crate::cpu::arm::instructions::{ArmModeMultiplyLongVariant, ArmModeMultiplyVariant};
use crate::cpu::arm7tdmi::{Arm7tdmi, SIZE_OF_ARM_INSTRUCTION};
use crate::cpu::cpu_modes::Mode;
use crate::cpu::psr::CpuState;
use crate::cpu::registers::{REG_LR, REG_PROGRAM_COUNTER};
use crate::error::{CpuError, UndefinedReason};

impl<B: Bus> Arm7tdmi<B> {
    /// # Errors
    ///
    /// [`CpuError::UndefinedInstruction`] for a comparison without S, or for
    /// S with Rd = r15 when there is no SPSR or it holds invalid mode bits.
    /// [`CpuError::ShifterInconsistency`] from the barrel shifter.
    pub fn data_processing(
        &mut self,
        op_code: u32,
        alu_instruction: ArmModeAluInstruction,
        set_conditions: bool,
        rn: usize,
        destination: usize,
        op2: AluSecondOperandInfo,
    ) -> Result<Option<u32>, CpuError> {
        // TST, TEQ, CMP and CMN with S clear are the PSR transfer encodings.
        // Whatever is left here is malformed.
        if alu_instruction.is_test() && !set_conditions {
            return Err(CpuError::undefined(
                op_code,
                UndefinedReason::MissingSetFlags,
            ));
        }

        let op1 = self.read_alu_register(rn, op2);
        let shifter = self.get_operand(op2)?;
        let result = self.alu(alu_instruction, op1, shifter);

        let writes_pc = !alu_instruction.is_test() && destination == REG_PROGRAM_COUNTER;

        // S = 1 and Rd = R15 is the return from an exception: SPSR goes back
        // into CPSR instead of the flags being set from the result.
        if set_conditions && writes_pc {
            let spsr = self
                .spsr()
                .map_err(|reason| CpuError::undefined(op_code, reason))?;
            spsr.try_mode()
                .map_err(|reason| CpuError::undefined(op_code, reason))?;

            self.registers.set_register_at(destination, result.result);
            self.set_cpsr(spsr);

            return Ok(None);
        }

        if !alu_instruction.is_test() {
            self.registers.set_register_at(destination, result.result);
        }

        if set_conditions {
            self.cpsr.set_flags(&result);
        }

        Ok(if writes_pc {
            None
        } else {
            Some(SIZE_OF_ARM_INSTRUCTION)
        })
    }

    /// Resolves operand 2 through the barrel shifter. Registers are only read.
    ///
    /// # Errors
    ///
    /// [`CpuError::ShifterInconsistency`] if the shifter is handed an
    /// unreduced rotate amount.
    pub fn get_operand(
        &self,
        op2: AluSecondOperandInfo,
    ) -> Result<ArithmeticOpResult, CpuError> {
        let carry = self.cpsr.carry_flag();

        match op2 {
            AluSecondOperandInfo::Immediate { base, shift } => {
                Ok(rotated_immediate(base, shift, carry))
            }
            AluSecondOperandInfo::Register {
                shift_op,
                shift_kind,
                register,
            } => {
                let rm = self.read_alu_register(register, op2);
                let amount = match shift_op {
                    ShiftOperator::Immediate(amount) => ShiftAmount::Immediate(amount),
                    // only the lower 8 bits of Rs are used
                    ShiftOperator::Register(rs) => {
                        ShiftAmount::Register(self.registers.register_at(rs) & 0xFF)
                    }
                };

                shift(shift_kind, amount, rm, carry)
            }
        }
    }

    fn read_alu_register(&self, register: usize, op2: AluSecondOperandInfo) -> u32 {
        let value = self.registers.register_at(register);
        if register == REG_PROGRAM_COUNTER {
            value.wrapping_add(Self::get_pc_offset_alu(op2))
        } else {
            value
        }
    }

    /// Returns the offset that has to be applied to the value read from `PC`
    /// by a data processing (ALU) instruction.
    ///
    /// While the instruction at `X` executes, `PC` reads `X+8`. When the shift
    /// amount comes from a register the instruction takes one more cycle and
    /// `PC` reads `X+12`.
    pub(crate) const fn get_pc_offset_alu(op2: AluSecondOperandInfo) -> u32 {
        if op2.shifts_by_register() { 4 } else { 0 }
    }

    fn alu(
        &self,
        alu_instruction: ArmModeAluInstruction,
        op1: u32,
        shifter: ArithmeticOpResult,
    ) -> ArithmeticOpResult {
        use ArmModeAluInstruction::*;

        let op2 = shifter.result;
        let carry = self.cpsr.carry_flag();
        let logical = |result: u32| ArithmeticOpResult {
            result,
            carry: shifter.carry,
            overflow: self.cpsr.overflow_flag(),
            sign: result.get_bit(31),
            zero: result == 0,
        };

        match alu_instruction {
            And | Tst => logical(op1 & op2),
            Eor | Teq => logical(op1 ^ op2),
            Orr => logical(op1 | op2),
            Mov => logical(op2),
            Bic => logical(op1 & !op2),
            Mvn => logical(!op2),
            Sub | Cmp => Self::sub_inner_op(op1, op2, true),
            Rsb => Self::sub_inner_op(op2, op1, true),
            Add | Cmn => Self::add_inner_op(op1, op2, false),
            Adc => Self::add_inner_op(op1, op2, carry),
            Sbc => Self::sub_inner_op(op1, op2, carry),
            Rsc => Self::sub_inner_op(op2, op1, carry),
        }
    }

    pub fn add_inner_op(first_op: u32, second_op: u32, carry_in: bool) -> ArithmeticOpResult {
        // we do the sum in 64bits so that the 32nd bit is the carry
        let result_and_carry =
            u64::from(first_op) + u64::from(second_op) + u64::from(carry_in);
        let result = result_and_carry as u32;

        // overflow only occurs when operands have the same sign and result has the opposite one
        let overflow = ((first_op ^ result) & (second_op ^ result)).get_bit(31);

        ArithmeticOpResult {
            result,
            carry: result_and_carry.get_bit(32),
            overflow,
            sign: result.get_bit(31),
            zero: result == 0,
        }
    }

    /// `first_op - second_op` as `first_op + !second_op + carry_in`, so C is
    /// set when there is no borrow.
    pub fn sub_inner_op(first_op: u32, second_op: u32, carry_in: bool) -> ArithmeticOpResult {
        Self::add_inner_op(first_op, !second_op, carry_in)
    }

    /// # Errors
    ///
    /// [`CpuError::UndefinedInstruction`] when r15 is an operand or Rd == Rm.
    #[allow(clippy::too_many_arguments)]
    pub fn multiply(
        &mut self,
        op_code: u32,
        variant: ArmModeMultiplyVariant,
        should_set_codes: bool,
        rd: usize,
        rn: usize,
        rs: usize,
        rm: usize,
    ) -> Result<Option<u32>, CpuError> {
        let accumulates = variant == ArmModeMultiplyVariant::Mla;

        if [rd, rm, rs].contains(&REG_PROGRAM_COUNTER)
            || (accumulates && rn == REG_PROGRAM_COUNTER)
        {
            return Err(CpuError::undefined(
                op_code,
                UndefinedReason::ProgramCounterOperand,
            ));
        }
        if rd == rm {
            return Err(CpuError::undefined(
                op_code,
                UndefinedReason::RegisterConflict,
            ));
        }

        let mut result = self
            .registers
            .register_at(rm)
            .wrapping_mul(self.registers.register_at(rs));
        if accumulates {
            result = result.wrapping_add(self.registers.register_at(rn));
        }

        self.registers.set_register_at(rd, result);

        // C is meaningless after a multiply on ARMv4 and stays as it was, like V.
        if should_set_codes {
            self.cpsr.set_sign_flag(result.get_bit(31));
            self.cpsr.set_zero_flag(result == 0);
        }

        Ok(Some(SIZE_OF_ARM_INSTRUCTION))
    }

    /// # Errors
    ///
    /// [`CpuError::UndefinedInstruction`] when r15 is an operand, RdHi ==
    /// RdLo or Rm overlaps either destination.
    #[allow(clippy::too_many_arguments)]
    pub fn multiply_long(
        &mut self,
        op_code: u32,
        variant: ArmModeMultiplyLongVariant,
        should_set_codes: bool,
        rdhi: usize,
        rdlo: usize,
        rs: usize,
        rm: usize,
    ) -> Result<Option<u32>, CpuError> {
        if [rdhi, rdlo, rs, rm].contains(&REG_PROGRAM_COUNTER) {
            return Err(CpuError::undefined(
                op_code,
                UndefinedReason::ProgramCounterOperand,
            ));
        }
        if rdhi == rdlo || rm == rdhi || rm == rdlo {
            return Err(CpuError::undefined(
                op_code,
                UndefinedReason::RegisterConflict,
            ));
        }

        let rm_value = self.registers.register_at(rm);
        let rs_value = self.registers.register_at(rs);

        let mut result = if variant.is_signed() {
            (i64::from(rm_value as i32) * i64::from(rs_value as i32)) as u64
        } else {
            u64::from(rm_value) * u64::from(rs_value)
        };

        if variant.accumulates() {
            let accumulator = (u64::from(self.registers.register_at(rdhi)) << 32)
                | u64::from(self.registers.register_at(rdlo));
            result = result.wrapping_add(accumulator);
        }

        self.registers.set_register_at(rdlo, result as u32);
        self.registers.set_register_at(rdhi, (result >> 32) as u32);

        if should_set_codes {
            self.cpsr.set_sign_flag(result.get_bit(63));
            self.cpsr.set_zero_flag(result == 0);
        }

        Ok(Some(SIZE_OF_ARM_INSTRUCTION))
    }

    /// # Errors
    ///
    /// [`CpuError::UndefinedInstruction`] for r15 operands, SPSR access in
    /// User or System mode, forbidden control writes and invalid CPSR modes.
    pub fn psr_transfer(
        &mut self,
        op_code: u32,
        psr_kind: PsrKind,
        kind: PsrOpKind,
    ) -> Result<Option<u32>, CpuError> {
        let undefined = move |reason| CpuError::undefined(op_code, reason);

        match kind {
            PsrOpKind::Mrs {
                destination_register,
            } => {
                if destination_register == REG_PROGRAM_COUNTER {
                    return Err(undefined(UndefinedReason::ProgramCounterOperand));
                }

                let psr = match psr_kind {
                    PsrKind::Cpsr => self.cpsr,
                    PsrKind::Spsr => self.spsr().map_err(undefined)?,
                };

                self.registers
                    .set_register_at(destination_register, psr.into());
            }
            PsrOpKind::Msr {
                operand,
                write_flags,
                write_control,
            } => {
                let value = match operand {
                    MsrOperand::Register(REG_PROGRAM_COUNTER) => {
                        return Err(undefined(UndefinedReason::ProgramCounterOperand));
                    }
                    MsrOperand::Register(register) => self.registers.register_at(register),
                    MsrOperand::Immediate { base, shift } => base.rotate_right(shift),
                };

                if write_control {
                    if matches!(operand, MsrOperand::Immediate { .. }) {
                        return Err(undefined(UndefinedReason::ControlWriteFromImmediate));
                    }
                    // In User mode only the flags can be written.
                    if self.cpsr.mode() == Mode::User {
                        return Err(undefined(UndefinedReason::ControlWriteInUserMode));
                    }
                }

                let mut psr = match psr_kind {
                    PsrKind::Cpsr => self.cpsr,
                    PsrKind::Spsr => self.spsr().map_err(undefined)?,
                };

                if write_flags {
                    psr.set_condition_flags(value);
                }
                if write_control {
                    psr.set_control_bits(value);
                    // A SPSR may hold any mode bits until it is restored.
                    if psr_kind == PsrKind::Cpsr {
                        psr.try_mode().map_err(undefined)?;
                        if psr.state_bit() != self.cpsr.state_bit() {
                            tracing::debug!("MSR changes the T bit, state is now {:?}", psr.cpu_state());
                        }
                    }
                }

                match psr_kind {
                    PsrKind::Cpsr => self.set_cpsr(psr),
                    PsrKind::Spsr => *self.spsr_mut().map_err(undefined)? = psr,
                }
            }
        }

        Ok(Some(SIZE_OF_ARM_INSTRUCTION))
    }

    pub fn branch(&mut self, link: bool, offset: i32) -> Option<u32> {
        let pc = self.registers.program_counter();
        if link {
            self.registers
                .set_register_at(REG_LR, pc.wrapping_sub(SIZE_OF_ARM_INSTRUCTION));
        }

        self.registers.set_program_counter(pc.wrapping_add_signed(offset));

        None
    }

    pub fn branch_and_exchange(&mut self, register: usize) -> Option<u32> {
        let rn = self.registers.register_at(register);
        let state: CpuState = rn.get_bit(0).into();
        self.cpsr.set_cpu_state(state);

        self.registers.set_program_counter(rn & !1);

        None
    }
}
