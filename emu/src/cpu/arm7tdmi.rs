//! The ARM7TDMI core: register file, mode banking, exception entry and the
//! fetch/execute loop.
//!
//! r15 follows the three stage pipeline. While an instruction executes it
//! reads as the instruction address plus 8. Between steps it holds the next
//! fetch address plus 8, and writing it means the pipeline has to be refilled.

use crate::bus::Bus;
use crate::config::CpuConfig;
use crate::cpu::arm::instructions::ArmModeInstruction;
use crate::cpu::arm::mode::ArmModeOpcode;
use crate::cpu::cpu_modes::Mode;
use crate::cpu::exception::Exception;
use crate::cpu::psr::{CpuState, Psr};
use crate::cpu::register_bank::RegisterBank;
use crate::cpu::registers::{REG_LR, REG_SP, Registers};
use crate::cpu::snapshot::CpuSnapshot;
use crate::error::{CpuError, UndefinedReason};

pub const SIZE_OF_ARM_INSTRUCTION: u32 = 4;
pub const SIZE_OF_THUMB_INSTRUCTION: u32 = 2;

pub struct Arm7tdmi<B: Bus> {
    pub bus: B,

    pub cpsr: Psr,
    pub registers: Registers,

    pub register_bank: RegisterBank,

    config: CpuConfig,
}

impl<B: Bus + Default> Default for Arm7tdmi<B> {
    fn default() -> Self {
        Self::new(B::default())
    }
}

impl<B: Bus> Arm7tdmi<B> {
    pub fn new(bus: B) -> Self {
        Self::with_config(bus, CpuConfig::default())
    }

    /// Core in reset state: `initial_mode`, ARM state, IRQ and FIQ masked,
    /// first fetch at `reset_vector`.
    pub fn with_config(bus: B, config: CpuConfig) -> Self {
        let mut cpsr = Psr::from(config.initial_mode);
        cpsr.set_irq_disable(true);
        cpsr.set_fiq_disable(true);
        cpsr.set_cpu_state(CpuState::Arm);

        let mut s = Self {
            bus,
            cpsr,
            registers: Registers::default(),
            register_bank: RegisterBank::default(),
            config,
        };

        s.registers.set_program_counter(config.reset_vector);
        s.flush_pipeline();

        s
    }

    /// Address the next `step` fetches from.
    #[must_use]
    pub fn next_fetch_address(&self) -> u32 {
        let pc = self.registers.program_counter();
        match self.cpsr.cpu_state() {
            CpuState::Arm => pc.wrapping_sub(2 * SIZE_OF_ARM_INSTRUCTION),
            CpuState::Thumb => pc.wrapping_sub(2 * SIZE_OF_THUMB_INSTRUCTION),
        }
    }

    /// Fetches, decodes and executes one instruction.
    ///
    /// # Errors
    ///
    /// Any [`CpuError`]. On error the core state is exactly what it was
    /// before the call.
    pub fn step(&mut self) -> Result<(), CpuError> {
        let address = self.next_fetch_address();

        if self.cpsr.cpu_state() == CpuState::Thumb {
            return Err(CpuError::ThumbState { address });
        }

        let raw = self
            .bus
            .fetch_word(address)
            .map_err(|fault| CpuError::FetchFault { address, fault })?;
        let op_code = ArmModeOpcode::try_from(raw)?;
        trace_instruction(address, &op_code);

        self.execute_arm(&op_code)
    }

    /// Executes an already fetched opcode, as `step` does after the fetch.
    ///
    /// # Errors
    ///
    /// Rejections of the executors, [`CpuError::Unsupported`] for load/store
    /// classes and [`CpuError::UndefinedInstruction`] for coprocessor and
    /// undefined encodings.
    pub fn execute_arm(&mut self, op_code: &ArmModeOpcode) -> Result<(), CpuError> {
        use ArmModeInstruction::*;

        // Instruction functions return how far PC has to be advanced, or None
        // when they wrote PC themselves.
        let bytes_to_advance = if self.cpsr.can_execute(op_code.condition) {
            match op_code.decode()? {
                DataProcessing {
                    alu_instruction,
                    set_conditions,
                    rn,
                    destination,
                    op2,
                    ..
                } => self.data_processing(
                    op_code.raw,
                    alu_instruction,
                    set_conditions,
                    rn,
                    destination,
                    op2,
                )?,
                Multiply {
                    variant,
                    should_set_codes,
                    rd_destination_register,
                    rn_accumulate_register,
                    rs_operand_register,
                    rm_operand_register,
                } => self.multiply(
                    op_code.raw,
                    variant,
                    should_set_codes,
                    rd_destination_register,
                    rn_accumulate_register,
                    rs_operand_register,
                    rm_operand_register,
                )?,
                MultiplyLong {
                    variant,
                    should_set_codes,
                    rdhi_destination_register,
                    rdlo_destination_register,
                    rs_operand_register,
                    rm_operand_register,
                } => self.multiply_long(
                    op_code.raw,
                    variant,
                    should_set_codes,
                    rdhi_destination_register,
                    rdlo_destination_register,
                    rs_operand_register,
                    rm_operand_register,
                )?,
                PsrTransfer { psr_kind, kind } => self.psr_transfer(op_code.raw, psr_kind, kind)?,
                BranchAndExchange { register } => self.branch_and_exchange(register),
                Branch { link, offset } => self.branch(link, offset),
                SoftwareInterrupt { comment } => {
                    tracing::debug!("SWI 0x{comment:06X}");
                    let return_address = self
                        .registers
                        .program_counter()
                        .wrapping_sub(SIZE_OF_ARM_INSTRUCTION);
                    self.take_exception(Exception::SoftwareInterrupt, return_address);
                    None
                }
                MemoryTransfer { class } => {
                    return Err(CpuError::Unsupported {
                        opcode: op_code.raw,
                        class,
                    });
                }
                Coprocessor { .. } => {
                    return Err(CpuError::undefined(
                        op_code.raw,
                        UndefinedReason::NoCoprocessor,
                    ));
                }
                Undefined => {
                    return Err(CpuError::undefined(
                        op_code.raw,
                        UndefinedReason::UndefinedEncoding,
                    ));
                }
            }
        } else {
            tracing::debug!(
                "condition {:?} failed for 0x{:08X}, skipping",
                op_code.condition,
                op_code.raw
            );
            Some(SIZE_OF_ARM_INSTRUCTION)
        };

        match bytes_to_advance {
            Some(bytes) => self.registers.advance_program_counter(bytes),
            None => self.flush_pipeline(),
        }

        Ok(())
    }

    /// Steps until `stop` returns true. `stop` is checked before every step.
    ///
    /// With `trap_undefined` set, undefined instructions enter Undefined mode
    /// through vector 0x04 and execution carries on from there.
    ///
    /// # Errors
    ///
    /// The first error `step` reports that is not trapped.
    pub fn run_until<F>(&mut self, mut stop: F) -> Result<(), CpuError>
    where
        F: FnMut(&Self) -> bool,
    {
        while !stop(self) {
            match self.step() {
                Ok(()) => {}
                Err(CpuError::UndefinedInstruction { opcode, reason })
                    if self.config.trap_undefined =>
                {
                    tracing::debug!("trapping undefined instruction 0x{opcode:08X}: {reason}");
                    self.enter_exception(Exception::UndefinedInstruction);
                }
                Err(error) => return Err(error),
            }
        }

        Ok(())
    }

    /// Realigns r15 after a write so the next fetch lands on the written address.
    pub fn flush_pipeline(&mut self) {
        let pc = self.registers.program_counter();
        let pc = match self.cpsr.cpu_state() {
            CpuState::Arm => (pc & !3).wrapping_add(2 * SIZE_OF_ARM_INSTRUCTION),
            CpuState::Thumb => (pc & !1).wrapping_add(2 * SIZE_OF_THUMB_INSTRUCTION),
        };
        self.registers.set_program_counter(pc);
    }

    /// Parks the registers of the current mode and installs those of `new_mode`.
    pub fn switch_mode(&mut self, new_mode: Mode) {
        let old_mode = self.cpsr.mode();
        if old_mode == new_mode {
            return;
        }

        self.register_bank.store_stack_and_link(
            old_mode,
            self.registers.register_at(REG_SP),
            self.registers.register_at(REG_LR),
        );
        *self.register_bank.high_registers_mut(old_mode) = self.registers.high_registers();

        let (sp, lr) = self.register_bank.stack_and_link(new_mode);
        self.registers.set_register_at(REG_SP, sp);
        self.registers.set_register_at(REG_LR, lr);
        self.registers
            .set_high_registers(self.register_bank.high_registers(new_mode));

        self.cpsr.set_mode(new_mode);
        tracing::debug!("mode switch {old_mode} -> {new_mode}");
    }

    /// Replaces the CPSR, rebanking when the mode changes. `psr` must hold a
    /// valid mode.
    pub(crate) fn set_cpsr(&mut self, psr: Psr) {
        self.switch_mode(psr.mode());
        self.cpsr = psr;
    }

    /// SPSR of the current mode.
    ///
    /// # Errors
    ///
    /// [`UndefinedReason::NoSpsr`] in User and System mode.
    pub fn spsr(&self) -> Result<Psr, UndefinedReason> {
        let mode = self.cpsr.mode();
        self.register_bank
            .banked(mode)
            .map(|bank| bank.spsr)
            .ok_or(UndefinedReason::NoSpsr(mode))
    }

    /// # Errors
    ///
    /// [`UndefinedReason::NoSpsr`] in User and System mode.
    pub fn spsr_mut(&mut self) -> Result<&mut Psr, UndefinedReason> {
        let mode = self.cpsr.mode();
        self.register_bank
            .banked_mut(mode)
            .map(|bank| &mut bank.spsr)
            .ok_or(UndefinedReason::NoSpsr(mode))
    }

    /// Enters `exception` and refills the pipeline at its vector.
    ///
    /// LR receives the next fetch address plus 4 in either state, matching
    /// what IRQ and FIQ handlers expect.
    pub fn enter_exception(&mut self, exception: Exception) {
        let return_address = self.next_fetch_address().wrapping_add(4);
        self.take_exception(exception, return_address);
        self.flush_pipeline();
    }

    fn take_exception(&mut self, exception: Exception, return_address: u32) {
        let saved_cpsr = self.cpsr;
        let mode = exception.mode();

        self.switch_mode(mode);
        if let Some(bank) = self.register_bank.banked_mut(mode) {
            bank.spsr = saved_cpsr;
        }
        self.registers.set_register_at(REG_LR, return_address);

        self.cpsr.set_cpu_state(CpuState::Arm);
        self.cpsr.set_irq_disable(true);
        if exception.disables_fiq() {
            self.cpsr.set_fiq_disable(true);
        }
        self.registers.set_program_counter(exception.vector());

        tracing::debug!(
            "{exception:?} exception: {} -> {mode}, return to 0x{return_address:08X}",
            saved_cpsr.mode()
        );
    }

    #[must_use]
    pub fn snapshot(&self) -> CpuSnapshot {
        CpuSnapshot {
            registers: self.registers.clone(),
            cpsr: self.cpsr,
            spsr: self.spsr().ok(),
            register_bank: self.register_bank.clone(),
            next_fetch_address: self.next_fetch_address(),
        }
    }
}

#[cfg(feature = "disassembler")]
fn trace_instruction(address: u32, op_code: &ArmModeOpcode) {
    match op_code.decode() {
        Ok(instruction) => tracing::trace!(
            "0x{address:08X}: {}",
            instruction.disassembler(op_code.condition)
        ),
        Err(_) => tracing::trace!("0x{address:08X}: {op_code}"),
    }
}

#[cfg(not(feature = "disassembler"))]
fn trace_instruction(address: u32, op_code: &ArmModeOpcode) {
    tracing::trace!("0x{address:08X}: 0x{:08X} {}", op_code.raw, op_code.class);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::FlatMemory;
    use crate::cpu::registers::REG_PROGRAM_COUNTER;
    use pretty_assertions::assert_eq;

    fn core_in(mode: Mode, program: &[u32]) -> Arm7tdmi<FlatMemory> {
        let config = CpuConfig {
            initial_mode: mode,
            ..CpuConfig::default()
        };
        Arm7tdmi::with_config(FlatMemory::from_words(0, program), config)
    }

    #[test]
    fn reset_state() {
        let config = CpuConfig {
            reset_vector: 0x100,
            ..CpuConfig::default()
        };
        let cpu = Arm7tdmi::with_config(FlatMemory::default(), config);

        assert_eq!(cpu.registers.program_counter(), 0x108);
        assert_eq!(cpu.next_fetch_address(), 0x100);
        assert_eq!(cpu.cpsr.mode(), Mode::Supervisor);
        assert_eq!(cpu.cpsr.cpu_state(), CpuState::Arm);
        assert!(cpu.cpsr.irq_disable());
        assert!(cpu.cpsr.fiq_disable());
    }

    #[test]
    fn switch_mode_banks_stack_and_link() {
        let mut cpu = core_in(Mode::User, &[]);
        cpu.registers.set_register_at(REG_SP, 0x0300_7F00);
        cpu.registers.set_register_at(REG_LR, 0x0800_0000);

        cpu.switch_mode(Mode::Irq);
        assert_eq!(cpu.registers.register_at(REG_SP), 0);
        cpu.registers.set_register_at(REG_SP, 0x0300_7FA0);

        cpu.switch_mode(Mode::System);
        assert_eq!(cpu.registers.register_at(REG_SP), 0x0300_7F00);
        assert_eq!(cpu.registers.register_at(REG_LR), 0x0800_0000);

        cpu.switch_mode(Mode::Irq);
        assert_eq!(cpu.registers.register_at(REG_SP), 0x0300_7FA0);
        assert_eq!(cpu.cpsr.mode(), Mode::Irq);
    }

    #[test]
    fn fiq_banks_high_registers() {
        let mut cpu = core_in(Mode::Supervisor, &[]);
        for reg in 0..=12 {
            cpu.registers.set_register_at(reg, reg as u32);
        }

        cpu.switch_mode(Mode::Fiq);
        assert_eq!(cpu.registers.high_registers(), [0; 5]);
        assert_eq!(cpu.registers.register_at(7), 7);
        cpu.registers.set_register_at(8, 0xF1F1);

        cpu.switch_mode(Mode::Supervisor);
        assert_eq!(cpu.registers.high_registers(), [8, 9, 10, 11, 12]);

        cpu.switch_mode(Mode::Fiq);
        assert_eq!(cpu.registers.register_at(8), 0xF1F1);
    }

    #[test]
    fn no_spsr_in_user_and_system() {
        for mode in [Mode::User, Mode::System] {
            let mut cpu = core_in(mode, &[]);
            assert_eq!(cpu.spsr(), Err(UndefinedReason::NoSpsr(mode)));
            assert!(cpu.spsr_mut().is_err());
        }

        let mut cpu = core_in(Mode::Abort, &[]);
        *cpu.spsr_mut().unwrap() = Psr::from(Mode::User);
        assert_eq!(cpu.spsr(), Ok(Psr::from(Mode::User)));
    }

    #[test]
    fn enter_exception_saves_cpsr() {
        let mut cpu = core_in(Mode::User, &[]);
        cpu.cpsr.set_irq_disable(false);
        cpu.cpsr.set_carry_flag(true);
        cpu.registers.set_program_counter(0x0800_0108);
        let before = cpu.cpsr;

        cpu.enter_exception(Exception::Irq);

        assert_eq!(cpu.cpsr.mode(), Mode::Irq);
        assert!(cpu.cpsr.irq_disable());
        assert!(cpu.cpsr.carry_flag());
        assert_eq!(cpu.spsr(), Ok(before));
        assert_eq!(cpu.registers.register_at(REG_LR), 0x0800_0104);
        assert_eq!(cpu.next_fetch_address(), 0x18);
    }

    #[test]
    fn irq_from_thumb_returns_past_next_fetch() {
        let mut cpu = core_in(Mode::User, &[]);
        cpu.cpsr.set_cpu_state(CpuState::Thumb);
        cpu.registers.set_program_counter(0x8004);
        assert_eq!(cpu.next_fetch_address(), 0x8000);

        cpu.enter_exception(Exception::Irq);

        assert_eq!(cpu.registers.register_at(REG_LR), 0x8004);
        assert_eq!(cpu.cpsr.cpu_state(), CpuState::Arm);
        assert_eq!(cpu.spsr().map(Psr::cpu_state), Ok(CpuState::Thumb));
        assert_eq!(cpu.next_fetch_address(), 0x18);
    }

    #[test]
    fn fiq_entry_masks_fiq() {
        let mut cpu = core_in(Mode::User, &[]);
        cpu.cpsr.set_fiq_disable(false);

        cpu.enter_exception(Exception::Fiq);

        assert!(cpu.cpsr.fiq_disable());
        assert_eq!(cpu.next_fetch_address(), 0x1C);
    }

    #[test]
    fn flush_aligns_to_state() {
        let mut cpu = core_in(Mode::Supervisor, &[]);
        cpu.registers.set_program_counter(0x1003);
        cpu.flush_pipeline();
        assert_eq!(cpu.registers.program_counter(), 0x1008);

        cpu.cpsr.set_cpu_state(CpuState::Thumb);
        cpu.registers.set_program_counter(0x1003);
        cpu.flush_pipeline();
        assert_eq!(cpu.registers.program_counter(), 0x1006);
        assert_eq!(cpu.next_fetch_address(), 0x1002);
    }

    #[test]
    fn step_advances_over_failed_condition() {
        // MOVEQ R0, #1 with Z clear
        let mut cpu = core_in(Mode::Supervisor, &[0x03A0_0001]);
        cpu.step().unwrap();

        assert_eq!(cpu.registers.register_at(0), 0);
        assert_eq!(cpu.registers.program_counter(), 0xC);
    }

    #[test]
    fn failed_condition_hides_undefined_encodings() {
        // Coprocessor data operation under NE with Z set
        let mut cpu = core_in(Mode::Supervisor, &[0x1E00_0000]);
        cpu.cpsr.set_zero_flag(true);

        assert_eq!(cpu.step(), Ok(()));
        assert_eq!(cpu.next_fetch_address(), 4);
    }

    #[test]
    fn untrapped_undefined_leaves_state_alone() {
        let mut cpu = core_in(Mode::Supervisor, &[0xE700_0010]);
        let before = cpu.snapshot();

        assert_eq!(
            cpu.step(),
            Err(CpuError::undefined(
                0xE700_0010,
                UndefinedReason::UndefinedEncoding
            ))
        );
        assert_eq!(cpu.snapshot(), before);
    }

    #[test]
    fn run_until_traps_undefined() {
        let mut cpu = core_in(Mode::Supervisor, &[0xEE00_0000, 0xE1A0_0000]);
        cpu.run_until(|cpu| cpu.cpsr.mode() == Mode::Undefined).unwrap();

        assert_eq!(cpu.registers.register_at(REG_LR), 4);
        assert_eq!(cpu.spsr().map(Psr::mode), Ok(Mode::Supervisor));
        assert_eq!(cpu.next_fetch_address(), 4);
    }

    #[test]
    fn run_until_surfaces_undefined_without_trap() {
        let config = CpuConfig {
            trap_undefined: false,
            ..CpuConfig::default()
        };
        let mut cpu = Arm7tdmi::with_config(FlatMemory::from_words(0, &[0xF3A0_0001]), config);

        assert_eq!(
            cpu.run_until(|_| false),
            Err(CpuError::undefined(
                0xF3A0_0001,
                UndefinedReason::UndefinedCondition
            ))
        );
    }

    #[test]
    fn thumb_state_is_reported() {
        let mut cpu = core_in(Mode::Supervisor, &[]);
        cpu.cpsr.set_cpu_state(CpuState::Thumb);
        cpu.registers.set_register_at(REG_PROGRAM_COUNTER, 0x8004);

        assert_eq!(cpu.step(), Err(CpuError::ThumbState { address: 0x8000 }));
    }
}
