//! # Program Status Registers (CPSR and SPSR)
//!
//! ```text
//! 31 30 29 28 27                     8 7 6 5 4   0
//! ┌──┬──┬──┬──┬────────────────────────┬─┬─┬─┬─────┐
//! │N │Z │C │V │        Reserved        │I│F│T│Mode │
//! └──┴──┴──┴──┴────────────────────────┴─┴─┴─┴─────┘
//! ```
//!
//! - **Flags (28-31)**: tested by [`condition`](super::condition)
//! - **Reserved (8-27)**: never interpreted, carried through every write
//! - **I/F bits (7-6)**: IRQ/FIQ disable
//! - **T bit (5)**: ARM (0) or Thumb (1) state
//! - **Mode (0-4)**: see [`cpu_modes`](super::cpu_modes)
//!
//! The word and the field accessors are one value, so writing a field and
//! reading the word back (or the other way round) always agree.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::arm::alu_instruction::ArithmeticOpResult;
use crate::cpu::{condition::Condition, cpu_modes::Mode};
use crate::error::UndefinedReason;

/// Program Status Register (CPSR or SPSR).
///
/// # Example
///
/// ```
/// use armcore::cpu::psr::Psr;
///
/// let mut cpsr = Psr::default();
/// cpsr.set_zero_flag(true);
/// assert!(cpsr.zero_flag());
/// assert_eq!(u32::from(cpsr), 0x4000_0000);
/// ```
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Psr(u32);

impl Psr {
    /// N, Z, C and V.
    pub const FLAGS_MASK: u32 = 0xF000_0000;

    /// Mode, T, F and I.
    pub const CONTROL_MASK: u32 = 0x0000_00FF;

    #[must_use]
    pub fn can_execute(self, cond: Condition) -> bool {
        use Condition::{AL, CC, CS, EQ, GE, GT, HI, LE, LS, LT, MI, NE, PL, VC, VS};
        match cond {
            EQ => self.zero_flag(),
            NE => !self.zero_flag(),
            CS => self.carry_flag(),
            CC => !self.carry_flag(),
            MI => self.sign_flag(),
            PL => !self.sign_flag(),
            VS => self.overflow_flag(),
            VC => !self.overflow_flag(),
            HI => self.carry_flag() && !self.zero_flag(),
            LS => !self.carry_flag() || self.zero_flag(),
            GE => self.sign_flag() == self.overflow_flag(),
            LT => self.sign_flag() != self.overflow_flag(),
            GT => !self.zero_flag() && (self.sign_flag() == self.overflow_flag()),
            LE => self.zero_flag() || (self.sign_flag() != self.overflow_flag()),
            AL => true,
        }
    }

    /// Evaluates a raw 4-bit condition code against the flags.
    ///
    /// # Errors
    ///
    /// Code `0b1111` is rejected with [`UndefinedReason::UndefinedCondition`].
    pub fn check_condition(self, code: u8) -> Result<bool, UndefinedReason> {
        Condition::try_from(code).map(|cond| self.can_execute(cond))
    }

    /// N => Bit 31, (0=Not Signed, 1=Signed)
    #[must_use]
    pub fn sign_flag(self) -> bool {
        self.0.get_bit(31)
    }

    /// Z => Bit 30, (0=Not Zero, 1=Zero)
    #[must_use]
    pub fn zero_flag(self) -> bool {
        self.0.get_bit(30)
    }

    /// C => Bit 29, (0=Borrow/No Carry, 1=Carry/No Borrow)
    #[must_use]
    pub fn carry_flag(self) -> bool {
        self.0.get_bit(29)
    }

    /// V => Bit 28, (0=No Overflow, 1=Overflow)
    #[must_use]
    pub fn overflow_flag(self) -> bool {
        self.0.get_bit(28)
    }

    /// Reserved => Bits 27-8
    #[must_use]
    pub fn reserved_bits(self) -> u32 {
        self.0.get_bits(8..=27)
    }

    /// I => Bit 7, (0=Enable, 1=Disable)
    #[must_use]
    pub fn irq_disable(self) -> bool {
        self.0.get_bit(7)
    }

    /// F => Bit 6, (0=Enable, 1=Disable)
    #[must_use]
    pub fn fiq_disable(self) -> bool {
        self.0.get_bit(6)
    }

    /// T => Bit 5, (0=ARM, 1=THUMB)
    #[must_use]
    pub fn state_bit(self) -> bool {
        self.0.get_bit(5)
    }

    #[must_use]
    pub fn mode_bits(self) -> u32 {
        self.0.get_bits(0..=4)
    }

    /// M4-M0 => Bits 4-0
    ///
    /// The CPSR only ever holds valid modes, but a SPSR can be written with
    /// anything. Invalid bits read back as Supervisor.
    #[must_use]
    pub fn mode(self) -> Mode {
        self.try_mode().unwrap_or_else(|_| {
            tracing::debug!(
                "invalid mode bits 0b{:05b} in PSR=0x{:08X}, reading as Supervisor",
                self.mode_bits(),
                self.0
            );
            Mode::Supervisor
        })
    }

    /// # Errors
    ///
    /// Returns [`UndefinedReason::InvalidMode`] when bits 4-0 are not a mode.
    pub fn try_mode(self) -> Result<Mode, UndefinedReason> {
        Mode::try_from(self.mode_bits())
    }

    pub fn set_sign_flag(&mut self, value: bool) {
        self.0.set_bit(31, value);
    }

    pub fn set_zero_flag(&mut self, value: bool) {
        self.0.set_bit(30, value);
    }

    pub fn set_carry_flag(&mut self, value: bool) {
        self.0.set_bit(29, value);
    }

    pub fn set_overflow_flag(&mut self, value: bool) {
        self.0.set_bit(28, value);
    }

    pub fn set_flags(&mut self, op_result: &ArithmeticOpResult) {
        self.set_carry_flag(op_result.carry);
        self.set_zero_flag(op_result.zero);
        self.set_sign_flag(op_result.sign);
        self.set_overflow_flag(op_result.overflow);
    }

    pub fn set_irq_disable(&mut self, value: bool) {
        self.0.set_bit(7, value);
    }

    pub fn set_fiq_disable(&mut self, value: bool) {
        self.0.set_bit(6, value);
    }

    pub fn set_state_bit(&mut self, value: bool) {
        self.0.set_bit(5, value);
    }

    /// Replaces N, Z, C and V with bits 31-28 of `value`.
    pub const fn set_condition_flags(&mut self, value: u32) {
        self.0 = (self.0 & !Self::FLAGS_MASK) | (value & Self::FLAGS_MASK);
    }

    /// Replaces mode, T, F and I with bits 7-0 of `value`.
    pub const fn set_control_bits(&mut self, value: u32) {
        self.0 = (self.0 & !Self::CONTROL_MASK) | (value & Self::CONTROL_MASK);
    }

    /// The Mode Bits M4-M0 contain the current operating mode.
    pub const fn set_mode(&mut self, m: Mode) {
        self.0 = (self.0 & !0b1_1111) | m as u32;
    }

    #[must_use]
    pub fn cpu_state(self) -> CpuState {
        self.state_bit().into()
    }

    pub fn set_cpu_state(&mut self, state: CpuState) {
        self.set_state_bit(state.into());
    }
}

impl From<Mode> for Psr {
    fn from(m: Mode) -> Self {
        let mut s = Self(0);

        s.set_mode(m);

        s
    }
}

impl From<u32> for Psr {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl From<Psr> for u32 {
    fn from(p: Psr) -> Self {
        p.0
    }
}

impl std::fmt::Display for Psr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let flag = |set: bool, c: char| if set { c } else { '-' };
        write!(
            f,
            "{}{}{}{} {}{}{} {}",
            flag(self.sign_flag(), 'N'),
            flag(self.zero_flag(), 'Z'),
            flag(self.carry_flag(), 'C'),
            flag(self.overflow_flag(), 'V'),
            flag(self.irq_disable(), 'I'),
            flag(self.fiq_disable(), 'F'),
            flag(self.state_bit(), 'T'),
            self.mode(),
        )
    }
}

/// The CPU execution state (ARM or Thumb), selected by the T bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuState {
    Thumb,
    Arm,
}

impl From<CpuState> for bool {
    fn from(state: CpuState) -> Self {
        match state {
            CpuState::Arm => false,
            CpuState::Thumb => true,
        }
    }
}

impl From<bool> for CpuState {
    fn from(state: bool) -> Self {
        if state { Self::Thumb } else { Self::Arm }
    }
}
