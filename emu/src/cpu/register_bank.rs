//! # Banked Registers for Exception Modes
//!
//! Storage for registers that are swapped out when the CPU changes mode.
//! Each exception mode has its own R13 (SP), R14 (LR) and SPSR. FIQ also
//! banks R8-R12, so the User copies of R8-R12 are parked here while FIQ runs.
//! User and System share one SP/LR pair, which is parked here while any
//! exception mode runs.

use serde::{Deserialize, Serialize};

use crate::cpu::cpu_modes::Mode;
use crate::cpu::psr::Psr;

/// SP, LR and SPSR private to one exception mode.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankedRegisters {
    pub sp: u32,
    pub lr: u32,
    pub spsr: Psr,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterBank {
    /// R8-R12 of every mode except FIQ.
    pub r8_r12_usr: [u32; 5],
    /// R8-R12 for FIQ mode.
    pub r8_r12_fiq: [u32; 5],

    /// R13 (SP) shared by User and System.
    pub sp_usr: u32,
    /// R14 (LR) shared by User and System.
    pub lr_usr: u32,

    pub fiq: BankedRegisters,
    pub irq: BankedRegisters,
    pub svc: BankedRegisters,
    pub abt: BankedRegisters,
    pub und: BankedRegisters,
}

impl RegisterBank {
    /// The private registers of `mode`, `None` for User and System.
    #[must_use]
    pub const fn banked(&self, mode: Mode) -> Option<&BankedRegisters> {
        match mode {
            Mode::Fiq => Some(&self.fiq),
            Mode::Irq => Some(&self.irq),
            Mode::Supervisor => Some(&self.svc),
            Mode::Abort => Some(&self.abt),
            Mode::Undefined => Some(&self.und),
            Mode::User | Mode::System => None,
        }
    }

    pub fn banked_mut(&mut self, mode: Mode) -> Option<&mut BankedRegisters> {
        match mode {
            Mode::Fiq => Some(&mut self.fiq),
            Mode::Irq => Some(&mut self.irq),
            Mode::Supervisor => Some(&mut self.svc),
            Mode::Abort => Some(&mut self.abt),
            Mode::Undefined => Some(&mut self.und),
            Mode::User | Mode::System => None,
        }
    }

    /// R8-R12 to install when `mode` becomes active.
    #[must_use]
    pub const fn high_registers(&self, mode: Mode) -> [u32; 5] {
        match mode {
            Mode::Fiq => self.r8_r12_fiq,
            _ => self.r8_r12_usr,
        }
    }

    /// Where R8-R12 live while `mode` is not running.
    pub fn high_registers_mut(&mut self, mode: Mode) -> &mut [u32; 5] {
        match mode {
            Mode::Fiq => &mut self.r8_r12_fiq,
            _ => &mut self.r8_r12_usr,
        }
    }

    /// Parks SP and LR of `mode`.
    pub fn store_stack_and_link(&mut self, mode: Mode, sp: u32, lr: u32) {
        match self.banked_mut(mode) {
            Some(bank) => {
                bank.sp = sp;
                bank.lr = lr;
            }
            None => {
                self.sp_usr = sp;
                self.lr_usr = lr;
            }
        }
    }

    /// SP and LR to install when `mode` becomes active.
    #[must_use]
    pub const fn stack_and_link(&self, mode: Mode) -> (u32, u32) {
        match self.banked(mode) {
            Some(bank) => (bank.sp, bank.lr),
            None => (self.sp_usr, self.lr_usr),
        }
    }
}
