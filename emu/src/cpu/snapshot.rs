use serde::{Deserialize, Serialize};

use crate::cpu::psr::Psr;
use crate::cpu::register_bank::RegisterBank;
use crate::cpu::registers::Registers;

/// A copy of the architectural state between two steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub registers: Registers,
    pub cpsr: Psr,
    /// `None` in User and System mode.
    pub spsr: Option<Psr>,
    pub register_bank: RegisterBank,
    pub next_fetch_address: u32,
}

#[cfg(test)]
mod tests {
    use crate::bus::FlatMemory;
    use crate::cpu::arm7tdmi::Arm7tdmi;
    use crate::cpu::cpu_modes::Mode;
    use pretty_assertions::assert_eq;

    #[test]
    fn snapshot_follows_the_core() {
        let mut cpu = Arm7tdmi::new(FlatMemory::default());
        cpu.registers.set_register_at(3, 0x33);

        let snapshot = cpu.snapshot();
        assert_eq!(snapshot.registers.register_at(3), 0x33);
        assert_eq!(snapshot.cpsr.mode(), Mode::Supervisor);
        assert_eq!(snapshot.spsr, Some(cpu.register_bank.svc.spsr));
        assert_eq!(snapshot.next_fetch_address, 0);

        cpu.switch_mode(Mode::System);
        assert_eq!(cpu.snapshot().spsr, None);
    }
}
