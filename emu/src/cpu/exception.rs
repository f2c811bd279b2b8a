//! # Exceptions
//!
//! ```text
//! Exception            Vector   Mode         I  F
//! ───────────────────────────────────────────────
//! Reset                0x00     Supervisor   1  1
//! Undefined            0x04     Undefined    1  -
//! Software Interrupt   0x08     Supervisor   1  -
//! Prefetch Abort       0x0C     Abort        1  -
//! Data Abort           0x10     Abort        1  -
//! IRQ                  0x18     IRQ          1  -
//! FIQ                  0x1C     FIQ          1  1
//! ```
//!
//! Entering an exception saves CPSR into the SPSR of the target mode, stores
//! the return address in the banked LR, switches to ARM state and jumps to the
//! vector. Offset 0x14 is reserved.

use serde::{Deserialize, Serialize};

use crate::cpu::cpu_modes::Mode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Exception {
    Reset,
    UndefinedInstruction,
    SoftwareInterrupt,
    PrefetchAbort,
    DataAbort,
    Irq,
    Fiq,
}

impl Exception {
    #[must_use]
    pub const fn vector(self) -> u32 {
        match self {
            Self::Reset => 0x00,
            Self::UndefinedInstruction => 0x04,
            Self::SoftwareInterrupt => 0x08,
            Self::PrefetchAbort => 0x0C,
            Self::DataAbort => 0x10,
            Self::Irq => 0x18,
            Self::Fiq => 0x1C,
        }
    }

    #[must_use]
    pub const fn mode(self) -> Mode {
        match self {
            Self::Reset | Self::SoftwareInterrupt => Mode::Supervisor,
            Self::UndefinedInstruction => Mode::Undefined,
            Self::PrefetchAbort | Self::DataAbort => Mode::Abort,
            Self::Irq => Mode::Irq,
            Self::Fiq => Mode::Fiq,
        }
    }

    #[must_use]
    pub const fn disables_fiq(self) -> bool {
        matches!(self, Self::Reset | Self::Fiq)
    }
}
