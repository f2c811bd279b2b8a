//! # Processor Modes
//!
//! The low five bits of the CPSR select the operating mode. Every mode except
//! User and System owns a private SP, LR and SPSR; FIQ also owns R8-R12.
//!
//! ```text
//! Mode        Bits    SPSR   Banked
//! ────────────────────────────────────────
//! User        10000   -      -
//! FIQ         10001   yes    R8-R14
//! IRQ         10010   yes    R13-R14
//! Supervisor  10011   yes    R13-R14
//! Abort       10111   yes    R13-R14
//! Undefined   11011   yes    R13-R14
//! System      11111   -      - (shares User registers)
//! ```

use serde::{Deserialize, Serialize};

use crate::error::UndefinedReason;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// The normal ARM program execution state.
    User = 0b10000,

    /// Designed to support a data transfer or channel process.
    Fiq = 0b10001,

    /// Used for general-purpose interrupt handling.
    Irq = 0b10010,

    /// Protected mode for the operating system
    Supervisor = 0b10011,

    /// Entered after a data or instruction prefetch abort.
    Abort = 0b10111,

    /// Entered when an undefined instruction is executed
    Undefined = 0b11011,

    /// A privileged user mode for the operating system.
    System = 0b11111,
}

impl Mode {
    /// User and System run on the unbanked registers and have no SPSR.
    #[must_use]
    pub const fn has_spsr(self) -> bool {
        !matches!(self, Self::User | Self::System)
    }

    #[must_use]
    pub const fn is_privileged(self) -> bool {
        !matches!(self, Self::User)
    }
}

impl From<Mode> for u32 {
    fn from(m: Mode) -> Self {
        m as Self
    }
}

impl TryFrom<u32> for Mode {
    type Error = UndefinedReason;

    fn try_from(n: u32) -> Result<Self, Self::Error> {
        match n {
            0b10000 => Ok(Self::User),
            0b10001 => Ok(Self::Fiq),
            0b10010 => Ok(Self::Irq),
            0b10011 => Ok(Self::Supervisor),
            0b10111 => Ok(Self::Abort),
            0b11011 => Ok(Self::Undefined),
            0b11111 => Ok(Self::System),
            _ => Err(UndefinedReason::InvalidMode(n)),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::User => "usr",
            Self::Fiq => "fiq",
            Self::Irq => "irq",
            Self::Supervisor => "svc",
            Self::Abort => "abt",
            Self::Undefined => "und",
            Self::System => "sys",
        };
        f.write_str(name)
    }
}
