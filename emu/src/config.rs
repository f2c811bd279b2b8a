use serde::{Deserialize, Serialize};

use crate::cpu::cpu_modes::Mode;

/// Start-up options for [`Arm7tdmi`](crate::cpu::arm7tdmi::Arm7tdmi).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuConfig {
    /// Mode the core is in before the first instruction.
    pub initial_mode: Mode,

    /// Address of the first instruction fetched.
    pub reset_vector: u32,

    /// When set, `run_until` handles undefined instructions by entering
    /// Undefined mode at vector 0x04 instead of returning the error.
    pub trap_undefined: bool,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            initial_mode: Mode::Supervisor,
            reset_vector: 0,
            trap_undefined: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_reset() {
        let config = CpuConfig::default();
        assert_eq!(config.initial_mode, Mode::Supervisor);
        assert_eq!(config.reset_vector, 0);
        assert!(config.trap_undefined);
    }
}
