//! An ARMv4T instruction core: decodes and executes 32-bit ARM state
//! instructions of the ARM7TDMI against a host supplied [`Bus`].

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
mod bitwise;

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::unreadable_literal)]
pub mod bus;

pub mod config;
pub mod cpu;
pub mod error;

pub use bus::{Bus, BusFault, FlatMemory, Width};
pub use config::CpuConfig;
pub use cpu::arm7tdmi::Arm7tdmi;
pub use cpu::cpu_modes::Mode;
pub use cpu::exception::Exception;
pub use cpu::snapshot::CpuSnapshot;
pub use error::{CpuError, UndefinedReason};
