//! # ARM Instruction Set (32-bit)
//!
//! Every instruction carries a condition and is only executed when the CPSR
//! flags satisfy it.
//!
//! ## Format
//!
//! ```text
//! 31-28   27-25   24-0
//! [Cond] [Format] [Instruction-specific]
//! ```
//!
//! - **Condition (bits 28-31)**: See [`condition`](super::condition)
//! - **Format**: resolved by the ordered table in [`classification`]
//!
//! ## Instruction Categories
//!
//! | Bits 27-25 | Category              | Examples                    |
//! |------------|-----------------------|-----------------------------|
//! | 00x        | Data Processing       | AND, ADD, CMP, MOV          |
//! | 000        | Multiply/Swap/BX/PSR  | MUL, UMULL, SWP, BX, MRS    |
//! | 01x        | Single Data Transfer  | LDR, STR                    |
//! | 100        | Block Data Transfer   | LDM, STM                    |
//! | 101        | Branch                | B, BL                       |
//! | 11x        | Coprocessor           | LDC, CDP, MCR               |
//! | 1111       | Software Interrupt    | SWI                         |
//!
//! ## Barrel Shifter
//!
//! Operand2 can be shifted at no extra cost: LSL, LSR, ASR, ROR, RRX.
//!
//! ## Submodules
//!
//! - [`classification`] - Opcode class table
//! - [`instructions`] - Field decoding
//! - [`operations`] - Execution
//! - [`alu_instruction`] - ALU ops and barrel shifter
//! - [`mode`] - Fetched opcode with class and condition

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
#[allow(clippy::cast_lossless)]
pub mod alu_instruction;

#[allow(clippy::unreadable_literal)]
pub mod classification;

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_possible_wrap)]
#[allow(clippy::similar_names)]
pub mod instructions;

#[allow(clippy::cast_possible_truncation)]
pub mod mode;

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
#[allow(clippy::cast_lossless)]
#[allow(clippy::similar_names)]
pub mod operations;
