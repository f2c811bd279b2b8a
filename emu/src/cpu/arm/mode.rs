use crate::bitwise::Bits;
use crate::cpu::arm::classification::{InstructionClass, classify};
use crate::cpu::arm::instructions::ArmModeInstruction;
use crate::cpu::condition::Condition;
use crate::error::CpuError;

/// A fetched ARM word with its class and condition resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmModeOpcode {
    pub class: InstructionClass,
    pub condition: Condition,
    pub raw: u32,
}

impl ArmModeOpcode {
    /// Decodes the instruction fields. Only worth doing once the condition passed.
    ///
    /// # Errors
    ///
    /// See [`ArmModeInstruction::decode`].
    pub fn decode(&self) -> Result<ArmModeInstruction, CpuError> {
        ArmModeInstruction::decode(self.class, self.raw)
    }
}

impl TryFrom<u32> for ArmModeOpcode {
    type Error = CpuError;

    fn try_from(op_code: u32) -> Result<Self, Self::Error> {
        let class = classify(op_code)?;
        let condition = Condition::try_from(op_code.get_bits(28..=31) as u8)
            .map_err(|reason| CpuError::undefined(op_code, reason))?;

        Ok(Self {
            class,
            condition,
            raw: op_code,
        })
    }
}

impl std::ops::Deref for ArmModeOpcode {
    type Target = u32;

    fn deref(&self) -> &Self::Target {
        &self.raw
    }
}

impl std::fmt::Display for ArmModeOpcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let instruction = self.decode().map_or_else(
            |_| format!("{} (undefined)", self.class),
            |instruction| instruction.disassembler(self.condition),
        );
        let instruction = format!("INS: {instruction}\n");

        let bytes_pos1 = "POS: |..3 ..................2 ..................1 ..................0|\n";
        let bytes_pos2 = "     |1_0_9_8_7_6_5_4_3_2_1_0_9_8_7_6_5_4_3_2_1_0_9_8_7_6_5_4_3_2_1_0|\n";

        let op_code_format = match self.class {
            InstructionClass::DataProcessing => {
                "FMT: |_Cond__|0_0|I|_code__|S|__Rn___|__Rd___|_______operand2________|"
            }
            InstructionClass::Multiply => {
                "FMT: |_Cond__|0_0_0_0_0_0|A|S|__Rd___|__Rn___|__Rs___|1_0_0_1|__Rm___|"
            }
            InstructionClass::MultiplyLong => {
                "FMT: |_Cond__|0_0_0_0_1|U|A|S|_RdHi__|_RdLo__|__Rs___|1_0_0_1|__Rm___|"
            }
            InstructionClass::Mrs => {
                "FMT: |_Cond__|0_0_0_1_0|P|0_0_1_1_1_1|__Rd___|0_0_0_0_0_0_0_0_0_0_0_0|"
            }
            InstructionClass::MsrRegister => {
                "FMT: |_Cond__|0_0_0_1_0|P|1_0|f_0_0_c|1_1_1_1|0_0_0_0_0_0_0_0|__Rm___|"
            }
            InstructionClass::MsrImmediate => {
                "FMT: |_Cond__|0_0_1_1_0|P|1_0|f_0_0_c|1_1_1_1|_Rotate|______Imm______|"
            }
            InstructionClass::BranchAndExchange => {
                "FMT: |_Cond__|0_0_0_1|0_0_1_0|1_1_1_1|1_1_1_1|1_1_1_1|0_0_0_1|__Rn___|"
            }
            InstructionClass::SingleDataSwap => {
                "FMT: |_Cond__|0_0_0_1_0|B|0_0|__Rn___|__Rd___|0_0_0_0|1_0_0_1|__Rm___|"
            }
            InstructionClass::HalfwordDataTransferRegisterOffset => {
                "FMT: |_Cond__|0_0_0|P|U|0|W|L|__Rn___|__Rd___|0_0_0_0|1|S|H|1|__Rm___|"
            }
            InstructionClass::HalfwordDataTransferImmediateOffset => {
                "FMT: |_Cond__|0_0_0|P|U|1|W|L|__Rn___|__Rd___|_Offset|1|S|H|1|_Offset|"
            }
            InstructionClass::Undefined => {
                "FMT: |_Cond__|0_1_1|_____________________________________________|1|_______|"
            }
            InstructionClass::SingleDataTransfer => {
                "FMT: |_Cond__|0_1|I|P|U|B|W|L|__Rn___|__Rd___|________Offset_________|"
            }
            InstructionClass::BlockDataTransfer => {
                "FMT: |_Cond__|1_0_0|P|U|S|W|L|__Rn___|_____________Reg_List__________|"
            }
            InstructionClass::Branch => {
                "FMT: |_Cond__|1_0_1|L|______________________Offset___________________|"
            }
            InstructionClass::CoprocessorDataTransfer => {
                "FMT: |_Cond__|1_1_0|P|U|N|W|L|__Rn___|__CRd__|__Cp#__|____Offset_____|"
            }
            InstructionClass::CoprocessorDataOperation => {
                "FMT: |_Cond__|1_1_1_0|_CPOpc_|__CRn__|__CRd__|__Cp#__|_CP__|0|__CRm__|"
            }
            InstructionClass::CoprocessorRegisterTransfer => {
                "FMT: |_Cond__|1_1_1_0|CPO__|L|__CRn__|__Rd___|__Cp#__|_CP__|1|__CRm__|"
            }
            InstructionClass::SoftwareInterrupt => {
                "FMT: |_Cond__|1_1_1_1|_____________Ignored by processor______________|"
            }
        };

        let mut raw_bits = String::new();
        for i in format!("{:#034b}", self.raw).chars().skip(2) {
            raw_bits.push(i);
            raw_bits.push('_');
        }
        raw_bits.pop();
        let raw_bits = format!("RAW: |{raw_bits}|\n");

        writeln!(
            f,
            "{instruction}{bytes_pos1}{bytes_pos2}{raw_bits}{op_code_format}"
        )
    }
}
