/// Number of table slots; a raw opcode byte selects slot `byte % OPCODE_COUNT`.
pub const OPCODE_COUNT: u8 = 33;

/// Binary stack operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs)]
pub enum MathKind {
    Add,
    Subtract,
    Multiply,
    Divide,
    And,
    Or,
    Xor,
}

/// Jump predicates, each matched against an exact 3-bit `FLAGS` pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs)]
pub enum JumpCondition {
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
}

/// Operation identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs)]
pub enum OperationId {
    NoOp,
    LoadImmediate,
    MoveRegisterValue,
    LoadA,
    LoadB,
    StoreA,
    StoreB,
    PushToStack,
    PopFromStack,
    Math(MathKind),
    BitwiseNot,
    Compare,
    JumpToAddress(JumpCondition),
    JumpToAddressInRegister(JumpCondition),
    WriteFromAddress,
    WriteFromAddressInRegister,
    ReadToAddress,
    ReadToAddressInRegister,
}

/// Shape of one operand in the instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum OperandKind {
    /// No operand.
    None,
    /// One byte holding a register index.
    Register,
    /// One byte packed as `(source << 3) | dest`.
    RegisterPair,
    /// Two bytes, little-endian word.
    ImmediateOrAddress,
}

impl OperandKind {
    /// Encoded size in bytes.
    #[must_use]
    pub const fn byte_len(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Register | Self::RegisterPair => 1,
            Self::ImmediateOrAddress => 2,
        }
    }
}

/// One decode-table slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpcodeEntry {
    /// Operation executed for this slot.
    pub operation: OperationId,
    /// Assembly mnemonic. Aliased slots share a mnemonic.
    pub mnemonic: &'static str,
    /// Shape of the first operand.
    pub first: OperandKind,
    /// Shape of the second operand.
    pub second: OperandKind,
}

impl OpcodeEntry {
    const fn new(
        operation: OperationId,
        mnemonic: &'static str,
        first: OperandKind,
        second: OperandKind,
    ) -> Self {
        Self {
            operation,
            mnemonic,
            first,
            second,
        }
    }

    const fn bare(operation: OperationId, mnemonic: &'static str) -> Self {
        Self::new(operation, mnemonic, OperandKind::None, OperandKind::None)
    }

    const fn one(operation: OperationId, mnemonic: &'static str, first: OperandKind) -> Self {
        Self::new(operation, mnemonic, first, OperandKind::None)
    }

    /// Total encoded length: opcode byte plus both operands.
    #[must_use]
    pub const fn encoded_len(&self) -> u8 {
        1 + self.first.byte_len() + self.second.byte_len()
    }
}

use JumpCondition as J;
use MathKind as M;
use OperandKind as K;
use OperationId as Op;

/// Single source-of-truth decode table shared by execution and disassembly.
///
/// Slots 18..=23 and 24..=29 alias the same jump mnemonics with address and
/// register operands respectively.
pub const OPCODE_TABLE: [OpcodeEntry; OPCODE_COUNT as usize] = [
    OpcodeEntry::bare(Op::NoOp, "NOP"),
    OpcodeEntry::new(Op::LoadImmediate, "IMM", K::Register, K::ImmediateOrAddress),
    OpcodeEntry::one(Op::MoveRegisterValue, "MOV", K::RegisterPair),
    OpcodeEntry::one(Op::LoadA, "LDA", K::Register),
    OpcodeEntry::one(Op::LoadB, "LDB", K::Register),
    OpcodeEntry::one(Op::StoreA, "STA", K::Register),
    OpcodeEntry::one(Op::StoreB, "STB", K::Register),
    OpcodeEntry::one(Op::PushToStack, "PUSH", K::Register),
    OpcodeEntry::one(Op::PopFromStack, "POP", K::Register),
    OpcodeEntry::bare(Op::Math(M::Add), "ADD"),
    OpcodeEntry::bare(Op::Math(M::Subtract), "SUB"),
    OpcodeEntry::bare(Op::Math(M::Multiply), "MUL"),
    OpcodeEntry::bare(Op::Math(M::Divide), "DIV"),
    OpcodeEntry::bare(Op::Math(M::And), "AND"),
    OpcodeEntry::bare(Op::Math(M::Or), "OR"),
    OpcodeEntry::bare(Op::Math(M::Xor), "XOR"),
    OpcodeEntry::bare(Op::BitwiseNot, "NOT"),
    OpcodeEntry::bare(Op::Compare, "CMP"),
    OpcodeEntry::one(Op::JumpToAddress(J::Equal), "JE", K::ImmediateOrAddress),
    OpcodeEntry::one(Op::JumpToAddress(J::NotEqual), "JNE", K::ImmediateOrAddress),
    OpcodeEntry::one(Op::JumpToAddress(J::LessThan), "JLT", K::ImmediateOrAddress),
    OpcodeEntry::one(Op::JumpToAddress(J::GreaterThan), "JGT", K::ImmediateOrAddress),
    OpcodeEntry::one(Op::JumpToAddress(J::LessThanOrEqual), "JLTE", K::ImmediateOrAddress),
    OpcodeEntry::one(Op::JumpToAddress(J::GreaterThanOrEqual), "JGTE", K::ImmediateOrAddress),
    OpcodeEntry::one(Op::JumpToAddressInRegister(J::Equal), "JE", K::Register),
    OpcodeEntry::one(Op::JumpToAddressInRegister(J::NotEqual), "JNE", K::Register),
    OpcodeEntry::one(Op::JumpToAddressInRegister(J::LessThan), "JLT", K::Register),
    OpcodeEntry::one(Op::JumpToAddressInRegister(J::GreaterThan), "JGT", K::Register),
    OpcodeEntry::one(Op::JumpToAddressInRegister(J::LessThanOrEqual), "JLTE", K::Register),
    OpcodeEntry::one(Op::JumpToAddressInRegister(J::GreaterThanOrEqual), "JGTE", K::Register),
    OpcodeEntry::one(Op::WriteFromAddress, "WRITE", K::ImmediateOrAddress),
    OpcodeEntry::one(Op::WriteFromAddressInRegister, "WRITE", K::Register),
    OpcodeEntry::one(Op::ReadToAddress, "READ", K::ImmediateOrAddress),
];

/// Entry for the register-indirect read, which sits one past the last
/// reachable slot and so is only reachable through a pre-built instruction.
pub const READ_TO_ADDRESS_IN_REGISTER: OpcodeEntry =
    OpcodeEntry::one(Op::ReadToAddressInRegister, "READ", K::Register);

/// Returns the table slot selected by a raw opcode byte.
#[must_use]
pub const fn opcode_slot(byte: u8) -> u8 {
    byte % OPCODE_COUNT
}

/// Looks up the table entry for a raw opcode byte. Total over all bytes.
#[must_use]
pub const fn classify_opcode(byte: u8) -> OpcodeEntry {
    OPCODE_TABLE[opcode_slot(byte) as usize]
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{
        classify_opcode, opcode_slot, JumpCondition, OperandKind, OperationId, OPCODE_COUNT,
        OPCODE_TABLE, READ_TO_ADDRESS_IN_REGISTER,
    };

    #[test]
    fn every_byte_maps_to_its_modulo_slot() {
        for byte in 0_u8..=u8::MAX {
            assert_eq!(classify_opcode(byte), OPCODE_TABLE[usize::from(byte % 33)]);
        }
        assert_eq!(opcode_slot(33), 0);
        assert_eq!(opcode_slot(255), 24);
    }

    #[test]
    fn operations_are_unique_but_mnemonics_alias() {
        let mut by_mnemonic: HashMap<&str, Vec<OperandKind>> = HashMap::new();
        for entry in OPCODE_TABLE {
            by_mnemonic
                .entry(entry.mnemonic)
                .or_default()
                .push(entry.first);
        }
        assert_eq!(
            by_mnemonic["JE"],
            vec![OperandKind::ImmediateOrAddress, OperandKind::Register]
        );
        assert_eq!(
            by_mnemonic["WRITE"],
            vec![OperandKind::ImmediateOrAddress, OperandKind::Register]
        );

        for (i, left) in OPCODE_TABLE.iter().enumerate() {
            for right in &OPCODE_TABLE[i + 1..] {
                assert_ne!(left.operation, right.operation);
            }
        }
    }

    #[test]
    fn encoded_lengths_follow_operand_shapes() {
        assert_eq!(OPCODE_TABLE[0].encoded_len(), 1);
        assert_eq!(OPCODE_TABLE[1].encoded_len(), 4);
        assert_eq!(OPCODE_TABLE[2].encoded_len(), 2);
        assert_eq!(OPCODE_TABLE[9].encoded_len(), 1);
        assert_eq!(OPCODE_TABLE[18].encoded_len(), 3);
        assert_eq!(OPCODE_TABLE[24].encoded_len(), 2);
        assert_eq!(OPCODE_TABLE[32].encoded_len(), 3);
        assert_eq!(READ_TO_ADDRESS_IN_REGISTER.encoded_len(), 2);
    }

    #[test]
    fn register_indirect_read_is_outside_the_table() {
        assert_eq!(usize::from(OPCODE_COUNT), OPCODE_TABLE.len());
        assert!(OPCODE_TABLE
            .iter()
            .all(|entry| entry.operation != OperationId::ReadToAddressInRegister));
        assert_eq!(
            OPCODE_TABLE[21].operation,
            OperationId::JumpToAddress(JumpCondition::GreaterThan)
        );
    }
}
