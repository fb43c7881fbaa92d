//! Byte-stream instruction decoder.
//!
//! The decoder walks the opcode table in [`crate::encoding`] and collects
//! exactly the operand bytes the table entry asks for. Execution and
//! disassembly both decode through here, so decode length always matches
//! the bytes execution consumes.

use crate::encoding::{classify_opcode, OpcodeEntry, OperandKind, OperationId};

/// Maximum operand bytes any table entry carries.
pub const MAX_OPERAND_BYTES: usize = 3;

/// One decoded operand value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Operand {
    /// Raw register index byte; not yet validated against the register file.
    Register(u8),
    /// Packed register pair, three bits each.
    RegisterPair {
        /// Source register index (`bits 5..3`).
        source: u8,
        /// Destination register index (`bits 2..0`).
        dest: u8,
    },
    /// Little-endian immediate or absolute address.
    Word(u16),
}

impl Operand {
    const fn from_bytes(kind: OperandKind, bytes: &[u8]) -> Option<Self> {
        match (kind, bytes) {
            (OperandKind::Register, [index]) => Some(Self::Register(*index)),
            (OperandKind::RegisterPair, [packed]) => Some(Self::RegisterPair {
                source: (*packed >> 3) & 0x07,
                dest: *packed & 0x07,
            }),
            (OperandKind::ImmediateOrAddress, [lo, hi]) => {
                Some(Self::Word(u16::from_le_bytes([*lo, *hi])))
            }
            _ => None,
        }
    }
}

/// Decoded instruction record. Ephemeral: produced per decode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedInstruction {
    /// Address of the opcode byte.
    pub address: u16,
    /// Raw opcode byte as fetched.
    pub opcode: u8,
    /// Table entry selected for the opcode.
    pub entry: OpcodeEntry,
    operand_bytes: [u8; MAX_OPERAND_BYTES],
}

impl DecodedInstruction {
    /// Operation executed by this instruction.
    #[must_use]
    pub const fn operation(&self) -> OperationId {
        self.entry.operation
    }

    /// Total encoded length including the opcode byte.
    #[must_use]
    pub const fn encoded_len(&self) -> u8 {
        self.entry.encoded_len()
    }

    /// Operand bytes in stream order.
    #[must_use]
    pub fn operand_bytes(&self) -> &[u8] {
        &self.operand_bytes[..usize::from(self.encoded_len() - 1)]
    }

    /// First operand, if the entry has one.
    #[must_use]
    pub fn first_operand(&self) -> Option<Operand> {
        let len = usize::from(self.entry.first.byte_len());
        Operand::from_bytes(self.entry.first, &self.operand_bytes[..len])
    }

    /// Second operand, if the entry has one.
    #[must_use]
    pub fn second_operand(&self) -> Option<Operand> {
        let start = usize::from(self.entry.first.byte_len());
        let end = start + usize::from(self.entry.second.byte_len());
        Operand::from_bytes(self.entry.second, &self.operand_bytes[start..end])
    }
}

/// Stateless decoder entry points.
#[derive(Debug, Clone, Copy, Default)]
pub struct Decoder;

impl Decoder {
    /// Decodes one instruction from `bytes`, whose first byte sits at `address`.
    ///
    /// Returns `None` when `bytes` ends before the operands do.
    #[must_use]
    pub fn decode(address: u16, bytes: &[u8]) -> Option<DecodedInstruction> {
        let (&opcode, operands) = bytes.split_first()?;
        Self::decode_entry(classify_opcode(opcode), address, opcode, operands)
    }

    /// Builds an instruction for an explicit table entry from its operand bytes.
    ///
    /// Extra trailing bytes are ignored. Returns `None` when too few are given.
    #[must_use]
    pub fn decode_entry(
        entry: OpcodeEntry,
        address: u16,
        opcode: u8,
        operands: &[u8],
    ) -> Option<DecodedInstruction> {
        let mut remaining = operands.iter().copied();
        Self::decode_with(entry, address, opcode, || remaining.next().ok_or(())).ok()
    }

    /// Decodes by pulling operand bytes one at a time from `next_byte`.
    ///
    /// `next_byte` is called exactly `entry.encoded_len() - 1` times unless it
    /// fails first.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `next_byte`.
    pub fn decode_with<E>(
        entry: OpcodeEntry,
        address: u16,
        opcode: u8,
        mut next_byte: impl FnMut() -> Result<u8, E>,
    ) -> Result<DecodedInstruction, E> {
        let mut operand_bytes = [0; MAX_OPERAND_BYTES];
        let count = usize::from(entry.encoded_len() - 1);
        for slot in &mut operand_bytes[..count] {
            *slot = next_byte()?;
        }
        Ok(DecodedInstruction {
            address,
            opcode,
            entry,
            operand_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Decoder, Operand};
    use crate::encoding::{
        JumpCondition, OperationId, OPCODE_COUNT, OPCODE_TABLE, READ_TO_ADDRESS_IN_REGISTER,
    };

    #[test]
    fn load_immediate_carries_register_and_word() {
        let instr = Decoder::decode(0x8000, &[0x01, 0x02, 0x34, 0x12]).expect("complete");
        assert_eq!(instr.operation(), OperationId::LoadImmediate);
        assert_eq!(instr.encoded_len(), 4);
        assert_eq!(instr.first_operand(), Some(Operand::Register(2)));
        assert_eq!(instr.second_operand(), Some(Operand::Word(0x1234)));
        assert_eq!(instr.operand_bytes(), &[0x02, 0x34, 0x12]);
    }

    #[test]
    fn register_pair_unpacks_source_and_dest() {
        let instr = Decoder::decode(0, &[0x02, 0b0010_1011]).expect("complete");
        assert_eq!(
            instr.first_operand(),
            Some(Operand::RegisterPair { source: 5, dest: 3 })
        );
        assert_eq!(instr.second_operand(), None);
    }

    #[test]
    fn aliased_opcode_bytes_decode_identically() {
        let low = Decoder::decode(0, &[18, 0x00, 0x90]).expect("complete");
        let high = Decoder::decode(0, &[18 + OPCODE_COUNT, 0x00, 0x90]).expect("complete");
        assert_eq!(low.entry, high.entry);
        assert_eq!(
            high.operation(),
            OperationId::JumpToAddress(JumpCondition::Equal)
        );
        assert_eq!(high.opcode, 51);
    }

    #[test]
    fn truncated_window_does_not_decode() {
        assert!(Decoder::decode(0, &[]).is_none());
        assert!(Decoder::decode(0, &[0x01, 0x00]).is_none());
        assert!(Decoder::decode(0, &[0x00]).is_some());
    }

    #[test]
    fn pull_decoder_consumes_exactly_the_encoded_length() {
        for entry in OPCODE_TABLE {
            let mut pulled = 0_u8;
            let instr = Decoder::decode_with::<()>(entry, 0, 0, || {
                pulled += 1;
                Ok(pulled)
            })
            .expect("infallible source");
            assert_eq!(pulled + 1, instr.encoded_len());
        }
    }

    #[test]
    fn off_table_entry_can_be_built_explicitly() {
        let instr =
            Decoder::decode_entry(READ_TO_ADDRESS_IN_REGISTER, 0x0100, 33, &[3]).expect("complete");
        assert_eq!(instr.operation(), OperationId::ReadToAddressInRegister);
        assert_eq!(instr.first_operand(), Some(Operand::Register(3)));
    }
}
