//! Instruction disassembly over a byte window.
//!
//! Disassembly decodes through the same table as execution and never touches
//! engine state. Callers copy a window out of the address space first.

use crate::decoder::{Decoder, Operand};
use crate::state::Register;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Mnemonic shown for a record that runs past the end of the window.
pub const OUT_OF_RANGE_MNEMONIC: &str = "(out of range)";

/// A single disassembled instruction row.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisassembledInstruction {
    /// Address of the opcode byte.
    pub address: u16,
    /// Raw opcode byte (0 for out-of-range rows).
    pub opcode: u8,
    /// Operand bytes in stream order.
    pub operand_bytes: Vec<u8>,
    /// Length in bytes consumed from the window.
    pub len_bytes: u8,
    /// The instruction mnemonic (e.g. "IMM", "JE", "WRITE").
    pub mnemonic: String,
    /// The formatted operands (e.g. "A, 0x1234").
    pub operands: String,
    /// Whether this row is the instruction at IP.
    pub is_current: bool,
}

impl DisassembledInstruction {
    fn out_of_range(address: u16) -> Self {
        Self {
            address,
            opcode: 0,
            operand_bytes: Vec::new(),
            len_bytes: 1,
            mnemonic: OUT_OF_RANGE_MNEMONIC.to_owned(),
            operands: String::new(),
            is_current: false,
        }
    }

    /// Returns `true` for placeholder rows past the end of the window.
    #[must_use]
    pub fn is_out_of_range(&self) -> bool {
        self.mnemonic == OUT_OF_RANGE_MNEMONIC
    }

    /// Mnemonic and operands as one line of assembly.
    #[must_use]
    pub fn text(&self) -> String {
        if self.operands.is_empty() {
            self.mnemonic.clone()
        } else {
            format!("{} {}", self.mnemonic, self.operands)
        }
    }
}

/// Disassembles exactly `count` records from `bytes`, the first at `start_address`.
///
/// Records that would read past the end of `bytes` become one-byte
/// out-of-range placeholders, so the result length is always `count`.
#[must_use]
pub fn disassemble(bytes: &[u8], start_address: u16, count: usize) -> Vec<DisassembledInstruction> {
    let mut rows = Vec::with_capacity(count);
    let mut index = 0_usize;
    let mut address = start_address;

    for _ in 0..count {
        let row = bytes
            .get(index..)
            .and_then(|window| disassemble_one(address, window))
            .unwrap_or_else(|| DisassembledInstruction::out_of_range(address));
        index += usize::from(row.len_bytes);
        address = address.wrapping_add(u16::from(row.len_bytes));
        rows.push(row);
    }

    rows
}

fn disassemble_one(address: u16, window: &[u8]) -> Option<DisassembledInstruction> {
    let instr = Decoder::decode(address, window)?;
    let operands = [instr.first_operand(), instr.second_operand()]
        .into_iter()
        .flatten()
        .map(format_operand)
        .collect::<Vec<_>>()
        .join(", ");

    Some(DisassembledInstruction {
        address,
        opcode: instr.opcode,
        operand_bytes: instr.operand_bytes().to_vec(),
        len_bytes: instr.encoded_len(),
        mnemonic: instr.entry.mnemonic.to_owned(),
        operands,
        is_current: false,
    })
}

fn format_operand(operand: Operand) -> String {
    match operand {
        Operand::Register(index) => format_register(index),
        Operand::RegisterPair { source, dest } => {
            format!("{}, {}", format_register(source), format_register(dest))
        }
        Operand::Word(value) => format!("0x{value:04X}"),
    }
}

fn format_register(index: u8) -> String {
    Register::from_index(index).map_or_else(|| format!("R?{index:02X}"), |reg| reg.name().to_owned())
}
