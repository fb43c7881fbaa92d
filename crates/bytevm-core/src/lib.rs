//! Core emulator crate for the bytevm banked 16-bit register machine.

/// Banked address space, region map, and ROM sources.
pub mod memory;
pub use memory::{
    decode_memory_region, AddressSpace, MappingMode, MemoryRegion, RomSource, RomStream,
    ADDRESS_SPACE_BYTES, PRELOADED_BANK_COUNT, PRELOADED_IMAGE_BYTES, RAM_END, RAM_START,
    ROM_BANK_BYTES, ROM_END, ROM_START,
};

/// Engine configuration.
pub mod config;
pub use config::{CoreConfig, DEFAULT_ENTRY_POINT};

/// Host-facing notification, input, and step-result contracts.
pub mod api;
pub use api::{
    InputProvider, Notification, NotificationSink, NullSink, RecordingSink, RunOutcome,
    StepOutcome, SyntheticInput, SYNTHETIC_MESSAGES,
};

/// Register file and execution state.
pub mod state;
pub use state::{
    next_address_for_ip, next_address_for_sp, previous_address_for_sp, IpAdvance, Register,
    RegisterFile, RegisterWrite, RunState, FLAGS_COMPARE_MASK, FLAGS_EQUAL, FLAGS_GREATER,
    FLAGS_LESS, REGISTER_COUNT, SP_MAX,
};

/// Opcode table shared by execution and disassembly.
pub mod encoding;
pub use encoding::{
    classify_opcode, opcode_slot, JumpCondition, MathKind, OpcodeEntry, OperandKind, OperationId,
    OPCODE_COUNT, OPCODE_TABLE, READ_TO_ADDRESS_IN_REGISTER,
};

/// Byte-stream instruction decoder.
pub mod decoder;
pub use decoder::{DecodedInstruction, Decoder, Operand, MAX_OPERAND_BYTES};

/// Fault taxonomy and error types.
pub mod fault;
pub use fault::{FaultClass, FaultCode, MemoryCopyError, RomLoadError};

/// Instruction execution engine.
pub mod execute;
pub use execute::{
    apply_math, compare_flags, Engine, DISASSEMBLY_WINDOW_BYTES, MAX_WRITE_SCAN,
};

/// Disassembly of byte windows.
pub mod disasm;
pub use disasm::{disassemble, DisassembledInstruction, OUT_OF_RANGE_MNEMONIC};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use tempfile as _;
