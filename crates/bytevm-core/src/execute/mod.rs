//! Fetch-decode-execute engine.
//!
//! One [`Engine`] owns the register file and the banked address space. Every
//! `step` fetches the opcode at IP, pulls operand bytes with the IP increment
//! rules (a streaming bank edge may load the next bank mid-instruction),
//! executes, and finally advances IP past the last operand byte unless the
//! instruction jumped.
//!
//! Faults leave IP on the faulting instruction. Terminal faults latch until
//! [`Engine::reset`].

mod flags;
mod helpers;

pub use flags::compare_flags;
pub use helpers::{apply_math, MAX_WRITE_SCAN};

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::num::NonZeroU64;
use std::path::Path;

use helpers::{char_code, last_byte_address, stack_below};

use crate::api::{InputProvider, Notification, NotificationSink, RunOutcome, StepOutcome};
use crate::config::CoreConfig;
use crate::decoder::{DecodedInstruction, Decoder, Operand};
use crate::disasm::{disassemble, DisassembledInstruction};
use crate::encoding::{classify_opcode, OperationId};
use crate::fault::{FaultCode, MemoryCopyError, RomLoadError};
use crate::memory::{AddressSpace, MappingMode, RomSource, RomStream, ROM_START};
use crate::state::{
    next_address_for_ip, next_address_for_sp, IpAdvance, Register, RegisterFile, RegisterWrite,
    RunState,
};

/// Bytes copied out of the address space for [`Engine::disassemble_at_ip`].
pub const DISASSEMBLY_WINDOW_BYTES: usize = 128;

/// How control leaves an executed instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    /// Continue after the last operand byte.
    Advance,
    /// Continue at an explicit target.
    Jump(u16),
    /// Suspend until the host supplies a line for a read into `target`.
    Suspend { target: u16 },
}

/// A read instruction suspended until [`Engine::resume_with_input`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingRead {
    address: u16,
    opcode: u8,
    mnemonic: &'static str,
    last_byte: u16,
    target: u16,
}

/// Register machine instance: registers, banked memory, and run state.
pub struct Engine {
    config: CoreConfig,
    registers: RegisterFile,
    memory: AddressSpace,
    run_state: RunState,
    pending_read: Option<PendingRead>,
    input: Option<Box<dyn InputProvider>>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("registers", &self.registers)
            .field("active_bank", &self.memory.active_bank())
            .field("run_state", &self.run_state)
            .field("has_input_provider", &self.input.is_some())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Opens the ROM file at `path` using `config.mapping_mode`.
    ///
    /// Preloaded mode reads up to 1 MiB now; streaming mode keeps the file
    /// open and reads one bank at a time.
    ///
    /// # Errors
    ///
    /// Returns [`RomLoadError::Open`] when the file cannot be opened and
    /// [`RomLoadError::Read`] when the initial load fails.
    pub fn open(path: impl AsRef<Path>, config: CoreConfig) -> Result<Self, RomLoadError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| RomLoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), mode = ?config.mapping_mode, "opening rom image");
        let rom = match config.mapping_mode {
            MappingMode::Preloaded => RomSource::preload(BufReader::new(file))?,
            MappingMode::Streaming => RomSource::streaming(file),
        };
        Self::with_rom(rom, config)
    }

    /// Builds a preloaded engine over an in-memory image.
    ///
    /// # Errors
    ///
    /// Returns [`RomLoadError::Read`] if `image` fails mid-read.
    pub fn from_image(image: impl Read, config: CoreConfig) -> Result<Self, RomLoadError> {
        Self::with_rom(RomSource::preload(image)?, config)
    }

    /// Builds a streaming engine over any seekable reader.
    ///
    /// # Errors
    ///
    /// Returns [`RomLoadError::Read`] when bank 0 cannot be loaded.
    pub fn from_stream(
        stream: impl RomStream + 'static,
        config: CoreConfig,
    ) -> Result<Self, RomLoadError> {
        Self::with_rom(RomSource::streaming(stream), config)
    }

    fn with_rom(rom: RomSource, config: CoreConfig) -> Result<Self, RomLoadError> {
        let config = config.with_mapping_mode(rom.mapping_mode());
        let memory = AddressSpace::new(rom)?;
        Ok(Self {
            registers: RegisterFile::with_entry_point(config.entry_point),
            memory,
            run_state: RunState::Running,
            pending_read: None,
            input: None,
            config,
        })
    }

    /// Installs a provider that completes read instructions inside `step`.
    #[must_use]
    pub fn with_input(mut self, provider: impl InputProvider + 'static) -> Self {
        self.input = Some(Box::new(provider));
        self
    }

    /// Replaces the input provider. `None` makes reads suspend.
    pub fn set_input_provider(&mut self, provider: Option<Box<dyn InputProvider>>) {
        self.input = provider;
    }

    /// Restores boot register state and reselects bank 0.
    ///
    /// Clears any pending read and latched fault. RAM is left as is.
    ///
    /// # Errors
    ///
    /// Returns [`FaultCode::RomReadFailed`] (and latches it) when bank 0
    /// cannot be reloaded.
    pub fn reset(&mut self, sink: &mut dyn NotificationSink) -> Result<(), FaultCode> {
        self.registers = RegisterFile::with_entry_point(self.config.entry_point);
        self.pending_read = None;
        self.run_state = RunState::Running;
        let switched = self.memory.switch_bank(0);
        self.finish_bank_switch(switched, sink).map(|_| ())
    }

    /// Immutable configuration this engine was built with.
    #[must_use]
    pub const fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Register file snapshot.
    #[must_use]
    pub const fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    /// Current instruction pointer.
    #[must_use]
    pub const fn ip(&self) -> u16 {
        self.registers.ip()
    }

    /// Current stack pointer.
    #[must_use]
    pub const fn sp(&self) -> u16 {
        self.registers.sp()
    }

    /// Current flags byte.
    #[must_use]
    pub const fn flags(&self) -> u8 {
        self.registers.flags()
    }

    /// Last value written to `BANKNUM`.
    #[must_use]
    pub const fn bank_num(&self) -> u8 {
        self.registers.bank_num()
    }

    /// Index of the bank currently mapped at `0x8000`.
    #[must_use]
    pub const fn active_bank(&self) -> u64 {
        self.memory.active_bank()
    }

    /// Host-observable run state.
    #[must_use]
    pub const fn run_state(&self) -> RunState {
        self.run_state
    }

    /// ROM mapping mode.
    #[must_use]
    pub const fn mapping_mode(&self) -> MappingMode {
        self.memory.mapping_mode()
    }

    /// Copies `length` bytes from `start` into `destination[offset..]`.
    ///
    /// Wraps at `0xFFFF` and crosses the RAM/ROM boundary transparently.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryCopyError::DestinationTooSmall`] when `destination`
    /// cannot hold `offset + length` bytes.
    pub fn fill_buffer_from_memory(
        &self,
        start: u16,
        destination: &mut [u8],
        length: usize,
        offset: usize,
    ) -> Result<(), MemoryCopyError> {
        self.memory.fill_buffer(start, destination, length, offset)
    }

    /// Disassembles `count` records starting at IP.
    #[must_use]
    pub fn disassemble_at_ip(&self, count: usize) -> Vec<DisassembledInstruction> {
        let ip = self.ip();
        let mut window = [0_u8; DISASSEMBLY_WINDOW_BYTES];
        let mut addr = ip;
        for byte in &mut window {
            *byte = self.memory.read_byte(addr);
            addr = addr.wrapping_add(1);
        }

        let mut rows = disassemble(&window, ip, count);
        if let Some(first) = rows.first_mut() {
            first.is_current = true;
        }
        rows
    }

    /// Maps the previous ROM bank into the window.
    ///
    /// # Errors
    ///
    /// Returns [`FaultCode::RomReadFailed`] (and latches it) on I/O failure.
    pub fn previous_bank(&mut self, sink: &mut dyn NotificationSink) -> Result<u64, FaultCode> {
        let switched = self.memory.previous_bank();
        self.finish_bank_switch(switched, sink)
    }

    /// Maps the next ROM bank into the window.
    ///
    /// # Errors
    ///
    /// Returns [`FaultCode::RomReadFailed`] (and latches it) on I/O failure.
    pub fn next_bank(&mut self, sink: &mut dyn NotificationSink) -> Result<u64, FaultCode> {
        let switched = self.memory.next_bank();
        self.finish_bank_switch(switched, sink)
    }

    /// Fetches, decodes, and executes the instruction at IP.
    pub fn step(&mut self, sink: &mut dyn NotificationSink) -> StepOutcome {
        if let Some(outcome) = self.blocked_outcome() {
            return outcome;
        }

        let address = self.registers.ip();
        let opcode = self.memory.read_byte(address);
        let mut cursor = address;
        let fetched = Decoder::decode_with(classify_opcode(opcode), address, opcode, || {
            cursor = self.advance_ip(cursor, sink)?;
            Ok(self.memory.read_byte(cursor))
        });

        match fetched {
            Ok(instr) => self.complete(&instr, cursor, sink),
            Err(cause) => self.raise(cause, address),
        }
    }

    /// Executes a pre-decoded instruction as though it were fetched at its
    /// own address.
    ///
    /// This is the only way to run entries outside the 33-slot table, such
    /// as the register-indirect read. An entry whose operand kinds do not
    /// fit its operation faults with [`FaultCode::OperandMismatch`].
    pub fn execute(
        &mut self,
        instr: &DecodedInstruction,
        sink: &mut dyn NotificationSink,
    ) -> StepOutcome {
        if let Some(outcome) = self.blocked_outcome() {
            return outcome;
        }
        let last_byte = last_byte_address(instr.address, instr.encoded_len(), self.mapping_mode());
        self.complete(instr, last_byte, sink)
    }

    /// Completes a suspended read with `text` and advances past it.
    ///
    /// Returns [`FaultCode::InputNotPending`] without latching when no read
    /// is suspended.
    pub fn resume_with_input(&mut self, text: &str, sink: &mut dyn NotificationSink) -> StepOutcome {
        let (RunState::AwaitingInput { .. }, Some(pending)) = (self.run_state, self.pending_read)
        else {
            return self.raise(FaultCode::InputNotPending, self.registers.ip());
        };

        self.pending_read = None;
        self.run_state = RunState::Running;
        self.store_input(pending.target, text, sink);
        match self.advance_ip(pending.last_byte, sink) {
            Ok(next) => {
                self.registers.set_ip(next);
                self.retired(pending.address, pending.opcode, pending.mnemonic)
            }
            Err(cause) => self.raise(cause, pending.address),
        }
    }

    /// Steps until a fault, a suspended read, or `max_steps` retirements.
    pub fn run(
        &mut self,
        sink: &mut dyn NotificationSink,
        max_steps: Option<NonZeroU64>,
    ) -> RunOutcome {
        let mut steps = 0_u64;
        loop {
            let final_step = self.step(sink);
            if !final_step.is_retired() {
                return RunOutcome { steps, final_step };
            }
            steps += 1;
            if max_steps.is_some_and(|max| steps >= max.get()) {
                return RunOutcome { steps, final_step };
            }
        }
    }

    /// Executes consecutive no-ops at IP, at most `limit`, returning how many ran.
    pub fn skip_nops(&mut self, sink: &mut dyn NotificationSink, limit: u64) -> u64 {
        let mut skipped = 0;
        while skipped < limit
            && self.run_state == RunState::Running
            && classify_opcode(self.memory.read_byte(self.ip())).operation == OperationId::NoOp
        {
            if !self.step(sink).is_retired() {
                break;
            }
            skipped += 1;
        }
        if skipped > 0 {
            tracing::debug!(skipped, ip = self.ip(), "skipped nop slide");
        }
        skipped
    }

    const fn blocked_outcome(&self) -> Option<StepOutcome> {
        match self.run_state {
            RunState::Running => None,
            RunState::AwaitingInput { address } => Some(StepOutcome::AwaitingInput { address }),
            RunState::FaultLatched(cause) => Some(StepOutcome::Fault { cause }),
        }
    }

    fn complete(
        &mut self,
        instr: &DecodedInstruction,
        last_byte: u16,
        sink: &mut dyn NotificationSink,
    ) -> StepOutcome {
        let flow = match self.dispatch(instr, sink) {
            Ok(flow) => flow,
            Err(cause) => return self.raise(cause, instr.address),
        };

        match flow {
            Flow::Jump(target) => self.registers.set_ip(target),
            Flow::Advance => match self.advance_ip(last_byte, sink) {
                Ok(next) => self.registers.set_ip(next),
                Err(cause) => return self.raise(cause, instr.address),
            },
            Flow::Suspend { target } => {
                self.registers.set_ip(instr.address);
                self.pending_read = Some(PendingRead {
                    address: instr.address,
                    opcode: instr.opcode,
                    mnemonic: instr.entry.mnemonic,
                    last_byte,
                    target,
                });
                self.run_state = RunState::AwaitingInput {
                    address: instr.address,
                };
                tracing::debug!(address = instr.address, target, "read awaiting input");
                return StepOutcome::AwaitingInput {
                    address: instr.address,
                };
            }
        }

        self.retired(instr.address, instr.opcode, instr.entry.mnemonic)
    }

    fn retired(&self, address: u16, opcode: u8, mnemonic: &'static str) -> StepOutcome {
        if self.config.trace_instructions {
            tracing::trace!(
                address,
                opcode,
                mnemonic,
                next_ip = self.registers.ip(),
                sp = self.registers.sp(),
                "retired"
            );
        }
        StepOutcome::Retired { address, opcode }
    }

    fn raise(&mut self, cause: FaultCode, address: u16) -> StepOutcome {
        if cause.is_terminal() {
            self.registers.set_ip(address);
            self.run_state = RunState::FaultLatched(cause);
        }
        tracing::warn!(
            address,
            code = cause.as_u8(),
            class = ?cause.class(),
            %cause,
            "fault raised"
        );
        StepOutcome::Fault { cause }
    }

    fn dispatch(
        &mut self,
        instr: &DecodedInstruction,
        sink: &mut dyn NotificationSink,
    ) -> Result<Flow, FaultCode> {
        let first = instr.first_operand();
        let second = instr.second_operand();

        match instr.operation() {
            OperationId::NoOp => Ok(Flow::Advance),
            OperationId::LoadImmediate => {
                self.write_register(register_operand(first)?, word_operand(second)?, sink)?;
                Ok(Flow::Advance)
            }
            OperationId::MoveRegisterValue => {
                let Some(Operand::RegisterPair { source, dest }) = first else {
                    return Err(FaultCode::OperandMismatch);
                };
                let value = self.registers.get_index(source)?;
                self.write_register(dest, value, sink)?;
                Ok(Flow::Advance)
            }
            OperationId::LoadA => self.execute_load(Register::A, register_operand(first)?, sink),
            OperationId::LoadB => self.execute_load(Register::B, register_operand(first)?, sink),
            OperationId::StoreA => self.execute_store(Register::A, register_operand(first)?, sink),
            OperationId::StoreB => self.execute_store(Register::B, register_operand(first)?, sink),
            OperationId::PushToStack => {
                let value = self.registers.get_index(register_operand(first)?)?;
                self.write_stack_word(self.registers.sp(), value, sink);
                Ok(Flow::Advance)
            }
            OperationId::PopFromStack => {
                let value = self.read_stack_word(self.registers.sp());
                self.write_register(register_operand(first)?, value, sink)?;
                Ok(Flow::Advance)
            }
            OperationId::Math(kind) => {
                let sp = self.registers.sp();
                let a_addr = stack_below(sp, 4);
                let a = self.read_stack_word(a_addr);
                let b = self.read_stack_word(stack_below(sp, 2));
                self.write_stack_word(a_addr, apply_math(kind, a, b), sink);
                self.registers.set_sp(stack_below(sp, 2));
                Ok(Flow::Advance)
            }
            OperationId::BitwiseNot => {
                let addr = stack_below(self.registers.sp(), 2);
                let value = self.read_stack_word(addr);
                self.write_stack_word(addr, !value, sink);
                Ok(Flow::Advance)
            }
            OperationId::Compare => {
                let sp = self.registers.sp();
                let a = self.read_stack_word(stack_below(sp, 4));
                let b = self.read_stack_word(stack_below(sp, 2));
                self.registers
                    .set_flags(compare_flags(self.registers.flags(), a, b));
                self.registers.set_sp(stack_below(sp, 4));
                Ok(Flow::Advance)
            }
            OperationId::JumpToAddress(condition) => {
                Ok(jump_if(condition.holds(self.registers.flags()), word_operand(first)?))
            }
            OperationId::JumpToAddressInRegister(condition) => {
                let target = self.registers.get_index(register_operand(first)?)?;
                Ok(jump_if(condition.holds(self.registers.flags()), target))
            }
            OperationId::WriteFromAddress => {
                self.write_output(word_operand(first)?, sink);
                Ok(Flow::Advance)
            }
            OperationId::WriteFromAddressInRegister => {
                let source = self.registers.get_index(register_operand(first)?)?;
                self.write_output(source, sink);
                Ok(Flow::Advance)
            }
            OperationId::ReadToAddress => Ok(self.read_input(word_operand(first)?, sink)),
            OperationId::ReadToAddressInRegister => {
                let target = self.registers.get_index(register_operand(first)?)?;
                Ok(self.read_input(target, sink))
            }
        }
    }

    fn execute_load(
        &mut self,
        dest: Register,
        address_register: u8,
        sink: &mut dyn NotificationSink,
    ) -> Result<Flow, FaultCode> {
        let address = self.registers.get_index(address_register)?;
        let value = self.memory.read_word(address);
        self.write_register(dest.index(), value, sink)?;
        Ok(Flow::Advance)
    }

    fn execute_store(
        &mut self,
        source: Register,
        address_register: u8,
        sink: &mut dyn NotificationSink,
    ) -> Result<Flow, FaultCode> {
        let address = self.registers.get_index(address_register)?;
        let [lo, hi] = self.registers.get(source).to_le_bytes();
        self.write_byte(address, lo, sink);
        self.write_byte(address.wrapping_add(1), hi, sink);
        Ok(Flow::Advance)
    }

    fn write_register(
        &mut self,
        index: u8,
        value: u16,
        sink: &mut dyn NotificationSink,
    ) -> Result<(), FaultCode> {
        let RegisterWrite::BankSelected(requested) = self.registers.set_index(index, value)? else {
            return Ok(());
        };
        let switched = self.memory.switch_bank(u64::from(requested));
        let loaded = self.finish_bank_switch(switched, sink)?;
        if loaded != u64::from(requested) {
            tracing::warn!(requested, loaded, "bank number wrapped into preloaded range");
        }
        self.registers
            .store_bank_num(u8::try_from(loaded).unwrap_or(requested));
        Ok(())
    }

    fn finish_bank_switch(
        &mut self,
        switched: io::Result<u64>,
        sink: &mut dyn NotificationSink,
    ) -> Result<u64, FaultCode> {
        match switched {
            Ok(bank) => {
                sink.on_notification(Notification::RomBankSwitched { bank });
                Ok(bank)
            }
            Err(err) => {
                tracing::error!(error = %err, "rom bank reload failed");
                self.run_state = RunState::FaultLatched(FaultCode::RomReadFailed);
                Err(FaultCode::RomReadFailed)
            }
        }
    }

    fn advance_ip(&mut self, addr: u16, sink: &mut dyn NotificationSink) -> Result<u16, FaultCode> {
        match next_address_for_ip(addr, self.memory.mapping_mode()) {
            IpAdvance::To(next) => Ok(next),
            IpAdvance::NextBank => {
                let switched = self.memory.next_bank();
                self.finish_bank_switch(switched, sink)?;
                Ok(ROM_START)
            }
        }
    }

    fn write_byte(&mut self, address: u16, value: u8, sink: &mut dyn NotificationSink) {
        if self.memory.write_byte(address, value) {
            sink.on_notification(Notification::ByteChanged { address, value });
        }
    }

    fn read_stack_word(&self, addr: u16) -> u16 {
        u16::from_le_bytes([
            self.memory.read_byte(addr),
            self.memory.read_byte(next_address_for_sp(addr)),
        ])
    }

    fn write_stack_word(&mut self, addr: u16, value: u16, sink: &mut dyn NotificationSink) {
        let [lo, hi] = value.to_le_bytes();
        self.write_byte(addr, lo, sink);
        self.write_byte(next_address_for_sp(addr), hi, sink);
    }

    fn write_output(&self, start: u16, sink: &mut dyn NotificationSink) {
        let mut text = String::new();
        let mut addr = start;
        for _ in 0..MAX_WRITE_SCAN {
            let byte = self.memory.read_byte(addr);
            if byte == 0 {
                break;
            }
            text.push(char::from(byte));
            addr = addr.wrapping_add(1);
        }
        sink.on_notification(Notification::OutputWritten(text));
    }

    fn read_input(&mut self, target: u16, sink: &mut dyn NotificationSink) -> Flow {
        let Some(provider) = self.input.as_mut() else {
            return Flow::Suspend { target };
        };
        let line = provider.read_line();
        self.store_input(target, &line, sink);
        Flow::Advance
    }

    /// Stores `text` and a terminator from `target`, reporting each run of
    /// bytes that landed in RAM as one range.
    fn store_input(&mut self, target: u16, text: &str, sink: &mut dyn NotificationSink) {
        let mut addr = target;
        let mut run: Option<(u16, usize)> = None;
        for byte in text.chars().map(char_code).chain(std::iter::once(0)) {
            if self.memory.write_byte(addr, byte) {
                run.get_or_insert((addr, 0)).1 += 1;
            } else if let Some((start, length)) = run.take() {
                sink.on_notification(Notification::RangeChanged { start, length });
            }
            addr = addr.wrapping_add(1);
        }
        if let Some((start, length)) = run {
            sink.on_notification(Notification::RangeChanged { start, length });
        }
    }
}

const fn jump_if(taken: bool, target: u16) -> Flow {
    if taken {
        Flow::Jump(target)
    } else {
        Flow::Advance
    }
}

const fn register_operand(operand: Option<Operand>) -> Result<u8, FaultCode> {
    match operand {
        Some(Operand::Register(index)) => Ok(index),
        _ => Err(FaultCode::OperandMismatch),
    }
}

const fn word_operand(operand: Option<Operand>) -> Result<u16, FaultCode> {
    match operand {
        Some(Operand::Word(value)) => Ok(value),
        _ => Err(FaultCode::OperandMismatch),
    }
}
