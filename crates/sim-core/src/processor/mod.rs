//! Table-driven processor.
//!
//! A [`Processor`] combines the immutable tables of an architecture with the
//! mutable [`CpuState`]. Executing one instruction follows a fixed sequence:
//!
//! 1. Publish [`SimEvent::InstructionFetch`] for the current PC.
//! 2. Read the opcode (unsigned, instruction width) and advance PC past it.
//! 3. Look the opcode up; unknown opcodes fail with PC already advanced.
//! 4. Read the operand, if the instruction has one, and advance PC past it.
//! 5. Run the instruction behavior.
//! 6. Report whether the end latch is set.

mod builder;
mod pattern;
mod state;
mod table;

pub use builder::ProcessorBuilder;
pub use pattern::{Alternative, Capture, CharClass, LabelSyntax, NumberSyntax, OperandPattern, PatternMatch};
pub use state::{
    CpuState, Indicator, IndicatorId, IndicatorKind, NumberFormat, Register, RegisterId, RegisterKind,
    StatusUpdate,
};
pub use table::{
    AddressingMode, AddressingModeId, Behavior, DataDirective, Instruction, Machine, Operand, ResetHook,
    SectionDirective, ValueDecoder,
};

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, trace};

use crate::error::{ExecError, SyntaxError};
use crate::events::SimEvent;
use crate::fixed::to_hex;
use crate::memory::Memory;

/// Field widths of an architecture, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Layout {
    /// Data word width.
    pub word_size: usize,
    /// Address width.
    pub address_size: usize,
    /// Opcode width.
    pub instruction_size: usize,
}

#[derive(Debug, Clone)]
struct SourceSyntax {
    comment: String,
    operand_separator: Option<char>,
    labels: LabelSyntax,
    data_address: Option<ValueDecoder>,
}

/// Architecture tables plus live CPU state.
pub struct Processor {
    name: String,
    cpu: CpuState,
    modes: Vec<AddressingMode>,
    instructions: Vec<Instruction>,
    by_opcode: HashMap<i64, usize>,
    by_mnemonic: HashMap<String, Vec<usize>>,
    data: Vec<DataDirective>,
    sections: Vec<SectionDirective>,
    layout: Layout,
    syntax: SourceSyntax,
    offset_mode: Option<AddressingModeId>,
    pc: RegisterId,
    reset_hook: Option<ResetHook>,
}

impl Processor {
    /// Architecture name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Live registers and indicators.
    #[must_use]
    pub const fn cpu(&self) -> &CpuState {
        &self.cpu
    }

    /// Mutable registers and indicators.
    pub fn cpu_mut(&mut self) -> &mut CpuState {
        &mut self.cpu
    }

    /// Field widths.
    #[must_use]
    pub const fn layout(&self) -> Layout {
        self.layout
    }

    /// Data word width in bytes.
    #[must_use]
    pub const fn word_size(&self) -> usize {
        self.layout.word_size
    }

    /// Address width in bytes.
    #[must_use]
    pub const fn address_size(&self) -> usize {
        self.layout.address_size
    }

    /// Opcode width in bytes.
    #[must_use]
    pub const fn instruction_size(&self) -> usize {
        self.layout.instruction_size
    }

    /// Addressing modes in matching order.
    #[must_use]
    pub fn modes(&self) -> &[AddressingMode] {
        &self.modes
    }

    /// Looks an addressing mode up.
    #[must_use]
    pub fn mode(&self, id: AddressingModeId) -> &AddressingMode {
        &self.modes[id.0]
    }

    /// First addressing mode, in declaration order, whose pattern accepts `text`.
    #[must_use]
    pub fn match_operand<'t>(&self, text: &'t str) -> Option<(AddressingModeId, PatternMatch<'t>)> {
        self.modes.iter().enumerate().find_map(|(index, mode)| {
            mode.pattern
                .matches(text, &self.syntax.labels)
                .map(|found| (AddressingModeId(index), found))
        })
    }

    /// Every instruction, in declaration order.
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Instruction for an opcode.
    #[must_use]
    pub fn instruction(&self, opcode: i64) -> Option<&Instruction> {
        self.by_opcode
            .get(&opcode)
            .map(|&index| &self.instructions[index])
    }

    /// Every instruction spelled `mnemonic` (case-insensitive), in declaration order.
    pub fn instructions_named(&self, mnemonic: &str) -> impl Iterator<Item = &Instruction> {
        self.by_mnemonic
            .get(&mnemonic.to_ascii_uppercase())
            .into_iter()
            .flatten()
            .map(|&index| &self.instructions[index])
    }

    /// Data directives.
    #[must_use]
    pub fn data_directives(&self) -> &[DataDirective] {
        &self.data
    }

    /// Section directives.
    #[must_use]
    pub fn sections(&self) -> &[SectionDirective] {
        &self.sections
    }

    /// Comment marker.
    #[must_use]
    pub fn comment(&self) -> &str {
        &self.syntax.comment
    }

    /// Multiple-operand separator, if the architecture has one.
    #[must_use]
    pub const fn operand_separator(&self) -> Option<char> {
        self.syntax.operand_separator
    }

    /// Label name syntax.
    #[must_use]
    pub const fn label_syntax(&self) -> &LabelSyntax {
        &self.syntax.labels
    }

    /// Whether data lines are written `ADDRESS [VALUE]`.
    #[must_use]
    pub const fn data_with_address(&self) -> bool {
        self.syntax.data_address.is_some()
    }

    /// Decodes the address of an `ADDRESS [VALUE]` data line.
    ///
    /// # Errors
    ///
    /// Returns [`SyntaxError::InvalidNumber`] if the architecture has no
    /// address decoder or the text does not decode.
    pub fn decode_data_address(&self, text: &str) -> Result<i64, SyntaxError> {
        let decode = self
            .syntax
            .data_address
            .ok_or_else(|| SyntaxError::InvalidNumber(text.to_string()))?;
        decode(text)
    }

    /// Mode in which relative instructions encode label operands.
    ///
    /// Falls back to `mode` itself when the architecture designates none.
    #[must_use]
    pub fn offset_mode_for(&self, mode: AddressingModeId) -> AddressingModeId {
        self.offset_mode.unwrap_or(mode)
    }

    /// The program counter register.
    #[must_use]
    pub const fn pc_register(&self) -> RegisterId {
        self.pc
    }

    /// Current program counter.
    #[must_use]
    pub fn pc(&self) -> i64 {
        self.cpu.register(self.pc)
    }

    /// Moves the program counter.
    pub fn set_pc(&mut self, value: i64) {
        self.cpu.set_register(self.pc, value);
    }

    /// Whether the end-of-program latch is set.
    #[must_use]
    pub const fn end_reached(&self) -> bool {
        self.cpu.end_reached()
    }

    /// Clears the end-of-program latch.
    pub fn clear_end(&mut self) {
        self.cpu.set_end(false);
    }

    /// Zeroes registers and indicators, then runs the reset hook.
    pub fn reset(&mut self) {
        self.cpu.reset();
        if let Some(hook) = &self.reset_hook {
            hook(&mut self.cpu);
        }
        debug!(arch = %self.name, pc = self.pc(), "processor reset");
    }

    /// Executes one instruction.
    ///
    /// Returns the state of the end latch afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::InvalidOpcode`] for opcodes outside the table (PC is
    /// left past the opcode), [`ExecError::Memory`] for fetches or data
    /// accesses outside memory, or whatever the instruction behavior raises.
    pub fn step(&mut self, memory: &mut Memory) -> Result<bool, ExecError> {
        let address = self.pc();
        self.cpu.publish(SimEvent::InstructionFetch { pc: address });

        let width = self.layout.instruction_size;
        let opcode = memory.read_unsigned(address, width)?;
        self.set_pc(address + offset(width));

        let Some(&index) = self.by_opcode.get(&opcode) else {
            return Err(ExecError::InvalidOpcode { address, opcode });
        };
        let instruction = &self.instructions[index];

        let mut operands = Vec::with_capacity(1);
        if let Some(mode) = instruction.mode {
            let size = self.modes[mode.0].size;
            let at = self.cpu.register(self.pc);
            let value = memory.read(at, size)?;
            self.cpu.set_register(self.pc, at + offset(size));
            operands.push(Operand { mode, value, size });
        }
        trace!(
            pc = %to_hex(address, self.layout.address_size),
            mnemonic = %instruction.mnemonic,
            operand = ?operands.first().map(|operand| operand.value),
            "execute"
        );

        let mut machine = Machine {
            cpu: &mut self.cpu,
            memory,
        };
        (instruction.behavior)(&mut machine, &operands)?;
        Ok(self.cpu.end_reached())
    }
}

fn offset(size: usize) -> i64 {
    i64::try_from(size).unwrap_or(i64::MAX)
}

impl fmt::Debug for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processor")
            .field("name", &self.name)
            .field("layout", &self.layout)
            .field("cpu", &self.cpu)
            .field("instructions", &self.instructions.len())
            .finish_non_exhaustive()
    }
}
