//! Instruction-set tables: addressing modes, instructions and directives.

use std::fmt;

use crate::error::{ExecError, SyntaxError};
use crate::memory::Memory;

use super::pattern::OperandPattern;
use super::state::CpuState;

/// Converts operand text into a raw value.
pub type ValueDecoder = fn(&str) -> Result<i64, SyntaxError>;

/// Executes one instruction against the machine.
pub type Behavior = Box<dyn Fn(&mut Machine<'_>, &[Operand]) -> Result<(), ExecError>>;

/// Runs after the register file has been zeroed on reset.
pub type ResetHook = Box<dyn Fn(&mut CpuState)>;

/// What an instruction behavior may touch while it runs.
pub struct Machine<'a> {
    /// Registers, indicators and the end latch.
    pub cpu: &'a mut CpuState,
    /// Memory, including memory-mapped devices.
    pub memory: &'a mut Memory,
}

/// Index of an addressing mode within its processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AddressingModeId(pub(crate) usize);

impl AddressingModeId {
    /// Position in declaration order.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Operand shape and encoding width.
#[derive(Debug, Clone)]
pub struct AddressingMode {
    pub(crate) name: String,
    pub(crate) pattern: OperandPattern,
    pub(crate) size: usize,
    pub(crate) decoder: ValueDecoder,
}

impl AddressingMode {
    /// Mode name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Accepted source syntax.
    #[must_use]
    pub const fn pattern(&self) -> &OperandPattern {
        &self.pattern
    }

    /// Encoded operand width in bytes (may be `0`).
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Decodes captured operand text.
    ///
    /// # Errors
    ///
    /// Returns the decoder's [`SyntaxError`].
    pub fn decode(&self, text: &str) -> Result<i64, SyntaxError> {
        (self.decoder)(text)
    }
}

/// Operand fetched from memory during execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operand {
    /// Addressing mode that selected this operand.
    pub mode: AddressingModeId,
    /// Raw value as read (signed interpretation of `size` bytes).
    pub value: i64,
    /// Width in bytes.
    pub size: usize,
}

impl Operand {
    /// The first operand, for behaviors that require one.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::MissingOperand`] naming `mnemonic` when the slice is empty.
    pub fn first<'o>(operands: &'o [Self], mnemonic: &str) -> Result<&'o Self, ExecError> {
        operands.first().ok_or_else(|| ExecError::MissingOperand {
            mnemonic: mnemonic.to_string(),
        })
    }
}

/// One opcode of the instruction set.
pub struct Instruction {
    pub(crate) opcode: i64,
    pub(crate) mnemonic: String,
    pub(crate) mode: Option<AddressingModeId>,
    pub(crate) is_offset: bool,
    pub(crate) behavior: Behavior,
}

impl Instruction {
    /// Unsigned opcode value.
    #[must_use]
    pub const fn opcode(&self) -> i64 {
        self.opcode
    }

    /// Upper-case mnemonic.
    #[must_use]
    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    /// Operand addressing modes, empty for implied instructions.
    #[must_use]
    pub fn modes(&self) -> &[AddressingModeId] {
        self.mode.as_slice()
    }

    /// Whether label operands are encoded relative to the following instruction.
    #[must_use]
    pub const fn is_offset(&self) -> bool {
        self.is_offset
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instruction")
            .field("opcode", &self.opcode)
            .field("mnemonic", &self.mnemonic)
            .field("mode", &self.mode)
            .field("is_offset", &self.is_offset)
            .finish_non_exhaustive()
    }
}

/// Data-declaration keyword or literal form.
#[derive(Debug, Clone)]
pub struct DataDirective {
    pub(crate) pattern: OperandPattern,
    pub(crate) size: usize,
    pub(crate) decoder: ValueDecoder,
}

impl DataDirective {
    /// Syntax that identifies the directive.
    #[must_use]
    pub const fn pattern(&self) -> &OperandPattern {
        &self.pattern
    }

    /// Bytes reserved per value.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Decodes the value text.
    ///
    /// # Errors
    ///
    /// Returns the decoder's [`SyntaxError`].
    pub fn decode(&self, text: &str) -> Result<i64, SyntaxError> {
        (self.decoder)(text)
    }
}

/// Section directive such as `.DATA` or `.CODE 16`.
#[derive(Debug, Clone)]
pub struct SectionDirective {
    pub(crate) name: String,
    pub(crate) is_data: bool,
    pub(crate) address: Option<ValueDecoder>,
}

impl SectionDirective {
    /// Directive keyword.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the section that follows holds data.
    #[must_use]
    pub const fn is_data(&self) -> bool {
        self.is_data
    }

    /// Decoder for the origin operand, if the directive takes one.
    #[must_use]
    pub const fn address_decoder(&self) -> Option<ValueDecoder> {
        self.address
    }
}
