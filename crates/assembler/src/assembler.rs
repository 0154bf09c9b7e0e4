//! Top-level assembler pipeline.
//!
//! [`Program::assemble`] runs every pass over a source text:
//!
//! 1. **Classification**: each line becomes a directive, code, data or label
//!    line, with its operand decoded (`parser`).
//! 2. **Address assignment**: a running cursor places every line and fills
//!    the symbol table (`symbols`).
//! 3. **Label resolution**: label operands get their address or branch
//!    displacement (`encoder`).
//!
//! Every pass records errors on the offending line and keeps going, so the
//! program is always fully classified and addressed for display.
//! [`Program::load`] writes it into memory only when no line has an error.

use sim_core::{Memory, Processor};
use tracing::debug;

use crate::encoder::{emit, encode_line, resolve_labels};
use crate::errors::{LineError, LoadError};
use crate::parser::{classify, LineKind, ProgramLine};
use crate::source::split_source;
use crate::symbols::{assign_addresses, SymbolTable};

/// An entry in the address-to-source listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// 1-indexed source line.
    pub line: usize,
    /// Address of the line, if it has one.
    pub address: Option<i64>,
    /// Machine bytes of the line.
    pub bytes: Vec<u8>,
    /// Source text without its comment.
    pub text: String,
}

/// An assembled source text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    lines: Vec<ProgramLine>,
    symbols: SymbolTable,
}

impl Program {
    /// Assembles `source` for `processor`, targeting a memory of
    /// `memory_size` bytes.
    ///
    /// Never fails: problems are attached to their lines and reported by
    /// [`Program::errors`] and [`Program::load`].
    #[must_use]
    pub fn assemble(source: &str, processor: &Processor, memory_size: usize) -> Self {
        let mut lines: Vec<ProgramLine> = split_source(source, processor.comment())
            .iter()
            .map(|line| classify(line, processor))
            .collect();
        debug!(
            arch = processor.name(),
            lines = lines.len(),
            code = lines.iter().filter(|line| line.kind == LineKind::Code).count(),
            data = lines.iter().filter(|line| line.kind == LineKind::Data).count(),
            "lines classified"
        );

        let symbols = assign_addresses(&mut lines, memory_size);
        debug!(labels = symbols.len(), "addresses assigned");

        resolve_labels(&mut lines, &symbols);
        let program = Self { lines, symbols };
        debug!(errors = program.error_count(), "labels resolved");
        program
    }

    fn error_count(&self) -> usize {
        self.lines.iter().map(|line| line.errors.len()).sum()
    }

    /// Every line error in source order.
    #[must_use]
    pub fn errors(&self) -> Vec<LineError> {
        self.lines
            .iter()
            .flat_map(|line| {
                line.errors.iter().map(|kind| LineError {
                    line: line.number,
                    kind: kind.clone(),
                })
            })
            .collect()
    }

    /// Whether every line assembled cleanly.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.lines.iter().all(|line| line.errors.is_empty())
    }

    /// Writes the program into `memory` and returns its entry point.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Assembly`] with every line error, leaving memory
    /// untouched, [`LoadError::NoInstruction`] if there is no code line, or
    /// [`LoadError::Memory`] if `memory` is smaller than the one the program
    /// was assembled for.
    pub fn load(&self, memory: &mut Memory) -> Result<i64, LoadError> {
        if !self.is_ok() {
            return Err(LoadError::Assembly { errors: self.errors() });
        }
        let entry = emit(&self.lines, memory)?;
        debug!(entry, "program loaded");
        Ok(entry)
    }

    /// Every classified line.
    #[must_use]
    pub fn lines(&self) -> &[ProgramLine] {
        &self.lines
    }

    /// Label definitions.
    #[must_use]
    pub const fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Code and label lines, the rows shown while stepping.
    pub fn instruction_lines(&self) -> impl Iterator<Item = &ProgramLine> {
        self.lines
            .iter()
            .filter(|line| matches!(line.kind, LineKind::Code | LineKind::Label))
    }

    /// Address, bytes and text of every line.
    #[must_use]
    pub fn listing(&self) -> Vec<ListingEntry> {
        self.lines
            .iter()
            .map(|line| ListingEntry {
                line: line.number,
                address: line.address,
                bytes: encode_line(line),
                text: line.text.clone(),
            })
            .collect()
    }

    /// The last code line whose address is at most `pc`.
    #[must_use]
    pub fn line_for_address(&self, pc: i64) -> Option<&ProgramLine> {
        self.lines.iter().rev().find(|line| {
            line.kind == LineKind::Code && line.address.is_some_and(|address| address <= pc)
        })
    }

    /// Address of the first code line.
    #[must_use]
    pub fn entry_point(&self) -> Option<i64> {
        self.lines
            .iter()
            .find(|line| line.kind == LineKind::Code)
            .and_then(|line| line.address)
    }
}
