//! Structured error reporting for the assembler.
//!
//! Pass errors are attached to the offending source line and never stop the
//! scan, so one load reports every problem in the file at once:
//!
//! ```text
//! Line 3: BNE: operand type does not match
//! Line 9: loop: unknown label
//! ```

use std::fmt;

use sim_core::{ConfigError, MemoryBoundsError, SyntaxError};
use thiserror::Error;

/// Why a single source line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineErrorKind {
    /// No section, instruction, data directive or label matched.
    #[error("Invalid mnemonic {0}")]
    InvalidMnemonic(String),
    /// No addressing mode accepts the operand text.
    #[error("{0}: operand type not recognized")]
    OperandNotRecognized(String),
    /// No instruction has this mnemonic with the decoded operand modes.
    #[error("{0}: operand type does not match")]
    OperandMismatch(String),
    /// A directive or data keyword requires an operand.
    #[error("{0}: operand missing")]
    OperandMissing(String),
    /// A directive takes no operand.
    #[error("{0}: no operand expected")]
    NoOperandExpected(String),
    /// Text left over after the operand.
    #[error("{0}: unexpected token")]
    UnexpectedToken(String),
    /// A label defined a second time.
    #[error("{name}: duplicate label (first defined at line {first_line})")]
    DuplicateLabel {
        /// Label name.
        name: String,
        /// Line of the first definition.
        first_line: usize,
    },
    /// A referenced label is never defined.
    #[error("{0}: unknown label")]
    UnknownLabel(String),
    /// A relative reference does not fit its operand width.
    #[error("{0}: branch out of range")]
    BranchOutOfRange(String),
    /// A label address does not fit the operand width of its addressing mode.
    #[error("{label}: address does not fit in {size} byte(s)")]
    LabelTooWide {
        /// Referenced label.
        label: String,
        /// Operand width in bytes.
        size: usize,
    },
    /// The bytes of the line would land outside memory.
    #[error("{size} byte(s) at address {address}: address out of range")]
    AddressOutOfRange {
        /// First address of the line.
        address: i64,
        /// Bytes the line occupies.
        size: usize,
    },
    /// An operand or data value did not decode.
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    /// The architecture cannot express the line.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A [`LineErrorKind`] with its 1-based line number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Line {line}: {kind}")]
pub struct LineError {
    /// 1-based source line.
    pub line: usize,
    /// What went wrong.
    pub kind: LineErrorKind,
}

/// Why a program could not be loaded into memory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// At least one line was rejected; nothing was written.
    #[error("{}", LineErrors(.errors))]
    Assembly {
        /// Every rejected line, in source order.
        errors: Vec<LineError>,
    },
    /// The program has no code line, so there is no entry point.
    #[error("No instruction")]
    NoInstruction,
    /// Emission hit memory it could not write.
    #[error(transparent)]
    Memory(#[from] MemoryBoundsError),
}

impl LoadError {
    /// Line errors, empty for the other variants.
    #[must_use]
    pub fn line_errors(&self) -> &[LineError] {
        match self {
            Self::Assembly { errors } => errors,
            Self::NoInstruction | Self::Memory(_) => &[],
        }
    }
}

struct LineErrors<'a>(&'a [LineError]);

impl fmt::Display for LineErrors<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}
