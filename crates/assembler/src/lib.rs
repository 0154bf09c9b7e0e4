//! Two-pass assembler and board session for the board simulator.

use clap as _;
#[cfg(test)]
use rstest as _;
#[cfg(test)]
use tempfile as _;
use tracing_subscriber as _;

/// Top-level assembler pipeline.
pub mod assembler;
pub use assembler::{ListingEntry, Program};
/// Board session: processor, memory, devices and program.
pub mod board;
pub use board::{Board, BoardError, RunOutcome};
/// Board configuration.
pub mod config;
pub use config::{BoardConfig, MemorySize, RunLimits};
/// Label resolution and code emission.
pub mod encoder;
/// Structured assembly and load error types.
pub mod errors;
pub use errors::{LineError, LineErrorKind, LoadError};
/// Line classification and operand decoding.
pub mod parser;
/// Text renderings for the command line.
pub mod report;
/// Comment stripping and tokenizing.
pub mod source;
/// Symbol table and address assignment.
pub mod symbols;
