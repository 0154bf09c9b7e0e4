use std::fmt;

use thiserror::Error;

/// Why an access fell outside the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum BoundsViolation {
    /// The first byte addressed is below zero.
    NegativeAddress,
    /// The last byte addressed is at or past the end of memory.
    PastEnd,
}

impl fmt::Display for BoundsViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NegativeAddress => write!(f, "negative address"),
            Self::PastEnd => write!(f, "out of memory"),
        }
    }
}

/// A read or write touched bytes outside `[0, size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[error("{violation}: {length} byte(s) at address {address}")]
pub struct MemoryBoundsError {
    /// First byte of the rejected access.
    pub address: i64,
    /// Number of bytes the access covered.
    pub length: usize,
    /// Which bound was crossed.
    pub violation: BoundsViolation,
}

/// A textual operand value could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum SyntaxError {
    /// The text is not a number in the expected notation.
    #[error("invalid numeric syntax `{0}`")]
    InvalidNumber(String),
    /// The text does not name a register the decoder knows.
    #[error("invalid register name `{0}`")]
    InvalidRegister(String),
}

/// Failures raised while fetching or executing an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    /// The fetched opcode has no entry in the instruction table.
    #[error("address 0x{address:X}: invalid opcode 0x{opcode:02X}")]
    InvalidOpcode {
        /// Address the opcode was fetched from.
        address: i64,
        /// Unsigned opcode value.
        opcode: i64,
    },
    /// Fetch, operand or data access left the memory bounds.
    #[error(transparent)]
    Memory(#[from] MemoryBoundsError),
    /// An instruction was invoked without the operand its behavior needs.
    #[error("{mnemonic}: operand missing")]
    MissingOperand {
        /// Instruction that was executing.
        mnemonic: String,
    },
    /// A behavior hit a feature the architecture does not model.
    #[error("{0} not implemented")]
    Unimplemented(String),
    /// An instruction stopped the machine by raising instead of setting the end latch.
    #[error("execution halted: {0}")]
    Halted(String),
}

/// Invalid architecture, board or device configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// No architecture factory is registered under that name.
    #[error("unknown architecture `{0}`")]
    UnknownArchitecture(String),
    /// No device factory is registered under that name.
    #[error("unknown device `{0}`")]
    UnknownDevice(String),
    /// A device descriptor carried a parameter the device cannot use.
    #[error("device `{device}`: {reason}")]
    InvalidDeviceParameter {
        /// Device type name.
        device: String,
        /// Human readable explanation.
        reason: String,
    },
    /// A device window does not fit inside memory.
    #[error("input window `{name}` at {base} (+{size}) lies outside memory of {memory} bytes")]
    WindowOutsideMemory {
        /// Window name.
        name: String,
        /// First byte of the window.
        base: i64,
        /// Window size in bytes.
        size: usize,
        /// Memory size in bytes.
        memory: usize,
    },
    /// Source used several operands on an architecture that accepts at most one.
    #[error("{mnemonic}: multiple operands not supported")]
    MultipleOperandsUnsupported {
        /// Instruction whose operand list was rejected.
        mnemonic: String,
    },
    /// An architecture defined no register of kind program counter.
    #[error("architecture `{0}` defines no program counter")]
    MissingProgramCounter(String),
    /// Two instructions share one opcode.
    #[error("opcode 0x{0:02X} defined twice")]
    DuplicateOpcode(i64),
    /// An opcode does not fit in the instruction width.
    #[error("opcode 0x{opcode:X} does not fit in {width} byte(s)")]
    OpcodeTooWide {
        /// Offending opcode.
        opcode: i64,
        /// Instruction width in bytes.
        width: usize,
    },
    /// A relative instruction exists but no offset addressing mode was designated.
    #[error("{0}: relative instruction without an offset addressing mode")]
    MissingOffsetMode(String),
    /// A size was zero where one is required, or too large to model.
    #[error("invalid {what} size {size}")]
    InvalidSize {
        /// Which size was rejected.
        what: &'static str,
        /// Rejected value.
        size: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_error_names_the_violation() {
        let error = MemoryBoundsError {
            address: -1,
            length: 1,
            violation: BoundsViolation::NegativeAddress,
        };
        assert_eq!(error.to_string(), "negative address: 1 byte(s) at address -1");
        let error = MemoryBoundsError {
            address: 255,
            length: 2,
            violation: BoundsViolation::PastEnd,
        };
        assert!(error.to_string().starts_with("out of memory"));
    }

    #[test]
    fn invalid_opcode_renders_hex() {
        let error = ExecError::InvalidOpcode {
            address: 0x10,
            opcode: 0xAB,
        };
        assert_eq!(error.to_string(), "address 0x10: invalid opcode 0xAB");
    }

    #[test]
    fn memory_errors_convert_into_exec_errors() {
        let bounds = MemoryBoundsError {
            address: 300,
            length: 1,
            violation: BoundsViolation::PastEnd,
        };
        let error: ExecError = bounds.into();
        assert_eq!(error, ExecError::Memory(bounds));
    }
}
