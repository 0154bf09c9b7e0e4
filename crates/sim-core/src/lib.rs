//! Generic instruction-set simulation engine.
//!
//! The engine knows nothing about any particular processor: architectures are
//! described as tables through [`ProcessorBuilder`], and peripherals attach to
//! [`Memory`] through a [`Controller`].

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;

/// Fixed-width integer conversions.
pub mod fixed;

/// Error taxonomy shared by memory, processor and configuration.
pub mod error;
pub use error::{BoundsViolation, ConfigError, ExecError, MemoryBoundsError, SyntaxError};

/// Change notifications for presentation layers.
pub mod events;
pub use events::{EventLog, EventSink, Observers, SimEvent};

/// Byte-addressable memory.
pub mod memory;
pub use memory::Memory;

/// Memory-mapped I/O routing and the device trait.
pub mod controller;
pub use controller::{Controller, Device, DeviceDescriptor, InputCallback};

/// Table-driven processor framework.
pub mod processor;
pub use processor::{
    AddressingMode, AddressingModeId, Alternative, CharClass, CpuState, DataDirective, IndicatorId,
    IndicatorKind, Instruction, LabelSyntax, Layout, Machine, NumberFormat, NumberSyntax, Operand,
    OperandPattern, PatternMatch, Processor, ProcessorBuilder, RegisterId, RegisterKind, SectionDirective,
    StatusUpdate, ValueDecoder,
};

/// Architecture and device factories.
pub mod registry;
pub use registry::{ArchitectureFactory, ArchitectureRegistry, DeviceFactory, DeviceRegistry, Registries};
