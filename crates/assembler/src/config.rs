//! Board configuration: which architecture, how much memory, which devices.

use std::fmt;
use std::str::FromStr;

use sim_core::DeviceDescriptor;
use thiserror::Error;

/// Default bound on the number of steps of a run.
pub const DEFAULT_MAX_STEPS: u64 = 100_000;

/// Memory size of a board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum MemorySize {
    /// Exactly this many bytes.
    Bytes(usize),
    /// Everything the architecture can address.
    #[default]
    Max,
}

impl MemorySize {
    /// Size in bytes for an architecture with `address_size`-byte addresses.
    #[must_use]
    pub fn resolve(self, address_size: usize) -> usize {
        match self {
            Self::Bytes(bytes) => bytes,
            Self::Max => u32::try_from(address_size * 8)
                .ok()
                .and_then(|bits| 1_usize.checked_shl(bits))
                .unwrap_or(usize::MAX),
        }
    }
}

impl fmt::Display for MemorySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => write!(f, "{bytes}"),
            Self::Max => f.write_str("max"),
        }
    }
}

/// Rejected memory size text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid memory size `{0}`: expected a byte count or `max`")]
pub struct MemorySizeError(String);

/// Parses `max` or a decimal byte count.
impl FromStr for MemorySize {
    type Err = MemorySizeError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        if text.eq_ignore_ascii_case("max") {
            return Ok(Self::Max);
        }
        text.parse()
            .map(Self::Bytes)
            .map_err(|_| MemorySizeError(text.to_string()))
    }
}

/// Everything needed to build a board.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct BoardConfig {
    /// Registered architecture name.
    pub arch: String,
    /// Memory size.
    #[cfg_attr(feature = "serde", serde(default))]
    pub memory: MemorySize,
    /// Devices, created in order.
    #[cfg_attr(feature = "serde", serde(default))]
    pub devices: Vec<DeviceDescriptor>,
}

impl BoardConfig {
    /// A board with all addressable memory and no device.
    #[must_use]
    pub fn new(arch: impl Into<String>) -> Self {
        Self {
            arch: arch.into(),
            memory: MemorySize::Max,
            devices: Vec::new(),
        }
    }

    /// Sets the memory size.
    #[must_use]
    pub const fn with_memory(mut self, memory: MemorySize) -> Self {
        self.memory = memory;
        self
    }

    /// Appends a device.
    #[must_use]
    pub fn with_device(mut self, device: DeviceDescriptor) -> Self {
        self.devices.push(device);
        self
    }
}

/// Bounds on a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RunLimits {
    /// Steps executed before giving up.
    pub max_steps: u64,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}
