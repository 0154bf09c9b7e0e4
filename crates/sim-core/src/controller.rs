//! Memory-mapped I/O controller.
//!
//! A controller owns the devices a board declares and the input windows those
//! devices listen on. After every successful memory write the controller hands
//! each overlapping window a snapshot of its full contents.

use std::any::Any;
use std::fmt;
use std::str::FromStr;

use tracing::{debug, trace, warn};

use crate::error::ConfigError;
use crate::registry::DeviceRegistry;

/// Callback receiving `(base, size, window_bytes)` after a write touched the window.
pub type InputCallback = Box<dyn FnMut(i64, usize, &[u8])>;

/// Peripheral instantiated by a [`Controller`].
pub trait Device {
    /// Device type name, as registered.
    fn name(&self) -> &str;

    /// One-line rendering of the current device state.
    fn render(&self) -> String;

    /// Releases presentation resources. Called once when the board is torn down.
    fn teardown(&mut self);

    /// Concrete access for callers that know the device type.
    fn as_any(&self) -> &dyn Any;
}

/// Board-level request to instantiate a device by name.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DeviceDescriptor {
    /// Registered device type name.
    pub name: String,
    /// Device-specific parameters, interpreted by the factory.
    pub params: Vec<String>,
}

impl DeviceDescriptor {
    /// Creates a descriptor.
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }
}

/// Parses `NAME:PARAM:PARAM...`.
impl FromStr for DeviceDescriptor {
    type Err = ConfigError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut parts = text.split(':');
        let name = parts.next().unwrap_or_default().trim();
        if name.is_empty() {
            return Err(ConfigError::UnknownDevice(text.to_string()));
        }
        Ok(Self::new(name, parts.map(str::trim)))
    }
}

struct InputWindow {
    name: String,
    base: i64,
    size: usize,
    callback: InputCallback,
}

impl InputWindow {
    fn overlaps(&self, address: i64, length: usize) -> bool {
        let (Ok(length), Ok(size)) = (i64::try_from(length), i64::try_from(self.size)) else {
            return false;
        };
        length > 0 && size > 0 && address < self.base + size && self.base < address + length
    }
}

/// Routes memory writes to the devices whose windows they touch.
#[derive(Default)]
pub struct Controller {
    inputs: Vec<InputWindow>,
    devices: Vec<Box<dyn Device>>,
    next_rank: usize,
}

impl Controller {
    /// Creates a controller with no devices.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a named window `[base, base + size)` and its callback.
    pub fn declare_input<F>(&mut self, name: impl Into<String>, base: i64, size: usize, callback: F)
    where
        F: FnMut(i64, usize, &[u8]) + 'static,
    {
        let name = name.into();
        debug!(%name, base, size, "input window declared");
        self.inputs.push(InputWindow {
            name,
            base,
            size,
            callback: Box::new(callback),
        });
    }

    /// Invokes every window overlapping `[address, address + length)` with a
    /// snapshot of the whole window read from `memory`.
    ///
    /// Returns the number of callbacks invoked.
    pub fn notify_write(&mut self, memory: &[u8], address: i64, length: usize) -> usize {
        let mut notified = 0;
        for window in &mut self.inputs {
            if !window.overlaps(address, length) {
                continue;
            }
            let Some(bytes) = usize::try_from(window.base)
                .ok()
                .and_then(|start| Some(start..start.checked_add(window.size)?))
                .and_then(|range| memory.get(range))
            else {
                warn!(name = %window.name, base = window.base, "input window outside memory");
                continue;
            };
            trace!(name = %window.name, base = window.base, "input window notified");
            (window.callback)(window.base, window.size, bytes);
            notified += 1;
        }
        notified
    }

    /// Instantiates the device `descriptor` names, using the factory from `registry`.
    ///
    /// Each created device receives the next rank.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownDevice`] for unregistered names, or whatever
    /// the factory rejects.
    pub fn create_device(
        &mut self,
        descriptor: &DeviceDescriptor,
        registry: &DeviceRegistry,
    ) -> Result<(), ConfigError> {
        let factory = registry
            .get(&descriptor.name)
            .ok_or_else(|| ConfigError::UnknownDevice(descriptor.name.clone()))?;
        let rank = self.next_rank;
        let device = factory(self, rank, descriptor)?;
        debug!(device = device.name(), rank, "device created");
        self.next_rank += 1;
        self.devices.push(device);
        Ok(())
    }

    /// Checks that every window fits inside a memory of `memory_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WindowOutsideMemory`] for the first offending window.
    pub fn validate_windows(&self, memory_size: usize) -> Result<(), ConfigError> {
        for window in &self.inputs {
            let fits = usize::try_from(window.base)
                .ok()
                .and_then(|base| base.checked_add(window.size))
                .is_some_and(|end| end <= memory_size);
            if !fits {
                return Err(ConfigError::WindowOutsideMemory {
                    name: window.name.clone(),
                    base: window.base,
                    size: window.size,
                    memory: memory_size,
                });
            }
        }
        Ok(())
    }

    /// Tears every device down and forgets all windows.
    pub fn delete_all(&mut self) {
        for device in &mut self.devices {
            debug!(device = device.name(), "device torn down");
            device.teardown();
        }
        self.devices.clear();
        self.inputs.clear();
        self.next_rank = 0;
    }

    /// Devices in creation order.
    #[must_use]
    pub fn devices(&self) -> &[Box<dyn Device>] {
        &self.devices
    }

    /// Declared windows as `(name, base, size)`.
    pub fn windows(&self) -> impl Iterator<Item = (&str, i64, usize)> {
        self.inputs
            .iter()
            .map(|window| (window.name.as_str(), window.base, window.size))
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("windows", &self.windows().collect::<Vec<_>>())
            .field(
                "devices",
                &self.devices.iter().map(|d| d.name()).collect::<Vec<_>>(),
            )
            .field("next_rank", &self.next_rank)
            .finish()
    }
}
