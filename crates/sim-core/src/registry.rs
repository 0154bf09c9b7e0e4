//! Name-keyed factories for architectures and devices.
//!
//! Registries are plain values built at startup; nothing is discovered at run time.

use std::collections::BTreeMap;
use std::fmt;

use crate::controller::{Controller, Device, DeviceDescriptor};
use crate::error::ConfigError;
use crate::processor::Processor;

/// Builds a fresh processor for one architecture.
pub type ArchitectureFactory = fn() -> Result<Processor, ConfigError>;

/// Builds a device, declaring its input windows on the controller.
///
/// The second argument is the device rank within its controller.
pub type DeviceFactory = fn(&mut Controller, usize, &DeviceDescriptor) -> Result<Box<dyn Device>, ConfigError>;

/// Architectures by name.
#[derive(Clone, Default)]
pub struct ArchitectureRegistry {
    factories: BTreeMap<String, ArchitectureFactory>,
}

impl ArchitectureRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a factory.
    pub fn register(&mut self, name: impl Into<String>, factory: ArchitectureFactory) -> &mut Self {
        self.factories.insert(name.into(), factory);
        self
    }

    /// Builds the processor registered as `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownArchitecture`] for unregistered names, or
    /// whatever the factory rejects.
    pub fn create(&self, name: &str) -> Result<Processor, ConfigError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| ConfigError::UnknownArchitecture(name.to_string()))?;
        factory()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for ArchitectureRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

/// Device types by name.
#[derive(Clone, Default)]
pub struct DeviceRegistry {
    factories: BTreeMap<String, DeviceFactory>,
}

impl DeviceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a factory.
    pub fn register(&mut self, name: impl Into<String>, factory: DeviceFactory) -> &mut Self {
        self.factories.insert(name.into(), factory);
        self
    }

    /// Factory registered as `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<DeviceFactory> {
        self.factories.get(name).copied()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

/// Every factory a board may draw on.
#[derive(Debug, Clone, Default)]
pub struct Registries {
    /// Architecture factories.
    pub architectures: ArchitectureRegistry,
    /// Device factories.
    pub devices: DeviceRegistry,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{NumberFormat, ProcessorBuilder, RegisterKind, StatusUpdate};
    use std::any::Any;

    fn tiny() -> Result<Processor, ConfigError> {
        let mut builder = ProcessorBuilder::new("tiny");
        builder.register("PC", "Program counter", RegisterKind::ProgramCounter, NumberFormat::Unsigned, 1, StatusUpdate::Manual);
        builder.build()
    }

    struct Probe;

    impl Device for Probe {
        fn name(&self) -> &str {
            "Probe"
        }

        fn render(&self) -> String {
            String::from("probe")
        }

        fn teardown(&mut self) {}

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn probe(controller: &mut Controller, rank: usize, _: &DeviceDescriptor) -> Result<Box<dyn Device>, ConfigError> {
        controller.declare_input(format!("probe{rank}"), 0, 1, |_, _, _| {});
        Ok(Box::new(Probe))
    }

    #[test]
    fn architectures_are_created_by_name() {
        let mut registry = ArchitectureRegistry::new();
        registry.register("tiny", tiny);
        assert_eq!(registry.create("tiny").unwrap().name(), "tiny");
        assert_eq!(
            registry.create("z80").unwrap_err(),
            ConfigError::UnknownArchitecture("z80".into())
        );
        assert_eq!(registry.names().collect::<Vec<_>>(), ["tiny"]);
    }

    #[test]
    fn devices_receive_increasing_ranks() {
        let mut registry = DeviceRegistry::new();
        registry.register("Probe", probe);
        let mut controller = Controller::new();
        let descriptor = DeviceDescriptor::new("Probe", Vec::<String>::new());
        controller.create_device(&descriptor, &registry).unwrap();
        controller.create_device(&descriptor, &registry).unwrap();
        let names: Vec<_> = controller.windows().map(|(name, _, _)| name.to_string()).collect();
        assert_eq!(names, ["probe0", "probe1"]);
        assert_eq!(controller.devices().len(), 2);
        assert_eq!(controller.devices()[0].render(), "probe");

        controller.delete_all();
        assert!(controller.devices().is_empty());
        assert_eq!(controller.windows().count(), 0);
    }
}
