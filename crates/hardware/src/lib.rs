//! Concrete architectures and devices for the board simulator.

use sim_core::{ArchitectureRegistry, DeviceRegistry, Registries};

/// Operand value decoders.
pub mod numbers;

/// `edu1` teaching architecture.
pub mod edu1;

/// MOS 6502 architecture.
pub mod mos6502;

/// Lamp panel device.
pub mod led;
pub use led::Led;

/// Every bundled architecture, by name.
#[must_use]
pub fn architectures() -> ArchitectureRegistry {
    let mut registry = ArchitectureRegistry::new();
    registry.register(edu1::NAME, edu1::build).register(mos6502::NAME, mos6502::build);
    registry
}

/// Every bundled device, by name.
#[must_use]
pub fn devices() -> DeviceRegistry {
    let mut registry = DeviceRegistry::new();
    registry.register(led::NAME, led::create);
    registry
}

/// Registries holding everything this crate provides.
#[must_use]
pub fn default_registries() -> Registries {
    Registries {
        architectures: architectures(),
        devices: devices(),
    }
}
