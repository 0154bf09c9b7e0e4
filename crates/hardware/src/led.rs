//! `Led display`: a row of lamps mirroring the bits of a memory window.
//!
//! Parameters are `COUNT:ADDRESS`, both decimal. The window is
//! `ceil(COUNT / 8)` bytes starting at `ADDRESS`. Lamps are numbered right to
//! left, so lamp 0 is the least significant bit of the last byte.

use std::any::Any;
use std::cell::RefCell;
use std::fmt::Write as _;
use std::rc::Rc;

use sim_core::fixed::{from_be_bytes, to_decimal, to_hex};
use sim_core::{ConfigError, Controller, Device, DeviceDescriptor};
use tracing::{debug, trace};

/// Registered device name.
pub const NAME: &str = "Led display";

#[derive(Debug, Default)]
struct LampBank {
    count: usize,
    bytes: Vec<u8>,
}

impl LampBank {
    fn lamp(&self, index: usize) -> bool {
        let size = self.bytes.len();
        index < self.count
            && index / 8 < size
            && self.bytes[size - 1 - index / 8] & (1 << (index % 8)) != 0
    }
}

/// Lamp panel attached to one input window.
#[derive(Debug)]
pub struct Led {
    rank: usize,
    address: i64,
    bank: Rc<RefCell<LampBank>>,
    active: bool,
}

impl Led {
    /// Number of lamps.
    #[must_use]
    pub fn count(&self) -> usize {
        self.bank.borrow().count
    }

    /// Base address of the input window.
    #[must_use]
    pub const fn address(&self) -> i64 {
        self.address
    }

    /// Creation rank within the controller.
    #[must_use]
    pub const fn rank(&self) -> usize {
        self.rank
    }

    /// Lamp states, lamp 0 first.
    #[must_use]
    pub fn lamps(&self) -> Vec<bool> {
        let bank = self.bank.borrow();
        (0..bank.count).map(|index| bank.lamp(index)).collect()
    }

    /// Window contents as an unsigned big-endian value.
    #[must_use]
    pub fn value(&self) -> i64 {
        from_be_bytes(&self.bank.borrow().bytes)
    }

    /// Whether the panel has not been torn down yet.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }
}

impl Device for Led {
    fn name(&self) -> &str {
        NAME
    }

    fn render(&self) -> String {
        let bank = self.bank.borrow();
        let mut text = String::with_capacity(bank.count + 32);
        for index in (0..bank.count).rev() {
            text.push(if bank.lamp(index) { '*' } else { '.' });
        }
        let width = bank.bytes.len();
        let value = from_be_bytes(&bank.bytes);
        let _ = write!(
            text,
            " @{} x{} {}",
            self.address,
            to_hex(value, width),
            to_decimal(value, width)
        );
        text
    }

    fn teardown(&mut self) {
        debug!(rank = self.rank, "led display closed");
        self.active = false;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn parameter(descriptor: &DeviceDescriptor, index: usize, what: &str) -> Result<i64, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidDeviceParameter {
        device: descriptor.name.clone(),
        reason,
    };
    let text = descriptor
        .params
        .get(index)
        .ok_or_else(|| invalid(format!("missing {what}")))?;
    text.parse()
        .map_err(|_| invalid(format!("{what} `{text}` is not a decimal number")))
}

/// Device factory for [`NAME`].
///
/// # Errors
///
/// Returns [`ConfigError::InvalidDeviceParameter`] unless the descriptor
/// carries a positive lamp count and a non-negative address.
pub fn create(
    controller: &mut Controller,
    rank: usize,
    descriptor: &DeviceDescriptor,
) -> Result<Box<dyn Device>, ConfigError> {
    let count = parameter(descriptor, 0, "lamp count")?;
    let address = parameter(descriptor, 1, "address")?;
    let count = usize::try_from(count)
        .ok()
        .filter(|&count| count > 0)
        .ok_or_else(|| ConfigError::InvalidDeviceParameter {
            device: descriptor.name.clone(),
            reason: format!("lamp count {count} must be positive"),
        })?;
    if address < 0 {
        return Err(ConfigError::InvalidDeviceParameter {
            device: descriptor.name.clone(),
            reason: format!("address {address} is negative"),
        });
    }

    let size = count.div_ceil(8);
    let bank = Rc::new(RefCell::new(LampBank {
        count,
        bytes: vec![0; size],
    }));
    let sink = Rc::clone(&bank);
    controller.declare_input("LED", address, size, move |base, _, data| {
        let mut bank = sink.borrow_mut();
        bank.bytes.clear();
        bank.bytes.extend_from_slice(data);
        trace!(base, value = from_be_bytes(data), "led input");
    });

    Ok(Box::new(Led {
        rank,
        address,
        bank,
        active: true,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use sim_core::DeviceRegistry;

    fn panel(params: &[&str]) -> (Controller, Result<(), ConfigError>) {
        let mut registry = DeviceRegistry::new();
        registry.register(NAME, create);
        let mut controller = Controller::new();
        let result = controller.create_device(&DeviceDescriptor::new(NAME, params.iter().copied()), &registry);
        (controller, result)
    }

    fn led(controller: &Controller) -> &Led {
        controller.devices()[0].as_any().downcast_ref::<Led>().unwrap()
    }

    #[test]
    fn window_covers_every_lamp() {
        let (controller, result) = panel(&["12", "16"]);
        result.unwrap();
        assert_eq!(controller.windows().collect::<Vec<_>>(), [("LED", 16, 2)]);
        assert_eq!(led(&controller).count(), 12);
        assert_eq!(led(&controller).address(), 16);
    }

    #[test]
    fn lamp_zero_is_low_bit_of_last_byte() {
        let (mut controller, result) = panel(&["16", "0"]);
        result.unwrap();
        controller.notify_write(&[0x80, 0x01], 0, 2);
        let lamps = led(&controller).lamps();
        assert!(lamps[0]);
        assert!(lamps[15]);
        assert_eq!(lamps.iter().filter(|&&on| on).count(), 2);
        assert_eq!(led(&controller).value(), 0x8001);
    }

    #[test]
    fn render_shows_lamps_and_value() {
        let (mut controller, result) = panel(&["8", "0"]);
        result.unwrap();
        controller.notify_write(&[0x05], 0, 1);
        assert_eq!(led(&controller).render(), ".....*.* @0 x05 5");
    }

    #[test]
    fn teardown_deactivates() {
        let (mut controller, result) = panel(&["8", "0"]);
        result.unwrap();
        assert!(led(&controller).is_active());
        controller.delete_all();
        assert!(controller.devices().is_empty());
    }

    #[rstest]
    #[case(&[])]
    #[case(&["8"])]
    #[case(&["eight", "0"])]
    #[case(&["0", "0"])]
    #[case(&["8", "-1"])]
    fn rejects_bad_parameters(#[case] params: &[&str]) {
        let (controller, result) = panel(params);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidDeviceParameter { .. })
        ));
        assert!(controller.devices().is_empty());
    }
}
