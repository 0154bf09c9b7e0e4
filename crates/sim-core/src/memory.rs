//! Byte-addressable, big-endian memory with write notification.
//!
//! Values are stored most significant byte first. Reads of `n` bytes return
//! the signed `n`-byte interpretation. A write either fully succeeds (and then
//! notifies controllers followed by subscribed sinks) or leaves memory untouched.

use tracing::trace;

use crate::controller::Controller;
use crate::error::{BoundsViolation, MemoryBoundsError};
use crate::events::{EventSink, Observers, SimEvent};
use crate::fixed::{from_be_bytes, to_be_bytes, to_signed};

/// Simulated memory of a fixed size.
#[derive(Debug)]
pub struct Memory {
    storage: Vec<u8>,
    controllers: Vec<Controller>,
    observers: Observers,
}

impl Memory {
    /// Creates `size` zeroed bytes with no controller attached.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            storage: vec![0; size],
            controllers: Vec::new(),
            observers: Observers::new(),
        }
    }

    /// Size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.storage.len()
    }

    /// Attaches a controller; controllers are notified in attachment order.
    pub fn attach_controller(&mut self, controller: Controller) {
        self.controllers.push(controller);
    }

    /// Attached controllers.
    #[must_use]
    pub fn controllers(&self) -> &[Controller] {
        &self.controllers
    }

    /// Mutable access to the attached controllers.
    pub fn controllers_mut(&mut self) -> &mut [Controller] {
        &mut self.controllers
    }

    /// Subscribes a sink to [`SimEvent::MemoryChanged`] events.
    pub fn subscribe(&mut self, sink: Box<dyn EventSink>) {
        self.observers.subscribe(sink);
    }

    fn range(&self, address: i64, length: usize) -> Result<std::ops::Range<usize>, MemoryBoundsError> {
        let error = |violation| MemoryBoundsError {
            address,
            length,
            violation,
        };
        let start = usize::try_from(address).map_err(|_| error(BoundsViolation::NegativeAddress))?;
        let end = start
            .checked_add(length)
            .filter(|&end| end <= self.storage.len())
            .ok_or_else(|| error(BoundsViolation::PastEnd))?;
        Ok(start..end)
    }

    /// Reads `length` bytes at `address` as a signed value.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryBoundsError`] if the range leaves memory.
    pub fn read(&self, address: i64, length: usize) -> Result<i64, MemoryBoundsError> {
        Ok(to_signed(self.read_unsigned(address, length)?, length))
    }

    /// Reads `length` bytes at `address` without sign extension.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryBoundsError`] if the range leaves memory.
    pub fn read_unsigned(&self, address: i64, length: usize) -> Result<i64, MemoryBoundsError> {
        let range = self.range(address, length)?;
        Ok(from_be_bytes(&self.storage[range]))
    }

    /// Reads a single raw byte.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryBoundsError`] if `address` is outside memory.
    pub fn byte(&self, address: i64) -> Result<u8, MemoryBoundsError> {
        let range = self.range(address, 1)?;
        Ok(self.storage[range.start])
    }

    /// Stores the low `length` bytes of `value` at `address`, big-endian.
    ///
    /// On success every attached controller is notified, then every sink.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryBoundsError`] without modifying anything if the range
    /// leaves memory.
    pub fn write(&mut self, address: i64, length: usize, value: i64) -> Result<(), MemoryBoundsError> {
        let range = self.range(address, length)?;
        self.storage[range].copy_from_slice(&to_be_bytes(value, length));
        trace!(address, length, value, "memory write");

        let storage = &self.storage;
        for controller in &mut self.controllers {
            controller.notify_write(storage, address, length);
        }
        self.observers
            .publish(SimEvent::MemoryChanged { address, length });
        Ok(())
    }

    /// Zeroes every byte. No notification is sent.
    pub fn clear(&mut self) {
        self.storage.fill(0);
    }

    /// Read-only view of the whole store.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.storage
    }

    /// Copies `length` raw bytes starting at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryBoundsError`] if the range leaves memory.
    pub fn dump(&self, address: i64, length: usize) -> Result<Vec<u8>, MemoryBoundsError> {
        let range = self.range(address, length)?;
        Ok(self.storage[range].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventLog;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn values_are_stored_big_endian_and_read_signed() {
        let mut memory = Memory::new(16);
        memory.write(2, 2, 0x1234).unwrap();
        assert_eq!(memory.byte(2).unwrap(), 0x12);
        assert_eq!(memory.byte(3).unwrap(), 0x34);
        assert_eq!(memory.read(2, 2).unwrap(), 0x1234);

        memory.write(0, 1, 200).unwrap();
        assert_eq!(memory.read(0, 1).unwrap(), -56);
        assert_eq!(memory.read_unsigned(0, 1).unwrap(), 200);
    }

    #[test]
    fn negative_address_is_rejected() {
        let mut memory = Memory::new(8);
        let error = memory.write(-1, 1, 5).unwrap_err();
        assert_eq!(error.violation, BoundsViolation::NegativeAddress);
        assert_eq!(memory.read(-3, 1).unwrap_err().violation, BoundsViolation::NegativeAddress);
    }

    #[test]
    fn access_ending_past_memory_is_rejected_without_partial_write() {
        let mut memory = Memory::new(4);
        let error = memory.write(3, 2, 0xFFFF).unwrap_err();
        assert_eq!(error.violation, BoundsViolation::PastEnd);
        assert_eq!(memory.bytes(), &[0, 0, 0, 0]);
        assert!(memory.read(4, 1).is_err());
        assert!(memory.read(3, 1).is_ok());
        assert_eq!(memory.read(4, 0).unwrap(), 0);
    }

    #[test]
    fn clear_zeroes_every_byte() {
        let mut memory = Memory::new(4);
        memory.write(0, 4, -1).unwrap();
        memory.clear();
        assert_eq!(memory.dump(0, 4).unwrap(), vec![0; 4]);
    }

    #[test]
    fn controllers_run_before_sinks_and_see_written_bytes() {
        struct Tagger(Rc<RefCell<Vec<String>>>);
        impl EventSink for Tagger {
            fn on_event(&mut self, event: &SimEvent) {
                self.0.borrow_mut().push(format!("sink {event:?}"));
            }
        }

        let order = Rc::new(RefCell::new(Vec::<String>::new()));
        let mut controller = Controller::new();
        let seen = Rc::clone(&order);
        controller.declare_input("out", 4, 2, move |_, _, bytes| {
            seen.borrow_mut().push(format!("device {bytes:?}"));
        });

        let mut memory = Memory::new(8);
        memory.attach_controller(controller);
        memory.subscribe(Box::new(Tagger(Rc::clone(&order))));
        memory.write(5, 1, 7).unwrap();

        let order = order.borrow();
        assert_eq!(order.len(), 2);
        assert_eq!(order[0], "device [0, 7]");
        assert!(order[1].starts_with("sink MemoryChanged"));
    }

    #[test]
    fn failed_writes_notify_nobody() {
        let log = EventLog::new();
        let mut memory = Memory::new(2);
        memory.subscribe(Box::new(log.clone()));
        assert!(memory.write(1, 2, 0).is_err());
        assert!(log.events().is_empty());
        memory.write(0, 2, 1).unwrap();
        assert_eq!(
            log.events(),
            vec![SimEvent::MemoryChanged {
                address: 0,
                length: 2
            }]
        );
    }
}
