//! Change notifications published by memory and processor state.
//!
//! Presentation layers subscribe an [`EventSink`]; the engine never depends on
//! any concrete consumer.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::processor::{IndicatorId, RegisterId};

/// One observable state change, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    /// The processor is about to fetch the instruction at `pc`.
    InstructionFetch {
        /// Program counter used for the fetch.
        pc: i64,
    },
    /// A register received a new (already truncated) value.
    RegisterChanged {
        /// Register that changed.
        register: RegisterId,
        /// Stored value.
        value: i64,
    },
    /// An indicator flipped.
    IndicatorChanged {
        /// Indicator that changed.
        indicator: IndicatorId,
        /// New state.
        value: bool,
    },
    /// A successful memory write covered `[address, address + length)`.
    MemoryChanged {
        /// First byte written.
        address: i64,
        /// Number of bytes written.
        length: usize,
    },
}

/// Receives engine events.
pub trait EventSink {
    /// Records an event in execution order.
    fn on_event(&mut self, event: &SimEvent);
}

/// Ordered list of subscribed sinks.
#[derive(Default)]
pub struct Observers {
    sinks: Vec<Box<dyn EventSink>>,
}

impl Observers {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sink; sinks are notified in subscription order.
    pub fn subscribe(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    /// Delivers `event` to every sink.
    pub fn publish(&mut self, event: SimEvent) {
        for sink in &mut self.sinks {
            sink.on_event(&event);
        }
    }

    /// Number of subscribed sinks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Returns `true` when nothing is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

/// Sink that keeps every event it receives.
///
/// Clones share one buffer, so a caller can subscribe a clone and inspect the
/// original afterwards.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<SimEvent>>>,
}

impl EventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<SimEvent> {
        self.events.borrow().clone()
    }

    /// Drops every recorded event.
    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl EventSink for EventLog {
    fn on_event(&mut self, event: &SimEvent) {
        self.events.borrow_mut().push(*event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cloned_logs_share_their_buffer() {
        let log = EventLog::new();
        let mut observers = Observers::new();
        observers.subscribe(Box::new(log.clone()));
        observers.publish(SimEvent::InstructionFetch { pc: 4 });
        observers.publish(SimEvent::MemoryChanged {
            address: 1,
            length: 2,
        });
        assert_eq!(
            log.events(),
            vec![
                SimEvent::InstructionFetch { pc: 4 },
                SimEvent::MemoryChanged {
                    address: 1,
                    length: 2
                },
            ]
        );
        log.clear();
        assert!(log.events().is_empty());
        assert_eq!(observers.len(), 1);
    }
}
