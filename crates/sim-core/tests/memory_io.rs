//! Memory and memory-mapped I/O integration coverage.

use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;
use rstest::rstest;
use sim_core::fixed::{to_signed, to_unsigned};
use sim_core::{BoundsViolation, Controller, EventLog, Memory, SimEvent};
use thiserror as _;
use tracing as _;

type Calls = Rc<RefCell<Vec<(i64, usize, Vec<u8>)>>>;

fn memory_with_window(size: usize, base: i64, window: usize) -> (Memory, Calls) {
    let calls: Calls = Rc::default();
    let sink = Rc::clone(&calls);
    let mut controller = Controller::new();
    controller.declare_input("window", base, window, move |base, size, bytes| {
        sink.borrow_mut().push((base, size, bytes.to_vec()));
    });
    controller.validate_windows(size).expect("window fits");
    let mut memory = Memory::new(size);
    memory.attach_controller(controller);
    (memory, calls)
}

#[test]
fn write_inside_window_reports_entire_window_once() {
    let (mut memory, calls) = memory_with_window(0x100, 0x10, 2);
    memory.write(0x11, 1, 0x5A).expect("in bounds");
    assert_eq!(*calls.borrow(), vec![(0x10, 2, vec![0x00, 0x5A])]);
}

#[test]
fn write_outside_window_reports_nothing() {
    let (mut memory, calls) = memory_with_window(0x100, 0x10, 2);
    memory.write(0x20, 1, 1).expect("in bounds");
    memory.write(0x0E, 2, 1).expect("in bounds");
    memory.write(0x12, 2, 1).expect("in bounds");
    assert!(calls.borrow().is_empty());
}

#[rstest]
#[case(0x0F, 2)]
#[case(0x11, 2)]
#[case(0x00, 0x100)]
fn straddling_writes_notify(#[case] address: i64, #[case] length: usize) {
    let (mut memory, calls) = memory_with_window(0x100, 0x10, 2);
    memory.write(address, length, 0).expect("in bounds");
    assert_eq!(calls.borrow().len(), 1);
}

#[test]
fn rejected_write_reaches_no_device_and_no_sink() {
    let (mut memory, calls) = memory_with_window(0x20, 0x10, 2);
    let log = EventLog::new();
    memory.subscribe(Box::new(log.clone()));
    let error = memory.write(0x1F, 2, 0).expect_err("past end");
    assert_eq!(error.violation, BoundsViolation::PastEnd);
    assert!(calls.borrow().is_empty());
    assert!(log.events().is_empty());
    memory.write(0x10, 1, 3).expect("in bounds");
    assert_eq!(
        log.events(),
        vec![SimEvent::MemoryChanged {
            address: 0x10,
            length: 1
        }]
    );
}

proptest! {
    #[test]
    fn read_returns_signed_interpretation_of_written_value(
        address in 0_i64..60,
        length in 1_usize..=4,
        value in any::<i64>(),
    ) {
        let mut memory = Memory::new(64);
        memory.write(address, length, value).expect("in bounds");
        prop_assert_eq!(memory.read(address, length).expect("in bounds"), to_signed(value, length));
        prop_assert_eq!(
            memory.read_unsigned(address, length).expect("in bounds"),
            to_unsigned(value, length)
        );
    }

    #[test]
    fn out_of_range_access_never_changes_memory(address in 61_i64..200, length in 4_usize..=8) {
        let mut memory = Memory::new(64);
        prop_assert!(memory.write(address, length, -1).is_err());
        prop_assert!(memory.bytes().iter().all(|&byte| byte == 0));
    }
}
