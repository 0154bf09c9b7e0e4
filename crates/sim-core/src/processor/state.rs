//! Register file, indicators and the status-register mirror.

use tracing::trace;

use crate::events::{EventSink, Observers, SimEvent};
use crate::fixed::{to_signed, to_unsigned};

/// Index of a register within its processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegisterId(pub(crate) usize);

impl RegisterId {
    /// Position in declaration order.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Index of an indicator within its processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndicatorId(pub(crate) usize);

impl IndicatorId {
    /// Position in declaration order.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Architectural role of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RegisterKind {
    /// Address of the next instruction.
    ProgramCounter,
    /// Stack pointer.
    StackPointer,
    /// Accumulator.
    Accumulator,
    /// Index register.
    Index,
    /// General purpose register.
    General,
    /// Packed indicator bits, one per indicator rank.
    Status,
}

/// How a register's bytes are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum NumberFormat {
    /// Two's complement.
    Signed,
    /// Plain binary.
    Unsigned,
}

impl NumberFormat {
    /// Truncates `value` to `width` bytes in this format.
    #[must_use]
    pub const fn fit(self, value: i64, width: usize) -> i64 {
        match self {
            Self::Signed => to_signed(value, width),
            Self::Unsigned => to_unsigned(value, width),
        }
    }
}

/// Whether writing a register refreshes the zero and negative indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum StatusUpdate {
    /// Indicators only change when an instruction sets them.
    Manual,
    /// Every write recomputes zero and negative from the stored value.
    Auto,
}

/// Role of an indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum IndicatorKind {
    /// Result was zero.
    Zero,
    /// Result was negative.
    Negative,
    /// Carry out of the most significant bit.
    Carry,
    /// Signed overflow.
    Overflow,
    /// Interrupts masked.
    InterruptDisable,
    /// Decimal arithmetic mode.
    Decimal,
    /// Break flag.
    Break,
    /// Bit with no architectural meaning.
    Unused,
}

/// One register of the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Register {
    pub(crate) name: String,
    pub(crate) label: String,
    pub(crate) kind: RegisterKind,
    pub(crate) format: NumberFormat,
    pub(crate) size: usize,
    pub(crate) rank: usize,
    pub(crate) status: StatusUpdate,
    pub(crate) value: i64,
}

impl Register {
    /// Short name used in source and listings.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Descriptive label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Architectural role.
    #[must_use]
    pub const fn kind(&self) -> RegisterKind {
        self.kind
    }

    /// Interpretation of the stored bytes.
    #[must_use]
    pub const fn format(&self) -> NumberFormat {
        self.format
    }

    /// Width in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Position among the processor's registers.
    #[must_use]
    pub const fn rank(&self) -> usize {
        self.rank
    }

    /// Whether writes refresh zero and negative.
    #[must_use]
    pub const fn status_update(&self) -> StatusUpdate {
        self.status
    }

    /// Current (already truncated) value.
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.value
    }
}

/// One indicator bit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Indicator {
    pub(crate) name: String,
    pub(crate) label: String,
    pub(crate) kind: IndicatorKind,
    pub(crate) rank: usize,
    pub(crate) value: bool,
}

impl Indicator {
    /// Short name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Descriptive label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Role.
    #[must_use]
    pub const fn kind(&self) -> IndicatorKind {
        self.kind
    }

    /// Bit position inside status registers.
    #[must_use]
    pub const fn rank(&self) -> usize {
        self.rank
    }

    /// Current state.
    #[must_use]
    pub const fn value(&self) -> bool {
        self.value
    }
}

fn bit(rank: usize) -> i64 {
    u32::try_from(rank)
        .ok()
        .and_then(|rank| 1_i64.checked_shl(rank))
        .unwrap_or(0)
}

/// Mutable processor state visible to instruction behaviors.
///
/// Indicator values and the bits of every status register are kept in sync:
/// writing a status register re-derives each indicator from the bit at its
/// rank, and changing an indicator rewrites that bit.
#[derive(Debug, Default)]
pub struct CpuState {
    registers: Vec<Register>,
    indicators: Vec<Indicator>,
    end: bool,
    observers: Observers,
}

impl CpuState {
    pub(crate) fn new(registers: Vec<Register>, indicators: Vec<Indicator>) -> Self {
        Self {
            registers,
            indicators,
            end: false,
            observers: Observers::new(),
        }
    }

    /// Subscribes a sink to register, indicator and fetch events.
    pub fn subscribe(&mut self, sink: Box<dyn EventSink>) {
        self.observers.subscribe(sink);
    }

    pub(crate) fn publish(&mut self, event: SimEvent) {
        self.observers.publish(event);
    }

    /// Registers in declaration order.
    #[must_use]
    pub fn registers(&self) -> &[Register] {
        &self.registers
    }

    /// Indicators in declaration order.
    #[must_use]
    pub fn indicators(&self) -> &[Indicator] {
        &self.indicators
    }

    /// Looks a register up by (case-insensitive) name.
    #[must_use]
    pub fn find_register(&self, name: &str) -> Option<RegisterId> {
        self.registers
            .iter()
            .position(|register| register.name.eq_ignore_ascii_case(name))
            .map(RegisterId)
    }

    /// Looks an indicator up by (case-insensitive) name.
    #[must_use]
    pub fn find_indicator(&self, name: &str) -> Option<IndicatorId> {
        self.indicators
            .iter()
            .position(|indicator| indicator.name.eq_ignore_ascii_case(name))
            .map(IndicatorId)
    }

    /// Static description of a register.
    #[must_use]
    pub fn register_info(&self, id: RegisterId) -> &Register {
        &self.registers[id.0]
    }

    /// Static description of an indicator.
    #[must_use]
    pub fn indicator_info(&self, id: IndicatorId) -> &Indicator {
        &self.indicators[id.0]
    }

    /// Current value of a register.
    #[must_use]
    pub fn register(&self, id: RegisterId) -> i64 {
        self.registers[id.0].value
    }

    /// Current state of an indicator.
    #[must_use]
    pub fn indicator(&self, id: IndicatorId) -> bool {
        self.indicators[id.0].value
    }

    /// State of the first indicator of `kind`, `false` if none exists.
    #[must_use]
    pub fn flag(&self, kind: IndicatorKind) -> bool {
        self.indicators
            .iter()
            .find(|indicator| indicator.kind == kind)
            .is_some_and(|indicator| indicator.value)
    }

    /// Stores `value` truncated to the register's width and format.
    ///
    /// Writing a status register re-derives every indicator. Writing an
    /// auto-status register refreshes zero and negative.
    pub fn set_register(&mut self, id: RegisterId, value: i64) {
        let register = &mut self.registers[id.0];
        register.value = register.format.fit(value, register.size);
        let stored = register.value;
        let kind = register.kind;
        let status = register.status;
        trace!(register = %register.name, value = stored, "register write");
        self.observers.publish(SimEvent::RegisterChanged {
            register: id,
            value: stored,
        });

        if kind == RegisterKind::Status {
            self.derive_indicators(stored);
        }
        if status == StatusUpdate::Auto {
            self.set_zero(stored);
            self.set_negative(stored);
        }
    }

    fn derive_indicators(&mut self, status: i64) {
        for index in 0..self.indicators.len() {
            let indicator = &mut self.indicators[index];
            let value = status & bit(indicator.rank) != 0;
            if indicator.value != value {
                indicator.value = value;
                self.observers.publish(SimEvent::IndicatorChanged {
                    indicator: IndicatorId(index),
                    value,
                });
            }
        }
    }

    /// Sets an indicator and mirrors it into every status register.
    ///
    /// Nothing happens, and nothing is published, when the value is unchanged.
    pub fn set_indicator(&mut self, id: IndicatorId, value: bool) {
        let indicator = &mut self.indicators[id.0];
        if indicator.value == value {
            return;
        }
        indicator.value = value;
        let mask = bit(indicator.rank);

        for index in 0..self.registers.len() {
            let register = &mut self.registers[index];
            if register.kind != RegisterKind::Status {
                continue;
            }
            let raw = if value {
                register.value | mask
            } else {
                register.value & !mask
            };
            register.value = register.format.fit(raw, register.size);
            let stored = register.value;
            self.observers.publish(SimEvent::RegisterChanged {
                register: RegisterId(index),
                value: stored,
            });
        }
        self.observers
            .publish(SimEvent::IndicatorChanged { indicator: id, value });
    }

    /// Sets every indicator of `kind`.
    pub fn set_flag(&mut self, kind: IndicatorKind, value: bool) {
        for index in 0..self.indicators.len() {
            if self.indicators[index].kind == kind {
                self.set_indicator(IndicatorId(index), value);
            }
        }
    }

    /// Zero indicators become `value == 0`.
    pub fn set_zero(&mut self, value: i64) {
        self.set_flag(IndicatorKind::Zero, value == 0);
    }

    /// Negative indicators become `value < 0`.
    pub fn set_negative(&mut self, value: i64) {
        self.set_flag(IndicatorKind::Negative, value < 0);
    }

    /// Carry indicators become `value`.
    pub fn set_carry(&mut self, value: bool) {
        self.set_flag(IndicatorKind::Carry, value);
    }

    /// Overflow indicators become `value`.
    pub fn set_overflow(&mut self, value: bool) {
        self.set_flag(IndicatorKind::Overflow, value);
    }

    /// Whether the end-of-program latch is set.
    #[must_use]
    pub const fn end_reached(&self) -> bool {
        self.end
    }

    /// Sets or clears the end-of-program latch.
    pub fn set_end(&mut self, value: bool) {
        self.end = value;
    }

    /// Zeroes every register, then every indicator, then clears the end latch.
    pub fn reset(&mut self) {
        for index in 0..self.registers.len() {
            self.set_register(RegisterId(index), 0);
        }
        for index in 0..self.indicators.len() {
            self.set_indicator(IndicatorId(index), false);
        }
        self.end = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventLog;

    fn register(name: &str, kind: RegisterKind, format: NumberFormat, size: usize, status: StatusUpdate) -> Register {
        Register {
            name: name.into(),
            label: name.into(),
            kind,
            format,
            size,
            rank: 0,
            status,
            value: 0,
        }
    }

    fn indicator(name: &str, kind: IndicatorKind, rank: usize) -> Indicator {
        Indicator {
            name: name.into(),
            label: name.into(),
            kind,
            rank,
            value: false,
        }
    }

    fn cpu() -> CpuState {
        CpuState::new(
            vec![
                register("A", RegisterKind::Accumulator, NumberFormat::Signed, 1, StatusUpdate::Auto),
                register("P", RegisterKind::Status, NumberFormat::Unsigned, 1, StatusUpdate::Manual),
                register("PC", RegisterKind::ProgramCounter, NumberFormat::Unsigned, 2, StatusUpdate::Manual),
            ],
            vec![
                indicator("C", IndicatorKind::Carry, 0),
                indicator("Z", IndicatorKind::Zero, 1),
                indicator("N", IndicatorKind::Negative, 7),
            ],
        )
    }

    const A: RegisterId = RegisterId(0);
    const P: RegisterId = RegisterId(1);
    const PC: RegisterId = RegisterId(2);
    const C: IndicatorId = IndicatorId(0);
    const Z: IndicatorId = IndicatorId(1);
    const N: IndicatorId = IndicatorId(2);

    #[test]
    fn writes_are_truncated_to_width_and_format() {
        let mut cpu = cpu();
        cpu.set_register(A, 0x1FF);
        assert_eq!(cpu.register(A), -1);
        cpu.set_register(PC, -1);
        assert_eq!(cpu.register(PC), 0xFFFF);
    }

    #[test]
    fn auto_status_refreshes_zero_and_negative() {
        let mut cpu = cpu();
        cpu.set_register(A, 0);
        assert!(cpu.indicator(Z));
        assert!(!cpu.indicator(N));
        cpu.set_register(A, 0x80);
        assert!(!cpu.indicator(Z));
        assert!(cpu.indicator(N));
        assert_eq!(cpu.register(P), 0x80);
    }

    #[test]
    fn indicator_changes_are_mirrored_into_status() {
        let mut cpu = cpu();
        cpu.set_indicator(C, true);
        assert_eq!(cpu.register(P), 0b0000_0001);
        cpu.set_indicator(N, true);
        assert_eq!(cpu.register(P), 0b1000_0001);
        cpu.set_indicator(C, false);
        assert_eq!(cpu.register(P), 0b1000_0000);
    }

    #[test]
    fn status_writes_rederive_every_indicator() {
        let mut cpu = cpu();
        cpu.set_register(P, 0b1000_0010);
        assert!(!cpu.indicator(C));
        assert!(cpu.indicator(Z));
        assert!(cpu.indicator(N));

        cpu.set_indicator(Z, false);
        let snapshot = cpu.register(P);
        cpu.set_register(P, snapshot);
        assert!(!cpu.indicator(Z));
        assert!(cpu.indicator(N));
    }

    #[test]
    fn unchanged_indicator_publishes_nothing() {
        let mut cpu = cpu();
        let log = EventLog::new();
        cpu.subscribe(Box::new(log.clone()));
        cpu.set_indicator(C, false);
        assert!(log.events().is_empty());
        cpu.set_indicator(C, true);
        assert_eq!(
            log.events().last(),
            Some(&SimEvent::IndicatorChanged {
                indicator: C,
                value: true
            })
        );
    }

    #[test]
    fn reset_clears_registers_indicators_and_latch() {
        let mut cpu = cpu();
        cpu.set_register(A, 5);
        cpu.set_indicator(C, true);
        cpu.set_end(true);
        cpu.reset();
        assert_eq!(cpu.register(A), 0);
        assert!(cpu.indicators().iter().all(|indicator| !indicator.value()));
        assert_eq!(cpu.register(P), 0);
        assert!(!cpu.end_reached());
    }

    #[test]
    fn lookup_by_name_ignores_case() {
        let cpu = cpu();
        assert_eq!(cpu.find_register("pc"), Some(PC));
        assert_eq!(cpu.find_indicator("z"), Some(Z));
        assert_eq!(cpu.find_register("Q"), None);
    }
}
