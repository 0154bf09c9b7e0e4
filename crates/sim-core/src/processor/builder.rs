//! Declarative construction of a [`Processor`].

use std::collections::HashMap;

use crate::error::{ConfigError, ExecError};
use crate::fixed::to_unsigned;

use super::pattern::{LabelSyntax, OperandPattern};
use super::state::{
    CpuState, Indicator, IndicatorId, IndicatorKind, NumberFormat, Register, RegisterId, RegisterKind,
    StatusUpdate,
};
use super::table::{
    AddressingMode, AddressingModeId, DataDirective, Instruction, Machine, Operand, ResetHook,
    SectionDirective, ValueDecoder,
};
use super::{Layout, Processor, SourceSyntax};

/// Widest field the engine models, in bytes.
const MAX_FIELD_WIDTH: usize = 4;

/// Collects the tables of an architecture and validates them into a [`Processor`].
///
/// Registers and indicators receive ranks in declaration order unless an
/// explicit rank is given; the counter advances either way.
pub struct ProcessorBuilder {
    name: String,
    registers: Vec<Register>,
    register_rank: usize,
    indicators: Vec<Indicator>,
    indicator_rank: usize,
    modes: Vec<AddressingMode>,
    instructions: Vec<Instruction>,
    data: Vec<DataDirective>,
    sections: Vec<SectionDirective>,
    layout: Layout,
    syntax: SourceSyntax,
    offset_mode: Option<AddressingModeId>,
    reset_hook: Option<ResetHook>,
}

impl ProcessorBuilder {
    /// Starts an architecture called `name`, with one-byte words, addresses and
    /// opcodes and `;` comments.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registers: Vec::new(),
            register_rank: 0,
            indicators: Vec::new(),
            indicator_rank: 0,
            modes: Vec::new(),
            instructions: Vec::new(),
            data: Vec::new(),
            sections: Vec::new(),
            layout: Layout {
                word_size: 1,
                address_size: 1,
                instruction_size: 1,
            },
            syntax: SourceSyntax {
                comment: ";".to_string(),
                operand_separator: None,
                labels: LabelSyntax::default(),
                data_address: None,
            },
            offset_mode: None,
            reset_hook: None,
        }
    }

    /// Declares a register at the next free rank.
    pub fn register(
        &mut self,
        name: &str,
        label: &str,
        kind: RegisterKind,
        format: NumberFormat,
        size: usize,
        status: StatusUpdate,
    ) -> RegisterId {
        let rank = self.register_rank;
        self.register_at(name, label, kind, format, size, status, rank)
    }

    /// Declares a register pinned to `rank`.
    #[allow(clippy::too_many_arguments)]
    pub fn register_at(
        &mut self,
        name: &str,
        label: &str,
        kind: RegisterKind,
        format: NumberFormat,
        size: usize,
        status: StatusUpdate,
        rank: usize,
    ) -> RegisterId {
        let id = RegisterId(self.registers.len());
        self.registers.push(Register {
            name: name.to_string(),
            label: label.to_string(),
            kind,
            format,
            size,
            rank,
            status,
            value: 0,
        });
        self.register_rank += 1;
        id
    }

    /// Declares an indicator at the next free rank.
    pub fn indicator(&mut self, name: &str, label: &str, kind: IndicatorKind) -> IndicatorId {
        let rank = self.indicator_rank;
        self.indicator_at(name, label, kind, rank)
    }

    /// Declares an indicator pinned to `rank`.
    pub fn indicator_at(&mut self, name: &str, label: &str, kind: IndicatorKind, rank: usize) -> IndicatorId {
        let id = IndicatorId(self.indicators.len());
        self.indicators.push(Indicator {
            name: name.to_string(),
            label: label.to_string(),
            kind,
            rank,
            value: false,
        });
        self.indicator_rank += 1;
        id
    }

    /// Declares an addressing mode; modes are tried in declaration order.
    pub fn addressing_mode(
        &mut self,
        name: &str,
        pattern: OperandPattern,
        size: usize,
        decoder: ValueDecoder,
    ) -> AddressingModeId {
        let id = AddressingModeId(self.modes.len());
        self.modes.push(AddressingMode {
            name: name.to_string(),
            pattern,
            size,
            decoder,
        });
        id
    }

    fn push_instruction<F>(&mut self, opcode: i64, mnemonic: &str, mode: Option<AddressingModeId>, is_offset: bool, behavior: F)
    where
        F: Fn(&mut Machine<'_>, &[Operand]) -> Result<(), ExecError> + 'static,
    {
        self.instructions.push(Instruction {
            opcode,
            mnemonic: mnemonic.to_ascii_uppercase(),
            mode,
            is_offset,
            behavior: Box::new(behavior),
        });
    }

    /// Declares an instruction whose label operands are absolute.
    pub fn instruction<F>(&mut self, opcode: i64, mnemonic: &str, mode: Option<AddressingModeId>, behavior: F)
    where
        F: Fn(&mut Machine<'_>, &[Operand]) -> Result<(), ExecError> + 'static,
    {
        self.push_instruction(opcode, mnemonic, mode, false, behavior);
    }

    /// Declares an instruction whose label operands are encoded as offsets
    /// from the following instruction.
    pub fn relative_instruction<F>(&mut self, opcode: i64, mnemonic: &str, mode: Option<AddressingModeId>, behavior: F)
    where
        F: Fn(&mut Machine<'_>, &[Operand]) -> Result<(), ExecError> + 'static,
    {
        self.push_instruction(opcode, mnemonic, mode, true, behavior);
    }

    /// Declares a data directive.
    pub fn data(&mut self, pattern: OperandPattern, size: usize, decoder: ValueDecoder) -> &mut Self {
        self.data.push(DataDirective {
            pattern,
            size,
            decoder,
        });
        self
    }

    /// Declares a section directive, with an origin operand when `address` is set.
    pub fn section(&mut self, name: &str, is_data: bool, address: Option<ValueDecoder>) -> &mut Self {
        self.sections.push(SectionDirective {
            name: name.to_ascii_uppercase(),
            is_data,
            address,
        });
        self
    }

    /// Sets word, address and opcode widths in bytes.
    pub fn sizes(&mut self, word_size: usize, address_size: usize, instruction_size: usize) -> &mut Self {
        self.layout = Layout {
            word_size,
            address_size,
            instruction_size,
        };
        self
    }

    /// Sets the comment marker.
    pub fn comment(&mut self, marker: &str) -> &mut Self {
        marker.clone_into(&mut self.syntax.comment);
        self
    }

    /// Sets the character that separates multiple operands.
    pub fn operand_separator(&mut self, separator: char) -> &mut Self {
        self.syntax.operand_separator = Some(separator);
        self
    }

    /// Sets the label name syntax.
    pub fn label_syntax(&mut self, labels: LabelSyntax) -> &mut Self {
        self.syntax.labels = labels;
        self
    }

    /// Data lines are written `ADDRESS [VALUE]`, with `decoder` for the address.
    pub fn data_with_address(&mut self, decoder: ValueDecoder) -> &mut Self {
        self.syntax.data_address = Some(decoder);
        self
    }

    /// Designates the mode that relative instructions encode label operands in.
    pub fn offset_mode(&mut self, mode: AddressingModeId) -> &mut Self {
        self.offset_mode = Some(mode);
        self
    }

    /// Installs the architecture reset hook.
    pub fn on_reset<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut CpuState) + 'static,
    {
        self.reset_hook = Some(Box::new(hook));
        self
    }

    fn check_size(what: &'static str, size: usize, allow_zero: bool) -> Result<(), ConfigError> {
        if size > MAX_FIELD_WIDTH || (size == 0 && !allow_zero) {
            return Err(ConfigError::InvalidSize { what, size });
        }
        Ok(())
    }

    /// Validates the tables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when no program counter exists, a size is out of
    /// range, an opcode is duplicated or too wide, or a relative instruction
    /// exists without an offset mode.
    pub fn build(self) -> Result<Processor, ConfigError> {
        let pc = self
            .registers
            .iter()
            .position(|register| register.kind == RegisterKind::ProgramCounter)
            .map(RegisterId)
            .ok_or_else(|| ConfigError::MissingProgramCounter(self.name.clone()))?;

        Self::check_size("word", self.layout.word_size, false)?;
        Self::check_size("address", self.layout.address_size, false)?;
        Self::check_size("instruction", self.layout.instruction_size, false)?;
        for register in &self.registers {
            Self::check_size("register", register.size, false)?;
        }
        for mode in &self.modes {
            Self::check_size("operand", mode.size, true)?;
        }
        for data in &self.data {
            Self::check_size("data", data.size, false)?;
        }

        let mut by_opcode = HashMap::with_capacity(self.instructions.len());
        let mut by_mnemonic: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, instruction) in self.instructions.iter().enumerate() {
            let width = self.layout.instruction_size;
            if to_unsigned(instruction.opcode, width) != instruction.opcode {
                return Err(ConfigError::OpcodeTooWide {
                    opcode: instruction.opcode,
                    width,
                });
            }
            if by_opcode.insert(instruction.opcode, index).is_some() {
                return Err(ConfigError::DuplicateOpcode(instruction.opcode));
            }
            if instruction.is_offset && self.offset_mode.is_none() {
                return Err(ConfigError::MissingOffsetMode(instruction.mnemonic.clone()));
            }
            by_mnemonic
                .entry(instruction.mnemonic.clone())
                .or_default()
                .push(index);
        }

        Ok(Processor {
            name: self.name,
            cpu: CpuState::new(self.registers, self.indicators),
            modes: self.modes,
            instructions: self.instructions,
            by_opcode,
            by_mnemonic,
            data: self.data,
            sections: self.sections,
            layout: self.layout,
            syntax: self.syntax,
            offset_mode: self.offset_mode,
            pc,
            reset_hook: self.reset_hook,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::pattern::{Alternative, NumberSyntax};

    fn decode(text: &str) -> Result<i64, crate::error::SyntaxError> {
        text.parse()
            .map_err(|_| crate::error::SyntaxError::InvalidNumber(text.to_string()))
    }

    fn with_pc() -> ProcessorBuilder {
        let mut builder = ProcessorBuilder::new("toy");
        builder.register("PC", "Program counter", RegisterKind::ProgramCounter, NumberFormat::Unsigned, 1, StatusUpdate::Manual);
        builder
    }

    #[test]
    fn program_counter_is_required() {
        let error = ProcessorBuilder::new("bare").build().unwrap_err();
        assert_eq!(error, ConfigError::MissingProgramCounter("bare".into()));
    }

    #[test]
    fn duplicate_opcodes_are_rejected() {
        let mut builder = with_pc();
        builder.instruction(0x01, "NOP", None, |_, _| Ok(()));
        builder.instruction(0x01, "HLT", None, |_, _| Ok(()));
        assert_eq!(builder.build().unwrap_err(), ConfigError::DuplicateOpcode(1));
    }

    #[test]
    fn opcodes_must_fit_instruction_width() {
        let mut builder = with_pc();
        builder.instruction(0x100, "BIG", None, |_, _| Ok(()));
        assert!(matches!(builder.build(), Err(ConfigError::OpcodeTooWide { .. })));
    }

    #[test]
    fn relative_instructions_need_an_offset_mode() {
        let mut builder = with_pc();
        let mode = builder.addressing_mode(
            "rel",
            OperandPattern::single(Alternative::new().number(NumberSyntax::decimal())),
            1,
            decode,
        );
        builder.relative_instruction(0x10, "BRA", Some(mode), |_, _| Ok(()));
        assert_eq!(builder.build().unwrap_err(), ConfigError::MissingOffsetMode("BRA".into()));

        let mut builder = with_pc();
        let mode = builder.addressing_mode("rel", OperandPattern::new(), 1, decode);
        builder.relative_instruction(0x10, "BRA", Some(mode), |_, _| Ok(()));
        builder.offset_mode(mode);
        assert!(builder.build().is_ok());
    }

    #[test]
    fn ranks_follow_declaration_order_unless_pinned() {
        let mut builder = with_pc();
        let c = builder.indicator("C", "Carry", IndicatorKind::Carry);
        let n = builder.indicator_at("N", "Negative", IndicatorKind::Negative, 7);
        let z = builder.indicator("Z", "Zero", IndicatorKind::Zero);
        let processor = builder.build().unwrap();
        let cpu = processor.cpu();
        assert_eq!(cpu.indicator_info(c).rank(), 0);
        assert_eq!(cpu.indicator_info(n).rank(), 7);
        assert_eq!(cpu.indicator_info(z).rank(), 2);
    }

    #[test]
    fn register_ranks_can_be_pinned() {
        let mut builder = with_pc();
        let a = builder.register("A", "Accumulator", RegisterKind::Accumulator, NumberFormat::Signed, 1, StatusUpdate::Auto);
        let s = builder.register_at("S", "Status", RegisterKind::Status, NumberFormat::Unsigned, 1, StatusUpdate::Manual, 9);
        let x = builder.register("X", "Index", RegisterKind::Index, NumberFormat::Unsigned, 1, StatusUpdate::Manual);
        let processor = builder.build().unwrap();
        let cpu = processor.cpu();
        assert_eq!(cpu.register_info(a).rank(), 1);
        assert_eq!(cpu.register_info(s).rank(), 9);
        assert_eq!(cpu.register_info(x).rank(), 3);
        assert_eq!(cpu.find_register("S"), Some(s));
    }

    #[test]
    fn oversized_fields_are_rejected() {
        let mut builder = with_pc();
        builder.sizes(1, 5, 1);
        assert_eq!(
            builder.build().unwrap_err(),
            ConfigError::InvalidSize {
                what: "address",
                size: 5
            }
        );
    }
}
