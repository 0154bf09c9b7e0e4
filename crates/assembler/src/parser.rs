//! Pass 1: line classification and operand decoding.
//!
//! Each non-blank line is matched against the processor's tables, in order:
//! section directive, instruction, data directive, label. The first kind that
//! fits wins. Problems are recorded on the line and never stop the scan.

use sim_core::{AddressingModeId, ConfigError, Instruction, Processor};

use crate::errors::LineErrorKind;
use crate::source::SourceLine;

/// What a source line turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineKind {
    /// Section directive, possibly moving the assembly cursor.
    Directive,
    /// Data declaration.
    Data,
    /// Instruction.
    Code,
    /// Label definition on a line of its own.
    Label,
    /// Nothing matched.
    Unknown,
}

/// Operand as written in the source, decoded but possibly unresolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceOperand {
    /// Operand text as written.
    pub text: String,
    /// Addressing mode the operand is encoded in.
    pub mode: AddressingModeId,
    /// Referenced label, resolved after address assignment.
    pub label: Option<String>,
    /// Encoded value (0 until a label is resolved).
    pub value: i64,
    /// Encoded width in bytes.
    pub size: usize,
}

/// A classified source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramLine {
    /// 1-indexed source line number.
    pub number: usize,
    /// Source text without its comment.
    pub text: String,
    /// Classification.
    pub kind: LineKind,
    /// Instruction mnemonic, data keyword or section name.
    pub mnemonic: String,
    /// Opcode, once the operand modes matched an instruction.
    pub opcode: Option<i64>,
    /// Assigned address. Directives carry their origin here, if any.
    pub address: Option<i64>,
    /// Opcode width for code, value width for data.
    pub size: usize,
    /// Data value.
    pub value: i64,
    /// Label defined by this line.
    pub label: Option<String>,
    /// Operand text as written.
    pub operand: String,
    /// Decoded operands (at most one).
    pub operands: Vec<SourceOperand>,
    /// Whether label operands are encoded relative to the next instruction.
    pub is_offset: bool,
    /// Problems found on this line so far.
    pub errors: Vec<LineErrorKind>,
}

impl ProgramLine {
    fn new(source: &SourceLine) -> Self {
        Self {
            number: source.number,
            text: source.text.clone(),
            kind: LineKind::Unknown,
            mnemonic: String::new(),
            opcode: None,
            address: None,
            size: 0,
            value: 0,
            label: None,
            operand: String::new(),
            operands: Vec::new(),
            is_offset: false,
            errors: Vec::new(),
        }
    }

    /// Bytes the line occupies in memory.
    #[must_use]
    pub fn footprint(&self) -> usize {
        match self.kind {
            LineKind::Code => self.size + self.operands.iter().map(|operand| operand.size).sum::<usize>(),
            LineKind::Data => self.size,
            LineKind::Directive | LineKind::Label | LineKind::Unknown => 0,
        }
    }

    fn define_label(&mut self, token: &str) {
        let name = token.strip_suffix(':').unwrap_or(token);
        self.label = Some(name.to_string());
    }
}

/// Classifies one line against the processor's tables.
#[must_use]
pub fn classify(source: &SourceLine, processor: &Processor) -> ProgramLine {
    let mut line = ProgramLine::new(source);
    let tokens = &source.tokens;
    let classified = directive(&mut line, tokens, processor)
        || code(&mut line, tokens, processor)
        || data(&mut line, tokens, processor)
        || label(&mut line, tokens, processor);
    if !classified {
        let first = tokens.first().cloned().unwrap_or_default();
        line.errors.push(LineErrorKind::InvalidMnemonic(first));
    }
    line
}

fn directive(line: &mut ProgramLine, tokens: &[String], processor: &Processor) -> bool {
    let Some(first) = tokens.first() else {
        return false;
    };
    let Some(section) = processor
        .sections()
        .iter()
        .find(|section| section.name().eq_ignore_ascii_case(first))
    else {
        return false;
    };

    line.kind = LineKind::Directive;
    line.mnemonic = section.name().to_string();
    match (section.address_decoder(), tokens.get(1)) {
        (Some(decode), Some(text)) => {
            line.operand.clone_from(text);
            match decode(text) {
                Ok(address) => line.address = Some(address),
                Err(error) => line.errors.push(error.into()),
            }
            if let Some(extra) = tokens.get(2) {
                line.errors.push(LineErrorKind::UnexpectedToken(extra.clone()));
            }
        }
        (Some(_), None) => line.errors.push(LineErrorKind::OperandMissing(line.mnemonic.clone())),
        (None, Some(_)) => line.errors.push(LineErrorKind::NoOperandExpected(line.mnemonic.clone())),
        (None, None) => {}
    }
    true
}

fn code(line: &mut ProgramLine, tokens: &[String], processor: &Processor) -> bool {
    let Some(index) = tokens
        .iter()
        .take(2)
        .position(|token| processor.instructions_named(token).next().is_some())
    else {
        return false;
    };

    let mnemonic = tokens[index].to_ascii_uppercase();
    line.kind = LineKind::Code;
    line.size = processor.instruction_size();
    if index > 0 {
        line.define_label(&tokens[0]);
    }
    line.is_offset = processor
        .instructions_named(&mnemonic)
        .next()
        .is_some_and(Instruction::is_offset);
    line.mnemonic.clone_from(&mnemonic);

    if let Some(text) = tokens.get(index + 1) {
        line.operand.clone_from(text);
        if let Some(extra) = tokens.get(index + 2) {
            line.errors.push(LineErrorKind::UnexpectedToken(extra.clone()));
        }
        if processor
            .operand_separator()
            .is_some_and(|separator| text.contains(separator))
        {
            line.errors
                .push(ConfigError::MultipleOperandsUnsupported { mnemonic }.into());
            return true;
        }
        match decode_operand(processor, text, line.is_offset) {
            Ok(operand) => line.operands.push(operand),
            Err(error) => {
                line.errors.push(error);
                return true;
            }
        }
    }

    match find_opcode(processor, &mnemonic, &line.operands) {
        Some(opcode) => line.opcode = Some(opcode),
        None => line.errors.push(LineErrorKind::OperandMismatch(mnemonic)),
    }
    true
}

/// Decodes operand text by trying every addressing mode in declaration order.
///
/// When the matching mode has more than one capturing alternative, the
/// captured text is a label if it fits the label syntax. Labels in relative
/// instructions move to the processor's offset mode.
///
/// # Errors
///
/// Returns [`LineErrorKind::OperandNotRecognized`] if no mode accepts the
/// text, or the mode decoder's error.
pub fn decode_operand(processor: &Processor, text: &str, is_offset: bool) -> Result<SourceOperand, LineErrorKind> {
    let (mode, found) = processor
        .match_operand(text)
        .ok_or_else(|| LineErrorKind::OperandNotRecognized(text.to_string()))?;
    let matched = processor.mode(mode);

    if matched.pattern().capturing_alternatives() > 1 && processor.label_syntax().matches(found.captured) {
        let mode = if is_offset { processor.offset_mode_for(mode) } else { mode };
        return Ok(SourceOperand {
            text: text.to_string(),
            mode,
            label: Some(found.captured.to_string()),
            value: 0,
            size: processor.mode(mode).size(),
        });
    }

    Ok(SourceOperand {
        text: text.to_string(),
        mode,
        label: None,
        value: matched.decode(found.captured)?,
        size: matched.size(),
    })
}

fn find_opcode(processor: &Processor, mnemonic: &str, operands: &[SourceOperand]) -> Option<i64> {
    processor
        .instructions_named(mnemonic)
        .find(|instruction| {
            instruction.modes().len() == operands.len()
                && instruction
                    .modes()
                    .iter()
                    .zip(operands)
                    .all(|(&mode, operand)| mode == operand.mode)
        })
        .map(Instruction::opcode)
}

fn data(line: &mut ProgramLine, tokens: &[String], processor: &Processor) -> bool {
    let labels = processor.label_syntax();
    let Some((index, keyword, directive)) = tokens.iter().take(2).enumerate().find_map(|(index, token)| {
        let keyword = token.to_ascii_uppercase();
        processor
            .data_directives()
            .iter()
            .find(|directive| directive.pattern().matches(&keyword, labels).is_some())
            .map(|directive| (index, keyword, directive))
    }) else {
        return false;
    };

    line.kind = LineKind::Data;
    if index > 0 {
        line.define_label(&tokens[0]);
    }
    if let Some(extra) = tokens.get(index + 2) {
        line.errors.push(LineErrorKind::UnexpectedToken(extra.clone()));
    }

    if processor.data_with_address() {
        line.size = processor.word_size();
        match processor.decode_data_address(&keyword) {
            Ok(address) => line.address = Some(address),
            Err(error) => line.errors.push(error.into()),
        }
        if let Some(text) = tokens.get(index + 1) {
            line.operand.clone_from(text);
            match directive.decode(text) {
                Ok(value) => line.value = value,
                Err(error) => line.errors.push(error.into()),
            }
        }
    } else {
        line.size = directive.size();
        line.mnemonic = keyword;
        match tokens.get(index + 1) {
            Some(text) => {
                line.operand.clone_from(text);
                match directive.decode(text) {
                    Ok(value) => line.value = value,
                    Err(error) => line.errors.push(error.into()),
                }
            }
            None => line.errors.push(LineErrorKind::OperandMissing(line.mnemonic.clone())),
        }
    }
    true
}

fn label(line: &mut ProgramLine, tokens: &[String], processor: &Processor) -> bool {
    let [token] = tokens else {
        return false;
    };
    let Some(name) = token.strip_suffix(':') else {
        return false;
    };
    if !processor.label_syntax().matches(name) {
        return false;
    }
    line.kind = LineKind::Label;
    line.label = Some(name.to_string());
    true
}
