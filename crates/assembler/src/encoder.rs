//! Label resolution and code emission.
//!
//! Resolution fills every label operand with its address (or, for relative
//! instructions, the displacement from the end of the instruction). Emission
//! writes the resolved lines into memory, opcode first, fields big-endian.

use sim_core::fixed::{fits_signed, to_be_bytes, to_unsigned};
use sim_core::Memory;
use tracing::trace;

use crate::errors::{LineErrorKind, LoadError};
use crate::parser::{LineKind, ProgramLine};
use crate::symbols::SymbolTable;

fn resolve_operand(
    symbols: &SymbolTable,
    line_address: i64,
    footprint: i64,
    is_offset: bool,
    label: &str,
    size: usize,
) -> Result<i64, LineErrorKind> {
    let target = symbols
        .get(label)
        .ok_or_else(|| LineErrorKind::UnknownLabel(label.to_string()))?
        .address;
    if is_offset {
        return line_address
            .checked_add(footprint)
            .and_then(|next| target.checked_sub(next))
            .filter(|&offset| fits_signed(offset, size))
            .ok_or_else(|| LineErrorKind::BranchOutOfRange(label.to_string()));
    }
    if to_unsigned(target, size) != target {
        return Err(LineErrorKind::LabelTooWide {
            label: label.to_string(),
            size,
        });
    }
    Ok(target)
}

fn placed(line: &ProgramLine) -> bool {
    !line
        .errors
        .iter()
        .any(|error| matches!(error, LineErrorKind::AddressOutOfRange { .. }))
}

/// Resolves every label operand of every addressed code line that fits in
/// memory.
///
/// Errors are recorded on the offending line; other lines are unaffected.
pub fn resolve_labels(lines: &mut [ProgramLine], symbols: &SymbolTable) {
    for line in lines
        .iter_mut()
        .filter(|line| line.kind == LineKind::Code && placed(line))
    {
        let Some(address) = line.address else {
            continue;
        };
        let footprint = i64::try_from(line.footprint()).unwrap_or(i64::MAX);
        let is_offset = line.is_offset;
        let mut errors = Vec::new();
        for operand in &mut line.operands {
            let Some(label) = &operand.label else {
                continue;
            };
            match resolve_operand(symbols, address, footprint, is_offset, label, operand.size) {
                Ok(value) => {
                    trace!(label = %label, value, line = line.number, "label resolved");
                    operand.value = value;
                }
                Err(error) => errors.push(error),
            }
        }
        line.errors.extend(errors);
    }
}

/// Machine bytes of one line: the value of a data line, or the opcode followed
/// by each operand for a code line. Other lines encode to nothing.
#[must_use]
pub fn encode_line(line: &ProgramLine) -> Vec<u8> {
    match (line.kind, line.opcode) {
        (LineKind::Data, _) => to_be_bytes(line.value, line.size),
        (LineKind::Code, Some(opcode)) => {
            let mut bytes = to_be_bytes(opcode, line.size);
            for operand in &line.operands {
                bytes.extend(to_be_bytes(operand.value, operand.size));
            }
            bytes
        }
        _ => Vec::new(),
    }
}

/// Writes every data and code line into `memory` and returns the entry point,
/// the address of the first code line.
///
/// # Errors
///
/// Returns [`LoadError::NoInstruction`] if there is no code line, before
/// anything is written, or [`LoadError::Memory`] if a line falls outside
/// `memory`.
pub fn emit(lines: &[ProgramLine], memory: &mut Memory) -> Result<i64, LoadError> {
    let entry = lines
        .iter()
        .find(|line| line.kind == LineKind::Code)
        .and_then(|line| line.address)
        .ok_or(LoadError::NoInstruction)?;

    for line in lines {
        let Some(address) = line.address else {
            continue;
        };
        match (line.kind, line.opcode) {
            (LineKind::Data, _) => memory.write(address, line.size, line.value)?,
            (LineKind::Code, Some(opcode)) => {
                memory.write(address, line.size, opcode)?;
                let mut at = address + i64::try_from(line.size).unwrap_or(i64::MAX);
                for operand in &line.operands {
                    memory.write(at, operand.size, operand.value)?;
                    at += i64::try_from(operand.size).unwrap_or(i64::MAX);
                }
            }
            _ => {}
        }
    }
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::classify;
    use crate::source::split_source;
    use crate::symbols::assign_addresses;
    use hardware::{edu1, mos6502};
    use sim_core::Processor;

    fn resolved(processor: &Processor, source: &str) -> Vec<ProgramLine> {
        let mut lines: Vec<ProgramLine> = split_source(source, processor.comment())
            .iter()
            .map(|line| classify(line, processor))
            .collect();
        let symbols = assign_addresses(&mut lines, 0x1_0000);
        resolve_labels(&mut lines, &symbols);
        lines
    }

    #[test]
    fn forward_and_backward_branches() {
        let processor = mos6502::build().unwrap();
        let lines = resolved(&processor, "ORG $0200\nback: NOP\nBNE back\nBEQ ahead\nNOP\nahead: END");
        // BNE at 0x201, next instruction at 0x203: 0x200 - 0x203.
        assert_eq!(lines[2].operands[0].value, -3);
        // BEQ at 0x203, next at 0x205, target 0x206.
        assert_eq!(lines[3].operands[0].value, 1);
        assert_eq!(encode_line(&lines[2]), [0xD0, 0xFD]);
        assert!(lines.iter().all(|line| line.errors.is_empty()));
    }

    #[test]
    fn branch_beyond_one_byte_is_out_of_range() {
        let processor = mos6502::build().unwrap();
        let source = "ORG $0200\nBNE far\nORG $0300\nfar: END";
        let lines = resolved(&processor, source);
        assert_eq!(lines[1].errors, [LineErrorKind::BranchOutOfRange("far".into())]);
    }

    #[test]
    fn branch_at_the_top_of_the_address_space_is_not_resolved() {
        let processor = mos6502::build().unwrap();
        let lines = resolved(&processor, "ORG $7FFFFFFFFFFFFFFF\nloop: BNE loop\nEND");
        assert!(matches!(lines[1].errors[..], [LineErrorKind::AddressOutOfRange { .. }]));
        assert_eq!(lines[1].operands[0].value, 0);
    }

    #[test]
    fn absolute_labels_take_the_address() {
        let processor = mos6502::build().unwrap();
        let lines = resolved(&processor, "ORG $0300\nJMP target\ntarget: END");
        assert_eq!(lines[1].operands[0].value, 0x0303);
        assert_eq!(encode_line(&lines[1]), [0x4C, 0x03, 0x03]);
    }

    #[test]
    fn label_must_fit_a_narrow_operand() {
        let processor = mos6502::build().unwrap();
        let lines = resolved(&processor, "ORG $0300\nptr: NOP\nLDA (ptr,X)\nEND");
        assert_eq!(
            lines[2].errors,
            [LineErrorKind::LabelTooWide {
                label: "ptr".into(),
                size: 1,
            }]
        );
    }

    #[test]
    fn unknown_label_is_isolated_to_its_line() {
        let processor = edu1::build().unwrap();
        let lines = resolved(&processor, "LDA nowhere\nJMP done\ndone: .END");
        assert_eq!(lines[0].errors, [LineErrorKind::UnknownLabel("nowhere".into())]);
        assert!(lines[1].errors.is_empty());
        assert_eq!(lines[1].operands[0].value, 4);
    }

    #[test]
    fn emission_writes_opcodes_operands_and_data() {
        let processor = edu1::build().unwrap();
        let lines = resolved(&processor, ".DATA\n20 -2\n.CODE 0\nLDA 20\n.END");
        let mut memory = Memory::new(32);
        assert_eq!(emit(&lines, &mut memory).unwrap(), 0);
        assert_eq!(&memory.bytes()[..3], [0x01, 20, 0xFF]);
        assert_eq!(memory.read(20, 1).unwrap(), -2);
    }

    #[test]
    fn emission_needs_a_code_line() {
        let processor = mos6502::build().unwrap();
        let lines = resolved(&processor, "BYTE $01");
        let mut memory = Memory::new(16);
        assert_eq!(emit(&lines, &mut memory), Err(LoadError::NoInstruction));
        assert!(memory.bytes().iter().all(|&byte| byte == 0));
    }
}
