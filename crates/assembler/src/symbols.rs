//! Symbol table and pass-2 address assignment.
//!
//! Walks the classified lines with a running cursor starting at 0, gives every
//! code and data line its address and binds labels as they are met.

use std::collections::HashMap;

use tracing::trace;

use crate::errors::LineErrorKind;
use crate::parser::{LineKind, ProgramLine};

/// A label with its assigned address and definition location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    /// The address assigned to this label.
    pub address: i64,
    /// Source line number where the label was defined.
    pub defined_at: usize,
}

/// Symbol table mapping label names to their definitions.
pub type SymbolTable = HashMap<String, Symbol>;

fn bind(symbols: &mut SymbolTable, line: &mut ProgramLine, address: i64) {
    let Some(name) = line.label.clone() else {
        return;
    };
    if let Some(first) = symbols.get(&name) {
        line.errors.push(LineErrorKind::DuplicateLabel {
            name,
            first_line: first.defined_at,
        });
        return;
    }
    trace!(label = %name, address, "label bound");
    symbols.insert(
        name,
        Symbol {
            address,
            defined_at: line.number,
        },
    );
}

fn in_range(address: i64, size: usize, memory_size: usize) -> bool {
    usize::try_from(address)
        .ok()
        .and_then(|start| start.checked_add(size))
        .is_some_and(|end| end <= memory_size)
}

fn advance(cursor: i64, size: usize) -> i64 {
    cursor.saturating_add(i64::try_from(size).unwrap_or(i64::MAX))
}

/// Assigns addresses to every line and collects the label definitions.
///
/// Directives carrying an origin move the cursor. Data lines with an explicit
/// address are placed there and the cursor follows them; other data and code
/// lines are placed at the cursor. Either way the cursor ends up just past the
/// line. Label lines take the cursor as their address. A line that does not
/// fit in `memory_size` bytes gets an [`LineErrorKind::AddressOutOfRange`]
/// error.
pub fn assign_addresses(lines: &mut [ProgramLine], memory_size: usize) -> SymbolTable {
    let mut symbols = SymbolTable::new();
    let mut cursor = 0_i64;

    for line in lines.iter_mut() {
        match line.kind {
            LineKind::Directive => {
                if let Some(origin) = line.address {
                    cursor = origin;
                }
            }
            LineKind::Label => {
                line.address = Some(cursor);
                bind(&mut symbols, line, cursor);
            }
            LineKind::Data | LineKind::Code => {
                let address = match (line.kind, line.address) {
                    (LineKind::Data, Some(address)) => address,
                    _ => cursor,
                };
                let size = line.footprint();
                line.address = Some(address);
                cursor = advance(address, size);
                bind(&mut symbols, line, address);
                if !in_range(address, size, memory_size) {
                    line.errors.push(LineErrorKind::AddressOutOfRange { address, size });
                }
            }
            LineKind::Unknown => {}
        }
    }
    symbols
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::classify;
    use crate::source::split_source;
    use hardware::{edu1, mos6502};
    use sim_core::Processor;

    fn assign(processor: &Processor, source: &str, memory_size: usize) -> (Vec<ProgramLine>, SymbolTable) {
        let mut lines: Vec<ProgramLine> = split_source(source, processor.comment())
            .iter()
            .map(|line| classify(line, processor))
            .collect();
        let symbols = assign_addresses(&mut lines, memory_size);
        (lines, symbols)
    }

    #[test]
    fn code_is_laid_out_back_to_back() {
        let processor = edu1::build().unwrap();
        let (lines, symbols) = assign(&processor, "LDA 10\nloop: DEC A\nJMP loop\n.END", 256);
        let addresses: Vec<_> = lines.iter().map(|line| line.address).collect();
        assert_eq!(addresses, [Some(0), Some(2), Some(4), Some(6)]);
        assert_eq!(symbols["loop"].address, 2);
        assert_eq!(symbols["loop"].defined_at, 2);
    }

    #[test]
    fn label_lines_bind_without_advancing() {
        let processor = mos6502::build().unwrap();
        let (lines, symbols) = assign(&processor, "ORG $0200\nstart:\nNOP\nend:\nEND", 0x1_0000);
        assert_eq!(symbols["start"].address, 0x0200);
        assert_eq!(symbols["end"].address, 0x0201);
        assert_eq!(lines[1].address, Some(0x0200));
        assert_eq!(lines[2].address, Some(0x0200));
        assert_eq!(lines[3].address, Some(0x0201));
    }

    #[test]
    fn code_sections_override_explicit_data_addresses() {
        let processor = edu1::build().unwrap();
        let (lines, symbols) = assign(&processor, ".DATA\ncount 100 7\n.CODE 0\nLDA count\n.END", 256);
        assert_eq!(symbols["count"].address, 100);
        assert_eq!(lines[1].address, Some(100));
        assert_eq!(lines[3].address, Some(0));
        assert_eq!(lines[4].address, Some(2));
    }

    #[test]
    fn code_after_explicit_data_continues_past_it() {
        let processor = edu1::build().unwrap();
        let (lines, _) = assign(&processor, "100 5\nLDA 100\n.END", 256);
        assert_eq!(lines[0].address, Some(100));
        assert_eq!(lines[1].address, Some(101));
        assert_eq!(lines[2].address, Some(103));

        let (lines, _) = assign(&processor, "0 5\nLDA 0\n.END", 256);
        assert_eq!(lines[1].address, Some(1));
    }

    #[test]
    fn data_keywords_follow_the_cursor() {
        let processor = mos6502::build().unwrap();
        let (lines, symbols) = assign(&processor, "ORG $10\nlow BYTE $01\nhigh WORD $0203\nEND", 0x1_0000);
        assert_eq!(symbols["low"].address, 0x10);
        assert_eq!(symbols["high"].address, 0x11);
        assert_eq!(lines[3].address, Some(0x13));
    }

    #[test]
    fn duplicate_label_points_at_first_definition() {
        let processor = edu1::build().unwrap();
        let (lines, symbols) = assign(&processor, "here:\nLDA 1\nhere:\n.END", 256);
        assert_eq!(symbols["here"].address, 0);
        assert_eq!(
            lines[2].errors,
            [LineErrorKind::DuplicateLabel {
                name: "here".into(),
                first_line: 1,
            }]
        );
    }

    #[test]
    fn lines_past_the_end_of_memory() {
        let processor = edu1::build().unwrap();
        let (lines, _) = assign(&processor, ".CODE 15\nLDA 1\n.END", 16);
        assert_eq!(lines[1].errors, [LineErrorKind::AddressOutOfRange { address: 15, size: 2 }]);
        assert_eq!(lines[2].errors, [LineErrorKind::AddressOutOfRange { address: 17, size: 1 }]);
    }
}
