//! Plain-text renderings of a program and a board, as printed by `boardsim`.

use std::fmt::Write as _;

use sim_core::fixed::{to_decimal, to_hex};
use sim_core::NumberFormat;

use crate::assembler::Program;
use crate::board::Board;

/// One row per line: address, bytes, line number and source text.
///
/// ```text
/// 0200: A9 81        2  LDA #$81
/// ```
#[must_use]
pub fn listing(program: &Program, address_size: usize) -> String {
    let mut text = String::new();
    for entry in program.listing() {
        let address = entry
            .address
            .map_or_else(|| " ".repeat(2 * address_size), |address| to_hex(address, address_size));
        let bytes = entry
            .bytes
            .iter()
            .map(|byte| format!("{byte:02X}"))
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(text, "{address}: {bytes:<12} {:>3}  {}", entry.line, entry.text.trim());
    }
    text
}

/// Registers, indicators and the rendering of every device.
///
/// ```text
/// PC   0203
/// A    81 -127
/// C=0 Z=0 N=1
/// Led display: *......* @16 x81 -127
/// ```
#[must_use]
pub fn board_state(board: &Board) -> String {
    let mut text = String::new();
    let cpu = board.processor().cpu();
    for register in cpu.registers() {
        let _ = write!(text, "{:<4} {}", register.name(), to_hex(register.value(), register.size()));
        if register.format() == NumberFormat::Signed {
            let _ = write!(text, " {}", to_decimal(register.value(), register.size()));
        }
        text.push('\n');
    }

    let flags: Vec<String> = cpu
        .indicators()
        .iter()
        .map(|indicator| format!("{}={}", indicator.name(), u8::from(indicator.value())))
        .collect();
    if !flags.is_empty() {
        text.push_str(&flags.join(" "));
        text.push('\n');
    }

    for device in board.devices() {
        let _ = writeln!(text, "{}: {}", device.name(), device.render());
    }
    text
}
