//! `edu1`: a teaching processor with two one-byte accumulators.
//!
//! | Opcode | Mnemonic | Operand     | Effect                     |
//! |--------|----------|-------------|----------------------------|
//! | `01`   | `LDA`    | address     | `A <- mem[address]`        |
//! | `02`   | `LDB`    | address     | `B <- mem[address]`        |
//! | `03`   | `STA`    | address     | `mem[address] <- A`        |
//! | `04`   | `STB`    | address     | `mem[address] <- B`        |
//! | `05`   | `ADD`    | `A` or `B`  | `reg <- A + B`             |
//! | `06`   | `DEC`    | `A` or `B`  | `reg <- reg - 1`           |
//! | `07`   | `MOVA`   | `#n`        | `A <- n`                   |
//! | `08`   | `MOVB`   | `#n`        | `B <- n`                   |
//! | `09`   | `JMP`    | address     | `PC <- address`            |
//! | `0A`   | `JMPZ`   | address     | `PC <- address` if `A = 0` |
//! | `FF`   | `.END`   |             | end of program             |
//!
//! Data lines are written `ADDRESS [VALUE]`. `.DATA` opens a data section and
//! `.CODE n` moves the assembly cursor to `n`.

use sim_core::fixed::to_unsigned;
use sim_core::{
    Alternative, ConfigError, ExecError, IndicatorKind, LabelSyntax, Machine, NumberFormat, NumberSyntax,
    Operand, OperandPattern, Processor, ProcessorBuilder, RegisterId, RegisterKind, StatusUpdate,
    SyntaxError,
};

use crate::numbers::decimal;

/// Registered architecture name.
pub const NAME: &str = "edu1";

const WORD: usize = 1;

fn register_operand(text: &str) -> Result<i64, SyntaxError> {
    match text {
        "A" => Ok(0),
        "B" => Ok(1),
        _ => Err(SyntaxError::InvalidRegister(text.to_string())),
    }
}

#[derive(Debug, Clone, Copy)]
struct Edu1 {
    pc: RegisterId,
    a: RegisterId,
    b: RegisterId,
}

impl Edu1 {
    const fn target(self, operand: &Operand) -> RegisterId {
        if operand.value == 0 {
            self.a
        } else {
            self.b
        }
    }

    fn load(register: RegisterId, mnemonic: &'static str) -> impl Fn(&mut Machine<'_>, &[Operand]) -> Result<(), ExecError> {
        move |machine, operands| {
            let address = to_unsigned(Operand::first(operands, mnemonic)?.value, WORD);
            let value = machine.memory.read(address, WORD)?;
            machine.cpu.set_register(register, value);
            Ok(())
        }
    }

    fn store(register: RegisterId, mnemonic: &'static str) -> impl Fn(&mut Machine<'_>, &[Operand]) -> Result<(), ExecError> {
        move |machine, operands| {
            let address = to_unsigned(Operand::first(operands, mnemonic)?.value, WORD);
            let value = machine.cpu.register(register);
            machine.memory.write(address, WORD, value)?;
            Ok(())
        }
    }

    fn move_immediate(register: RegisterId, mnemonic: &'static str) -> impl Fn(&mut Machine<'_>, &[Operand]) -> Result<(), ExecError> {
        move |machine, operands| {
            let value = Operand::first(operands, mnemonic)?.value;
            machine.cpu.set_register(register, value);
            Ok(())
        }
    }

    fn jump(self, machine: &mut Machine<'_>, operands: &[Operand], mnemonic: &str) -> Result<(), ExecError> {
        let target = Operand::first(operands, mnemonic)?.value;
        machine.cpu.set_register(self.pc, to_unsigned(target, WORD));
        Ok(())
    }
}

/// Builds a fresh `edu1` processor.
///
/// # Errors
///
/// Only fails if the tables are inconsistent, which would be a bug here.
pub fn build() -> Result<Processor, ConfigError> {
    let mut builder = ProcessorBuilder::new(NAME);
    let pc = builder.register("PC", "Program Counter", RegisterKind::ProgramCounter, NumberFormat::Unsigned, WORD, StatusUpdate::Manual);
    let a = builder.register("A", "A Register", RegisterKind::Accumulator, NumberFormat::Signed, WORD, StatusUpdate::Auto);
    let b = builder.register("B", "B Register", RegisterKind::Accumulator, NumberFormat::Signed, WORD, StatusUpdate::Manual);
    builder.indicator("Z", "Zero", IndicatorKind::Zero);
    let cpu = Edu1 { pc, a, b };

    // Register names come first so `A` and `B` never read as labels.
    let register = builder.addressing_mode(
        "reg",
        OperandPattern::single(Alternative::new().choice(["A", "B"])),
        1,
        register_operand,
    );
    let absolute = builder.addressing_mode(
        "absolute",
        OperandPattern::single(Alternative::new().number(NumberSyntax::decimal())).or(Alternative::new().label()),
        WORD,
        decimal,
    );
    let immediate = builder.addressing_mode(
        "immediate",
        OperandPattern::single(Alternative::new().literal("#").number(NumberSyntax::decimal().signed())),
        WORD,
        decimal,
    );

    builder.instruction(0x01, "LDA", Some(absolute), Edu1::load(a, "LDA"));
    builder.instruction(0x02, "LDB", Some(absolute), Edu1::load(b, "LDB"));
    builder.instruction(0x03, "STA", Some(absolute), Edu1::store(a, "STA"));
    builder.instruction(0x04, "STB", Some(absolute), Edu1::store(b, "STB"));
    builder.instruction(0x05, "ADD", Some(register), move |machine, operands| {
        let target = cpu.target(Operand::first(operands, "ADD")?);
        let sum = machine.cpu.register(cpu.a) + machine.cpu.register(cpu.b);
        machine.cpu.set_register(target, sum);
        Ok(())
    });
    builder.instruction(0x06, "DEC", Some(register), move |machine, operands| {
        let target = cpu.target(Operand::first(operands, "DEC")?);
        let value = machine.cpu.register(target) - 1;
        machine.cpu.set_register(target, value);
        Ok(())
    });
    builder.instruction(0x07, "MOVA", Some(immediate), Edu1::move_immediate(a, "MOVA"));
    builder.instruction(0x08, "MOVB", Some(immediate), Edu1::move_immediate(b, "MOVB"));
    builder.instruction(0x09, "JMP", Some(absolute), move |machine, operands| {
        cpu.jump(machine, operands, "JMP")
    });
    builder.instruction(0x0A, "JMPZ", Some(absolute), move |machine, operands| {
        if machine.cpu.register(cpu.a) == 0 {
            cpu.jump(machine, operands, "JMPZ")?;
        }
        Ok(())
    });
    builder.instruction(0xFF, ".END", None, |machine, _| {
        machine.cpu.set_end(true);
        Ok(())
    });

    builder
        .data(OperandPattern::single(Alternative::new().number(NumberSyntax::decimal())), WORD, decimal)
        .label_syntax(LabelSyntax::default())
        .section(".DATA", true, None)
        .section(".CODE", false, Some(decimal))
        .data_with_address(decimal)
        .sizes(WORD, WORD, 1)
        .comment(";");
    builder.build()
}
