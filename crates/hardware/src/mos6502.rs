//! MOS 6502 subset.
//!
//! Covers the documented instruction set minus decimal mode, plus an `END`
//! pseudo-instruction (`FF`) that stops the program. Memory is big-endian like
//! the rest of the simulator, so 16-bit pointers are stored high byte first.
//! The stack grows down from `$01FF`.

use sim_core::fixed::{ones_complement, to_signed, to_unsigned};
use sim_core::{
    AddressingModeId, Alternative, ConfigError, ExecError, IndicatorId, IndicatorKind, LabelSyntax, Machine,
    NumberFormat, NumberSyntax, Operand, OperandPattern, Processor, ProcessorBuilder, RegisterId, RegisterKind,
    StatusUpdate, SyntaxError,
};

use crate::numbers::dollar_hex;

/// Registered architecture name.
pub const NAME: &str = "6502";

/// Stack pointer value after reset.
pub const STACK_TOP: i64 = 0x01FF;

const WORD: usize = 1;
const ADDRESS: usize = 2;

#[allow(clippy::unnecessary_wraps)]
const fn accumulator_operand(_: &str) -> Result<i64, SyntaxError> {
    Ok(0)
}

/// Addressing modes, by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    Indirect,
    IndirectX,
    IndirectY,
}

/// Instruction behaviors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Adc,
    And,
    Asl,
    Bit,
    Branch(IndicatorKind, bool),
    Brk,
    Compare(Reg),
    Dec,
    Eor,
    SetFlag(IndicatorKind, bool),
    Sed,
    Inc,
    Jmp,
    Jsr,
    Load(Reg),
    Lsr,
    Nop,
    Ora,
    Transfer(Reg, Reg),
    Step(Reg, i64),
    Rol,
    Ror,
    Rti,
    Rts,
    Sbc,
    Store(Reg),
    Txs,
    Tsx,
    Pha,
    Pla,
    Php,
    Plp,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reg {
    A,
    X,
    Y,
}

#[rustfmt::skip]
const OPCODES: &[(i64, &str, Mode, Op)] = &[
    (0x69, "ADC", Mode::Immediate, Op::Adc),
    (0x65, "ADC", Mode::ZeroPage, Op::Adc),
    (0x75, "ADC", Mode::ZeroPageX, Op::Adc),
    (0x6D, "ADC", Mode::Absolute, Op::Adc),
    (0x7D, "ADC", Mode::AbsoluteX, Op::Adc),
    (0x79, "ADC", Mode::AbsoluteY, Op::Adc),
    (0x61, "ADC", Mode::IndirectX, Op::Adc),
    (0x71, "ADC", Mode::IndirectY, Op::Adc),

    (0x29, "AND", Mode::Immediate, Op::And),
    (0x25, "AND", Mode::ZeroPage, Op::And),
    (0x35, "AND", Mode::ZeroPageX, Op::And),
    (0x2D, "AND", Mode::Absolute, Op::And),
    (0x3D, "AND", Mode::AbsoluteX, Op::And),
    (0x39, "AND", Mode::AbsoluteY, Op::And),
    (0x21, "AND", Mode::IndirectX, Op::And),
    (0x31, "AND", Mode::IndirectY, Op::And),

    (0x0A, "ASL", Mode::Accumulator, Op::Asl),
    (0x06, "ASL", Mode::ZeroPage, Op::Asl),
    (0x16, "ASL", Mode::ZeroPageX, Op::Asl),
    (0x0E, "ASL", Mode::Absolute, Op::Asl),
    (0x1E, "ASL", Mode::AbsoluteX, Op::Asl),

    (0x24, "BIT", Mode::ZeroPage, Op::Bit),
    (0x2C, "BIT", Mode::Absolute, Op::Bit),

    (0x10, "BPL", Mode::ZeroPage, Op::Branch(IndicatorKind::Negative, false)),
    (0x30, "BMI", Mode::ZeroPage, Op::Branch(IndicatorKind::Negative, true)),
    (0x50, "BVC", Mode::ZeroPage, Op::Branch(IndicatorKind::Overflow, false)),
    (0x70, "BVS", Mode::ZeroPage, Op::Branch(IndicatorKind::Overflow, true)),
    (0x90, "BCC", Mode::ZeroPage, Op::Branch(IndicatorKind::Carry, false)),
    (0xB0, "BCS", Mode::ZeroPage, Op::Branch(IndicatorKind::Carry, true)),
    (0xD0, "BNE", Mode::ZeroPage, Op::Branch(IndicatorKind::Zero, false)),
    (0xF0, "BEQ", Mode::ZeroPage, Op::Branch(IndicatorKind::Zero, true)),

    (0x00, "BRK", Mode::Implied, Op::Brk),

    (0xC9, "CMP", Mode::Immediate, Op::Compare(Reg::A)),
    (0xC5, "CMP", Mode::ZeroPage, Op::Compare(Reg::A)),
    (0xD5, "CMP", Mode::ZeroPageX, Op::Compare(Reg::A)),
    (0xCD, "CMP", Mode::Absolute, Op::Compare(Reg::A)),
    (0xDD, "CMP", Mode::AbsoluteX, Op::Compare(Reg::A)),
    (0xD9, "CMP", Mode::AbsoluteY, Op::Compare(Reg::A)),
    (0xC1, "CMP", Mode::IndirectX, Op::Compare(Reg::A)),
    (0xD1, "CMP", Mode::IndirectY, Op::Compare(Reg::A)),
    (0xE0, "CPX", Mode::Immediate, Op::Compare(Reg::X)),
    (0xE4, "CPX", Mode::ZeroPage, Op::Compare(Reg::X)),
    (0xEC, "CPX", Mode::Absolute, Op::Compare(Reg::X)),
    (0xC0, "CPY", Mode::Immediate, Op::Compare(Reg::Y)),
    (0xC4, "CPY", Mode::ZeroPage, Op::Compare(Reg::Y)),
    (0xCC, "CPY", Mode::Absolute, Op::Compare(Reg::Y)),

    (0xC6, "DEC", Mode::ZeroPage, Op::Dec),
    (0xD6, "DEC", Mode::ZeroPageX, Op::Dec),
    (0xCE, "DEC", Mode::Absolute, Op::Dec),
    (0xDE, "DEC", Mode::AbsoluteX, Op::Dec),

    (0x49, "EOR", Mode::Immediate, Op::Eor),
    (0x45, "EOR", Mode::ZeroPage, Op::Eor),
    (0x55, "EOR", Mode::ZeroPageX, Op::Eor),
    (0x4D, "EOR", Mode::Absolute, Op::Eor),
    (0x5D, "EOR", Mode::AbsoluteX, Op::Eor),
    (0x59, "EOR", Mode::AbsoluteY, Op::Eor),
    (0x41, "EOR", Mode::IndirectX, Op::Eor),
    (0x51, "EOR", Mode::IndirectY, Op::Eor),

    (0x18, "CLC", Mode::Implied, Op::SetFlag(IndicatorKind::Carry, false)),
    (0x38, "SEC", Mode::Implied, Op::SetFlag(IndicatorKind::Carry, true)),
    (0x58, "CLI", Mode::Implied, Op::SetFlag(IndicatorKind::InterruptDisable, false)),
    (0x78, "SEI", Mode::Implied, Op::SetFlag(IndicatorKind::InterruptDisable, true)),
    (0xB8, "CLV", Mode::Implied, Op::SetFlag(IndicatorKind::Overflow, false)),
    (0xD8, "CLD", Mode::Implied, Op::SetFlag(IndicatorKind::Decimal, false)),
    (0xF8, "SED", Mode::Implied, Op::Sed),

    (0xE6, "INC", Mode::ZeroPage, Op::Inc),
    (0xF6, "INC", Mode::ZeroPageX, Op::Inc),
    (0xEE, "INC", Mode::Absolute, Op::Inc),
    (0xFE, "INC", Mode::AbsoluteX, Op::Inc),

    (0x4C, "JMP", Mode::Absolute, Op::Jmp),
    (0x6C, "JMP", Mode::Indirect, Op::Jmp),
    (0x20, "JSR", Mode::Absolute, Op::Jsr),

    (0xA9, "LDA", Mode::Immediate, Op::Load(Reg::A)),
    (0xA5, "LDA", Mode::ZeroPage, Op::Load(Reg::A)),
    (0xB5, "LDA", Mode::ZeroPageX, Op::Load(Reg::A)),
    (0xAD, "LDA", Mode::Absolute, Op::Load(Reg::A)),
    (0xBD, "LDA", Mode::AbsoluteX, Op::Load(Reg::A)),
    (0xB9, "LDA", Mode::AbsoluteY, Op::Load(Reg::A)),
    (0xA1, "LDA", Mode::IndirectX, Op::Load(Reg::A)),
    (0xB1, "LDA", Mode::IndirectY, Op::Load(Reg::A)),
    (0xA2, "LDX", Mode::Immediate, Op::Load(Reg::X)),
    (0xA6, "LDX", Mode::ZeroPage, Op::Load(Reg::X)),
    (0xB6, "LDX", Mode::ZeroPageY, Op::Load(Reg::X)),
    (0xAE, "LDX", Mode::Absolute, Op::Load(Reg::X)),
    (0xBE, "LDX", Mode::AbsoluteY, Op::Load(Reg::X)),
    (0xA0, "LDY", Mode::Immediate, Op::Load(Reg::Y)),
    (0xA4, "LDY", Mode::ZeroPage, Op::Load(Reg::Y)),
    (0xB4, "LDY", Mode::ZeroPageX, Op::Load(Reg::Y)),
    (0xAC, "LDY", Mode::Absolute, Op::Load(Reg::Y)),
    (0xBC, "LDY", Mode::AbsoluteX, Op::Load(Reg::Y)),

    (0x4A, "LSR", Mode::Accumulator, Op::Lsr),
    (0x46, "LSR", Mode::ZeroPage, Op::Lsr),
    (0x56, "LSR", Mode::ZeroPageX, Op::Lsr),
    (0x4E, "LSR", Mode::Absolute, Op::Lsr),
    (0x5E, "LSR", Mode::AbsoluteX, Op::Lsr),

    (0xEA, "NOP", Mode::Implied, Op::Nop),

    (0x09, "ORA", Mode::Immediate, Op::Ora),
    (0x05, "ORA", Mode::ZeroPage, Op::Ora),
    (0x15, "ORA", Mode::ZeroPageX, Op::Ora),
    (0x0D, "ORA", Mode::Absolute, Op::Ora),
    (0x1D, "ORA", Mode::AbsoluteX, Op::Ora),
    (0x19, "ORA", Mode::AbsoluteY, Op::Ora),
    (0x01, "ORA", Mode::IndirectX, Op::Ora),
    (0x11, "ORA", Mode::IndirectY, Op::Ora),

    (0xAA, "TAX", Mode::Implied, Op::Transfer(Reg::A, Reg::X)),
    (0x8A, "TXA", Mode::Implied, Op::Transfer(Reg::X, Reg::A)),
    (0xA8, "TAY", Mode::Implied, Op::Transfer(Reg::A, Reg::Y)),
    (0x98, "TYA", Mode::Implied, Op::Transfer(Reg::Y, Reg::A)),
    (0xCA, "DEX", Mode::Implied, Op::Step(Reg::X, -1)),
    (0xE8, "INX", Mode::Implied, Op::Step(Reg::X, 1)),
    (0x88, "DEY", Mode::Implied, Op::Step(Reg::Y, -1)),
    (0xC8, "INY", Mode::Implied, Op::Step(Reg::Y, 1)),

    (0x2A, "ROL", Mode::Accumulator, Op::Rol),
    (0x26, "ROL", Mode::ZeroPage, Op::Rol),
    (0x36, "ROL", Mode::ZeroPageX, Op::Rol),
    (0x2E, "ROL", Mode::Absolute, Op::Rol),
    (0x3E, "ROL", Mode::AbsoluteX, Op::Rol),
    (0x6A, "ROR", Mode::Accumulator, Op::Ror),
    (0x66, "ROR", Mode::ZeroPage, Op::Ror),
    (0x76, "ROR", Mode::ZeroPageX, Op::Ror),
    (0x6E, "ROR", Mode::Absolute, Op::Ror),
    (0x7E, "ROR", Mode::AbsoluteX, Op::Ror),

    (0x40, "RTI", Mode::Implied, Op::Rti),
    (0x60, "RTS", Mode::Implied, Op::Rts),

    (0xE9, "SBC", Mode::Immediate, Op::Sbc),
    (0xE5, "SBC", Mode::ZeroPage, Op::Sbc),
    (0xF5, "SBC", Mode::ZeroPageX, Op::Sbc),
    (0xED, "SBC", Mode::Absolute, Op::Sbc),
    (0xFD, "SBC", Mode::AbsoluteX, Op::Sbc),
    (0xF9, "SBC", Mode::AbsoluteY, Op::Sbc),
    (0xE1, "SBC", Mode::IndirectX, Op::Sbc),
    (0xF1, "SBC", Mode::IndirectY, Op::Sbc),

    (0x85, "STA", Mode::ZeroPage, Op::Store(Reg::A)),
    (0x95, "STA", Mode::ZeroPageX, Op::Store(Reg::A)),
    (0x8D, "STA", Mode::Absolute, Op::Store(Reg::A)),
    (0x9D, "STA", Mode::AbsoluteX, Op::Store(Reg::A)),
    (0x99, "STA", Mode::AbsoluteY, Op::Store(Reg::A)),
    (0x81, "STA", Mode::IndirectX, Op::Store(Reg::A)),
    (0x91, "STA", Mode::IndirectY, Op::Store(Reg::A)),
    (0x86, "STX", Mode::ZeroPage, Op::Store(Reg::X)),
    (0x96, "STX", Mode::ZeroPageY, Op::Store(Reg::X)),
    (0x8E, "STX", Mode::Absolute, Op::Store(Reg::X)),
    (0x84, "STY", Mode::ZeroPage, Op::Store(Reg::Y)),
    (0x94, "STY", Mode::ZeroPageX, Op::Store(Reg::Y)),
    (0x8C, "STY", Mode::Absolute, Op::Store(Reg::Y)),

    (0x9A, "TXS", Mode::Implied, Op::Txs),
    (0xBA, "TSX", Mode::Implied, Op::Tsx),
    (0x48, "PHA", Mode::Implied, Op::Pha),
    (0x68, "PLA", Mode::Implied, Op::Pla),
    (0x08, "PHP", Mode::Implied, Op::Php),
    (0x28, "PLP", Mode::Implied, Op::Plp),

    (0xFF, "END", Mode::Implied, Op::End),
];

#[derive(Debug, Clone, Copy)]
struct Modes {
    accumulator: AddressingModeId,
    immediate: AddressingModeId,
    zero_page: AddressingModeId,
    zero_page_x: AddressingModeId,
    zero_page_y: AddressingModeId,
    absolute: AddressingModeId,
    absolute_x: AddressingModeId,
    absolute_y: AddressingModeId,
    indirect: AddressingModeId,
    indirect_x: AddressingModeId,
    indirect_y: AddressingModeId,
}

impl Modes {
    const fn id(&self, mode: Mode) -> Option<AddressingModeId> {
        Some(match mode {
            Mode::Implied => return None,
            Mode::Accumulator => self.accumulator,
            Mode::Immediate => self.immediate,
            Mode::ZeroPage => self.zero_page,
            Mode::ZeroPageX => self.zero_page_x,
            Mode::ZeroPageY => self.zero_page_y,
            Mode::Absolute => self.absolute,
            Mode::AbsoluteX => self.absolute_x,
            Mode::AbsoluteY => self.absolute_y,
            Mode::Indirect => self.indirect,
            Mode::IndirectX => self.indirect_x,
            Mode::IndirectY => self.indirect_y,
        })
    }

    fn role(&self, id: AddressingModeId) -> Mode {
        [
            Mode::Accumulator,
            Mode::Immediate,
            Mode::ZeroPage,
            Mode::ZeroPageX,
            Mode::ZeroPageY,
            Mode::Absolute,
            Mode::AbsoluteX,
            Mode::AbsoluteY,
            Mode::Indirect,
            Mode::IndirectX,
            Mode::IndirectY,
        ]
        .into_iter()
        .find(|&mode| self.id(mode) == Some(id))
        .unwrap_or(Mode::Implied)
    }
}

#[derive(Debug, Clone, Copy)]
struct Mos6502 {
    pc: RegisterId,
    sp: RegisterId,
    a: RegisterId,
    x: RegisterId,
    y: RegisterId,
    psr: RegisterId,
    decimal: IndicatorId,
    modes: Modes,
}

impl Mos6502 {
    const fn reg(&self, reg: Reg) -> RegisterId {
        match reg {
            Reg::A => self.a,
            Reg::X => self.x,
            Reg::Y => self.y,
        }
    }

    fn index(machine: &Machine<'_>, register: RegisterId) -> i64 {
        to_unsigned(machine.cpu.register(register), WORD)
    }

    /// Effective address of a memory operand.
    fn address(&self, machine: &Machine<'_>, operand: &Operand) -> Result<i64, ExecError> {
        let base = to_unsigned(operand.value, operand.size);
        let address = match self.modes.role(operand.mode) {
            Mode::ZeroPage | Mode::Absolute => base,
            Mode::ZeroPageX | Mode::AbsoluteX => base + Self::index(machine, self.x),
            Mode::ZeroPageY | Mode::AbsoluteY => base + Self::index(machine, self.y),
            Mode::Indirect => machine.memory.read_unsigned(base, ADDRESS)?,
            Mode::IndirectX => {
                let pointer = to_unsigned(base + Self::index(machine, self.x), WORD);
                machine.memory.read_unsigned(pointer, ADDRESS)?
            }
            Mode::IndirectY => machine.memory.read_unsigned(base, ADDRESS)? + Self::index(machine, self.y),
            mode => return Err(ExecError::Unimplemented(format!("{mode:?} effective address"))),
        };
        Ok(to_unsigned(address, ADDRESS))
    }

    fn read(&self, machine: &Machine<'_>, operand: &Operand) -> Result<i64, ExecError> {
        match self.modes.role(operand.mode) {
            Mode::Accumulator => Ok(machine.cpu.register(self.a)),
            Mode::Immediate => Ok(to_signed(operand.value, operand.size)),
            _ => Ok(machine.memory.read(self.address(machine, operand)?, WORD)?),
        }
    }

    fn write(&self, machine: &mut Machine<'_>, operand: &Operand, value: i64) -> Result<(), ExecError> {
        if self.modes.role(operand.mode) == Mode::Accumulator {
            machine.cpu.set_register(self.a, value);
            return Ok(());
        }
        let address = self.address(machine, operand)?;
        machine.memory.write(address, WORD, value)?;
        Ok(())
    }

    /// Writes a read-modify-write result and refreshes zero and negative.
    fn write_result(&self, machine: &mut Machine<'_>, operand: &Operand, value: i64) -> Result<(), ExecError> {
        let value = to_signed(value, WORD);
        self.write(machine, operand, value)?;
        machine.cpu.set_zero(value);
        machine.cpu.set_negative(value);
        Ok(())
    }

    fn push(&self, machine: &mut Machine<'_>, value: i64) -> Result<(), ExecError> {
        let sp = machine.cpu.register(self.sp);
        machine.memory.write(sp, WORD, value)?;
        machine.cpu.set_register(self.sp, sp - 1);
        Ok(())
    }

    fn pull(&self, machine: &mut Machine<'_>) -> Result<i64, ExecError> {
        let sp = machine.cpu.register(self.sp) + 1;
        machine.cpu.set_register(self.sp, sp);
        Ok(machine.memory.read_unsigned(sp, WORD)?)
    }

    fn pull_address(&self, machine: &mut Machine<'_>) -> Result<i64, ExecError> {
        let low = self.pull(machine)?;
        let high = self.pull(machine)?;
        Ok((high << 8) | low)
    }

    fn add_with_carry(&self, machine: &mut Machine<'_>, value: i64) {
        let a = to_unsigned(machine.cpu.register(self.a), WORD);
        let value = to_unsigned(value, WORD);
        let result = a + value + i64::from(machine.cpu.flag(IndicatorKind::Carry));
        machine.cpu.set_carry(result > 0xFF);
        machine.cpu.set_overflow((a ^ result) & (value ^ result) & 0x80 != 0);
        machine.cpu.set_register(self.a, result);
    }

    fn compare(machine: &mut Machine<'_>, register: i64, value: i64) {
        let register = to_unsigned(register, WORD);
        let value = to_unsigned(value, WORD);
        machine.cpu.set_flag(IndicatorKind::Zero, register == value);
        machine.cpu.set_carry(register >= value);
        machine.cpu.set_negative(to_signed(register - value, WORD));
    }

    #[allow(clippy::too_many_lines)]
    fn execute(self, op: Op, mnemonic: &str, machine: &mut Machine<'_>, operands: &[Operand]) -> Result<(), ExecError> {
        let operand = || Operand::first(operands, mnemonic);
        match op {
            Op::Adc => {
                let value = self.read(machine, operand()?)?;
                self.add_with_carry(machine, value);
            }
            Op::Sbc => {
                let value = self.read(machine, operand()?)?;
                self.add_with_carry(machine, ones_complement(value, WORD));
            }
            Op::And | Op::Ora | Op::Eor => {
                let value = self.read(machine, operand()?)?;
                let a = machine.cpu.register(self.a);
                let result = match op {
                    Op::And => a & value,
                    Op::Ora => a | value,
                    _ => a ^ value,
                };
                machine.cpu.set_register(self.a, result);
            }
            Op::Asl => {
                let operand = operand()?;
                let value = to_unsigned(self.read(machine, operand)?, WORD);
                machine.cpu.set_carry(value & 0x80 != 0);
                self.write_result(machine, operand, value << 1)?;
            }
            Op::Lsr => {
                let operand = operand()?;
                let value = to_unsigned(self.read(machine, operand)?, WORD);
                machine.cpu.set_carry(value & 0x01 != 0);
                self.write_result(machine, operand, value >> 1)?;
            }
            Op::Rol => {
                let operand = operand()?;
                let value = to_unsigned(self.read(machine, operand)?, WORD);
                let carry_in = i64::from(machine.cpu.flag(IndicatorKind::Carry));
                machine.cpu.set_carry(value & 0x80 != 0);
                self.write_result(machine, operand, (value << 1) | carry_in)?;
            }
            Op::Ror => {
                let operand = operand()?;
                let value = to_unsigned(self.read(machine, operand)?, WORD);
                let carry_in = i64::from(machine.cpu.flag(IndicatorKind::Carry));
                machine.cpu.set_carry(value & 0x01 != 0);
                self.write_result(machine, operand, (value >> 1) | (carry_in << 7))?;
            }
            Op::Bit => {
                let value = to_unsigned(self.read(machine, operand()?)?, WORD);
                let a = to_unsigned(machine.cpu.register(self.a), WORD);
                machine.cpu.set_flag(IndicatorKind::Zero, a & value == 0);
                machine.cpu.set_flag(IndicatorKind::Negative, value & 0x80 != 0);
                machine.cpu.set_overflow(value & 0x40 != 0);
            }
            Op::Branch(kind, expected) => {
                let offset = operand()?;
                if machine.cpu.flag(kind) == expected {
                    let pc = machine.cpu.register(self.pc);
                    machine
                        .cpu
                        .set_register(self.pc, pc + to_signed(offset.value, offset.size));
                }
            }
            Op::Brk => return Err(ExecError::Halted("BRK called".to_string())),
            Op::Compare(reg) => {
                let value = self.read(machine, operand()?)?;
                let register = machine.cpu.register(self.reg(reg));
                Self::compare(machine, register, value);
            }
            Op::Dec | Op::Inc => {
                let operand = operand()?;
                let value = self.read(machine, operand)?;
                let delta = if op == Op::Inc { 1 } else { -1 };
                self.write_result(machine, operand, value + delta)?;
            }
            Op::SetFlag(kind, value) => machine.cpu.set_flag(kind, value),
            Op::Sed => {
                machine.cpu.set_indicator(self.decimal, true);
                return Err(ExecError::Unimplemented("decimal mode".to_string()));
            }
            Op::Jmp => {
                let target = self.address(machine, operand()?)?;
                machine.cpu.set_register(self.pc, target);
            }
            Op::Jsr => {
                let target = self.address(machine, operand()?)?;
                let link = machine.cpu.register(self.pc) - 1;
                self.push(machine, (link >> 8) & 0xFF)?;
                self.push(machine, link & 0xFF)?;
                machine.cpu.set_register(self.pc, target);
            }
            Op::Rts => {
                let link = self.pull_address(machine)?;
                machine.cpu.set_register(self.pc, link + 1);
            }
            Op::Rti => {
                let status = self.pull(machine)?;
                machine.cpu.set_register(self.psr, status);
                let resume = self.pull_address(machine)?;
                machine.cpu.set_register(self.pc, resume);
            }
            Op::Load(reg) => {
                let value = self.read(machine, operand()?)?;
                machine.cpu.set_register(self.reg(reg), value);
            }
            Op::Store(reg) => {
                let value = machine.cpu.register(self.reg(reg));
                self.write(machine, operand()?, value)?;
            }
            Op::Transfer(from, to) => {
                let value = machine.cpu.register(self.reg(from));
                machine.cpu.set_register(self.reg(to), value);
            }
            Op::Step(reg, delta) => {
                let register = self.reg(reg);
                let value = machine.cpu.register(register) + delta;
                machine.cpu.set_register(register, value);
            }
            Op::Txs => {
                let x = Self::index(machine, self.x);
                machine.cpu.set_register(self.sp, 0x0100 | x);
            }
            Op::Tsx => {
                let sp = machine.cpu.register(self.sp);
                machine.cpu.set_register(self.x, sp);
            }
            Op::Pha => {
                let a = machine.cpu.register(self.a);
                self.push(machine, a)?;
            }
            Op::Pla => {
                let value = self.pull(machine)?;
                machine.cpu.set_register(self.a, value);
            }
            Op::Php => {
                let status = machine.cpu.register(self.psr);
                self.push(machine, status)?;
            }
            Op::Plp => {
                let status = self.pull(machine)?;
                machine.cpu.set_register(self.psr, status);
            }
            Op::Nop => {}
            Op::End => machine.cpu.set_end(true),
        }
        Ok(())
    }
}

fn byte() -> NumberSyntax {
    NumberSyntax::hex("$", 1, 2)
}

fn word() -> NumberSyntax {
    NumberSyntax::hex("$", 4, 4)
}

fn value_or_label(before: &str, after: &str, value: NumberSyntax) -> OperandPattern {
    OperandPattern::single(Alternative::new().literal(before).number(value).literal(after))
        .or(Alternative::new().literal(before).label().literal(after))
}

/// Builds a fresh 6502 processor.
///
/// # Errors
///
/// Only fails if the tables are inconsistent, which would be a bug here.
#[allow(clippy::similar_names, clippy::too_many_lines)]
pub fn build() -> Result<Processor, ConfigError> {
    let mut builder = ProcessorBuilder::new(NAME);
    let pc = builder.register("PC", "Program Counter", RegisterKind::ProgramCounter, NumberFormat::Unsigned, ADDRESS, StatusUpdate::Manual);
    let sp = builder.register("SP", "Stack Pointer", RegisterKind::StackPointer, NumberFormat::Unsigned, ADDRESS, StatusUpdate::Manual);
    let a = builder.register("A", "Accumulator", RegisterKind::Accumulator, NumberFormat::Signed, WORD, StatusUpdate::Auto);
    let x = builder.register("X", "X Index", RegisterKind::Index, NumberFormat::Signed, WORD, StatusUpdate::Auto);
    let y = builder.register("Y", "Y Index", RegisterKind::Index, NumberFormat::Signed, WORD, StatusUpdate::Auto);
    let psr = builder.register("PSR", "Program Status Register", RegisterKind::Status, NumberFormat::Unsigned, WORD, StatusUpdate::Manual);

    builder.indicator_at("C", "Carry", IndicatorKind::Carry, 0);
    builder.indicator_at("Z", "Zero", IndicatorKind::Zero, 1);
    builder.indicator_at("I", "Interrupt", IndicatorKind::InterruptDisable, 2);
    let decimal = builder.indicator_at("D", "Decimal", IndicatorKind::Decimal, 3);
    builder.indicator_at("B", "Break", IndicatorKind::Break, 4);
    builder.indicator_at("-", "Reserved", IndicatorKind::Unused, 5);
    builder.indicator_at("V", "Overflow", IndicatorKind::Overflow, 6);
    builder.indicator_at("N", "Negative", IndicatorKind::Negative, 7);

    let accumulator = builder.addressing_mode(
        "accumulator",
        OperandPattern::single(Alternative::new().choice(["A"])),
        0,
        accumulator_operand,
    );
    let immediate = builder.addressing_mode(
        "immediate",
        OperandPattern::single(Alternative::new().literal("#").number(byte())),
        WORD,
        dollar_hex,
    );
    let single = |value: NumberSyntax, after: &str| OperandPattern::single(Alternative::new().number(value).literal(after));
    let zero_page = builder.addressing_mode("zeroPage", single(byte(), ""), WORD, dollar_hex);
    let zero_page_x = builder.addressing_mode("zeroPageX", single(byte(), ",X"), WORD, dollar_hex);
    let zero_page_y = builder.addressing_mode("zeroPageY", single(byte(), ",Y"), WORD, dollar_hex);
    let absolute = builder.addressing_mode("absolute", value_or_label("", "", word()), ADDRESS, dollar_hex);
    let absolute_x = builder.addressing_mode("absoluteX", value_or_label("", ",X", word()), ADDRESS, dollar_hex);
    let absolute_y = builder.addressing_mode("absoluteY", value_or_label("", ",Y", word()), ADDRESS, dollar_hex);
    let indirect = builder.addressing_mode("indirect", value_or_label("(", ")", word()), ADDRESS, dollar_hex);
    let indirect_x = builder.addressing_mode("indirectX", value_or_label("(", ",X)", byte()), WORD, dollar_hex);
    let indirect_y = builder.addressing_mode("indirectY", value_or_label("(", "),Y", byte()), WORD, dollar_hex);

    let cpu = Mos6502 {
        pc,
        sp,
        a,
        x,
        y,
        psr,
        decimal,
        modes: Modes {
            accumulator,
            immediate,
            zero_page,
            zero_page_x,
            zero_page_y,
            absolute,
            absolute_x,
            absolute_y,
            indirect,
            indirect_x,
            indirect_y,
        },
    };

    for &(opcode, mnemonic, mode, op) in OPCODES {
        let behavior = move |machine: &mut Machine<'_>, operands: &[Operand]| cpu.execute(op, mnemonic, machine, operands);
        if matches!(op, Op::Branch(..)) {
            builder.relative_instruction(opcode, mnemonic, cpu.modes.id(mode), behavior);
        } else {
            builder.instruction(opcode, mnemonic, cpu.modes.id(mode), behavior);
        }
    }

    builder
        .data(OperandPattern::keyword("BYTE"), WORD, dollar_hex)
        .data(OperandPattern::keyword("WORD"), ADDRESS, dollar_hex)
        .label_syntax(LabelSyntax::default())
        .section("ORG", false, Some(dollar_hex))
        .offset_mode(zero_page)
        .sizes(WORD, ADDRESS, 1)
        .comment(";")
        .on_reset(move |state| state.set_register(sp, STACK_TOP));
    builder.build()
}
