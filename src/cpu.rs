//! # cpu
//!
//! NMOS 6502 interpreter. All documented opcodes including decimal mode;
//! anything else executes as a one byte NOP. Timing is per-opcode base cycles
//! only (no page-crossing or branch-taken penalties).
//!
//! The CPU owns no memory: every fetch and store goes through the `Bus` it is
//! handed, synchronously, from inside `step()`.

use log::trace;

/// what the CPU sees of the outside world
pub trait Bus {
    fn load(&mut self, addr: u16) -> u8;
    fn store(&mut self, addr: u16, value: u8);
}

pub const NMI_VECTOR: u16 = 0xfffa;
pub const RESET_VECTOR: u16 = 0xfffc;
pub const IRQ_VECTOR: u16 = 0xfffe;

const STACK_PAGE: u16 = 0x0100;

pub mod flags {
    pub const CARRY: u8 = 0x01;
    pub const ZERO: u8 = 0x02;
    pub const INTERRUPT: u8 = 0x04;
    pub const DECIMAL: u8 = 0x08;
    pub const BREAK: u8 = 0x10;
    pub const UNUSED: u8 = 0x20;
    pub const OVERFLOW: u8 = 0x40;
    pub const NEGATIVE: u8 = 0x80;
}

use flags::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Relative,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    Indirect,
    IndirectX,
    IndirectY,
}

#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Adc, And, Asl, Bcc, Bcs, Beq, Bit, Bmi, Bne, Bpl, Brk, Bvc, Bvs, Clc,
    Cld, Cli, Clv, Cmp, Cpx, Cpy, Dec, Dex, Dey, Eor, Inc, Inx, Iny, Jmp,
    Jsr, Lda, Ldx, Ldy, Lsr, Nop, Ora, Pha, Php, Pla, Plp, Rol, Ror, Rti,
    Rts, Sbc, Sec, Sed, Sei, Sta, Stx, Sty, Tax, Tay, Tsx, Txa, Txs, Tya,
}

/// base cycle count for every opcode
#[rustfmt::skip]
const CYCLES: [u8; 256] = [
    7, 6, 2, 8, 3, 3, 5, 5, 3, 2, 2, 2, 4, 4, 6, 6, // 0x
    2, 5, 2, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 7, 7, // 1x
    6, 6, 2, 8, 3, 3, 5, 5, 4, 2, 2, 2, 4, 4, 6, 6, // 2x
    2, 5, 2, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 7, 7, // 3x
    6, 6, 2, 8, 3, 3, 5, 5, 3, 2, 2, 2, 3, 4, 6, 6, // 4x
    2, 5, 2, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 7, 7, // 5x
    6, 6, 2, 8, 3, 3, 5, 5, 4, 2, 2, 2, 5, 4, 6, 6, // 6x
    2, 5, 2, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 7, 7, // 7x
    2, 6, 2, 6, 3, 3, 3, 3, 2, 2, 2, 2, 4, 4, 4, 4, // 8x
    2, 6, 2, 6, 4, 4, 4, 4, 2, 5, 2, 5, 5, 5, 5, 5, // 9x
    2, 6, 2, 6, 3, 3, 3, 3, 2, 2, 2, 2, 4, 4, 4, 4, // Ax
    2, 5, 2, 5, 4, 4, 4, 4, 2, 4, 2, 4, 4, 4, 4, 4, // Bx
    2, 6, 2, 8, 3, 3, 5, 5, 2, 2, 2, 2, 4, 4, 6, 6, // Cx
    2, 5, 2, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 7, 7, // Dx
    2, 6, 2, 8, 3, 3, 5, 5, 2, 2, 2, 2, 4, 4, 6, 6, // Ex
    2, 5, 2, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 7, 7, // Fx
];

fn decode(opcode: u8) -> Option<(Op, Mode)> {
    use Mode::*;
    use Op::*;
    let decoded = match opcode {
        0x69 => (Adc, Immediate),
        0x65 => (Adc, ZeroPage),
        0x75 => (Adc, ZeroPageX),
        0x6d => (Adc, Absolute),
        0x7d => (Adc, AbsoluteX),
        0x79 => (Adc, AbsoluteY),
        0x61 => (Adc, IndirectX),
        0x71 => (Adc, IndirectY),

        0x29 => (And, Immediate),
        0x25 => (And, ZeroPage),
        0x35 => (And, ZeroPageX),
        0x2d => (And, Absolute),
        0x3d => (And, AbsoluteX),
        0x39 => (And, AbsoluteY),
        0x21 => (And, IndirectX),
        0x31 => (And, IndirectY),

        0x0a => (Asl, Accumulator),
        0x06 => (Asl, ZeroPage),
        0x16 => (Asl, ZeroPageX),
        0x0e => (Asl, Absolute),
        0x1e => (Asl, AbsoluteX),

        0x90 => (Bcc, Relative),
        0xb0 => (Bcs, Relative),
        0xf0 => (Beq, Relative),
        0x30 => (Bmi, Relative),
        0xd0 => (Bne, Relative),
        0x10 => (Bpl, Relative),
        0x50 => (Bvc, Relative),
        0x70 => (Bvs, Relative),

        0x24 => (Bit, ZeroPage),
        0x2c => (Bit, Absolute),

        0x00 => (Brk, Implied),

        0x18 => (Clc, Implied),
        0xd8 => (Cld, Implied),
        0x58 => (Cli, Implied),
        0xb8 => (Clv, Implied),
        0x38 => (Sec, Implied),
        0xf8 => (Sed, Implied),
        0x78 => (Sei, Implied),

        0xc9 => (Cmp, Immediate),
        0xc5 => (Cmp, ZeroPage),
        0xd5 => (Cmp, ZeroPageX),
        0xcd => (Cmp, Absolute),
        0xdd => (Cmp, AbsoluteX),
        0xd9 => (Cmp, AbsoluteY),
        0xc1 => (Cmp, IndirectX),
        0xd1 => (Cmp, IndirectY),

        0xe0 => (Cpx, Immediate),
        0xe4 => (Cpx, ZeroPage),
        0xec => (Cpx, Absolute),
        0xc0 => (Cpy, Immediate),
        0xc4 => (Cpy, ZeroPage),
        0xcc => (Cpy, Absolute),

        0xc6 => (Dec, ZeroPage),
        0xd6 => (Dec, ZeroPageX),
        0xce => (Dec, Absolute),
        0xde => (Dec, AbsoluteX),
        0xca => (Dex, Implied),
        0x88 => (Dey, Implied),

        0x49 => (Eor, Immediate),
        0x45 => (Eor, ZeroPage),
        0x55 => (Eor, ZeroPageX),
        0x4d => (Eor, Absolute),
        0x5d => (Eor, AbsoluteX),
        0x59 => (Eor, AbsoluteY),
        0x41 => (Eor, IndirectX),
        0x51 => (Eor, IndirectY),

        0xe6 => (Inc, ZeroPage),
        0xf6 => (Inc, ZeroPageX),
        0xee => (Inc, Absolute),
        0xfe => (Inc, AbsoluteX),
        0xe8 => (Inx, Implied),
        0xc8 => (Iny, Implied),

        0x4c => (Jmp, Absolute),
        0x6c => (Jmp, Indirect),
        0x20 => (Jsr, Absolute),

        0xa9 => (Lda, Immediate),
        0xa5 => (Lda, ZeroPage),
        0xb5 => (Lda, ZeroPageX),
        0xad => (Lda, Absolute),
        0xbd => (Lda, AbsoluteX),
        0xb9 => (Lda, AbsoluteY),
        0xa1 => (Lda, IndirectX),
        0xb1 => (Lda, IndirectY),

        0xa2 => (Ldx, Immediate),
        0xa6 => (Ldx, ZeroPage),
        0xb6 => (Ldx, ZeroPageY),
        0xae => (Ldx, Absolute),
        0xbe => (Ldx, AbsoluteY),

        0xa0 => (Ldy, Immediate),
        0xa4 => (Ldy, ZeroPage),
        0xb4 => (Ldy, ZeroPageX),
        0xac => (Ldy, Absolute),
        0xbc => (Ldy, AbsoluteX),

        0x4a => (Lsr, Accumulator),
        0x46 => (Lsr, ZeroPage),
        0x56 => (Lsr, ZeroPageX),
        0x4e => (Lsr, Absolute),
        0x5e => (Lsr, AbsoluteX),

        0xea => (Nop, Implied),

        0x09 => (Ora, Immediate),
        0x05 => (Ora, ZeroPage),
        0x15 => (Ora, ZeroPageX),
        0x0d => (Ora, Absolute),
        0x1d => (Ora, AbsoluteX),
        0x19 => (Ora, AbsoluteY),
        0x01 => (Ora, IndirectX),
        0x11 => (Ora, IndirectY),

        0x48 => (Pha, Implied),
        0x08 => (Php, Implied),
        0x68 => (Pla, Implied),
        0x28 => (Plp, Implied),

        0x2a => (Rol, Accumulator),
        0x26 => (Rol, ZeroPage),
        0x36 => (Rol, ZeroPageX),
        0x2e => (Rol, Absolute),
        0x3e => (Rol, AbsoluteX),

        0x6a => (Ror, Accumulator),
        0x66 => (Ror, ZeroPage),
        0x76 => (Ror, ZeroPageX),
        0x6e => (Ror, Absolute),
        0x7e => (Ror, AbsoluteX),

        0x40 => (Rti, Implied),
        0x60 => (Rts, Implied),

        0xe9 => (Sbc, Immediate),
        0xe5 => (Sbc, ZeroPage),
        0xf5 => (Sbc, ZeroPageX),
        0xed => (Sbc, Absolute),
        0xfd => (Sbc, AbsoluteX),
        0xf9 => (Sbc, AbsoluteY),
        0xe1 => (Sbc, IndirectX),
        0xf1 => (Sbc, IndirectY),

        0x85 => (Sta, ZeroPage),
        0x95 => (Sta, ZeroPageX),
        0x8d => (Sta, Absolute),
        0x9d => (Sta, AbsoluteX),
        0x99 => (Sta, AbsoluteY),
        0x81 => (Sta, IndirectX),
        0x91 => (Sta, IndirectY),

        0x86 => (Stx, ZeroPage),
        0x96 => (Stx, ZeroPageY),
        0x8e => (Stx, Absolute),
        0x84 => (Sty, ZeroPage),
        0x94 => (Sty, ZeroPageX),
        0x8c => (Sty, Absolute),

        0xaa => (Tax, Implied),
        0xa8 => (Tay, Implied),
        0xba => (Tsx, Implied),
        0x8a => (Txa, Implied),
        0x9a => (Txs, Implied),
        0x98 => (Tya, Implied),

        _ => return None,
    };
    Some(decoded)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cpu6502 {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub p: u8,
    pub pc: u16,
    pub cycles: u64,
}

impl Default for Cpu6502 {
    fn default() -> Self {
        Cpu6502 {
            a: 0,
            x: 0,
            y: 0,
            sp: 0xfd,
            p: UNUSED | INTERRUPT,
            pc: 0,
            cycles: 0,
        }
    }
}

impl Cpu6502 {
    pub fn new() -> Self {
        Cpu6502::default()
    }

    /// the /RES sequence: interrupts off, stack pointer down three, PC from
    /// the reset vector
    pub fn reset(&mut self, bus: &mut impl Bus) {
        self.sp = self.sp.wrapping_sub(3);
        self.p |= UNUSED | INTERRUPT;
        self.pc = self.read_word(bus, RESET_VECTOR);
        self.cycles += 7;
    }

    /// execute one instruction, returning its base cycle count
    pub fn step(&mut self, bus: &mut impl Bus) -> u32 {
        let opcode = self.fetch(bus);
        match decode(opcode) {
            Some((op, mode)) => self.execute(bus, op, mode),
            None => trace!(
                "unknown opcode 0x{:02x} at 0x{:04x}",
                opcode,
                self.pc.wrapping_sub(1)
            ),
        }
        let cycles = CYCLES[opcode as usize] as u32;
        self.cycles += cycles as u64;
        cycles
    }

    pub fn flag(&self, flag: u8) -> bool {
        self.p & flag != 0
    }

    fn set_flag(&mut self, flag: u8, on: bool) {
        if on {
            self.p |= flag;
        } else {
            self.p &= !flag;
        }
    }

    fn set_nz(&mut self, value: u8) {
        self.set_flag(ZERO, value == 0);
        self.set_flag(NEGATIVE, value & 0x80 != 0);
    }

    fn fetch(&mut self, bus: &mut impl Bus) -> u8 {
        let b = bus.load(self.pc);
        self.pc = self.pc.wrapping_add(1);
        b
    }

    fn fetch_word(&mut self, bus: &mut impl Bus) -> u16 {
        let lo = self.fetch(bus) as u16;
        let hi = self.fetch(bus) as u16;
        (hi << 8) | lo
    }

    fn read_word(&self, bus: &mut impl Bus, addr: u16) -> u16 {
        let lo = bus.load(addr) as u16;
        let hi = bus.load(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    /// pointer read that stays inside the page, as the zero page and JMP ($xxFF) do
    fn read_word_in_page(&self, bus: &mut impl Bus, addr: u16) -> u16 {
        let lo = bus.load(addr) as u16;
        let hi = bus.load((addr & 0xff00) | (addr.wrapping_add(1) & 0x00ff)) as u16;
        (hi << 8) | lo
    }

    fn push(&mut self, bus: &mut impl Bus, value: u8) {
        bus.store(STACK_PAGE | self.sp as u16, value);
        self.sp = self.sp.wrapping_sub(1);
    }

    fn pull(&mut self, bus: &mut impl Bus) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        bus.load(STACK_PAGE | self.sp as u16)
    }

    fn push_word(&mut self, bus: &mut impl Bus, value: u16) {
        self.push(bus, (value >> 8) as u8);
        self.push(bus, value as u8);
    }

    fn pull_word(&mut self, bus: &mut impl Bus) -> u16 {
        let lo = self.pull(bus) as u16;
        let hi = self.pull(bus) as u16;
        (hi << 8) | lo
    }

    /// effective address of the operand; consumes the operand bytes
    fn address(&mut self, bus: &mut impl Bus, mode: Mode) -> u16 {
        match mode {
            Mode::Immediate => {
                let addr = self.pc;
                self.pc = self.pc.wrapping_add(1);
                addr
            }
            Mode::ZeroPage => self.fetch(bus) as u16,
            Mode::ZeroPageX => self.fetch(bus).wrapping_add(self.x) as u16,
            Mode::ZeroPageY => self.fetch(bus).wrapping_add(self.y) as u16,
            Mode::Absolute => self.fetch_word(bus),
            Mode::AbsoluteX => self.fetch_word(bus).wrapping_add(self.x as u16),
            Mode::AbsoluteY => self.fetch_word(bus).wrapping_add(self.y as u16),
            Mode::Indirect => {
                let ptr = self.fetch_word(bus);
                self.read_word_in_page(bus, ptr)
            }
            Mode::IndirectX => {
                let zp = self.fetch(bus).wrapping_add(self.x);
                self.read_word_in_page(bus, zp as u16)
            }
            Mode::IndirectY => {
                let zp = self.fetch(bus);
                self.read_word_in_page(bus, zp as u16)
                    .wrapping_add(self.y as u16)
            }
            Mode::Implied | Mode::Accumulator | Mode::Relative => {
                unreachable!("{:?} has no effective address", mode)
            }
        }
    }

    fn operand(&mut self, bus: &mut impl Bus, mode: Mode) -> u8 {
        let addr = self.address(bus, mode);
        bus.load(addr)
    }

    /// read-modify-write on the accumulator or memory
    fn modify(&mut self, bus: &mut impl Bus, mode: Mode, f: impl FnOnce(&mut Self, u8) -> u8) {
        if mode == Mode::Accumulator {
            let a = self.a;
            self.a = f(self, a);
        } else {
            let addr = self.address(bus, mode);
            let value = bus.load(addr);
            let result = f(self, value);
            bus.store(addr, result);
        }
    }

    fn branch(&mut self, bus: &mut impl Bus, taken: bool) {
        let offset = self.fetch(bus) as i8;
        if taken {
            self.pc = self.pc.wrapping_add(offset as i16 as u16);
        }
    }

    fn compare(&mut self, register: u8, value: u8) {
        self.set_flag(CARRY, register >= value);
        self.set_nz(register.wrapping_sub(value));
    }

    fn adc(&mut self, value: u8) {
        let carry = (self.p & CARRY) as u16;
        let a = self.a;
        let binary = a as u16 + value as u16 + carry;
        if self.flag(DECIMAL) {
            let mut lo = (a & 0x0f) as u16 + (value & 0x0f) as u16 + carry;
            if lo > 0x09 {
                lo += 0x06;
            }
            let mut hi = (a >> 4) as u16 + (value >> 4) as u16 + (lo > 0x0f) as u16;
            // NMOS parts take Z from the binary sum, N and V before the high fixup
            self.set_flag(ZERO, binary & 0xff == 0);
            self.set_flag(NEGATIVE, hi & 0x08 != 0);
            self.set_flag(
                OVERFLOW,
                !(a ^ value) & (a ^ ((hi << 4) as u8)) & 0x80 != 0,
            );
            if hi > 0x09 {
                hi += 0x06;
            }
            self.set_flag(CARRY, hi > 0x0f);
            self.a = ((hi << 4) | (lo & 0x0f)) as u8;
        } else {
            let result = binary as u8;
            self.set_flag(CARRY, binary > 0xff);
            self.set_flag(OVERFLOW, !(a ^ value) & (a ^ result) & 0x80 != 0);
            self.a = result;
            self.set_nz(result);
        }
    }

    fn sbc(&mut self, value: u8) {
        if !self.flag(DECIMAL) {
            self.adc(!value);
            return;
        }
        let a = self.a;
        let borrow = 1 - (self.p & CARRY) as i16;
        let binary = a as i16 - value as i16 - borrow;
        let result = binary as u8;
        // flags follow the binary subtraction
        self.set_flag(CARRY, binary >= 0);
        self.set_flag(OVERFLOW, (a ^ value) & (a ^ result) & 0x80 != 0);
        self.set_nz(result);

        let mut lo = (a & 0x0f) as i16 - (value & 0x0f) as i16 - borrow;
        let mut hi = (a >> 4) as i16 - (value >> 4) as i16;
        if lo < 0 {
            lo -= 0x06;
            hi -= 1;
        }
        if hi < 0 {
            hi -= 0x06;
        }
        self.a = (((hi << 4) | (lo & 0x0f)) & 0xff) as u8;
    }

    fn asl(&mut self, value: u8) -> u8 {
        self.set_flag(CARRY, value & 0x80 != 0);
        let result = value << 1;
        self.set_nz(result);
        result
    }

    fn lsr(&mut self, value: u8) -> u8 {
        self.set_flag(CARRY, value & 0x01 != 0);
        let result = value >> 1;
        self.set_nz(result);
        result
    }

    fn rol(&mut self, value: u8) -> u8 {
        let carry_in = self.p & CARRY;
        self.set_flag(CARRY, value & 0x80 != 0);
        let result = (value << 1) | carry_in;
        self.set_nz(result);
        result
    }

    fn ror(&mut self, value: u8) -> u8 {
        let carry_in = (self.p & CARRY) << 7;
        self.set_flag(CARRY, value & 0x01 != 0);
        let result = (value >> 1) | carry_in;
        self.set_nz(result);
        result
    }

    fn execute(&mut self, bus: &mut impl Bus, op: Op, mode: Mode) {
        match op {
            Op::Adc => {
                let v = self.operand(bus, mode);
                self.adc(v);
            }
            Op::Sbc => {
                let v = self.operand(bus, mode);
                self.sbc(v);
            }
            Op::And => {
                self.a &= self.operand(bus, mode);
                self.set_nz(self.a);
            }
            Op::Ora => {
                self.a |= self.operand(bus, mode);
                self.set_nz(self.a);
            }
            Op::Eor => {
                self.a ^= self.operand(bus, mode);
                self.set_nz(self.a);
            }
            Op::Bit => {
                let v = self.operand(bus, mode);
                self.set_flag(ZERO, self.a & v == 0);
                self.set_flag(OVERFLOW, v & 0x40 != 0);
                self.set_flag(NEGATIVE, v & 0x80 != 0);
            }
            Op::Cmp => {
                let v = self.operand(bus, mode);
                self.compare(self.a, v);
            }
            Op::Cpx => {
                let v = self.operand(bus, mode);
                self.compare(self.x, v);
            }
            Op::Cpy => {
                let v = self.operand(bus, mode);
                self.compare(self.y, v);
            }

            Op::Asl => self.modify(bus, mode, Self::asl),
            Op::Lsr => self.modify(bus, mode, Self::lsr),
            Op::Rol => self.modify(bus, mode, Self::rol),
            Op::Ror => self.modify(bus, mode, Self::ror),
            Op::Inc => self.modify(bus, mode, |cpu, v| {
                let r = v.wrapping_add(1);
                cpu.set_nz(r);
                r
            }),
            Op::Dec => self.modify(bus, mode, |cpu, v| {
                let r = v.wrapping_sub(1);
                cpu.set_nz(r);
                r
            }),

            Op::Lda => {
                self.a = self.operand(bus, mode);
                self.set_nz(self.a);
            }
            Op::Ldx => {
                self.x = self.operand(bus, mode);
                self.set_nz(self.x);
            }
            Op::Ldy => {
                self.y = self.operand(bus, mode);
                self.set_nz(self.y);
            }
            Op::Sta => {
                let addr = self.address(bus, mode);
                bus.store(addr, self.a);
            }
            Op::Stx => {
                let addr = self.address(bus, mode);
                bus.store(addr, self.x);
            }
            Op::Sty => {
                let addr = self.address(bus, mode);
                bus.store(addr, self.y);
            }

            Op::Bcc => self.branch(bus, !self.flag(CARRY)),
            Op::Bcs => self.branch(bus, self.flag(CARRY)),
            Op::Beq => self.branch(bus, self.flag(ZERO)),
            Op::Bne => self.branch(bus, !self.flag(ZERO)),
            Op::Bmi => self.branch(bus, self.flag(NEGATIVE)),
            Op::Bpl => self.branch(bus, !self.flag(NEGATIVE)),
            Op::Bvc => self.branch(bus, !self.flag(OVERFLOW)),
            Op::Bvs => self.branch(bus, self.flag(OVERFLOW)),

            Op::Jmp => self.pc = self.address(bus, mode),
            Op::Jsr => {
                let target = self.fetch_word(bus);
                self.push_word(bus, self.pc.wrapping_sub(1));
                self.pc = target;
            }
            Op::Rts => self.pc = self.pull_word(bus).wrapping_add(1),
            Op::Brk => {
                // the byte after BRK is padding
                self.push_word(bus, self.pc.wrapping_add(1));
                self.push(bus, self.p | BREAK | UNUSED);
                self.p |= INTERRUPT;
                self.pc = self.read_word(bus, IRQ_VECTOR);
            }
            Op::Rti => {
                self.p = (self.pull(bus) & !BREAK) | UNUSED;
                self.pc = self.pull_word(bus);
            }

            Op::Pha => self.push(bus, self.a),
            Op::Php => self.push(bus, self.p | BREAK | UNUSED),
            Op::Pla => {
                self.a = self.pull(bus);
                self.set_nz(self.a);
            }
            Op::Plp => self.p = (self.pull(bus) & !BREAK) | UNUSED,

            Op::Clc => self.set_flag(CARRY, false),
            Op::Cld => self.set_flag(DECIMAL, false),
            Op::Cli => self.set_flag(INTERRUPT, false),
            Op::Clv => self.set_flag(OVERFLOW, false),
            Op::Sec => self.set_flag(CARRY, true),
            Op::Sed => self.set_flag(DECIMAL, true),
            Op::Sei => self.set_flag(INTERRUPT, true),

            Op::Inx => {
                self.x = self.x.wrapping_add(1);
                self.set_nz(self.x);
            }
            Op::Iny => {
                self.y = self.y.wrapping_add(1);
                self.set_nz(self.y);
            }
            Op::Dex => {
                self.x = self.x.wrapping_sub(1);
                self.set_nz(self.x);
            }
            Op::Dey => {
                self.y = self.y.wrapping_sub(1);
                self.set_nz(self.y);
            }
            Op::Tax => {
                self.x = self.a;
                self.set_nz(self.x);
            }
            Op::Tay => {
                self.y = self.a;
                self.set_nz(self.y);
            }
            Op::Txa => {
                self.a = self.x;
                self.set_nz(self.a);
            }
            Op::Tya => {
                self.a = self.y;
                self.set_nz(self.a);
            }
            Op::Tsx => {
                self.x = self.sp;
                self.set_nz(self.x);
            }
            Op::Txs => self.sp = self.x,

            Op::Nop => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FlatBus(Vec<u8>);

    impl FlatBus {
        /// program at 0x0200 with the reset vector pointing at it
        fn with_program(program: &[u8]) -> Self {
            let mut mem = vec![0u8; 0x10000];
            mem[0x0200..0x0200 + program.len()].copy_from_slice(program);
            mem[RESET_VECTOR as usize] = 0x00;
            mem[RESET_VECTOR as usize + 1] = 0x02;
            FlatBus(mem)
        }
    }

    impl Bus for FlatBus {
        fn load(&mut self, addr: u16) -> u8 {
            self.0[addr as usize]
        }
        fn store(&mut self, addr: u16, value: u8) {
            self.0[addr as usize] = value;
        }
    }

    fn run(program: &[u8], steps: usize) -> (Cpu6502, FlatBus) {
        let mut bus = FlatBus::with_program(program);
        let mut cpu = Cpu6502::new();
        cpu.reset(&mut bus);
        for _ in 0..steps {
            cpu.step(&mut bus);
        }
        (cpu, bus)
    }

    #[test]
    fn test_reset_loads_vector() {
        let (cpu, _) = run(&[], 0);
        assert_eq!(cpu.pc, 0x0200);
        assert!(cpu.flag(INTERRUPT));
        assert_eq!(cpu.sp, 0xfa);
    }

    #[test]
    fn test_lda_sets_flags() {
        let (cpu, _) = run(&[0xa9, 0x00, 0xa9, 0x80], 1);
        assert!(cpu.flag(ZERO));
        let (cpu, _) = run(&[0xa9, 0x00, 0xa9, 0x80], 2);
        assert_eq!(cpu.a, 0x80);
        assert!(cpu.flag(NEGATIVE));
        assert!(!cpu.flag(ZERO));
    }

    #[test]
    fn test_adc_carry_and_overflow() {
        // CLC; LDA #$7f; ADC #$01
        let (cpu, _) = run(&[0x18, 0xa9, 0x7f, 0x69, 0x01], 3);
        assert_eq!(cpu.a, 0x80);
        assert!(cpu.flag(OVERFLOW));
        assert!(!cpu.flag(CARRY));

        // SEC; LDA #$ff; ADC #$00
        let (cpu, _) = run(&[0x38, 0xa9, 0xff, 0x69, 0x00], 3);
        assert_eq!(cpu.a, 0x00);
        assert!(cpu.flag(CARRY));
        assert!(cpu.flag(ZERO));
    }

    #[test]
    fn test_sbc_binary() {
        // SEC; LDA #$05; SBC #$06
        let (cpu, _) = run(&[0x38, 0xa9, 0x05, 0xe9, 0x06], 3);
        assert_eq!(cpu.a, 0xff);
        assert!(!cpu.flag(CARRY));
        assert!(cpu.flag(NEGATIVE));
    }

    #[test]
    fn test_decimal_mode() {
        // SED; CLC; LDA #$09; ADC #$01
        let (cpu, _) = run(&[0xf8, 0x18, 0xa9, 0x09, 0x69, 0x01], 4);
        assert_eq!(cpu.a, 0x10);
        assert!(!cpu.flag(CARRY));

        // SED; CLC; LDA #$99; ADC #$01
        let (cpu, _) = run(&[0xf8, 0x18, 0xa9, 0x99, 0x69, 0x01], 4);
        assert_eq!(cpu.a, 0x00);
        assert!(cpu.flag(CARRY));

        // SED; SEC; LDA #$10; SBC #$01
        let (cpu, _) = run(&[0xf8, 0x38, 0xa9, 0x10, 0xe9, 0x01], 4);
        assert_eq!(cpu.a, 0x09);
        assert!(cpu.flag(CARRY));
    }

    #[test]
    fn test_store_and_indexed_load() {
        // LDX #$03; LDA #$42; STA $10,X; LDY $13
        let (cpu, bus) = run(&[0xa2, 0x03, 0xa9, 0x42, 0x95, 0x10, 0xa4, 0x13], 4);
        assert_eq!(bus.0[0x13], 0x42);
        assert_eq!(cpu.y, 0x42);
    }

    #[test]
    fn test_indirect_y() {
        // LDY #$01; LDA ($20),Y with $20 -> $0300
        let mut bus = FlatBus::with_program(&[0xa0, 0x01, 0xb1, 0x20]);
        bus.0[0x20] = 0x00;
        bus.0[0x21] = 0x03;
        bus.0[0x0301] = 0x5a;
        let mut cpu = Cpu6502::new();
        cpu.reset(&mut bus);
        cpu.step(&mut bus);
        cpu.step(&mut bus);
        assert_eq!(cpu.a, 0x5a);
    }

    #[test]
    fn test_branch_backwards() {
        // LDX #$03; loop: DEX; BNE loop
        let (cpu, _) = run(&[0xa2, 0x03, 0xca, 0xd0, 0xfd], 7);
        assert_eq!(cpu.x, 0);
        assert_eq!(cpu.pc, 0x0205);
    }

    #[test]
    fn test_jsr_rts() {
        // JSR $0210; BRK ... $0210: LDA #$01; RTS
        let mut program = vec![0x20, 0x10, 0x02, 0xea];
        program.resize(0x10, 0);
        program.extend_from_slice(&[0xa9, 0x01, 0x60]);
        let (cpu, bus) = run(&program, 3);
        assert_eq!(cpu.a, 0x01);
        assert_eq!(cpu.pc, 0x0203);
        assert_eq!(cpu.sp, 0xfa);
        // return address minus one was pushed
        assert_eq!(bus.0[0x01fa], 0x02);
        assert_eq!(bus.0[0x01f9], 0x02);
    }

    #[test]
    fn test_jmp_indirect_page_bug() {
        let mut bus = FlatBus::with_program(&[0x6c, 0xff, 0x02]);
        bus.0[0x02ff] = 0x34;
        bus.0[0x0200] = 0x6c; // high byte comes from the start of the same page
        bus.0[0x0300] = 0x99;
        let mut cpu = Cpu6502::new();
        cpu.reset(&mut bus);
        cpu.step(&mut bus);
        assert_eq!(cpu.pc, 0x6c34);
    }

    #[test]
    fn test_stack_round_trip_and_flags() {
        // LDA #$aa; PHA; LDA #$00; PLA; PHP; PLP
        let (cpu, _) = run(&[0xa9, 0xaa, 0x48, 0xa9, 0x00, 0x68, 0x08, 0x28], 6);
        assert_eq!(cpu.a, 0xaa);
        assert!(cpu.flag(NEGATIVE));
        assert!(!cpu.flag(BREAK));
    }

    #[test]
    fn test_shifts_through_carry() {
        // SEC; LDA #$80; ROL A; ROR A
        let (cpu, _) = run(&[0x38, 0xa9, 0x80, 0x2a], 3);
        assert_eq!(cpu.a, 0x01);
        assert!(cpu.flag(CARRY));
        let (cpu, _) = run(&[0x38, 0xa9, 0x80, 0x2a, 0x6a], 4);
        assert_eq!(cpu.a, 0x80);
        assert!(cpu.flag(CARRY));
    }

    #[test]
    fn test_bit_copies_high_bits() {
        let mut bus = FlatBus::with_program(&[0xa9, 0x01, 0x24, 0x40]);
        bus.0[0x40] = 0xc0;
        let mut cpu = Cpu6502::new();
        cpu.reset(&mut bus);
        cpu.step(&mut bus);
        cpu.step(&mut bus);
        assert!(cpu.flag(ZERO));
        assert!(cpu.flag(OVERFLOW));
        assert!(cpu.flag(NEGATIVE));
    }

    #[test]
    fn test_brk_and_rti() {
        // BRK at 0x0200 vectors through 0xfffe; handler at 0x0300 is RTI
        let mut bus = FlatBus::with_program(&[0x00, 0xea, 0xea]);
        bus.0[IRQ_VECTOR as usize] = 0x00;
        bus.0[IRQ_VECTOR as usize + 1] = 0x03;
        bus.0[0x0300] = 0x40;
        let mut cpu = Cpu6502::new();
        cpu.reset(&mut bus);
        cpu.step(&mut bus);
        assert_eq!(cpu.pc, 0x0300);
        assert!(cpu.flag(INTERRUPT));
        cpu.step(&mut bus);
        assert_eq!(cpu.pc, 0x0202);
    }

    #[test]
    fn test_unknown_opcode_is_one_byte_nop() {
        let (cpu, _) = run(&[0x02, 0xa9, 0x07], 2);
        assert_eq!(cpu.a, 0x07);
    }

    #[test]
    fn test_cycle_counts() {
        let mut bus = FlatBus::with_program(&[0xea, 0x20, 0x00, 0x03]);
        let mut cpu = Cpu6502::new();
        cpu.reset(&mut bus);
        assert_eq!(cpu.step(&mut bus), 2);
        assert_eq!(cpu.step(&mut bus), 6);
    }
}
