//! # pia
//!
//! Motorola MC6821 peripheral interface adapter, as wired in the Apple-1:
//!  port A  keyboard; CA1 is the keyboard strobe
//!  port B  display; PB7 reads back as "display busy", always clear here
//!
//! Register select (RS1, RS0):
//!  0. port A data, or DDRA when CRA bit 2 is clear
//!  1. CRA
//!  2. port B data, or DDRB when CRB bit 2 is clear
//!  3. CRB
//!
//! Control register bits 7 and 6 are the IRQ1/IRQ2 flags: read-only, set by
//! the control lines, cleared by reading that port's data register.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    A,
    B,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqLine {
    /// CA1 / CB1
    Line1,
    /// CA2 / CB2
    Line2,
}

const CR_IRQ1_FLAG: u8 = 0x80;
const CR_IRQ2_FLAG: u8 = 0x40;
const CR_C2_OUTPUT: u8 = 0x20;
const CR_IRQ2_ENABLE: u8 = 0x08;
const CR_DATA_SELECT: u8 = 0x04;
const CR_IRQ1_ENABLE: u8 = 0x01;
const CR_WRITABLE: u8 = 0x3f;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Side {
    output: u8,
    direction: u8,
    control: u8,
    input: u8,
}

impl Side {
    fn read_data(&mut self) -> u8 {
        if self.control & CR_DATA_SELECT == 0 {
            return self.direction;
        }
        self.control &= !(CR_IRQ1_FLAG | CR_IRQ2_FLAG);
        (self.output & self.direction) | (self.input & !self.direction)
    }

    /// true if the write landed in the output register
    fn write_data(&mut self, value: u8) -> bool {
        if self.control & CR_DATA_SELECT == 0 {
            self.direction = value;
            false
        } else {
            self.output = value;
            true
        }
    }

    fn write_control(&mut self, value: u8) {
        self.control = (self.control & !CR_WRITABLE) | (value & CR_WRITABLE);
    }

    fn set_irq(&mut self, line: IrqLine) {
        match line {
            IrqLine::Line1 => self.control |= CR_IRQ1_FLAG,
            // C2 only latches interrupts when configured as an input
            IrqLine::Line2 if self.control & CR_C2_OUTPUT == 0 => self.control |= CR_IRQ2_FLAG,
            IrqLine::Line2 => {}
        }
    }

    fn irq(&self) -> bool {
        (self.control & CR_IRQ1_FLAG != 0 && self.control & CR_IRQ1_ENABLE != 0)
            || (self.control & CR_IRQ2_FLAG != 0
                && self.control & CR_IRQ2_ENABLE != 0
                && self.control & CR_C2_OUTPUT == 0)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Pia {
    a: Side,
    b: Side,
}

impl Pia {
    pub fn new() -> Self {
        Pia::default()
    }

    /// the /RESET line: every register back to zero
    pub fn reset(&mut self) {
        *self = Pia::default();
    }

    /// read the register picked by the low two bits of `rs`
    pub fn read(&mut self, rs: u8) -> u8 {
        match rs & 0b11 {
            0 => self.a.read_data(),
            1 => self.a.control,
            2 => self.b.read_data(),
            _ => self.b.control,
        }
    }

    /// write a register; a write to port B's output register hands the byte
    /// back so the caller can forward it to the display
    pub fn write(&mut self, rs: u8, value: u8) -> Option<u8> {
        match rs & 0b11 {
            0 => {
                self.a.write_data(value);
                None
            }
            1 => {
                self.a.write_control(value);
                None
            }
            2 => self.b.write_data(value).then_some(value),
            _ => {
                self.b.write_control(value);
                None
            }
        }
    }

    /// latch a byte presented on a port's input pins
    pub fn input(&mut self, port: Port, value: u8) {
        self.side_mut(port).input = value;
    }

    /// an active transition on one of the port's control lines
    pub fn set_irq(&mut self, port: Port, line: IrqLine) {
        self.side_mut(port).set_irq(line);
    }

    /// state of the port's /IRQ output
    pub fn irq(&self, port: Port) -> bool {
        match port {
            Port::A => self.a.irq(),
            Port::B => self.b.irq(),
        }
    }

    fn side_mut(&mut self, port: Port) -> &mut Side {
        match port {
            Port::A => &mut self.a,
            Port::B => &mut self.b,
        }
    }
}
