//! Memory bus and mapping
//!
//! The Apple-1 memory map:
//! $0000-$CFFF - RAM (and whatever ROM images were copied in at boot)
//! $D000-$DFFF - PIA, 4 registers mirrored through the whole window
//! $E000-$FFFF - RAM (the Woz Monitor lives in the last page)
//!
//! RAM belongs to the CPU thread alone. The PIA is shared with the event loop,
//! so every touch goes through its gate.

use crate::cpu::Bus;
use crate::gate::Gate;
use crate::memory::AddressSpace;
use crate::pia::{IrqLine, Pia, Port};
use log::debug;
use std::sync::mpsc::SyncSender;
use std::sync::Arc;

/// top nibble that selects the PIA
pub const PIA_WINDOW: u16 = 0xd000;
const WINDOW_MASK: u16 = 0xf000;

/// low two address bits pick the register
pub const PIA_REGISTER_MASK: u16 = 0b11;

/// anything that can sit on the bus
pub trait Device {
    fn read(&mut self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, value: u8);
}

impl Device for AddressSpace {
    fn read(&mut self, addr: u16) -> u8 {
        AddressSpace::read(self, addr)
    }

    fn write(&mut self, addr: u16, value: u8) {
        AddressSpace::write(self, addr, value)
    }
}

pub fn in_pia_window(addr: u16) -> bool {
    addr & WINDOW_MASK == PIA_WINDOW
}

/// display bytes in flight before a port-B write has to wait for the terminal
pub const DISPLAY_QUEUE_LEN: usize = 64;

/// the CPU's side of the PIA
pub struct PiaPort {
    pia: Arc<Gate<Pia>>,
    display: SyncSender<u8>,
}

impl PiaPort {
    /// `display` should be bounded: a full queue parks the CPU thread on its
    /// next port-B write, outside the gate, until the terminal catches up
    pub fn new(pia: Arc<Gate<Pia>>, display: SyncSender<u8>) -> Self {
        PiaPort { pia, display }
    }

    pub fn reset(&mut self) {
        self.pia.lock().reset();
    }
}

impl Device for PiaPort {
    fn read(&mut self, addr: u16) -> u8 {
        self.pia.lock().read((addr & PIA_REGISTER_MASK) as u8)
    }

    fn write(&mut self, addr: u16, value: u8) {
        // the guard is a temporary, so it's gone before the send
        let forwarded = self.pia.lock().write((addr & PIA_REGISTER_MASK) as u8, value);
        if let Some(byte) = forwarded {
            if self.display.send(byte).is_err() {
                debug!("display gone, dropping 0x{:02x}", byte);
            }
        }
    }
}

/// the event loop's side of the PIA
#[derive(Clone)]
pub struct KeyboardPort {
    pia: Arc<Gate<Pia>>,
}

impl KeyboardPort {
    pub fn new(pia: Arc<Gate<Pia>>) -> Self {
        KeyboardPort { pia }
    }

    /// present a key on port A and strobe CA1, in one hold of the gate
    pub fn press(&self, key: u8) {
        let mut pia = self.pia.lock();
        pia.input(Port::A, key);
        pia.set_irq(Port::A, IrqLine::Line1);
    }
}

/// routes CPU accesses to RAM or the PIA
pub struct Apple1Bus<R: Device = AddressSpace, P: Device = PiaPort> {
    ram: R,
    pia: P,
}

impl<R: Device, P: Device> Apple1Bus<R, P> {
    pub fn new(ram: R, pia: P) -> Self {
        Apple1Bus { ram, pia }
    }

    pub fn ram(&self) -> &R {
        &self.ram
    }

    pub fn pia_mut(&mut self) -> &mut P {
        &mut self.pia
    }
}

impl<R: Device, P: Device> Bus for Apple1Bus<R, P> {
    fn load(&mut self, addr: u16) -> u8 {
        if in_pia_window(addr) {
            self.pia.read(addr)
        } else {
            self.ram.read(addr)
        }
    }

    fn store(&mut self, addr: u16, value: u8) {
        if in_pia_window(addr) {
            self.pia.write(addr, value)
        } else {
            // NB. nothing stops a program scribbling over its ROMs
            self.ram.write(addr, value)
        }
    }
}
