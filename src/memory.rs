use crate::{EmulatorError, Result};
use log::debug;
use std::fs;
use std::path::Path;

// NB. addresses are u16 as per the 6502; lengths and offsets are usize so that
//     a block running off the end of the address space can be expressed

/// how much memory the 6502 can see
pub const ADDRESS_SPACE_SIZE: usize = 0x10000;

/// The whole 64K the CPU can address. Zeroed at boot; the PIA window is still
/// backed by bytes here but the bus never routes to them.
pub struct AddressSpace {
    bytes: Box<[u8]>,
}

impl AddressSpace {
    pub fn new() -> Self {
        AddressSpace {
            bytes: vec![0u8; ADDRESS_SPACE_SIZE].into_boxed_slice(),
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        self.bytes[addr as usize]
    }

    pub fn write(&mut self, addr: u16, value: u8) {
        self.bytes[addr as usize] = value;
    }

    /// get a r/o slice of the underlying memory
    pub fn get_ro_slice(&self, addr: u16, len: usize) -> &[u8] {
        let a = addr as usize;
        &self.bytes[a..(a + len)]
    }

    /// copy a ROM block into place; nothing is written if it doesn't fit
    pub fn load_rom(&mut self, rom: &RomBlock) -> Result<()> {
        let end = match rom.offset.checked_add(rom.len()) {
            Some(end) if end <= self.bytes.len() => end,
            _ => {
                return Err(EmulatorError::RomOutOfBounds {
                    name: rom.name.clone(),
                    offset: rom.offset,
                    len: rom.len(),
                })
            }
        };
        self.bytes[rom.offset..end].copy_from_slice(&rom.data);
        debug!(
            "loaded {} ({} bytes) at 0x{:04x}",
            rom.name,
            rom.len(),
            rom.offset
        );
        Ok(())
    }
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::new()
    }
}

/// a firmware image and where it lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomBlock {
    pub name: String,
    pub offset: usize,
    data: Box<[u8]>,
}

impl RomBlock {
    pub fn new(name: impl Into<String>, offset: usize, data: impl Into<Box<[u8]>>) -> Self {
        RomBlock {
            name: name.into(),
            offset,
            data: data.into(),
        }
    }

    /// read a whole file as one image
    pub fn from_file(path: &Path, offset: usize) -> Result<Self> {
        let data = fs::read(path).map_err(|source| EmulatorError::RomRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(RomBlock::new(path.display().to_string(), offset, data))
    }

    /// the bundled Woz Monitor, mapped at the top of memory
    pub fn woz_monitor() -> Self {
        RomBlock::new("woz monitor", WOZ_MONITOR_ADDR, &WOZ_MONITOR[..])
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// load every block in order, stopping at the first that doesn't fit
pub fn load_roms(space: &mut AddressSpace, roms: &[RomBlock]) -> Result<()> {
    for rom in roms {
        space.load_rom(rom)?;
    }
    Ok(())
}

pub const WOZ_MONITOR_ADDR: usize = 0xff00;

// Steve Wozniak's 256 byte monitor. The end-of-line compares at 0xff37 and
// 0xff47 look for 0x8a: the keyboard delivers Return as line feed.
#[rustfmt::skip]
pub const WOZ_MONITOR: [u8; 256] = [
    0xd8, 0x58, 0xa0, 0x7f, 0x8c, 0x12, 0xd0, 0xa9, // ff00 RESET
    0xa7, 0x8d, 0x11, 0xd0, 0x8d, 0x13, 0xd0, 0xc9, // ff08        ff0f NOTCR
    0xdf, 0xf0, 0x13, 0xc9, 0x9b, 0xf0, 0x03, 0xc8, // ff10
    0x10, 0x0f, 0xa9, 0xdc, 0x20, 0xef, 0xff, 0xa9, // ff18 ff1a ESCAPE, ff1f GETLINE
    0x8d, 0x20, 0xef, 0xff, 0xa0, 0x01, 0x88, 0x30, // ff20 ff26 BACKSPACE
    0xf6, 0xad, 0x11, 0xd0, 0x10, 0xfb, 0xad, 0x10, // ff28 ff29 NEXTCHAR
    0xd0, 0x99, 0x00, 0x02, 0x20, 0xef, 0xff, 0xc9, // ff30
    0x8a, 0xd0, 0xd4, 0xa0, 0xff, 0xa9, 0x00, 0xaa, // ff38
    0x0a, 0x85, 0x2b, 0xc8, 0xb9, 0x00, 0x02, 0xc9, // ff40 SETSTOR, SETMODE, BLSKIP, NEXTITEM
    0x8a, 0xf0, 0xd4, 0xc9, 0xae, 0x90, 0xf4, 0xf0, // ff48
    0xf0, 0xc9, 0xba, 0xf0, 0xeb, 0xc9, 0xd2, 0xf0, // ff50
    0x3b, 0x86, 0x28, 0x86, 0x29, 0x84, 0x2a, 0xb9, // ff58 ff5f NEXTHEX
    0x00, 0x02, 0x49, 0xb0, 0xc9, 0x0a, 0x90, 0x06, // ff60
    0x69, 0x88, 0xc9, 0xfa, 0x90, 0x11, 0x0a, 0x0a, // ff68 ff6e DIG
    0x0a, 0x0a, 0xa2, 0x04, 0x0a, 0x26, 0x28, 0x26, // ff70 ff74 HEXSHIFT
    0x29, 0xca, 0xd0, 0xf8, 0xc8, 0xd0, 0xe0, 0xc4, // ff78 ff7f NOTHEX
    0x2a, 0xf0, 0x97, 0x24, 0x2b, 0x50, 0x10, 0xa5, // ff80
    0x28, 0x81, 0x26, 0xe6, 0x26, 0xd0, 0xb5, 0xe6, // ff88
    0x27, 0x4c, 0x44, 0xff, 0x6c, 0x24, 0x00, 0x30, // ff90 ff91 TONEXTITEM, ff94 RUN, ff97 NOTSTOR
    0x2b, 0xa2, 0x02, 0xb5, 0x27, 0x95, 0x25, 0x95, // ff98 ff9b SETADR
    0x23, 0xca, 0xd0, 0xf7, 0xd0, 0x14, 0xa9, 0x8d, // ffa0 ffa4 NXTPRNT
    0x20, 0xef, 0xff, 0xa5, 0x25, 0x20, 0xdc, 0xff, // ffa8
    0xa5, 0x24, 0x20, 0xdc, 0xff, 0xa9, 0xba, 0x20, // ffb0
    0xef, 0xff, 0xa9, 0xa0, 0x20, 0xef, 0xff, 0xa1, // ffb8 ffba PRDATA
    0x24, 0x20, 0xdc, 0xff, 0x86, 0x2b, 0xa5, 0x24, // ffc0 ffc4 XAMNEXT
    0xc5, 0x28, 0xa5, 0x25, 0xe5, 0x29, 0xb0, 0xc1, // ffc8
    0xe6, 0x24, 0xd0, 0x02, 0xe6, 0x25, 0xa5, 0x24, // ffd0 ffd6 MOD8CHK
    0x29, 0x07, 0x10, 0xc8, 0x48, 0x4a, 0x4a, 0x4a, // ffd8 ffdc PRBYTE
    0x4a, 0x20, 0xe5, 0xff, 0x68, 0x29, 0x0f, 0x09, // ffe0 ffe5 PRHEX
    0xb0, 0xc9, 0xba, 0x90, 0x02, 0x69, 0x06, 0x2c, // ffe8 ffef ECHO
    0x12, 0xd0, 0x30, 0xfb, 0x8d, 0x12, 0xd0, 0x60, // fff0
    0x00, 0x00, 0x00, 0x0f, 0x00, 0xff, 0x00, 0x00, // fff8 NMI, RESET, IRQ vectors
];
