use log::debug;
use std::io::{self, Write};

/// Display is what the terminal adapter writes rendered characters to. It
/// should abstract the implementation details, so the same protocol works on
/// a real terminal or a buffer under test.
pub trait Display {
    /// put one already-rendered character on the screen
    fn put(&mut self, byte: u8) -> Result<(), io::Error>;
}

/// the two ways the Apple-1 asks for a new line: CR and LF with bit 7 set
const NEWLINE_CODES: [u8; 2] = [0x80 | b'\r', 0x80 | b'\n'];

/// Render a byte the machine wrote to the display port. The Apple-1 character
/// generator only knew 64 glyphs, so the top two bits are dropped and codes
/// 0x00-0x1f come out as 0x40-0x5f ('@' to '_').
pub fn render(byte: u8) -> u8 {
    if NEWLINE_CODES.contains(&byte) {
        return b'\n';
    }
    let c = byte & 0x3f;
    if c & 0x20 == 0 {
        c | 0x40
    } else {
        c
    }
}

/// characters straight to STDOUT
pub struct StdoutDisplay {
    out: io::Stdout,
}

impl StdoutDisplay {
    pub fn new() -> Self {
        StdoutDisplay { out: io::stdout() }
    }
}

impl Default for StdoutDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for StdoutDisplay {
    fn put(&mut self, byte: u8) -> Result<(), io::Error> {
        let mut out = self.out.lock();
        // raw mode turns off output processing, so the carriage return is ours to send
        if byte == b'\n' {
            out.write_all(b"\r\n")?;
        } else {
            out.write_all(&[byte])?;
        }
        out.flush()
    }
}

/// useful for testing: keeps everything it is given
#[derive(Debug, Default)]
pub struct BufferDisplay {
    bytes: Vec<u8>,
}

impl BufferDisplay {
    pub fn new() -> Self {
        BufferDisplay::default()
    }

    pub fn contents(&self) -> &[u8] {
        &self.bytes
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

impl Display for BufferDisplay {
    fn put(&mut self, byte: u8) -> Result<(), io::Error> {
        self.bytes.push(byte);
        Ok(())
    }
}

/// best-effort write: a failing terminal is not the machine's problem
pub fn put_or_log(display: &mut impl Display, byte: u8) {
    if let Err(e) = display.put(byte) {
        debug!("display write of 0x{:02x} failed: {}", byte, e);
    }
}
