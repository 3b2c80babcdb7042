use crossterm::event::{poll, read, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal;
use log::debug;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// every key the Apple-1 keyboard could produce, after folding to upper case
pub const VALID_KEY_CODES: &[u8] =
    b" 01!2\"3#4$5%6&7'8(9):*;+,<-=.>/?ABCDEF\nGHIJKLMN^OP@QRSTUVWXYZ\x1b";

/// keyboard strobe: set on every byte the machine sees
pub const KEY_STROBE: u8 = 0x80;

/// Ctrl+C ends the session
pub const QUIT_KEY: u8 = 0x03;

const fn build_key_table(codes: &[u8]) -> [bool; 256] {
    let mut table = [false; 256];
    let mut i = 0;
    while i < codes.len() {
        table[codes[i] as usize] = true;
        i += 1;
    }
    table
}

static KEY_TABLE: [bool; 256] = build_key_table(VALID_KEY_CODES);

pub fn is_valid_key(raw: u8) -> bool {
    KEY_TABLE[raw as usize]
}

/// raw terminal byte to what the PIA's port A should see, or None if the
/// Apple-1 had no such key
pub fn to_keyboard(raw: u8) -> Option<u8> {
    let key = raw.to_ascii_uppercase();
    if is_valid_key(key) {
        Some(key | KEY_STROBE)
    } else {
        None
    }
}

/// the byte a terminal with cooked newlines would have delivered for a key
pub fn raw_byte(event: &KeyEvent) -> Option<u8> {
    match event.code {
        KeyCode::Char(c) if c.is_ascii() => {
            let b = c as u8;
            if event.modifiers.contains(KeyModifiers::CONTROL) && b.is_ascii_alphabetic() {
                Some(b.to_ascii_uppercase() & 0x1f)
            } else {
                Some(b)
            }
        }
        KeyCode::Enter => Some(b'\n'),
        KeyCode::Esc => Some(0x1b),
        KeyCode::Tab => Some(b'\t'),
        KeyCode::Backspace => Some(0x7f),
        _ => None,
    }
}

/// somewhere raw key bytes come from
pub trait KeySource {
    /// wait up to `timeout` for a byte; true if one can be read now
    fn poll(&mut self, timeout: Duration) -> io::Result<bool>;

    /// take the pending input; None if it wasn't a key
    fn read_byte(&mut self) -> io::Result<Option<u8>>;
}

/// only one thing gets to own the real terminal's raw mode
static RAW_MODE_HELD: AtomicBool = AtomicBool::new(false);

/// keys from STDIN, with the terminal in raw mode for as long as this lives
pub struct StdinKeys {
    _private: (),
}

impl StdinKeys {
    pub fn new() -> Result<Self, io::Error> {
        if RAW_MODE_HELD.swap(true, Ordering::AcqRel) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "terminal is already in raw mode",
            ));
        }
        if let Err(e) = terminal::enable_raw_mode() {
            RAW_MODE_HELD.store(false, Ordering::Release);
            return Err(e);
        }
        Ok(StdinKeys { _private: () })
    }
}

impl Drop for StdinKeys {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            debug!("couldn't restore terminal mode: {}", e);
        }
        RAW_MODE_HELD.store(false, Ordering::Release);
    }
}

impl KeySource for StdinKeys {
    fn poll(&mut self, timeout: Duration) -> io::Result<bool> {
        poll(timeout)
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        match read()? {
            Event::Key(evt) => Ok(raw_byte(&evt)),
            _ => Ok(None),
        }
    }
}

/// dummy KeySource for testing: hands out canned bytes, optionally spaced
/// out in time like a human typing
pub struct DummyKeys {
    bytes: VecDeque<u8>,
    interval: Duration,
    next_at: Instant,
}

impl DummyKeys {
    pub fn new(keys: &[u8]) -> Self {
        DummyKeys::paced(keys, Duration::ZERO)
    }

    pub fn paced(keys: &[u8], interval: Duration) -> Self {
        DummyKeys {
            bytes: keys.iter().copied().collect(),
            interval,
            next_at: Instant::now() + interval,
        }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len()
    }
}

impl KeySource for DummyKeys {
    fn poll(&mut self, timeout: Duration) -> io::Result<bool> {
        if self.bytes.is_empty() {
            thread::sleep(timeout);
            return Ok(false);
        }
        let now = Instant::now();
        if now >= self.next_at {
            return Ok(true);
        }
        let wait = self.next_at - now;
        thread::sleep(wait.min(timeout));
        Ok(wait <= timeout)
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        self.next_at = Instant::now() + self.interval;
        Ok(self.bytes.pop_front())
    }
}
