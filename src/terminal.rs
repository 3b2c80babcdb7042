//! The terminal adapter: keys in, characters out.
//!
//! Holding a `Terminal` means holding the input side (for the real terminal,
//! raw mode) until `close()` or drop. Output keeps working after close so
//! late characters from the machine still reach the screen.

use crate::display::{self, Display, StdoutDisplay};
use crate::input::{self, KeySource, StdinKeys, QUIT_KEY};
use log::{debug, trace, warn};
use std::io;
use std::time::Duration;

type KeyHandler = Box<dyn FnMut(u8)>;

pub struct Terminal<K: KeySource, D: Display> {
    keys: Option<K>,
    display: D,
    on_key: Option<KeyHandler>,
}

impl Terminal<StdinKeys, StdoutDisplay> {
    /// take over STDIN/STDOUT; fails if raw mode can't be set or is already held
    pub fn acquire() -> Result<Self, io::Error> {
        let keys = StdinKeys::new()?;
        debug!("terminal in raw mode");
        Ok(Terminal::with_backends(keys, StdoutDisplay::new()))
    }
}

impl<K: KeySource, D: Display> Terminal<K, D> {
    pub fn with_backends(keys: K, display: D) -> Self {
        Terminal {
            keys: Some(keys),
            display,
            on_key: None,
        }
    }

    /// who gets keyboard bytes (strobe bit already set)
    pub fn set_key_handler(&mut self, handler: impl FnMut(u8) + 'static) {
        self.on_key = Some(Box::new(handler));
    }

    pub fn is_open(&self) -> bool {
        self.keys.is_some()
    }

    /// wait for input; a closed terminal is never readable
    pub fn poll(&mut self, timeout: Duration) -> bool {
        let Some(keys) = self.keys.as_mut() else {
            return false;
        };
        match keys.poll(timeout) {
            Ok(ready) => ready,
            Err(e) => {
                warn!("terminal input failed, closing: {}", e);
                self.close();
                false
            }
        }
    }

    /// input is ready: read one byte and pass it on if it's a real key
    pub fn on_readable(&mut self) {
        let Some(keys) = self.keys.as_mut() else {
            return;
        };
        let raw = match keys.read_byte() {
            Ok(Some(raw)) => raw,
            Ok(None) => return,
            Err(e) => {
                debug!("terminal read failed: {}", e);
                return;
            }
        };
        if raw == QUIT_KEY {
            debug!("quit key pressed");
            self.close();
            return;
        }
        match input::to_keyboard(raw) {
            Some(key) => {
                if let Some(handler) = self.on_key.as_mut() {
                    handler(key);
                }
            }
            None => trace!("dropping key 0x{:02x}", raw),
        }
    }

    /// a byte from the machine's display port
    pub fn write(&mut self, byte: u8) {
        display::put_or_log(&mut self.display, display::render(byte));
    }

    /// stop reading input and give the terminal back; a second call does nothing
    pub fn close(&mut self) {
        if self.keys.take().is_some() {
            self.on_key = None;
            debug!("terminal closed");
        }
    }

    pub fn display(&self) -> &D {
        &self.display
    }
}

impl<K: KeySource, D: Display> Drop for Terminal<K, D> {
    fn drop(&mut self) {
        self.close();
    }
}
