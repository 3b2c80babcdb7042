///
/// ## Design
///
/// * the Apple-1 as its bus saw it: 64K of RAM with a MC6821 PIA mirrored
///   through 0xD000-0xDFFF, keyboard on port A, display on port B
/// * the CPU runs flat out on its own thread; nothing else touches RAM
/// * terminal I/O happens on the main thread inside a small event loop
/// * the PIA is the only shared state, and sits behind a spinning gate
/// * no cycle-accurate timing; an optional throttle keeps speed sane
///
/// Model
///
/// main
///  |-- config (command line, ROM list)
///  |-- terminal (raw mode, key protocol, display protocol)
///  `-- machine
///       |-- event loop (main thread)
///       |    |-- key ready -> terminal -> keyboard port -> PIA (gated)
///       |    |-- display channel -> terminal
///       |    `-- timers
///       `-- cpu thread
///            |-- reset PIA (gated), reset CPU
///            `-- loop { step } until stopped
///                 `-- bus: RAM | PIA (gated) -> display channel
pub mod bus;
pub mod config;
pub mod cpu;
pub mod display;
pub mod event_loop;
pub mod gate;
pub mod input;
pub mod machine;
pub mod memory;
pub mod pia;
pub mod terminal;

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EmulatorError>;

/// Everything that can stop the machine booting. Once it's running, nothing
/// is fatal: bad keys are dropped and terminal errors are only logged.
#[derive(Debug, Error)]
pub enum EmulatorError {
    #[error("couldn't take over the terminal: {0}")]
    Terminal(#[source] io::Error),
    #[error("ROM {name} ({len} bytes at 0x{offset:04x}) runs past the end of memory")]
    RomOutOfBounds {
        name: String,
        offset: usize,
        len: usize,
    },
    #[error("couldn't read ROM {}: {source}", .path.display())]
    RomRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("couldn't start the CPU thread: {0}")]
    ThreadSpawn(#[source] io::Error),
    #[error("the CPU thread panicked")]
    CpuPanicked,
}
