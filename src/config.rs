use crate::memory::RomBlock;
use crate::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Apple-1 emulator
#[derive(Parser, Debug)]
#[command(name = "apple1")]
#[command(about = "An Apple-1 in your terminal. Ctrl+C quits.", long_about = None)]
pub struct Args {
    /// Extra ROM image, as ADDR:PATH with ADDR in hex (may be repeated)
    #[arg(short, long = "rom", value_name = "ADDR:PATH", value_parser = parse_rom_arg)]
    pub roms: Vec<RomFile>,

    /// Don't load the built-in Woz Monitor
    #[arg(long)]
    pub no_monitor: bool,

    /// Quit after this many milliseconds
    #[arg(long, value_name = "MS")]
    pub run_for: Option<u64>,

    /// Throttle the CPU to roughly this many cycles per second
    #[arg(long, value_name = "HZ", value_parser = clap::value_parser!(u64).range(1..))]
    pub clock_hz: Option<u64>,

    /// Longest the event loop waits before flushing display output
    #[arg(long, value_name = "MS", default_value = "10")]
    pub poll_ms: u64,
}

/// a ROM image on disk and where to put it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomFile {
    pub offset: usize,
    pub path: PathBuf,
}

fn parse_rom_arg(s: &str) -> std::result::Result<RomFile, String> {
    let (addr, path) = s
        .split_once(':')
        .ok_or_else(|| format!("expected ADDR:PATH, got '{}'", s))?;
    let digits = addr
        .trim_start_matches("0x")
        .trim_start_matches("0X")
        .trim_start_matches('$');
    let offset = usize::from_str_radix(digits, 16)
        .map_err(|e| format!("bad ROM address '{}': {}", addr, e))?;
    if path.is_empty() {
        return Err(format!("no path given for ROM at '{}'", addr));
    }
    Ok(RomFile {
        offset,
        path: PathBuf::from(path),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RomSource {
    Block(RomBlock),
    File(RomFile),
}

impl RomSource {
    pub fn load(&self) -> Result<RomBlock> {
        match self {
            RomSource::Block(block) => Ok(block.clone()),
            RomSource::File(file) => RomBlock::from_file(&file.path, file.offset),
        }
    }
}

/// everything the machine needs to know before it boots
#[derive(Debug, Clone)]
pub struct Config {
    /// loaded in this order
    pub roms: Vec<RomSource>,
    /// close the terminal after this long
    pub run_for: Option<Duration>,
    pub clock_hz: Option<u64>,
    pub poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            roms: vec![RomSource::Block(RomBlock::woz_monitor())],
            run_for: None,
            clock_hz: None,
            poll_interval: Duration::from_millis(10),
        }
    }
}

impl Config {
    /// read every ROM, in order
    pub fn rom_blocks(&self) -> Result<Vec<RomBlock>> {
        self.roms.iter().map(RomSource::load).collect()
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        let mut roms = Vec::new();
        if !args.no_monitor {
            roms.push(RomSource::Block(RomBlock::woz_monitor()));
        }
        roms.extend(args.roms.into_iter().map(RomSource::File));
        Config {
            roms,
            run_for: args.run_for.map(Duration::from_millis),
            clock_hz: args.clock_hz,
            poll_interval: Duration::from_millis(args.poll_ms.max(1)),
        }
    }
}
