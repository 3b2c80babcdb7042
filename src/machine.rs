//! # machine
//!
//! Wires the pieces together and owns the boot/shutdown order.
//!
//! Boot:
//!  1. event loop
//!  2. terminal (already acquired by the caller, handed in)
//!  3. PIA behind its gate; key handler and display channel hooked up
//!  4. ROMs copied into the address space, in order
//!  5. CPU thread spawned: resets PIA and CPU, then steps until told to stop
//!  6. event loop runs on the calling thread
//!
//! Shutdown is the reverse: the loop returns (terminal closed, no timers), the
//! CPU thread is stopped and joined, the PIA is released, the terminal is
//! restored, and the event loop goes last.
//!
//! The display queue is bounded. A CPU printing faster than the terminal can
//! keep up waits on it, and the loop only writes so much per turn, so keys and
//! timers are never starved by output.

use crate::bus::{Apple1Bus, KeyboardPort, PiaPort, DISPLAY_QUEUE_LEN};
use crate::config::Config;
use crate::cpu::Cpu6502;
use crate::display::Display;
use crate::event_loop::{EventLoop, Reactor};
use crate::gate::Gate;
use crate::input::KeySource;
use crate::memory::{self, AddressSpace};
use crate::pia::Pia;
use crate::terminal::Terminal;
use crate::{EmulatorError, Result};
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// most display bytes written in one turn of the loop
const DISPLAY_BYTES_PER_TURN: usize = 256;

/// the event loop's view of the machine: a terminal plus the display feed
pub struct Session<K: KeySource, D: Display> {
    pub terminal: Terminal<K, D>,
    display: Receiver<u8>,
}

impl<K: KeySource, D: Display> Reactor for Session<K, D> {
    fn wants_input(&self) -> bool {
        self.terminal.is_open()
    }

    fn wait_input(&mut self, timeout: Duration) -> bool {
        self.terminal.poll(timeout)
    }

    fn on_input(&mut self) {
        self.terminal.on_readable();
    }

    fn on_turn(&mut self) {
        for byte in self.display.try_iter().take(DISPLAY_BYTES_PER_TURN) {
            self.terminal.write(byte);
        }
    }
}

impl<K: KeySource, D: Display> Session<K, D> {
    /// write out everything queued; only safe once the CPU has stopped
    fn drain(&mut self) {
        for byte in self.display.try_iter() {
            self.terminal.write(byte);
        }
    }
}

/// what's left after a run
pub struct Halted<K: KeySource, D: Display> {
    pub terminal: Terminal<K, D>,
    pub cpu: Cpu6502,
}

pub struct Machine<K: KeySource, D: Display> {
    event_loop: EventLoop<Session<K, D>>,
    session: Session<K, D>,
    pia: Arc<Gate<Pia>>,
    bus: Apple1Bus,
    clock_hz: Option<u64>,
}

impl<K: KeySource + 'static, D: Display + 'static> Machine<K, D> {
    /// everything short of starting the CPU
    pub fn new(config: &Config, mut terminal: Terminal<K, D>) -> Result<Self> {
        let mut event_loop = EventLoop::new(config.poll_interval);

        let pia = Arc::new(Gate::new(Pia::new()));
        let (display_tx, display_rx) = mpsc::sync_channel(DISPLAY_QUEUE_LEN);
        let keyboard = KeyboardPort::new(Arc::clone(&pia));
        terminal.set_key_handler(move |key| keyboard.press(key));

        let mut space = AddressSpace::new();
        let roms = config.rom_blocks()?;
        memory::load_roms(&mut space, &roms)?;
        info!("loaded {} ROM image(s)", roms.len());

        if let Some(limit) = config.run_for {
            event_loop.set_timeout(limit, |s: &mut Session<K, D>| {
                debug!("run time is up");
                s.terminal.close();
            });
        }

        Ok(Machine {
            event_loop,
            session: Session {
                terminal,
                display: display_rx,
            },
            bus: Apple1Bus::new(space, PiaPort::new(Arc::clone(&pia), display_tx)),
            pia,
            clock_hz: config.clock_hz,
        })
    }

    /// run until the terminal closes and no timers are left
    pub fn run(self) -> Result<Halted<K, D>> {
        let Machine {
            mut event_loop,
            mut session,
            pia,
            bus,
            clock_hz,
        } = self;

        let stop = Arc::new(AtomicBool::new(false));
        let cpu_thread = {
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("cpu".into())
                .spawn(move || run_cpu(bus, &stop, clock_hz))
                .map_err(EmulatorError::ThreadSpawn)?
        };
        info!("cpu running");

        event_loop.run(&mut session);

        stop.store(true, Ordering::Relaxed);
        // a CPU parked on a full display queue only sees the flag once
        // there's room again
        while !cpu_thread.is_finished() {
            session.on_turn();
            thread::yield_now();
        }
        let cpu = cpu_thread.join().map_err(|_| EmulatorError::CpuPanicked)?;
        info!("cpu stopped after {} cycles", cpu.cycles);
        drop(pia);
        // pick up anything written between the last turn and the stop
        session.drain();

        let Session { mut terminal, .. } = session;
        terminal.close();
        drop(event_loop);
        Ok(Halted { terminal, cpu })
    }
}

fn run_cpu(mut bus: Apple1Bus, stop: &AtomicBool, clock_hz: Option<u64>) -> Cpu6502 {
    bus.pia_mut().reset();
    let mut cpu = Cpu6502::new();
    cpu.reset(&mut bus);
    debug!("cpu reset, pc = 0x{:04x}", cpu.pc);

    let mut throttle = clock_hz.map(Throttle::new);
    while !stop.load(Ordering::Relaxed) {
        let cycles = cpu.step(&mut bus);
        if let Some(t) = throttle.as_mut() {
            t.account(cycles);
        }
    }
    cpu
}

/// Keeps executed cycles roughly in line with wall-clock time by sleeping
/// whenever a batch of cycles finishes ahead of schedule. Not cycle accurate:
/// it only stops the emulator running flat out.
struct Throttle {
    hz: u64,
    started: Instant,
    cycles: u64,
    batch: u64,
}

/// about 10ms of work at 1MHz between checks
const THROTTLE_BATCH_CYCLES: u64 = 10_000;

impl Throttle {
    fn new(hz: u64) -> Self {
        Throttle {
            hz,
            started: Instant::now(),
            cycles: 0,
            batch: 0,
        }
    }

    fn account(&mut self, cycles: u32) {
        self.cycles += cycles as u64;
        self.batch += cycles as u64;
        if self.batch < THROTTLE_BATCH_CYCLES {
            return;
        }
        self.batch = 0;
        if let Some(ahead) = self.ahead_by() {
            spin_sleep::sleep(ahead);
        }
    }

    /// how far emulated time has run past real time
    fn ahead_by(&self) -> Option<Duration> {
        let nanos = self.cycles as u128 * 1_000_000_000 / self.hz as u128;
        let emulated = Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX));
        emulated.checked_sub(self.started.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RomSource;
    use crate::display::BufferDisplay;
    use crate::input::DummyKeys;
    use crate::memory::RomBlock;
    use std::io;

    /// a display that takes its time over every character
    #[derive(Default)]
    struct SlowDisplay {
        shown: usize,
    }

    impl Display for SlowDisplay {
        fn put(&mut self, _byte: u8) -> io::Result<()> {
            thread::sleep(Duration::from_micros(20));
            self.shown += 1;
            Ok(())
        }
    }

    fn config_with(roms: Vec<RomBlock>, run_for_ms: u64) -> Config {
        Config {
            roms: roms.into_iter().map(RomSource::Block).collect(),
            run_for: Some(Duration::from_millis(run_for_ms)),
            clock_hz: None,
            poll_interval: Duration::from_millis(2),
        }
    }

    /// a program at 0x0300 that prints its message once and spins
    fn hello_rom() -> Vec<RomBlock> {
        #[rustfmt::skip]
        let program = vec![
            0xa9, 0x7f,       // LDA #$7f
            0x8d, 0x12, 0xd0, // STA $d012   DDRB
            0xa9, 0x04,       // LDA #$04
            0x8d, 0x13, 0xd0, // STA $d013   select ORB
            0xa2, 0x00,       // LDX #0
            0xbd, 0x20, 0x03, // loop: LDA $0320,X
            0xf0, 0x06,       // BEQ done
            0x8d, 0x12, 0xd0, // STA $d012
            0xe8,             // INX
            0xd0, 0xf5,       // BNE loop
            0x4c, 0x17, 0x03, // done: JMP done
        ];
        let message = vec![0xc8, 0xc9, 0x8d, 0x00]; // "HI\n"
        vec![
            RomBlock::new("hello", 0x0300, program),
            RomBlock::new("message", 0x0320, message),
            RomBlock::new("vectors", 0xfffc, vec![0x00, 0x03]),
        ]
    }

    #[test]
    fn test_runs_program_and_stops() -> Result<()> {
        let terminal = Terminal::with_backends(DummyKeys::new(b""), BufferDisplay::new());
        let machine = Machine::new(&config_with(hello_rom(), 50), terminal)?;
        let halted = machine.run()?;
        assert_eq!(halted.terminal.display().contents(), b"HI\n");
        assert!(!halted.terminal.is_open());
        assert!(halted.cpu.cycles > 0);
        Ok(())
    }

    #[test]
    fn test_output_flood_still_stops_on_time() -> Result<()> {
        #[rustfmt::skip]
        let program = vec![
            0xa9, 0x7f, 0x8d, 0x12, 0xd0, // DDRB = $7f
            0xa9, 0x04, 0x8d, 0x13, 0xd0, // select ORB
            0xa9, 0xc1,                   // LDA #'A'
            0x8d, 0x12, 0xd0,             // loop: STA $d012
            0x4c, 0x0c, 0x03,             // JMP loop
        ];
        let roms = vec![
            RomBlock::new("flood", 0x0300, program),
            RomBlock::new("vectors", 0xfffc, vec![0x00, 0x03]),
        ];
        let terminal = Terminal::with_backends(DummyKeys::new(b""), SlowDisplay::default());
        let started = Instant::now();
        let halted = Machine::new(&config_with(roms, 100), terminal)?.run()?;
        assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
        assert!(halted.terminal.display().shown > 0);
        Ok(())
    }

    #[test]
    fn test_turn_writes_a_bounded_batch() {
        let (tx, rx) = mpsc::sync_channel(DISPLAY_BYTES_PER_TURN + 10);
        for _ in 0..DISPLAY_BYTES_PER_TURN + 10 {
            tx.send(0xc1).unwrap();
        }
        let mut session = Session {
            terminal: Terminal::with_backends(DummyKeys::new(b""), BufferDisplay::new()),
            display: rx,
        };
        session.on_turn();
        assert_eq!(session.terminal.display().contents().len(), DISPLAY_BYTES_PER_TURN);
        session.on_turn();
        assert_eq!(
            session.terminal.display().contents().len(),
            DISPLAY_BYTES_PER_TURN + 10
        );
    }

    #[test]
    fn test_rom_out_of_bounds_aborts_boot() {
        let terminal = Terminal::with_backends(DummyKeys::new(b""), BufferDisplay::new());
        let roms = vec![RomBlock::new("too big", 65500, vec![0; 100])];
        let result = Machine::new(&config_with(roms, 10), terminal);
        assert!(matches!(result, Err(EmulatorError::RomOutOfBounds { .. })));
    }

    #[test]
    fn test_throttle_sleeps_when_ahead() {
        let mut t = Throttle::new(1_000);
        // 10k cycles at 1kHz is ten seconds of emulated time
        assert!(t.ahead_by().is_none() || t.ahead_by() == Some(Duration::ZERO));
        t.cycles = 10_000;
        assert!(t.ahead_by().unwrap() > Duration::from_secs(9));
    }

    #[test]
    fn test_throttle_keeps_counting_past_u64_nanos() {
        let mut t = Throttle::new(1_000_000);
        // a day at 1MHz; cycles * 1e9 no longer fits in a u64
        t.cycles = 86_400 * 1_000_000;
        let ahead = t.ahead_by().unwrap();
        assert!(ahead > Duration::from_secs(86_000));
        t.cycles += 3_600 * 1_000_000;
        assert!(t.ahead_by().unwrap() > ahead + Duration::from_secs(3_500));
    }
}
