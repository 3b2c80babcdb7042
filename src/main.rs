use apple1::config::{Args, Config};
use apple1::machine::Machine;
use apple1::terminal::Terminal;
use apple1::{EmulatorError, Result};
use clap::Parser;
use log::{error, info};

fn main() {
    env_logger::init();
    let config = Config::from(Args::parse());

    // everything run() acquired is released by the time it returns, so the
    // exit below skips no destructors
    let code = match run(&config) {
        Ok(()) => 0,
        Err(e) => {
            error!("{}", e);
            eprintln!("apple1: {}", e);
            -1
        }
    };
    std::process::exit(code);
}

fn run(config: &Config) -> Result<()> {
    let terminal = Terminal::acquire().map_err(EmulatorError::Terminal)?;
    let machine = Machine::new(config, terminal)?;
    let halted = machine.run()?;
    info!("halted at pc = 0x{:04x}", halted.cpu.pc);

    // shove a newline out so the shell prompt starts on a fresh line
    println!();
    Ok(())
}
