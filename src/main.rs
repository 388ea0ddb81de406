//! astctl - Aspeed AST2400/AST2500 BMC control tool
//!
//! Reaches the BMC either from the host through the P2A PCI bridge or from
//! the BMC's own CPU through `/dev/mem`, and offers:
//! - SoC identification and stop / reset / resume
//! - raw I2C master transactions on the BMC's buses
//! - reading and reflashing the SPI boot flash
//!
//! With the `sim` feature, `--sim` runs every command against an
//! in-process model of an AST2500.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    match cli.command {
        Commands::Info => commands::chip::run_info(&cli.target),
        Commands::Reset => {
            let handle = commands::open_handle(&cli.target)?;
            commands::chip::run_reset(&handle)
        }
        Commands::SpiInfo => {
            let handle = commands::open_handle(&cli.target)?;
            commands::spi::run_info(&handle)
        }
        Commands::SpiRead {
            output,
            offset,
            length,
            no_restart,
        } => {
            let handle = commands::open_handle(&cli.target)?;
            commands::spi::run_read(&handle, &output, offset, length, !no_restart)
        }
        Commands::SpiWrite {
            input,
            offset,
            env,
            no_restart,
        } => {
            let handle = commands::open_handle(&cli.target)?;
            commands::spi::run_write(&handle, &input, offset, env.as_deref(), !no_restart)
        }
        Commands::I2c {
            bus,
            addr,
            write,
            read,
        } => {
            let handle = commands::open_handle(&cli.target)?;
            commands::i2c::run_transfer(&handle, bus, addr, write.as_deref(), read)
        }
        Commands::I2cPinsOff { bus, seconds } => {
            let handle = commands::open_handle(&cli.target)?;
            commands::i2c::run_pins_off(&handle, bus, seconds)
        }
        Commands::I2cSlowClock { bus, seconds } => {
            let handle = commands::open_handle(&cli.target)?;
            commands::i2c::run_slow_clock(&handle, bus, seconds)
        }
    }
}
