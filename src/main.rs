//! updiprog - UPDI programmer for tinyAVR 0/1 and megaAVR 0 parts
//!
//! Talks to the target through a USB serial adapter whose TX and RX lines
//! are tied together (through a resistor) to form the single UPDI wire.
//!
//! # Commands
//!
//! - **Device commands** (info, erase, fuses, flash/EEPROM/user row
//!   read and write) open a UPDI session on the serial port
//! - **Hex utilities** (txt2hex, hex2c, hex2bin, merge) work on files only

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use commands::device::{self, with_session};
use updiprog_core::device::MemoryKind;

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

    // Hard stop: the OS closes the port, the target keeps whatever pages
    // were already committed
    ctrlc::set_handler(|| {
        log::warn!("Interrupted, exiting");
        std::process::exit(130);
    })?;

    let quiet = cli.quiet;
    let result = match cli.command {
        Commands::Info { target } => with_session(&target, device::run_info),
        Commands::Erase { target } => with_session(&target, device::run_erase),
        Commands::FuseRead { target, fuse } => {
            with_session(&target, |s| device::run_fuse_read(s, fuse))
        }
        Commands::FuseWrite {
            target,
            fuse,
            value,
        } => with_session(&target, |s| device::run_fuse_write(s, fuse, value)),
        Commands::FlashRead { target, output } => with_session(&target, |s| {
            device::run_read(s, MemoryKind::Flash, &output, quiet)
        }),
        Commands::FlashWrite {
            target,
            input,
            erase,
        } => with_session(&target, |s| {
            device::run_write(s, MemoryKind::Flash, &input, erase, quiet)
        }),
        Commands::EepromRead { target, output } => with_session(&target, |s| {
            device::run_read(s, MemoryKind::Eeprom, &output, quiet)
        }),
        Commands::EepromWrite {
            target,
            input,
            erase,
        } => with_session(&target, |s| {
            device::run_write(s, MemoryKind::Eeprom, &input, erase, quiet)
        }),
        Commands::UserrowRead { target, output } => with_session(&target, |s| {
            device::run_read(s, MemoryKind::UserRow, &output, quiet)
        }),
        Commands::UserrowWrite { target, input } => {
            with_session(&target, |s| device::run_userrow_write(s, &input, quiet))
        }
        Commands::Txt2hex { input, output } => commands::hex::run_txt2hex(&input, &output),
        Commands::Hex2c { input, output } => commands::hex::run_hex2c(&input, &output),
        Commands::Hex2bin { input, output } => commands::hex::run_hex2bin(&input, &output),
        Commands::Merge {
            first,
            second,
            output,
        } => commands::hex::run_merge(&first, &second, &output),
        Commands::ListParts => {
            commands::list_parts();
            Ok(())
        }
    };

    result
}
