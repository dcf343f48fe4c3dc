//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use updiprog_core::device::PartCode;

/// Parse a string as a hex or decimal u8
fn parse_hex_u8(s: &str) -> Result<u8, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u8::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u8>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a fuse index (0..=10)
fn parse_fuse(s: &str) -> Result<u8, String> {
    let n = parse_hex_u8(s)?;
    if n > 10 {
        return Err(format!("Fuse index {} out of range (0-10)", n));
    }
    Ok(n)
}

fn parse_part(s: &str) -> Result<PartCode, String> {
    s.parse::<PartCode>().map_err(|e| e.to_string())
}

/// Generate help text listing the known part codes
fn part_help() -> String {
    let names: Vec<&str> = PartCode::ALL.iter().map(|p| p.name()).collect();
    format!("Target part [available: {}]", names.join(", "))
}

#[derive(Parser)]
#[command(name = "updiprog")]
#[command(
    author,
    version,
    about = "UPDI programmer for tinyAVR 0/1 and megaAVR 0 parts",
    long_about = None
)]
pub struct Cli {
    /// Verbosity level (-v debug, -vv wire trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Don't show progress bars
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Connection options shared by every command that talks to a target
#[derive(clap::Args, Debug, Clone)]
pub struct TargetArgs {
    /// Serial port the UPDI adapter is attached to
    #[arg(short, long, default_value = "/dev/ttyUSB0")]
    pub port: String,

    /// Baud rate (50 to 230400, standard rates only)
    #[arg(short, long, default_value_t = 115200)]
    pub baud: u32,

    #[arg(short = 'd', long, value_parser = parse_part, help = part_help())]
    pub part: PartCode,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show SIB, signature, fuses and user row
    Info {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Unlock the part with a full chip erase
    Erase {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Read fuses (all of them unless an index is given)
    FuseRead {
        #[command(flatten)]
        target: TargetArgs,

        /// Fuse index (0-10, hex or decimal)
        #[arg(value_parser = parse_fuse)]
        fuse: Option<u8>,
    },

    /// Write one fuse
    FuseWrite {
        #[command(flatten)]
        target: TargetArgs,

        /// Fuse index (0-10, hex or decimal)
        #[arg(value_parser = parse_fuse)]
        fuse: u8,

        /// New value (hex or decimal)
        #[arg(value_parser = parse_hex_u8)]
        value: u8,
    },

    /// Read flash to an Intel HEX file
    FlashRead {
        #[command(flatten)]
        target: TargetArgs,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Program flash from an Intel HEX file and verify it
    FlashWrite {
        #[command(flatten)]
        target: TargetArgs,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Chip erase first (unlocks the part, enables the fast write path)
        #[arg(short, long)]
        erase: bool,
    },

    /// Read EEPROM to an Intel HEX file
    EepromRead {
        #[command(flatten)]
        target: TargetArgs,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Program EEPROM from an Intel HEX file and verify it
    EepromWrite {
        #[command(flatten)]
        target: TargetArgs,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Chip erase first
        #[arg(short, long)]
        erase: bool,
    },

    /// Read the user row to an Intel HEX file
    UserrowRead {
        #[command(flatten)]
        target: TargetArgs,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write the user row from an Intel HEX file (works on locked parts)
    UserrowWrite {
        #[command(flatten)]
        target: TargetArgs,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Convert a text dump of hex bytes ("00, FF" or "0x00,0xFF") to Intel HEX
    Txt2hex {
        /// Input text file
        input: PathBuf,
        /// Output hex file
        output: PathBuf,
    },

    /// Convert an Intel HEX file to a C array initializer
    Hex2c {
        /// Input hex file
        input: PathBuf,
        /// Output C file
        output: PathBuf,
    },

    /// Convert an Intel HEX file to a raw binary of its data span
    Hex2bin {
        /// Input hex file
        input: PathBuf,
        /// Output binary file
        output: PathBuf,
    },

    /// Merge two non-overlapping Intel HEX files
    Merge {
        /// First hex file
        first: PathBuf,
        /// Second hex file
        second: PathBuf,
        /// Output hex file
        output: PathBuf,
    },

    /// List supported parts
    ListParts,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_hex_u8() {
        assert_eq!(parse_hex_u8("0x1F"), Ok(0x1F));
        assert_eq!(parse_hex_u8("200"), Ok(200));
        assert!(parse_hex_u8("0x100").is_err());
        assert!(parse_hex_u8("zz").is_err());
    }

    #[test]
    fn test_fuse_index_range() {
        assert_eq!(parse_fuse("10"), Ok(10));
        assert!(parse_fuse("11").is_err());
    }

    #[test]
    fn test_parse_fuse_write() {
        let cli = Cli::parse_from([
            "updiprog", "fuse-write", "-d", "t16k", "-b", "57600", "2", "0x7E",
        ]);
        match cli.command {
            Commands::FuseWrite {
                target,
                fuse,
                value,
            } => {
                assert_eq!(target.part, PartCode::T16k);
                assert_eq!(target.baud, 57600);
                assert_eq!(target.port, "/dev/ttyUSB0");
                assert_eq!(fuse, 2);
                assert_eq!(value, 0x7E);
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn test_unknown_part_rejected() {
        assert!(Cli::try_parse_from(["updiprog", "info", "-d", "t64k"]).is_err());
    }

    #[test]
    fn test_global_verbosity() {
        let cli = Cli::parse_from(["updiprog", "-vv", "list-parts", "-q"]);
        assert_eq!(cli.verbose, 2);
        assert!(cli.quiet);
    }
}
