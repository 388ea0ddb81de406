//! CLI argument parsing

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a 7-bit I2C slave address
fn parse_i2c_addr(s: &str) -> Result<u8, String> {
    let addr = parse_hex_u32(s)?;
    if addr > 0x7f {
        return Err(format!("Address {:#x} is not a 7-bit address", addr));
    }
    Ok(addr as u8)
}

/// Parse a hex byte string such as `0a1b` or `0a:1b`
pub fn parse_hex_bytes(s: &str) -> Result<Vec<u8>, String> {
    let digits: String = s
        .strip_prefix("0x")
        .unwrap_or(s)
        .chars()
        .filter(|c| !matches!(c, ':' | ' ' | ','))
        .collect();
    if digits.len() % 2 != 0 {
        return Err(format!("Odd number of hex digits in '{}'", s));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|e| format!("Invalid hex byte '{}': {}", &digits[i..i + 2], e))
        })
        .collect()
}

#[derive(Parser)]
#[command(name = "astctl")]
#[command(author, version, about = "Aspeed AST2400/AST2500 BMC control tool", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(flatten)]
    pub target: TargetArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// How the AST is reached and how it behaves on restart
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Do not write to AST registers (reads and bridge paging still happen)
    #[arg(long, global = true)]
    pub noop: bool,

    /// Reset the whole SoC on restart instead of the ARM core only
    #[arg(long, global = true)]
    pub soc: bool,

    /// Include the LPC controller in the AST2500 restart reset mask
    #[arg(long, global = true)]
    pub lpc: bool,

    /// Force the SPI flash address mode (3 or 4 bytes)
    #[arg(long, global = true, value_name = "3|4")]
    pub spi_mode: Option<String>,

    /// Disable I2C protocol sanity checks
    #[arg(long, global = true)]
    pub no_extra_checks: bool,

    /// Access physical memory with pread/pwrite instead of mmap
    #[arg(long, global = true)]
    pub file_access: bool,

    /// I2C command timeout in milliseconds
    #[arg(long, global = true)]
    pub i2c_timeout_ms: Option<u64>,

    /// SPI program/erase timeout in milliseconds
    #[arg(long, global = true)]
    pub flash_timeout_ms: Option<u64>,

    /// Run against the in-process SoC model
    #[cfg(feature = "sim")]
    #[arg(long, global = true)]
    pub sim: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Identify the SoC and show enabled I2C buses
    Info,

    /// Stop the AST and restart it with a clean core reset
    ///
    /// On the chip itself this resumes a core stopped by another agent.
    Reset,

    /// Show the FMC (SPI flash controller) configuration
    SpiInfo,

    /// Read the SPI boot flash to a file
    SpiRead {
        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Start offset (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        offset: u32,

        /// Number of bytes to read (default: to the end of the chip)
        #[arg(long, value_parser = parse_hex_u32)]
        length: Option<u32>,

        /// Leave the AST stopped after reading
        #[arg(long)]
        no_restart: bool,
    },

    /// Write a file to the SPI boot flash and verify it
    SpiWrite {
        /// Input file
        #[arg(short, long)]
        input: PathBuf,

        /// Start offset, aligned to the erase block (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        offset: u32,

        /// U-Boot environment (key=value lines) to place in the image
        #[arg(long)]
        env: Option<PathBuf>,

        /// Leave the AST stopped after writing
        #[arg(long)]
        no_restart: bool,
    },

    /// Run one I2C master transaction
    I2c {
        /// Bus number
        #[arg(short, long)]
        bus: u8,

        /// 7-bit slave address (hex or decimal)
        #[arg(short, long, value_parser = parse_i2c_addr)]
        addr: u8,

        /// Bytes to write, as hex (e.g. 0a1b or 0a:1b)
        #[arg(short, long)]
        write: Option<String>,

        /// Number of bytes to read after the write
        #[arg(short, long, default_value = "0")]
        read: usize,
    },

    /// Keep the pins of an I2C bus disabled
    I2cPinsOff {
        /// Bus number
        #[arg(short, long)]
        bus: u8,

        /// Seconds to keep watching
        #[arg(long, default_value = "120")]
        seconds: u64,
    },

    /// Keep the clock of an I2C bus slowed down
    I2cSlowClock {
        /// Bus number
        #[arg(short, long)]
        bus: u8,

        /// Seconds to keep watching
        #[arg(long, default_value = "120")]
        seconds: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_hex_u32() {
        assert_eq!(parse_hex_u32("0x10000"), Ok(0x10000));
        assert_eq!(parse_hex_u32("4096"), Ok(4096));
        assert!(parse_hex_u32("0xzz").is_err());
    }

    #[test]
    fn test_parse_hex_bytes() {
        assert_eq!(parse_hex_bytes("0a1b"), Ok(vec![0x0a, 0x1b]));
        assert_eq!(parse_hex_bytes("0x0a:ff"), Ok(vec![0x0a, 0xff]));
        assert!(parse_hex_bytes("abc").is_err());
    }

    #[test]
    fn test_i2c_addr_must_be_7_bit() {
        assert_eq!(parse_i2c_addr("0x50"), Ok(0x50));
        assert!(parse_i2c_addr("0x80").is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "astctl", "i2c", "-b", "3", "-a", "0x50", "-w", "00", "-r", "2", "--noop", "-vv",
        ])
        .unwrap();
        assert!(cli.target.noop);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::I2c {
                bus,
                addr,
                write,
                read,
            } => {
                assert_eq!((bus, addr, read), (3, 0x50, 2));
                assert_eq!(write.as_deref(), Some("00"));
            }
            _ => panic!("wrong subcommand"),
        }
    }
}
