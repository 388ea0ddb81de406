//! Runtime options threaded through the chip handle and the engines

use std::time::Duration;

use crate::error::{Error, Result};

/// Default budget for one I2C command to complete
pub const DEFAULT_I2C_TIMEOUT: Duration = Duration::from_secs(1);
/// Default budget for one flash erase or page program to complete
pub const DEFAULT_FLASH_TIMEOUT: Duration = Duration::from_secs(10);

/// SPI flash addressing mode override
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrMode {
    /// 3-byte addresses (up to 16 MiB)
    ThreeByte,
    /// 4-byte addresses
    FourByte,
}

impl AddrMode {
    /// Parse `3`, `3b`, `4` or `4b`
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "3" | "3b" => Some(Self::ThreeByte),
            "4" | "4b" => Some(Self::FourByte),
            _ => None,
        }
    }

    /// Number of address bytes
    pub fn bytes(self) -> u8 {
        match self {
            Self::ThreeByte => 3,
            Self::FourByte => 4,
        }
    }
}

/// Options for the chip handle, the region back-ends and the engines
#[derive(Debug, Clone)]
pub struct AstOptions {
    /// Suppress stores to the AST while keeping all other bookkeeping
    pub dry_run: bool,
    /// On reset, let watchdog 1 reset the full SoC instead of the ARM core
    pub soc_reset: bool,
    /// On reset (AST2500), include the LPC domain in the reset mask
    pub lpc_reset: bool,
    /// Validate the I2C command register before every byte
    pub extra_checks: bool,
    /// Switch the flash chip and the FMC to this addressing mode
    pub spi_addr_mode: Option<AddrMode>,
    /// Budget for one I2C command
    pub i2c_timeout: Duration,
    /// Budget for one flash erase or page program
    pub flash_timeout: Duration,
}

impl Default for AstOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            soc_reset: false,
            lpc_reset: false,
            extra_checks: true,
            spi_addr_mode: None,
            i2c_timeout: DEFAULT_I2C_TIMEOUT,
            flash_timeout: DEFAULT_FLASH_TIMEOUT,
        }
    }
}

impl AstOptions {
    /// Create options with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable no-write mode
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Select full SoC reset on watchdog expiry
    pub fn with_soc_reset(mut self, soc_reset: bool) -> Self {
        self.soc_reset = soc_reset;
        self
    }

    /// Include LPC in the AST2500 reset mask
    pub fn with_lpc_reset(mut self, lpc_reset: bool) -> Self {
        self.lpc_reset = lpc_reset;
        self
    }

    /// Enable or disable I2C command register checks
    pub fn with_extra_checks(mut self, extra_checks: bool) -> Self {
        self.extra_checks = extra_checks;
        self
    }

    /// Request an addressing mode switch when the flash engine starts
    pub fn with_spi_addr_mode(mut self, mode: Option<AddrMode>) -> Self {
        self.spi_addr_mode = mode;
        self
    }

    /// Set the I2C command budget
    pub fn with_i2c_timeout(mut self, timeout: Duration) -> Self {
        self.i2c_timeout = timeout;
        self
    }

    /// Set the flash erase/program budget
    pub fn with_flash_timeout(mut self, timeout: Duration) -> Self {
        self.flash_timeout = timeout;
        self
    }

    /// Parse options from key-value pairs
    ///
    /// Supported options:
    /// - `noop=0|1`
    /// - `soc=0|1`
    /// - `lpc=0|1`
    /// - `extra_checks=0|1`
    /// - `spi_mode=3|4`
    /// - `i2c_timeout_ms=<n>`
    /// - `flash_timeout_ms=<n>`
    pub fn from_options(options: &[(&str, &str)]) -> Result<Self> {
        let mut opts = Self::default();

        for (key, value) in options {
            let invalid = || Error::InvalidOption {
                key: key.to_string(),
                value: value.to_string(),
            };
            match *key {
                "noop" | "dry_run" => opts.dry_run = parse_bool(value).ok_or_else(invalid)?,
                "soc" => opts.soc_reset = parse_bool(value).ok_or_else(invalid)?,
                "lpc" => opts.lpc_reset = parse_bool(value).ok_or_else(invalid)?,
                "extra_checks" | "devcheck" => {
                    opts.extra_checks = parse_bool(value).ok_or_else(invalid)?
                }
                "spi_mode" => opts.spi_addr_mode = Some(AddrMode::parse(value).ok_or_else(invalid)?),
                "i2c_timeout_ms" => {
                    let ms = value.parse::<u64>().map_err(|_| invalid())?;
                    opts.i2c_timeout = Duration::from_millis(ms);
                }
                "flash_timeout_ms" => {
                    let ms = value.parse::<u64>().map_err(|_| invalid())?;
                    opts.flash_timeout = Duration::from_millis(ms);
                }
                _ => {
                    log::warn!("Unknown option: {}={}", key, value);
                }
            }
        }

        Ok(opts)
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = AstOptions::new();
        assert!(!opts.dry_run);
        assert!(opts.extra_checks);
        assert_eq!(opts.spi_addr_mode, None);
        assert_eq!(opts.i2c_timeout, Duration::from_secs(1));
        assert_eq!(opts.flash_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_from_options() {
        let opts = AstOptions::from_options(&[
            ("soc", "1"),
            ("lpc", "true"),
            ("spi_mode", "4b"),
            ("extra_checks", "0"),
            ("flash_timeout_ms", "250"),
        ])
        .unwrap();
        assert!(opts.soc_reset);
        assert!(opts.lpc_reset);
        assert!(!opts.extra_checks);
        assert_eq!(opts.spi_addr_mode, Some(AddrMode::FourByte));
        assert_eq!(opts.flash_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_from_options_rejects_bad_value() {
        let err = AstOptions::from_options(&[("spi_mode", "5")]).unwrap_err();
        assert!(matches!(err, Error::InvalidOption { .. }));
    }
}
