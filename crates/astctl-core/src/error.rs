//! Error types for astctl-core
//!
//! Almost every variant is fatal: the hardware and our view of it have
//! diverged (or never matched) and the running operation must be abandoned.
//! The one exception is [`Error::Nack`], a normal negative acknowledgment
//! from an I2C slave that the caller may handle.

use std::time::Duration;
use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Silicon revision register holds an id we do not know how to reset
    #[error("don't know how to handle AST chip with silicon id {0:#010x}")]
    UnknownSilicon(u32),

    /// Operation would stop or reset the SoC we are executing on
    #[error("cannot {0} the AST SoC this program is running on")]
    SelfDestructive(&'static str),

    /// Operation is not available on this silicon family
    #[error("{op} is only supported on {required}")]
    UnsupportedFamily {
        op: &'static str,
        required: &'static str,
    },

    /// I2C bus number outside 0..14
    #[error("invalid i2c bus {0} (valid: 0-13)")]
    InvalidBus(u8),

    /// I2C slave address does not fit in 7 bits
    #[error("invalid i2c address {0:#04x} (valid: 0x00-0x7f)")]
    InvalidAddress(u8),

    /// I2C transaction with neither bytes to write nor bytes to read
    #[error("asti2c-{0}: empty transaction")]
    EmptyTransfer(u8),

    /// I2C bus has no pin-function bit in SCU_PINMUX5
    #[error("i2c bus {0} has no SCU pin-function control")]
    NoPinFunction(u8),

    /// I2C channel did not come back to the idle encoding after a reset
    #[error("cannot initialize i2c bus {bus}, cmd = {cmd:#010x}")]
    I2cInit { bus: u8, cmd: u32 },

    /// I2C command register holds an encoding not valid for the next step
    #[error("asti2c-{bus}: {op} with unexpected cmd = {cmd:#010x} (sts = {sts:#010x})")]
    I2cProtocol {
        bus: u8,
        op: &'static str,
        cmd: u32,
        sts: u32,
    },

    /// I2C status register holds something other than the expected completion code
    #[error("asti2c-{bus}: {op} completed with sts = {sts:#010x} (expected {expected:#x})")]
    I2cStatus {
        bus: u8,
        op: &'static str,
        sts: u32,
        expected: u32,
    },

    /// I2C command did not complete in time; the bus is wedged
    #[error("timeout on i2c bus {bus} during {op} after {elapsed:?}, cmd = {cmd:#010x}, sts = {sts:#010x}")]
    I2cTimeout {
        bus: u8,
        op: &'static str,
        cmd: u32,
        sts: u32,
        elapsed: Duration,
    },

    /// I2C slave did not acknowledge a transmitted byte
    #[error("asti2c-{bus}: byte {index} ({byte:#04x}) was nacked (sts = {sts:#010x})")]
    Nack { bus: u8, byte: u8, index: usize, sts: u32 },

    /// JEDEC id is not in the flash chip table
    #[error("SPI flash id {0:#08x} unknown")]
    UnknownFlash(u32),

    /// FMC chip select 0 is not set up for SPI flash
    #[error("FMC CE0 is not a SPI flash (CE type register = {0:#010x})")]
    Ce0NotSpi(u32),

    /// SPI flash status register holds unexpected bits
    #[error("{op} at {addr:#x}: flash status = {status:#04x}")]
    FlashStatus {
        op: &'static str,
        addr: u32,
        status: u8,
    },

    /// Flash write-in-progress bit did not clear in time
    #[error("timeout after {elapsed:?} waiting for flash operation to finish, status = {status:#04x}")]
    FlashTimeout { status: u8, elapsed: Duration },

    /// No known command sequence switches this chip's addressing mode
    #[error("don't know how to set {bytes}-byte addressing on flash {jedec_id:#08x}")]
    UnsupportedAddressSwitch { jedec_id: u32, bytes: u8 },

    /// Controller and flash chip disagree about 4-byte addressing
    #[error("FMC 4-byte mode ({controller}) != flash 4-byte mode ({chip})")]
    AddressModeMismatch { controller: bool, chip: bool },

    /// Offset does not fit the 3-byte address of a 3-byte opcode
    #[error("cannot address {addr:#x} with 3-byte opcode {opcode:#04x}")]
    AddressTooLarge { opcode: u8, addr: u32 },

    /// Flash offset is not aligned to an erase block
    #[error("offset {offset:#x} is not aligned to the {block:#x} erase block")]
    Unaligned { offset: u32, block: u32 },

    /// Range extends past the end of the flash chip
    #[error("range {offset:#x}+{len:#x} exceeds flash size {size:#x}")]
    OutOfRange { offset: u32, len: usize, size: u32 },

    /// Full-range read back after a write does not match the source
    #[error("reread comparison failed at flash offset {offset:#x}")]
    VerifyFailed { offset: u32 },

    /// U-Boot environment cannot be placed into the image
    #[error("u-boot environment: {0}")]
    Environment(String),

    /// Invalid key or value in an option list
    #[error("invalid option {key}={value}")]
    InvalidOption { key: String, value: String },

    /// Failure in the platform back-end (mapping, PCI lookup)
    #[error("platform error: {0}")]
    Platform(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Returns true when the caller may carry on with the bus or device
    ///
    /// Only an I2C NACK qualifies: the transaction was cleanly terminated
    /// with a stop and the controller is idle again.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Nack { .. })
    }
}

/// Result type alias using the core Error type
pub type Result<T> = std::result::Result<T, Error>;
