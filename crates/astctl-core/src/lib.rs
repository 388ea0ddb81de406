//! astctl-core - control plane for Aspeed AST2400/AST2500 BMCs
//!
//! This crate implements everything that only needs register access:
//! identifying the SoC, stopping / resetting / resuming it, driving its I2C
//! controller as a bus master and programming the SPI-NOR boot flash
//! behind its firmware memory controller.
//!
//! Register access goes through the [`Region`] trait. Regions are handed
//! out by a [`RegionMapper`]: the `astctl-hw` crate maps physical memory
//! directly or through the P2A PCI bridge, and `astctl-sim` provides an
//! in-process model of the SoC.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use astctl_core::{AstHandle, AstOptions};
//!
//! fn dump_flash(mapper: Arc<dyn astctl_core::RegionMapper>) -> astctl_core::Result<Vec<u8>> {
//!     let handle = AstHandle::new(mapper, AstOptions::default())?;
//!     let fmc = handle.fmc()?;
//!     fmc.read(0, fmc.size() as usize)
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod error;
pub mod flash;
pub mod fmc;
pub mod handle;
pub mod i2c;
pub mod options;
pub mod region;
pub mod regs;
pub mod silicon;
pub mod uboot_env;

pub use error::{Error, Result};
pub use fmc::Fmc;
pub use handle::{AstHandle, PrevState};
pub use i2c::I2cBus;
pub use options::{AddrMode, AstOptions};
pub use region::{Region, RegionMapper};
pub use silicon::{identify, AstModel, Family, SiliconId};
