//! astctl-hw - host back-end for AST SoC access
//!
//! Provides the [`RegionMapper`](astctl_core::RegionMapper) used against
//! real hardware.
//!
//! # Access paths
//!
//! - On the BMC itself (`armv6l`), AST blocks are mapped directly from
//!   `/dev/mem`, either with mmap or with positioned file I/O.
//! - On the host, the AST VGA function (PCI 1a03:2000) is located through
//!   sysfs and its BAR1 is used as a paged window onto the AST address
//!   space (the P2A bridge).
//!
//! All paths honor no-write mode: stores are dropped while loads and
//! bridge bookkeeping still happen.

pub mod arch;
pub mod error;
pub mod file;
pub mod mapper;
pub mod p2a;
pub mod pci;
pub mod physmap;

pub use arch::running_on_chip;
pub use error::{HwError, Result};
pub use file::FileRegion;
pub use mapper::{AccessMethod, HostMapper};
pub use p2a::{BridgeRegion, BridgeWindow};
pub use pci::{scan_pci_bus, PciDevice};
pub use physmap::PhysMap;
