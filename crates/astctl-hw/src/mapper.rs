//! Region mapper for real hardware
//!
//! On the BMC the AST blocks are reached directly through `/dev/mem`. On
//! the host they are reached through the P2A bridge of the AST VGA
//! function; the bridge is located and its BAR1 mapped on first use, and
//! every region handed out afterwards shares that one window.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use astctl_core::region::{Region, RegionMapper};
use astctl_core::AstOptions;

use crate::arch;
use crate::error::{HwError, Result};
use crate::file::{open_backing, FileRegion};
use crate::p2a::{BridgeWindow, BAR1_LEN, P2A_DEVICE_ID, P2A_VENDOR_ID};
use crate::pci::{find_devices, SYSFS_PCI_DEVICES};
use crate::physmap::PhysMap;

/// Physical memory device
pub const DEV_MEM: &str = "/dev/mem";

/// How physical memory is accessed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMethod {
    /// mmap of `/dev/mem`
    #[default]
    Mmap,
    /// pread/pwrite on `/dev/mem`
    File,
}

/// [`RegionMapper`] backed by `/dev/mem` and, off-chip, the P2A bridge
pub struct HostMapper {
    method: AccessMethod,
    dry_run: bool,
    on_chip: bool,
    mem_path: PathBuf,
    pci_root: PathBuf,
    mem_file: Mutex<Option<Arc<File>>>,
    bridge: Mutex<Option<Arc<BridgeWindow>>>,
}

impl HostMapper {
    /// Create a mapper, probing whether we execute on the AST itself
    pub fn new(options: &AstOptions, method: AccessMethod) -> Result<Self> {
        let on_chip = arch::running_on_chip()?;
        Ok(Self::with_location(options, method, on_chip))
    }

    /// Create a mapper with an explicit execution location
    pub fn with_location(options: &AstOptions, method: AccessMethod, on_chip: bool) -> Self {
        Self {
            method,
            dry_run: options.dry_run,
            on_chip,
            mem_path: PathBuf::from(DEV_MEM),
            pci_root: PathBuf::from(SYSFS_PCI_DEVICES),
            mem_file: Mutex::new(None),
            bridge: Mutex::new(None),
        }
    }

    /// Use `path` instead of `/dev/mem` for file access
    pub fn with_mem_path(mut self, path: impl AsRef<Path>) -> Self {
        self.mem_path = path.as_ref().to_path_buf();
        self
    }

    /// Use `path` instead of the sysfs PCI device directory
    pub fn with_pci_root(mut self, path: impl AsRef<Path>) -> Self {
        self.pci_root = path.as_ref().to_path_buf();
        self
    }

    fn mem_file(&self) -> Result<Arc<File>> {
        let mut file = self.mem_file.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(f) = file.as_ref() {
            return Ok(Arc::clone(f));
        }
        let f = open_backing(&self.mem_path)?;
        *file = Some(Arc::clone(&f));
        Ok(f)
    }

    /// Map a physical range with the configured access method
    fn map_physical(&self, name: &str, phys_addr: u64, len: u64) -> Result<Box<dyn Region>> {
        Ok(match self.method {
            AccessMethod::Mmap => Box::new(PhysMap::new(name, phys_addr, len, self.dry_run)?),
            AccessMethod::File => Box::new(FileRegion::new(
                name,
                self.mem_file()?,
                phys_addr,
                len,
                self.dry_run,
            )),
        })
    }

    fn bridge(&self) -> Result<Arc<BridgeWindow>> {
        let mut bridge = self.bridge.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(b) = bridge.as_ref() {
            return Ok(Arc::clone(b));
        }

        let devices = find_devices(&self.pci_root, P2A_VENDOR_ID, P2A_DEVICE_ID)?;
        let dev = match devices.as_slice() {
            [dev] => dev,
            _ => {
                return Err(HwError::BridgeNotFound {
                    vendor_id: P2A_VENDOR_ID,
                    device_id: P2A_DEVICE_ID,
                    found: devices.len(),
                })
            }
        };
        let bar1 = dev.bar_address(1)?;
        log::info!("Using P2A bridge {} (BAR1 at {:#x})", dev.bdf(), bar1);

        // Page selects and flush reads must reach the BAR even in no-write
        // mode; only stores through the window are suppressed.
        let bar = self.map_bar(bar1)?;
        let window = BridgeWindow::new(bar, self.dry_run);
        *bridge = Some(Arc::clone(&window));
        Ok(window)
    }

    fn map_bar(&self, bar1: u64) -> Result<Box<dyn Region>> {
        Ok(match self.method {
            AccessMethod::Mmap => Box::new(PhysMap::new("p2a-bar1", bar1, BAR1_LEN, false)?),
            AccessMethod::File => Box::new(FileRegion::new(
                "p2a-bar1",
                self.mem_file()?,
                bar1,
                BAR1_LEN,
                false,
            )),
        })
    }
}

impl RegionMapper for HostMapper {
    fn map(
        &self,
        name: &'static str,
        phys_addr: u64,
        len: u64,
    ) -> astctl_core::Result<Box<dyn Region>> {
        if self.on_chip {
            return Ok(self.map_physical(name, phys_addr, len)?);
        }
        let window = self.bridge()?;
        Ok(Box::new(window.region(name, phys_addr, len)))
    }

    fn on_chip(&self) -> bool {
        self.on_chip
    }
}
