//! PCI device lookup
//!
//! Scans the Linux sysfs interface (/sys/bus/pci/devices) for the device
//! exposing the AST P2A bridge and reads its BAR1 from config space.

use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::{HwError, Result};

/// Default sysfs location of PCI devices
pub const SYSFS_PCI_DEVICES: &str = "/sys/bus/pci/devices";

/// PCI device information
#[derive(Debug, Clone)]
pub struct PciDevice {
    /// PCI domain (usually 0)
    pub domain: u16,
    /// PCI bus number
    pub bus: u8,
    /// PCI device (slot) number
    pub device: u8,
    /// PCI function number
    pub function: u8,
    /// Vendor ID
    pub vendor_id: u16,
    /// Device ID
    pub device_id: u16,
    /// sysfs directory of the device
    pub path: PathBuf,
}

impl PciDevice {
    /// Check if this device matches a vendor/device ID pair
    pub fn matches(&self, vendor_id: u16, device_id: u16) -> bool {
        self.vendor_id == vendor_id && self.device_id == device_id
    }

    /// Get the BDF (Bus:Device.Function) string
    pub fn bdf(&self) -> String {
        format!(
            "{:04x}:{:02x}:{:02x}.{:x}",
            self.domain, self.bus, self.device, self.function
        )
    }

    /// Read a 32-bit register from config space
    pub fn read_config32(&self, offset: u64) -> Result<u32> {
        let mut b = [0u8; 4];
        fs::File::open(self.path.join("config"))
            .and_then(|mut config| {
                config.seek(SeekFrom::Start(offset))?;
                config.read_exact(&mut b)
            })
            .map_err(|source| HwError::ConfigRead {
                bdf: self.bdf(),
                source,
            })?;
        Ok(u32::from_le_bytes(b))
    }

    /// Physical address of memory BAR `bar` (0-5), flag bits masked off
    pub fn bar_address(&self, bar: u8) -> Result<u64> {
        let raw = self.read_config32(0x10 + 4 * u64::from(bar))?;
        let addr = u64::from(raw & !0x1f);
        if addr == 0 {
            return Err(HwError::InvalidBar {
                bdf: self.bdf(),
                bar,
            });
        }
        Ok(addr)
    }
}

/// Scan the PCI bus for devices
pub fn scan_pci_bus() -> Result<Vec<PciDevice>> {
    scan_pci_dir(Path::new(SYSFS_PCI_DEVICES))
}

/// Scan a sysfs-style PCI device directory
pub fn scan_pci_dir(pci_path: &Path) -> Result<Vec<PciDevice>> {
    let entries = fs::read_dir(pci_path).map_err(HwError::PciScan)?;

    let mut devices = Vec::new();
    for entry in entries {
        let entry = entry.map_err(HwError::PciScan)?;
        let name = entry.file_name();
        if let Some(dev) = parse_pci_device(&entry.path(), &name.to_string_lossy()) {
            devices.push(dev);
        }
    }
    devices.sort_by_key(|d| (d.domain, d.bus, d.device, d.function));
    Ok(devices)
}

/// Return all devices matching `vendor_id:device_id`
pub fn find_devices(pci_path: &Path, vendor_id: u16, device_id: u16) -> Result<Vec<PciDevice>> {
    Ok(scan_pci_dir(pci_path)?
        .into_iter()
        .filter(|d| d.matches(vendor_id, device_id))
        .collect())
}

/// Parse a PCI device from sysfs
fn parse_pci_device(path: &Path, name: &str) -> Option<PciDevice> {
    // Format: "0000:00:1f.0"
    let mut parts = name.split(':');
    let domain = u16::from_str_radix(parts.next()?, 16).ok()?;
    let bus = u8::from_str_radix(parts.next()?, 16).ok()?;
    let (dev, func) = parts.next()?.split_once('.')?;
    if parts.next().is_some() {
        return None;
    }
    let device = u8::from_str_radix(dev, 16).ok()?;
    let function = u8::from_str_radix(func, 16).ok()?;

    let vendor_id = read_sysfs_hex_u16(&path.join("vendor"))?;
    let device_id = read_sysfs_hex_u16(&path.join("device"))?;

    Some(PciDevice {
        domain,
        bus,
        device,
        function,
        vendor_id,
        device_id,
        path: path.to_path_buf(),
    })
}

/// Read a hex u16 value from a sysfs file
fn read_sysfs_hex_u16(path: &Path) -> Option<u16> {
    let content = fs::read_to_string(path).ok()?;
    let content = content.trim();
    let hex_str = content.strip_prefix("0x").unwrap_or(content);
    u16::from_str_radix(hex_str, 16).ok()
}
