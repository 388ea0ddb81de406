//! Error types for the host back-end

use thiserror::Error;

/// Host back-end errors
#[derive(Debug, Error)]
pub enum HwError {
    /// Failed to open the physical memory device
    #[error("Failed to open {path}: {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// mmap of a physical range failed
    #[error("Failed to map memory at {address:#x} (size {size:#x}): {source}")]
    MemoryMap {
        address: u64,
        size: u64,
        #[source]
        source: std::io::Error,
    },

    /// PCI sysfs tree missing or unreadable
    #[error("PCI scan failed: {0}")]
    PciScan(#[source] std::io::Error),

    /// PCI config space read failed
    #[error("Failed to read PCI config of {bdf}: {source}")]
    ConfigRead {
        bdf: String,
        #[source]
        source: std::io::Error,
    },

    /// Not exactly one bridge device present
    #[error("Cannot find pci {vendor_id:04x}:{device_id:04x} for access to ast (found {found})")]
    BridgeNotFound {
        vendor_id: u16,
        device_id: u16,
        found: usize,
    },

    /// BAR register holds no usable address
    #[error("BAR{bar} of {bdf} is not assigned")]
    InvalidBar { bdf: String, bar: u8 },

    /// Architecture probe failed
    #[error("uname failed: {0}")]
    Uname(#[source] std::io::Error),

    /// Not available on this platform
    #[error("Not supported: {0}")]
    NotSupported(&'static str),
}

impl From<HwError> for astctl_core::Error {
    fn from(e: HwError) -> Self {
        astctl_core::Error::Platform(Box::new(e))
    }
}

/// Result type for host back-end operations
pub type Result<T> = std::result::Result<T, HwError>;
