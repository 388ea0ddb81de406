//! File-backed region
//!
//! Accesses physical memory with positioned reads and writes on the memory
//! device instead of an mmap. Slower, but works on kernels that refuse to
//! map the range and lets a plain file stand in for physical memory.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::Path;
use std::sync::Arc;

use astctl_core::region::{check_bounds, Region};

use crate::error::{HwError, Result};

/// Open the backing device or file for reading and writing
pub fn open_backing(path: &Path) -> Result<Arc<File>> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|source| HwError::OpenFailed {
            path: path.display().to_string(),
            source,
        })?;
    Ok(Arc::new(file))
}

/// A window accessed with pread/pwrite at `base + offset`
///
/// An I/O error on an individual access cannot be reported through
/// [`Region`] and aborts with a panic.
pub struct FileRegion {
    name: String,
    file: Arc<File>,
    base: u64,
    len: u64,
    dry_run: bool,
}

impl FileRegion {
    /// Create a window over `len` bytes of `file` starting at `base`
    pub fn new(name: &str, file: Arc<File>, base: u64, len: u64, dry_run: bool) -> Self {
        Self {
            name: name.into(),
            file,
            base,
            len,
            dry_run,
        }
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) {
        let pos = self.base + offset;
        if let Err(e) = self.file.read_exact_at(buf, pos) {
            panic!("{}: read of {} bytes at {:#x} failed: {}", self.name, buf.len(), pos, e);
        }
    }

    fn write_at(&self, offset: u64, buf: &[u8]) {
        let pos = self.base + offset;
        if self.dry_run {
            return;
        }
        if let Err(e) = self.file.write_all_at(buf, pos) {
            panic!("{}: write of {} bytes at {:#x} failed: {}", self.name, buf.len(), pos, e);
        }
    }
}

impl Region for FileRegion {
    fn name(&self) -> &str {
        &self.name
    }

    fn base(&self) -> u64 {
        self.base
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn read8(&self, offset: u64) -> u8 {
        check_bounds(&self.name, offset, 1, self.len);
        let mut b = [0u8; 1];
        self.read_at(offset, &mut b);
        log::trace!("{}[{:#010x}] -> {:#04x}", self.name, self.base + offset, b[0]);
        b[0]
    }

    fn read32(&self, offset: u64) -> u32 {
        check_bounds(&self.name, offset, 4, self.len);
        let mut b = [0u8; 4];
        self.read_at(offset, &mut b);
        let v = u32::from_le_bytes(b);
        log::trace!("{}[{:#010x}] -> {:#010x}", self.name, self.base + offset, v);
        v
    }

    fn write8(&self, offset: u64, value: u8) {
        check_bounds(&self.name, offset, 1, self.len);
        log::trace!("{}[{:#010x}].8 := {:#04x}", self.name, self.base + offset, value);
        self.write_at(offset, &[value]);
    }

    fn write32(&self, offset: u64, value: u32) {
        check_bounds(&self.name, offset, 4, self.len);
        log::trace!("{}[{:#010x}] := {:#010x}", self.name, self.base + offset, value);
        self.write_at(offset, &value.to_le_bytes());
    }
}
