//! Physical memory mapping for MMIO access
//!
//! Maps a range of physical address space through `/dev/mem` and exposes
//! it as a [`Region`]. Used for the AST blocks when running on the BMC
//! itself, and for the P2A bridge BAR when running on the host.
//!
//! # Safety
//!
//! Accessing physical memory is inherently unsafe and requires root privileges.
//! The mapping is page aligned internally; every access is bounds checked
//! against the requested length and performed with volatile loads/stores.

use astctl_core::region::{check_bounds, Region};

use crate::error::{HwError, Result};

/// A mapped region of physical memory
#[cfg(any(target_os = "linux", target_os = "freebsd"))]
pub struct PhysMap {
    name: String,
    /// Pointer to the first requested byte
    ptr: *mut u8,
    /// Length of the page-aligned mapping
    map_size: usize,
    /// Requested length
    len: u64,
    /// Physical address of the first requested byte
    phys_addr: u64,
    /// Suppress stores
    dry_run: bool,
}

#[cfg(any(target_os = "linux", target_os = "freebsd"))]
impl PhysMap {
    /// Map `len` bytes of physical memory starting at `phys_addr`
    ///
    /// The physical range must correspond to device registers or memory
    /// that tolerates arbitrary volatile accesses.
    pub fn new(name: &str, phys_addr: u64, len: u64, dry_run: bool) -> Result<Self> {
        use std::fs::OpenOptions;
        use std::os::unix::fs::OpenOptionsExt;
        use std::os::unix::io::AsRawFd;

        let path = "/dev/mem";
        // O_SYNC gives uncached access on the mapped range
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(path)
            .map_err(|source| HwError::OpenFailed {
                path: path.into(),
                source,
            })?;

        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as u64;
        let page_mask = page_size - 1;
        let offset = phys_addr & page_mask;
        let aligned_addr = phys_addr & !page_mask;
        let map_size = ((len + offset + page_mask) & !page_mask) as usize;

        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                map_size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                aligned_addr as libc::off_t,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(HwError::MemoryMap {
                address: phys_addr,
                size: len,
                source: std::io::Error::last_os_error(),
            });
        }

        log::debug!(
            "Mapped {} at {:#x} (size {:#x}){}",
            name,
            phys_addr,
            len,
            if dry_run { " [no-write]" } else { "" }
        );

        Ok(Self {
            name: name.into(),
            ptr: unsafe { (ptr as *mut u8).add(offset as usize) },
            map_size,
            len,
            phys_addr,
            dry_run,
        })
    }
}

#[cfg(any(target_os = "linux", target_os = "freebsd"))]
impl Region for PhysMap {
    fn name(&self) -> &str {
        &self.name
    }

    fn base(&self) -> u64 {
        self.phys_addr
    }

    fn len(&self) -> u64 {
        self.len
    }

    #[inline]
    fn read8(&self, offset: u64) -> u8 {
        check_bounds(&self.name, offset, 1, self.len);
        let v = unsafe { core::ptr::read_volatile(self.ptr.add(offset as usize)) };
        log::trace!("{}[{:#010x}] -> {:#04x}", self.name, self.phys_addr + offset, v);
        v
    }

    #[inline]
    fn read32(&self, offset: u64) -> u32 {
        check_bounds(&self.name, offset, 4, self.len);
        debug_assert!(offset & 3 == 0, "unaligned 32-bit read");
        let v = unsafe { core::ptr::read_volatile(self.ptr.add(offset as usize) as *const u32) };
        log::trace!("{}[{:#010x}] -> {:#010x}", self.name, self.phys_addr + offset, v);
        v
    }

    #[inline]
    fn write8(&self, offset: u64, value: u8) {
        check_bounds(&self.name, offset, 1, self.len);
        log::trace!("{}[{:#010x}].8 := {:#04x}", self.name, self.phys_addr + offset, value);
        if self.dry_run {
            return;
        }
        unsafe { core::ptr::write_volatile(self.ptr.add(offset as usize), value) }
    }

    #[inline]
    fn write32(&self, offset: u64, value: u32) {
        check_bounds(&self.name, offset, 4, self.len);
        debug_assert!(offset & 3 == 0, "unaligned 32-bit write");
        log::trace!("{}[{:#010x}] := {:#010x}", self.name, self.phys_addr + offset, value);
        if self.dry_run {
            return;
        }
        unsafe { core::ptr::write_volatile(self.ptr.add(offset as usize) as *mut u32, value) }
    }
}

#[cfg(any(target_os = "linux", target_os = "freebsd"))]
impl Drop for PhysMap {
    fn drop(&mut self) {
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as u64;
        let offset = (self.phys_addr & (page_size - 1)) as usize;
        unsafe {
            libc::munmap(self.ptr.sub(offset) as *mut libc::c_void, self.map_size);
        }
    }
}

// Send + Sync are safe because we're accessing MMIO registers which
// don't have the usual memory aliasing concerns
#[cfg(any(target_os = "linux", target_os = "freebsd"))]
unsafe impl Send for PhysMap {}
#[cfg(any(target_os = "linux", target_os = "freebsd"))]
unsafe impl Sync for PhysMap {}

// Stub for other platforms
#[cfg(not(any(target_os = "linux", target_os = "freebsd")))]
pub struct PhysMap {
    never: core::convert::Infallible,
}

#[cfg(not(any(target_os = "linux", target_os = "freebsd")))]
impl PhysMap {
    /// Physical memory mapping is unavailable on this platform
    pub fn new(_name: &str, _phys_addr: u64, _len: u64, _dry_run: bool) -> Result<Self> {
        Err(HwError::NotSupported(
            "Physical memory mapping only supported on Linux and FreeBSD",
        ))
    }
}

#[cfg(not(any(target_os = "linux", target_os = "freebsd")))]
impl Region for PhysMap {
    fn name(&self) -> &str {
        match self.never {}
    }
    fn base(&self) -> u64 {
        match self.never {}
    }
    fn len(&self) -> u64 {
        match self.never {}
    }
    fn read8(&self, _offset: u64) -> u8 {
        match self.never {}
    }
    fn read32(&self, _offset: u64) -> u32 {
        match self.never {}
    }
    fn write8(&self, _offset: u64, _value: u8) {
        match self.never {}
    }
    fn write32(&self, _offset: u64, _value: u32) {
        match self.never {}
    }
}
