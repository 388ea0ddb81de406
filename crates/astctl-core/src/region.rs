//! Addressable register windows
//!
//! A [`Region`] is a named window of the AST physical address space that
//! supports byte and 32-bit loads and stores. Every access is a hardware
//! side effect: implementations must never cache, merge or reorder them.
//!
//! Three realizations exist in the host back-end (direct `/dev/mem`
//! mapping, file-backed access, and the P2A bridge window), plus the
//! simulated SoC used by tests. Components obtain regions through a
//! [`RegionMapper`], which decides which realization to hand out.

use crate::error::Result;

/// A named, bounded window of registers or memory
///
/// Offsets are relative to [`Region::base`]. An offset outside
/// `0..len()` is a programming error and panics; it is never reported as
/// a recoverable condition.
pub trait Region: Send + Sync {
    /// Diagnostic name of the window (e.g. `"scu"`)
    fn name(&self) -> &str;

    /// Physical address of offset 0
    fn base(&self) -> u64;

    /// Length of the window in bytes
    fn len(&self) -> u64;

    /// Returns true for a zero-length window
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load one byte
    fn read8(&self, offset: u64) -> u8;

    /// Load one little-endian 32-bit word
    fn read32(&self, offset: u64) -> u32;

    /// Store one byte
    fn write8(&self, offset: u64, value: u8);

    /// Store one little-endian 32-bit word
    fn write32(&self, offset: u64, value: u32);
}

/// Panic unless `offset..offset + width` lies inside the window
///
/// Shared by every [`Region`] implementation so the failure message is
/// the same whichever back-end tripped it.
#[inline]
#[track_caller]
pub fn check_bounds(name: &str, offset: u64, width: u64, len: u64) {
    if offset >= len || len - offset < width {
        panic!(
            "region {}: offset {:#x} (width {}) out of bounds (len {:#x})",
            name, offset, width, len
        );
    }
}

/// Source of [`Region`]s for the chip handle and the engines
pub trait RegionMapper: Send + Sync {
    /// Map `len` bytes of AST physical address space starting at `phys_addr`
    fn map(&self, name: &'static str, phys_addr: u64, len: u64) -> Result<Box<dyn Region>>;

    /// True when this process executes on the AST's own CPU
    ///
    /// Self-destructive operations (stop, reset) are refused in that case.
    fn on_chip(&self) -> bool;
}
