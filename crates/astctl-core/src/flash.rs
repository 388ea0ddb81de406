//! Verified flash write workflow
//!
//! [`write_image`] walks the target range one erase block at a time: read
//! back, skip the block if it already holds the target bytes, otherwise
//! erase and program it. After the last block the whole range is read back
//! and compared against the source. A mismatch is fatal; a partially
//! flashed part is never reported as success.

use crate::error::{Error, Result};
use crate::fmc::Fmc;

/// Block-erasable NOR flash as seen by the write workflow
pub trait NorFlash {
    /// Total size in bytes
    fn size(&self) -> u32;

    /// Erase granularity in bytes
    fn erase_size(&self) -> u32;

    /// Read `len` bytes at `offset`
    fn read(&self, offset: u32, len: usize) -> Result<Vec<u8>>;

    /// Erase the block starting at `offset`
    fn erase_block(&self, offset: u32) -> Result<()>;

    /// Program erased flash at `offset`
    fn write(&self, offset: u32, data: &[u8]) -> Result<()>;
}

impl NorFlash for Fmc {
    fn size(&self) -> u32 {
        Fmc::size(self)
    }

    fn erase_size(&self) -> u32 {
        Fmc::erase_size(self)
    }

    fn read(&self, offset: u32, len: usize) -> Result<Vec<u8>> {
        Fmc::read(self, offset, len)
    }

    fn erase_block(&self, offset: u32) -> Result<()> {
        Fmc::erase_block(self, offset)
    }

    fn write(&self, offset: u32, data: &[u8]) -> Result<()> {
        Fmc::write(self, offset, data)
    }
}

/// Statistics of one [`write_image`] run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteStats {
    /// Erase blocks covered by the image
    pub blocks_total: usize,
    /// Blocks left alone because they already matched
    pub blocks_skipped: usize,
    /// Blocks erased and programmed
    pub blocks_written: usize,
    /// Bytes programmed
    pub bytes_written: usize,
}

/// Progress callbacks for [`write_image`]
pub trait WriteProgress {
    /// Called before reading back the block at `offset`
    fn reading(&mut self, offset: u32, len: usize);

    /// Called before erasing the block at `offset`
    fn erasing(&mut self, offset: u32, len: usize);

    /// Called before programming the block at `offset`
    fn writing(&mut self, offset: u32, len: usize);

    /// Called before the full-range read back
    fn verifying(&mut self, total_bytes: usize);

    /// Called when the range has been verified
    fn complete(&mut self, stats: &WriteStats);
}

/// A no-op progress reporter
pub struct NoProgress;

impl WriteProgress for NoProgress {
    fn reading(&mut self, _offset: u32, _len: usize) {}
    fn erasing(&mut self, _offset: u32, _len: usize) {}
    fn writing(&mut self, _offset: u32, _len: usize) {}
    fn verifying(&mut self, _total_bytes: usize) {}
    fn complete(&mut self, _stats: &WriteStats) {}
}

/// Write `data` to flash at `offset` and verify the result
///
/// `offset` must be aligned to the erase block. A trailing partial block
/// is erased whole; bytes past the end of `data` in that block are lost.
pub fn write_image<F, P>(flash: &F, offset: u32, data: &[u8], progress: &mut P) -> Result<WriteStats>
where
    F: NorFlash + ?Sized,
    P: WriteProgress + ?Sized,
{
    let block = flash.erase_size();
    if offset % block != 0 {
        return Err(Error::Unaligned { offset, block });
    }
    check_range(flash, offset, data.len())?;

    let mut stats = WriteStats::default();
    for (i, chunk) in data.chunks(block as usize).enumerate() {
        let sector = offset + i as u32 * block;
        stats.blocks_total += 1;

        progress.reading(sector, chunk.len());
        let current = flash.read(sector, chunk.len())?;
        if current == chunk {
            log::info!("Skipping sector {:#x}: no change", sector);
            stats.blocks_skipped += 1;
            continue;
        }

        progress.erasing(sector, chunk.len());
        log::debug!("Erasing sector {:#09x}", sector);
        flash.erase_block(sector)?;

        progress.writing(sector, chunk.len());
        log::debug!("Writing sector {:#09x}", sector);
        flash.write(sector, chunk)?;

        stats.blocks_written += 1;
        stats.bytes_written += chunk.len();
    }

    progress.verifying(data.len());
    let reread = flash.read(offset, data.len())?;
    if let Some(pos) = reread.iter().zip(data).position(|(a, b)| a != b) {
        return Err(Error::VerifyFailed {
            offset: offset + pos as u32,
        });
    }

    progress.complete(&stats);
    Ok(stats)
}

/// Read `len` bytes (the rest of the chip when `None`) starting at `offset`
///
/// Reads proceed one erase block at a time; `progress` receives the number
/// of bytes read so far.
pub fn read_image<F>(
    flash: &F,
    offset: u32,
    len: Option<usize>,
    mut progress: impl FnMut(usize),
) -> Result<Vec<u8>>
where
    F: NorFlash + ?Sized,
{
    let len = len.unwrap_or_else(|| flash.size().saturating_sub(offset) as usize);
    check_range(flash, offset, len)?;

    let step = flash.erase_size() as usize;
    let mut out = Vec::with_capacity(len);
    while out.len() < len {
        let chunk = step.min(len - out.len());
        let data = flash.read(offset + out.len() as u32, chunk)?;
        out.extend_from_slice(&data);
        progress(out.len());
    }
    Ok(out)
}

fn check_range<F: NorFlash + ?Sized>(flash: &F, offset: u32, len: usize) -> Result<()> {
    if u64::from(offset) + len as u64 > u64::from(flash.size()) {
        return Err(Error::OutOfRange {
            offset,
            len,
            size: flash.size(),
        });
    }
    Ok(())
}
