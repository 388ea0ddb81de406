//! SPI-NOR flash engine on FMC chip select 0
//!
//! Commands are framed by hand through the controller's user mode: CE0 is
//! asserted by writing the control register, output bytes are stored into
//! the CE0 memory window, input bytes are loaded from it, and CE0 is
//! released by writing the control register again.
//!
//! The ARM core boots from this flash and must be stopped first, so
//! [`Fmc::open`] stops the chip and keeps the returned [`PrevState`].

pub mod chips;
pub mod info;
pub mod opcodes;

use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::handle::{AstHandle, PrevState};
use crate::options::AddrMode;
use crate::region::Region;
use crate::regs::*;
use crate::silicon::Family;

pub use chips::{AddrSwitch, ChipFeatures, FlashChip, ModeProbe};
pub use info::FmcInfo;
use opcodes::*;

/// Delay between status polls
const POLL_INTERVAL: Duration = Duration::from_micros(10);

/// CE0 user-mode transfer port
struct UserPort {
    regs: Box<dyn Region>,
    mem: Box<dyn Region>,
    ce0_slow: u32,
    ce0_fast: u32,
}

impl UserPort {
    /// One user-mode transfer: clock out `out`, then clock in `in_len` bytes
    fn xfer(&self, out: &[u8], in_len: usize) -> Vec<u8> {
        debug_assert!(!out.is_empty());
        let ctl = if out.first().copied().is_some_and(is_fast_read) {
            self.ce0_fast
        } else {
            self.ce0_slow
        };
        log::trace!(
            "spi: {:02x?} (out:{} in:{})",
            &out[..out.len().min(10)],
            out.len(),
            in_len
        );

        self.regs.write32(FMC_CE0_CTRL, ctl | FMC_USER_MODE);
        let lead = out.len() & 3;
        for &b in &out[..lead] {
            self.mem.write8(0, b);
        }
        for word in out[lead..].chunks_exact(4) {
            self.mem
                .write32(0, u32::from_le_bytes([word[0], word[1], word[2], word[3]]));
        }
        let mut buf = vec![0u8; in_len];
        for (i, chunk) in buf.chunks_mut(4).enumerate() {
            let word = self.mem.read32((i * 4) as u64).to_le_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }
        self.regs.write32(FMC_CE0_CTRL, ctl | FMC_USER_IDLE);
        buf
    }

    fn jedec_id(&self) -> u32 {
        let id = self.xfer(&[RDID], 4);
        u32::from(id[0]) << 16 | u32::from(id[1]) << 8 | u32::from(id[2])
    }
}

/// Flash engine
pub struct Fmc {
    port: UserPort,
    family: Family,
    jedec_id: u32,
    chip: &'static FlashChip,
    /// Controller and chip agree on 4-byte addressing
    addr_4b: bool,
    read_op: u8,
    program_op: u8,
    erase_op: u8,
    timeout: Duration,
    prev: PrevState,
}

impl Fmc {
    /// Stop the chip, identify the flash and settle the addressing mode
    ///
    /// When the flash cannot be brought into a usable state the chip is
    /// restarted from the state captured at stop before the error is
    /// returned.
    pub fn open(handle: &AstHandle) -> Result<Self> {
        let mapper = handle.mapper();
        let port = UserPort {
            regs: mapper.map("fmc", FMC_ADDR, BLOCK_LEN)?,
            mem: mapper.map("fmc-mem", FMC_MEM, FMC_MEM_LEN)?,
            ce0_slow: FMC_CE0_SLOW,
            ce0_fast: FMC_CE0_FAST,
        };
        let options = handle.options();
        let prev = handle.stop()?;

        let jedec_id = port.jedec_id();
        let Some(chip) = chips::find(jedec_id) else {
            log::warn!("Unknown SPI flash {:06x}, restarting AST", jedec_id);
            handle.restart(prev);
            return Err(Error::UnknownFlash(jedec_id));
        };
        log::info!(
            "SPI flash {:06x}: {} ({} MiB, {} KiB erase blocks)",
            jedec_id,
            chip.name,
            chip.size >> 20,
            chip.erase_size >> 10
        );

        let mut fmc = Self {
            port,
            family: handle.family(),
            jedec_id,
            chip,
            addr_4b: false,
            read_op: FAST_READ,
            program_op: PP,
            erase_op: BE,
            timeout: options.flash_timeout,
            prev,
        };
        if let Err(e) = fmc.settle(options.spi_addr_mode) {
            log::warn!("SPI flash setup failed, restarting AST");
            handle.restart(fmc.into_prev_state());
            return Err(e);
        }
        Ok(fmc)
    }

    /// Check the idle status, apply `mode` and pick the opcodes
    fn settle(&mut self, mode: Option<AddrMode>) -> Result<()> {
        let status = self.status() & !SR_QE;
        if status & !SR_WEL != 0 {
            return Err(Error::FlashStatus {
                op: "probe",
                addr: 0,
                status,
            });
        }
        if status & SR_WEL != 0 {
            log::info!("write enable latch was set, clearing");
            self.write_disable();
        }

        if let Some(mode) = mode {
            self.switch_addr_mode(mode)?;
        }

        let controller_4b = self.port.regs.read32(FMC_CE_CTRL) & 1 != 0;
        let chip_4b = self.chip_is_4b();
        if controller_4b != chip_4b {
            return Err(Error::AddressModeMismatch {
                controller: controller_4b,
                chip: chip_4b,
            });
        }
        self.addr_4b = controller_4b;

        if self.chip.has_4b_opcodes() {
            (self.read_op, self.program_op, self.erase_op) = (FAST_READ_4B, PP_4B, BE_4B);
        }
        log::debug!(
            "FMC: {}-byte mode, read={:#04x} program={:#04x} erase={:#04x}",
            if self.addr_4b { 4 } else { 3 },
            self.read_op,
            self.program_op,
            self.erase_op
        );
        Ok(())
    }

    /// Descriptor of the detected flash part
    pub fn chip(&self) -> &'static FlashChip {
        self.chip
    }

    /// JEDEC id read at open time
    pub fn jedec_id(&self) -> u32 {
        self.jedec_id
    }

    /// Total flash size in bytes
    pub fn size(&self) -> u32 {
        self.chip.size
    }

    /// Erase block size in bytes
    pub fn erase_size(&self) -> u32 {
        self.chip.erase_size
    }

    /// Returns true when addresses are sent as 4 bytes
    pub fn is_4b_mode(&self) -> bool {
        self.addr_4b
    }

    /// Decode the FMC register block (AST2500 only)
    pub fn info(&self) -> Result<FmcInfo> {
        FmcInfo::read(self.port.regs.as_ref(), self.family)
    }

    /// Release the engine, returning the state captured when the chip was stopped
    pub fn into_prev_state(self) -> PrevState {
        self.prev
    }

    /// Read `len` bytes starting at `offset`
    pub fn read(&self, offset: u32, len: usize) -> Result<Vec<u8>> {
        self.check_range(offset, len)?;
        self.xfer_addr(self.read_op, offset, &[0], len)
    }

    /// Erase the block starting at `offset`
    pub fn erase_block(&self, offset: u32) -> Result<()> {
        self.check_range(offset, 1)?;
        if offset % self.chip.erase_size != 0 {
            return Err(Error::Unaligned {
                offset,
                block: self.chip.erase_size,
            });
        }
        self.write_enable();
        self.xfer_addr(self.erase_op, offset, &[], 0)?;
        self.finish("erase", offset)
    }

    /// Program `data` at `offset`, one page-bounded chunk at a time
    ///
    /// The target range must be erased.
    pub fn write(&self, offset: u32, data: &[u8]) -> Result<()> {
        self.check_range(offset, data.len())?;
        let mut off = offset;
        let mut rest = data;
        while !rest.is_empty() {
            let chunk = (PAGE_SIZE - (off as usize & (PAGE_SIZE - 1))).min(rest.len());
            let (page, tail) = rest.split_at(chunk);
            self.write_enable();
            self.xfer_addr(self.program_op, off, page, 0)?;
            self.finish("page program", off)?;
            rest = tail;
            off += chunk as u32;
        }
        Ok(())
    }

    /// Read the status register
    pub fn status(&self) -> u8 {
        self.xfer(&[RDSR], 4)[0]
    }

    fn write_enable(&self) {
        self.xfer(&[WREN], 0);
    }

    fn write_disable(&self) {
        self.xfer(&[WRDI], 0);
    }

    fn switch_addr_mode(&mut self, mode: AddrMode) -> Result<()> {
        let four_byte = mode == AddrMode::FourByte;
        if !self.chip.supports_4b_addressing() {
            if four_byte {
                return Err(Error::UnsupportedAddressSwitch {
                    jedec_id: self.jedec_id,
                    bytes: mode.bytes(),
                });
            }
            // 3-byte only part: the controller just has to match
            self.port.regs.write32(FMC_CE_CTRL, FMC_CE_CTRL_3B);
            return Ok(());
        }
        let switch = self.chip.addr_switch.ok_or(Error::UnsupportedAddressSwitch {
            jedec_id: self.jedec_id,
            bytes: mode.bytes(),
        })?;
        log::info!("Switching flash to {}-byte addressing", mode.bytes());
        self.xfer(switch.command(four_byte), 0);
        let ce_ctrl = if four_byte {
            FMC_CE_CTRL_4B
        } else {
            FMC_CE_CTRL_3B
        };
        self.port.regs.write32(FMC_CE_CTRL, ce_ctrl);
        Ok(())
    }

    fn chip_is_4b(&self) -> bool {
        if !self.chip.supports_4b_addressing() {
            return false;
        }
        let probe = self.chip.mode_probe;
        self.xfer(&[probe.opcode], 4)[0] & probe.mask != 0
    }

    /// Poll until the write-in-progress bit clears, returning the final status
    fn wait_ready(&self) -> Result<u8> {
        let start = Instant::now();
        loop {
            let status = self.status();
            if status & SR_WIP == 0 {
                return Ok(status);
            }
            let elapsed = start.elapsed();
            if elapsed > self.timeout {
                return Err(Error::FlashTimeout { status, elapsed });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Wait for an erase/program to complete and check the final status
    fn finish(&self, op: &'static str, addr: u32) -> Result<()> {
        let status = self.wait_ready()?;
        if status & !SR_QE != 0 {
            return Err(Error::FlashStatus { op, addr, status });
        }
        Ok(())
    }

    fn check_range(&self, offset: u32, len: usize) -> Result<()> {
        let end = u64::from(offset) + len as u64;
        if end > u64::from(self.chip.size) {
            return Err(Error::OutOfRange {
                offset,
                len,
                size: self.chip.size,
            });
        }
        Ok(())
    }

    fn xfer_addr(&self, opcode: u8, addr: u32, extra: &[u8], in_len: usize) -> Result<Vec<u8>> {
        let four_byte = is_4b_opcode(opcode) || self.addr_4b;
        if !four_byte && is_3b_opcode(opcode) && addr > 0x00ff_ffff {
            return Err(Error::AddressTooLarge { opcode, addr });
        }
        let addr_bytes = addr.to_be_bytes();
        let mut out = Vec::with_capacity(5 + extra.len());
        out.push(opcode);
        if four_byte {
            out.extend_from_slice(&addr_bytes);
        } else {
            out.extend_from_slice(&addr_bytes[1..]);
        }
        out.extend_from_slice(extra);
        Ok(self.xfer(&out, in_len))
    }

    fn xfer(&self, out: &[u8], in_len: usize) -> Vec<u8> {
        self.port.xfer(out, in_len)
    }
}

/// Decode the FMC registers without stopping the chip
pub fn read_info(handle: &AstHandle) -> Result<FmcInfo> {
    let regs = handle.mapper().map("fmc", FMC_ADDR, BLOCK_LEN)?;
    FmcInfo::read(regs.as_ref(), handle.family())
}
