//! astctl-sim - in-memory AST SoC model
//!
//! [`SimSoc`] implements [`RegionMapper`] over a model of the blocks the
//! tool touches: SCU (revision id, protection key, hardware strap, pin
//! functions), watchdogs, LPC, the fourteen I2C channels with attached
//! slaves, and the FMC user-mode port with a SPI-NOR part behind it.
//!
//! Every semantically relevant action (register writes to the control
//! blocks, I2C conditions, SPI commands) is appended to an event log that
//! tests inspect. Faults can be injected: wedged I2C buses, a flash part
//! whose write-in-progress bit never clears, or a page program that is
//! silently dropped.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use astctl_core::{AstHandle, AstOptions};
//! use astctl_sim::SimSoc;
//!
//! let sim = SimSoc::ast2500();
//! let handle = AstHandle::new(Arc::new(sim.clone()), AstOptions::new()).unwrap();
//! assert_eq!(handle.silicon().to_string(), "AST2500-A2");
//! ```

pub mod flash;
pub mod i2c;

#[cfg(test)]
mod scenarios;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use astctl_core::regs::*;
use astctl_core::{Region, RegionMapper, SiliconId};

pub use flash::{SimFlashConfig, SpiCommand};
pub use i2c::SimI2cDevice;

use flash::SimFlash;
use i2c::SimI2cChannel;

/// Revision id of an AST2400-A1
pub const REV_AST2400: u32 = 0x0201_0303;
/// Revision id of an AST2500-A2
pub const REV_AST2500: u32 = 0x0403_0303;

/// Power-on hardware strap value (CPU enabled)
pub const DEFAULT_STRAP: u32 = 0x0000_1180;
/// Power-on LPC HICR0 value
pub const DEFAULT_HICR0: u32 = 0x0000_00ff;
/// Power-on LPC HICR4 value
pub const DEFAULT_HICR4: u32 = 0x0000_0005;

/// Control block a register write landed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
    /// System Control Unit
    Scu,
    /// Watchdogs
    Wdt,
    /// LPC bridge
    Lpc,
    /// FMC configuration registers
    Fmc,
}

/// Entry of the simulator's event log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    /// Store to a control block register
    RegWrite {
        /// Block written
        block: Block,
        /// Offset inside the block
        offset: u64,
        /// Value stored
        value: u32,
    },
    /// Start or repeated start
    I2cStart {
        /// Bus index
        bus: u8,
        /// Issued inside a transaction
        repeated: bool,
    },
    /// Byte transmitted by the master
    I2cTx {
        /// Bus index
        bus: u8,
        /// Byte on the wire
        byte: u8,
        /// Slave acknowledged
        ack: bool,
    },
    /// Byte received by the master
    I2cRx {
        /// Bus index
        bus: u8,
        /// Byte on the wire
        byte: u8,
    },
    /// Stop condition
    I2cStop {
        /// Bus index
        bus: u8,
    },
    /// Completed SPI flash command
    Spi(SpiCommand),
}

/// Where an absolute address lands
enum Target {
    Scu(u64),
    Wdt(u64),
    Lpc(u64),
    I2c(u64),
    Fmc(u64),
    FlashMem(u64),
    /// Plain memory, keyed by absolute address
    Memory,
}

fn decode(addr: u64) -> Target {
    let within = |base: u64, len: u64| (base..base + len).contains(&addr).then(|| addr - base);
    if let Some(off) = within(SCU_ADDR, BLOCK_LEN) {
        Target::Scu(off)
    } else if let Some(off) = within(WDT_ADDR, BLOCK_LEN) {
        Target::Wdt(off)
    } else if let Some(off) = within(LPC_ADDR, BLOCK_LEN) {
        Target::Lpc(off)
    } else if let Some(off) = within(I2C_ADDR, BLOCK_LEN) {
        Target::I2c(off)
    } else if let Some(off) = within(FMC_ADDR, BLOCK_LEN) {
        Target::Fmc(off)
    } else if let Some(off) = within(FMC_MEM, FMC_MEM_LEN) {
        Target::FlashMem(off)
    } else {
        Target::Memory
    }
}

/// Locate the I2C channel owning `off` in the I2C block
fn i2c_channel(off: u64) -> Option<(usize, u64)> {
    (0..I2C_BUS_COUNT).find_map(|bus| {
        let base = i2c_base(bus);
        (base..base + 0x40)
            .contains(&off)
            .then(|| (bus as usize, off - base))
    })
}

struct SimState {
    rev_id: u32,
    ast2500: bool,
    scu_unlocked: bool,
    scu: HashMap<u64, u32>,
    wdt: HashMap<u64, u32>,
    lpc: HashMap<u64, u32>,
    fmc: HashMap<u64, u32>,
    i2c: Vec<SimI2cChannel>,
    flash: SimFlash,
    memory: HashMap<u64, u8>,
    events: Vec<SimEvent>,
}

impl SimState {
    fn new(rev_id: u32, flash: SimFlashConfig) -> Self {
        let ast2500 = SiliconId::decode(rev_id)
            .family()
            .is_ok_and(|f| f.is_ast2500());
        let four_byte = flash.four_byte;
        Self {
            rev_id,
            ast2500,
            scu_unlocked: false,
            scu: HashMap::from([
                (SCU_HW_STRAP, DEFAULT_STRAP),
                (SCU_PINMUX5, 0x0fff_0000),
                (SCU_PINMUX8, 0x0000_a000),
            ]),
            wdt: HashMap::from([(WDT2_CTRL, 0x0000_0013)]),
            lpc: HashMap::from([(LPC_HICR0, DEFAULT_HICR0), (LPC_HICR4, DEFAULT_HICR4)]),
            fmc: HashMap::from([
                (FMC_CE_TYPE, 0x0001_0002),
                (FMC_CE_CTRL, if four_byte { FMC_CE_CTRL_4B } else { 0 }),
            ]),
            i2c: (0..I2C_BUS_COUNT).map(SimI2cChannel::new).collect(),
            flash: SimFlash::new(flash),
            memory: HashMap::new(),
            events: Vec::new(),
        }
    }

    fn read32(&mut self, addr: u64) -> u32 {
        match decode(addr) {
            Target::Scu(SCU_PROTECT) => u32::from(self.scu_unlocked),
            Target::Scu(SCU_REVID) => self.rev_id,
            Target::Scu(off) => self.scu.get(&off).copied().unwrap_or(0),
            Target::Wdt(off) => self.wdt.get(&off).copied().unwrap_or(0),
            Target::Lpc(off) => self.lpc.get(&off).copied().unwrap_or(0),
            Target::I2c(off) => match i2c_channel(off) {
                Some((bus, reg)) => self.i2c[bus].read(reg),
                None => 0,
            },
            Target::Fmc(off) => self.fmc.get(&off).copied().unwrap_or(0),
            Target::FlashMem(off) => {
                let mut word = [0u8; 4];
                for (i, b) in word.iter_mut().enumerate() {
                    *b = self.flash_mem_read(off + i as u64);
                }
                u32::from_le_bytes(word)
            }
            Target::Memory => {
                let mut word = [0u8; 4];
                for (i, b) in word.iter_mut().enumerate() {
                    *b = self.memory.get(&(addr + i as u64)).copied().unwrap_or(0);
                }
                u32::from_le_bytes(word)
            }
        }
    }

    fn read8(&mut self, addr: u64) -> u8 {
        match decode(addr) {
            Target::FlashMem(off) => self.flash_mem_read(off),
            Target::Memory => self.memory.get(&addr).copied().unwrap_or(0),
            _ => {
                let word = self.read32(addr & !3);
                (word >> ((addr & 3) * 8)) as u8
            }
        }
    }

    fn flash_mem_read(&mut self, off: u64) -> u8 {
        let ce0 = self.fmc.get(&FMC_CE0_CTRL).copied().unwrap_or(0);
        if ce0 & 7 == FMC_USER_MODE {
            self.flash.shift_in()
        } else {
            let data = self.flash.data();
            data.get(off as usize).copied().unwrap_or(0xff)
        }
    }

    fn write32(&mut self, addr: u64, value: u32) {
        match decode(addr) {
            Target::Scu(off) => self.scu_write(off, value),
            Target::Wdt(off) => {
                self.wdt.insert(off, value);
                self.log_write(Block::Wdt, off, value);
            }
            Target::Lpc(off) => {
                self.lpc.insert(off, value);
                self.log_write(Block::Lpc, off, value);
            }
            Target::I2c(off) => {
                if let Some((bus, reg)) = i2c_channel(off) {
                    self.i2c[bus].write(reg, value, &mut self.events);
                }
            }
            Target::Fmc(off) => self.fmc_write(off, value),
            Target::FlashMem(_) => {
                for b in value.to_le_bytes() {
                    self.flash.shift_out(b);
                }
            }
            Target::Memory => {
                for (i, b) in value.to_le_bytes().into_iter().enumerate() {
                    self.memory.insert(addr + i as u64, b);
                }
            }
        }
    }

    fn write8(&mut self, addr: u64, value: u8) {
        match decode(addr) {
            Target::FlashMem(_) => self.flash.shift_out(value),
            Target::Memory => {
                self.memory.insert(addr, value);
            }
            _ => {
                let shift = (addr & 3) * 8;
                let word = self.read32(addr & !3);
                let word = (word & !(0xff << shift)) | (u32::from(value) << shift);
                self.write32(addr & !3, word);
            }
        }
    }

    fn scu_write(&mut self, off: u64, value: u32) {
        if off == SCU_PROTECT {
            self.scu_unlocked = value == SCU_UNLOCK_KEY;
            self.log_write(Block::Scu, off, value);
            return;
        }
        if !self.scu_unlocked {
            log::warn!("sim scu: write {:#x} := {:#x} while locked", off, value);
            return;
        }
        if off == SCU_REVID {
            // AST2500: writes to the revision register clear strap bits
            if self.ast2500 {
                let strap = self.scu.entry(SCU_HW_STRAP).or_insert(0);
                *strap &= !value;
            }
        } else if off == SCU_HW_STRAP && self.ast2500 {
            // AST2500: strap writes only set bits
            let strap = self.scu.entry(SCU_HW_STRAP).or_insert(0);
            *strap |= value;
        } else {
            self.scu.insert(off, value);
        }
        self.log_write(Block::Scu, off, value);
    }

    fn fmc_write(&mut self, off: u64, value: u32) {
        self.fmc.insert(off, value);
        if off != FMC_CE0_CTRL {
            self.log_write(Block::Fmc, off, value);
            return;
        }
        match value & 7 {
            FMC_USER_MODE => self.flash.select(),
            FMC_USER_IDLE => {
                if let Some(cmd) = self.flash.deselect() {
                    self.events.push(SimEvent::Spi(cmd));
                }
            }
            _ => {}
        }
    }

    fn log_write(&mut self, block: Block, offset: u64, value: u32) {
        self.events.push(SimEvent::RegWrite {
            block,
            offset,
            value,
        });
    }
}

/// Simulated AST SoC
///
/// Cloning yields another handle onto the same SoC.
#[derive(Clone)]
pub struct SimSoc {
    state: Arc<Mutex<SimState>>,
    on_chip: bool,
    dry_run: bool,
}

impl SimSoc {
    /// SoC with revision id `rev_id` and the default flash part
    pub fn new(rev_id: u32) -> Self {
        Self::with_flash(rev_id, SimFlashConfig::default())
    }

    /// SoC with revision id `rev_id` and the given flash part
    pub fn with_flash(rev_id: u32, flash: SimFlashConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::new(rev_id, flash))),
            on_chip: false,
            dry_run: false,
        }
    }

    /// AST2400-A1 reached from the host
    pub fn ast2400() -> Self {
        Self::new(REV_AST2400)
    }

    /// AST2500-A2 reached from the host
    pub fn ast2500() -> Self {
        Self::new(REV_AST2500)
    }

    /// Pretend to run on the SoC's own CPU
    pub fn on_chip(mut self, on_chip: bool) -> Self {
        self.on_chip = on_chip;
        self
    }

    /// Drop every store made through mapped regions
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the event log
    pub fn events(&self) -> Vec<SimEvent> {
        self.state().events.clone()
    }

    /// Drain the event log
    pub fn take_events(&self) -> Vec<SimEvent> {
        std::mem::take(&mut self.state().events)
    }

    /// SPI commands in the event log
    pub fn spi_commands(&self) -> Vec<SpiCommand> {
        self.state()
            .events
            .iter()
            .filter_map(|e| match e {
                SimEvent::Spi(cmd) => Some(cmd.clone()),
                _ => None,
            })
            .collect()
    }

    /// Register value at absolute address `addr`, without side effects
    pub fn peek(&self, addr: u64) -> u32 {
        let s = self.state();
        match decode(addr) {
            Target::Scu(SCU_REVID) => s.rev_id,
            Target::Scu(off) => s.scu.get(&off).copied().unwrap_or(0),
            Target::Wdt(off) => s.wdt.get(&off).copied().unwrap_or(0),
            Target::Lpc(off) => s.lpc.get(&off).copied().unwrap_or(0),
            Target::Fmc(off) => s.fmc.get(&off).copied().unwrap_or(0),
            Target::I2c(off) => match i2c_channel(off) {
                Some((bus, reg)) => s.i2c[bus].read(reg),
                None => 0,
            },
            Target::FlashMem(off) => {
                let data = s.flash.data();
                let at = |i: u64| data.get((off + i) as usize).copied().unwrap_or(0xff);
                u32::from_le_bytes([at(0), at(1), at(2), at(3)])
            }
            Target::Memory => {
                let at = |i: u64| s.memory.get(&(addr + i)).copied().unwrap_or(0);
                u32::from_le_bytes([at(0), at(1), at(2), at(3)])
            }
        }
    }

    /// Set a register at absolute address `addr` as another agent would
    ///
    /// Bypasses the SCU protection key and is not logged.
    pub fn poke(&self, addr: u64, value: u32) {
        let mut s = self.state();
        match decode(addr) {
            Target::Scu(off) => {
                s.scu.insert(off, value);
            }
            Target::Wdt(off) => {
                s.wdt.insert(off, value);
            }
            Target::Lpc(off) => {
                s.lpc.insert(off, value);
            }
            Target::Fmc(off) => {
                s.fmc.insert(off, value);
            }
            Target::I2c(off) => {
                if let Some((bus, reg)) = i2c_channel(off) {
                    match reg {
                        I2C_FUN_CTRL => s.i2c[bus].fun_ctrl = value,
                        I2C_AC_TIMING1 => s.i2c[bus].ac_timing = value,
                        _ => log::warn!("sim: poke of i2c register {:#x} ignored", off),
                    }
                }
            }
            Target::FlashMem(_) | Target::Memory => s.write32(addr, value),
        }
    }

    /// Attach a slave at 7-bit address `addr` to `bus`
    pub fn add_i2c_device(&self, bus: u8, addr: u8, device: SimI2cDevice) {
        self.state().i2c[usize::from(bus)].devices.insert(addr, device);
    }

    /// Current state of the slave at `addr` on `bus`
    pub fn i2c_device(&self, bus: u8, addr: u8) -> Option<SimI2cDevice> {
        self.state().i2c[usize::from(bus)].devices.get(&addr).cloned()
    }

    /// Make every command on `bus` hang forever
    pub fn wedge_i2c(&self, bus: u8) {
        self.state().i2c[usize::from(bus)].wedged = true;
    }

    /// Leave `bus` reporting `cmd` until a recovery request
    pub fn set_i2c_dirty(&self, bus: u8, cmd: u32) {
        self.state().i2c[usize::from(bus)].dirty = Some(cmd);
    }

    /// Copy `data` into the flash array at `offset`
    pub fn load_flash(&self, offset: usize, data: &[u8]) {
        self.state().flash.data_mut()[offset..offset + data.len()].copy_from_slice(data);
    }

    /// Copy `len` bytes of the flash array starting at `offset`
    pub fn flash_contents(&self, offset: usize, len: usize) -> Vec<u8> {
        self.state().flash.data()[offset..offset + len].to_vec()
    }

    /// Keep the flash write-in-progress bit set forever
    pub fn set_flash_stuck_busy(&self, stuck: bool) {
        self.state().flash.stuck_busy = stuck;
    }

    /// Acknowledge but discard the page program at `addr`
    pub fn drop_flash_program_at(&self, addr: Option<u32>) {
        self.state().flash.drop_program_at = addr;
    }

    /// Report `bits` in every flash status read
    pub fn set_flash_status_bits(&self, bits: u8) {
        self.state().flash.status_extra = bits;
    }

    /// Set or clear the flash write enable latch
    pub fn set_flash_wel(&self, wel: bool) {
        self.state().flash.set_wel(wel);
    }

    /// Returns true when the flash part is in 4-byte addressing
    pub fn flash_is_four_byte(&self) -> bool {
        self.state().flash.is_four_byte()
    }
}

impl RegionMapper for SimSoc {
    fn map(
        &self,
        name: &'static str,
        phys_addr: u64,
        len: u64,
    ) -> astctl_core::Result<Box<dyn Region>> {
        log::debug!("sim: map {} at {:#x} (size {:#x})", name, phys_addr, len);
        Ok(Box::new(SimRegion {
            soc: self.clone(),
            name,
            base: phys_addr,
            len,
        }))
    }

    fn on_chip(&self) -> bool {
        self.on_chip
    }
}

/// Window onto the simulated SoC
struct SimRegion {
    soc: SimSoc,
    name: &'static str,
    base: u64,
    len: u64,
}

impl Region for SimRegion {
    fn name(&self) -> &str {
        self.name
    }

    fn base(&self) -> u64 {
        self.base
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn read8(&self, offset: u64) -> u8 {
        astctl_core::region::check_bounds(self.name, offset, 1, self.len);
        self.soc.state().read8(self.base + offset)
    }

    fn read32(&self, offset: u64) -> u32 {
        astctl_core::region::check_bounds(self.name, offset, 4, self.len);
        self.soc.state().read32(self.base + offset)
    }

    fn write8(&self, offset: u64, value: u8) {
        astctl_core::region::check_bounds(self.name, offset, 1, self.len);
        if self.soc.dry_run {
            return;
        }
        self.soc.state().write8(self.base + offset, value);
    }

    fn write32(&self, offset: u64, value: u32) {
        astctl_core::region::check_bounds(self.name, offset, 4, self.len);
        if self.soc.dry_run {
            return;
        }
        self.soc.state().write32(self.base + offset, value);
    }
}
