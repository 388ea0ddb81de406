//! Chip handle and lifecycle controller
//!
//! [`AstHandle`] owns the SCU, watchdog, I2C and LPC register windows of one
//! AST SoC and implements the stop / restart / reset / resume sequences.
//! Stopping halts the ARM core and quiesces every agent that could fight
//! with us over the SPI flash or the I2C buses; restarting re-arms
//! watchdog 1 with a short reload so the chip reboots under our control.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::fmc::Fmc;
use crate::i2c::I2cBus;
use crate::options::AstOptions;
use crate::region::{Region, RegionMapper};
use crate::regs::*;
use crate::silicon::{read_silicon_id, Family, SiliconId};

/// Poll interval of the pin-disable watch loop
const PIN_WATCH_INTERVAL: Duration = Duration::from_micros(100);

/// State captured by [`AstHandle::stop`]
///
/// Consumed exactly once by [`AstHandle::restart`]. Not `Clone`: a snapshot
/// restored twice would re-arm the watchdog from stale values.
#[derive(Debug, PartialEq, Eq)]
pub struct PrevState {
    pub(crate) rst70: u32,
    pub(crate) wdt2_reload: u32,
}

impl PrevState {
    /// SCU hardware strap (CPU enable / reset control) value at stop time
    pub fn rst70(&self) -> u32 {
        self.rst70
    }

    /// Watchdog 2 control value at stop time
    pub fn wdt2_reload(&self) -> u32 {
        self.wdt2_reload
    }
}

/// Handle on one AST2400/AST2500 SoC
pub struct AstHandle {
    mapper: Arc<dyn RegionMapper>,
    options: AstOptions,
    scu: Box<dyn Region>,
    wdt: Box<dyn Region>,
    i2c: Box<dyn Region>,
    lpc: Box<dyn Region>,
    silicon: SiliconId,
    family: Family,
    on_chip: bool,
}

impl AstHandle {
    /// Map the control blocks and identify the chip
    ///
    /// Fails with [`Error::UnknownSilicon`] when the revision id does not
    /// belong to a family whose reset sequence we know.
    pub fn new(mapper: Arc<dyn RegionMapper>, options: AstOptions) -> Result<Self> {
        let scu = mapper.map("scu", SCU_ADDR, BLOCK_LEN)?;
        let silicon = read_silicon_id(scu.as_ref());
        let family = silicon.family()?;
        let wdt = mapper.map("wdt", WDT_ADDR, BLOCK_LEN)?;
        let i2c = mapper.map("i2c", I2C_ADDR, BLOCK_LEN)?;
        let lpc = mapper.map("lpc", LPC_ADDR, BLOCK_LEN)?;
        let on_chip = mapper.on_chip();

        log::debug!(
            "AST handle: {} (rev id {:#010x}), family {}, on_chip={}",
            silicon,
            silicon.raw,
            family,
            on_chip
        );

        Ok(Self {
            mapper,
            options,
            scu,
            wdt,
            i2c,
            lpc,
            silicon,
            family,
            on_chip,
        })
    }

    /// Decoded silicon revision
    pub fn silicon(&self) -> SiliconId {
        self.silicon
    }

    /// Register-layout family
    pub fn family(&self) -> Family {
        self.family
    }

    /// True when this process runs on the AST's own CPU
    pub fn on_chip(&self) -> bool {
        self.on_chip
    }

    /// Options the handle was built with
    pub fn options(&self) -> &AstOptions {
        &self.options
    }

    pub(crate) fn mapper(&self) -> &dyn RegionMapper {
        self.mapper.as_ref()
    }

    pub(crate) fn scu(&self) -> &dyn Region {
        self.scu.as_ref()
    }

    pub(crate) fn i2c_region(&self) -> &dyn Region {
        self.i2c.as_ref()
    }

    /// Bitmask of I2C buses whose pins are enabled (bit n = bus n)
    pub fn i2c_enabled_set(&self) -> u32 {
        let mut enabled = (self.scu.read32(SCU_PINMUX5) & 0x0fff_0000) >> 14;
        if self.family.is_ast2500() {
            let scu_a4 = self.scu.read32(SCU_PINMUX8);
            enabled |= ((scu_a4 & 0x8000) >> 14) + ((scu_a4 & 0x2000) >> 13);
        } else {
            enabled |= 3;
        }
        enabled
    }

    /// Halt the ARM core and quiesce watchdogs, I2C masters and LPC
    ///
    /// Refused with [`Error::SelfDestructive`] when running on the chip.
    pub fn stop(&self) -> Result<PrevState> {
        if self.on_chip {
            return Err(Error::SelfDestructive("stop"));
        }
        log::info!("Stopping AST");
        let scu = self.scu.as_ref();
        let wdt = self.wdt.as_ref();
        let ast2500 = self.family.is_ast2500();

        scu.write32(SCU_PROTECT, SCU_UNLOCK_KEY);
        let _ = scu.read32(SCU_HW_STRAP);
        let wdt2_reload = wdt.read32(WDT2_CTRL);
        wdt.write32(WDT1_CTRL, 0);
        wdt.write32(WDT2_CTRL, 0);
        if ast2500 {
            wdt.write32(WDT3_CTRL, 0);
        }

        let rst70 = scu.read32(SCU_HW_STRAP);
        scu.write32(SCU_HW_STRAP, rst70 | STRAP_CPU_DISABLE);

        // A watchdog may have been re-armed by the core before it halted
        wdt.write32(WDT1_CTRL, 0);
        wdt.write32(WDT2_CTRL, 0);
        wdt.write32(WDT2_CLEAR_STATUS, 1);
        let _ = scu.read32(SCU_REVID);
        if ast2500 {
            wdt.write32(WDT3_CTRL, 0);
            wdt.write32(WDT3_CLEAR_STATUS, 1);
        }

        let enabled = self.i2c_enabled_set();
        let i2c = self.i2c.as_ref();
        for bus in 0..I2C_BUS_COUNT {
            let base = i2c_base(bus);
            if enabled & (1 << bus) != 0 && i2c.read32(base + I2C_FUN_CTRL) != 0 {
                log::debug!("Disabling i2c bus {}", bus);
                i2c.write32(base + I2C_FUN_CTRL, 0);
                i2c.write32(base + I2C_CMD, 0);
                let _ = i2c.read32(base + I2C_CMD);
            }
        }

        let lpc = self.lpc.as_ref();
        lpc.write32(LPC_HICR0, lpc.read32(LPC_HICR0) & !LPC_HICR0_CHANNELS);
        lpc.write32(LPC_HICR4, lpc.read32(LPC_HICR4) & !LPC_HICR4_KCS_BT);

        Ok(PrevState { rst70, wdt2_reload })
    }

    /// Restore boot configuration from `prev` and let watchdog 1 reboot the chip
    pub fn restart(&self, prev: PrevState) {
        log::info!("Restarting AST");
        let scu = self.scu.as_ref();
        let wdt = self.wdt.as_ref();

        scu.write32(SCU_PROTECT, SCU_UNLOCK_KEY);
        if self.family.is_ast2500() {
            scu.write32(SCU_REVID, STRAP_CLEAR_2500);
            scu.write32(SCU_HW_STRAP, STRAP_SET_2500);

            let _ = wdt.read32(WDT1_RESET_MASK);
            let mut reset_mask = WDT_RESET_MASK_2500;
            if self.options.lpc_reset {
                reset_mask |= WDT_RESET_MASK_LPC;
            }
            log::debug!("ResetMask={:#010x}", reset_mask);
            wdt.write32(WDT1_RESET_MASK, reset_mask);
        } else {
            scu.write32(SCU_HW_STRAP, prev.rst70);
        }

        wdt.write32(WDT2_CTRL, prev.wdt2_reload);
        wdt.write32(WDT1_RELOAD, WDT_RESET_RELOAD);
        wdt.write32(WDT1_RESTART, WDT_RESTART_MAGIC);
        if self.options.soc_reset {
            wdt.write32(WDT1_CTRL, WDT_CTRL_SOC_RESET);
        } else {
            wdt.write32(WDT1_CTRL, WDT_CTRL_CPU_RESET);
        }
    }

    /// Stop the chip and restart it with the core set to reset cleanly
    pub fn reset(&self) -> Result<()> {
        let mut prev = self.stop()?;
        if prev.rst70 & 3 != STRAP_CPU_WILL_RESET {
            prev.rst70 = (prev.rst70 & !3) | STRAP_CPU_WILL_RESET;
        }
        self.restart(prev);
        Ok(())
    }

    /// Restart from current hardware state
    ///
    /// Used on the chip itself to undo a stop performed by another agent.
    pub fn resume(&self) {
        let rst70 = (self.scu.read32(SCU_HW_STRAP) & !3) | STRAP_CPU_WILL_RESET;
        self.restart(PrevState {
            rst70,
            wdt2_reload: WDT_RESET_RELOAD,
        });
    }

    /// Open an I2C master engine on `bus`
    pub fn i2c_bus(&self, bus: u8) -> Result<I2cBus<'_>> {
        I2cBus::open(self, bus)
    }

    /// Stop the chip and open the SPI-NOR flash engine on CE0
    pub fn fmc(&self) -> Result<Fmc> {
        Fmc::open(self)
    }

    /// Keep the pins of `bus` disabled for `duration`
    ///
    /// Whenever another agent re-enables the pin function it is cleared
    /// again. Returns true when the pins were disabled at the end.
    pub fn hold_i2c_pins_disabled(&self, bus: u8, duration: Duration) -> Result<bool> {
        let bit = i2c_pin_bit(bus).ok_or(Error::NoPinFunction(bus))?;
        let scu = self.scu.as_ref();
        let deadline = Instant::now() + duration;
        let mut scu90 = scu.read32(SCU_PINMUX5);
        while Instant::now() <= deadline {
            scu90 = scu.read32(SCU_PINMUX5);
            if scu90 & bit != 0 {
                let new = scu90 & !bit;
                scu.write32(SCU_PROTECT, SCU_UNLOCK_KEY);
                scu.write32(SCU_PINMUX5, new);
                log::info!("switch scu[0x90] from {:#010x} to {:#010x}", scu90, new);
            }
            thread::sleep(PIN_WATCH_INTERVAL);
        }
        let disabled = scu90 & bit == 0;
        if disabled {
            log::info!("i2c bus {} pins are now disabled", bus);
        } else {
            log::warn!("i2c bus {} pins not disabled", bus);
        }
        Ok(disabled)
    }

    /// Keep the clock of `bus` slowed down for `duration`
    ///
    /// Rewrites a base clock divisor of 5 to 0xb whenever it shows up in
    /// the AC timing register. Returns the number of rewrites.
    pub fn pin_i2c_clock(&self, bus: u8, duration: Duration) -> Result<usize> {
        if bus >= I2C_BUS_COUNT {
            return Err(Error::InvalidBus(bus));
        }
        let i2c = self.i2c.as_ref();
        let reg = i2c_base(bus) + I2C_AC_TIMING1;
        let deadline = Instant::now() + duration;
        let mut switches = 0;
        while Instant::now() <= deadline {
            let timing = i2c.read32(reg);
            if timing & 0xf == 5 {
                let new = (timing & !0xf) | 0xb;
                i2c.write32(reg, new);
                log::info!("switch i2c[{:#x}] from {:#010x} to {:#010x}", reg, timing, new);
                switches += 1;
            }
            thread::yield_now();
        }
        Ok(switches)
    }
}
