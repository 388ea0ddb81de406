//! I2C master engine
//!
//! Drives one channel of the AST I2C controller in byte mode through its
//! command/status register. Every step checks that the register holds the
//! encoding the controller state machine should be in; a mismatch means
//! hardware and software have diverged and the transaction is abandoned.
//!
//! Transaction shape:
//!
//! ```text
//! idle -> start -> tx addr|W -> tx data... -> [restart -> tx addr|R -> rx data...] -> stop -> idle
//! ```

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::handle::AstHandle;
use crate::region::Region;
use crate::regs::*;

/// Controller turnaround after each completed command
const TURNAROUND: Duration = Duration::from_micros(50);
/// Settle time after a bus recovery request
const RECOVER_DELAY: Duration = Duration::from_millis(50);
/// Settle time after disabling the master function
const DISABLE_DELAY: Duration = Duration::from_millis(100);

/// One I2C bus channel opened from an [`AstHandle`]
pub struct I2cBus<'a> {
    regs: &'a dyn Region,
    base: u64,
    bus: u8,
    extra_checks: bool,
    timeout: Duration,
    /// Bytes transferred in the current transaction
    bytes: usize,
    /// A start was just issued; the next byte is the address
    starting: bool,
}

impl fmt::Display for I2cBus<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "asti2c-{}", self.bus)
    }
}

impl<'a> I2cBus<'a> {
    /// Bring `bus` to a known idle state and enable the master function
    pub(crate) fn open(handle: &'a AstHandle, bus: u8) -> Result<Self> {
        if bus >= I2C_BUS_COUNT {
            return Err(Error::InvalidBus(bus));
        }
        let regs = handle.i2c_region();
        let base = i2c_base(bus);

        if regs.read32(base + I2C_CMD) != I2C_CMD_IDLE {
            log::debug!("i2c bus {} not idle, recovering", bus);
            regs.write32(base + I2C_CMD, I2C_CMD_RECOVER);
            thread::sleep(RECOVER_DELAY);
            regs.write32(base + I2C_FUN_CTRL, 0);
            thread::sleep(DISABLE_DELAY);
        }

        if let Some(bit) = i2c_pin_bit(bus) {
            let scu = handle.scu();
            if scu.read32(SCU_PINMUX5) & bit == 0 {
                scu.write32(SCU_PROTECT, SCU_UNLOCK_KEY);
                scu.write32(SCU_PINMUX5, scu.read32(SCU_PINMUX5) | bit);
                log::info!("i2c {} pins were disabled, enabling...", bus);
            }
        }

        let cmd = regs.read32(base + I2C_CMD);
        if cmd != I2C_CMD_IDLE {
            return Err(Error::I2cInit { bus, cmd });
        }
        regs.write32(base + I2C_FUN_CTRL, I2C_MASTER_EN);

        let options = handle.options();
        Ok(Self {
            regs,
            base,
            bus,
            extra_checks: options.extra_checks,
            timeout: options.i2c_timeout,
            bytes: 0,
            starting: false,
        })
    }

    /// Bus index
    pub fn bus(&self) -> u8 {
        self.bus
    }

    /// Write `w` to and then read `r` from the 7-bit slave `addr`
    ///
    /// A repeated start separates the two phases when both are present.
    /// A NACK on the write phase ends the transaction with a stop and is
    /// returned as the recoverable [`Error::Nack`]. Arguments are checked
    /// before the bus is touched.
    pub fn tx(&mut self, addr: u8, w: &[u8], r: &mut [u8]) -> Result<()> {
        if addr > 0x7f {
            return Err(Error::InvalidAddress(addr));
        }
        if w.is_empty() && r.is_empty() {
            return Err(Error::EmptyTransfer(self.bus));
        }
        log::debug!("{}: slave {:#04x} w={:02x?} r{}", self, addr, w, r.len());
        self.bytes = 0;
        self.start(false)?;

        if !w.is_empty() {
            let sent = core::iter::once(addr << 1)
                .chain(w.iter().copied())
                .try_for_each(|b| self.tx_byte(b));
            if let Err(e) = sent {
                return self.abort(e);
            }
        }

        if !r.is_empty() {
            if !w.is_empty() {
                self.start(true)?;
            }
            if let Err(e) = self.tx_byte((addr << 1) | 1) {
                return self.abort(e);
            }
            let last = r.len() - 1;
            for (n, b) in r.iter_mut().enumerate() {
                *b = self.rx_byte(n == last)?;
            }
        }

        self.stop()
    }

    /// Terminate the transaction after a NACK so the bus is left idle
    fn abort(&mut self, err: Error) -> Result<()> {
        if err.is_recoverable() {
            self.stop()?;
        }
        Err(err)
    }

    fn read_cmd(&self) -> u32 {
        self.regs.read32(self.base + I2C_CMD)
    }

    fn read_sts(&self) -> u32 {
        self.regs.read32(self.base + I2C_INTR_STS)
    }

    fn protocol_error(&self, op: &'static str, cmd: u32) -> Error {
        Error::I2cProtocol {
            bus: self.bus,
            op,
            cmd,
            sts: self.read_sts(),
        }
    }

    /// Poll until the controller has consumed the pending command
    fn wait(&self, op: &'static str) -> Result<()> {
        let start = Instant::now();
        loop {
            let cmd = self.read_cmd();
            if cmd & I2C_CMD_PENDING == 0 {
                break;
            }
            let elapsed = start.elapsed();
            if elapsed > self.timeout {
                let sts = self.read_sts();
                self.regs.write32(self.base + I2C_FUN_CTRL, 0);
                return Err(Error::I2cTimeout {
                    bus: self.bus,
                    op,
                    cmd,
                    sts,
                    elapsed,
                });
            }
            thread::yield_now();
        }
        thread::sleep(TURNAROUND);
        Ok(())
    }

    fn start(&mut self, repeat: bool) -> Result<()> {
        self.starting = true;
        let cmd = self.read_cmd();
        let valid = (cmd == I2C_CMD_IDLE && !repeat)
            || (cmd == I2C_CMD_TX_NEXT && repeat)
            || (repeat && !self.extra_checks);
        if !valid {
            return Err(self.protocol_error(if repeat { "restart" } else { "start" }, cmd));
        }
        self.regs.write32(self.base + I2C_CMD, I2C_CMD_START);
        self.wait("start")?;
        let sts = self.read_sts();
        if sts != 0 {
            return Err(Error::I2cStatus {
                bus: self.bus,
                op: "start",
                sts,
                expected: 0,
            });
        }
        Ok(())
    }

    fn tx_byte(&mut self, b: u8) -> Result<()> {
        if self.extra_checks {
            let cmd = self.read_cmd();
            let ready = if self.starting {
                cmd == I2C_CMD_TX_FIRST
            } else {
                cmd == I2C_CMD_TX_NEXT
            };
            if !ready {
                return Err(self.protocol_error("txbyte", cmd));
            }
        }
        self.starting = false;
        self.regs.write32(self.base + I2C_BYTE_BUF, u32::from(b));
        self.regs.write32(self.base + I2C_CMD, I2C_CMD_TX);
        self.wait("txbyte")?;

        let sts = self.read_sts();
        self.regs.write32(self.base + I2C_INTR_STS, sts);
        if sts & I2C_STS_TX_NACK != 0 {
            return Err(Error::Nack {
                bus: self.bus,
                byte: b,
                index: self.bytes,
                sts,
            });
        }
        if sts != I2C_STS_TX_ACK {
            return Err(Error::I2cStatus {
                bus: self.bus,
                op: "txbyte",
                sts,
                expected: I2C_STS_TX_ACK,
            });
        }
        self.bytes += 1;
        Ok(())
    }

    fn rx_byte(&mut self, last: bool) -> Result<u8> {
        if self.extra_checks {
            let cmd = self.read_cmd();
            if cmd & !I2C_CMD_SDA != I2C_CMD_ACTIVE {
                return Err(self.protocol_error("rxbyte", cmd));
            }
        }
        let command = if last { I2C_CMD_RX_LAST } else { I2C_CMD_RX };
        self.regs.write32(self.base + I2C_CMD, command);
        self.wait("rxbyte")?;

        let sts = self.read_sts();
        let data = self.regs.read32(self.base + I2C_BYTE_BUF);
        if sts != I2C_STS_RX_DONE {
            return Err(Error::I2cStatus {
                bus: self.bus,
                op: "rxbyte",
                sts,
                expected: I2C_STS_RX_DONE,
            });
        }
        self.regs.write32(self.base + I2C_INTR_STS, sts);
        self.bytes += 1;
        Ok((data >> 8) as u8)
    }

    fn stop(&mut self) -> Result<()> {
        if self.extra_checks {
            let cmd = self.read_cmd();
            if cmd & !I2C_CMD_SDA != I2C_CMD_ACTIVE {
                return Err(self.protocol_error("stop", cmd));
            }
        }
        self.regs.write32(self.base + I2C_CMD, I2C_CMD_STOP);
        self.wait("stop")?;
        let sts = self.read_sts();
        if sts != I2C_STS_STOP {
            return Err(Error::I2cStatus {
                bus: self.bus,
                op: "stop",
                sts,
                expected: I2C_STS_STOP,
            });
        }
        self.regs.write32(self.base + I2C_INTR_STS, sts);
        Ok(())
    }
}
