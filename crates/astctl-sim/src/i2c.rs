//! Byte-mode I2C controller model
//!
//! Mirrors the command/status encodings the controller presents between
//! steps of a master transaction, with slave devices attached per bus.

use std::collections::BTreeMap;

use astctl_core::regs::*;

use crate::SimEvent;

/// Simulated I2C slave
#[derive(Debug, Clone, Default)]
pub struct SimI2cDevice {
    /// Bytes returned to reads, repeated from the start when exhausted
    pub read_data: Vec<u8>,
    /// Bytes written by the master, across all transactions
    pub written: Vec<u8>,
    /// Number of data bytes acknowledged before the device NACKs
    pub nack_after: Option<usize>,
    pub(crate) read_pos: usize,
    pub(crate) data_in_txn: usize,
}

impl SimI2cDevice {
    /// Device answering reads with `read_data`
    pub fn new(read_data: &[u8]) -> Self {
        Self {
            read_data: read_data.to_vec(),
            ..Self::default()
        }
    }

    fn next_read(&mut self) -> u8 {
        if self.read_data.is_empty() {
            return 0xff;
        }
        let b = self.read_data[self.read_pos % self.read_data.len()];
        self.read_pos += 1;
        b
    }
}

/// Controller phase, reported through the command/status register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    AddrPending,
    Transmitted,
    Receiving,
}

impl Phase {
    fn encoding(self) -> u32 {
        match self {
            Self::Idle => I2C_CMD_IDLE,
            Self::AddrPending => I2C_CMD_TX_FIRST,
            Self::Transmitted => I2C_CMD_TX_NEXT,
            Self::Receiving => I2C_CMD_ACTIVE,
        }
    }
}

/// One bus channel
#[derive(Debug)]
pub(crate) struct SimI2cChannel {
    bus: u8,
    pub(crate) fun_ctrl: u32,
    pub(crate) ac_timing: u32,
    sts: u32,
    byte_buf: u32,
    phase: Phase,
    /// Slave addressed in the current transaction
    target: Option<u8>,
    /// Command register stuck with this value until recovered
    pub(crate) dirty: Option<u32>,
    /// Commands never complete
    pub(crate) wedged: bool,
    pending: u32,
    pub(crate) devices: BTreeMap<u8, SimI2cDevice>,
}

impl SimI2cChannel {
    pub(crate) fn new(bus: u8) -> Self {
        Self {
            bus,
            fun_ctrl: 0,
            ac_timing: 0,
            sts: 0,
            byte_buf: 0,
            phase: Phase::Idle,
            target: None,
            dirty: None,
            wedged: false,
            pending: 0,
            devices: BTreeMap::new(),
        }
    }

    pub(crate) fn read(&self, reg: u64) -> u32 {
        match reg {
            I2C_FUN_CTRL => self.fun_ctrl,
            I2C_AC_TIMING1 => self.ac_timing,
            I2C_INTR_STS => self.sts,
            I2C_CMD => match self.dirty {
                Some(v) => v,
                None => self.phase.encoding() | self.pending,
            },
            I2C_BYTE_BUF => self.byte_buf,
            _ => 0,
        }
    }

    pub(crate) fn write(&mut self, reg: u64, value: u32, events: &mut Vec<SimEvent>) {
        match reg {
            I2C_FUN_CTRL => self.fun_ctrl = value,
            I2C_AC_TIMING1 => self.ac_timing = value,
            I2C_INTR_STS => self.sts &= !value,
            I2C_BYTE_BUF => self.byte_buf = value,
            I2C_CMD => self.command(value, events),
            _ => {}
        }
    }

    fn command(&mut self, value: u32, events: &mut Vec<SimEvent>) {
        if value & I2C_CMD_RECOVER != 0 {
            self.dirty = None;
            self.pending = 0;
            self.phase = Phase::Idle;
            self.target = None;
            return;
        }
        if value == 0 || self.dirty.is_some() {
            return;
        }
        if self.wedged {
            self.pending = value & I2C_CMD_PENDING;
            return;
        }
        if self.fun_ctrl & I2C_MASTER_EN == 0 {
            log::warn!("sim i2c-{}: command {:#x} with master disabled", self.bus, value);
            return;
        }

        let bus = self.bus;
        match value {
            I2C_CMD_START => {
                events.push(SimEvent::I2cStart {
                    bus,
                    repeated: self.phase != Phase::Idle,
                });
                self.phase = Phase::AddrPending;
                self.sts = 0;
            }
            I2C_CMD_TX => {
                let byte = (self.byte_buf & 0xff) as u8;
                let ack = if self.phase == Phase::AddrPending {
                    self.target = Some(byte >> 1).filter(|a| self.devices.contains_key(a));
                    if let Some(dev) = self.target.and_then(|a| self.devices.get_mut(&a)) {
                        dev.data_in_txn = 0;
                    }
                    self.target.is_some()
                } else {
                    match self.target.and_then(|a| self.devices.get_mut(&a)) {
                        Some(dev) if dev.nack_after.is_some_and(|n| dev.data_in_txn >= n) => false,
                        Some(dev) => {
                            dev.written.push(byte);
                            dev.data_in_txn += 1;
                            true
                        }
                        None => false,
                    }
                };
                events.push(SimEvent::I2cTx { bus, byte, ack });
                self.sts = if ack { I2C_STS_TX_ACK } else { I2C_STS_TX_NACK };
                self.phase = Phase::Transmitted;
            }
            I2C_CMD_RX | I2C_CMD_RX_LAST => {
                let byte = self
                    .target
                    .and_then(|a| self.devices.get_mut(&a))
                    .map_or(0xff, SimI2cDevice::next_read);
                events.push(SimEvent::I2cRx { bus, byte });
                self.byte_buf = u32::from(byte) << 8;
                self.sts = I2C_STS_RX_DONE;
                self.phase = Phase::Receiving;
            }
            I2C_CMD_STOP => {
                events.push(SimEvent::I2cStop { bus });
                self.sts = I2C_STS_STOP;
                self.phase = Phase::Idle;
                self.target = None;
            }
            other => log::warn!("sim i2c-{}: unsupported command {:#x}", bus, other),
        }
    }
}
