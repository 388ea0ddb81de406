//! SPI-NOR model behind the FMC user-mode port
//!
//! Bytes clocked out while CE0 is asserted are collected; loads from the
//! data window return the response stream for the collected command; the
//! command's side effects happen when CE0 is released.

use astctl_core::fmc::chips::{self, AddrSwitch, ModeProbe};
use astctl_core::fmc::opcodes::*;

/// Configuration of the simulated flash part
#[derive(Debug, Clone)]
pub struct SimFlashConfig {
    /// JEDEC id answered to RDID
    pub jedec_id: u32,
    /// Size in bytes
    pub size: usize,
    /// Block erase size in bytes
    pub erase_size: usize,
    /// Register read reporting 4-byte mode
    pub mode_probe: ModeProbe,
    /// Mode-switch command set understood by the part
    pub addr_switch: Option<AddrSwitch>,
    /// Part powers up in 4-byte mode
    pub four_byte: bool,
    /// Status polls during which WIP stays set after a program/erase
    pub busy_polls: u32,
}

impl SimFlashConfig {
    /// Configuration of a part from the chip table
    ///
    /// Falls back to a 32 MiB part answering `jedec_id` when the id is unknown.
    pub fn for_id(jedec_id: u32) -> Self {
        match chips::find(jedec_id) {
            Some(chip) => Self {
                jedec_id,
                size: chip.size as usize,
                erase_size: chip.erase_size as usize,
                mode_probe: chip.mode_probe,
                addr_switch: chip.addr_switch,
                four_byte: false,
                busy_polls: 1,
            },
            None => Self {
                jedec_id,
                size: 32 << 20,
                erase_size: 64 << 10,
                mode_probe: ModeProbe {
                    opcode: RDCR,
                    mask: 0x20,
                },
                addr_switch: Some(AddrSwitch::EnterExit),
                four_byte: false,
                busy_polls: 1,
            },
        }
    }
}

impl Default for SimFlashConfig {
    /// Macronix MX25L25635F
    fn default() -> Self {
        Self::for_id(0xc2_2019)
    }
}

/// One completed command as seen on the SPI bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpiCommand {
    /// Opcode byte
    pub opcode: u8,
    /// Decoded address for read/program/erase opcodes
    pub addr: Option<u32>,
    /// Payload bytes after the address
    pub data_len: usize,
    /// Bytes clocked in
    pub read_len: usize,
}

/// Simulated SPI-NOR part
pub struct SimFlash {
    config: SimFlashConfig,
    data: Vec<u8>,
    four_byte: bool,
    wel: bool,
    busy: u32,
    /// WIP never clears
    pub(crate) stuck_busy: bool,
    /// Page program at this address is acknowledged but not stored
    pub(crate) drop_program_at: Option<u32>,
    /// Extra status bits reported on every read
    pub(crate) status_extra: u8,
    // Current transaction
    selected: bool,
    out: Vec<u8>,
    read_pos: usize,
}

impl SimFlash {
    pub(crate) fn new(config: SimFlashConfig) -> Self {
        Self {
            data: vec![0xff; config.size],
            four_byte: config.four_byte,
            wel: false,
            busy: 0,
            stuck_busy: false,
            drop_program_at: None,
            status_extra: 0,
            selected: false,
            out: Vec::new(),
            read_pos: 0,
            config,
        }
    }

    pub(crate) fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub(crate) fn is_four_byte(&self) -> bool {
        self.four_byte
    }

    pub(crate) fn set_wel(&mut self, wel: bool) {
        self.wel = wel;
    }

    fn status(&self) -> u8 {
        let mut sr = self.status_extra;
        if self.wel {
            sr |= SR_WEL;
        }
        if self.busy > 0 || self.stuck_busy {
            sr |= SR_WIP;
        }
        sr
    }

    /// CE0 asserted
    pub(crate) fn select(&mut self) {
        self.selected = true;
        self.out.clear();
        self.read_pos = 0;
    }

    /// Byte clocked out
    pub(crate) fn shift_out(&mut self, b: u8) {
        if self.selected {
            self.out.push(b);
        } else {
            log::warn!("sim flash: byte {:#04x} written with CE0 released", b);
        }
    }

    /// Byte clocked in
    pub(crate) fn shift_in(&mut self) -> u8 {
        let n = self.read_pos;
        self.read_pos += 1;
        let Some(&opcode) = self.out.first() else {
            return 0xff;
        };
        match opcode {
            RDID => self.config.jedec_id.to_be_bytes().get(n + 1).copied().unwrap_or(0),
            RDSR => self.status(),
            op if op == self.config.mode_probe.opcode => {
                if self.four_byte {
                    self.config.mode_probe.mask
                } else {
                    0
                }
            }
            FAST_READ | FAST_READ_4B => match self.decode_addr(opcode) {
                Some((addr, _)) => {
                    let pos = (addr as usize + n) % self.config.size;
                    self.data[pos]
                }
                None => 0xff,
            },
            _ => 0xff,
        }
    }

    /// CE0 released: complete the command
    pub(crate) fn deselect(&mut self) -> Option<SpiCommand> {
        if !self.selected {
            return None;
        }
        self.selected = false;
        let out = std::mem::take(&mut self.out);
        let &opcode = out.first()?;
        let decoded = self.decode_addr_from(&out, opcode);
        let cmd = SpiCommand {
            opcode,
            addr: decoded.map(|(a, _)| a),
            data_len: decoded.map_or(out.len() - 1, |(_, hdr)| out.len() - hdr),
            read_len: self.read_pos,
        };

        match opcode {
            RDSR if self.busy > 0 => self.busy -= 1,
            WREN => self.wel = true,
            WRDI => self.wel = false,
            EN4B if self.config.addr_switch == Some(AddrSwitch::EnterExit) => {
                self.four_byte = true
            }
            EX4B if self.config.addr_switch == Some(AddrSwitch::EnterExit) => {
                self.four_byte = false
            }
            BRWR if self.config.addr_switch == Some(AddrSwitch::BankRegister) => {
                self.four_byte = out.get(1).is_some_and(|b| b & BANK_EXTADD != 0)
            }
            PP | PP_4B => {
                if let Some((addr, hdr)) = decoded {
                    self.program(addr, &out[hdr..]);
                }
            }
            BE | BE_4B => {
                if let Some((addr, _)) = decoded {
                    self.erase(addr);
                }
            }
            _ => {}
        }
        Some(cmd)
    }

    fn decode_addr(&self, opcode: u8) -> Option<(u32, usize)> {
        self.decode_addr_from(&self.out, opcode)
    }

    /// Address and header length (opcode + address bytes) of `out`
    fn decode_addr_from(&self, out: &[u8], opcode: u8) -> Option<(u32, usize)> {
        let width = match opcode {
            FAST_READ_4B | PP_4B | BE_4B => 4,
            FAST_READ | PP | BE if self.four_byte => 4,
            FAST_READ | PP | BE => 3,
            _ => return None,
        };
        let bytes = out.get(1..1 + width)?;
        let addr = bytes.iter().fold(0u32, |a, &b| a << 8 | u32::from(b));
        Some((addr, 1 + width))
    }

    fn program(&mut self, addr: u32, payload: &[u8]) {
        if !self.wel || self.busy > 0 {
            log::debug!("sim flash: program at {:#x} ignored (wel={})", addr, self.wel);
            return;
        }
        self.wel = false;
        self.busy = self.config.busy_polls;
        if self.drop_program_at == Some(addr) {
            log::debug!("sim flash: dropping program at {:#x}", addr);
            return;
        }
        // Page program wraps inside the page
        let page = addr as usize & !(PAGE_SIZE - 1);
        let mut col = addr as usize & (PAGE_SIZE - 1);
        for &b in payload {
            let pos = (page + col) % self.config.size;
            self.data[pos] &= b;
            col = (col + 1) % PAGE_SIZE;
        }
    }

    fn erase(&mut self, addr: u32) {
        if !self.wel || self.busy > 0 {
            log::debug!("sim flash: erase at {:#x} ignored (wel={})", addr, self.wel);
            return;
        }
        self.wel = false;
        self.busy = self.config.busy_polls;
        let start = addr as usize & !(self.config.erase_size - 1);
        if start < self.config.size {
            self.data[start..start + self.config.erase_size].fill(0xff);
        }
    }
}
