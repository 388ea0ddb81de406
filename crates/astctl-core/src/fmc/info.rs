//! FMC register decoding for diagnostics (AST2500 layout)

use core::fmt;

use crate::error::{Error, Result};
use crate::region::Region;
use crate::regs::{FMC_CE0_CTRL, FMC_CE_CTRL, FMC_CE_TYPE, FMC_FILTER, FMC_INPUT_DELAY};
use crate::silicon::Family;

/// Bit field within a register
#[derive(Debug, Clone, Copy)]
pub struct FieldDesc {
    /// Field name
    pub name: &'static str,
    /// Lowest bit
    pub first_bit: u8,
    /// Width in bits
    pub num_bits: u8,
}

impl FieldDesc {
    const fn new(name: &'static str, high: u8, low: u8) -> Self {
        Self {
            name,
            first_bit: low,
            num_bits: high + 1 - low,
        }
    }

    /// Extract this field from a register value
    pub fn extract(&self, value: u32) -> u32 {
        let shifted = value >> self.first_bit;
        if self.num_bits >= 32 {
            shifted
        } else {
            shifted & ((1 << self.num_bits) - 1)
        }
    }
}

/// Register with its decoded fields
#[derive(Debug, Clone, Copy)]
pub struct RegDesc {
    /// Offset within the FMC block
    pub offset: u64,
    /// Register name
    pub name: &'static str,
    /// Fields; empty when the register is shown whole
    pub fields: &'static [FieldDesc],
}

/// FMC registers shown by [`FmcInfo`]
pub static FMC_REGS: &[RegDesc] = &[
    RegDesc {
        offset: FMC_CE_TYPE,
        name: "CEType",
        fields: &[
            FieldDesc::new("CE write type", 16, 16),
            FieldDesc::new("CE Flash type (2 == spiflash)", 1, 0),
        ],
    },
    RegDesc {
        offset: FMC_CE_CTRL,
        name: "CeCtl",
        fields: &[
            FieldDesc::new("Ce0Div2", 8, 8),
            FieldDesc::new("Ce0Addr4B", 0, 0),
        ],
    },
    RegDesc {
        offset: FMC_CE0_CTRL,
        name: "Ce0Ctl",
        fields: &[
            FieldDesc::new("IO mode", 30, 28),
            FieldDesc::new("Cmd", 23, 16),
            FieldDesc::new("dummy cycles bit2", 15, 15),
            FieldDesc::new("CmdMerge", 12, 12),
            FieldDesc::new("ClkSpeed (0 == HCLK/16, 15 = HCLK)", 11, 8),
            FieldDesc::new("dummy cycles bit1:0", 7, 6),
            FieldDesc::new("Msbit-Lsbit order", 5, 5),
            FieldDesc::new("DualInput", 3, 3),
            FieldDesc::new("CeStopActive", 2, 2),
            FieldDesc::new("CmdMode", 1, 0),
        ],
    },
    RegDesc {
        offset: FMC_INPUT_DELAY,
        name: "DataInputDelay",
        fields: &[],
    },
];

/// One decoded register or field value
#[derive(Debug, Clone)]
pub struct FieldValue {
    /// Register name
    pub reg: &'static str,
    /// Field name, `None` for a whole register
    pub field: Option<&'static str>,
    /// Value
    pub value: u32,
}

/// Snapshot of the FMC configuration
#[derive(Debug, Clone)]
pub struct FmcInfo {
    /// Raw CE type register
    pub ce_type: u32,
    /// Raw write address filter register
    pub filter: u32,
    /// CE0 writes enabled
    pub writable: bool,
    /// Write address filter enabled
    pub filter_enabled: bool,
    /// Address bytes used by the controller (3 or 4)
    pub addr_bytes: u8,
    /// CE0 div2 timing
    pub div2: bool,
    /// CE0 IO mode
    pub io_mode: u8,
    /// CE0 command opcode
    pub command: u8,
    /// All fields of [`FMC_REGS`]
    pub fields: Vec<FieldValue>,
}

impl FmcInfo {
    /// Decode the FMC register block
    pub fn read(regs: &dyn Region, family: Family) -> Result<Self> {
        if !family.is_ast2500() {
            return Err(Error::UnsupportedFamily {
                op: "FMC info",
                required: "AST2500",
            });
        }
        let ce_type = regs.read32(FMC_CE_TYPE);
        let filter = regs.read32(FMC_FILTER);
        if ce_type & 3 != 2 {
            return Err(Error::Ce0NotSpi(ce_type));
        }
        let ce_ctrl = regs.read32(FMC_CE_CTRL);
        let ce0 = regs.read32(FMC_CE0_CTRL);

        let mut fields = Vec::new();
        for reg in FMC_REGS {
            let value = regs.read32(reg.offset);
            if reg.fields.is_empty() {
                fields.push(FieldValue {
                    reg: reg.name,
                    field: None,
                    value,
                });
            }
            fields.extend(reg.fields.iter().map(|f| FieldValue {
                reg: reg.name,
                field: Some(f.name),
                value: f.extract(value),
            }));
        }

        Ok(Self {
            ce_type,
            filter,
            writable: ce_type & (1 << 16) != 0,
            filter_enabled: filter & 1 != 0,
            addr_bytes: 3 + (ce_ctrl & 1) as u8,
            div2: ce_ctrl & (1 << 8) != 0,
            io_mode: ((ce0 >> 28) & 0x7) as u8,
            command: ((ce0 >> 16) & 0xff) as u8,
            fields,
        })
    }
}

impl fmt::Display for FmcInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "spi0={:#x}, writable={} filter={}",
            self.ce_type, self.writable as u8, self.filter_enabled as u8
        )?;
        writeln!(f, "\tEnables={:#x}", self.filter)?;
        writeln!(
            f,
            "div2timings={} addr_bytes={}",
            self.div2 as u8, self.addr_bytes
        )?;
        writeln!(f, "iomode={:#x} cmd={:#x}", self.io_mode, self.command)?;
        for v in &self.fields {
            match v.field {
                Some(field) => writeln!(f, "{}.{}: {:#x}", v.reg, field, v.value)?,
                None => writeln!(f, "{}: {:#x}", v.reg, v.value)?,
            }
        }
        Ok(())
    }
}
