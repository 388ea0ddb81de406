//! Silicon revision decoding
//!
//! The SCU revision register encodes the chip model in bits 31:24 and 15:0
//! and the silicon step in bits 23:16.

use core::fmt;

use crate::error::{Error, Result};
use crate::regs::{BLOCK_LEN, SCU_ADDR, SCU_REVID};
use crate::region::{Region, RegionMapper};

/// AST chip model decoded from the revision id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AstModel {
    /// AST2400
    Ast2400,
    /// AST2500
    Ast2500,
    /// AST2510
    Ast2510,
    /// AST2520
    Ast2520,
    /// AST2530
    Ast2530,
}

impl AstModel {
    /// Model number as printed on the package
    pub fn number(self) -> u16 {
        match self {
            Self::Ast2400 => 2400,
            Self::Ast2500 => 2500,
            Self::Ast2510 => 2510,
            Self::Ast2520 => 2520,
            Self::Ast2530 => 2530,
        }
    }

    /// Register-layout family of this model
    pub fn family(self) -> Family {
        match self {
            Self::Ast2400 => Family::Ast2400,
            Self::Ast2500 | Self::Ast2510 | Self::Ast2520 | Self::Ast2530 => Family::Ast2500,
        }
    }
}

/// Register-layout family
///
/// The reset sequence differs per family: only the AST2500 family has a
/// third watchdog and a programmable reset mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// AST2400
    Ast2400,
    /// AST2500 and its 25x0 variants
    Ast2500,
}

impl Family {
    /// Returns true for the AST2500 family
    pub fn is_ast2500(self) -> bool {
        self == Self::Ast2500
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ast2400 => write!(f, "AST2400"),
            Self::Ast2500 => write!(f, "AST2500"),
        }
    }
}

/// Decoded silicon revision register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiliconId {
    /// Raw SCU revision id
    pub raw: u32,
    /// Chip model, `None` when the id is not recognized
    pub model: Option<AstModel>,
    /// Display step (A0, A1, A2...); 99 marks a pre-production step
    pub step: u8,
}

impl SiliconId {
    /// Decode a raw SCU revision id
    pub fn decode(raw: u32) -> Self {
        let step = match (raw >> 16) & 0xff {
            3 => 2,
            2 => 99,
            s => s as u8,
        };
        let model = match raw & !0x00ff_0000 {
            0x0200_0303 => Some(AstModel::Ast2400),
            0x0400_0303 => Some(AstModel::Ast2500),
            0x0400_0103 => Some(AstModel::Ast2510),
            0x0400_0203 => Some(AstModel::Ast2520),
            0x0400_0403 => Some(AstModel::Ast2530),
            _ => None,
        };
        Self { raw, model, step }
    }

    /// Register-layout family, or an error for unrecognized silicon
    pub fn family(&self) -> Result<Family> {
        self.model
            .map(AstModel::family)
            .ok_or(Error::UnknownSilicon(self.raw))
    }
}

impl fmt::Display for SiliconId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.model {
            Some(model) => write!(f, "AST{}-A{}", model.number(), self.step),
            None => write!(f, "AST-unknown-A{}", self.step),
        }
    }
}

/// Read the silicon revision register of an SCU window
pub fn read_silicon_id(scu: &dyn Region) -> SiliconId {
    SiliconId::decode(scu.read32(SCU_REVID))
}

/// Identify the chip behind `mapper` without building a handle
///
/// Only the SCU is mapped. Unknown revision ids are reported through
/// [`SiliconId::model`] rather than as an error.
pub fn identify(mapper: &dyn RegionMapper) -> Result<SiliconId> {
    let scu = mapper.map("scu", SCU_ADDR, BLOCK_LEN)?;
    let id = read_silicon_id(scu.as_ref());
    log::debug!("ast silicon rev id: {:#010x}", id.raw);
    Ok(id)
}
