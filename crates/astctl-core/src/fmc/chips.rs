//! Flash chip database
//!
//! The AST boards this tool targets ship with a handful of 32/64 MiB parts.
//! Each entry records the geometry and the vendor-specific way of switching
//! and querying 3-byte/4-byte addressing. Unknown ids are refused: guessing
//! geometry or a mode-switch sequence can leave the part unreadable.

use bitflags::bitflags;

use super::opcodes::*;

bitflags! {
    /// Capabilities of a flash part
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ChipFeatures: u8 {
        /// Has dedicated 4-byte address opcodes (0x0C, 0x12, 0xDC)
        const OPCODES_4B = 1 << 0;
        /// Can be switched to 4-byte addressing
        const ADDR_4B    = 1 << 1;
    }
}

/// Command sequence switching between 3-byte and 4-byte addressing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrSwitch {
    /// Single-byte EN4B (0xB7) / EX4B (0xE9)
    EnterExit,
    /// Bank register write (0x17) of the EXTADD bit
    BankRegister,
}

impl AddrSwitch {
    /// Bytes to clock out to select 4-byte (`true`) or 3-byte addressing
    pub fn command(self, four_byte: bool) -> &'static [u8] {
        match (self, four_byte) {
            (Self::EnterExit, true) => &[EN4B],
            (Self::EnterExit, false) => &[EX4B],
            (Self::BankRegister, true) => &[BRWR, BANK_EXTADD],
            (Self::BankRegister, false) => &[BRWR, 0x00],
        }
    }
}

/// Register read reporting whether the part is in 4-byte addressing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeProbe {
    /// Register read opcode
    pub opcode: u8,
    /// Bit set while in 4-byte mode
    pub mask: u8,
}

/// Flash chip descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashChip {
    /// 24-bit JEDEC id (manufacturer, memory type, capacity)
    pub jedec_id: u32,
    /// Part name
    pub name: &'static str,
    /// Total size in bytes
    pub size: u32,
    /// Block erase granularity in bytes
    pub erase_size: u32,
    /// Capabilities
    pub features: ChipFeatures,
    /// Addressing switch sequence, if known
    pub addr_switch: Option<AddrSwitch>,
    /// Addressing mode query
    pub mode_probe: ModeProbe,
}

impl FlashChip {
    /// Returns true if the part has dedicated 4-byte opcodes
    pub fn has_4b_opcodes(&self) -> bool {
        self.features.contains(ChipFeatures::OPCODES_4B)
    }

    /// Returns true if the part can be switched to 4-byte addressing
    pub fn supports_4b_addressing(&self) -> bool {
        self.features.contains(ChipFeatures::ADDR_4B)
    }
}

const MIB: u32 = 1024 * 1024;
const KIB: u32 = 1024;

/// Known flash parts
pub static CHIPS: &[FlashChip] = &[
    FlashChip {
        jedec_id: 0xef_4018,
        name: "w25q128",
        size: 16 * MIB,
        erase_size: 64 * KIB,
        features: ChipFeatures::empty(),
        addr_switch: None,
        mode_probe: ModeProbe { opcode: RDCR, mask: 0x01 },
    },
    FlashChip {
        jedec_id: 0xc2_2019,
        name: "mx25l25635f",
        size: 32 * MIB,
        erase_size: 64 * KIB,
        features: ChipFeatures::OPCODES_4B.union(ChipFeatures::ADDR_4B),
        addr_switch: Some(AddrSwitch::EnterExit),
        mode_probe: ModeProbe { opcode: RDCR, mask: 0x20 },
    },
    FlashChip {
        jedec_id: 0xef_4019,
        name: "w25q256",
        size: 32 * MIB,
        erase_size: 64 * KIB,
        features: ChipFeatures::OPCODES_4B.union(ChipFeatures::ADDR_4B),
        addr_switch: None,
        mode_probe: ModeProbe { opcode: RDCR, mask: 0x01 },
    },
    FlashChip {
        jedec_id: 0x20_ba20,
        name: "n25q512a",
        size: 64 * MIB,
        erase_size: 64 * KIB,
        features: ChipFeatures::OPCODES_4B.union(ChipFeatures::ADDR_4B),
        addr_switch: Some(AddrSwitch::EnterExit),
        mode_probe: ModeProbe { opcode: RFSR, mask: 0x01 },
    },
    FlashChip {
        jedec_id: 0xc2_201a,
        name: "mx66l51235l",
        size: 64 * MIB,
        erase_size: 64 * KIB,
        features: ChipFeatures::OPCODES_4B.union(ChipFeatures::ADDR_4B),
        addr_switch: Some(AddrSwitch::EnterExit),
        mode_probe: ModeProbe { opcode: RDCR, mask: 0x20 },
    },
    FlashChip {
        jedec_id: 0x01_0220,
        name: "s25fl512s",
        size: 64 * MIB,
        erase_size: 256 * KIB,
        features: ChipFeatures::OPCODES_4B.union(ChipFeatures::ADDR_4B),
        addr_switch: Some(AddrSwitch::BankRegister),
        mode_probe: ModeProbe { opcode: BRRD, mask: 0x80 },
    },
];

/// Look up a part by JEDEC id
pub fn find(jedec_id: u32) -> Option<&'static FlashChip> {
    CHIPS.iter().find(|c| c.jedec_id == jedec_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find() {
        let chip = find(0xc22019).unwrap();
        assert_eq!(chip.name, "mx25l25635f");
        assert_eq!(chip.size, 32 * MIB);
        assert!(chip.has_4b_opcodes());
        assert!(chip.supports_4b_addressing());
        assert!(find(0x123456).is_none());
    }

    #[test]
    fn test_ids_unique() {
        for (i, a) in CHIPS.iter().enumerate() {
            for b in &CHIPS[i + 1..] {
                assert_ne!(a.jedec_id, b.jedec_id, "{} / {}", a.name, b.name);
            }
        }
    }

    #[test]
    fn test_geometry_consistent() {
        for chip in CHIPS {
            assert_eq!(chip.size % chip.erase_size, 0, "{}", chip.name);
            assert_eq!(chip.erase_size as usize % PAGE_SIZE, 0, "{}", chip.name);
        }
    }

    #[test]
    fn test_parts_above_16mib_support_4b_addressing() {
        for chip in CHIPS {
            assert_eq!(
                chip.supports_4b_addressing(),
                chip.size > 16 * MIB,
                "{}",
                chip.name
            );
        }
    }

    #[test]
    fn test_switch_commands() {
        assert_eq!(AddrSwitch::EnterExit.command(true), &[0xb7]);
        assert_eq!(AddrSwitch::EnterExit.command(false), &[0xe9]);
        assert_eq!(AddrSwitch::BankRegister.command(true), &[0x17, 0x80]);
        assert_eq!(AddrSwitch::BankRegister.command(false), &[0x17, 0x00]);
    }
}
