//! SPI-NOR opcodes issued by the FMC engine

// ============================================================================
// Write control
// ============================================================================

/// Write Enable - required before any program/erase operation
pub const WREN: u8 = 0x06;
/// Write Disable - clears the WEL bit in the status register
pub const WRDI: u8 = 0x04;

// ============================================================================
// Status and identification
// ============================================================================

/// Read Status Register
pub const RDSR: u8 = 0x05;
/// Read JEDEC ID
pub const RDID: u8 = 0x9F;
/// Read Configuration Register (Macronix: 4BYTE bit 5, Winbond SR3: ADS bit 0)
pub const RDCR: u8 = 0x15;
/// Read Flag Status Register (Micron: addressing bit 0)
pub const RFSR: u8 = 0x70;
/// Bank Register Read (Spansion: EXTADD bit 7)
pub const BRRD: u8 = 0x16;
/// Bank Register Write (Spansion)
pub const BRWR: u8 = 0x17;

// ============================================================================
// Addressing mode
// ============================================================================

/// Enter 4-byte address mode
pub const EN4B: u8 = 0xB7;
/// Exit 4-byte address mode
pub const EX4B: u8 = 0xE9;
/// Spansion bank register EXTADD bit
pub const BANK_EXTADD: u8 = 0x80;

// ============================================================================
// Read / program / erase
// ============================================================================

/// Fast Read, 3-byte address
pub const FAST_READ: u8 = 0x0B;
/// Fast Read, 4-byte address
pub const FAST_READ_4B: u8 = 0x0C;
/// Page Program, 3-byte address
pub const PP: u8 = 0x02;
/// Page Program, 4-byte address
pub const PP_4B: u8 = 0x12;
/// 64K/256K block erase, 3-byte address
pub const BE: u8 = 0xD8;
/// 64K/256K block erase, 4-byte address
pub const BE_4B: u8 = 0xDC;

// ============================================================================
// Status register bits
// ============================================================================

/// Write In Progress
pub const SR_WIP: u8 = 0x01;
/// Write Enable Latch
pub const SR_WEL: u8 = 0x02;
/// Quad Enable (non-volatile on Macronix, harmless here)
pub const SR_QE: u8 = 0x40;

/// Page Program granularity
pub const PAGE_SIZE: usize = 256;

/// True for the read opcodes that run with the fast CE0 preset
pub fn is_fast_read(opcode: u8) -> bool {
    matches!(opcode, FAST_READ | FAST_READ_4B)
}

/// True for opcodes that always carry a 4-byte address
pub fn is_4b_opcode(opcode: u8) -> bool {
    matches!(opcode, FAST_READ_4B | PP_4B | BE_4B)
}

/// True for address-carrying opcodes limited to a 3-byte address
pub fn is_3b_opcode(opcode: u8) -> bool {
    matches!(opcode, FAST_READ | PP | BE)
}
