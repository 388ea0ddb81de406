//! AST2400/AST2500 register map
//!
//! Physical block addresses and the register offsets/values used by the
//! lifecycle controller and the engines. Offsets are relative to the block
//! base.

// ============================================================================
// Block addresses
// ============================================================================

/// System Control Unit
pub const SCU_ADDR: u64 = 0x1e6e_2000;
/// Watchdog timers
pub const WDT_ADDR: u64 = 0x1e78_5000;
/// I2C/SMBus controller
pub const I2C_ADDR: u64 = 0x1e78_a000;
/// LPC bridge
pub const LPC_ADDR: u64 = 0x1e78_9000;
/// Firmware memory controller registers
pub const FMC_ADDR: u64 = 0x1e62_0000;
/// CE0 flash segment (user-mode transfer data window)
pub const FMC_MEM: u64 = 0x2000_0000;

/// Size used for register blocks
pub const BLOCK_LEN: u64 = 0x1000;
/// Size of the flash segment window
pub const FMC_MEM_LEN: u64 = 64 * 1024 * 1024;

// ============================================================================
// SCU
// ============================================================================

/// Protection key register
pub const SCU_PROTECT: u64 = 0x00;
/// Value unlocking SCU writes
pub const SCU_UNLOCK_KEY: u32 = 0x1688_a8a8;
/// Hardware strap register (CPU enable / reset control in bits 1:0)
pub const SCU_HW_STRAP: u64 = 0x70;
/// Silicon revision id (AST2500: writes clear bits of SCU_HW_STRAP)
pub const SCU_REVID: u64 = 0x7c;
/// Multi-function pin control #5 (I2C 3..14 pin enables in bits 27:16)
pub const SCU_PINMUX5: u64 = 0x90;
/// Multi-function pin control #8 (AST2500 I2C 1/2 pin enables)
pub const SCU_PINMUX8: u64 = 0xa4;

/// Strap bits 1:0: ARM CPU disabled
pub const STRAP_CPU_DISABLE: u32 = 0x3;
/// Strap bits 1:0 encoding after which the core resets cleanly
pub const STRAP_CPU_WILL_RESET: u32 = 0x2;
/// AST2500 strap-clear value: disable SPI master, enable CPU boot
pub const STRAP_CLEAR_2500: u32 = 0x3001;
/// AST2500 strap-set value: enable SPI master
pub const STRAP_SET_2500: u32 = 0x1000;

// ============================================================================
// Watchdogs
// ============================================================================

/// WDT1 reload value
pub const WDT1_RELOAD: u64 = 0x04;
/// WDT1 restart register
pub const WDT1_RESTART: u64 = 0x08;
/// WDT1 control
pub const WDT1_CTRL: u64 = 0x0c;
/// WDT1 reset mask (AST2500)
pub const WDT1_RESET_MASK: u64 = 0x1c;
/// WDT2 control
pub const WDT2_CTRL: u64 = 0x2c;
/// WDT2 timeout status clear
pub const WDT2_CLEAR_STATUS: u64 = 0x34;
/// WDT3 control (AST2500)
pub const WDT3_CTRL: u64 = 0x4c;
/// WDT3 timeout status clear (AST2500)
pub const WDT3_CLEAR_STATUS: u64 = 0x54;

/// Magic value restarting a watchdog counter
pub const WDT_RESTART_MAGIC: u32 = 0x4755;
/// Short reload value used to trigger a controlled reset
pub const WDT_RESET_RELOAD: u32 = 0x10;
/// Control: enable + reset system + signal, ARM core reset
pub const WDT_CTRL_CPU_RESET: u32 = 0x13;
/// Control: enable + reset system + signal, full SoC reset
pub const WDT_CTRL_SOC_RESET: u32 = 0x33;
/// AST2500 WDT1 reset mask used on restart
pub const WDT_RESET_MASK_2500: u32 = 0x033f_dff3;
/// Reset mask bit covering the LPC controller
pub const WDT_RESET_MASK_LPC: u32 = 0x0000_2000;

// ============================================================================
// LPC
// ============================================================================

/// LPC host interface control (channel enables)
pub const LPC_HICR0: u64 = 0x00;
/// LPC host interface control 4 (KCS/BT enables)
pub const LPC_HICR4: u64 = 0x10;
/// HICR0 channel enable bits cleared on stop
pub const LPC_HICR0_CHANNELS: u32 = 0xec;
/// HICR4 KCS/BT enable bits cleared on stop
pub const LPC_HICR4_KCS_BT: u32 = 0x05;

// ============================================================================
// I2C
// ============================================================================

/// Number of I2C buses on AST2400/AST2500
pub const I2C_BUS_COUNT: u8 = 14;
/// Function control register
pub const I2C_FUN_CTRL: u64 = 0x00;
/// AC timing register 1
pub const I2C_AC_TIMING1: u64 = 0x04;
/// Interrupt status
pub const I2C_INTR_STS: u64 = 0x10;
/// Command/status register
pub const I2C_CMD: u64 = 0x14;
/// Byte buffer (tx in bits 7:0, rx in bits 15:8)
pub const I2C_BYTE_BUF: u64 = 0x20;

/// Function control: master enable
pub const I2C_MASTER_EN: u32 = 0x1;
/// Cmd/status value of an idle, ready controller
pub const I2C_CMD_IDLE: u32 = 0x0a06_0000;
/// Cmd/status value after a start, ready for the address byte
pub const I2C_CMD_TX_FIRST: u32 = 0x1441_0000;
/// Cmd/status value after a transmitted byte
pub const I2C_CMD_TX_NEXT: u32 = 0x0c43_0000;
/// Cmd/status value (SDA bit masked) while master is active
pub const I2C_CMD_ACTIVE: u32 = 0x0c41_0000;
/// SDA line state bit in the cmd/status register
pub const I2C_CMD_SDA: u32 = 0x0002_0000;
/// Pending command bits in the cmd/status register
pub const I2C_CMD_PENDING: u32 = 0x3ff;
/// Bus recovery / controller reset request
pub const I2C_CMD_RECOVER: u32 = 1 << 11;

/// Command: start
pub const I2C_CMD_START: u32 = 0x01;
/// Command: transmit byte
pub const I2C_CMD_TX: u32 = 0x02;
/// Command: receive byte
pub const I2C_CMD_RX: u32 = 0x08;
/// Command: receive last byte (answer with NACK)
pub const I2C_CMD_RX_LAST: u32 = 0x18;
/// Command: stop
pub const I2C_CMD_STOP: u32 = 0x20;

/// Status: transmitted byte was acknowledged
pub const I2C_STS_TX_ACK: u32 = 0x01;
/// Status: transmitted byte was not acknowledged
pub const I2C_STS_TX_NACK: u32 = 0x02;
/// Status: byte received
pub const I2C_STS_RX_DONE: u32 = 0x04;
/// Status: stop condition completed
pub const I2C_STS_STOP: u32 = 0x10;

// ============================================================================
// FMC
// ============================================================================

/// CE type setting (bit 16: CE0 write enable, bits 1:0: CE0 flash type)
pub const FMC_CE_TYPE: u64 = 0x00;
/// CE control (bit 0: CE0 4-byte mode, bit 8: CE0 div2 timing)
pub const FMC_CE_CTRL: u64 = 0x04;
/// CE0 control register
pub const FMC_CE0_CTRL: u64 = 0x10;
/// Data input delay
pub const FMC_INPUT_DELAY: u64 = 0x94;
/// Write address filter enable
pub const FMC_FILTER: u64 = 0xa0;

/// CE0 control: user mode, CE asserted
pub const FMC_USER_MODE: u32 = 0x0003;
/// CE0 control: user mode, CE deasserted
pub const FMC_USER_IDLE: u32 = 0x0007;
/// CE0 control preset for ordinary commands
pub const FMC_CE0_SLOW: u32 = 0x0300;
/// CE0 control preset for fast reads
pub const FMC_CE0_FAST: u32 = 0x0600;
/// CE control value selecting 3-byte addressing
pub const FMC_CE_CTRL_3B: u32 = 0x700;
/// CE control value selecting 4-byte addressing
pub const FMC_CE_CTRL_4B: u32 = 0x701;

/// Register base of an I2C bus within the I2C block
///
/// Buses 0-6 sit at 0x40 + 0x40*n, buses 7-13 at 0x300 + 0x40*(n-7).
pub fn i2c_base(bus: u8) -> u64 {
    let bus = u64::from(bus);
    if bus >= 7 {
        (bus - 7) * 0x40 + 0x300
    } else {
        bus * 0x40 + 0x40
    }
}

/// SCU_PINMUX5 bit enabling the pins of I2C buses 2..=13
pub fn i2c_pin_bit(bus: u8) -> Option<u32> {
    (2..I2C_BUS_COUNT)
        .contains(&bus)
        .then(|| 1u32 << (u32::from(bus) + 16 - 2))
}
