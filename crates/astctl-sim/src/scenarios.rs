//! End-to-end runs of the chip handle and engines against the model

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use astctl_core::flash::{write_image, NoProgress};
use astctl_core::fmc::opcodes::*;
use astctl_core::fmc::read_info;
use astctl_core::regs::*;
use astctl_core::{identify, AddrMode, AstHandle, AstOptions, Error};

use super::*;

fn handle(sim: &SimSoc) -> AstHandle {
    handle_with(sim, AstOptions::new())
}

fn handle_with(sim: &SimSoc, options: AstOptions) -> AstHandle {
    AstHandle::new(Arc::new(sim.clone()), options).unwrap()
}

fn i2c_events(sim: &SimSoc) -> Vec<SimEvent> {
    sim.events()
        .into_iter()
        .filter(|e| !matches!(e, SimEvent::RegWrite { .. } | SimEvent::Spi(_)))
        .collect()
}

fn i2c_reg(bus: u8, reg: u64) -> u64 {
    I2C_ADDR + i2c_base(bus) + reg
}

// ============================================================================
// I2C
// ============================================================================

#[test]
fn test_i2c_single_byte_write_is_one_transaction() {
    let sim = SimSoc::ast2500();
    sim.add_i2c_device(2, 0x72, SimI2cDevice::default());
    let h = handle(&sim);

    let mut bus = h.i2c_bus(2).unwrap();
    bus.tx(0x72, &[0x10], &mut []).unwrap();

    assert_eq!(
        i2c_events(&sim),
        [
            SimEvent::I2cStart { bus: 2, repeated: false },
            SimEvent::I2cTx { bus: 2, byte: 0xe4, ack: true },
            SimEvent::I2cTx { bus: 2, byte: 0x10, ack: true },
            SimEvent::I2cStop { bus: 2 },
        ]
    );
    assert_eq!(sim.i2c_device(2, 0x72).unwrap().written, [0x10]);
    assert_eq!(sim.peek(i2c_reg(2, I2C_CMD)), I2C_CMD_IDLE);
}

#[test]
fn test_i2c_write_then_read_uses_repeated_start() {
    let sim = SimSoc::ast2400();
    sim.add_i2c_device(7, 0x50, SimI2cDevice::new(&[0xaa, 0xbb]));
    let h = handle(&sim);

    let mut bus = h.i2c_bus(7).unwrap();
    let mut r = [0u8; 2];
    bus.tx(0x50, &[0x00], &mut r).unwrap();

    assert_eq!(r, [0xaa, 0xbb]);
    assert_eq!(
        i2c_events(&sim),
        [
            SimEvent::I2cStart { bus: 7, repeated: false },
            SimEvent::I2cTx { bus: 7, byte: 0xa0, ack: true },
            SimEvent::I2cTx { bus: 7, byte: 0x00, ack: true },
            SimEvent::I2cStart { bus: 7, repeated: true },
            SimEvent::I2cTx { bus: 7, byte: 0xa1, ack: true },
            SimEvent::I2cRx { bus: 7, byte: 0xaa },
            SimEvent::I2cRx { bus: 7, byte: 0xbb },
            SimEvent::I2cStop { bus: 7 },
        ]
    );
}

#[test]
fn test_i2c_read_only_skips_write_phase() {
    let sim = SimSoc::ast2500();
    sim.add_i2c_device(3, 0x48, SimI2cDevice::new(&[0x19]));
    let h = handle(&sim);

    let mut r = [0u8; 1];
    h.i2c_bus(3).unwrap().tx(0x48, &[], &mut r).unwrap();
    assert_eq!(r, [0x19]);
    let starts = i2c_events(&sim)
        .iter()
        .filter(|e| matches!(e, SimEvent::I2cStart { .. }))
        .count();
    assert_eq!(starts, 1);
}

#[test]
fn test_i2c_address_nack_is_recoverable() {
    let sim = SimSoc::ast2500();
    sim.add_i2c_device(2, 0x72, SimI2cDevice::default());
    let h = handle(&sim);
    let mut bus = h.i2c_bus(2).unwrap();

    let err = bus.tx(0x33, &[0x01], &mut []).unwrap_err();
    assert!(err.is_recoverable(), "{}", err);
    assert!(matches!(err, Error::Nack { byte: 0x66, index: 0, .. }));
    assert_eq!(i2c_events(&sim).last(), Some(&SimEvent::I2cStop { bus: 2 }));

    // The bus is idle again and usable
    bus.tx(0x72, &[0x01], &mut []).unwrap();
    assert_eq!(sim.i2c_device(2, 0x72).unwrap().written, [0x01]);
}

#[test]
fn test_i2c_data_nack_reports_byte_index() {
    let sim = SimSoc::ast2500();
    sim.add_i2c_device(
        4,
        0x20,
        SimI2cDevice {
            nack_after: Some(1),
            ..SimI2cDevice::default()
        },
    );
    let h = handle(&sim);

    let err = h.i2c_bus(4).unwrap().tx(0x20, &[0x01, 0x02], &mut []).unwrap_err();
    assert!(matches!(err, Error::Nack { byte: 0x02, index: 2, .. }));
    assert_eq!(i2c_events(&sim).last(), Some(&SimEvent::I2cStop { bus: 4 }));
}

#[test]
fn test_i2c_read_address_nack_still_stops() {
    let sim = SimSoc::ast2500();
    let h = handle(&sim);
    let mut r = [0u8; 2];

    let err = h.i2c_bus(5).unwrap().tx(0x11, &[], &mut r).unwrap_err();
    assert!(err.is_recoverable());
    assert_eq!(i2c_events(&sim).last(), Some(&SimEvent::I2cStop { bus: 5 }));
}

#[test]
fn test_i2c_timeout_on_wedged_bus() {
    let sim = SimSoc::ast2500();
    let h = handle_with(
        &sim,
        AstOptions::new().with_i2c_timeout(Duration::from_millis(20)),
    );
    let mut bus = h.i2c_bus(6).unwrap();
    sim.wedge_i2c(6);

    let err = bus.tx(0x10, &[0x00], &mut []).unwrap_err();
    assert!(matches!(err, Error::I2cTimeout { bus: 6, op: "start", .. }));
    assert!(!err.is_recoverable());
    assert_eq!(sim.peek(i2c_reg(6, I2C_FUN_CTRL)), 0);
}

#[test]
fn test_i2c_open_recovers_dirty_bus() {
    let sim = SimSoc::ast2500();
    sim.set_i2c_dirty(8, 0x0a06_0100);
    sim.add_i2c_device(8, 0x40, SimI2cDevice::default());
    let h = handle(&sim);

    let mut bus = h.i2c_bus(8).unwrap();
    assert_eq!(sim.peek(i2c_reg(8, I2C_FUN_CTRL)), I2C_MASTER_EN);
    bus.tx(0x40, &[0xff], &mut []).unwrap();
}

#[test]
fn test_i2c_open_enables_pin_function() {
    let sim = SimSoc::ast2500();
    sim.poke(SCU_ADDR + SCU_PINMUX5, 0);
    let h = handle(&sim);

    h.i2c_bus(5).unwrap();
    assert_eq!(sim.peek(SCU_ADDR + SCU_PINMUX5), 1 << 19);
}

#[test]
fn test_i2c_invalid_bus() {
    let sim = SimSoc::ast2500();
    let h = handle(&sim);
    assert!(matches!(h.i2c_bus(14), Err(Error::InvalidBus(14))));
}

#[test]
fn test_i2c_empty_transaction_rejected_before_start() {
    let sim = SimSoc::ast2500();
    sim.add_i2c_device(2, 0x72, SimI2cDevice::default());
    let h = handle(&sim);
    let mut bus = h.i2c_bus(2).unwrap();

    assert!(matches!(
        bus.tx(0x72, &[], &mut []),
        Err(Error::EmptyTransfer(2))
    ));
    assert!(i2c_events(&sim).is_empty());
    assert_eq!(sim.peek(i2c_reg(2, I2C_CMD)), I2C_CMD_IDLE);

    bus.tx(0x72, &[0x01], &mut []).unwrap();
    assert_eq!(sim.i2c_device(2, 0x72).unwrap().written, [0x01]);
}

#[test]
fn test_i2c_eight_bit_address_rejected() {
    let sim = SimSoc::ast2500();
    sim.add_i2c_device(2, 0x72, SimI2cDevice::default());
    let h = handle(&sim);
    let mut bus = h.i2c_bus(2).unwrap();

    assert!(matches!(
        bus.tx(0xf2, &[0x5a], &mut []),
        Err(Error::InvalidAddress(0xf2))
    ));
    assert!(i2c_events(&sim).is_empty());
    assert!(sim.i2c_device(2, 0x72).unwrap().written.is_empty());
}

#[test]
fn test_hold_i2c_pins_disabled_fights_reenable() {
    let sim = SimSoc::ast2500();
    let h = handle(&sim);
    let other = sim.clone();
    let agent = thread::spawn(move || {
        thread::sleep(Duration::from_millis(10));
        let v = other.peek(SCU_ADDR + SCU_PINMUX5);
        other.poke(SCU_ADDR + SCU_PINMUX5, v | 1 << 17);
    });

    let disabled = h
        .hold_i2c_pins_disabled(3, Duration::from_millis(60))
        .unwrap();
    agent.join().unwrap();
    assert!(disabled);
    assert_eq!(sim.peek(SCU_ADDR + SCU_PINMUX5) & (1 << 17), 0);

    assert!(matches!(
        h.hold_i2c_pins_disabled(1, Duration::ZERO),
        Err(Error::NoPinFunction(1))
    ));
}

#[test]
fn test_pin_i2c_clock_rewrites_divisor() {
    let sim = SimSoc::ast2500();
    let h = handle(&sim);
    sim.poke(i2c_reg(3, I2C_AC_TIMING1), 0x7777_7305);

    let switches = h.pin_i2c_clock(3, Duration::from_millis(10)).unwrap();
    assert_eq!(switches, 1);
    assert_eq!(sim.peek(I2C_ADDR + 0x104), 0x7777_730b);
}

// ============================================================================
// Chip lifecycle
// ============================================================================

#[test]
fn test_stop_quiesces_chip() {
    let sim = SimSoc::ast2500();
    let h = handle(&sim);
    sim.poke(i2c_reg(3, I2C_FUN_CTRL), I2C_MASTER_EN);
    sim.poke(WDT_ADDR + WDT1_CTRL, 0x13);
    sim.poke(WDT_ADDR + WDT3_CTRL, 0x13);

    let prev = h.stop().unwrap();
    assert_eq!(prev.rst70(), DEFAULT_STRAP);
    assert_eq!(prev.wdt2_reload(), 0x13);

    assert_eq!(sim.peek(SCU_ADDR + SCU_HW_STRAP) & 3, STRAP_CPU_DISABLE);
    for ctrl in [WDT1_CTRL, WDT2_CTRL, WDT3_CTRL] {
        assert_eq!(sim.peek(WDT_ADDR + ctrl), 0, "wdt ctrl {:#x}", ctrl);
    }
    assert_eq!(sim.peek(i2c_reg(3, I2C_FUN_CTRL)), 0);
    assert_eq!(sim.peek(LPC_ADDR + LPC_HICR0), DEFAULT_HICR0 & !LPC_HICR0_CHANNELS);
    assert_eq!(sim.peek(LPC_ADDR + LPC_HICR4), 0);

    // The SCU is unlocked before anything else is touched
    assert_eq!(
        sim.events().first(),
        Some(&SimEvent::RegWrite {
            block: Block::Scu,
            offset: SCU_PROTECT,
            value: SCU_UNLOCK_KEY
        })
    );
}

#[test]
fn test_stop_restart_on_ast2400_restores_strap() {
    let sim = SimSoc::ast2400();
    let h = handle(&sim);

    let prev = h.stop().unwrap();
    assert_eq!(sim.peek(SCU_ADDR + SCU_HW_STRAP), DEFAULT_STRAP | 3);
    h.restart(prev);

    assert_eq!(sim.peek(SCU_ADDR + SCU_HW_STRAP), DEFAULT_STRAP);
    assert_eq!(sim.peek(WDT_ADDR + WDT2_CTRL), 0x13);
    assert_eq!(sim.peek(WDT_ADDR + WDT1_RELOAD), WDT_RESET_RELOAD);
    assert_eq!(sim.peek(WDT_ADDR + WDT1_RESTART), WDT_RESTART_MAGIC);
    assert_eq!(sim.peek(WDT_ADDR + WDT1_CTRL), WDT_CTRL_CPU_RESET);

    // Watchdog 1 is armed last
    let last = sim.events().into_iter().last();
    assert_eq!(
        last,
        Some(SimEvent::RegWrite {
            block: Block::Wdt,
            offset: WDT1_CTRL,
            value: WDT_CTRL_CPU_RESET
        })
    );
}

#[test]
fn test_restart_on_ast2500_programs_reset_mask() {
    let sim = SimSoc::ast2500();
    let h = handle_with(
        &sim,
        AstOptions::new().with_lpc_reset(true).with_soc_reset(true),
    );

    let prev = h.stop().unwrap();
    h.restart(prev);

    assert_eq!(
        sim.peek(WDT_ADDR + WDT1_RESET_MASK),
        WDT_RESET_MASK_2500 | WDT_RESET_MASK_LPC
    );
    assert_eq!(sim.peek(WDT_ADDR + WDT1_CTRL), WDT_CTRL_SOC_RESET);
    // Strap: CPU-disable bit 0 cleared, SPI master bit set
    assert_eq!(sim.peek(SCU_ADDR + SCU_HW_STRAP), (DEFAULT_STRAP | 2) | 0x1000);
}

#[test]
fn test_reset_lets_core_restart() {
    let sim = SimSoc::ast2400();
    let h = handle(&sim);

    h.reset().unwrap();
    assert_eq!(
        sim.peek(SCU_ADDR + SCU_HW_STRAP),
        (DEFAULT_STRAP & !3) | STRAP_CPU_WILL_RESET
    );
    assert_eq!(sim.peek(WDT_ADDR + WDT1_CTRL), WDT_CTRL_CPU_RESET);
}

#[test]
fn test_self_destructive_operations_refused_on_chip() {
    let sim = SimSoc::ast2500().on_chip(true);
    let h = handle(&sim);
    assert!(h.on_chip());

    assert!(matches!(h.stop(), Err(Error::SelfDestructive("stop"))));
    assert!(matches!(h.reset(), Err(Error::SelfDestructive(_))));
    assert!(matches!(h.fmc(), Err(Error::SelfDestructive(_))));
    assert!(sim.events().is_empty());

    // Resume is the on-chip way back
    h.resume();
    assert_eq!(sim.peek(WDT_ADDR + WDT1_CTRL), WDT_CTRL_CPU_RESET);
}

#[test]
fn test_unknown_silicon() {
    let sim = SimSoc::new(0x0500_0303);
    let err = AstHandle::new(Arc::new(sim.clone()), AstOptions::new())
        .err()
        .unwrap();
    assert!(matches!(err, Error::UnknownSilicon(0x0500_0303)));

    let id = identify(&sim).unwrap();
    assert_eq!(id.model, None);
}

// ============================================================================
// SPI flash
// ============================================================================

#[test]
fn test_fmc_open_stops_chip_and_identifies_flash() {
    let sim = SimSoc::ast2500();
    let h = handle(&sim);

    let fmc = h.fmc().unwrap();
    assert_eq!(fmc.chip().name, "mx25l25635f");
    assert_eq!(fmc.jedec_id(), 0xc2_2019);
    assert!(!fmc.is_4b_mode());
    assert_eq!(sim.peek(SCU_ADDR + SCU_HW_STRAP) & 3, STRAP_CPU_DISABLE);

    let prev = fmc.into_prev_state();
    assert_eq!(prev.rst70(), DEFAULT_STRAP);
    h.restart(prev);
}

#[test]
fn test_fmc_read_returns_flash_contents() {
    let sim = SimSoc::ast2500();
    sim.load_flash(0x1f_fffe, &[1, 2, 3, 4, 5]);
    let h = handle(&sim);
    let fmc = h.fmc().unwrap();

    assert_eq!(fmc.read(0x1f_fffe, 5).unwrap(), [1, 2, 3, 4, 5]);
    let reads: Vec<_> = sim
        .spi_commands()
        .into_iter()
        .filter(|c| c.opcode == FAST_READ_4B)
        .collect();
    assert_eq!(reads.len(), 1);
    assert_eq!(reads[0].addr, Some(0x1f_fffe));
}

#[test]
fn test_fmc_write_programs_page_chunks() {
    let sim = SimSoc::ast2500();
    let h = handle(&sim);
    let fmc = h.fmc().unwrap();
    sim.take_events();

    let data: Vec<u8> = (0..300u32).map(|i| (i * 7) as u8).collect();
    fmc.write(0x1000, &data).unwrap();

    let cmds = sim.spi_commands();
    let programs: Vec<_> = cmds
        .iter()
        .enumerate()
        .filter(|(_, c)| c.opcode == PP_4B)
        .collect();
    assert_eq!(programs.len(), 2);
    assert_eq!((programs[0].1.addr, programs[0].1.data_len), (Some(0x1000), 256));
    assert_eq!((programs[1].1.addr, programs[1].1.data_len), (Some(0x1100), 44));
    for &(i, _) in &programs {
        assert_eq!(cmds[i - 1].opcode, WREN);
        assert_eq!(cmds[i + 1].opcode, RDSR);
    }
    assert_eq!(sim.flash_contents(0x1000, 300), data);
}

#[test]
fn test_fmc_write_splits_at_page_boundary() {
    let sim = SimSoc::ast2500();
    let h = handle(&sim);
    let fmc = h.fmc().unwrap();
    sim.take_events();

    fmc.write(0x10f0, &[0u8; 32]).unwrap();
    let programs: Vec<_> = sim
        .spi_commands()
        .into_iter()
        .filter(|c| c.opcode == PP_4B)
        .map(|c| (c.addr, c.data_len))
        .collect();
    assert_eq!(programs, [(Some(0x10f0), 16), (Some(0x1100), 16)]);
}

#[test]
fn test_fmc_erase_times_out_when_busy_sticks() {
    let sim = SimSoc::ast2500();
    let h = handle_with(
        &sim,
        AstOptions::new().with_flash_timeout(Duration::from_millis(20)),
    );
    let fmc = h.fmc().unwrap();
    sim.set_flash_stuck_busy(true);

    let err = fmc.erase_block(0).unwrap_err();
    assert!(matches!(err, Error::FlashTimeout { status, .. } if status & SR_WIP != 0));
}

#[test]
fn test_fmc_erase_rejects_unaligned_offset() {
    let sim = SimSoc::ast2500();
    let h = handle(&sim);
    let fmc = h.fmc().unwrap();
    assert!(matches!(
        fmc.erase_block(0x1000),
        Err(Error::Unaligned { offset: 0x1000, block: 0x10000 })
    ));
}

#[test]
fn test_fmc_status_error_after_program() {
    let sim = SimSoc::ast2500();
    let h = handle(&sim);
    let fmc = h.fmc().unwrap();
    sim.set_flash_status_bits(0x20);

    let err = fmc.write(0, &[0x55]).unwrap_err();
    assert!(matches!(err, Error::FlashStatus { op: "page program", addr: 0, status: 0x20 }));
}

#[test]
fn test_fmc_quad_enable_bit_is_ignored() {
    let sim = SimSoc::ast2500();
    sim.set_flash_status_bits(SR_QE);
    let h = handle(&sim);
    let fmc = h.fmc().unwrap();
    fmc.write(0, &[0x55]).unwrap();
}

#[test]
fn test_fmc_probe_rejects_stray_status() {
    let sim = SimSoc::ast2500();
    sim.set_flash_status_bits(0x04);
    let h = handle(&sim);
    assert!(matches!(
        h.fmc(),
        Err(Error::FlashStatus { op: "probe", status: 0x04, .. })
    ));
}

#[test]
fn test_fmc_probe_clears_write_enable_latch() {
    let sim = SimSoc::ast2500();
    sim.set_flash_wel(true);
    let h = handle(&sim);
    h.fmc().unwrap();
    assert!(sim.spi_commands().iter().any(|c| c.opcode == WRDI));
}

#[test]
fn test_fmc_unknown_flash() {
    let sim = SimSoc::with_flash(REV_AST2500, SimFlashConfig::for_id(0x12_3456));
    let h = handle(&sim);
    assert!(matches!(h.fmc(), Err(Error::UnknownFlash(0x12_3456))));
}

#[test]
fn test_fmc_switch_to_four_byte_mode() {
    let sim = SimSoc::ast2500();
    let h = handle_with(
        &sim,
        AstOptions::new().with_spi_addr_mode(Some(AddrMode::FourByte)),
    );
    let fmc = h.fmc().unwrap();
    assert!(fmc.is_4b_mode());
    assert!(sim.flash_is_four_byte());
    assert_eq!(sim.peek(FMC_ADDR + FMC_CE_CTRL), FMC_CE_CTRL_4B);

    // A write at the top of a 32 MiB part still lands where expected
    fmc.write(0x1ff_ff00, &[0x12, 0x34]).unwrap();
    assert_eq!(sim.flash_contents(0x1ff_ff00, 2), [0x12, 0x34]);
}

#[test]
fn test_fmc_bank_register_switch() {
    let sim = SimSoc::with_flash(REV_AST2500, SimFlashConfig::for_id(0x01_0220));
    let h = handle_with(
        &sim,
        AstOptions::new().with_spi_addr_mode(Some(AddrMode::FourByte)),
    );
    let fmc = h.fmc().unwrap();
    assert_eq!(fmc.chip().name, "s25fl512s");
    assert!(fmc.is_4b_mode());
    assert!(sim
        .spi_commands()
        .iter()
        .any(|c| c.opcode == BRWR && c.data_len == 1));
}

#[test]
fn test_fmc_address_switch_unknown_for_part() {
    let sim = SimSoc::with_flash(REV_AST2500, SimFlashConfig::for_id(0xef_4019));
    let h = handle_with(
        &sim,
        AstOptions::new().with_spi_addr_mode(Some(AddrMode::FourByte)),
    );
    assert!(matches!(
        h.fmc(),
        Err(Error::UnsupportedAddressSwitch { jedec_id: 0xef_4019, bytes: 4 })
    ));
}

#[test]
fn test_fmc_controller_chip_mode_mismatch() {
    let sim = SimSoc::ast2500();
    sim.poke(FMC_ADDR + FMC_CE_CTRL, FMC_CE_CTRL_4B);
    let h = handle(&sim);
    assert!(matches!(
        h.fmc(),
        Err(Error::AddressModeMismatch { controller: true, chip: false })
    ));
}

#[test]
fn test_fmc_open_failure_restarts_chip() {
    let sim = SimSoc::with_flash(REV_AST2500, SimFlashConfig::for_id(0x12_3456));
    let h = handle(&sim);

    assert!(matches!(h.fmc(), Err(Error::UnknownFlash(0x12_3456))));
    assert_eq!(sim.peek(WDT_ADDR + WDT2_CTRL), 0x13);
    assert_eq!(sim.peek(WDT_ADDR + WDT1_CTRL), WDT_CTRL_CPU_RESET);
}

#[test]
fn test_fmc_settle_failure_restarts_chip() {
    let sim = SimSoc::ast2500();
    sim.poke(FMC_ADDR + FMC_CE_CTRL, FMC_CE_CTRL_4B);
    let h = handle(&sim);

    assert!(h.fmc().is_err());
    assert_eq!(sim.peek(WDT_ADDR + WDT1_CTRL), WDT_CTRL_CPU_RESET);
}

#[test]
fn test_fmc_three_byte_part_refuses_four_byte_mode() {
    let sim = SimSoc::with_flash(REV_AST2500, SimFlashConfig::for_id(0xef_4018));
    let h = handle_with(
        &sim,
        AstOptions::new().with_spi_addr_mode(Some(AddrMode::FourByte)),
    );
    assert!(matches!(
        h.fmc(),
        Err(Error::UnsupportedAddressSwitch { jedec_id: 0xef_4018, bytes: 4 })
    ));
    assert!(!sim.flash_is_four_byte());
}

#[test]
fn test_fmc_three_byte_part_uses_three_byte_opcodes() {
    let sim = SimSoc::with_flash(REV_AST2500, SimFlashConfig::for_id(0xef_4018));
    sim.load_flash(0xff_fffe, &[0xa5, 0x5a]);
    let h = handle_with(
        &sim,
        AstOptions::new().with_spi_addr_mode(Some(AddrMode::ThreeByte)),
    );
    let fmc = h.fmc().unwrap();
    assert!(!fmc.is_4b_mode());
    assert_eq!(fmc.read(0xff_fffe, 2).unwrap(), [0xa5, 0x5a]);
    assert_eq!(sim.peek(FMC_ADDR + FMC_CE_CTRL), FMC_CE_CTRL_3B);

    let ops: Vec<u8> = sim.spi_commands().iter().map(|c| c.opcode).collect();
    assert!(!ops.contains(&EN4B) && !ops.contains(&EX4B));
    assert!(ops.contains(&FAST_READ) && !ops.contains(&FAST_READ_4B));
}

#[test]
fn test_write_image_skips_identical_blocks() {
    let sim = SimSoc::ast2500();
    let image: Vec<u8> = (0..0x20000u32).map(|i| (i % 251) as u8).collect();
    sim.load_flash(0, &image[..0x10000]);
    let h = handle(&sim);
    let fmc = h.fmc().unwrap();
    sim.take_events();

    let stats = write_image(&fmc, 0, &image, &mut NoProgress).unwrap();
    assert_eq!(stats.blocks_total, 2);
    assert_eq!(stats.blocks_skipped, 1);
    assert_eq!(stats.blocks_written, 1);
    assert_eq!(sim.flash_contents(0, image.len()), image);

    let erases: Vec<_> = sim
        .spi_commands()
        .into_iter()
        .filter(|c| c.opcode == BE_4B)
        .map(|c| c.addr)
        .collect();
    assert_eq!(erases, [Some(0x10000)]);
}

#[test]
fn test_write_image_dropped_program_fails_verify() {
    let sim = SimSoc::ast2500();
    sim.drop_flash_program_at(Some(0x10100));
    let h = handle(&sim);
    let fmc = h.fmc().unwrap();

    let image: Vec<u8> = (0..0x20000u32).map(|i| (i % 251) as u8).collect();
    let err = write_image(&fmc, 0, &image, &mut NoProgress).unwrap_err();
    assert!(matches!(err, Error::VerifyFailed { offset: 0x10100 }));
}

#[test]
fn test_read_info_on_ast2500_only() {
    let sim = SimSoc::ast2500();
    let h = handle(&sim);
    let info = read_info(&h).unwrap();
    assert!(info.writable);
    assert_eq!(info.addr_bytes, 3);
    // Reading the configuration does not stop the chip
    assert_eq!(sim.peek(SCU_ADDR + SCU_HW_STRAP), DEFAULT_STRAP);

    let sim = SimSoc::ast2400();
    let h = handle(&sim);
    assert!(matches!(
        read_info(&h),
        Err(Error::UnsupportedFamily { .. })
    ));
}
