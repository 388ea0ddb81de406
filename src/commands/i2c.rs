//! I2C master commands

use std::time::Duration;

use astctl_core::AstHandle;

use crate::cli::parse_hex_bytes;

/// Run one write-then-read transaction and print the bytes read
pub fn run_transfer(
    handle: &AstHandle,
    bus: u8,
    addr: u8,
    write: Option<&str>,
    read_len: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let w = match write {
        Some(s) => parse_hex_bytes(s)?,
        None => Vec::new(),
    };
    if w.is_empty() && read_len == 0 {
        return Err("Nothing to do: give --write and/or --read".into());
    }

    let mut i2c = handle.i2c_bus(bus)?;
    let mut r = vec![0u8; read_len];
    if let Err(e) = i2c.tx(addr, &w, &mut r) {
        if e.is_recoverable() {
            println!("i2c-{}: no acknowledge from {:#04x}", bus, addr);
        }
        return Err(e.into());
    }

    if !r.is_empty() {
        let hex: Vec<String> = r.iter().map(|b| format!("{:02x}", b)).collect();
        println!("{}", hex.join(" "));
    }
    Ok(())
}

/// Keep the pins of `bus` disabled for `seconds`
pub fn run_pins_off(
    handle: &AstHandle,
    bus: u8,
    seconds: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Holding i2c-{} pins disabled for {}s", bus, seconds);
    if handle.hold_i2c_pins_disabled(bus, Duration::from_secs(seconds))? {
        println!("i2c-{} pins disabled", bus);
        Ok(())
    } else {
        Err(format!("i2c-{} pins were re-enabled", bus).into())
    }
}

/// Keep the clock of `bus` slowed down for `seconds`
pub fn run_slow_clock(
    handle: &AstHandle,
    bus: u8,
    seconds: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Pinning i2c-{} clock for {}s", bus, seconds);
    let switches = handle.pin_i2c_clock(bus, Duration::from_secs(seconds))?;
    println!("Clock divisor rewritten {} time(s)", switches);
    Ok(())
}
