//! SoC identification and lifecycle commands

use astctl_core::{identify, AstHandle, RegionMapper};

use crate::cli::TargetArgs;

/// Format a bus bitmap as a list of bus numbers
fn bus_list(enabled: u32) -> String {
    let buses: Vec<String> = (0u32..32)
        .filter(|bus| enabled & (1 << bus) != 0)
        .map(|bus| bus.to_string())
        .collect();
    if buses.is_empty() {
        "none".to_string()
    } else {
        buses.join(",")
    }
}

/// Show the silicon revision and the enabled I2C buses
pub fn run_info(args: &TargetArgs) -> Result<(), Box<dyn std::error::Error>> {
    let options = super::options(args)?;
    let mapper = super::open_mapper(args, &options)?;

    let id = identify(mapper.as_ref())?;
    println!("Silicon: {} (id {:#010x})", id, id.raw);
    println!(
        "Location: {}",
        if mapper.on_chip() { "on chip" } else { "host (P2A bridge)" }
    );
    if id.model.is_none() {
        return Err(format!("Unrecognized silicon id {:#010x}", id.raw).into());
    }

    let handle = AstHandle::new(mapper, options)?;
    println!("Family: {}", handle.family());
    let enabled = handle.i2c_enabled_set();
    println!("I2C buses enabled: {} ({:#06x})", bus_list(enabled), enabled);
    Ok(())
}

/// Stop the AST and reboot its core, or resume it when running on the chip
pub fn run_reset(handle: &AstHandle) -> Result<(), Box<dyn std::error::Error>> {
    if handle.on_chip() {
        println!("Resuming AST from the chip itself");
        handle.resume();
    } else {
        handle.reset()?;
        println!("AST reset");
    }
    Ok(())
}
