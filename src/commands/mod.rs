//! Command implementations

pub mod chip;
pub mod i2c;
pub mod spi;

use std::sync::Arc;
use std::time::Duration;

use astctl_core::{AddrMode, AstHandle, AstOptions, RegionMapper};
use astctl_hw::{AccessMethod, HostMapper};

use crate::cli::TargetArgs;

/// Build the runtime options from the command line
pub fn options(args: &TargetArgs) -> Result<AstOptions, Box<dyn std::error::Error>> {
    let spi_mode = match args.spi_mode.as_deref() {
        Some(s) => Some(
            AddrMode::parse(s).ok_or_else(|| format!("Invalid SPI address mode '{}'", s))?,
        ),
        None => None,
    };
    let mut options = AstOptions::new()
        .with_dry_run(args.noop)
        .with_soc_reset(args.soc)
        .with_lpc_reset(args.lpc)
        .with_extra_checks(!args.no_extra_checks)
        .with_spi_addr_mode(spi_mode);
    if let Some(ms) = args.i2c_timeout_ms {
        options = options.with_i2c_timeout(Duration::from_millis(ms));
    }
    if let Some(ms) = args.flash_timeout_ms {
        options = options.with_flash_timeout(Duration::from_millis(ms));
    }
    Ok(options)
}

/// Open the region mapper selected on the command line
pub fn open_mapper(
    args: &TargetArgs,
    options: &AstOptions,
) -> Result<Arc<dyn RegionMapper>, Box<dyn std::error::Error>> {
    #[cfg(feature = "sim")]
    if args.sim {
        log::info!("Using the simulated AST2500");
        let soc = astctl_sim::SimSoc::ast2500().dry_run(options.dry_run);
        return Ok(Arc::new(soc));
    }

    let method = if args.file_access {
        AccessMethod::File
    } else {
        AccessMethod::Mmap
    };
    let mapper = HostMapper::new(options, method)?;
    if mapper.on_chip() {
        log::debug!("Running on the AST itself");
    }
    Ok(Arc::new(mapper))
}

/// Open a chip handle for the command line target
pub fn open_handle(args: &TargetArgs) -> Result<AstHandle, Box<dyn std::error::Error>> {
    let options = options(args)?;
    if options.dry_run {
        log::info!("No-write mode: stores to the AST are suppressed");
    }
    let mapper = open_mapper(args, &options)?;
    Ok(AstHandle::new(mapper, options)?)
}
