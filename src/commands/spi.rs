//! SPI boot flash commands

use std::fs;
use std::path::Path;
use std::time::Duration;

use astctl_core::flash::{self, WriteProgress, WriteStats};
use astctl_core::{fmc, uboot_env, AstHandle, Fmc};
use indicatif::{ProgressBar, ProgressStyle};

/// Create a progress bar with the standard byte-transfer style
fn create_progress_bar(total: u64) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) {msg}",
            )?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Create a standard spinner style
fn create_spinner_style() -> Result<ProgressStyle, Box<dyn std::error::Error>> {
    Ok(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?)
}

fn print_flash(fmc: &Fmc) {
    let chip = fmc.chip();
    println!(
        "Found {} (JEDEC {:06x}, {} KiB, {} KiB blocks, {}-byte addressing)",
        chip.name,
        fmc.jedec_id(),
        fmc.size() / 1024,
        fmc.erase_size() / 1024,
        if fmc.is_4b_mode() { 4 } else { 3 }
    );
}

/// Progress reporter using an indicatif progress bar
///
/// One bar covers the whole image; the message names the current phase.
pub struct IndicatifProgress {
    bar: ProgressBar,
    start: u32,
}

impl IndicatifProgress {
    pub fn new(start: u32, total: usize) -> Self {
        let bar = create_progress_bar(total as u64)
            .unwrap_or_else(|_| ProgressBar::new(total as u64));
        Self { bar, start }
    }

    fn phase(&self, phase: &str, offset: u32) {
        self.bar.set_position(u64::from(offset - self.start));
        self.bar.set_message(format!("{} {:#09x}", phase, offset));
    }
}

impl WriteProgress for IndicatifProgress {
    fn reading(&mut self, offset: u32, _len: usize) {
        self.phase("Reading", offset);
    }

    fn erasing(&mut self, offset: u32, _len: usize) {
        self.phase("Erasing", offset);
    }

    fn writing(&mut self, offset: u32, _len: usize) {
        self.phase("Writing", offset);
    }

    fn verifying(&mut self, total_bytes: usize) {
        self.bar.finish_with_message("Write complete");
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            create_spinner_style().unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(format!("Verifying {} bytes...", total_bytes));
        spinner.enable_steady_tick(Duration::from_millis(100));
        self.bar = spinner;
    }

    fn complete(&mut self, stats: &WriteStats) {
        self.bar.finish_with_message("Verify complete");
        if stats.blocks_written == 0 {
            println!("Flash already contains the desired data - no changes needed");
        } else {
            println!(
                "Wrote {} bytes in {} of {} blocks ({} unchanged)",
                stats.bytes_written, stats.blocks_written, stats.blocks_total, stats.blocks_skipped
            );
        }
    }
}

/// Print the FMC configuration
pub fn run_info(handle: &AstHandle) -> Result<(), Box<dyn std::error::Error>> {
    let info = fmc::read_info(handle)?;
    print!("{}", info);
    Ok(())
}

/// Read flash contents to `output`
pub fn run_read(
    handle: &AstHandle,
    output: &Path,
    offset: u32,
    length: Option<u32>,
    restart: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let fmc = handle.fmc()?;
    print_flash(&fmc);

    let len = length.map_or(fmc.size().saturating_sub(offset) as usize, |l| l as usize);
    let pb = create_progress_bar(len as u64).unwrap_or_else(|_| ProgressBar::new(len as u64));
    pb.set_message("Reading");
    let data = flash::read_image(&fmc, offset, Some(len), |done| pb.set_position(done as u64));
    pb.finish_with_message("Read complete");

    // The core comes back up even when the read failed
    if restart {
        handle.restart(fmc.into_prev_state());
    } else {
        println!("AST left stopped");
    }

    let data = data?;
    fs::write(output, &data)?;
    println!("Wrote {} bytes to {}", data.len(), output.display());
    Ok(())
}

/// Write `input` to flash at `offset`, optionally placing a U-Boot environment
pub fn run_write(
    handle: &AstHandle,
    input: &Path,
    offset: u32,
    env: Option<&Path>,
    restart: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut image = fs::read(input)?;
    println!("Read {} bytes from {}", image.len(), input.display());
    if let Some(env) = env {
        let text = fs::read_to_string(env)?;
        uboot_env::inject(&mut image, &text)?;
        println!("Placed environment from {}", env.display());
    }

    let fmc = handle.fmc()?;
    print_flash(&fmc);

    let mut progress = IndicatifProgress::new(offset, image.len());
    if let Err(e) = flash::write_image(&fmc, offset, &image, &mut progress) {
        progress.bar.abandon_with_message("Failed");
        log::error!("Flash write failed, AST left stopped");
        return Err(e.into());
    }

    if restart {
        handle.restart(fmc.into_prev_state());
    } else {
        println!("AST left stopped");
    }
    Ok(())
}
