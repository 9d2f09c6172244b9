use std::path::PathBuf;

use clap::Parser;

#[cfg(unix)]
use discdiag::device::PosixDevice;
use discdiag::device::{BlockDevice, BreakFlag, SimDevice};
use discdiag::driver;
use discdiag::interp::Interpreter;

/// Interactive disc diagnostic: a small scripting interpreter that drives
/// raw sector I/O against a block device.
#[derive(Parser, Debug)]
#[command(name = "discdiag", version, about)]
struct Cli {
    /// Path to the block device to open (ignored with --simulate).
    #[arg(long)]
    device: Option<PathBuf>,

    /// Init script to load at startup instead of ./discdiag.ini.
    #[arg(long)]
    init_file: Option<PathBuf>,

    /// Skip loading any init file at all.
    #[arg(long)]
    no_init: bool,

    /// Use the in-memory simulated device instead of real hardware.
    #[arg(long)]
    simulate: bool,
}

/// Recover the drive index `PosixDevice::set_drive` expects from a
/// `/dev/sd?`-shaped path, so `--device` can select the same way `drive N`
/// does instead of needing its own open-by-path code path.
fn drive_number_from_path(path: &PathBuf) -> Option<i64> {
    let letter = path.file_name()?.to_str()?.strip_prefix("sd")?.chars().next()?;
    if letter.is_ascii_lowercase() {
        Some((letter as u8 - b'a') as i64)
    } else {
        None
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    #[cfg(unix)]
    let device: Box<dyn BlockDevice> = if cli.simulate {
        Box::new(SimDevice::new())
    } else if cli.device.is_some() {
        Box::new(PosixDevice::new())
    } else {
        driver::default_device(false)
    };
    #[cfg(not(unix))]
    let device: Box<dyn BlockDevice> =
        if cli.simulate { Box::new(SimDevice::new()) } else { driver::default_device(false) };

    let break_flag = BreakFlag::install();
    let mut interp = Interpreter::new(device, break_flag);

    #[cfg(unix)]
    if let Some(path) = &cli.device {
        match drive_number_from_path(path) {
            Some(n) => {
                log::info!("opening {} as drive {}", path.display(), n);
                if let Err(e) = interp.device.set_drive(n) {
                    log::warn!("failed to open {}: {}", path.display(), e);
                }
            }
            None => log::warn!("{} doesn't look like a /dev/sd? path, ignoring --device", path.display()),
        }
    }
    #[cfg(not(unix))]
    if cli.device.is_some() {
        log::warn!("--device is only supported on unix hosts; ignoring");
    }

    let init_path = if cli.no_init {
        None
    } else {
        Some(cli.init_file.unwrap_or_else(|| PathBuf::from("discdiag.ini")))
    };

    driver::run(interp, init_path.as_deref(), !cli.no_init);
}
