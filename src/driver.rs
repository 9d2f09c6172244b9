//! Top-level REPL: banner, init-file autoload, the `init` label auto-run,
//! per-line I/O statistics, and the `Diag> ` prompt.

use std::io::{self, Write};
use std::path::Path;
use std::time::Instant;

use crate::device::BlockDevice;
use crate::interp::{Interpreter, Outcome};

fn print_scaled(n: f64) {
    if n > 1024.0 * 1024.0 {
        print!("{:.2}M", n / (1024.0 * 1024.0));
    } else if n > 1024.0 {
        print!("{:.2}k", n / 1024.0);
    } else {
        print!("{:.2}", n);
    }
}

fn print_scaled_per_sec(label: &str, n: f64, time: f64) {
    print!("{}", label);
    print_scaled(n);
    print!(" (");
    if time == 0.0 {
        print_scaled(0.0);
    } else {
        print_scaled(n / time);
    }
    print!("/s) ");
}

fn print_stats(elapsed: f64, interp: &Interpreter) {
    print!("Time: {:.2}s ", elapsed);
    print_scaled_per_sec("IOW: ", interp.iopwrite, elapsed);
    print_scaled_per_sec("IOR: ", interp.iopread, elapsed);
    print_scaled_per_sec("IO: ", interp.iopwrite + interp.iopread, elapsed);
    println!();
    print_scaled_per_sec("BW: ", interp.bcwrite, elapsed);
    print_scaled_per_sec("BR: ", interp.bcread, elapsed);
    print_scaled_per_sec("BT: ", interp.bcwrite + interp.bcread, elapsed);
    println!();
}

fn clear_stats(interp: &mut Interpreter) {
    interp.iopwrite = 0.0;
    interp.iopread = 0.0;
    interp.bcwrite = 0.0;
    interp.bcread = 0.0;
}

/// Run the interactive loop until `exit` is seen or stdin closes.
pub fn run(mut interp: Interpreter, init_file: Option<&Path>, run_init_label: bool) {
    println!("Disc Diagnostic 2.1");
    println!();
    println!("Enter ? or Help for command list");
    println!();

    if let Some(path) = init_file {
        if interp.program.load(path).is_ok() {
            println!("Init file loaded");
            println!();
        }
    }

    let mut startup = true;
    let mut mark = Instant::now();

    loop {
        if startup {
            if run_init_label {
                if let Some(idx) = interp.program.find_label("init") {
                    mark = Instant::now();
                    clear_stats(&mut interp);
                    let outcome = run_label_at_startup(&mut interp, idx);
                    startup = false;
                    if outcome == Outcome::Exit {
                        break;
                    }
                    continue;
                }
            }
            startup = false;
        } else {
            let elapsed = mark.elapsed().as_secs_f64();
            print_stats(elapsed, &interp);
        }

        print!("Diag> ");
        if io::stdout().flush().is_err() {
            break;
        }
        let mut line = String::new();
        if io::stdin().read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        if interp.break_flag.take() {
            println!();
            if interp.exitonerror {
                break;
            }
            continue;
        }

        mark = Instant::now();
        clear_stats(&mut interp);

        let outcome = interp.execute_line(line.trim_end_matches(['\r', '\n']));
        if outcome == Outcome::Exit {
            break;
        }
    }
}

/// Run the `init` label once at startup the same way a normal procedure
/// call would, reusing `execute_line`'s driver loop by synthesizing a call.
fn run_label_at_startup(interp: &mut Interpreter, idx: usize) -> Outcome {
    let call = interp.program.lines[idx].label.clone().unwrap_or_default();
    interp.execute_line(&call)
}

pub fn default_device(simulate: bool) -> Box<dyn BlockDevice> {
    if simulate {
        Box::new(crate::device::SimDevice::new())
    } else {
        #[cfg(unix)]
        {
            Box::new(crate::device::PosixDevice::new())
        }
        #[cfg(not(unix))]
        {
            Box::new(crate::device::WindowsDevice::new())
        }
    }
}
