//! The command dispatcher: looks up a verb as a stored program label first,
//! then as a builtin, and runs it.

use std::path::Path;

use crate::control;
use crate::error::DiagError;
use crate::eval;
use crate::fmtprint;
use crate::help;
use crate::interp::{BUFFER_SECTORS, Interpreter, LineRef, Outcome};
use crate::lexer;
use crate::pattern::{self, CompareMode};

fn getparam(interp: &mut Interpreter, text: &str, pos: &mut usize) -> Result<i64, DiagError> {
    eval::eval(text, pos, interp)
}

fn report(e: DiagError) -> Outcome {
    println!("*** Error: {}", e);
    Outcome::Error
}

/// Run one command verb starting at `*pos`, advancing it past whatever the
/// verb itself (and any parameters it consumes) occupy.
pub fn exec(interp: &mut Interpreter, text: &str, pos: &mut usize) -> Outcome {
    let word = lexer::word(text, pos);
    if word.is_empty() {
        return Outcome::Ok;
    }

    if let Some(idx) = interp.program.find_label(&word) {
        let params = interp.program.lines[idx].params.clone();
        if let Some(names) = params {
            for name in names {
                match getparam(interp, text, pos) {
                    Ok(v) => interp.vars.push(&name, v),
                    Err(e) => return report(e),
                }
            }
        }
        interp.set_top_cursor(*pos);
        interp.push_frame(LineRef::Stored(idx), 0);
        *pos = 0;
        return Outcome::Restart;
    }

    match word.as_str() {
        "?" | "help" => {
            help::print_help(&mut interp.pager);
            Outcome::Ok
        }
        "r" | "read" => cmd_read(interp, text, pos),
        "w" | "write" => cmd_write(interp, text, pos),
        "dw" | "dumpwrite" => cmd_dump(interp, text, pos, true),
        "dr" | "dumpread" => cmd_dump(interp, text, pos, false),
        "pt" | "pattn" => cmd_pattn(interp, text, pos),
        "c" | "comp" => cmd_comp(interp, text, pos),
        "cm" | "compmode" => cmd_compmode(text, pos, interp),
        "drive" => cmd_drive(interp, text, pos),
        "listdrives" | "ld" => cmd_listdrives(interp),
        "unprot" => {
            interp.writeprot = false;
            Outcome::Ok
        }
        "echo" => cmd_echo(text, pos, true),
        "echon" => cmd_echo(text, pos, false),
        "l" | "loop" => control::cmd_loop(interp, text, pos, false),
        "lq" | "loopq" => control::cmd_loop(interp, text, pos, true),
        "u" => control::cmd_untill(interp, text, pos),
        "while" => control::cmd_while(interp, text, pos),
        "wend" => control::cmd_wend(interp, text, pos),
        "repeat" => control::cmd_repeat(interp, text, pos),
        "until" => control::cmd_until(interp, text, pos),
        "for" => control::cmd_for(interp, text, pos),
        "fend" => control::cmd_fend(interp, text, pos),
        "select" => control::cmd_select(interp, text, pos),
        "case" => control::cmd_case(interp, text, pos),
        "default" => control::cmd_default(interp, text, pos),
        "send" => control::cmd_send(interp, text, pos),
        "if" => control::cmd_if(interp, text, pos),
        "go" => control::cmd_go(interp, text, pos),
        "end" => control::cmd_end(interp, text, pos),
        "p" | "print" => cmd_print(interp, text, pos, true),
        "pn" | "printn" => cmd_print(interp, text, pos, false),
        "s" | "set" => cmd_set(interp, text, pos),
        "local" => {
            let name = lexer::word(text, pos);
            interp.vars.local(&name, 0);
            Outcome::Ok
        }
        "srand" => {
            interp.rng.reseed(42);
            Outcome::Ok
        }
        "list" => cmd_list(interp),
        "clear" => {
            interp.program.clear();
            Outcome::Ok
        }
        "save" => cmd_save(interp, text, pos),
        "load" => cmd_load(interp, text, pos),
        "delt" => cmd_delt(interp, text, pos),
        "exit" => Outcome::Exit,
        "exitonerror" => {
            interp.exitonerror = true;
            Outcome::Ok
        }
        "i" | "input" => cmd_input(interp, text, pos),
        "testrand" => cmd_testrand(interp),
        "listvariables" => cmd_listvariables(interp),
        _ => {
            println!("*** Error: Command \"{}\" invalid", word);
            Outcome::Error
        }
    }
}

fn cmd_echo(text: &str, pos: &mut usize, newline: bool) -> Outcome {
    lexer::skip_spaces(text, pos);
    let start = *pos;
    while !lexer::at_end(text, *pos) && lexer::peek(text, *pos) != Some(b';') {
        *pos += 1;
    }
    print!("{}", &text[start..*pos]);
    if newline {
        println!();
    }
    Outcome::Ok
}

fn cmd_print(interp: &mut Interpreter, text: &str, pos: &mut usize, newline: bool) -> Outcome {
    match fmtprint::render(text, pos, interp) {
        Ok(s) => {
            print!("{}", s);
            if newline {
                println!();
            }
            Outcome::Ok
        }
        Err(e) => report(e),
    }
}

fn cmd_set(interp: &mut Interpreter, text: &str, pos: &mut usize) -> Outcome {
    let name = lexer::word(text, pos);
    match getparam(interp, text, pos) {
        Ok(v) => {
            interp.vars.set(&name, v);
            Outcome::Ok
        }
        Err(e) => report(e),
    }
}

fn cmd_input(interp: &mut Interpreter, text: &str, pos: &mut usize) -> Outcome {
    let name = lexer::word(text, pos);
    let mut line = String::new();
    let ok = std::io::stdin().read_line(&mut line).is_ok();
    if interp.break_flag.take() || !ok {
        return if interp.exitonerror { Outcome::Exit } else { Outcome::Ok };
    }
    let v = eval::parse_int_literal(line.trim()).unwrap_or(0);
    interp.vars.set(&name, v);
    Outcome::Ok
}

fn cmd_testrand(interp: &mut Interpreter) -> Outcome {
    let mut bins = [0u32; 100];
    for _ in 0..1_000_000 {
        let r = interp.rng.next_i64();
        bins[(r.unsigned_abs() % 100) as usize] += 1;
    }
    println!("Bins:");
    println!();
    for (i, count) in bins.iter().enumerate() {
        println!("{}: {}", i, count);
    }
    println!();
    Outcome::Ok
}

fn cmd_listvariables(interp: &Interpreter) -> Outcome {
    println!("Contents of variables stack:");
    println!();
    for (name, value) in interp.vars.iter() {
        println!("{}: {}", name, value);
    }
    Outcome::Ok
}

fn cmd_list(interp: &mut Interpreter) -> Outcome {
    println!();
    println!("Program store:");
    println!();
    let mut result = Outcome::Ok;
    for idx in 0..interp.program.lines.len() {
        if interp.break_flag.take() {
            if interp.exitonerror {
                result = Outcome::Exit;
            }
            break;
        }
        let line = interp.program.format_line(idx);
        interp.pager.println(&line);
    }
    result
}

fn cmd_save(interp: &mut Interpreter, text: &str, pos: &mut usize) -> Outcome {
    let fname = lexer::word(text, pos);
    match interp.program.save(Path::new(&fname)) {
        Ok(()) => Outcome::Ok,
        Err(_) => {
            println!("*** Error: could not create file {}", fname);
            Outcome::Error
        }
    }
}

fn cmd_load(interp: &mut Interpreter, text: &str, pos: &mut usize) -> Outcome {
    let fname = lexer::word(text, pos);
    match interp.program.load(Path::new(&fname)) {
        Ok(()) => Outcome::Ok,
        Err(_) => {
            println!("*** Error: cannot load file");
            Outcome::Error
        }
    }
}

fn cmd_delt(interp: &mut Interpreter, text: &str, pos: &mut usize) -> Outcome {
    match getparam(interp, text, pos) {
        Ok(n) if n >= 0 => match interp.program.delete(n as usize) {
            Ok(()) => Outcome::Ok,
            Err(e) => report(e),
        },
        Ok(_) => report(DiagError::InvalidValue),
        Err(e) => report(e),
    }
}

fn optional_params(interp: &mut Interpreter, text: &str, pos: &mut usize, out: &mut [i64]) -> Result<(), DiagError> {
    for slot in out.iter_mut() {
        lexer::skip_spaces(text, pos);
        if lexer::at_end(text, *pos) || lexer::peek(text, *pos) == Some(b';') {
            break;
        }
        *slot = getparam(interp, text, pos)?;
    }
    Ok(())
}

fn drivesize_sectors(interp: &Interpreter) -> Option<i64> {
    interp.device.get_drive()?;
    interp.device.size_bytes().ok().map(|b| b / pattern::SECTOR_SIZE as i64)
}

fn cmd_read(interp: &mut Interpreter, text: &str, pos: &mut usize) -> Outcome {
    let mut params = [0i64, 1];
    if let Err(e) = optional_params(interp, text, pos, &mut params) {
        return report(e);
    }
    let (lba, numsecs) = (params[0], params[1]);
    let Some(drivesize) = drivesize_sectors(interp) else {
        println!("*** Error: No current drive is set");
        return Outcome::Error;
    };
    if numsecs > BUFFER_SECTORS as i64 {
        println!("*** Error: Invalid sector count, must be <= {}", BUFFER_SECTORS);
        return Outcome::Error;
    }
    if lba >= drivesize {
        println!("*** Error: Invalid lba number, must be <= {}", drivesize);
        return Outcome::Error;
    }
    if lba + numsecs - 1 >= drivesize {
        println!("*** Error: Operation will exceed drive size");
        return Outcome::Error;
    }
    let span = numsecs as usize * pattern::SECTOR_SIZE;
    let mut buf = vec![0u8; span];
    if let Err(e) = interp.device.read(&mut buf, lba, numsecs) {
        log::debug!("read failed: {}", e);
        println!("*** Error: Read error");
        return Outcome::Error;
    }
    interp.readbuffer[..span].copy_from_slice(&buf);
    interp.iopread += 1.0;
    interp.bcread += (numsecs * pattern::SECTOR_SIZE as i64) as f64;
    Outcome::Ok
}

fn cmd_write(interp: &mut Interpreter, text: &str, pos: &mut usize) -> Outcome {
    if interp.writeprot {
        println!("*** Error: Drive is write protected, use unprot command");
        return Outcome::Error;
    }
    let mut params = [0i64, 1];
    if let Err(e) = optional_params(interp, text, pos, &mut params) {
        return report(e);
    }
    let (lba, numsecs) = (params[0], params[1]);
    let Some(drivesize) = drivesize_sectors(interp) else {
        println!("*** Error: No current drive is set");
        return Outcome::Error;
    };
    if numsecs > BUFFER_SECTORS as i64 {
        println!("*** Error: Invalid sector count, must be <= {}", BUFFER_SECTORS);
        return Outcome::Error;
    }
    if lba >= drivesize {
        println!("*** Error: Invalid lba number, must be <= {}", drivesize);
        return Outcome::Error;
    }
    if lba + numsecs - 1 >= drivesize {
        println!("*** Error: Operation will exceed drive size");
        return Outcome::Error;
    }
    let span = numsecs as usize * pattern::SECTOR_SIZE;
    if let Err(e) = interp.device.write(&interp.writebuffer[..span], lba, numsecs) {
        log::debug!("write failed: {}", e);
        println!("*** Error: Write error");
        return Outcome::Error;
    }
    interp.iopwrite += 1.0;
    interp.bcwrite += (numsecs * pattern::SECTOR_SIZE as i64) as f64;
    Outcome::Ok
}

fn cmd_dump(interp: &mut Interpreter, text: &str, pos: &mut usize, from_write: bool) -> Outcome {
    let mut numsecs = [1i64];
    if let Err(e) = optional_params(interp, text, pos, &mut numsecs) {
        return report(e);
    }
    let numsecs = numsecs[0];
    if numsecs > BUFFER_SECTORS as i64 {
        println!("*** Error: Invalid sector count, must be <= {}", BUFFER_SECTORS);
        return Outcome::Error;
    }
    println!("Contents of sector:");
    println!();
    let span = numsecs as usize * pattern::SECTOR_SIZE;
    let buf = if from_write { &interp.writebuffer } else { &interp.readbuffer };
    let buf = buf.clone();
    match help::dump(&buf, span, &mut interp.pager, &interp.break_flag) {
        Ok(_) => {
            println!();
            Outcome::Ok
        }
        Err(e) => report(e),
    }
}

fn cmd_compmode(text: &str, pos: &mut usize, interp: &mut Interpreter) -> Outcome {
    let mode = lexer::word(text, pos);
    interp.compare_mode = match mode.as_str() {
        "all" => CompareMode::All,
        "one" => CompareMode::One,
        "fail" => CompareMode::Fail,
        _ => {
            println!("*** Error: mode not recognized");
            return Outcome::Error;
        }
    };
    Outcome::Ok
}

fn cmd_drive(interp: &mut Interpreter, text: &str, pos: &mut usize) -> Outcome {
    lexer::skip_spaces(text, pos);
    if lexer::at_end(text, *pos) || lexer::peek(text, *pos) == Some(b';') {
        match interp.device.get_drive() {
            Some(d) => println!("Current drive is: {}", d),
            None => println!("Current drive is: Not set"),
        }
        return Outcome::Ok;
    }
    let drive = match getparam(interp, text, pos) {
        Ok(v) => v,
        Err(e) => return report(e),
    };
    interp.writeprot = true;
    if drive == 0 {
        println!("*** Warning: You have selected the system drive");
    }
    if let Err(e) = interp.device.set_drive(drive) {
        log::debug!("set_drive failed: {}", e);
        return Outcome::Error;
    }
    match interp.device.size_bytes() {
        Ok(bytes) => {
            if bytes % pattern::SECTOR_SIZE as i64 != 0 {
                println!("*** Warning: Drive total size is not an even number of sectors");
            }
        }
        Err(_) => return Outcome::Error,
    }
    interp.iopwrite = 0.0;
    interp.iopread = 0.0;
    interp.bcwrite = 0.0;
    interp.bcread = 0.0;
    Outcome::Ok
}

fn cmd_listdrives(interp: &Interpreter) -> Outcome {
    println!("Physical drives available:");
    println!();
    for i in 0..10 {
        if interp.device.test_drive(i) {
            match interp.device.probe_size_bytes(i) {
                Ok(bytes) => {
                    let lbas = bytes / pattern::SECTOR_SIZE as i64;
                    println!("Drive {} ({}) available, {} lbas", i, interp.device.drive_name(i), lbas);
                }
                Err(_) => println!("Drive {} ({}) available", i, interp.device.drive_name(i)),
            }
        }
    }
    println!();
    Outcome::Ok
}

fn cmd_pattn(interp: &mut Interpreter, text: &str, pos: &mut usize) -> Outcome {
    lexer::skip_spaces(text, pos);
    let pat = if lexer::at_end(text, *pos) || lexer::peek(text, *pos) == Some(b';') {
        "cnt".to_string()
    } else {
        lexer::word(text, pos)
    };
    let mut val = 0i64;
    let mut len = BUFFER_SECTORS as i64;
    lexer::skip_spaces(text, pos);
    if !lexer::at_end(text, *pos) && lexer::peek(text, *pos) != Some(b';') {
        match getparam(interp, text, pos) {
            Ok(v) => val = v,
            Err(e) => return report(e),
        }
        lexer::skip_spaces(text, pos);
        if !lexer::at_end(text, *pos) && lexer::peek(text, *pos) != Some(b';') {
            match getparam(interp, text, pos) {
                Ok(v) => len = v,
                Err(e) => return report(e),
            }
        }
    }

    if len < 0 || len as usize > BUFFER_SECTORS {
        return report(DiagError::SectorCountTooLarge(BUFFER_SECTORS));
    }

    let saved_seed = interp.rng.seed();
    interp.rng.reseed(42);
    let result = pattern::fill(&mut interp.writebuffer, &pat, val, len as usize, &mut interp.rng);
    interp.rng.reseed(saved_seed);
    match result {
        Ok(()) => Outcome::Ok,
        Err(e) => report(e),
    }
}

fn cmd_comp(interp: &mut Interpreter, text: &str, pos: &mut usize) -> Outcome {
    lexer::skip_spaces(text, pos);
    let pat = if lexer::at_end(text, *pos) || lexer::peek(text, *pos) == Some(b';') {
        "cnt".to_string()
    } else {
        lexer::word(text, pos)
    };
    let mut val = 0i64;
    let mut len = BUFFER_SECTORS as i64;
    lexer::skip_spaces(text, pos);
    if !lexer::at_end(text, *pos) && lexer::peek(text, *pos) != Some(b';') {
        match getparam(interp, text, pos) {
            Ok(v) => val = v,
            Err(e) => return report(e),
        }
        lexer::skip_spaces(text, pos);
        if !lexer::at_end(text, *pos) && lexer::peek(text, *pos) != Some(b';') {
            match getparam(interp, text, pos) {
                Ok(v) => len = v,
                Err(e) => return report(e),
            }
        }
    }

    if len < 0 || len as usize > BUFFER_SECTORS {
        return report(DiagError::SectorCountTooLarge(BUFFER_SECTORS));
    }

    let saved_seed = interp.rng.seed();
    interp.rng.reseed(42);
    interp.compare_state.reset_for_run();

    let span = pattern::SECTOR_SIZE * len as usize;
    let outcome = if pat == "buffs" {
        run_compare(interp, span, |wb, rb, i| (rb[i], wb[i]))
    } else if !pattern::is_fill_pattern(&pat) {
        interp.rng.reseed(saved_seed);
        return report(DiagError::UnknownPattern(pat));
    } else {
        let mut expected = vec![0u8; span];
        if let Err(e) = pattern::fill(&mut expected, &pat, val, len as usize, &mut interp.rng) {
            interp.rng.reseed(saved_seed);
            return report(e);
        }
        // "lba" only ever fills the first 4 bytes of each sector; only those
        // are meaningful to compare, matching the fill's own sparse layout.
        let indices: Vec<usize> = if pat == "lba" {
            (0..len as usize).flat_map(|s| { let b = s * pattern::SECTOR_SIZE; b..b + 4 }).collect()
        } else {
            (0..span).collect()
        };
        run_compare_against(interp, &expected, &indices)
    };

    if let Outcome::Ok = outcome {
        let n = interp.compare_state.take_repcnt();
        if n > 0 {
            println!("**** Info: There were {} occurrances of the above mismatch", n);
        }
    }
    interp.rng.reseed(saved_seed);
    outcome
}

fn run_compare_against(interp: &mut Interpreter, expected: &[u8], indices: &[usize]) -> Outcome {
    for &i in indices {
        let exp = expected[i];
        let actual = interp.readbuffer[i];
        let obs = interp.compare_state.observe(i, actual, exp, interp.compare_mode);
        for m in obs.messages {
            println!("{}", m);
        }
        if obs.abort {
            return Outcome::Error;
        }
        if interp.break_flag.take() {
            return if interp.exitonerror { Outcome::Exit } else { Outcome::Stop };
        }
    }
    Outcome::Ok
}

fn run_compare(interp: &mut Interpreter, span: usize, pick: impl Fn(&[u8], &[u8], usize) -> (u8, u8)) -> Outcome {
    for i in 0..span {
        let (actual, exp) = pick(&interp.writebuffer, &interp.readbuffer, i);
        let obs = interp.compare_state.observe(i, actual, exp, interp.compare_mode);
        for m in obs.messages {
            println!("{}", m);
        }
        if obs.abort {
            return Outcome::Error;
        }
        if interp.break_flag.take() {
            return if interp.exitonerror { Outcome::Exit } else { Outcome::Stop };
        }
    }
    Outcome::Ok
}
