//! Control-flow verbs (`loop`, `while`/`wend`, `repeat`/`until`, `for`/`fend`,
//! `select`/`case`/`default`/`send`, `if`, `go`, `end`) and the `skipcmd`
//! scan primitive they share to jump over a construct's body.

use crate::error::{DiagError, DiagResult};
use crate::eval;
use crate::interp::{ControlFrame, ControlKind, Interpreter, LineRef, Outcome};
use crate::lexer;

fn getparam(interp: &mut Interpreter, text: &str, pos: &mut usize) -> DiagResult<i64> {
    eval::eval(text, pos, interp)
}

/// Advance past the current command, then scan forward — across stored
/// lines if need be — for one of up to three target verbs, skipping over
/// any nested `while`/`repeat`/`for`/`select` construct along the way.
/// Returns the 0-based index into `targets` of whichever was found.
///
/// Exhausting the program without a match is a hard error, even at
/// immediate-mode depth: the construct being skipped has no matching
/// close, and there is nothing sensible left to execute.
fn skipcmd(interp: &mut Interpreter, pos: &mut usize, targets: &[&str]) -> DiagResult<usize> {
    let mut text = interp.current_text().to_string();
    while !lexer::at_end(&text, *pos) && lexer::peek(&text, *pos) != Some(b';') {
        *pos += 1;
    }
    if lexer::peek(&text, *pos) == Some(b';') {
        *pos += 1;
    }
    interp.set_top_cursor(*pos);

    let (mut whlcnt, mut repcnt, mut forcnt, mut selcnt) = (0i32, 0i32, 0i32, 0i32);

    loop {
        loop {
            lexer::skip_spaces(&text, pos);
            if lexer::at_end(&text, *pos) {
                break;
            }
            let w = lexer::word(&text, pos);
            match w.as_str() {
                "while" => whlcnt += 1,
                "wend" => whlcnt = (whlcnt - 1).max(0),
                "repeat" => repcnt += 1,
                "until" => repcnt = (repcnt - 1).max(0),
                "for" => forcnt += 1,
                "fend" => forcnt = (forcnt - 1).max(0),
                "select" => selcnt += 1,
                "send" => selcnt = (selcnt - 1).max(0),
                _ => {}
            }
            if whlcnt == 0 && repcnt == 0 && forcnt == 0 && selcnt == 0 {
                if let Some(idx) = targets.iter().position(|t| *t == w) {
                    interp.set_top_cursor(*pos);
                    return Ok(idx);
                }
            }
            while !lexer::at_end(&text, *pos) && lexer::peek(&text, *pos) != Some(b';') {
                *pos += 1;
            }
            if lexer::peek(&text, *pos) == Some(b';') {
                *pos += 1;
            }
        }

        if interp.depth() > 1 {
            let next = match interp.top_line() {
                LineRef::Stored(idx) => idx + 1,
                LineRef::Immediate => unreachable!(),
            };
            if next >= interp.program.lines.len() {
                return Err(DiagError::ScanExhausted(targets[0].to_string()));
            }
            interp.jump(LineRef::Stored(next), 0);
            *pos = 0;
            text = interp.current_text().to_string();
        } else {
            return Err(DiagError::ScanExhausted(targets[0].to_string()));
        }
    }
}

pub fn cmd_loop(interp: &mut Interpreter, text: &str, pos: &mut usize, quiet: bool) -> Outcome {
    let mut stopcount: i64 = -1;
    lexer::skip_spaces(text, pos);
    if !lexer::at_end(text, *pos) && lexer::peek(text, *pos) != Some(b';') {
        match getparam(interp, text, pos) {
            Ok(v) => stopcount = v,
            Err(e) => {
                println!("*** Error: {}", e);
                return Outcome::Error;
            }
        }
    }

    let site = *pos;
    let count = {
        let c = interp.loop_counter(site);
        *c += 1;
        *c
    };
    if !quiet {
        println!("Iteration: {}", count);
    }
    if stopcount < 0 || count < stopcount {
        interp.set_top_cursor(0);
        *pos = 0;
        Outcome::Restart
    } else {
        *interp.loop_counter(site) = 0;
        Outcome::Ok
    }
}

pub fn cmd_untill(interp: &mut Interpreter, text: &str, pos: &mut usize) -> Outcome {
    match getparam(interp, text, pos) {
        Ok(0) => {
            interp.set_top_cursor(0);
            *pos = 0;
            Outcome::Restart
        }
        Ok(_) => Outcome::Ok,
        Err(e) => {
            println!("*** Error: {}", e);
            Outcome::Error
        }
    }
}

pub fn cmd_while(interp: &mut Interpreter, text: &str, pos: &mut usize) -> Outcome {
    let back_cursor = *pos;
    let back_line = interp.top_line();
    let v = match getparam(interp, text, pos) {
        Ok(v) => v,
        Err(e) => {
            println!("*** Error: {}", e);
            return Outcome::Error;
        }
    };
    if v == 0 {
        match skipcmd(interp, pos, &["wend"]) {
            Ok(_) => Outcome::Ok,
            Err(e) => {
                println!("*** Error: {}", e);
                Outcome::Error
            }
        }
    } else {
        interp.control_stack.push(ControlFrame { back_line, back_cursor, kind: ControlKind::While });
        Outcome::Ok
    }
}

pub fn cmd_wend(interp: &mut Interpreter, _text: &str, pos: &mut usize) -> Outcome {
    while matches!(interp.control_stack.last(), Some(cf) if !matches!(cf.kind, ControlKind::While)) {
        interp.control_stack.pop();
    }
    let Some(cf) = interp.control_stack.last().cloned() else {
        println!("*** Error: No \"while\" is active");
        return Outcome::Error;
    };
    let after_line = interp.top_line();
    let after_cursor = *pos;

    interp.jump(cf.back_line, cf.back_cursor);
    let text = interp.current_text().to_string();
    let mut cpos = cf.back_cursor;
    let v = match getparam(interp, &text, &mut cpos) {
        Ok(v) => v,
        Err(e) => {
            println!("*** Error: {}", e);
            return Outcome::Error;
        }
    };
    if v == 0 {
        interp.jump(after_line, after_cursor);
        *pos = after_cursor;
        interp.control_stack.pop();
    } else {
        *pos = cpos;
        interp.set_top_cursor(cpos);
    }
    Outcome::Ok
}

pub fn cmd_repeat(interp: &mut Interpreter, _text: &str, pos: &mut usize) -> Outcome {
    interp.control_stack.push(ControlFrame {
        back_line: interp.top_line(),
        back_cursor: *pos,
        kind: ControlKind::Repeat,
    });
    Outcome::Ok
}

pub fn cmd_until(interp: &mut Interpreter, text: &str, pos: &mut usize) -> Outcome {
    while matches!(interp.control_stack.last(), Some(cf) if !matches!(cf.kind, ControlKind::Repeat)) {
        interp.control_stack.pop();
    }
    let Some(cf) = interp.control_stack.last().cloned() else {
        println!("*** Error: No \"repeat\" is active");
        return Outcome::Error;
    };
    let v = match getparam(interp, text, pos) {
        Ok(v) => v,
        Err(e) => {
            println!("*** Error: {}", e);
            return Outcome::Error;
        }
    };
    if v == 0 {
        interp.jump(cf.back_line, cf.back_cursor);
        *pos = cf.back_cursor;
    } else {
        interp.control_stack.pop();
    }
    Outcome::Ok
}

pub fn cmd_for(interp: &mut Interpreter, text: &str, pos: &mut usize) -> Outcome {
    let var = lexer::word(text, pos);
    let start = match getparam(interp, text, pos) {
        Ok(v) => v,
        Err(e) => {
            println!("*** Error: {}", e);
            return Outcome::Error;
        }
    };
    let end_param_start = *pos;
    let end = match getparam(interp, text, pos) {
        Ok(v) => v,
        Err(e) => {
            println!("*** Error: {}", e);
            return Outcome::Error;
        }
    };
    lexer::skip_spaces(text, pos);
    let mut step = 1i64;
    if !lexer::at_end(text, *pos) && lexer::peek(text, *pos) != Some(b';') {
        step = match getparam(interp, text, pos) {
            Ok(v) => v,
            Err(e) => {
                println!("*** Error: {}", e);
                return Outcome::Error;
            }
        };
    }

    interp.vars.set(&var, start);

    if (start > end && step >= 0) || (start < end && step < 0) {
        match skipcmd(interp, pos, &["fend"]) {
            Ok(_) => Outcome::Ok,
            Err(e) => {
                println!("*** Error: {}", e);
                Outcome::Error
            }
        }
    } else {
        interp.control_stack.push(ControlFrame {
            back_line: interp.top_line(),
            back_cursor: end_param_start,
            kind: ControlKind::For { var, step },
        });
        Outcome::Ok
    }
}

pub fn cmd_fend(interp: &mut Interpreter, _text: &str, pos: &mut usize) -> Outcome {
    while matches!(interp.control_stack.last(), Some(cf) if !matches!(cf.kind, ControlKind::For { .. })) {
        interp.control_stack.pop();
    }
    let Some(cf) = interp.control_stack.last().cloned() else {
        println!("*** Error: No \"for\" is active");
        return Outcome::Error;
    };
    let ControlKind::For { var, step: frozen_step } = cf.kind else { unreachable!() };

    let after_line = interp.top_line();
    let after_cursor = *pos;

    interp.jump(cf.back_line, cf.back_cursor);
    let text = interp.current_text().to_string();
    let mut cpos = cf.back_cursor;
    let e = match getparam(interp, &text, &mut cpos) {
        Ok(v) => v,
        Err(e) => {
            println!("*** Error: {}", e);
            return Outcome::Error;
        }
    };

    // The step, like end, is re-evaluated from source on every fend; only
    // fall back to the value frozen at "for" time if none was written.
    lexer::skip_spaces(&text, &mut cpos);
    let step = if !lexer::at_end(&text, cpos) && lexer::peek(&text, cpos) != Some(b';') {
        match getparam(interp, &text, &mut cpos) {
            Ok(v) => v,
            Err(e) => {
                println!("*** Error: {}", e);
                return Outcome::Error;
            }
        }
    } else {
        frozen_step
    };

    let s = interp.vars.find(&var).unwrap_or(0).wrapping_add(step);
    interp.vars.set(&var, s);

    if (s > e && step >= 0) || (s < e && step < 0) {
        interp.jump(after_line, after_cursor);
        *pos = after_cursor;
        interp.control_stack.pop();
    } else {
        *pos = cpos;
        interp.set_top_cursor(cpos);
    }
    Outcome::Ok
}

pub fn cmd_select(interp: &mut Interpreter, text: &str, pos: &mut usize) -> Outcome {
    let v = match getparam(interp, text, pos) {
        Ok(v) => v,
        Err(e) => {
            println!("*** Error: {}", e);
            return Outcome::Error;
        }
    };
    loop {
        let found = match skipcmd(interp, pos, &["case", "default", "send"]) {
            Ok(idx) => idx,
            Err(e) => {
                println!("*** Error: {}", e);
                return Outcome::Error;
            }
        };
        if found == 2 {
            return Outcome::Ok; // send: no case matched
        }
        if found == 1 {
            return Outcome::Ok; // default: matches unconditionally
        }
        // found == 0: a "case" header, scan its comma-less value list.
        let mut text_now = interp.current_text().to_string();
        loop {
            let m = match getparam(interp, &text_now, pos) {
                Ok(v) => v,
                Err(e) => {
                    println!("*** Error: {}", e);
                    return Outcome::Error;
                }
            };
            if v == m {
                interp.set_top_cursor(*pos);
                return Outcome::Ok;
            }
            lexer::skip_spaces(&text_now, pos);
            if lexer::at_end(&text_now, *pos) || lexer::peek(&text_now, *pos) == Some(b';') {
                break;
            }
            text_now = interp.current_text().to_string();
        }
    }
}

pub fn cmd_case(interp: &mut Interpreter, _text: &str, pos: &mut usize) -> Outcome {
    match skipcmd(interp, pos, &["send"]) {
        Ok(_) => Outcome::Ok,
        Err(e) => {
            println!("*** Error: {}", e);
            Outcome::Error
        }
    }
}

pub fn cmd_default(interp: &mut Interpreter, _text: &str, pos: &mut usize) -> Outcome {
    match skipcmd(interp, pos, &["send"]) {
        Ok(_) => Outcome::Ok,
        Err(e) => {
            println!("*** Error: {}", e);
            Outcome::Error
        }
    }
}

pub fn cmd_send(_interp: &mut Interpreter, _text: &str, _pos: &mut usize) -> Outcome {
    Outcome::Ok
}

pub fn cmd_if(interp: &mut Interpreter, text: &str, pos: &mut usize) -> Outcome {
    match getparam(interp, text, pos) {
        Ok(0) => {
            *pos = text.len();
            Outcome::Ok
        }
        Ok(_) => Outcome::Ok,
        Err(e) => {
            println!("*** Error: {}", e);
            Outcome::Error
        }
    }
}

pub fn cmd_go(interp: &mut Interpreter, text: &str, pos: &mut usize) -> Outcome {
    let label = lexer::word(text, pos);
    if label.is_empty() {
        println!("*** Error: no label specified");
        return Outcome::Error;
    }
    match interp.program.find_label(&label) {
        Some(idx) => {
            interp.jump(LineRef::Stored(idx), 0);
            *pos = 0;
            Outcome::Restart
        }
        None => {
            println!("*** Error: Program label {} not found", label);
            Outcome::Error
        }
    }
}

pub fn cmd_end(interp: &mut Interpreter, _text: &str, pos: &mut usize) -> Outcome {
    if interp.depth() <= 1 {
        println!("*** Error: Nothing to return to at immediate mode");
        return Outcome::Error;
    }
    if let Err(e) = interp.pop_frame() {
        println!("*** Error: {}", e);
        return Outcome::Error;
    }
    *pos = interp.top_cursor();
    Outcome::Ok
}
