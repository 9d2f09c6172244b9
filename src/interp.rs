//! Process-wide interpreter state: the frame stack, the control stack, and
//! the single-command driver loop (`execute_line`) that walks across stored
//! program lines the way the original's `nxtcmd`/`nxtpgm` labels do.

use std::collections::HashMap;

use crate::device::{BlockDevice, BreakFlag};
use crate::dispatch;
use crate::error::DiagError;
use crate::eval::NameResolver;
use crate::help::Pager;
use crate::lexer;
use crate::pattern::{CompareMode, CompareState, Rng};
use crate::program::Program;
use crate::vars::VarStack;

/// Sectors held by the read/write buffers; also the max sector count any
/// single `read`/`write`/`dumpread`/`dumpwrite` may address.
pub const BUFFER_SECTORS: usize = 256;

/// What a command handler did. Unlike `DiagError`, this is never an `Err`
/// a caller must remember to check — every handler decides for itself
/// whether to print a diagnostic, and reports only what the driver loop
/// needs to decide where to go next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Proceed to the next command as usual.
    Ok,
    /// A diagnostic was already printed; abandon this input line.
    Error,
    /// `exit` was seen.
    Exit,
    /// The break flag fired; abandon this input line without treating it
    /// as an error.
    Stop,
    /// The command already repositioned the cursor (and possibly the
    /// active line); skip the usual "next char must be `;` or end" check.
    Restart,
    /// Reserved: no current handler ever constructs this. If one ever did,
    /// the driver loop has nowhere defined to unwind to — treat it as an
    /// interpreter bug rather than silently dropping the variant.
    Break,
    /// Reserved, same rationale as `Break`.
    Continue,
}

/// Which stored line (or the transient typed-in line) a frame's cursor
/// indexes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRef {
    Immediate,
    Stored(usize),
}

/// One level of the procedure-call stack.
#[derive(Debug, Clone)]
pub struct Frame {
    pub line: LineRef,
    pub cursor: usize,
    pub locals_mark: usize,
}

#[derive(Debug, Clone)]
pub enum ControlKind {
    While,
    Repeat,
    For { var: String, step: i64 },
}

/// One level of the independent while/repeat/for control stack.
#[derive(Debug, Clone)]
pub struct ControlFrame {
    pub back_line: LineRef,
    pub back_cursor: usize,
    pub kind: ControlKind,
}

pub struct Interpreter {
    pub vars: VarStack,
    pub program: Program,
    interp_stack: Vec<Frame>,
    pub control_stack: Vec<ControlFrame>,
    pub device: Box<dyn BlockDevice>,
    pub rng: Rng,
    pub compare_mode: CompareMode,
    pub compare_state: CompareState,
    pub writeprot: bool,
    pub writebuffer: Vec<u8>,
    pub readbuffer: Vec<u8>,
    pub break_flag: BreakFlag,
    pub pager: Pager,
    pub exitonerror: bool,
    pub iopwrite: f64,
    pub iopread: f64,
    pub bcwrite: f64,
    pub bcread: f64,
    immediate_text: String,
    immediate_loop_counters: HashMap<usize, i64>,
}

impl Interpreter {
    pub fn new(device: Box<dyn BlockDevice>, break_flag: BreakFlag) -> Self {
        Interpreter {
            vars: VarStack::new(),
            program: Program::new(),
            interp_stack: Vec::new(),
            control_stack: Vec::new(),
            device,
            rng: Rng::new(1),
            compare_mode: CompareMode::One,
            compare_state: CompareState::new(),
            writeprot: true,
            writebuffer: vec![0u8; crate::pattern::SECTOR_SIZE * BUFFER_SECTORS],
            readbuffer: vec![0u8; crate::pattern::SECTOR_SIZE * BUFFER_SECTORS],
            break_flag,
            pager: Pager::new(),
            exitonerror: false,
            iopwrite: 0.0,
            iopread: 0.0,
            bcwrite: 0.0,
            bcread: 0.0,
            immediate_text: String::new(),
            immediate_loop_counters: HashMap::new(),
        }
    }

    pub fn depth(&self) -> usize {
        self.interp_stack.len()
    }

    pub fn current_text(&self) -> &str {
        match self.top_frame().line {
            LineRef::Immediate => &self.immediate_text,
            LineRef::Stored(idx) => &self.program.lines[idx].text,
        }
    }

    fn top_frame(&self) -> &Frame {
        self.interp_stack.last().expect("interpreter stack is never empty mid-line")
    }

    pub fn top_cursor(&self) -> usize {
        self.top_frame().cursor
    }

    pub fn set_top_cursor(&mut self, pos: usize) {
        if let Some(f) = self.interp_stack.last_mut() {
            f.cursor = pos;
        }
    }

    pub fn top_line(&self) -> LineRef {
        self.top_frame().line
    }

    /// Move the current (topmost) frame to a different line and cursor, the
    /// way `go`, `wend`, `until`, and `fend` reposition `introot->curlin`
    /// directly without touching the frame stack itself.
    pub fn jump(&mut self, line: LineRef, cursor: usize) {
        if let Some(f) = self.interp_stack.last_mut() {
            f.line = line;
            f.cursor = cursor;
        }
    }

    /// Loop counter for the `loop`/`loopq` verb at byte offset `site` within
    /// the current line, lazily created at zero.
    pub fn loop_counter(&mut self, site: usize) -> &mut i64 {
        match self.top_frame().line {
            LineRef::Immediate => self.immediate_loop_counters.entry(site).or_insert(0),
            LineRef::Stored(idx) => self.program.lines[idx].loop_counters.entry(site).or_insert(0),
        }
    }

    pub fn push_frame(&mut self, line: LineRef, cursor: usize) {
        let locals_mark = self.vars.mark();
        self.interp_stack.push(Frame { line, cursor, locals_mark });
    }

    /// Pop the current frame, restoring the caller's position. Errors if
    /// called at immediate-mode depth (nothing to return to).
    pub fn pop_frame(&mut self) -> Result<(), DiagError> {
        if self.interp_stack.len() <= 1 {
            return Err(DiagError::EmptyFrameStack);
        }
        let popped = self.interp_stack.pop().unwrap();
        self.vars.truncate(popped.locals_mark);
        Ok(())
    }

    /// Unwind every frame back to (and including) the bottom one. Only
    /// non-bottom frames have their locals purged: the original's `poplvl`
    /// only frees variables down to a frame's mark when that frame still
    /// has a caller beneath it, so a variable set at immediate-mode depth
    /// outlives the prompt line that created it.
    fn drain_stack(&mut self) {
        while self.interp_stack.len() > 1 {
            let popped = self.interp_stack.pop().unwrap();
            self.vars.truncate(popped.locals_mark);
        }
        self.interp_stack.clear();
        self.control_stack.clear();
    }

    /// Run one line of typed input to completion: either stores it as a
    /// program line (if it starts with a decimal position) or executes it,
    /// walking across stored lines via the same flat "next line" advance a
    /// called procedure's body uses, until the interpreter stack unwinds
    /// back to immediate mode.
    pub fn execute_line(&mut self, input: &str) -> Outcome {
        self.program.reset_loop_counters();

        let mut pos = 0usize;
        lexer::skip_spaces(input, &mut pos);
        if matches!(lexer::peek(input, pos), Some(b) if b.is_ascii_digit()) {
            if let Err(e) = self.program.enter_line(input) {
                println!("*** Error: {}", e);
            }
            return Outcome::Ok;
        }

        self.immediate_text = input.to_string();
        self.immediate_loop_counters.clear();
        self.interp_stack.clear();
        self.control_stack.clear();
        let locals_mark = self.vars.mark();
        self.interp_stack.push(Frame { line: LineRef::Immediate, cursor: 0, locals_mark });

        loop {
            // nxtcmd: run commands on the current top frame's line.
            loop {
                let text = self.current_text().to_string();
                let mut pos = self.top_cursor();
                lexer::skip_spaces(&text, &mut pos);
                if lexer::at_end(&text, pos) || lexer::peek(&text, pos) == Some(b'!') {
                    self.set_top_cursor(pos);
                    break;
                }

                let outcome = dispatch::exec(self, &text, &mut pos);

                if outcome == Outcome::Exit {
                    self.drain_stack();
                    return Outcome::Exit;
                }
                if outcome == Outcome::Error {
                    self.drain_stack();
                    return if self.exitonerror { Outcome::Exit } else { Outcome::Ok };
                }
                if self.break_flag.take() {
                    self.drain_stack();
                    return if self.exitonerror { Outcome::Exit } else { Outcome::Stop };
                }

                // A call/go/loop-style jump may have switched the active
                // line out from under us; re-read before checking what
                // follows the command just run.
                let text = self.current_text().to_string();
                lexer::skip_spaces(&text, &mut pos);
                if lexer::peek(&text, pos) == Some(b'!') {
                    self.set_top_cursor(pos);
                    break;
                }
                if outcome != Outcome::Restart {
                    match lexer::peek(&text, pos) {
                        None => {}
                        Some(b';') => {
                            pos += 1;
                            lexer::skip_spaces(&text, &mut pos);
                        }
                        Some(_) => {
                            println!("*** Error: Invalid command termination");
                            self.drain_stack();
                            return Outcome::Ok;
                        }
                    }
                }
                self.set_top_cursor(pos);
            }

            // nxtpgm: advance to the next physical stored line, regardless
            // of which label or call started the current frame.
            if self.depth() > 1 {
                let next = match self.top_line() {
                    LineRef::Stored(idx) => idx + 1,
                    LineRef::Immediate => unreachable!("only a stored frame can have depth > 1"),
                };
                if next < self.program.lines.len() {
                    self.jump(LineRef::Stored(next), 0);
                } else {
                    // Ran off the end of the program store: flush the
                    // whole interpreter stack and return to the prompt,
                    // even mid-nested-calls.
                    self.drain_stack();
                    break;
                }
            }
            if self.depth() <= 1 {
                break;
            }
        }

        self.drain_stack();
        Outcome::Ok
    }
}

impl NameResolver for Interpreter {
    fn resolve_pseudo(
        &mut self,
        name: &str,
        text: &str,
        pos: &mut usize,
    ) -> Result<Option<i64>, DiagError> {
        match name {
            "drvsiz" => Ok(Some(self.device.size_bytes().unwrap_or(0) / crate::pattern::SECTOR_SIZE as i64)),
            "rand" => Ok(Some(self.rng.next_i64())),
            "lbarnd" => {
                let drivesize = self.device.size_bytes().unwrap_or(0) / crate::pattern::SECTOR_SIZE as i64;
                if drivesize == 0 {
                    Err(DiagError::DriveNotSelected)
                } else {
                    Ok(Some(self.rng.next_i64() % drivesize))
                }
            }
            "secsiz" => Ok(Some(crate::pattern::SECTOR_SIZE as i64)),
            "bufsiz" => Ok(Some(BUFFER_SECTORS as i64)),
            _ => {
                let _ = (text, pos);
                Ok(None)
            }
        }
    }

    fn resolve_user(&mut self, name: &str) -> Option<i64> {
        self.vars.find(name)
    }
}
