//! Screen pager and static help/dump text.

use std::io::{self, Write};

use crate::device::BreakFlag;
use crate::error::DiagResult;
use crate::pattern::SECTOR_SIZE;

const SCREEN_LINES: usize = 24;

/// Counts printed lines and prompts "Hit return to continue" once a
/// screen's worth have gone by.
pub struct Pager {
    line_count: usize,
}

impl Pager {
    pub fn new() -> Self {
        Pager { line_count: 0 }
    }

    pub fn reset(&mut self) {
        self.line_count = 0;
    }

    pub fn pause(&mut self) {
        self.line_count += 1;
        if self.line_count > SCREEN_LINES - 1 {
            print!("*** Hit return to continue ***");
            let _ = io::stdout().flush();
            let mut discard = String::new();
            let _ = io::stdin().read_line(&mut discard);
            self.line_count = 0;
        }
    }

    pub fn println(&mut self, line: &str) {
        println!("{}", line);
        self.pause();
    }
}

/// Hex + ASCII dump of `buffer[0..size)`, paginated, polling the break
/// flag once per completed line of 16 bytes.
pub fn dump(buffer: &[u8], size: usize, pager: &mut Pager, brk: &BreakFlag) -> DiagResult<bool> {
    pager.reset();
    let mut stopped = false;
    let mut row_start = 0usize;
    let mut i = 0usize;
    while i < size {
        if i % 16 == 0 {
            print!("{:08x}: ", i);
        }
        print!("{:02x} ", buffer[i]);
        if i % 16 == 15 {
            print!(" \"");
            for b in &buffer[row_start..=i] {
                let c = b & 0x7f;
                if c >= b' ' {
                    print!("{}", c as char);
                } else {
                    print!(".");
                }
            }
            println!("\"");
            pager.pause();
            row_start = i + 1;
            if brk.take() {
                stopped = true;
                break;
            }
        }
        i += 1;
    }
    if !stopped && row_start < size {
        let remaining = size - row_start;
        let filled_cols = remaining;
        for _ in 0..(16 - filled_cols) {
            print!("   ");
        }
        print!(" \"");
        for b in &buffer[row_start..size] {
            let c = b & 0x7f;
            if c >= b' ' {
                print!("{}", c as char);
            } else {
                print!(".");
            }
        }
        println!("\"");
    }
    Ok(stopped)
}

pub const HELP_TEXT: &[&str] = &[
    "",
    "Commands available:",
    "",
    "?, help                     - Print command help.",
    "r, read [lba][num]          - Read sector(s) at LBA, default read 0 1.",
    "w, write [lba][num]         - Write sector(s) at LBA, default write 0 1.",
    "dw, dumpwrite [num]         - Dump sector(s) from write buffer, default 1.",
    "dr, dumpread [num]          - Dump sector(s) from read buffer, default 1.",
    "pt, pattn [pat [val [cnt]]] - Set write buffer to pattern, default is count.",
    "c, comp [pat [val [cnt]]]   - Compare read buffer to pattern, default is count.",
    "cm, compmode mode           - Set miscompare handling mode, default is one.",
    "drive [num]                 - Set current phy drive, default is print current.",
    "listdrives, ld              - List available physical drives.",
    "unprot                      - Unprotect current drive.",
    "echo [text]                 - Echo the parameter area with next line.",
    "echon [text]                - Echo the parameter area without next line.",
    "p, print [fmt] val...       - Print calculated value(s) with next line.",
    "pn, printn [fmt] val...     - Print calculated value(s) without next line.",
    "l, loop [num]               - Loop from line start num times, default is",
    "                              forever.",
    "lq, loopq [num]             - Loop quiet from line start num times, default is",
    "                              forever.",
    "u [num]                     - Loop until condition is true.",
    "while cond                  - Start while/wend loop. Exec loop if cond is true.",
    "wend                        - Terminate while/wend loop.",
    "repeat                      - Start repeat/until loop.",
    "until cond                  - End repeat/until loop. Repeat if cond is false.",
    "for var start end [step]    - Run for loop, start to end in var.",
    "fend                        - End for loop.",
    "select val                  - Select value, match successive cases for val.",
    "case val                    - Start new select case.",
    "default                     - Start select case matching any value.",
    "send                        - Terminate select statement.",
    "end                         - Terminate procedure.",
    "go label                    - Go to program label.",
    "if cond                     - Continue if condition met, otherwise next line.",
    "s, set var val              - Set/reset user variable.",
    "local var                   - Mark variable as local.",
    "srand                       - Reset random number sequence.",
    "list                        - List stored program.",
    "clear                       - Clear stored program.",
    "save filename               - Save stored program to file.",
    "load filename               - Load stored program from file.",
    "delt num                    - Delete line in program with line number.",
    "exit                        - Exit diagnostic.",
    "exitonerror                 - Exit the diagnostic on error.",
    "",
    "[option] Means an optional parameter.",
    "",
    "Multiple commands can appear on a line as a; b; c...",
    "",
    "Patterns are:",
    "",
    "cnt   - Byte incrementing count.",
    "dwcnt - 32 bit incrementing count.",
    "val   - Numeric 32 bit value, big endian.",
    "rand  - Random byte value.",
    "lba   - Only the first 32 bits get LBA, rest is $ff. LBA starts",
    "        at [val], and increments across buffer. Note that this only",
    "        writes the first dword of each sector, use another pattern",
    "        to fill the background.",
    "buffs - Compare the read and write buffers to each other. This allows",
    "        complex patterns to be built up in the write buffer.",
    "",
    "All variables created in a procedure are temporary and removed at",
    "the end of the procedure. Variables are only created in a procedure",
    "if they don't exist outside of the procedure OR if \"local\" is used.",
    "Note that parameters are automatically local.",
    "",
    "Note that hitting the end of the program buffer terminates the run",
    "ALWAYS.",
    "",
    "The file \"discdiag.ini\", if present in the current directory, is",
    "automatically loaded when discdiag starts.",
    "",
    "*** WARNING: This diagnostic CAN and WILL destroy your hard disc!",
];

pub fn print_help(pager: &mut Pager) {
    pager.reset();
    for line in HELP_TEXT {
        pager.println(line);
    }
}

pub const fn sector_size() -> usize {
    SECTOR_SIZE
}
