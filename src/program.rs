//! The stored program: an ordered, 1-indexed list of entered lines.
//!
//! Backed by a flat `Vec` rather than the original's singly linked list —
//! insertion position arithmetic is the same either way, but indices avoid
//! the list-walk and the invalidation hazards raw pointers would bring.

use std::collections::HashMap;
use std::fs;
use std::io::Write as _;
use std::path::Path;

use crate::error::{DiagError, DiagResult};
use crate::lexer;

#[derive(Debug, Clone)]
pub struct StoredLine {
    pub label: Option<String>,
    /// `None` means no parameter list was typed at all; `Some(vec![])`
    /// means an explicit empty `()` was typed. Both are label-only calls
    /// from the dispatcher's point of view, but they print differently.
    pub params: Option<Vec<String>>,
    pub text: String,
    /// Keyed by the byte offset (within `text`) of the `loop`/`loopq` verb
    /// that owns this counter. Lazily populated.
    pub loop_counters: HashMap<usize, i64>,
}

#[derive(Debug, Default)]
pub struct Program {
    pub lines: Vec<StoredLine>,
}

/// Parse an optional `label:` or `label(p1 p2 …):` prefix off `raw`,
/// returning `(label, params, body)`. If no label is present, the whole
/// input is the body.
fn parse_label(raw: &str) -> DiagResult<(Option<String>, Option<Vec<String>>, String)> {
    let mut pos = 0usize;
    lexer::skip_spaces(raw, &mut pos);
    let lookahead_start = pos;
    if !matches!(lexer::peek(raw, pos), Some(b) if b.is_ascii_alphabetic()) {
        return Ok((None, None, raw.to_string()));
    }
    let candidate = lexer::word(raw, &mut pos);
    lexer::skip_spaces(raw, &mut pos);
    match lexer::peek(raw, pos) {
        Some(b':') | Some(b'(') => {}
        _ => return Ok((None, None, raw.to_string())),
    }

    let params = if lexer::peek(raw, pos) == Some(b'(') {
        pos += 1;
        lexer::skip_spaces(raw, &mut pos);
        let mut names = Vec::new();
        while !matches!(lexer::peek(raw, pos), None | Some(b')') | Some(b':')) {
            let w = lexer::word(raw, &mut pos);
            if w.is_empty() {
                return Err(DiagError::InvalidValue);
            }
            names.push(w);
            lexer::skip_spaces(raw, &mut pos);
        }
        if lexer::peek(raw, pos) != Some(b')') {
            return Err(DiagError::MissingParen);
        }
        pos += 1;
        lexer::skip_spaces(raw, &mut pos);
        if lexer::peek(raw, pos) != Some(b':') {
            return Err(DiagError::InvalidValue);
        }
        Some(names)
    } else {
        None
    };
    pos += 1; // skip ':'
    let _ = lookahead_start;
    Ok((Some(candidate), params, raw[pos..].to_string()))
}

impl Program {
    pub fn new() -> Self {
        Program { lines: Vec::new() }
    }

    /// Parse and insert one typed or loaded line. If `raw` begins (after
    /// leading spaces) with a decimal number, that number is the 1-based
    /// target position; otherwise the line is appended. Used both for
    /// interactive line entry and for `load`, exactly as the original
    /// shares one function for both paths.
    pub fn enter_line(&mut self, raw: &str) -> DiagResult<()> {
        let mut pos = 0usize;
        lexer::skip_spaces(raw, &mut pos);
        let n = if matches!(lexer::peek(raw, pos), Some(b) if b.is_ascii_digit()) {
            let w = lexer::word(raw, &mut pos);
            Some(w.parse::<usize>().map_err(|_| DiagError::InvalidValue)?)
        } else {
            pos = 0;
            None
        };
        let (label, params, text) = parse_label(&raw[pos..])?;
        let entry = StoredLine {
            label,
            params,
            text,
            loop_counters: HashMap::new(),
        };
        match n {
            None => self.lines.push(entry),
            Some(n) => {
                let idx = n.saturating_sub(1).min(self.lines.len());
                self.lines.insert(idx, entry);
            }
        }
        Ok(())
    }

    pub fn delete(&mut self, n: usize) -> DiagResult<()> {
        if n == 0 || n > self.lines.len() {
            return Err(DiagError::NoSuchLine(n));
        }
        self.lines.remove(n - 1);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn find_label(&self, name: &str) -> Option<usize> {
        self.lines
            .iter()
            .position(|l| l.label.as_deref() == Some(name))
    }

    /// Reset every stored line's loop counters. Called once per
    /// driver-loop iteration, matching the original's `rstlin()`.
    pub fn reset_loop_counters(&mut self) {
        for line in &mut self.lines {
            line.loop_counters.clear();
        }
    }

    pub fn format_line(&self, idx: usize) -> String {
        let line = &self.lines[idx];
        let n = idx + 1;
        match (&line.label, &line.params) {
            (Some(label), Some(params)) => {
                format!("{}: {}({}): {}", n, label, params.join(" "), line.text)
            }
            (Some(label), None) => format!("{}: {}: {}", n, label, line.text),
            (None, _) => format!("{}: {}", n, line.text),
        }
    }

    /// The same `label(p1 p2): body` form `save` round-trips through
    /// `load`, without the leading line number.
    fn format_typed(&self, line: &StoredLine) -> String {
        match (&line.label, &line.params) {
            (Some(label), Some(params)) => {
                format!("{}({}): {}", label, params.join(" "), line.text)
            }
            (Some(label), None) => format!("{}: {}", label, line.text),
            (None, _) => line.text.clone(),
        }
    }

    pub fn save(&self, path: &Path) -> DiagResult<()> {
        let mut file = fs::File::create(path)?;
        for line in &self.lines {
            writeln!(file, "{}", self.format_typed(line))?;
        }
        Ok(())
    }

    pub fn load(&mut self, path: &Path) -> DiagResult<()> {
        let contents = fs::read_to_string(path)?;
        self.clear();
        for raw in contents.lines() {
            self.enter_line(raw)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_at_position_shifts_later_lines() {
        let mut p = Program::new();
        p.enter_line("1 alpha").unwrap();
        p.enter_line("2 beta").unwrap();
        p.enter_line("2 gamma").unwrap();
        assert_eq!(p.lines[0].text, " alpha");
        assert_eq!(p.lines[1].text, " gamma");
        assert_eq!(p.lines[2].text, " beta");
    }

    #[test]
    fn insert_past_end_appends() {
        let mut p = Program::new();
        p.enter_line("1 alpha").unwrap();
        p.enter_line("99 beta").unwrap();
        assert_eq!(p.lines.len(), 2);
        assert_eq!(p.lines[1].text, " beta");
    }

    #[test]
    fn label_and_parameter_list_are_parsed() {
        let mut p = Program::new();
        p.enter_line("1 greet(n): echon hi; p \"%d\" n").unwrap();
        assert_eq!(p.lines[0].label.as_deref(), Some("greet"));
        assert_eq!(p.lines[0].params, Some(vec!["n".to_string()]));
        assert_eq!(p.lines[0].text, " echon hi; p \"%d\" n");
    }

    #[test]
    fn label_without_parens_has_no_param_list() {
        let mut p = Program::new();
        p.enter_line("1 loop1: p 1").unwrap();
        assert_eq!(p.lines[0].label.as_deref(), Some("loop1"));
        assert_eq!(p.lines[0].params, None);
    }

    #[test]
    fn delete_removes_the_given_line() {
        let mut p = Program::new();
        p.enter_line("1 a").unwrap();
        p.enter_line("2 b").unwrap();
        p.delete(1).unwrap();
        assert_eq!(p.lines.len(), 1);
        assert_eq!(p.lines[0].text, " b");
    }

    #[test]
    fn delete_out_of_range_errors() {
        let mut p = Program::new();
        assert!(p.delete(1).is_err());
    }
}
