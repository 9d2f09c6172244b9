//! Word and token reading over a command line.
//!
//! All functions take the line text and an in-out byte cursor, mirroring
//! the original `char **line` convention without raw pointers. Input is
//! assumed to be ASCII (see crate-level Non-goals), so byte offsets double
//! as character offsets.

use crate::error::{DiagError, DiagResult};

/// Advance `pos` past any run of space/tab characters.
pub fn skip_spaces(text: &str, pos: &mut usize) {
    let bytes = text.as_bytes();
    while *pos < bytes.len() && (bytes[*pos] == b' ' || bytes[*pos] == b'\t') {
        *pos += 1;
    }
}

/// The byte at `pos`, or `None` past the end of the line.
pub fn peek(text: &str, pos: usize) -> Option<u8> {
    text.as_bytes().get(pos).copied()
}

pub fn at_end(text: &str, pos: usize) -> bool {
    pos >= text.len()
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'?' || b == b'.'
}

/// Skip leading spaces, then consume the maximal run of word bytes.
/// Returns the empty string if the cursor sits on a non-word byte.
pub fn word(text: &str, pos: &mut usize) -> String {
    skip_spaces(text, pos);
    let bytes = text.as_bytes();
    let start = *pos;
    while *pos < bytes.len() && is_word_byte(bytes[*pos]) {
        *pos += 1;
    }
    text[start..*pos].to_string()
}

/// Read a double-quoted format string starting at `pos` (which must sit on
/// the opening `"`). A backslash escapes the following character verbatim;
/// no other escape translation is performed. Advances `pos` past the
/// closing quote.
pub fn quoted_string(text: &str, pos: &mut usize) -> DiagResult<String> {
    let bytes = text.as_bytes();
    debug_assert_eq!(bytes.get(*pos), Some(&b'"'));
    *pos += 1;
    let mut out = String::new();
    loop {
        match bytes.get(*pos) {
            None => return Err(DiagError::UnterminatedString),
            Some(b'"') => {
                *pos += 1;
                return Ok(out);
            }
            Some(b'\\') => {
                *pos += 1;
                match bytes.get(*pos) {
                    None => return Err(DiagError::UnterminatedString),
                    Some(&c) => {
                        out.push(c as char);
                        *pos += 1;
                    }
                }
            }
            Some(&c) => {
                out.push(c as char);
                *pos += 1;
            }
        }
    }
}

/// True if, after skipping spaces, the cursor sits on a `"`.
pub fn at_quote(text: &str, pos: usize) -> bool {
    let mut p = pos;
    skip_spaces(text, &mut p);
    peek(text, p) == Some(b'"')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_skips_leading_spaces() {
        let text = "   hello world";
        let mut pos = 0;
        assert_eq!(word(text, &mut pos), "hello");
        assert_eq!(word(text, &mut pos), "world");
    }

    #[test]
    fn word_stops_at_punctuation() {
        let text = "foo;bar";
        let mut pos = 0;
        assert_eq!(word(text, &mut pos), "foo");
        assert_eq!(peek(text, pos), Some(b';'));
    }

    #[test]
    fn quoted_string_handles_escapes() {
        let text = r#""a\"b\\c" rest"#;
        let mut pos = 0;
        let s = quoted_string(text, &mut pos).unwrap();
        assert_eq!(s, "a\"b\\c");
        skip_spaces(text, &mut pos);
        assert_eq!(word(text, &mut pos), "rest");
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        let text = r#""no closing quote"#;
        let mut pos = 0;
        assert!(quoted_string(text, &mut pos).is_err());
    }
}
