//! Minimal C-style formatted print for 64-bit integers.
//!
//! `print`/`printn` accept an optional leading quoted format string,
//! followed by zero or more expressions. With no format, each expression
//! prints as `%lld ` (decimal, space-separated). With a format, `%`
//! specifiers of the form `%[w[.p]]c` (`c` in `d`, `x`, `o`) are filled in
//! order; an unrecognised `c` falls back to plain decimal.

use crate::error::DiagResult;
use crate::eval::{self, NameResolver};
use crate::lexer;

/// Build the text `print`/`printn` would emit for one command invocation.
/// The caller appends a trailing newline for `print` and not for `printn`.
pub fn render(text: &str, pos: &mut usize, resolver: &mut dyn NameResolver) -> DiagResult<String> {
    lexer::skip_spaces(text, pos);
    let fmt = if lexer::at_quote(text, *pos) {
        lexer::skip_spaces(text, pos);
        lexer::quoted_string(text, pos)?
    } else {
        String::new()
    };
    let fmt_bytes = fmt.as_bytes();
    let mut fi = 0usize;
    let mut out = String::new();

    loop {
        while fi < fmt_bytes.len() && fmt_bytes[fi] != b'%' {
            out.push(fmt_bytes[fi] as char);
            fi += 1;
        }

        lexer::skip_spaces(text, pos);
        let mut value = 0i64;
        let mut have_value = false;
        if !lexer::at_end(text, *pos) && lexer::peek(text, *pos) != Some(b';') {
            value = eval::eval(text, pos, resolver)?;
            have_value = true;
        }

        if fi < fmt_bytes.len() && fmt_bytes[fi] == b'%' {
            fi += 1;
            let (width, precision, conv) = parse_spec(fmt_bytes, &mut fi);
            out.push_str(&format_conversion(value, conv, width, precision));
        } else if have_value {
            out.push_str(&format!("{} ", value));
        }

        lexer::skip_spaces(text, pos);
        if lexer::at_end(text, *pos) || lexer::peek(text, *pos) == Some(b';') {
            break;
        }
    }

    Ok(out)
}

fn parse_spec(fmt: &[u8], fi: &mut usize) -> (usize, usize, u8) {
    let mut width = 1usize;
    let mut precision = 1usize;
    if *fi < fmt.len() && fmt[*fi].is_ascii_digit() {
        width = 0;
        while *fi < fmt.len() && fmt[*fi].is_ascii_digit() {
            width = width * 10 + (fmt[*fi] - b'0') as usize;
            *fi += 1;
        }
    }
    if *fi < fmt.len() && fmt[*fi] == b'.' {
        *fi += 1;
        if *fi < fmt.len() && fmt[*fi].is_ascii_digit() {
            precision = 0;
            while *fi < fmt.len() && fmt[*fi].is_ascii_digit() {
                precision = precision * 10 + (fmt[*fi] - b'0') as usize;
                *fi += 1;
            }
        }
    }
    let conv = fmt.get(*fi).copied().unwrap_or(b'd');
    if matches!(conv, b'd' | b'x' | b'o') {
        *fi += 1;
    }
    (width, precision, conv)
}

fn format_conversion(value: i64, conv: u8, width: usize, precision: usize) -> String {
    // An unrecognised conversion character gets no width/precision treatment
    // at all, just a bare decimal print, matching the original's `default:`
    // arm falling straight to `printf("%lld", v)`.
    if !matches!(conv, b'd' | b'x' | b'o') {
        return format!("{}", value);
    }
    let body = match conv {
        b'x' => format!("{:0>width$x}", value as u64, width = precision),
        b'o' => format!("{:0>width$o}", value as u64, width = precision),
        _ => {
            let sign = if value < 0 { "-" } else { "" };
            let mag = value.unsigned_abs();
            format!("{}{:0>width$}", sign, mag, width = precision)
        }
    };
    if body.len() < width {
        format!("{:>width$}", body, width = width)
    } else {
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoPseudo;
    impl NameResolver for NoPseudo {
        fn resolve_pseudo(&mut self, _: &str, _: &str, _: &mut usize) -> DiagResult<Option<i64>> {
            Ok(None)
        }
        fn resolve_user(&mut self, name: &str) -> Option<i64> {
            match name {
                "x" => Some(5),
                "y" => Some(7),
                _ => None,
            }
        }
    }

    #[test]
    fn format_string_with_expression() {
        let text = r#""%d\n" x+y*2"#;
        let mut pos = 0;
        let out = render(text, &mut pos, &mut NoPseudo).unwrap();
        assert_eq!(out, "19\n");
    }

    #[test]
    fn no_format_defaults_to_decimal_space_separated() {
        let text = "x y";
        let mut pos = 0;
        let out = render(text, &mut pos, &mut NoPseudo).unwrap();
        assert_eq!(out, "5 7 ");
    }

    #[test]
    fn hex_conversion_with_precision() {
        let text = r#""%.8x" x"#;
        let mut pos = 0;
        let out = render(text, &mut pos, &mut NoPseudo).unwrap();
        assert_eq!(out, "00000005");
    }
}
