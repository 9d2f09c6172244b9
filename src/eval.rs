//! Recursive-descent evaluator for 64-bit signed integer expressions.
//!
//! Four precedence levels, tightest to loosest: factor, multiplicative,
//! additive, relational. Expressions never contain spaces; the factor
//! level is the one exception, where a single run of spaces is tolerated
//! immediately before a closing `)`.

use crate::error::{DiagError, DiagResult};
use crate::lexer;

/// Resolves a bare name to a value. Pseudo-variables are tried first; a
/// pseudo-variable handler receives the remaining cursor so that a future
/// pseudo-variable could consume parenthesised arguments without changing
/// this trait.
pub trait NameResolver {
    fn resolve_pseudo(
        &mut self,
        name: &str,
        text: &str,
        pos: &mut usize,
    ) -> DiagResult<Option<i64>>;

    fn resolve_user(&mut self, name: &str) -> Option<i64>;
}

/// Evaluate one expression starting at `pos`, advancing it past the last
/// consumed character.
pub fn eval(text: &str, pos: &mut usize, resolver: &mut dyn NameResolver) -> DiagResult<i64> {
    relational(text, pos, resolver)
}

fn relational(text: &str, pos: &mut usize, resolver: &mut dyn NameResolver) -> DiagResult<i64> {
    let lhs = additive(text, pos, resolver)?;
    match lexer::peek(text, *pos) {
        Some(b'>') => {
            *pos += 1;
            if lexer::peek(text, *pos) == Some(b'=') {
                *pos += 1;
                let rhs = additive(text, pos, resolver)?;
                Ok((lhs >= rhs) as i64)
            } else {
                let rhs = additive(text, pos, resolver)?;
                Ok((lhs > rhs) as i64)
            }
        }
        Some(b'<') => {
            *pos += 1;
            if lexer::peek(text, *pos) == Some(b'=') {
                *pos += 1;
                let rhs = additive(text, pos, resolver)?;
                Ok((lhs <= rhs) as i64)
            } else {
                let rhs = additive(text, pos, resolver)?;
                Ok((lhs < rhs) as i64)
            }
        }
        Some(b'=') => {
            *pos += 1;
            let rhs = additive(text, pos, resolver)?;
            Ok((lhs == rhs) as i64)
        }
        Some(b'!') => {
            // Lone '!' not followed by '=' is not an operator; do not
            // consume it at all (peek never advanced the cursor).
            if lexer::peek(text, *pos + 1) == Some(b'=') {
                *pos += 2;
                let rhs = additive(text, pos, resolver)?;
                Ok((lhs != rhs) as i64)
            } else {
                Ok(lhs)
            }
        }
        _ => Ok(lhs),
    }
}

fn additive(text: &str, pos: &mut usize, resolver: &mut dyn NameResolver) -> DiagResult<i64> {
    let mut acc = multiplicative(text, pos, resolver)?;
    loop {
        match lexer::peek(text, *pos) {
            Some(b'+') => {
                *pos += 1;
                let rhs = multiplicative(text, pos, resolver)?;
                acc = acc.wrapping_add(rhs);
            }
            Some(b'-') => {
                *pos += 1;
                let rhs = multiplicative(text, pos, resolver)?;
                acc = acc.wrapping_sub(rhs);
            }
            _ => return Ok(acc),
        }
    }
}

fn multiplicative(text: &str, pos: &mut usize, resolver: &mut dyn NameResolver) -> DiagResult<i64> {
    let mut acc = factor(text, pos, resolver)?;
    loop {
        match lexer::peek(text, *pos) {
            Some(b'*') => {
                *pos += 1;
                let rhs = factor(text, pos, resolver)?;
                acc = acc.wrapping_mul(rhs);
            }
            Some(b'/') => {
                *pos += 1;
                let rhs = factor(text, pos, resolver)?;
                if rhs == 0 {
                    return Err(DiagError::DivideByZero);
                }
                acc = acc.wrapping_div(rhs);
            }
            Some(b'%') => {
                *pos += 1;
                let rhs = factor(text, pos, resolver)?;
                if rhs == 0 {
                    return Err(DiagError::DivideByZero);
                }
                acc = acc.wrapping_rem(rhs);
            }
            _ => return Ok(acc),
        }
    }
}

fn factor(text: &str, pos: &mut usize, resolver: &mut dyn NameResolver) -> DiagResult<i64> {
    match lexer::peek(text, *pos) {
        Some(b'+') => {
            *pos += 1;
            factor(text, pos, resolver)
        }
        Some(b'-') => {
            *pos += 1;
            Ok(factor(text, pos, resolver)?.wrapping_neg())
        }
        Some(b'(') => {
            *pos += 1;
            let v = relational(text, pos, resolver)?;
            while lexer::peek(text, *pos) == Some(b' ') {
                *pos += 1;
            }
            if lexer::peek(text, *pos) != Some(b')') {
                return Err(DiagError::MissingParen);
            }
            *pos += 1;
            Ok(v)
        }
        _ => value(text, pos, resolver),
    }
}

fn value(text: &str, pos: &mut usize, resolver: &mut dyn NameResolver) -> DiagResult<i64> {
    let start = *pos;
    let word = lexer::word(text, pos);
    if word.is_empty() {
        return Err(DiagError::InvalidValue);
    }
    let first = word.as_bytes()[0];
    if first.is_ascii_alphabetic() {
        if let Some(v) = resolver.resolve_pseudo(&word, text, pos)? {
            return Ok(v);
        }
        resolver
            .resolve_user(&word)
            .ok_or(DiagError::UnknownName(word))
    } else if first.is_ascii_digit() {
        parse_int_literal(&word).ok_or_else(|| {
            *pos = start;
            DiagError::InvalidValue
        })
    } else {
        Err(DiagError::InvalidValue)
    }
}

/// Parse a C-style integer literal: `0x`/`0X` prefix for hex, a leading `0`
/// for octal, otherwise decimal. Wraps on overflow like the rest of the
/// evaluator (no arbitrary precision).
pub(crate) fn parse_int_literal(word: &str) -> Option<i64> {
    if let Some(hex) = word.strip_prefix("0x").or_else(|| word.strip_prefix("0X")) {
        if hex.is_empty() {
            return Some(0);
        }
        return u64::from_str_radix(hex, 16).ok().map(|v| v as i64);
    }
    if word.len() > 1 && word.as_bytes()[0] == b'0' {
        return u64::from_str_radix(&word[1..], 8).ok().map(|v| v as i64);
    }
    word.parse::<u64>().ok().map(|v| v as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoPseudo;
    impl NameResolver for NoPseudo {
        fn resolve_pseudo(&mut self, _: &str, _: &str, _: &mut usize) -> DiagResult<Option<i64>> {
            Ok(None)
        }
        fn resolve_user(&mut self, _: &str) -> Option<i64> {
            None
        }
    }

    fn eval_str(s: &str) -> i64 {
        let mut pos = 0;
        eval(s, &mut pos, &mut NoPseudo).unwrap()
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(eval_str("2+3*4"), 14);
        assert_eq!(eval_str("(2+3)*4"), 20);
        assert_eq!(eval_str("10-3-2"), 5);
        assert_eq!(eval_str("-5+2"), -3);
    }

    #[test]
    fn relational_is_not_chainable() {
        assert_eq!(eval_str("3<5"), 1);
        assert_eq!(eval_str("3>=5"), 0);
        assert_eq!(eval_str("3!=5"), 1);
        assert_eq!(eval_str("5=5"), 1);
    }

    #[test]
    fn hex_and_octal_literals() {
        assert_eq!(eval_str("0x10"), 16);
        assert_eq!(eval_str("010"), 8);
        assert_eq!(eval_str("10"), 10);
    }

    #[test]
    fn paren_tolerates_trailing_space_before_close() {
        let text = "(1+2 )";
        let mut pos = 0;
        assert_eq!(eval(text, &mut pos, &mut NoPseudo).unwrap(), 3);
        assert_eq!(pos, text.len());
    }

    #[test]
    fn divide_by_zero_errors() {
        let mut pos = 0;
        assert!(eval("1/0", &mut pos, &mut NoPseudo).is_err());
    }

    #[test]
    fn space_terminates_expression() {
        let text = "1 + 2";
        let mut pos = 0;
        assert_eq!(eval(text, &mut pos, &mut NoPseudo).unwrap(), 1);
        assert_eq!(pos, 1);
    }
}
