//! Parser primitives over a character slice.
//!
//! Every primitive takes the full input and a starting offset, and returns
//! the parsed value with the offset just past it. Failures are
//! [`ParseError`]s at the offset where the input stopped matching.

use crate::value::Value;

use super::error::{PResult, ParseError};

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

pub(crate) fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Skip whitespace and `#` comments. Never fails.
pub fn discard_whitespace_and_comments(input: &[char], mut pos: usize) -> usize {
    while let Some(&c) = input.get(pos) {
        if c.is_whitespace() {
            pos += 1;
        } else if c == '#' {
            while input.get(pos).is_some_and(|c| *c != '\n') {
                pos += 1;
            }
        } else {
            break;
        }
    }
    pos
}

/// Whether `input` holds `c` at `pos`
pub fn peek(input: &[char], pos: usize, c: char) -> bool {
    input.get(pos) == Some(&c)
}

/// A single expected character.
pub fn char_lit(input: &[char], pos: usize, c: char) -> PResult<()> {
    if peek(input, pos, c) {
        Ok(((), pos + 1))
    } else {
        Err(ParseError::recoverable(pos, format!("expected {}", c)))
    }
}

/// An exact sequence of characters; returns the offset past it.
pub fn tag(input: &[char], pos: usize, word: &str) -> Option<usize> {
    let mut end = pos;
    for expected in word.chars() {
        if input.get(end) != Some(&expected) {
            return None;
        }
        end += 1;
    }
    Some(end)
}

/// A word that must not run on into an identifier, e.g. `null` but not
/// `nullable`.
pub fn keyword(input: &[char], pos: usize, word: &str) -> Option<usize> {
    let end = tag(input, pos, word)?;
    match input.get(end) {
        Some(c) if is_ident_char(*c) => None,
        _ => Some(end),
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn identifier(input: &[char], pos: usize) -> PResult<String> {
    match input.get(pos) {
        Some(c) if is_ident_start(*c) => {}
        _ => return Err(ParseError::recoverable(pos, "expected identifier")),
    }
    let end = input[pos..]
        .iter()
        .position(|c| !is_ident_char(*c))
        .map_or(input.len(), |n| pos + n);
    Ok((input[pos..end].iter().collect(), end))
}

/// A field name after a `.`: an identifier, a run of digits (array index),
/// or a quoted string.
pub fn path_segment(input: &[char], pos: usize) -> PResult<String> {
    match input.get(pos) {
        Some('"') => quoted_string(input, pos),
        Some(c) if c.is_ascii_digit() => {
            let end = input[pos..]
                .iter()
                .position(|c| !c.is_ascii_digit())
                .map_or(input.len(), |n| pos + n);
            Ok((input[pos..end].iter().collect(), end))
        }
        _ => identifier(input, pos).map_err(|_| ParseError::recoverable(pos, "expected field name")),
    }
}

/// A double quoted string with JSON style escapes.
///
/// Once the opening quote is consumed the string is committed: running out
/// of input is a required failure at the end of the input.
pub fn quoted_string(input: &[char], pos: usize) -> PResult<String> {
    if !peek(input, pos, '"') {
        return Err(ParseError::recoverable(pos, "expected quoted string"));
    }
    let mut out = String::new();
    let mut i = pos + 1;
    loop {
        match input.get(i) {
            None => return Err(ParseError::required(input.len(), "expected end quote")),
            Some('"') => return Ok((out, i + 1)),
            Some('\\') => {
                let escaped = match input.get(i + 1) {
                    None => return Err(ParseError::required(input.len(), "expected end quote")),
                    Some('n') => '\n',
                    Some('t') => '\t',
                    Some('r') => '\r',
                    Some('b') => '\u{8}',
                    Some('f') => '\u{c}',
                    Some('u') => {
                        let (c, end) = unicode_escape(input, i + 2)?;
                        out.push(c);
                        i = end;
                        continue;
                    }
                    Some(c @ ('"' | '\\' | '/')) => *c,
                    Some(_) => return Err(ParseError::required(i, "invalid escape sequence")),
                };
                out.push(escaped);
                i += 2;
            }
            Some(c) => {
                out.push(*c);
                i += 1;
            }
        }
    }
}

/// The four hex digits of a `\u` escape starting at `pos`. A high surrogate
/// must be followed by a `\u` escaped low surrogate, the pair encoding a
/// single character.
fn unicode_escape(input: &[char], pos: usize) -> PResult<char> {
    let invalid = || ParseError::required(pos, "invalid unicode escape");
    let unit = hex4(input, pos).ok_or_else(invalid)?;
    let (code, end) = match unit {
        0xD800..=0xDBFF => {
            let low = tag(input, pos + 4, "\\u")
                .and_then(|after| hex4(input, after))
                .filter(|low| (0xDC00..=0xDFFF).contains(low))
                .ok_or_else(invalid)?;
            (0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00), pos + 10)
        }
        _ => (unit, pos + 4),
    };
    char::from_u32(code)
        .map(|c| (c, end))
        .ok_or_else(invalid)
}

fn hex4(input: &[char], pos: usize) -> Option<u32> {
    input
        .get(pos..pos + 4)?
        .iter()
        .try_fold(0, |acc, c| Some(acc * 16 + c.to_digit(16)?))
}

/// `-?digits[.digits][(e|E)[+-]digits]`, an integer unless it has a fraction
/// or exponent.
pub fn number(input: &[char], pos: usize) -> PResult<Value> {
    let digits_from = |start: usize| {
        input[start.min(input.len())..]
            .iter()
            .take_while(|c| c.is_ascii_digit())
            .count()
    };

    let mut end = pos;
    if peek(input, end, '-') {
        end += 1;
    }
    let whole = digits_from(end);
    if whole == 0 {
        return Err(ParseError::recoverable(pos, "expected number"));
    }
    end += whole;

    let mut is_float = false;
    if peek(input, end, '.') {
        let frac = digits_from(end + 1);
        if frac > 0 {
            end += 1 + frac;
            is_float = true;
        }
    }
    if matches!(input.get(end), Some('e' | 'E')) {
        let mut exp_start = end + 1;
        if matches!(input.get(exp_start), Some('+' | '-')) {
            exp_start += 1;
        }
        let exp = digits_from(exp_start);
        if exp > 0 {
            end = exp_start + exp;
            is_float = true;
        }
    }

    let text: String = input[pos..end].iter().collect();
    if !is_float && let Ok(n) = text.parse::<i64>() {
        return Ok((Value::Int(n), end));
    }
    text.parse::<f64>()
        .map(|n| (Value::Float(n), end))
        .map_err(|_| ParseError::recoverable(pos, "expected number"))
}

/// Try each parser in turn and return the first success.
///
/// If every branch fails recoverably, the failure that got furthest into the
/// input is returned; on a tie the earliest branch wins. A required or fatal
/// failure ends the alternation immediately.
pub fn alternative<T>(pos: usize, parsers: &[&dyn Fn(usize) -> PResult<T>]) -> PResult<T> {
    let mut deepest: Option<ParseError> = None;
    for parser in parsers {
        match parser(pos) {
            Ok(res) => return Ok(res),
            Err(err) if !err.is_recoverable() => return Err(err),
            Err(err) => {
                if deepest.as_ref().is_none_or(|d| err.offset > d.offset) {
                    deepest = Some(err);
                }
            }
        }
    }
    Err(deepest.unwrap_or_else(|| ParseError::recoverable(pos, "expected query")))
}

/// Turn a recoverable failure into `None`, leaving the offset untouched.
pub fn optional<T>(pos: usize, res: PResult<T>) -> PResult<Option<T>> {
    match res {
        Ok((value, end)) => Ok((Some(value), end)),
        Err(err) if err.is_recoverable() => Ok((None, pos)),
        Err(err) => Err(err),
    }
}

/// How a delimited list reports its failures.
pub struct ListSyntax<'a> {
    pub open: char,
    pub close: char,
    /// Message for a missing separator or terminator
    pub unterminated: &'a str,
    /// Replacement message for an item that failed recoverably, or `None`
    /// to keep the item's own message
    pub item: Option<&'a str>,
}

/// `open [item {, item} [,]] close`, with whitespace and comments allowed
/// around every element.
///
/// Only the opening character is optional: once it is consumed every
/// failure is required.
pub fn delimited_list<T>(
    input: &[char],
    pos: usize,
    syntax: &ListSyntax<'_>,
    item: impl Fn(usize) -> PResult<T>,
) -> PResult<Vec<T>> {
    let ((), mut pos) = char_lit(input, pos, syntax.open)?;
    let mut items = Vec::new();

    pos = discard_whitespace_and_comments(input, pos);
    if peek(input, pos, syntax.close) {
        return Ok((items, pos + 1));
    }

    loop {
        let (value, end) = item(pos).map_err(|err| match syntax.item {
            Some(message) => err.expecting(message),
            None => err.into_required(),
        })?;
        items.push(value);

        pos = discard_whitespace_and_comments(input, end);
        if peek(input, pos, ',') {
            pos = discard_whitespace_and_comments(input, pos + 1);
            if peek(input, pos, syntax.close) {
                return Ok((items, pos + 1));
            }
        } else if peek(input, pos, syntax.close) {
            return Ok((items, pos + 1));
        } else {
            return Err(ParseError::required(pos, syntax.unterminated));
        }
    }
}
