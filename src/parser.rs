//! PDF object-syntax parser.
//!
//! Consumes a single self-contained textual value and yields a [`Value`].
//! The grammar covers dictionaries, arrays, names (with `#hh` escapes),
//! numbers, booleans, null, hex strings, literal strings (balanced nested
//! parentheses, character and octal escapes) and indirect references
//! (`N G R`). Failures report the line and column of the first unexpected
//! token.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_while, take_while1},
    character::complete::{char, digit1, one_of},
    combinator::{map, opt, value as nom_value},
    sequence::{delimited, preceded},
    IResult,
};

use crate::error::{Error, Result};
use crate::object::{Dict, Name, ObjRef, Value};

/// Parse a complete value from the input, tolerating surrounding
/// whitespace and comments.
pub fn parse_value(input: &[u8]) -> Result<Value> {
    let (parsed, rest) = parse_value_partial(input)?;
    let (rest, _) = skip_ws(rest).unwrap_or((rest, rest));
    if !rest.is_empty() {
        return Err(syntax_error(input, rest));
    }
    Ok(parsed)
}

/// Parse a single value, leaving trailing input untouched.
pub fn parse_value_partial(input: &[u8]) -> Result<(Value, &[u8])> {
    match value(input) {
        Ok((rest, parsed)) => Ok((parsed, rest)),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            Err(syntax_error(input, e.input))
        }
        Err(nom::Err::Incomplete(_)) => Err(syntax_error(input, &[])),
    }
}

/// Build a `Syntax` error locating `remaining` inside `full`.
pub(crate) fn syntax_error(full: &[u8], remaining: &[u8]) -> Error {
    let consumed = full.len() - remaining.len().min(full.len());
    let mut line = 1;
    let mut column = 1;
    for &byte in &full[..consumed] {
        if byte == b'\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    let found: Vec<u8> = remaining
        .iter()
        .copied()
        .take_while(|b| !b.is_ascii_whitespace())
        .take(16)
        .collect();
    let found = if found.is_empty() {
        "end of input".to_string()
    } else {
        format!("'{}'", String::from_utf8_lossy(&found))
    };
    Error::Syntax {
        line,
        column,
        found,
    }
}

/// Parse any PDF value (nom combinator).
pub(crate) fn value(input: &[u8]) -> IResult<&[u8], Value> {
    let (input, _) = skip_ws(input)?;
    alt((
        reference,
        dictionary,
        array,
        name_value,
        keyword,
        number,
        hex_string,
        literal_string,
    ))(input)
}

/// Skip PDF whitespace and `%` comments.
fn skip_ws(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let mut remaining = input;
    loop {
        let before = remaining;
        let (rest, _) =
            take_while(|c| matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C))(remaining)?;
        remaining = rest;
        if let Ok((rest, _)) = comment(remaining) {
            remaining = rest;
        }
        if remaining == before {
            break;
        }
    }
    Ok((remaining, input))
}

fn comment(input: &[u8]) -> IResult<&[u8], ()> {
    nom_value((), preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n')))(input)
}

fn is_pdf_delimiter(c: u8) -> bool {
    matches!(
        c,
        b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C
            | b'/' | b'%' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}'
    )
}

/// `N G R` indirect reference. Tried before plain numbers; backtracks on
/// anything else.
fn reference(input: &[u8]) -> IResult<&[u8], Value> {
    let (rest, id) = digit1(input)?;
    let (rest, _) = take_while1(|c| matches!(c, b' ' | b'\t' | b'\r' | b'\n'))(rest)?;
    let (rest, gen) = digit1(rest)?;
    let (rest, _) = take_while1(|c| matches!(c, b' ' | b'\t' | b'\r' | b'\n'))(rest)?;
    let (rest, _) = char('R')(rest)?;
    // R must be a standalone token
    if rest.first().is_some_and(|&c| !is_pdf_delimiter(c)) {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        )));
    }
    let id: u32 = std::str::from_utf8(id)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit)))?;
    let gen: u16 = std::str::from_utf8(gen)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit)))?;
    Ok((rest, Value::Reference(ObjRef::new(id, gen))))
}

/// Integer or real number. Integers overflowing 64 bits fall back to reals.
fn number(input: &[u8]) -> IResult<&[u8], Value> {
    let (rest, sign) = opt(one_of("+-"))(input)?;
    let (rest, int_part) = opt(digit1)(rest)?;
    let (rest, frac_part) = opt(preceded(char('.'), opt(digit1)))(rest)?;

    if int_part.is_none() && frac_part.is_none() {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Digit,
        )));
    }

    let mut text = String::new();
    if sign == Some('-') {
        text.push('-');
    }
    text.push_str(
        int_part
            .map(|b| std::str::from_utf8(b).unwrap_or("0"))
            .unwrap_or("0"),
    );

    if let Some(frac) = frac_part {
        text.push('.');
        text.push_str(
            frac.map(|b| std::str::from_utf8(b).unwrap_or("0"))
                .unwrap_or("0"),
        );
        let real: f64 = text.parse().map_err(|_| {
            nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit))
        })?;
        Ok((rest, Value::Real(real)))
    } else {
        match text.parse::<i64>() {
            Ok(int) => Ok((rest, Value::Integer(int))),
            // Out of 64-bit range: keep the magnitude as a real.
            Err(_) => {
                let real: f64 = text.parse().map_err(|_| {
                    nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit))
                })?;
                Ok((rest, Value::Real(real)))
            }
        }
    }
}

fn keyword(input: &[u8]) -> IResult<&[u8], Value> {
    alt((
        nom_value(Value::Boolean(true), tag(b"true")),
        nom_value(Value::Boolean(false), tag(b"false")),
        nom_value(Value::Null, tag(b"null")),
    ))(input)
}

/// Decode `#hh` escape sequences in a raw name token.
pub fn decode_name_escapes(raw: &[u8]) -> String {
    let mut result = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'#' && i + 2 < raw.len() {
            let hex = std::str::from_utf8(&raw[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                result.push(byte);
                i += 3;
                continue;
            }
        }
        // Invalid escapes are kept literally.
        result.push(raw[i]);
        i += 1;
    }
    String::from_utf8_lossy(&result).into_owned()
}

fn name_token(input: &[u8]) -> IResult<&[u8], Name> {
    preceded(
        char('/'),
        map(take_while(|c: u8| !is_pdf_delimiter(c)), |raw| {
            Name::new(decode_name_escapes(raw))
        }),
    )(input)
}

fn name_value(input: &[u8]) -> IResult<&[u8], Value> {
    map(name_token, Value::Name)(input)
}

fn dictionary(input: &[u8]) -> IResult<&[u8], Value> {
    let (mut rest, _) = tag(b"<<")(input)?;
    let mut dict = Dict::new();
    loop {
        let (r, _) = skip_ws(rest)?;
        rest = r;
        if let Ok((r, _)) = tag::<_, _, nom::error::Error<&[u8]>>(b">>")(rest) {
            return Ok((r, Value::Dictionary(dict)));
        }
        let (r, key) = name_token(rest)?;
        let (r, entry) = value(r)?;
        dict.insert(key, entry);
        rest = r;
    }
}

fn array(input: &[u8]) -> IResult<&[u8], Value> {
    let (mut rest, _) = char('[')(input)?;
    let mut items = Vec::new();
    loop {
        let (r, _) = skip_ws(rest)?;
        rest = r;
        if let Ok((r, _)) = char::<_, nom::error::Error<&[u8]>>(']')(rest) {
            return Ok((r, Value::Array(items)));
        }
        let (r, item) = value(rest)?;
        items.push(item);
        rest = r;
    }
}

/// Hex string: embedded whitespace allowed, odd length implies a trailing
/// zero nibble.
fn hex_string(input: &[u8]) -> IResult<&[u8], Value> {
    if input.starts_with(b"<<") {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        )));
    }
    let (rest, digits) = delimited(
        char('<'),
        take_while(|c: u8| c.is_ascii_hexdigit() || c.is_ascii_whitespace()),
        char('>'),
    )(input)?;

    let mut nibbles: Vec<u8> = digits
        .iter()
        .filter(|c| c.is_ascii_hexdigit())
        .map(|&c| match c {
            b'0'..=b'9' => c - b'0',
            b'a'..=b'f' => c - b'a' + 10,
            _ => c - b'A' + 10,
        })
        .collect();
    if !nibbles.len().is_multiple_of(2) {
        nibbles.push(0);
    }
    let bytes = nibbles.chunks(2).map(|pair| (pair[0] << 4) | pair[1]).collect();
    Ok((rest, Value::String(bytes)))
}

/// Literal string with balanced nested parentheses and escape decoding.
fn literal_string(input: &[u8]) -> IResult<&[u8], Value> {
    let (rest, _) = char('(')(input)?;
    let mut out = Vec::new();
    let mut depth = 1usize;
    let mut i = 0;

    while i < rest.len() {
        match rest[i] {
            b'\\' => {
                i += 1;
                if i >= rest.len() {
                    break;
                }
                match rest[i] {
                    b'n' => out.push(b'\n'),
                    b'r' => out.push(b'\r'),
                    b't' => out.push(b'\t'),
                    b'b' => out.push(0x08),
                    b'f' => out.push(0x0C),
                    b'(' => out.push(b'('),
                    b')' => out.push(b')'),
                    b'\\' => out.push(b'\\'),
                    b'0'..=b'7' => {
                        let mut code = 0u16;
                        let mut digits = 0;
                        while digits < 3 && i < rest.len() && (b'0'..=b'7').contains(&rest[i]) {
                            code = code * 8 + (rest[i] - b'0') as u16;
                            digits += 1;
                            i += 1;
                        }
                        out.push((code & 0xFF) as u8);
                        continue;
                    }
                    // Line continuation: backslash before EOL is dropped.
                    b'\n' => {}
                    b'\r' => {
                        if rest.get(i + 1) == Some(&b'\n') {
                            i += 1;
                        }
                    }
                    other => out.push(other),
                }
                i += 1;
            }
            b'(' => {
                depth += 1;
                out.push(b'(');
                i += 1;
            }
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&rest[i + 1..], Value::String(out)));
                }
                out.push(b')');
                i += 1;
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }

    // Unbalanced parentheses
    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Tag,
    )))
}
