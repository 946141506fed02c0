//! Content-stream parser.
//!
//! Tokenizes a page description into an ordered sequence of
//! [`ContentOp`] records. Operands are ordinary PDF values (content
//! streams contain no indirect references); operators come from the closed
//! alphabet in [`super::operators`]. Unknown operators are tolerated and
//! skipped with a warning; malformed operands report line and column.

use crate::content::operators::{operator_arities, ContentOp};
use crate::error::Result;
use crate::object::Value;
use crate::parser;

/// Parse a decoded content stream into operator records.
pub fn parse_content_stream(data: &[u8]) -> Result<Vec<ContentOp>> {
    let mut ops = Vec::new();
    let mut operands: Vec<Value> = Vec::new();
    let mut rest = data;

    loop {
        rest = skip_whitespace_and_comments(rest);
        if rest.is_empty() {
            break;
        }

        if starts_operand(rest[0]) {
            let (value, remaining) = parser::parse_value_partial(rest)
                .map_err(|_| parser::syntax_error(data, rest))?;
            operands.push(value);
            rest = remaining;
            continue;
        }

        let (token, remaining) = read_operator_token(rest);
        if token.is_empty() {
            // Not an operand start and not an operator character.
            return Err(parser::syntax_error(data, rest));
        }
        rest = remaining;

        match token {
            // Keyword operands share the operator character set.
            "true" => operands.push(Value::Boolean(true)),
            "false" => operands.push(Value::Boolean(false)),
            "null" => operands.push(Value::Null),
            // Inline images carry raw binary data; skip through EI.
            "BI" => {
                ops.push(ContentOp::new("BI", std::mem::take(&mut operands)));
                rest = skip_inline_image(rest);
            }
            _ => match operator_arities(token) {
                Some(arities) => {
                    if !arities.contains(&operands.len()) {
                        log::warn!(
                            "operator {} given {} operands (accepts {:?})",
                            token,
                            operands.len(),
                            arities
                        );
                    }
                    ops.push(ContentOp::new(token, std::mem::take(&mut operands)));
                }
                None => {
                    log::warn!("ignoring unknown content operator {:?}", token);
                    operands.clear();
                }
            },
        }
    }

    if !operands.is_empty() {
        log::warn!("{} trailing operands without an operator", operands.len());
    }
    Ok(ops)
}

fn skip_whitespace_and_comments(mut data: &[u8]) -> &[u8] {
    loop {
        let start = data.len();
        while data
            .first()
            .is_some_and(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C))
        {
            data = &data[1..];
        }
        if data.first() == Some(&b'%') {
            while data.first().is_some_and(|b| !matches!(b, b'\r' | b'\n')) {
                data = &data[1..];
            }
        }
        if data.len() == start {
            return data;
        }
    }
}

fn starts_operand(byte: u8) -> bool {
    byte.is_ascii_digit()
        || matches!(byte, b'+' | b'-' | b'.' | b'(' | b'<' | b'[' | b'/')
}

/// Read an operator token: letters, digits, `*`, `'` and `"`.
fn read_operator_token(data: &[u8]) -> (&str, &[u8]) {
    let end = data
        .iter()
        .position(|b| {
            !(b.is_ascii_alphanumeric() || matches!(b, b'*' | b'\'' | b'"'))
        })
        .unwrap_or(data.len());
    (
        std::str::from_utf8(&data[..end]).unwrap_or(""),
        &data[end..],
    )
}

/// Skip the binary payload of an inline image up to and including `EI`.
fn skip_inline_image(data: &[u8]) -> &[u8] {
    let mut i = 0;
    while i + 1 < data.len() {
        if data[i] == b'E'
            && data[i + 1] == b'I'
            && (i == 0 || data[i - 1].is_ascii_whitespace())
            && data
                .get(i + 2)
                .map_or(true, |b| b.is_ascii_whitespace())
        {
            return &data[i + 2..];
        }
        i += 1;
    }
    &[]
}
