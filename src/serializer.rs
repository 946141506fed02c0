//! Value serialization with exact byte-offset tracking.
//!
//! Serializes a [`Value`] into bytes while maintaining a byte-offset cursor
//! and a name-to-offset map for marker placeholders, enabling
//! post-serialization patching of the emitted file.
//!
//! Formatting rules: canonical ASCII for null/booleans/integers; reals with
//! exactly three fractional digits (`.000` stripped for integer-valued
//! reals); byte strings as literals when no longer than the hex form,
//! otherwise hex; compact dictionaries on one line in insertion order,
//! pretty dictionaries one sorted entry per line.

use std::collections::HashMap;

use crate::object::{Marker, MarkerBody, Name, Value};

/// Bytes allowed unescaped inside literal strings.
fn is_string_printable(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
        || matches!(
            byte,
            b'!' | b'"' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b',' | b'-' | b'.'
                | b'/' | b':' | b';' | b'<' | b'=' | b'>' | b'?' | b'@' | b'[' | b']' | b'^'
                | b'_' | b'`' | b'{' | b'|' | b'}' | b'~' | b' '
        )
}

/// Bytes allowed unescaped inside names: the printable ASCII
/// alphanumerics. Everything else is emitted as `#hh`.
fn is_name_regular(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
}

/// Serializer with a byte-offset cursor and marker map.
#[derive(Debug, Default)]
pub struct Serializer {
    pretty: bool,
    /// Absolute offset of the next byte to be emitted. Settable by the
    /// writer after it emits non-serializer output such as raw streams.
    pub offset: usize,
    marks: HashMap<String, usize>,
}

impl Serializer {
    /// Create a serializer; `pretty` selects multi-line sorted
    /// dictionaries.
    pub fn new(pretty: bool) -> Self {
        Serializer {
            pretty,
            offset: 0,
            marks: HashMap::new(),
        }
    }

    /// Whether pretty output is selected.
    pub fn pretty(&self) -> bool {
        self.pretty
    }

    /// Byte offset recorded for a marker, if it was emitted.
    pub fn get_mark(&self, name: &str) -> Option<usize> {
        self.marks.get(name).copied()
    }

    /// All recorded marks.
    pub fn marks(&self) -> &HashMap<String, usize> {
        &self.marks
    }

    /// Serialize a value; `start_offset` is the absolute file offset the
    /// first emitted byte will land at, anchoring recorded marks.
    pub fn serialize(&mut self, value: &Value, start_offset: usize) -> Vec<u8> {
        self.offset = start_offset;
        let mut out = Vec::new();
        self.write_value(&mut out, value, 0);
        self.offset = start_offset + out.len();
        out
    }

    fn write_value(&mut self, out: &mut Vec<u8>, value: &Value, nesting: usize) {
        match value {
            Value::Null => out.extend_from_slice(b"null"),
            Value::Boolean(true) => out.extend_from_slice(b"true"),
            Value::Boolean(false) => out.extend_from_slice(b"false"),
            Value::Integer(int) => out.extend_from_slice(int.to_string().as_bytes()),
            Value::Real(real) => Self::write_real(out, *real),
            Value::String(bytes) => Self::write_bytes(out, bytes),
            Value::Name(name) => Self::write_name(out, name),
            Value::Reference(r) => {
                out.extend_from_slice(format!("{} {} R", r.id, r.gen).as_bytes())
            }
            Value::Array(items) => {
                out.push(b'[');
                for item in items {
                    out.push(b' ');
                    self.write_value(out, item, nesting + 1);
                }
                out.extend_from_slice(b" ]");
            }
            Value::Dictionary(dict) => {
                out.extend_from_slice(b"<<");
                out.extend_from_slice(if self.pretty { b"\n" } else { b" " });
                let entries: Vec<(&Name, &Value)> = if self.pretty {
                    let mut sorted: Vec<_> = dict.iter().collect();
                    sorted.sort_by_key(|(key, _)| key.as_str().to_string());
                    sorted
                } else {
                    dict.iter().collect()
                };
                for (key, entry) in entries {
                    if self.pretty {
                        out.extend_from_slice("    ".repeat(nesting + 1).as_bytes());
                    }
                    Self::write_name(out, key);
                    out.push(b' ');
                    self.write_value(out, entry, nesting + 1);
                    out.extend_from_slice(if self.pretty { b"\n" } else { b" " });
                }
                if self.pretty {
                    out.extend_from_slice("    ".repeat(nesting).as_bytes());
                }
                out.extend_from_slice(b">>");
            }
            Value::Marker(marker) => self.write_marker(out, marker, nesting),
        }
    }

    fn write_marker(&mut self, out: &mut Vec<u8>, marker: &Marker, nesting: usize) {
        self.marks.insert(marker.name.clone(), self.offset + out.len());
        match &marker.body {
            MarkerBody::Raw(raw) => out.extend_from_slice(raw),
            MarkerBody::Child(child) => self.write_value(out, child, nesting),
        }
    }

    fn write_real(out: &mut Vec<u8>, value: f64) {
        let formatted = format!("{:.3}", value);
        if let Some(stripped) = formatted.strip_suffix(".000") {
            out.extend_from_slice(stripped.as_bytes());
        } else {
            out.extend_from_slice(formatted.as_bytes());
        }
    }

    fn write_name(out: &mut Vec<u8>, name: &Name) {
        out.push(b'/');
        for byte in name.as_str().bytes() {
            if is_name_regular(byte) {
                out.push(byte);
            } else {
                out.extend_from_slice(format!("#{:02x}", byte).as_bytes());
            }
        }
    }

    /// Literal string bytes with escapes, including delimiters.
    fn literal_form(bytes: &[u8]) -> Vec<u8> {
        let mut literal = Vec::with_capacity(bytes.len() + 2);
        literal.push(b'(');
        for &byte in bytes {
            match byte {
                b'(' => literal.extend_from_slice(b"\\("),
                b')' => literal.extend_from_slice(b"\\)"),
                b'\\' => literal.extend_from_slice(b"\\\\"),
                _ if is_string_printable(byte) => literal.push(byte),
                _ => literal.extend_from_slice(format!("\\{:03o}", byte).as_bytes()),
            }
        }
        literal.push(b')');
        literal
    }

    fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
        let literal = Self::literal_form(bytes);
        let hex_len = 2 + 2 * bytes.len();
        if literal.len() <= hex_len {
            out.extend_from_slice(&literal);
        } else {
            out.push(b'<');
            for byte in bytes {
                out.extend_from_slice(format!("{:02x}", byte).as_bytes());
            }
            out.push(b'>');
        }
    }
}
