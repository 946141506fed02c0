//! Object streams (`/Type /ObjStm`).
//!
//! An object stream packs several streamless objects head-to-tail inside a
//! single compressed stream. The decoded payload starts with N whitespace-
//! separated `(objectId, relativeOffset)` pairs; the first object's data
//! sits at `/First`. Children are bare values without `obj`/`endobj`
//! wrappers.

use crate::codec::EncodedStream;
use crate::error::{Error, Result};
use crate::object::{dict_of, Name, Object, Value};
use crate::parser;
use crate::serializer::Serializer;

/// Unpack an object-stream container into `(child id, value)` pairs.
pub fn unpack_object_stream(container: &Object) -> Result<Vec<(u32, Value)>> {
    let dict = container.dict().ok_or_else(|| {
        Error::Decode(format!("object stream {} has no dictionary", container.xref))
    })?;

    let n = dict
        .get(&Name::new("N"))
        .and_then(Value::as_integer)
        .ok_or_else(|| Error::Decode(format!("object stream {} missing /N", container.xref)))?;
    let first = dict
        .get(&Name::new("First"))
        .and_then(Value::as_integer)
        .ok_or_else(|| Error::Decode(format!("object stream {} missing /First", container.xref)))?;
    if n < 0 || first < 0 {
        return Err(Error::Decode(format!(
            "object stream {} has negative /N or /First",
            container.xref
        )));
    }
    let (n, first) = (n as usize, first as usize);

    let decoded = container.encoded_stream()?.decode()?;
    if decoded.len() < first {
        return Err(Error::Decode(format!(
            "object stream {} payload shorter than /First",
            container.xref
        )));
    }

    let pairs = parse_pairs(&decoded[..first], n)?;
    let body = &decoded[first..];

    let mut children = Vec::with_capacity(n);
    for (child_id, offset) in pairs {
        if offset >= body.len() {
            log::warn!(
                "object {} offset {} is beyond object stream payload ({} bytes)",
                child_id,
                offset,
                body.len()
            );
            continue;
        }
        match parser::parse_value_partial(&body[offset..]) {
            Ok((value, _)) => children.push((child_id, value)),
            Err(e) => {
                log::warn!(
                    "failed to parse object {} inside stream {}: {}",
                    child_id,
                    container.xref,
                    e
                );
            }
        }
    }
    Ok(children)
}

/// Parse the `(id, offset)` pair section preceding `/First`.
fn parse_pairs(data: &[u8], count: usize) -> Result<Vec<(u32, usize)>> {
    let text = String::from_utf8_lossy(data);
    let mut numbers = text.split_whitespace();
    let mut pairs = Vec::with_capacity(count);
    for i in 0..count {
        let id: u32 = numbers
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| Error::Decode(format!("object stream pair {} missing id", i)))?;
        let offset: usize = numbers
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| Error::Decode(format!("object stream pair {} missing offset", i)))?;
        pairs.push((id, offset));
    }
    Ok(pairs)
}

/// Builder collecting streamless objects into one container object.
#[derive(Debug)]
pub struct ObjStmContainer {
    id: u32,
    children: Vec<(u32, Value)>,
}

impl ObjStmContainer {
    /// Create an empty container that will be written under `id`.
    pub fn new(id: u32) -> Self {
        ObjStmContainer {
            id,
            children: Vec::new(),
        }
    }

    /// Container object id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Number of packed children.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Whether the container is empty.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Append a child; returns its index inside the container.
    pub fn add(&mut self, child_id: u32, content: Value) -> u32 {
        self.children.push((child_id, content));
        (self.children.len() - 1) as u32
    }

    /// Serialize the children and wrap them into the container object with
    /// a Flate-compressed payload.
    pub fn build(&self, serializer: &mut Serializer) -> Result<Object> {
        let mut header = String::new();
        let mut body = Vec::new();
        for (child_id, content) in &self.children {
            let serialized = serializer.serialize(content, 0);
            if !header.is_empty() {
                header.push(' ');
            }
            header.push_str(&format!("{} {}", child_id, body.len()));
            body.extend_from_slice(&serialized);
            body.push(b'\n');
        }
        header.push('\n');

        let mut payload = header.into_bytes();
        let first = payload.len();
        payload.extend_from_slice(&body);

        let encoded = EncodedStream::create(&payload, true, false, 1)?;
        let mut dict = dict_of(vec![
            ("Type", Value::Name(Name::new("ObjStm"))),
            ("N", Value::Integer(self.children.len() as i64)),
            ("First", Value::Integer(first as i64)),
        ]);
        encoded.update_dict(&mut dict);
        Ok(Object::with_stream(
            self.id,
            0,
            Value::Dictionary(dict),
            encoded.into_data(),
        ))
    }
}
