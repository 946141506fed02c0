//! PDF object types.
//!
//! The value model is a tagged sum type with structural equality and two
//! deep walks: an immutable walk used to collect indirect references, and a
//! rebuilding walk that returns a structurally identical value with selected
//! references replaced.

use indexmap::IndexMap;

use crate::codec::EncodedStream;
use crate::error::{Error, Result};

/// Reference to an indirect object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjRef {
    /// Object number
    pub id: u32,
    /// Generation number
    pub gen: u16,
}

impl ObjRef {
    /// Create a new object reference.
    pub fn new(id: u32, gen: u16) -> Self {
        Self { id, gen }
    }
}

impl std::fmt::Display for ObjRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

/// A PDF name.
///
/// Stored in decoded form (no leading slash, `#xx` escapes resolved).
/// Equality compares the decoded byte sequence; escaping is a concern of the
/// serializer only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(pub String);

impl Name {
    /// Create a name from its decoded form.
    pub fn new(s: impl Into<String>) -> Self {
        Name(s.into())
    }

    /// The decoded name text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}", self.0)
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name(s.to_string())
    }
}

/// Dictionary type preserving insertion order.
///
/// Compact serialization iterates in insertion order; pretty serialization
/// sorts keys. Both are deterministic.
pub type Dict = IndexMap<Name, Value>;

/// Body of a marker placeholder: either literal bytes emitted verbatim, or a
/// child value serialized in place.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkerBody {
    /// Raw bytes emitted exactly as given
    Raw(Vec<u8>),
    /// A child value serialized recursively
    Child(Box<Value>),
}

/// A serializer placeholder whose emitted byte offset is recorded under a
/// label, enabling post-serialization patching.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    /// Label under which the emitted offset is recorded
    pub name: String,
    /// Placeholder payload
    pub body: MarkerBody,
}

impl Marker {
    /// Marker emitting literal raw bytes.
    pub fn raw(name: impl Into<String>, raw: impl Into<Vec<u8>>) -> Self {
        Marker {
            name: name.into(),
            body: MarkerBody::Raw(raw.into()),
        }
    }

    /// Marker serializing a child value.
    pub fn child(name: impl Into<String>, child: Value) -> Self {
        Marker {
            name: name.into(),
            body: MarkerBody::Child(Box::new(child)),
        }
    }
}

/// PDF value representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null object
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Real (floating-point) value
    Real(f64),
    /// String (byte array)
    String(Vec<u8>),
    /// Name (starting with /)
    Name(Name),
    /// Array of values
    Array(Vec<Value>),
    /// Dictionary (insertion-ordered key-value pairs)
    Dictionary(Dict),
    /// Indirect object reference
    Reference(ObjRef),
    /// Serializer placeholder with a recorded offset
    Marker(Marker),
}

impl Value {
    /// Get the type name of this value (without data).
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Boolean(_) => "Boolean",
            Value::Integer(_) => "Integer",
            Value::Real(_) => "Real",
            Value::String(_) => "String",
            Value::Name(_) => "Name",
            Value::Array(_) => "Array",
            Value::Dictionary(_) => "Dictionary",
            Value::Reference(_) => "Reference",
            Value::Marker(_) => "Marker",
        }
    }

    /// Try to cast to integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to cast to real, accepting integers.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to name.
    pub fn as_name(&self) -> Option<&Name> {
        match self {
            Value::Name(n) => Some(n),
            _ => None,
        }
    }

    /// Try to cast to dictionary.
    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Value::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    /// Try to cast to mutable dictionary.
    pub fn as_dict_mut(&mut self) -> Option<&mut Dict> {
        match self {
            Value::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    /// Try to cast to array.
    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to cast to reference.
    pub fn as_reference(&self) -> Option<ObjRef> {
        match self {
            Value::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to string bytes.
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Check if value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Immutable deep walk visiting every indirect reference.
    ///
    /// Marker children are walked as well; dictionary keys carry no
    /// references.
    pub fn visit_refs(&self, visit: &mut impl FnMut(ObjRef)) {
        match self {
            Value::Reference(r) => visit(*r),
            Value::Array(items) => {
                for item in items {
                    item.visit_refs(visit);
                }
            }
            Value::Dictionary(dict) => {
                for value in dict.values() {
                    value.visit_refs(visit);
                }
            }
            Value::Marker(marker) => {
                if let MarkerBody::Child(child) = &marker.body {
                    child.visit_refs(visit);
                }
            }
            _ => {}
        }
    }

    /// Rebuilding deep walk returning a structurally identical value with
    /// every indirect reference mapped through `map`.
    pub fn map_refs(&self, map: &mut impl FnMut(ObjRef) -> ObjRef) -> Value {
        match self {
            Value::Reference(r) => Value::Reference(map(*r)),
            Value::Array(items) => {
                Value::Array(items.iter().map(|item| item.map_refs(map)).collect())
            }
            Value::Dictionary(dict) => Value::Dictionary(
                dict.iter()
                    .map(|(key, value)| (key.clone(), value.map_refs(map)))
                    .collect(),
            ),
            Value::Marker(marker) => match &marker.body {
                MarkerBody::Child(child) => Value::Marker(Marker {
                    name: marker.name.clone(),
                    body: MarkerBody::Child(Box::new(child.map_refs(map))),
                }),
                MarkerBody::Raw(_) => self.clone(),
            },
            other => other.clone(),
        }
    }

    /// Collect every indirect reference in this value tree.
    pub fn collect_refs(&self) -> Vec<ObjRef> {
        let mut refs = Vec::new();
        self.visit_refs(&mut |r| refs.push(r));
        refs
    }
}

/// An indirect PDF object: identity, content value, and optionally the raw
/// (still encoded) stream bytes exactly as they appear between `stream` and
/// `endstream`.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    /// Object identity
    pub xref: ObjRef,
    /// Content value; a dictionary whenever a stream is present
    pub content: Value,
    /// Raw stream bytes, still encoded
    pub stream: Option<Vec<u8>>,
}

impl Object {
    /// Create a streamless object.
    pub fn new(id: u32, gen: u16, content: Value) -> Self {
        Object {
            xref: ObjRef::new(id, gen),
            content,
            stream: None,
        }
    }

    /// Create an object carrying a raw stream. The content must be a
    /// dictionary.
    pub fn with_stream(id: u32, gen: u16, content: Value, stream: Vec<u8>) -> Self {
        debug_assert!(matches!(content, Value::Dictionary(_)));
        Object {
            xref: ObjRef::new(id, gen),
            content,
            stream: Some(stream),
        }
    }

    /// Content dictionary, if the content is one.
    pub fn dict(&self) -> Option<&Dict> {
        self.content.as_dict()
    }

    /// Mutable content dictionary.
    pub fn dict_mut(&mut self) -> Option<&mut Dict> {
        self.content.as_dict_mut()
    }

    /// Dictionary entry lookup on the content.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.dict()?.get(&Name::new(key))
    }

    /// Whether this object carries a stream.
    pub fn has_stream(&self) -> bool {
        self.stream.is_some()
    }

    /// Raw stream length in bytes, 0 when streamless.
    pub fn stream_len(&self) -> usize {
        self.stream.as_ref().map(|s| s.len()).unwrap_or(0)
    }

    /// Whether this object is an image XObject with a stream.
    pub fn is_image(&self) -> bool {
        self.has_stream()
            && self.get("Type").and_then(Value::as_name).map(Name::as_str) == Some("XObject")
            && self.get("Subtype").and_then(Value::as_name).map(Name::as_str) == Some("Image")
    }

    /// Whether this object is a paint-type-1 tiling pattern.
    pub fn is_pattern(&self) -> bool {
        self.get("PatternType").and_then(Value::as_integer) == Some(1)
            && self.get("PaintType").and_then(Value::as_integer) == Some(1)
    }

    /// Encoded view of the raw stream, driven by /Filter and /DecodeParms.
    ///
    /// Fails with `UnsupportedFilter` when the filter chain cannot be
    /// represented; the object itself stays usable as an opaque blob.
    pub fn encoded_stream(&self) -> Result<EncodedStream> {
        let stream = self.stream.as_ref().ok_or_else(|| Error::Decode(format!(
            "object {} has no stream",
            self.xref
        )))?;
        EncodedStream::from_parts(self.dict(), stream.clone())
    }

    /// Replace the raw stream from an encoded stream, rewriting /Length,
    /// /Filter and /DecodeParms in the content dictionary.
    pub fn set_encoded_stream(&mut self, encoded: EncodedStream) {
        if let Some(dict) = self.content.as_dict_mut() {
            encoded.update_dict(dict);
        }
        self.stream = Some(encoded.into_data());
    }
}

impl std::fmt::Display for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Object<{} {}, {} bytes>",
            self.xref.id,
            self.xref.gen,
            self.stream_len()
        )
    }
}

/// Convenience constructor for dictionaries from literal entries.
pub fn dict_of(entries: Vec<(&str, Value)>) -> Dict {
    entries
        .into_iter()
        .map(|(k, v)| (Name::new(k), v))
        .collect()
}
