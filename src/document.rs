//! Document model and loader.
//!
//! A [`Document`] is an ordered-by-id collection of objects plus the
//! trailer dictionary and the cross-reference table. The loader scans
//! top-level indirect objects, consumes the trailing xref/trailer sections
//! (classical or cross-reference stream), unpacks object-stream containers,
//! and resolves indirect `/Length` entries.

use std::collections::{BTreeMap, HashMap};

use crate::error::{Error, Result};
use crate::object::{Dict, Name, ObjRef, Object, Value};
use crate::parser;
use crate::reader::ByteReader;
use crate::objstm;
use crate::xref::XrefTable;

const KNOWN_VERSIONS: [&str; 4] = ["1.4", "1.5", "1.6", "1.7"];

static NULL_VALUE: Value = Value::Null;

/// An in-memory PDF document.
#[derive(Debug, Default)]
pub struct Document {
    /// Header version, e.g. "1.5"
    pub version: String,
    /// Trailer dictionary
    pub trailer: Dict,
    /// Cross-reference table as read from the file
    pub xref: XrefTable,
    objects: BTreeMap<ObjRef, Object>,
}

impl Document {
    /// Create an empty document with the given header version.
    pub fn new(version: &str) -> Self {
        Document {
            version: version.to_string(),
            ..Default::default()
        }
    }

    /// Parse a document from raw file bytes.
    pub fn parse(data: &[u8]) -> Result<Document> {
        let mut reader = ByteReader::new(data);
        let version = read_header(&mut reader)?;
        let mut doc = Document::new(&version);

        // Body scan: top-level `N G obj ... endobj` objects, recording the
        // byte offset each object starts at.
        let mut offsets: HashMap<usize, ObjRef> = HashMap::new();
        loop {
            match read_object(&mut reader, data)? {
                Some((object, offset)) => {
                    log::debug!("read object {} at offset {}", object.xref, offset);
                    offsets.insert(offset, object.xref);
                    doc.objects.insert(object.xref, object);
                }
                None => break,
            }
        }
        log::debug!("body scan finished: {} objects", doc.objects.len());

        // Trailing sections in any order until %%EOF.
        let mut startxref: Option<u64> = None;
        let mut saw_classical_trailer = false;
        loop {
            let before = reader.tell();
            let Some(token) = reader.read_next_token() else {
                break;
            };
            if token == b"xref" {
                doc.xref.read_classical_sections(&mut reader);
            } else if token == b"trailer" {
                let rest = reader.rest();
                let (value, remaining) = parser::parse_value_partial(rest)?;
                reader.advance((rest.len() - remaining.len()) as isize);
                match value {
                    Value::Dictionary(dict) => {
                        doc.trailer = dict;
                        saw_classical_trailer = true;
                    }
                    other => {
                        return Err(Error::MalformedPdf {
                            offset: before,
                            expected: "trailer dictionary".to_string(),
                            found: other.type_name().to_string(),
                        })
                    }
                }
            } else if token == b"startxref" {
                startxref = reader
                    .read_next_token()
                    .and_then(|t| String::from_utf8_lossy(t).parse().ok());
            } else if token == b"%%EOF" {
                break;
            } else {
                log::warn!(
                    "skipping unexpected token {:?} in file trailer",
                    String::from_utf8_lossy(token)
                );
            }
        }

        // A startxref pointing into an object means the xref lives in a
        // cross-reference stream.
        if !saw_classical_trailer {
            if let Some(offset) = startxref {
                if let Some(&xref_obj) = offsets.get(&(offset as usize)) {
                    doc.ingest_xref_stream(xref_obj)?;
                } else {
                    log::warn!(
                        "startxref offset {} does not point at a scanned object",
                        offset
                    );
                }
            } else {
                log::warn!("no trailer and no startxref found");
            }
        }

        doc.unpack_object_streams();
        doc.fix_indirect_lengths();

        log::debug!("finished reading document: {} objects", doc.objects.len());
        Ok(doc)
    }

    /// Ingest a `/Type /XRef` stream object: entries into the table, the
    /// dictionary (minus stream-structural keys) as the trailer, and the
    /// object removed from the body.
    fn ingest_xref_stream(&mut self, xref_obj: ObjRef) -> Result<()> {
        let object = self
            .objects
            .get(&xref_obj)
            .ok_or(Error::ObjectNotFound(xref_obj.id, xref_obj.gen))?;
        let dict = object.dict().ok_or_else(|| Error::Decode(format!(
            "xref stream {} has no dictionary",
            xref_obj
        )))?;

        let type_name = dict
            .get(&Name::new("Type"))
            .and_then(Value::as_name)
            .map(Name::as_str);
        if type_name != Some("XRef") {
            return Err(Error::Decode(format!(
                "object {} at startxref is not /Type /XRef",
                xref_obj
            )));
        }

        let widths: Vec<usize> = dict
            .get(&Name::new("W"))
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_integer)
                    .map(|w| w.max(0) as usize)
                    .collect()
            })
            .unwrap_or_default();
        if widths.len() != 3 {
            return Err(Error::Decode(format!(
                "xref stream {} /W must have three entries",
                xref_obj
            )));
        }

        let size = dict
            .get(&Name::new("Size"))
            .and_then(Value::as_integer)
            .unwrap_or(0) as u32;
        let index: Vec<(u32, u32)> = match dict.get(&Name::new("Index")).and_then(Value::as_array)
        {
            Some(items) => items
                .chunks(2)
                .filter_map(|pair| match pair {
                    [first, count] => Some((
                        first.as_integer()? as u32,
                        count.as_integer()? as u32,
                    )),
                    _ => None,
                })
                .collect(),
            None => vec![(0, size)],
        };

        let decoded = object.encoded_stream()?.decode()?;
        self.xref
            .read_stream_data(&decoded, &index, [widths[0], widths[1], widths[2]])?;

        let mut trailer = Dict::new();
        for (key, value) in dict {
            if matches!(
                key.as_str(),
                "Type" | "W" | "Index" | "Filter" | "DecodeParms" | "Length"
            ) {
                continue;
            }
            trailer.insert(key.clone(), value.clone());
        }
        self.trailer = trailer;

        self.objects.remove(&xref_obj);
        Ok(())
    }

    /// Unpack every `/Type /ObjStm` container; children replace same-id
    /// entries and the container is deleted.
    fn unpack_object_streams(&mut self) {
        let containers: Vec<ObjRef> = self
            .objects
            .values()
            .filter(|obj| {
                obj.get("Type").and_then(Value::as_name).map(Name::as_str) == Some("ObjStm")
            })
            .map(|obj| obj.xref)
            .collect();

        for container_ref in containers {
            let container = self.objects[&container_ref].clone();
            match objstm::unpack_object_stream(&container) {
                Ok(children) => {
                    log::debug!(
                        "unpacked object stream {}: {} children",
                        container_ref,
                        children.len()
                    );
                    for (child_id, content) in children {
                        self.objects
                            .insert(ObjRef::new(child_id, 0), Object::new(child_id, 0, content));
                    }
                    self.objects.remove(&container_ref);
                }
                Err(e) => {
                    log::warn!("failed to unpack object stream {}: {}", container_ref, e);
                }
            }
        }
    }

    /// Resolve streams whose `/Length` is an indirect reference: an integer
    /// referent differing from the stored raw length truncates the stream;
    /// anything else warns and leaves the stream untouched.
    fn fix_indirect_lengths(&mut self) {
        let fixups: Vec<(ObjRef, Option<i64>)> = self
            .objects
            .values()
            .filter(|obj| obj.has_stream())
            .filter_map(|obj| {
                let length_ref = obj.get("Length")?.as_reference()?;
                let referent = self
                    .objects
                    .get(&length_ref)
                    .map(|target| target.content.as_integer());
                Some((obj.xref, referent.flatten()))
            })
            .collect();

        for (xref, length) in fixups {
            match length {
                Some(length) if length >= 0 => {
                    let object = self.objects.get_mut(&xref).expect("collected above");
                    let stream = object.stream.as_mut().expect("stream checked above");
                    let length = length as usize;
                    if length < stream.len() {
                        log::debug!(
                            "truncating stream of {} from {} to {} bytes",
                            xref,
                            stream.len(),
                            length
                        );
                        stream.truncate(length);
                    } else if length > stream.len() {
                        log::warn!(
                            "indirect /Length of {} claims {} bytes but only {} are stored",
                            xref,
                            length,
                            stream.len()
                        );
                    }
                }
                _ => {
                    log::warn!(
                        "indirect /Length of {} does not resolve to an integer; leaving stream untouched",
                        xref
                    );
                }
            }
        }
    }

    /// Number of objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the document holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Look up an object by reference.
    pub fn get(&self, xref: ObjRef) -> Option<&Object> {
        self.objects.get(&xref)
    }

    /// Mutable lookup by reference.
    pub fn get_mut(&mut self, xref: ObjRef) -> Option<&mut Object> {
        self.objects.get_mut(&xref)
    }

    /// Iterate objects in ascending (id, generation) order.
    pub fn objects(&self) -> impl Iterator<Item = &Object> {
        self.objects.values()
    }

    /// Iterate objects mutably in ascending (id, generation) order.
    pub fn objects_mut(&mut self) -> impl Iterator<Item = &mut Object> {
        self.objects.values_mut()
    }

    /// Delete an object if present.
    pub fn delete(&mut self, id: u32, gen: u16) {
        self.objects.remove(&ObjRef::new(id, gen));
    }

    /// Insert an object, replacing any same-(id, gen) predecessor.
    pub fn replace(&mut self, object: Object) {
        self.objects.insert(object.xref, object);
    }

    /// Lowest object id not present under any generation.
    pub fn free_id(&self) -> u32 {
        self.free_ids(1)[0]
    }

    /// The `n` lowest object ids not present under any generation.
    pub fn free_ids(&self, n: usize) -> Vec<u32> {
        let used: std::collections::BTreeSet<u32> =
            self.objects.keys().map(|r| r.id).collect();
        let mut ids = Vec::with_capacity(n);
        let mut candidate = 1;
        while ids.len() < n {
            if !used.contains(&candidate) {
                ids.push(candidate);
            }
            candidate += 1;
        }
        ids
    }

    /// Allocate a fresh id and insert a streamless object, returning its
    /// reference.
    pub fn add_object(&mut self, content: Value) -> ObjRef {
        let id = self.free_id();
        let object = Object::new(id, 0, content);
        let xref = object.xref;
        self.replace(object);
        xref
    }

    /// Follow a reference one step; non-references are returned as-is.
    pub fn deref<'a>(&'a self, value: &'a Value) -> &'a Value {
        match value {
            Value::Reference(r) => self
                .get(*r)
                .map(|obj| &obj.content)
                .unwrap_or(&NULL_VALUE),
            other => other,
        }
    }

    /// The catalog object referenced by the trailer /Root.
    pub fn catalog(&self) -> Option<&Object> {
        let root = self
            .trailer
            .get(&Name::new("Root"))?
            .as_reference()?;
        self.get(root)
    }

    /// Enumerate page leaves by walking /Root -> /Pages recursively.
    ///
    /// A missing trailer or /Root logs an error and yields nothing.
    pub fn pages(&self) -> Vec<ObjRef> {
        let Some(catalog) = self.catalog() else {
            log::error!("document has no trailer /Root; page enumeration yields nothing");
            return Vec::new();
        };
        let Some(pages_ref) = catalog.get("Pages").and_then(Value::as_reference) else {
            log::error!("catalog has no /Pages; page enumeration yields nothing");
            return Vec::new();
        };
        let mut leaves = Vec::new();
        let mut visited = std::collections::HashSet::new();
        self.collect_page_leaves(pages_ref, &mut leaves, &mut visited);
        leaves
    }

    fn collect_page_leaves(
        &self,
        node_ref: ObjRef,
        leaves: &mut Vec<ObjRef>,
        visited: &mut std::collections::HashSet<ObjRef>,
    ) {
        if !visited.insert(node_ref) {
            log::warn!("page tree cycle at {}", node_ref);
            return;
        }
        let Some(node) = self.get(node_ref) else {
            log::warn!("page tree references missing object {}", node_ref);
            return;
        };
        match node.get("Type").and_then(Value::as_name).map(Name::as_str) {
            Some("Page") => leaves.push(node_ref),
            _ => {
                let Some(kids) = node.get("Kids").map(|v| self.deref(v)) else {
                    return;
                };
                if let Some(kids) = kids.as_array() {
                    for kid in kids {
                        if let Some(kid_ref) = kid.as_reference() {
                            self.collect_page_leaves(kid_ref, leaves, visited);
                        }
                    }
                }
            }
        }
    }

    /// Image XObjects in ascending id order.
    pub fn image_objects(&self) -> Vec<ObjRef> {
        self.objects
            .values()
            .filter(|obj| obj.is_image())
            .map(|obj| obj.xref)
            .collect()
    }

    /// Paint-type-1 tiling patterns in ascending id order.
    pub fn pattern_objects(&self) -> Vec<ObjRef> {
        self.objects
            .values()
            .filter(|obj| obj.is_pattern())
            .map(|obj| obj.xref)
            .collect()
    }

    /// Decoded content-stream bytes of a page; /Contents may be a single
    /// reference or an array of references.
    pub fn page_content(&self, page_ref: ObjRef) -> Result<Vec<u8>> {
        let page = self
            .get(page_ref)
            .ok_or(Error::ObjectNotFound(page_ref.id, page_ref.gen))?;
        let contents = page.get("Contents").ok_or_else(|| Error::Decode(format!(
            "page {} has no /Contents",
            page_ref
        )))?;

        let mut parts = Vec::new();
        match contents {
            Value::Reference(r) => parts.push(*r),
            Value::Array(items) => {
                for item in items {
                    if let Some(r) = item.as_reference() {
                        parts.push(r);
                    }
                }
            }
            other => {
                return Err(Error::Decode(format!(
                    "page {} /Contents must be a reference or array, found {}",
                    page_ref,
                    other.type_name()
                )))
            }
        }

        let mut data = Vec::new();
        for part in parts {
            let object = self
                .get(part)
                .ok_or(Error::ObjectNotFound(part.id, part.gen))?;
            data.extend_from_slice(&object.encoded_stream()?.decode()?);
            data.push(b'\n');
        }
        Ok(data)
    }
}

/// Verify the `%PDF-1.x` header and skip the binary-comment line.
fn read_header(reader: &mut ByteReader<'_>) -> Result<String> {
    let line = reader.read_line();
    if !line.starts_with(b"%PDF-") {
        return Err(Error::InvalidHeader(
            String::from_utf8_lossy(&line[..line.len().min(16)]).into_owned(),
        ));
    }
    let version = String::from_utf8_lossy(&line[5..]).trim().to_string();
    if !KNOWN_VERSIONS.contains(&version.as_str()) {
        log::warn!("header declares PDF {}; continuing anyway", version);
    }

    // A comment line of high-bit bytes marks binary content; skip it.
    let pos = reader.tell();
    let next = reader.read(6);
    let is_binary_comment = next.first() == Some(&b'%')
        && next.len() >= 5
        && next[1..5].iter().all(|b| b & 0x80 == 0x80);
    reader.seek(pos);
    if is_binary_comment {
        reader.read_line();
    } else {
        log::warn!("no binary-comment line after header");
    }
    Ok(version)
}

/// Read one `N G obj ... endobj` object, returning it and its byte offset,
/// or `None` when the next token does not open an object.
fn read_object(reader: &mut ByteReader<'_>, data: &[u8]) -> Result<Option<(Object, usize)>> {
    loop {
        let start = reader.tell();
        let Some(token) = reader.read_next_token() else {
            return Ok(None);
        };

        // Comment lines between objects are skipped; %%EOF belongs to the
        // trailing sections.
        if token.starts_with(b"%") && token != b"%%EOF" {
            continue;
        }

        let header_ok = (|| {
            let id: u32 = String::from_utf8_lossy(token).parse().ok()?;
            let gen: u16 = reader
                .read_next_token()
                .and_then(|t| String::from_utf8_lossy(t).parse().ok())?;
            if reader.read_next_token()? != b"obj" {
                return None;
            }
            Some((id, gen))
        })();

        let Some((id, gen)) = header_ok else {
            reader.seek(start);
            return Ok(None);
        };

        // Find where the object starts, accounting for leading blanks.
        let offset = start
            + data[start..]
                .iter()
                .position(|b| !b.is_ascii_whitespace())
                .unwrap_or(0);

        let rest = reader.rest();
        let (content, remaining) = parser::parse_value_partial(rest)?;
        reader.advance((rest.len() - remaining.len()) as isize);

        let body_pos = reader.tell();
        let next = reader.read_next_token().ok_or(Error::MalformedPdf {
            offset: body_pos,
            expected: "stream or endobj".to_string(),
            found: "end of file".to_string(),
        })?;

        let object = if next == b"endobj" {
            Object {
                xref: ObjRef::new(id, gen),
                content,
                stream: None,
            }
        } else if next == b"stream" {
            reader.seek(body_pos);
            reader
                .read_until_pattern(&[b"stream\r\n", b"stream\n"])
                .ok_or(Error::MalformedPdf {
                    offset: body_pos,
                    expected: "stream keyword with line terminator".to_string(),
                    found: "malformed stream delimiter".to_string(),
                })?;
            let (raw, _) = reader
                .read_until_pattern(&[b"endstream"])
                .ok_or(Error::MalformedPdf {
                    offset: reader.tell(),
                    expected: "endstream".to_string(),
                    found: "end of file".to_string(),
                })?;
            let raw = strip_stream_terminator(raw);
            let end = reader.read_next_token();
            if end != Some(&b"endobj"[..]) {
                log::warn!(
                    "object {} {}: expected endobj after endstream, found {:?}",
                    id,
                    gen,
                    end.map(|t| String::from_utf8_lossy(t).into_owned())
                );
            }
            Object {
                xref: ObjRef::new(id, gen),
                content,
                stream: Some(raw.to_vec()),
            }
        } else {
            return Err(Error::MalformedPdf {
                offset: body_pos,
                expected: "stream or endobj".to_string(),
                found: String::from_utf8_lossy(next).into_owned(),
            });
        };
        return Ok(Some((object, offset)));
    }
}

/// Drop the single line terminator that separates stream data from
/// `endstream`.
fn strip_stream_terminator(raw: &[u8]) -> &[u8] {
    if raw.ends_with(b"\r\n") {
        &raw[..raw.len() - 2]
    } else if raw.ends_with(b"\n") || raw.ends_with(b"\r") {
        &raw[..raw.len() - 1]
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::flate_compress;
    use crate::object::dict_of;
    use crate::serializer::Serializer;

    fn minimal_pdf() -> Vec<u8> {
        let stream = flate_compress(b"q Q");
        let mut pdf = Vec::new();
        pdf.extend_from_slice(b"%PDF-1.4\n%\xb5\xed\xae\xfb\n");
        pdf.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
        pdf.extend_from_slice(
            b"2 0 obj\n<< /Type /Pages /Kids [ 3 0 R ] /Count 1 >>\nendobj\n",
        );
        pdf.extend_from_slice(
            format!(
                "3 0 obj\n<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>\nendobj\n4 0 obj\n<< /Filter /FlateDecode /Length {} >>\nstream\n",
                stream.len()
            )
            .as_bytes(),
        );
        pdf.extend_from_slice(&stream);
        pdf.extend_from_slice(b"\nendstream\nendobj\n");
        pdf.extend_from_slice(b"xref\n0 5\n");
        pdf.extend_from_slice(b"0000000000 65535 f \n");
        for _ in 0..4 {
            pdf.extend_from_slice(b"0000000000 00000 n \n");
        }
        pdf.extend_from_slice(b"trailer\n<< /Size 5 /Root 1 0 R >>\nstartxref\n0\n%%EOF\n");
        pdf
    }

    #[test]
    fn test_parse_minimal_document() {
        let _ = env_logger::builder().is_test(true).try_init();
        let doc = Document::parse(&minimal_pdf()).unwrap();
        assert_eq!(doc.version, "1.4");
        assert_eq!(doc.len(), 4);
        assert_eq!(
            doc.trailer.get(&Name::new("Root")).unwrap().as_reference(),
            Some(ObjRef::new(1, 0))
        );
        let content = doc.get(ObjRef::new(4, 0)).unwrap();
        assert!(content.has_stream());
        assert_eq!(content.encoded_stream().unwrap().decode().unwrap(), b"q Q");
    }

    #[test]
    fn test_pages_walk() {
        let doc = Document::parse(&minimal_pdf()).unwrap();
        assert_eq!(doc.pages(), vec![ObjRef::new(3, 0)]);
        assert_eq!(doc.page_content(ObjRef::new(3, 0)).unwrap(), b"q Q\n");
    }

    #[test]
    fn test_pages_missing_root_yields_nothing() {
        let doc = Document::new("1.4");
        assert!(doc.pages().is_empty());
    }

    #[test]
    fn test_bad_header_rejected() {
        let err = Document::parse(b"not a pdf at all").unwrap_err();
        assert!(matches!(err, Error::InvalidHeader(_)));
    }

    #[test]
    fn test_free_ids_skip_used() {
        let mut doc = Document::new("1.5");
        doc.replace(Object::new(1, 0, Value::Null));
        doc.replace(Object::new(3, 0, Value::Null));
        assert_eq!(doc.free_ids(3), vec![2, 4, 5]);
    }

    #[test]
    fn test_replace_and_delete() {
        let mut doc = Document::new("1.5");
        doc.replace(Object::new(1, 0, Value::Integer(1)));
        doc.replace(Object::new(1, 0, Value::Integer(2)));
        assert_eq!(doc.len(), 1);
        assert_eq!(
            doc.get(ObjRef::new(1, 0)).unwrap().content,
            Value::Integer(2)
        );
        doc.delete(1, 0);
        assert!(doc.is_empty());
    }

    #[test]
    fn test_indirect_length_truncates_stream() {
        let mut pdf = Vec::new();
        pdf.extend_from_slice(b"%PDF-1.4\n%\xb5\xed\xae\xfb\n");
        // Stream claims its length via 2 0 R; stored data has two junk
        // bytes picked up before the endstream keyword.
        pdf.extend_from_slice(b"1 0 obj\n<< /Length 2 0 R >>\nstream\nABCDE??\nendstream\nendobj\n");
        pdf.extend_from_slice(b"2 0 obj\n5\nendobj\n");
        pdf.extend_from_slice(b"trailer\n<< /Size 3 >>\nstartxref\n0\n%%EOF\n");
        let doc = Document::parse(&pdf).unwrap();
        assert_eq!(
            doc.get(ObjRef::new(1, 0)).unwrap().stream.as_deref(),
            Some(&b"ABCDE"[..])
        );
    }

    #[test]
    fn test_indirect_length_non_integer_left_untouched() {
        let mut pdf = Vec::new();
        pdf.extend_from_slice(b"%PDF-1.4\n%\xb5\xed\xae\xfb\n");
        pdf.extend_from_slice(b"1 0 obj\n<< /Length 2 0 R >>\nstream\nABCDE\nendstream\nendobj\n");
        pdf.extend_from_slice(b"2 0 obj\n/NotANumber\nendobj\n");
        pdf.extend_from_slice(b"trailer\n<< /Size 3 >>\nstartxref\n0\n%%EOF\n");
        let doc = Document::parse(&pdf).unwrap();
        assert_eq!(
            doc.get(ObjRef::new(1, 0)).unwrap().stream.as_deref(),
            Some(&b"ABCDE"[..])
        );
    }

    #[test]
    fn test_object_stream_unpacking() {
        use crate::objstm::ObjStmContainer;
        use crate::serializer::Serializer;

        let mut container = ObjStmContainer::new(5);
        container.add(1, Value::Dictionary(dict_of(vec![
            ("Type", Value::Name(Name::new("Catalog"))),
            ("Pages", Value::Reference(ObjRef::new(2, 0))),
        ])));
        container.add(2, Value::Integer(17));
        let built = container.build(&mut Serializer::new(false)).unwrap();

        let mut pdf = Vec::new();
        pdf.extend_from_slice(b"%PDF-1.5\n%\xb5\xed\xae\xfb\n");
        let mut serializer = Serializer::new(false);
        let dict_bytes = serializer.serialize(&built.content, 0);
        pdf.extend_from_slice(b"5 0 obj\n");
        pdf.extend_from_slice(&dict_bytes);
        pdf.extend_from_slice(b"\nstream\n");
        pdf.extend_from_slice(built.stream.as_ref().unwrap());
        pdf.extend_from_slice(b"\nendstream\nendobj\n");
        pdf.extend_from_slice(b"trailer\n<< /Size 6 /Root 1 0 R >>\nstartxref\n0\n%%EOF\n");

        let doc = Document::parse(&pdf).unwrap();
        // Container replaced by its children.
        assert!(doc.get(ObjRef::new(5, 0)).is_none());
        assert_eq!(
            doc.get(ObjRef::new(2, 0)).unwrap().content,
            Value::Integer(17)
        );
        assert_eq!(
            doc.catalog().unwrap().get("Pages").unwrap().as_reference(),
            Some(ObjRef::new(2, 0))
        );
    }

    #[test]
    fn test_xref_stream_ingestion() {
        // Build a file whose startxref points at a /Type /XRef stream.
        let mut table = XrefTable::new();
        table.add_entry(1, crate::xref::XrefEntry::Uncompressed { gen: 0, offset: 15 });
        let (widths, rows) = table.pack_stream_data();
        let encoded = crate::codec::EncodedStream::create(&rows, true, false, 1).unwrap();

        let mut pdf = Vec::new();
        pdf.extend_from_slice(b"%PDF-1.5\n%\xb5\xed\xae\xfb\n");
        pdf.extend_from_slice(b"1 0 obj\n<< /Type /Catalog >>\nendobj\n");
        let xref_offset = pdf.len();
        let mut dict = dict_of(vec![
            ("Type", Value::Name(Name::new("XRef"))),
            ("Size", Value::Integer(3)),
            (
                "W",
                Value::Array(widths.iter().map(|w| Value::Integer(*w as i64)).collect()),
            ),
            ("Index", Value::Array(vec![Value::Integer(0), Value::Integer(2)])),
            ("Root", Value::Reference(ObjRef::new(1, 0))),
        ]);
        encoded.update_dict(&mut dict);
        let mut serializer = Serializer::new(false);
        let dict_bytes = serializer.serialize(&Value::Dictionary(dict), 0);
        pdf.extend_from_slice(b"2 0 obj\n");
        pdf.extend_from_slice(&dict_bytes);
        pdf.extend_from_slice(b"\nstream\n");
        pdf.extend_from_slice(encoded.data());
        pdf.extend_from_slice(b"\nendstream\nendobj\n");
        pdf.extend_from_slice(format!("startxref\n{}\n%%EOF\n", xref_offset).as_bytes());

        let doc = Document::parse(&pdf).unwrap();
        // The xref stream object is consumed, its fields become the trailer.
        assert!(doc.get(ObjRef::new(2, 0)).is_none());
        assert_eq!(
            doc.trailer.get(&Name::new("Root")).unwrap().as_reference(),
            Some(ObjRef::new(1, 0))
        );
        assert!(doc.trailer.get(&Name::new("W")).is_none());
        assert_eq!(
            doc.xref.get(1),
            Some(&crate::xref::XrefEntry::Uncompressed { gen: 0, offset: 15 })
        );
    }
}
