//! Fragment templates with typed inputs and outputs.
//!
//! A template is a fragment document whose header declares inputs
//! (`< id = name`) and outputs (`> id = name`), followed by ordinary
//! `N G obj ... endobj` objects. Merging splices the fragment into a host
//! document under fresh object ids: fragment-internal references are
//! relinked, inputs are resolved to caller-supplied references, and the
//! merge fails fast on dangling or unresolved references.

use std::collections::HashMap;

use crate::document::Document;
use crate::error::{Error, Result};
use crate::object::{ObjRef, Object};
use crate::parser;
use crate::reader::ByteReader;
use crate::relink::Relinker;

/// A parsed template fragment.
#[derive(Debug)]
pub struct PdfTemplate {
    objects: Vec<Object>,
    inputs: HashMap<String, u32>,
    outputs: HashMap<String, u32>,
    input_values: HashMap<String, ObjRef>,
}

impl PdfTemplate {
    /// Parse a template from its resource bytes.
    pub fn parse(data: &[u8]) -> Result<PdfTemplate> {
        let mut reader = ByteReader::new(data);
        let mut inputs = HashMap::new();
        let mut outputs = HashMap::new();

        // Header lines: `< id = name` (input) or `> id = name` (output).
        loop {
            let line_start = reader.tell();
            let line = reader.read_line();
            match parse_header_line(line) {
                Some((is_input, id, name)) => {
                    if is_input {
                        inputs.insert(name, id);
                    } else {
                        outputs.insert(name, id);
                    }
                }
                None => {
                    reader.seek(line_start);
                    break;
                }
            }
        }

        let mut objects = Vec::new();
        loop {
            match read_fragment_object(&mut reader)? {
                Some(object) => objects.push(object),
                None => break,
            }
        }
        if objects.is_empty() {
            return Err(Error::MalformedPdf {
                offset: reader.tell(),
                expected: "at least one template object".to_string(),
                found: "none".to_string(),
            });
        }

        Ok(PdfTemplate {
            objects,
            inputs,
            outputs,
            input_values: HashMap::new(),
        })
    }

    /// Number of fragment objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the fragment holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Declared input names.
    pub fn input_names(&self) -> Vec<&str> {
        self.inputs.keys().map(String::as_str).collect()
    }

    /// Bind an input to a reference in the host document.
    pub fn set_input(&mut self, name: &str, value: ObjRef) -> Result<()> {
        if !self.inputs.contains_key(name) {
            return Err(Error::Filter {
                filter: "template".to_string(),
                reason: format!("'{}' is not a declared template input", name),
            });
        }
        self.input_values.insert(name.to_string(), value);
        Ok(())
    }

    /// Splice the fragment into `doc`, returning `output name -> new
    /// reference`.
    pub fn merge_into(mut self, doc: &mut Document) -> Result<HashMap<String, ObjRef>> {
        if self.input_values.len() != self.inputs.len() {
            return Err(Error::Filter {
                filter: "template".to_string(),
                reason: format!(
                    "{} of {} template inputs bound before merge",
                    self.input_values.len(),
                    self.inputs.len()
                ),
            });
        }

        // Fresh host ids for every fragment object.
        let fresh_ids = doc.free_ids(self.objects.len());
        let mut relinker = Relinker::new();
        for (object, fresh_id) in self.objects.iter().zip(&fresh_ids) {
            relinker.relink(object.xref, ObjRef::new(*fresh_id, 0));
        }

        let internal: Vec<ObjRef> = self.objects.iter().map(|o| o.xref).collect();

        // Inputs map fragment-internal ids onto caller references.
        for (name, id) in &self.inputs {
            let target = self.input_values[name];
            relinker.relink(ObjRef::new(*id, 0), target);
        }

        // Relink the fragment in place (as its own little document).
        let mut fragment = Document::new(&doc.version);
        for object in std::mem::take(&mut self.objects) {
            fragment.replace(object);
        }
        relinker.run(&mut fragment);

        // Every fragment object must be referenced or exported.
        let referenced = relinker.references();
        for internal_ref in &internal {
            let exported = self.outputs.values().any(|id| *id == internal_ref.id);
            if !exported && !referenced.contains(internal_ref) {
                return Err(Error::DanglingReference(*internal_ref));
            }
        }

        // Every fragment reference must have been mapped, either onto a
        // fresh id or through an input.
        let mut unmapped: Vec<ObjRef> = referenced
            .iter()
            .filter(|r| relinker.mapped(**r).is_none())
            .copied()
            .collect();
        unmapped.sort();
        if let Some(first) = unmapped.first() {
            return Err(Error::UnresolvedReference(*first));
        }

        for object in fragment.objects() {
            doc.replace(object.clone());
        }

        let mut outputs = HashMap::new();
        for (name, id) in &self.outputs {
            let mapped = relinker
                .mapped(ObjRef::new(*id, 0))
                .ok_or(Error::UnresolvedReference(ObjRef::new(*id, 0)))?;
            outputs.insert(name.clone(), mapped);
        }
        Ok(outputs)
    }
}

/// Parse one `< id = name` / `> id = name` header line.
fn parse_header_line(line: &[u8]) -> Option<(bool, u32, String)> {
    let text = std::str::from_utf8(line).ok()?.trim();
    let (is_input, rest) = match text.as_bytes().first()? {
        b'<' => (true, &text[1..]),
        b'>' => (false, &text[1..]),
        _ => return None,
    };
    let (id_text, name) = rest.split_once('=')?;
    let id: u32 = id_text.trim().parse().ok()?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((is_input, id, name.to_string()))
}

/// Read one `N G obj ... endobj` fragment object (streams included).
fn read_fragment_object(reader: &mut ByteReader<'_>) -> Result<Option<Object>> {
    let start = reader.tell();
    let header = (|| {
        let id: u32 = reader
            .read_next_token()
            .and_then(|t| String::from_utf8_lossy(t).parse().ok())?;
        let gen: u16 = reader
            .read_next_token()
            .and_then(|t| String::from_utf8_lossy(t).parse().ok())?;
        if reader.read_next_token()? != b"obj" {
            return None;
        }
        Some((id, gen))
    })();
    let Some((id, gen)) = header else {
        reader.seek(start);
        return Ok(None);
    };

    let rest = reader.rest();
    let (content, remaining) = parser::parse_value_partial(rest)?;
    reader.advance((rest.len() - remaining.len()) as isize);

    let body_pos = reader.tell();
    let next = reader.read_next_token();
    if next == Some(&b"endobj"[..]) {
        Ok(Some(Object {
            xref: ObjRef::new(id, gen),
            content,
            stream: None,
        }))
    } else if next == Some(&b"stream"[..]) {
        reader.seek(body_pos);
        reader.read_until_pattern(&[b"stream\r\n", b"stream\n"]);
        let (raw, _) = reader
            .read_until_pattern(&[b"endstream"])
            .ok_or(Error::MalformedPdf {
                offset: reader.tell(),
                expected: "endstream".to_string(),
                found: "end of template".to_string(),
            })?;
        let raw = match raw {
            r if r.ends_with(b"\r\n") => &r[..r.len() - 2],
            r if r.ends_with(b"\n") || r.ends_with(b"\r") => &r[..r.len() - 1],
            r => r,
        };
        reader.read_next_token(); // endobj
        Ok(Some(Object {
            xref: ObjRef::new(id, gen),
            content,
            stream: Some(raw.to_vec()),
        }))
    } else {
        Err(Error::MalformedPdf {
            offset: body_pos,
            expected: "stream or endobj".to_string(),
            found: next
                .map(|t| String::from_utf8_lossy(t).into_owned())
                .unwrap_or_else(|| "end of template".to_string()),
        })
    }
}
