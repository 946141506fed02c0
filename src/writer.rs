//! Document writer.
//!
//! Orchestrates header, body, cross-reference and trailer emission. With
//! object streams enabled, eligible streamless objects are packed into
//! `/Type /ObjStm` containers; the cross-reference is then emitted as a
//! `/Type /XRef` stream (mandatory whenever containers were produced) or
//! as a classical table. Output is deterministic: identical documents and
//! options produce byte-identical files.

use std::collections::HashMap;

use crate::codec::EncodedStream;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::object::{Name, ObjRef, Object, Value};
use crate::objstm::ObjStmContainer;
use crate::serializer::Serializer;
use crate::xref::{XrefEntry, XrefTable};

/// Binary-content comment emitted after the header line.
const BINARY_COMMENT: &[u8] = b"%\xb5\xed\xae\xfb\n";

/// Writer configuration.
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Multi-line sorted dictionaries
    pub pretty: bool,
    /// Emit the cross-reference as a /Type /XRef stream
    pub use_xref_stream: bool,
    /// Pack streamless objects into object-stream containers
    pub use_object_streams: bool,
    /// Maximum children per container
    pub objects_per_container: usize,
}

impl Default for WriterOptions {
    fn default() -> Self {
        WriterOptions {
            pretty: false,
            use_xref_stream: true,
            use_object_streams: true,
            objects_per_container: 100,
        }
    }
}

impl WriterOptions {
    /// Reject contradictory settings before any output is produced.
    pub fn validate(&self) -> Result<()> {
        if self.use_object_streams && !self.use_xref_stream {
            return Err(Error::ConfigConflict(
                "object streams require a cross-reference stream".to_string(),
            ));
        }
        if self.objects_per_container == 0 {
            return Err(Error::ConfigConflict(
                "objects_per_container must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// A serialized file plus the marker offsets recorded while writing it.
#[derive(Debug)]
pub struct WriteOutput {
    /// The complete file bytes
    pub bytes: Vec<u8>,
    marks: HashMap<String, usize>,
}

impl WriteOutput {
    /// Byte offset recorded for a marker during serialization.
    pub fn mark(&self, name: &str) -> Option<usize> {
        self.marks.get(name).copied()
    }
}

/// Serializes a document into a complete PDF file.
#[derive(Debug)]
pub struct PdfWriter {
    options: WriterOptions,
    serializer: Serializer,
    xref: XrefTable,
    out: Vec<u8>,
}

impl PdfWriter {
    /// Create a writer, validating the options.
    pub fn new(options: WriterOptions) -> Result<Self> {
        options.validate()?;
        let pretty = options.pretty;
        Ok(PdfWriter {
            options,
            serializer: Serializer::new(pretty),
            xref: XrefTable::new(),
            out: Vec::new(),
        })
    }

    /// Serialize the document.
    pub fn write(mut self, doc: &Document) -> Result<WriteOutput> {
        self.write_header();

        // Body pass: queue containerizable objects, emit the rest.
        let mut queued: Vec<ObjRef> = Vec::new();
        for object in doc.objects() {
            let compressible = self.options.use_object_streams
                && !object.has_stream()
                && object.xref.gen == 0
                && !contains_marker(&object.content);
            if compressible {
                queued.push(object.xref);
            } else {
                self.write_uncompressed(object);
            }
        }

        // Reserve queued ids so container allocation cannot collide.
        for q in &queued {
            self.xref.add_entry(q.id, XrefEntry::Reserved { gen: q.gen });
        }

        // Pack queued objects into containers of bounded size.
        let mut containers: Vec<ObjStmContainer> = Vec::new();
        for q in &queued {
            if containers
                .last()
                .map_or(true, |c| c.len() >= self.options.objects_per_container)
            {
                let container_id = self.xref.reserve_free_id();
                log::debug!("new object-stream container with id {}", container_id);
                containers.push(ObjStmContainer::new(container_id));
            }
            let container = containers.last_mut().expect("pushed above");
            let content = doc.get(*q).expect("queued from this document");
            let index = container.add(q.id, content.content.clone());
            self.xref.add_entry(
                q.id,
                XrefEntry::Compressed {
                    container: container.id(),
                    index,
                },
            );
        }
        for container in &containers {
            let object = container.build(&mut self.serializer)?;
            self.write_uncompressed(&object);
        }

        // Cross-reference and trailer.
        let xref_offset = self.out.len();
        if self.options.use_xref_stream {
            self.write_xref_stream(doc)?;
        } else {
            self.write_classical_xref(doc)?;
        }

        self.out
            .extend_from_slice(format!("startxref\n{}\n%%EOF\n", xref_offset).as_bytes());

        Ok(WriteOutput {
            bytes: self.out,
            marks: self.serializer.marks().clone(),
        })
    }

    fn write_header(&mut self) {
        let version = if self.options.use_xref_stream || self.options.use_object_streams {
            "1.5"
        } else {
            "1.4"
        };
        self.out
            .extend_from_slice(format!("%PDF-{}\n", version).as_bytes());
        self.out.extend_from_slice(BINARY_COMMENT);
    }

    /// Emit `id gen obj`, the serialized content, the optional raw stream,
    /// and `endobj`, recording an uncompressed xref entry.
    fn write_uncompressed(&mut self, object: &Object) {
        let offset = self.out.len();
        self.xref.add_entry(
            object.xref.id,
            XrefEntry::Uncompressed {
                gen: object.xref.gen,
                offset: offset as u64,
            },
        );
        self.out
            .extend_from_slice(format!("{} {} obj\n", object.xref.id, object.xref.gen).as_bytes());
        let content_offset = self.out.len();
        let content = self.serializer.serialize(&object.content, content_offset);
        self.out.extend_from_slice(&content);
        if let Some(raw) = &object.stream {
            self.out.extend_from_slice(b"\nstream\n");
            self.out.extend_from_slice(raw);
            self.out.extend_from_slice(b"\nendstream");
        }
        self.out.extend_from_slice(b"\nendobj\n");
    }

    fn write_classical_xref(&mut self, doc: &Document) -> Result<()> {
        self.xref.write_classical(&mut self.out)?;

        let mut trailer = doc.trailer.clone();
        trailer.shift_remove(&Name::new("Prev"));
        trailer.insert(
            Name::new("Size"),
            Value::Integer(self.xref.max_id() as i64 + 1),
        );
        self.out.extend_from_slice(b"trailer\n");
        let offset = self.out.len();
        let bytes = self
            .serializer
            .serialize(&Value::Dictionary(trailer), offset);
        self.out.extend_from_slice(&bytes);
        self.out.push(b'\n');
        Ok(())
    }

    fn write_xref_stream(&mut self, doc: &Document) -> Result<()> {
        let xref_id = self.xref.reserve_free_id();
        self.xref.add_entry(
            xref_id,
            XrefEntry::Uncompressed {
                gen: 0,
                offset: self.out.len() as u64,
            },
        );

        let (widths, rows) = self.xref.pack_stream_data();
        let encoded = EncodedStream::create(&rows, true, false, 1)?;

        let mut dict = crate::object::Dict::new();
        dict.insert(Name::new("Type"), Value::Name(Name::new("XRef")));
        dict.insert(
            Name::new("Size"),
            Value::Integer(self.xref.max_id() as i64 + 1),
        );
        dict.insert(
            Name::new("W"),
            Value::Array(widths.iter().map(|w| Value::Integer(*w as i64)).collect()),
        );
        dict.insert(
            Name::new("Index"),
            Value::Array(vec![
                Value::Integer(0),
                Value::Integer(self.xref.max_id() as i64 + 1),
            ]),
        );
        // Trailer fields ride along, except those the table determines.
        for (key, value) in &doc.trailer {
            if matches!(key.as_str(), "Size" | "Index" | "Prev" | "W" | "Type") {
                continue;
            }
            dict.insert(key.clone(), value.clone());
        }
        encoded.update_dict(&mut dict);

        let object = Object::with_stream(
            xref_id,
            0,
            Value::Dictionary(dict),
            encoded.into_data(),
        );
        self.write_uncompressed(&object);
        Ok(())
    }
}

/// Whether a value tree contains a marker placeholder anywhere.
///
/// Marker offsets are only meaningful in the uncompressed body, so such
/// objects are never containerized.
fn contains_marker(value: &Value) -> bool {
    match value {
        Value::Marker(_) => true,
        Value::Array(items) => items.iter().any(contains_marker),
        Value::Dictionary(dict) => dict.values().any(contains_marker),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{dict_of, Marker};

    fn small_doc() -> Document {
        let mut doc = Document::new("1.4");
        doc.replace(Object::new(
            1,
            0,
            Value::Dictionary(dict_of(vec![
                ("Type", Value::Name(Name::new("Catalog"))),
                ("Pages", Value::Reference(ObjRef::new(2, 0))),
            ])),
        ));
        doc.replace(Object::new(
            2,
            0,
            Value::Dictionary(dict_of(vec![
                ("Type", Value::Name(Name::new("Pages"))),
                ("Kids", Value::Array(vec![Value::Reference(ObjRef::new(3, 0))])),
                ("Count", Value::Integer(1)),
            ])),
        ));
        let stream = crate::codec::EncodedStream::create(b"q Q", true, false, 1).unwrap();
        let page_dict = dict_of(vec![
            ("Type", Value::Name(Name::new("Page"))),
            ("Parent", Value::Reference(ObjRef::new(2, 0))),
            ("Contents", Value::Reference(ObjRef::new(4, 0))),
        ]);
        doc.replace(Object::new(3, 0, Value::Dictionary(page_dict)));
        let mut content_dict = crate::object::Dict::new();
        stream.update_dict(&mut content_dict);
        doc.replace(Object::with_stream(
            4,
            0,
            Value::Dictionary(content_dict),
            stream.into_data(),
        ));
        doc.trailer = dict_of(vec![("Root", Value::Reference(ObjRef::new(1, 0)))]);
        doc
    }

    fn classical_options() -> WriterOptions {
        WriterOptions {
            pretty: false,
            use_xref_stream: false,
            use_object_streams: false,
            objects_per_container: 100,
        }
    }

    #[test]
    fn test_config_conflict_rejected() {
        let options = WriterOptions {
            use_xref_stream: false,
            use_object_streams: true,
            ..Default::default()
        };
        assert!(matches!(
            PdfWriter::new(options),
            Err(Error::ConfigConflict(_))
        ));
    }

    #[test]
    fn test_classical_output_header_and_shape() {
        let doc = small_doc();
        let output = PdfWriter::new(classical_options()).unwrap().write(&doc).unwrap();
        let text = String::from_utf8_lossy(&output.bytes);
        assert!(text.starts_with("%PDF-1.4\n"));
        assert!(output.bytes[9..14].iter().all(|b| b & 0x80 == 0x80 || *b == b'%'));
        assert!(text.contains("xref\n0 5\n"));
        assert!(text.contains("trailer"));
        assert!(text.trim_end().ends_with("%%EOF"));
    }

    #[test]
    fn test_classical_roundtrip() {
        let doc = small_doc();
        let output = PdfWriter::new(classical_options()).unwrap().write(&doc).unwrap();
        let reparsed = Document::parse(&output.bytes).unwrap();
        assert_eq!(reparsed.len(), doc.len());
        for object in doc.objects() {
            let other = reparsed.get(object.xref).expect("object survived");
            assert_eq!(other.content, object.content);
            assert_eq!(other.stream, object.stream);
        }
        assert_eq!(
            reparsed.page_content(ObjRef::new(3, 0)).unwrap(),
            b"q Q\n"
        );
    }

    #[test]
    fn test_xref_stream_roundtrip_with_object_streams() {
        let doc = small_doc();
        let output = PdfWriter::new(WriterOptions::default()).unwrap().write(&doc).unwrap();
        let text = String::from_utf8_lossy(&output.bytes);
        assert!(text.starts_with("%PDF-1.5\n"));
        assert!(text.contains("/ObjStm"));
        assert!(text.contains("/XRef"));

        let reparsed = Document::parse(&output.bytes).unwrap();
        // The three streamless objects come back out of the container.
        assert_eq!(reparsed.len(), doc.len());
        for object in doc.objects() {
            let other = reparsed.get(object.xref).expect("object survived");
            assert_eq!(other.content, object.content);
        }
        assert_eq!(
            reparsed.trailer.get(&Name::new("Root")).unwrap().as_reference(),
            Some(ObjRef::new(1, 0))
        );
    }

    #[test]
    fn test_write_determinism() {
        let doc = small_doc();
        let a = PdfWriter::new(WriterOptions::default()).unwrap().write(&doc).unwrap();
        let b = PdfWriter::new(WriterOptions::default()).unwrap().write(&doc).unwrap();
        assert_eq!(a.bytes, b.bytes);

        let c = PdfWriter::new(classical_options()).unwrap().write(&doc).unwrap();
        let d = PdfWriter::new(classical_options()).unwrap().write(&doc).unwrap();
        assert_eq!(c.bytes, d.bytes);
    }

    #[test]
    fn test_marked_objects_stay_uncompressed() {
        let mut doc = small_doc();
        doc.replace(Object::new(
            5,
            0,
            Value::Dictionary(dict_of(vec![(
                "ByteRange",
                Value::Marker(Marker::raw("sig_byterange", b"[ 0 0 0 0 ]".to_vec())),
            )])),
        ));
        let output = PdfWriter::new(WriterOptions::default()).unwrap().write(&doc).unwrap();
        let mark = output.mark("sig_byterange").expect("mark recorded");
        assert_eq!(&output.bytes[mark..mark + 11], b"[ 0 0 0 0 ]");
    }

    #[test]
    fn test_marker_offsets_exact_in_file() {
        let mut doc = small_doc();
        doc.replace(Object::new(
            5,
            0,
            Value::Dictionary(dict_of(vec![
                ("A", Value::Marker(Marker::raw("first", b"XX".to_vec()))),
                ("B", Value::Marker(Marker::child("second", Value::Integer(7)))),
            ])),
        ));
        let output = PdfWriter::new(classical_options()).unwrap().write(&doc).unwrap();
        let first = output.mark("first").unwrap();
        assert_eq!(&output.bytes[first..first + 2], b"XX");
        let second = output.mark("second").unwrap();
        assert_eq!(output.bytes[second], b'7');
    }

    #[test]
    fn test_container_capacity_respected() {
        let mut doc = Document::new("1.5");
        for _ in 0..7 {
            doc.add_object(Value::Integer(1));
        }
        doc.trailer = dict_of(vec![]);
        let options = WriterOptions {
            objects_per_container: 3,
            ..Default::default()
        };
        let output = PdfWriter::new(options).unwrap().write(&doc).unwrap();
        let text = String::from_utf8_lossy(&output.bytes);
        // 7 queued objects in containers of 3 => 3 containers.
        assert_eq!(text.matches("/ObjStm").count(), 3);
    }
}
