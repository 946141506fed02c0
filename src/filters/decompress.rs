//! Stream decompression.
//!
//! Re-encodes every Flate stream as identity bytes. A debugging aid: the
//! output grows, but streams become readable in a text editor.

use crate::codec::{EncodedStream, StreamFilter};
use crate::config::Config;
use crate::document::Document;
use crate::error::Result;
use crate::filters::DocumentFilter;
use crate::object::ObjRef;

/// Expands Flate streams to identity encoding.
#[derive(Debug, Default)]
pub struct DecompressFilter {
    bytes_saved: i64,
}

impl DecompressFilter {
    /// Create the filter.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentFilter for DecompressFilter {
    fn name(&self) -> &'static str {
        "decompress"
    }

    fn run(&mut self, doc: &mut Document, _config: &Config) -> Result<()> {
        let targets: Vec<ObjRef> = doc
            .objects()
            .filter(|obj| obj.has_stream())
            .map(|obj| obj.xref)
            .collect();

        for xref in targets {
            let object = doc.get(xref).expect("listed above");
            let encoded = match object.encoded_stream() {
                Ok(encoded) if encoded.filter() == &StreamFilter::Flate => encoded,
                _ => continue,
            };
            match encoded.decode() {
                Ok(plain) => {
                    let old_len = object.stream_len() as i64;
                    let object = doc.get_mut(xref).expect("listed above");
                    self.bytes_saved += old_len - plain.len() as i64;
                    object.set_encoded_stream(EncodedStream::identity(plain));
                }
                Err(e) => log::warn!("cannot decompress {}: {}", xref, e),
            }
        }
        Ok(())
    }

    fn bytes_saved(&self) -> i64 {
        self.bytes_saved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::flate_compress;
    use crate::object::{dict_of, Name, Object, Value};

    #[test]
    fn test_flate_stream_expanded() {
        let mut doc = Document::new("1.5");
        let data = flate_compress(b"BT ET");
        let mut dict = dict_of(vec![("Filter", Value::Name(Name::new("FlateDecode")))]);
        dict.insert(Name::new("Length"), Value::Integer(data.len() as i64));
        doc.replace(Object::with_stream(1, 0, Value::Dictionary(dict), data));

        DecompressFilter::new().run(&mut doc, &Config::default()).unwrap();
        let object = doc.get(ObjRef::new(1, 0)).unwrap();
        assert_eq!(object.stream.as_deref(), Some(&b"BT ET"[..]));
        assert!(object.get("Filter").is_none());
        assert_eq!(object.get("Length"), Some(&Value::Integer(5)));
    }

    #[test]
    fn test_identity_stream_untouched() {
        let mut doc = Document::new("1.5");
        doc.replace(Object::with_stream(
            1,
            0,
            Value::Dictionary(dict_of(vec![])),
            b"plain".to_vec(),
        ));
        DecompressFilter::new().run(&mut doc, &Config::default()).unwrap();
        assert_eq!(
            doc.get(ObjRef::new(1, 0)).unwrap().stream.as_deref(),
            Some(&b"plain"[..])
        );
    }
}
