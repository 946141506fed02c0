//! Payload embedding.
//!
//! Adds one opaque object carrying an external file's bytes plus origin
//! metadata. The payload is a valid PDF object but referenced by nothing.

use crate::codec::EncodedStream;
use crate::config::Config;
use crate::document::Document;
use crate::error::Result;
use crate::filters::DocumentFilter;
use crate::object::{dict_of, Object, Value};

/// Embeds an opaque payload file.
#[derive(Debug, Default)]
pub struct EmbedPayloadFilter;

impl EmbedPayloadFilter {
    /// Create the filter.
    pub fn new() -> Self {
        Self
    }
}

impl DocumentFilter for EmbedPayloadFilter {
    fn name(&self) -> &'static str {
        "embed-payload"
    }

    fn run(&mut self, doc: &mut Document, config: &Config) -> Result<()> {
        let Some(path) = &config.payload_path else {
            return Ok(());
        };
        let payload = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mtime = std::fs::metadata(path)
            .ok()
            .and_then(|meta| meta.modified().ok())
            .and_then(|time| time.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|duration| duration.as_secs().to_string())
            .unwrap_or_default();

        let id = doc.free_id();
        log::debug!(
            "embedding {} payload bytes from {:?} as object {}",
            payload.len(),
            path,
            id
        );
        let encoded = EncodedStream::create(&payload, false, false, 1)?;
        let mut dict = dict_of(vec![
            (
                "PdfRecast.OriginalFilename",
                Value::String(filename.into_bytes()),
            ),
            ("PdfRecast.MTime", Value::String(mtime.into_bytes())),
            (
                "PdfRecast.Version",
                Value::String(env!("CARGO_PKG_VERSION").as_bytes().to_vec()),
            ),
        ]);
        encoded.update_dict(&mut dict);
        doc.replace(Object::with_stream(
            id,
            0,
            Value::Dictionary(dict),
            encoded.into_data(),
        ));
        Ok(())
    }
}
