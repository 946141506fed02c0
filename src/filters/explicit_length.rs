//! Explicit-length fix.
//!
//! Streams carrying their `/Length` as an indirect reference get the
//! actual stored length written inline, making every stream
//! self-contained.

use crate::config::Config;
use crate::document::Document;
use crate::error::Result;
use crate::filters::DocumentFilter;
use crate::object::{Name, Value};

/// Replaces indirect `/Length` entries with the stored stream length.
#[derive(Debug, Default)]
pub struct ExplicitLengthFilter;

impl ExplicitLengthFilter {
    /// Create the filter.
    pub fn new() -> Self {
        Self
    }
}

impl DocumentFilter for ExplicitLengthFilter {
    fn name(&self) -> &'static str {
        "explicit-length"
    }

    fn run(&mut self, doc: &mut Document, _config: &Config) -> Result<()> {
        for object in doc.objects_mut() {
            if object.stream.is_none() {
                continue;
            }
            let length = object.stream_len() as i64;
            if let Some(dict) = object.dict_mut() {
                let key = Name::new("Length");
                if matches!(dict.get(&key), Some(Value::Reference(_))) {
                    dict.insert(key, Value::Integer(length));
                }
            }
        }
        Ok(())
    }
}
