//! Metadata stripping.
//!
//! Drops dictionary entries whose key begins with a configured prefix
//! (typesetting leftovers such as `/PTEX.FileName`), recursively through
//! nested dictionaries and arrays.

use crate::config::Config;
use crate::document::Document;
use crate::error::Result;
use crate::filters::DocumentFilter;
use crate::object::Value;

/// Strips prefix-matched dictionary entries.
#[derive(Debug, Default)]
pub struct StripMetadataFilter;

impl StripMetadataFilter {
    /// Create the filter.
    pub fn new() -> Self {
        Self
    }
}

fn strip(value: &Value, prefixes: &[String]) -> Value {
    match value {
        Value::Dictionary(dict) => Value::Dictionary(
            dict.iter()
                .filter(|(key, _)| !prefixes.iter().any(|p| key.as_str().starts_with(p)))
                .map(|(key, entry)| (key.clone(), strip(entry, prefixes)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| strip(item, prefixes)).collect())
        }
        other => other.clone(),
    }
}

impl DocumentFilter for StripMetadataFilter {
    fn name(&self) -> &'static str {
        "strip-metadata"
    }

    fn run(&mut self, doc: &mut Document, config: &Config) -> Result<()> {
        if config.strip_metadata_prefixes.is_empty() {
            return Ok(());
        }
        for object in doc.objects_mut() {
            object.content = strip(&object.content, &config.strip_metadata_prefixes);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{dict_of, Name, ObjRef, Object};

    #[test]
    fn test_prefixed_keys_dropped_recursively() {
        let mut doc = Document::new("1.5");
        doc.replace(Object::new(
            1,
            0,
            Value::Dictionary(dict_of(vec![
                ("PTEX.FileName", Value::String(b"figure.pdf".to_vec())),
                ("Kept", Value::Integer(1)),
                (
                    "Nested",
                    Value::Array(vec![Value::Dictionary(dict_of(vec![
                        ("PTEX.PageNumber", Value::Integer(1)),
                        ("AlsoKept", Value::Boolean(true)),
                    ]))]),
                ),
            ])),
        ));

        StripMetadataFilter::new().run(&mut doc, &Config::default()).unwrap();
        let object = doc.get(ObjRef::new(1, 0)).unwrap();
        assert!(object.get("PTEX.FileName").is_none());
        assert_eq!(object.get("Kept"), Some(&Value::Integer(1)));
        let nested = object.get("Nested").unwrap().as_array().unwrap()[0]
            .as_dict()
            .unwrap()
            .clone();
        assert!(nested.get(&Name::new("PTEX.PageNumber")).is_none());
        assert_eq!(
            nested.get(&Name::new("AlsoKept")),
            Some(&Value::Boolean(true))
        );
    }

    #[test]
    fn test_no_prefixes_is_a_noop() {
        let mut doc = Document::new("1.5");
        doc.replace(Object::new(
            1,
            0,
            Value::Dictionary(dict_of(vec![(
                "PTEX.FileName",
                Value::String(b"x".to_vec()),
            )])),
        ));
        let config = Config {
            strip_metadata_prefixes: vec![],
            ..Default::default()
        };
        StripMetadataFilter::new().run(&mut doc, &config).unwrap();
        assert!(doc.get(ObjRef::new(1, 0)).unwrap().get("PTEX.FileName").is_some());
    }
}
