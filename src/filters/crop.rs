//! Crop-box injection.
//!
//! Adds a `/CropBox` to every page, converting the configured offset and
//! size from the configured unit into native units.

use crate::config::Config;
use crate::document::Document;
use crate::error::Result;
use crate::filters::DocumentFilter;
use crate::measure::{self, Unit};
use crate::object::{Name, Value};

/// Adds a `/CropBox` to all pages.
#[derive(Debug, Default)]
pub struct CropBoxFilter;

impl CropBoxFilter {
    /// Create the filter.
    pub fn new() -> Self {
        Self
    }
}

impl DocumentFilter for CropBoxFilter {
    fn name(&self) -> &'static str {
        "cropbox"
    }

    fn run(&mut self, doc: &mut Document, config: &Config) -> Result<()> {
        let Some((x, y, w, h)) = config.cropbox else {
            return Ok(());
        };
        let to_native = |v: f64| measure::convert(v, config.unit, Unit::Native);
        let cropbox = Value::Array(vec![
            Value::Real(to_native(x)),
            Value::Real(to_native(y)),
            Value::Real(to_native(x + w)),
            Value::Real(to_native(y + h)),
        ]);

        for page_ref in doc.pages() {
            if let Some(dict) = doc.get_mut(page_ref).and_then(|page| page.dict_mut()) {
                dict.insert(Name::new("CropBox"), cropbox.clone());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{dict_of, ObjRef, Object};

    fn paged_doc() -> Document {
        let mut doc = Document::new("1.5");
        doc.replace(Object::new(
            1,
            0,
            Value::Dictionary(dict_of(vec![(
                "Pages",
                Value::Reference(ObjRef::new(2, 0)),
            )])),
        ));
        doc.replace(Object::new(
            2,
            0,
            Value::Dictionary(dict_of(vec![
                ("Type", Value::Name(Name::new("Pages"))),
                ("Kids", Value::Array(vec![Value::Reference(ObjRef::new(3, 0))])),
            ])),
        ));
        doc.replace(Object::new(
            3,
            0,
            Value::Dictionary(dict_of(vec![("Type", Value::Name(Name::new("Page")))])),
        ));
        doc.trailer = dict_of(vec![("Root", Value::Reference(ObjRef::new(1, 0)))]);
        doc
    }

    #[test]
    fn test_cropbox_converted_to_native() {
        let mut doc = paged_doc();
        let config = Config {
            cropbox: Some((0.0, 0.0, 25.4, 50.8)),
            unit: Unit::Mm,
            ..Default::default()
        };
        CropBoxFilter::new().run(&mut doc, &config).unwrap();
        let cropbox = doc
            .get(ObjRef::new(3, 0))
            .unwrap()
            .get("CropBox")
            .unwrap()
            .as_array()
            .unwrap()
            .clone();
        // 25.4 mm is one inch is 72 native units.
        assert!((cropbox[2].as_number().unwrap() - 72.0).abs() < 1e-9);
        assert!((cropbox[3].as_number().unwrap() - 144.0).abs() < 1e-9);
    }

    #[test]
    fn test_without_config_is_noop() {
        let mut doc = paged_doc();
        CropBoxFilter::new().run(&mut doc, &Config::default()).unwrap();
        assert!(doc.get(ObjRef::new(3, 0)).unwrap().get("CropBox").is_none());
    }
}
