//! Orphan removal.
//!
//! Deletes every object that is unreachable from the trailer. Reachability
//! is computed transitively, so chains of mutually-referencing orphans
//! disappear in a single run and the filter is idempotent.

use std::collections::HashSet;

use crate::config::Config;
use crate::document::Document;
use crate::error::Result;
use crate::filters::DocumentFilter;
use crate::object::{ObjRef, Value};

/// Deletes objects unreachable from the trailer.
#[derive(Debug, Default)]
pub struct OrphanFilter {
    bytes_saved: i64,
}

impl OrphanFilter {
    /// Create the filter.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentFilter for OrphanFilter {
    fn name(&self) -> &'static str {
        "orphans"
    }

    fn run(&mut self, doc: &mut Document, _config: &Config) -> Result<()> {
        let mut reachable: HashSet<ObjRef> = HashSet::new();
        let mut frontier: Vec<ObjRef> = Vec::new();
        Value::Dictionary(doc.trailer.clone()).visit_refs(&mut |r| frontier.push(r));

        while let Some(xref) = frontier.pop() {
            if !reachable.insert(xref) {
                continue;
            }
            if let Some(object) = doc.get(xref) {
                object.content.visit_refs(&mut |r| {
                    if !reachable.contains(&r) {
                        frontier.push(r);
                    }
                });
            }
        }

        let orphans: Vec<ObjRef> = doc
            .objects()
            .map(|obj| obj.xref)
            .filter(|r| !reachable.contains(r))
            .collect();
        log::debug!(
            "{} objects total, {} reachable, deleting {} orphans",
            doc.len(),
            doc.len() - orphans.len(),
            orphans.len()
        );
        for orphan in orphans {
            if let Some(object) = doc.get(orphan) {
                self.bytes_saved += object.stream_len() as i64;
            }
            doc.delete(orphan.id, orphan.gen);
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
    use crate::object::{dict_of, Object};

    fn doc_with_orphans() -> Document {
        let mut doc = Document::new("1.5");
        doc.replace(Object::new(
            1,
            0,
            Value::Dictionary(dict_of(vec![(
                "Pages",
                Value::Reference(ObjRef::new(2, 0)),
            )])),
        ));
        doc.replace(Object::new(2, 0, Value::Null));
        // Orphan chain: 5 references 6; neither is reachable.
        doc.replace(Object::new(
            5,
            0,
            Value::Dictionary(dict_of(vec![(
                "Next",
                Value::Reference(ObjRef::new(6, 0)),
            )])),
        ));
        doc.replace(Object::with_stream(6, 0, Value::Dictionary(dict_of(vec![])), vec![0; 32]));
        doc.trailer = dict_of(vec![("Root", Value::Reference(ObjRef::new(1, 0)))]);
        doc
    }

    #[test]
    fn test_orphan_chain_removed_in_one_run() {
        let mut doc = doc_with_orphans();
        let mut filter = OrphanFilter::new();
        filter.run(&mut doc, &Config::default()).unwrap();
        assert_eq!(doc.len(), 2);
        assert!(doc.get(ObjRef::new(5, 0)).is_none());
        assert!(doc.get(ObjRef::new(6, 0)).is_none());
        assert_eq!(filter.bytes_saved(), 32);
    }

    #[test]
    fn test_idempotent() {
        let mut doc = doc_with_orphans();
        OrphanFilter::new().run(&mut doc, &Config::default()).unwrap();
        let after_first: Vec<ObjRef> = doc.objects().map(|o| o.xref).collect();
        OrphanFilter::new().run(&mut doc, &Config::default()).unwrap();
        let after_second: Vec<ObjRef> = doc.objects().map(|o| o.xref).collect();
        assert_eq!(after_first, after_second);
    }

    #[test]
    fn test_reachable_set_unchanged() {
        let mut doc = doc_with_orphans();
        let catalog_before = doc.get(ObjRef::new(1, 0)).unwrap().clone();
        OrphanFilter::new().run(&mut doc, &Config::default()).unwrap();
        assert_eq!(doc.get(ObjRef::new(1, 0)).unwrap(), &catalog_before);
        assert!(doc.get(ObjRef::new(2, 0)).is_some());
    }

    #[test]
    fn test_ten_objects_three_unreferenced() {
        let mut doc = Document::new("1.5");
        // 1 is the root referencing 2..=7 in a chain; 8, 9, 10 are loose.
        for id in 1..=7u32 {
            let content = if id < 7 {
                Value::Dictionary(dict_of(vec![(
                    "Next",
                    Value::Reference(ObjRef::new(id + 1, 0)),
                )]))
            } else {
                Value::Null
            };
            doc.replace(Object::new(id, 0, content));
        }
        for id in 8..=10u32 {
            doc.replace(Object::new(id, 0, Value::Integer(id as i64)));
        }
        doc.trailer = dict_of(vec![("Root", Value::Reference(ObjRef::new(1, 0)))]);

        let mut filter = OrphanFilter::new();
        filter.run(&mut doc, &Config::default()).unwrap();
        assert_eq!(doc.len(), 7);
        for id in 8..=10u32 {
            assert!(doc.get(ObjRef::new(id, 0)).is_none());
        }
    }
}
