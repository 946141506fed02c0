//! Reference relinker.
//!
//! Rewrites all indirect references across the object graph according to an
//! old-to-new mapping: objects whose identity is an old key are renamed,
//! and every reference anywhere in any content tree is rewritten through
//! the mapping (unmapped references pass through unchanged). Every observed
//! reference is recorded, enabling orphan and resolution analysis after the
//! run.
//!
//! The relinker materializes the relinked objects first and swaps them in
//! atomically, so a failing walk never leaves the document half-updated.

use std::collections::{HashMap, HashSet};

use crate::document::Document;
use crate::object::{ObjRef, Object};

/// Old-to-new reference rewriter with reference bookkeeping.
#[derive(Debug, Default)]
pub struct Relinker {
    mapping: HashMap<ObjRef, ObjRef>,
    references: HashSet<ObjRef>,
}

impl Relinker {
    /// Create a relinker with an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one old-to-new renaming.
    pub fn relink(&mut self, old: ObjRef, new: ObjRef) {
        self.mapping.insert(old, new);
    }

    /// The new reference an old one maps to, if registered.
    pub fn mapped(&self, old: ObjRef) -> Option<ObjRef> {
        self.mapping.get(&old).copied()
    }

    /// All indirect references observed during the run.
    pub fn references(&self) -> &HashSet<ObjRef> {
        &self.references
    }

    /// Observed references with no mapping entry and no object of that
    /// identity in the given document.
    pub fn unresolved_references(&self, doc: &Document) -> Vec<ObjRef> {
        let mut unresolved: Vec<ObjRef> = self
            .references
            .iter()
            .filter(|r| !self.mapping.contains_key(r) && doc.get(**r).is_none())
            .copied()
            .collect();
        unresolved.sort();
        unresolved
    }

    /// Apply the mapping to a whole document.
    pub fn run(&mut self, doc: &mut Document) {
        // Rebuild every object against the mapping first.
        let mut relinked: Vec<Object> = Vec::with_capacity(doc.len());
        for object in doc.objects() {
            let content = object.content.map_refs(&mut |r| {
                self.references.insert(r);
                self.mapping.get(&r).copied().unwrap_or(r)
            });
            let xref = self.mapping.get(&object.xref).copied().unwrap_or(object.xref);
            relinked.push(Object {
                xref,
                content,
                stream: object.stream.clone(),
            });
        }

        // The trailer is walked for bookkeeping and rewritten too.
        let trailer = crate::object::Value::Dictionary(doc.trailer.clone()).map_refs(&mut |r| {
            self.references.insert(r);
            self.mapping.get(&r).copied().unwrap_or(r)
        });

        // Atomic swap: delete renamed identities, then insert the rebuilt set.
        for old in self.mapping.keys() {
            doc.delete(old.id, old.gen);
        }
        for object in relinked {
            doc.replace(object);
        }
        if let crate::object::Value::Dictionary(dict) = trailer {
            doc.trailer = dict;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{dict_of, Name, Value};

    fn sample_doc() -> Document {
        let mut doc = Document::new("1.5");
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
            Value::Dictionary(dict_of(vec![(
                "Kids",
                Value::Array(vec![Value::Reference(ObjRef::new(3, 0))]),
            )])),
        ));
        doc.replace(Object::new(3, 0, Value::Null));
        doc.trailer = dict_of(vec![("Root", Value::Reference(ObjRef::new(1, 0)))]);
        doc
    }

    #[test]
    fn test_relink_renames_object_and_references() {
        let mut doc = sample_doc();
        let mut relinker = Relinker::new();
        relinker.relink(ObjRef::new(3, 0), ObjRef::new(9, 0));
        relinker.run(&mut doc);

        assert!(doc.get(ObjRef::new(3, 0)).is_none());
        assert!(doc.get(ObjRef::new(9, 0)).is_some());
        let kids = doc
            .get(ObjRef::new(2, 0))
            .unwrap()
            .get("Kids")
            .unwrap()
            .as_array()
            .unwrap()
            .clone();
        assert_eq!(kids[0].as_reference(), Some(ObjRef::new(9, 0)));
    }

    #[test]
    fn test_unmapped_references_pass_through() {
        let mut doc = sample_doc();
        let mut relinker = Relinker::new();
        relinker.relink(ObjRef::new(3, 0), ObjRef::new(9, 0));
        relinker.run(&mut doc);
        // 1 -> 2 is untouched
        assert_eq!(
            doc.get(ObjRef::new(1, 0)).unwrap().get("Pages").unwrap().as_reference(),
            Some(ObjRef::new(2, 0))
        );
        // trailer still points at the catalog
        assert_eq!(
            doc.trailer.get(&Name::new("Root")).unwrap().as_reference(),
            Some(ObjRef::new(1, 0))
        );
    }

    #[test]
    fn test_references_are_recorded() {
        let mut doc = sample_doc();
        let mut relinker = Relinker::new();
        relinker.run(&mut doc);
        let mut seen: Vec<ObjRef> = relinker.references().iter().copied().collect();
        seen.sort();
        assert_eq!(
            seen,
            vec![ObjRef::new(1, 0), ObjRef::new(2, 0), ObjRef::new(3, 0)]
        );
    }

    #[test]
    fn test_unresolved_references() {
        let mut doc = sample_doc();
        // 2 now points at a missing object
        doc.replace(Object::new(
            2,
            0,
            Value::Dictionary(dict_of(vec![(
                "Kids",
                Value::Array(vec![Value::Reference(ObjRef::new(77, 0))]),
            )])),
        ));
        let mut relinker = Relinker::new();
        relinker.run(&mut doc);
        assert_eq!(relinker.unresolved_references(&doc), vec![ObjRef::new(77, 0)]);
    }

    #[test]
    fn test_totality_when_all_mapped_or_present() {
        let mut doc = sample_doc();
        let mut relinker = Relinker::new();
        relinker.relink(ObjRef::new(3, 0), ObjRef::new(9, 0));
        relinker.run(&mut doc);
        assert!(relinker.unresolved_references(&doc).is_empty());
    }

    #[test]
    fn test_trailer_references_rewritten() {
        let mut doc = sample_doc();
        let mut relinker = Relinker::new();
        relinker.relink(ObjRef::new(1, 0), ObjRef::new(11, 0));
        relinker.run(&mut doc);
        assert_eq!(
            doc.trailer.get(&Name::new("Root")).unwrap().as_reference(),
            Some(ObjRef::new(11, 0))
        );
        assert!(doc.get(ObjRef::new(11, 0)).is_some());
    }
}
