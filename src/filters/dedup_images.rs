//! Duplicate-image coalescing.
//!
//! Images are grouped by a digest of their raw stream bytes. Within each
//! group the lowest-id object is kept as canonical; every reference to a
//! duplicate is relinked onto it and the duplicates are deleted.

use indexmap::IndexMap;
use md5::{Digest, Md5};

use crate::config::Config;
use crate::document::Document;
use crate::error::Result;
use crate::filters::DocumentFilter;
use crate::object::ObjRef;
use crate::relink::Relinker;

/// Coalesces byte-identical images.
#[derive(Debug, Default)]
pub struct DedupImagesFilter {
    bytes_saved: i64,
}

impl DedupImagesFilter {
    /// Create the filter.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentFilter for DedupImagesFilter {
    fn name(&self) -> &'static str {
        "dedup-images"
    }

    fn run(&mut self, doc: &mut Document, _config: &Config) -> Result<()> {
        // Insertion order follows ascending object id, keeping the
        // grouping deterministic.
        let mut groups: IndexMap<[u8; 16], Vec<ObjRef>> = IndexMap::new();
        for image_ref in doc.image_objects() {
            let object = doc.get(image_ref).expect("listed above");
            let stream = object.stream.as_deref().unwrap_or(&[]);
            let digest: [u8; 16] = Md5::digest(stream).into();
            groups.entry(digest).or_default().push(image_ref);
        }

        let mut relinker = Relinker::new();
        for (_, members) in groups {
            let [canonical, duplicates @ ..] = members.as_slice() else {
                continue;
            };
            if duplicates.is_empty() {
                continue;
            }
            let size = doc.get(*canonical).expect("grouped above").stream_len() as i64;
            log::debug!(
                "relinking {} duplicates of {} ({} bytes each)",
                duplicates.len(),
                canonical,
                size
            );
            for duplicate in duplicates {
                relinker.relink(*duplicate, *canonical);
                doc.delete(duplicate.id, duplicate.gen);
                self.bytes_saved += size;
            }
        }
        relinker.run(doc);
        Ok(())
    }

    fn bytes_saved(&self) -> i64 {
        self.bytes_saved
    }
}
