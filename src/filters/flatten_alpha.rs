//! Alpha flattening.
//!
//! Every soft-masked image is composited over a configured background
//! color by the external rasterizer; the mask reference is dropped (the
//! mask object itself becomes an orphan for the orphan sweep).

use crate::config::Config;
use crate::document::Document;
use crate::error::Result;
use crate::external::Rasterizer;
use crate::filters::DocumentFilter;
use crate::image::{PdfImage, Reformatter};
use crate::object::Value;

/// Composites soft-masked images over the background color.
pub struct FlattenAlphaFilter {
    rasterizer: Box<dyn Rasterizer>,
    bytes_saved: i64,
}

impl FlattenAlphaFilter {
    /// Create the filter around a rasterizer.
    pub fn new(rasterizer: Box<dyn Rasterizer>) -> Self {
        FlattenAlphaFilter {
            rasterizer,
            bytes_saved: 0,
        }
    }
}

impl DocumentFilter for FlattenAlphaFilter {
    fn name(&self) -> &'static str {
        "flatten-alpha"
    }

    fn run(&mut self, doc: &mut Document, config: &Config) -> Result<()> {
        let reformatter = Reformatter::new(self.rasterizer.as_ref(), 1.0, config.jpeg_quality);

        for image_ref in doc.image_objects() {
            let object = doc.get(image_ref).expect("listed above");
            if object.get("SMask").and_then(Value::as_reference).is_none() {
                continue;
            }

            let image = match PdfImage::from_object(doc, image_ref) {
                Ok(image) => image,
                Err(e) => {
                    log::warn!("cannot load soft-masked image {}: {}", image_ref, e);
                    continue;
                }
            };
            let old_size = image.total_size() as i64;
            match reformatter.flatten(&image, &config.background_color) {
                Ok(flattened) => {
                    self.bytes_saved += old_size - flattened.data.len() as i64;
                    let (object, _) = flattened.into_objects(image_ref, None);
                    doc.replace(object);
                }
                Err(e) => {
                    log::warn!("flattening {} failed, keeping original: {}", image_ref, e);
                }
            }
        }
        Ok(())
    }

    fn bytes_saved(&self) -> i64 {
        self.bytes_saved
    }
}
