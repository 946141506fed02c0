//! DPI-driven image resampling.
//!
//! Every page's content stream is interpreted to find the world extents
//! each image is drawn at; the largest extent yields the image's minimum
//! effective dpi. Images whose minimum dpi exceeds the configured target
//! are resampled by the external rasterizer with scale
//! `min(target/current, 1)`; soft masks ride along. Rasterizer failures
//! are recorded and the original image is kept.

use std::collections::BTreeMap;

use crate::config::Config;
use crate::content::{parse_content_stream, DrawKind, Interpreter};
use crate::document::Document;
use crate::error::Result;
use crate::external::Rasterizer;
use crate::filters::DocumentFilter;
use crate::image::{PdfImage, Reformatter};
use crate::object::{ObjRef, Value};

/// Resamples over-resolved images down to the target dpi.
pub struct DownscaleFilter {
    rasterizer: Box<dyn Rasterizer>,
    bytes_saved: i64,
}

impl DownscaleFilter {
    /// Create the filter around a rasterizer.
    pub fn new(rasterizer: Box<dyn Rasterizer>) -> Self {
        DownscaleFilter {
            rasterizer,
            bytes_saved: 0,
        }
    }

    /// Largest drawn extents per image across every page.
    fn measure_extents(&self, doc: &Document, config: &Config) -> BTreeMap<ObjRef, (f64, f64)> {
        let mut max_extents: BTreeMap<ObjRef, (f64, f64)> = BTreeMap::new();
        for page_ref in doc.pages() {
            let content = match doc.page_content(page_ref) {
                Ok(content) => content,
                Err(e) => {
                    log::warn!("cannot read content of page {}: {}", page_ref, e);
                    continue;
                }
            };
            let ops = match parse_content_stream(&content) {
                Ok(ops) => ops,
                Err(e) => {
                    log::warn!("cannot parse content of page {}: {}", page_ref, e);
                    continue;
                }
            };
            for event in Interpreter::new(doc, page_ref).run(&ops) {
                let mut width = event.extents.width.abs();
                let mut height = event.extents.height.abs();
                if event.kind == DrawKind::Pattern {
                    width *= config.pattern_extent_correction;
                    height *= config.pattern_extent_correction;
                }
                let entry = max_extents.entry(event.image).or_insert((0.0, 0.0));
                entry.0 = entry.0.max(width);
                entry.1 = entry.1.max(height);
            }
        }
        max_extents
    }
}

impl DocumentFilter for DownscaleFilter {
    fn name(&self) -> &'static str {
        "downscale"
    }

    fn run(&mut self, doc: &mut Document, config: &Config) -> Result<()> {
        let max_extents = self.measure_extents(doc, config);

        for (image_ref, (width, height)) in max_extents {
            if width <= 0.0 || height <= 0.0 {
                continue;
            }
            let image = match PdfImage::from_object(doc, image_ref) {
                Ok(image) => image,
                Err(e) => {
                    log::warn!("skipping image {}: {}", image_ref, e);
                    continue;
                }
            };

            let extents = crate::content::Extents {
                x: 0.0,
                y: 0.0,
                width,
                height,
            };
            let current_dpi = extents.dpi(image.width, image.height);
            log::debug!(
                "image {} drawn at {:.0}x{:.0} units, {:.0} dpi",
                image_ref,
                width,
                height,
                current_dpi
            );
            if current_dpi <= config.target_dpi as f64 {
                continue;
            }

            let scale = (config.target_dpi as f64 / current_dpi).min(1.0);
            let reformatter =
                Reformatter::new(self.rasterizer.as_ref(), scale, config.jpeg_quality);
            let old_size = image.total_size() as i64;
            let old_smask = doc
                .get(image_ref)
                .and_then(|obj| obj.get("SMask"))
                .and_then(Value::as_reference);

            match reformatter.reformat(&image, config.lossy_images, config.onebit_alpha) {
                Ok(resampled) => {
                    let new_size = resampled.total_size() as i64;
                    log::debug!(
                        "resampled {} with factor {:.3}: {} -> {} bytes",
                        image_ref,
                        scale,
                        old_size,
                        new_size
                    );
                    self.bytes_saved += old_size - new_size;
                    let (object, smask_object) = resampled.into_objects(image_ref, old_smask);
                    doc.replace(object);
                    if let Some(smask_object) = smask_object {
                        doc.replace(smask_object);
                    }
                }
                Err(e) => {
                    log::warn!("resampling {} failed, keeping original: {}", image_ref, e);
                }
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
    use crate::codec::{flate_compress, flate_decompress};
    use crate::error::Error;
    use crate::external::RasterInfo;
    use crate::object::{dict_of, Name, Object};
    use std::path::Path;

    /// Rasterizer producing a fixed 2x2 gray PNM regardless of input.
    struct StubRasterizer;

    impl Rasterizer for StubRasterizer {
        fn convert(&self, _src: &Path, _flags: &[String], dst: &Path) -> Result<()> {
            std::fs::write(dst, b"P5\n2 2\n255\n\x01\x02\x03\x04")?;
            Ok(())
        }

        fn identify(&self, _path: &Path) -> Result<RasterInfo> {
            Ok(RasterInfo {
                width: 2,
                height: 2,
                colorspace: "Gray".to_string(),
                depth: 8,
            })
        }
    }

    struct BrokenRasterizer;

    impl Rasterizer for BrokenRasterizer {
        fn convert(&self, _src: &Path, _flags: &[String], _dst: &Path) -> Result<()> {
            Err(Error::ExternalTool {
                tool: "convert".to_string(),
                reason: "unavailable".to_string(),
            })
        }

        fn identify(&self, _path: &Path) -> Result<RasterInfo> {
            Err(Error::ExternalTool {
                tool: "identify".to_string(),
                reason: "unavailable".to_string(),
            })
        }
    }

    /// One page drawing a 16x16 gray image into a tiny 7.2-unit square,
    /// i.e. at 160 dpi.
    fn over_resolved_doc() -> Document {
        let mut doc = Document::new("1.5");
        let content = b"q 7.2 0 0 7.2 0 0 cm /Im0 Do Q";
        let content_stream = flate_compress(content);
        let mut content_dict = dict_of(vec![(
            "Filter",
            Value::Name(Name::new("FlateDecode")),
        )]);
        content_dict.insert(
            Name::new("Length"),
            Value::Integer(content_stream.len() as i64),
        );

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
            Value::Dictionary(dict_of(vec![
                ("Type", Value::Name(Name::new("Page"))),
                ("Contents", Value::Reference(ObjRef::new(4, 0))),
                (
                    "Resources",
                    Value::Dictionary(dict_of(vec![(
                        "XObject",
                        Value::Dictionary(dict_of(vec![(
                            "Im0",
                            Value::Reference(ObjRef::new(5, 0)),
                        )])),
                    )])),
                ),
            ])),
        ));
        doc.replace(Object::with_stream(
            4,
            0,
            Value::Dictionary(content_dict),
            content_stream,
        ));
        doc.replace(Object::with_stream(
            5,
            0,
            Value::Dictionary(dict_of(vec![
                ("Type", Value::Name(Name::new("XObject"))),
                ("Subtype", Value::Name(Name::new("Image"))),
                ("Filter", Value::Name(Name::new("FlateDecode"))),
                ("Width", Value::Integer(16)),
                ("Height", Value::Integer(16)),
                ("BitsPerComponent", Value::Integer(8)),
                ("ColorSpace", Value::Name(Name::new("DeviceGray"))),
            ])),
            flate_compress(&(0..=255u8).collect::<Vec<u8>>()),
        ));
        doc.trailer = dict_of(vec![("Root", Value::Reference(ObjRef::new(1, 0)))]);
        doc
    }

    #[test]
    fn test_over_resolved_image_replaced() {
        let mut doc = over_resolved_doc();
        let config = Config {
            target_dpi: 72,
            ..Default::default()
        };
        let mut filter = DownscaleFilter::new(Box::new(StubRasterizer));
        filter.run(&mut doc, &config).unwrap();

        let image = doc.get(ObjRef::new(5, 0)).unwrap();
        assert_eq!(image.get("Width").and_then(Value::as_integer), Some(2));
        assert_eq!(image.get("Height").and_then(Value::as_integer), Some(2));
        let pixels = flate_decompress(image.stream.as_ref().unwrap()).unwrap();
        assert_eq!(pixels, vec![1, 2, 3, 4]);
        assert!(filter.bytes_saved() > 0);
    }

    #[test]
    fn test_image_within_target_untouched() {
        let mut doc = over_resolved_doc();
        let original = doc.get(ObjRef::new(5, 0)).unwrap().clone();
        let config = Config {
            target_dpi: 600,
            ..Default::default()
        };
        DownscaleFilter::new(Box::new(StubRasterizer))
            .run(&mut doc, &config)
            .unwrap();
        assert_eq!(doc.get(ObjRef::new(5, 0)).unwrap(), &original);
    }

    #[test]
    fn test_rasterizer_failure_keeps_original() {
        let mut doc = over_resolved_doc();
        let original = doc.get(ObjRef::new(5, 0)).unwrap().clone();
        let config = Config {
            target_dpi: 72,
            ..Default::default()
        };
        let mut filter = DownscaleFilter::new(Box::new(BrokenRasterizer));
        filter.run(&mut doc, &config).unwrap();
        assert_eq!(doc.get(ObjRef::new(5, 0)).unwrap(), &original);
        assert_eq!(filter.bytes_saved(), 0);
    }

    #[test]
    fn test_extent_measurement_uses_maximum() {
        let mut doc = over_resolved_doc();
        // Draw the same image twice: once tiny, once page-filling. The
        // page-filling draw dominates and drops the effective dpi below
        // any reasonable target.
        let content = b"q 7.2 0 0 7.2 0 0 cm /Im0 Do Q q 720 0 0 720 0 0 cm /Im0 Do Q";
        let stream = flate_compress(content);
        let mut dict = dict_of(vec![("Filter", Value::Name(Name::new("FlateDecode")))]);
        dict.insert(Name::new("Length"), Value::Integer(stream.len() as i64));
        doc.replace(Object::with_stream(4, 0, Value::Dictionary(dict), stream));

        let filter = DownscaleFilter::new(Box::new(StubRasterizer));
        let extents = filter.measure_extents(&doc, &Config::default());
        assert_eq!(extents[&ObjRef::new(5, 0)], (720.0, 720.0));
        // 16 pixels over 10 inches is well under any target.
        let mut doc2 = doc;
        let original = doc2.get(ObjRef::new(5, 0)).unwrap().clone();
        DownscaleFilter::new(Box::new(StubRasterizer))
            .run(&mut doc2, &Config::default())
            .unwrap();
        assert_eq!(doc2.get(ObjRef::new(5, 0)).unwrap(), &original);
    }
}
