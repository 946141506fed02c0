//! Image model and the bridge to the external rasterizer.
//!
//! A [`PdfImage`] carries the pixel payload of an image XObject in its
//! stored codec (Flate or RunLength over raw samples, or opaque JPEG)
//! plus an optional soft-mask alpha channel. Images travel to and from
//! the raster tool as PNM (lossless) or JPEG files in a scoped temporary
//! directory.

use std::path::{Path, PathBuf};

use crate::codec::{flate_compress, EncodedStream};
use crate::document::Document;
use crate::error::{Error, Result};
use crate::external::Rasterizer;
use crate::object::{dict_of, Name, ObjRef, Object, Value};

/// Storage codec of an image payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageCodec {
    /// Flate-compressed raw samples
    Flate,
    /// JPEG (opaque, lossy)
    Dct,
    /// Run-length-encoded raw samples
    RunLength,
}

impl ImageCodec {
    fn from_filter_name(name: &Name) -> Option<Self> {
        match name.as_str() {
            "FlateDecode" => Some(ImageCodec::Flate),
            "DCTDecode" => Some(ImageCodec::Dct),
            "RunLengthDecode" => Some(ImageCodec::RunLength),
            _ => None,
        }
    }

    fn filter_name(&self) -> Name {
        match self {
            ImageCodec::Flate => Name::new("FlateDecode"),
            ImageCodec::Dct => Name::new("DCTDecode"),
            ImageCodec::RunLength => Name::new("RunLengthDecode"),
        }
    }

    /// File extension used when exchanging with the raster tool.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageCodec::Flate | ImageCodec::RunLength => "pnm",
            ImageCodec::Dct => "jpg",
        }
    }

    /// Whether the codec preserves samples exactly.
    pub fn is_lossless(&self) -> bool {
        !matches!(self, ImageCodec::Dct)
    }
}

/// Color space of the samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageColorSpace {
    /// 8-bit (or 1-bit) gray
    DeviceGray,
    /// 8-bit RGB triplets
    DeviceRgb,
}

/// An image extracted from (or destined for) an image XObject.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfImage {
    /// Pixel width
    pub width: u32,
    /// Pixel height
    pub height: u32,
    /// Sample color space
    pub colorspace: ImageColorSpace,
    /// Bits per component (1 or 8)
    pub bits_per_component: u32,
    /// Encoded payload in `codec` form
    pub data: Vec<u8>,
    /// Storage codec
    pub codec: ImageCodec,
    /// Soft-mask alpha channel
    pub alpha: Option<Box<PdfImage>>,
}

impl PdfImage {
    /// Build an image from an image XObject, resolving its /SMask.
    pub fn from_object(doc: &Document, xref: ObjRef) -> Result<PdfImage> {
        let object = doc.get(xref).ok_or(Error::ObjectNotFound(xref.id, xref.gen))?;
        let mut image = Self::raw_from_object(doc, object)?;
        if let Some(smask_ref) = object.get("SMask").and_then(Value::as_reference) {
            let smask = doc
                .get(smask_ref)
                .ok_or(Error::ObjectNotFound(smask_ref.id, smask_ref.gen))?;
            image.alpha = Some(Box::new(Self::raw_from_object(doc, smask)?));
        }
        Ok(image)
    }

    fn raw_from_object(doc: &Document, object: &Object) -> Result<PdfImage> {
        let stream = object.stream.as_ref().ok_or_else(|| {
            Error::ImageDecode(format!("image {} has no stream", object.xref))
        })?;

        let filter = match object.get("Filter").map(|v| doc.deref(v)) {
            Some(Value::Name(name)) => name.clone(),
            Some(Value::Array(filters)) if filters.len() == 1 => filters[0]
                .as_name()
                .cloned()
                .ok_or_else(|| Error::ImageDecode("non-name /Filter entry".to_string()))?,
            Some(other) => {
                return Err(Error::ImageDecode(format!(
                    "unsupported /Filter shape {} on image {}",
                    other.type_name(),
                    object.xref
                )))
            }
            None => Name::new("FlateDecode"), // raw samples are rewrapped below
        };
        let codec = ImageCodec::from_filter_name(&filter).ok_or_else(|| {
            Error::ImageDecode(format!("image {} uses filter /{}", object.xref, filter.as_str()))
        })?;

        // An unfiltered image is normalized to Flate so the payload always
        // matches its declared codec.
        let data = if object.get("Filter").is_none() {
            flate_compress(stream)
        } else {
            stream.clone()
        };

        let colorspace = match object.get("ColorSpace").map(|v| doc.deref(v)) {
            Some(Value::Name(name)) if name.as_str() == "DeviceRGB" => ImageColorSpace::DeviceRgb,
            Some(Value::Name(name)) if name.as_str() == "DeviceGray" => {
                ImageColorSpace::DeviceGray
            }
            other => {
                return Err(Error::ImageDecode(format!(
                    "unsupported color space {:?} on image {}",
                    other.map(Value::type_name),
                    object.xref
                )))
            }
        };

        let width = object
            .get("Width")
            .and_then(Value::as_integer)
            .filter(|w| *w > 0)
            .ok_or_else(|| Error::ImageDecode(format!("image {} missing /Width", object.xref)))?;
        let height = object
            .get("Height")
            .and_then(Value::as_integer)
            .filter(|h| *h > 0)
            .ok_or_else(|| Error::ImageDecode(format!("image {} missing /Height", object.xref)))?;
        let bits = object
            .get("BitsPerComponent")
            .and_then(Value::as_integer)
            .unwrap_or(8);

        Ok(PdfImage {
            width: width as u32,
            height: height as u32,
            colorspace,
            bits_per_component: bits as u32,
            data,
            codec,
            alpha: None,
        })
    }

    /// Decode the payload to raw samples; opaque codecs fail.
    pub fn pixel_data(&self) -> Result<Vec<u8>> {
        let encoded = EncodedStream::new(
            self.data.clone(),
            match self.codec {
                ImageCodec::Flate => crate::codec::StreamFilter::Flate,
                ImageCodec::RunLength => crate::codec::StreamFilter::RunLength,
                ImageCodec::Dct => crate::codec::StreamFilter::Dct,
            },
            crate::codec::Predictor::None,
            1,
        );
        encoded.decode()
    }

    /// Encoded payload size plus the alpha channel's.
    pub fn total_size(&self) -> usize {
        self.data.len() + self.alpha.as_ref().map(|a| a.data.len()).unwrap_or(0)
    }

    /// Write the image as a file the raster tool understands.
    pub fn write_file(&self, path: &Path) -> Result<()> {
        match self.codec {
            ImageCodec::Dct => std::fs::write(path, &self.data)?,
            ImageCodec::Flate | ImageCodec::RunLength => {
                std::fs::write(path, self.to_pnm()?)?
            }
        }
        Ok(())
    }

    /// Serialize raw samples as PNM (P4 bitmap, P5 graymap or P6 pixmap).
    pub fn to_pnm(&self) -> Result<Vec<u8>> {
        let pixels = self.pixel_data()?;
        let header = match (self.colorspace, self.bits_per_component) {
            (ImageColorSpace::DeviceRgb, 8) => format!("P6\n{} {}\n255\n", self.width, self.height),
            (ImageColorSpace::DeviceGray, 8) => {
                format!("P5\n{} {}\n255\n", self.width, self.height)
            }
            (ImageColorSpace::DeviceGray, 1) => format!("P4\n{} {}\n", self.width, self.height),
            (colorspace, bits) => {
                return Err(Error::ImageEncode(format!(
                    "no PNM form for {:?} at {} bits",
                    colorspace, bits
                )))
            }
        };
        let mut out = header.into_bytes();
        out.extend_from_slice(&pixels);
        Ok(out)
    }

    /// Read a raster-tool output file back into an image.
    pub fn from_file(path: &Path, codec: ImageCodec, rasterizer: &dyn Rasterizer) -> Result<PdfImage> {
        match codec {
            ImageCodec::Flate => {
                let bytes = std::fs::read(path)?;
                let (width, height, colorspace, bits, pixels) = parse_pnm(&bytes)?;
                Ok(PdfImage {
                    width,
                    height,
                    colorspace,
                    bits_per_component: bits,
                    data: flate_compress(&pixels),
                    codec: ImageCodec::Flate,
                    alpha: None,
                })
            }
            ImageCodec::Dct => {
                let data = std::fs::read(path)?;
                let info = rasterizer.identify(path)?;
                let colorspace = if info.colorspace.contains("Gray") {
                    ImageColorSpace::DeviceGray
                } else {
                    ImageColorSpace::DeviceRgb
                };
                Ok(PdfImage {
                    width: info.width,
                    height: info.height,
                    colorspace,
                    bits_per_component: info.depth,
                    data,
                    codec: ImageCodec::Dct,
                    alpha: None,
                })
            }
            ImageCodec::RunLength => Err(Error::ImageEncode(
                "encoding into run-length is unsupported".to_string(),
            )),
        }
    }

    /// Build the image XObject replacing `xref`, plus the soft-mask object
    /// when an alpha channel is present (written under `smask_ref`).
    pub fn into_objects(self, xref: ObjRef, smask_ref: Option<ObjRef>) -> (Object, Option<Object>) {
        let alpha = self.alpha;
        let mut dict = dict_of(vec![
            ("Type", Value::Name(Name::new("XObject"))),
            ("Subtype", Value::Name(Name::new("Image"))),
            ("Filter", Value::Name(self.codec.filter_name())),
            ("Width", Value::Integer(self.width as i64)),
            ("Height", Value::Integer(self.height as i64)),
            (
                "BitsPerComponent",
                Value::Integer(self.bits_per_component as i64),
            ),
            (
                "ColorSpace",
                Value::Name(Name::new(match self.colorspace {
                    ImageColorSpace::DeviceRgb => "DeviceRGB",
                    ImageColorSpace::DeviceGray => "DeviceGray",
                })),
            ),
            ("Length", Value::Integer(self.data.len() as i64)),
            ("Interpolate", Value::Boolean(true)),
        ]);

        let alpha_object = match (alpha, smask_ref) {
            (Some(alpha), Some(smask_ref)) => {
                dict.insert(Name::new("SMask"), Value::Reference(smask_ref));
                let (object, _) = alpha.into_objects(smask_ref, None);
                Some(object)
            }
            _ => None,
        };

        (
            Object::with_stream(xref.id, xref.gen, Value::Dictionary(dict), self.data),
            alpha_object,
        )
    }
}

/// Parse a binary PNM file (P4/P5/P6).
fn parse_pnm(bytes: &[u8]) -> Result<(u32, u32, ImageColorSpace, u32, Vec<u8>)> {
    let mut fields = PnmHeader { bytes, pos: 2 };
    let magic = bytes.get(..2).ok_or_else(|| pnm_error("truncated header"))?;

    let (colorspace, bits, has_maxval) = match magic {
        b"P4" => (ImageColorSpace::DeviceGray, 1, false),
        b"P5" => (ImageColorSpace::DeviceGray, 8, true),
        b"P6" => (ImageColorSpace::DeviceRgb, 8, true),
        other => {
            return Err(pnm_error(&format!(
                "unsupported magic {:?}",
                String::from_utf8_lossy(other)
            )))
        }
    };

    let width = fields.next_int()?;
    let height = fields.next_int()?;
    if has_maxval {
        let maxval = fields.next_int()?;
        if maxval != 255 {
            return Err(pnm_error(&format!("unsupported maxval {}", maxval)));
        }
    }
    // A single whitespace byte separates the header from the samples.
    let data_start = fields.pos + 1;
    if data_start > bytes.len() {
        return Err(pnm_error("truncated samples"));
    }
    let data = bytes[data_start..].to_vec();
    Ok((width, height, colorspace, bits, data))
}

struct PnmHeader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl PnmHeader<'_> {
    fn next_int(&mut self) -> Result<u32> {
        while self
            .bytes
            .get(self.pos)
            .is_some_and(|b| b.is_ascii_whitespace())
        {
            self.pos += 1;
        }
        let start = self.pos;
        while self.bytes.get(self.pos).is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(pnm_error("expected integer in header"));
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos]).unwrap_or("");
        text.parse().map_err(|_| pnm_error("integer out of range"))
    }
}

fn pnm_error(reason: &str) -> Error {
    Error::ImageDecode(format!("pnm: {}", reason))
}

/// Drives the external raster tool to rescale, transcode and flatten
/// images. Every invocation exchanges files inside a scoped temporary
/// directory that is removed on all exit paths.
pub struct Reformatter<'a> {
    rasterizer: &'a dyn Rasterizer,
    scale: f64,
    jpeg_quality: u8,
}

impl<'a> Reformatter<'a> {
    /// Create a reformatter with a scale factor and JPEG quality.
    pub fn new(rasterizer: &'a dyn Rasterizer, scale: f64, jpeg_quality: u8) -> Self {
        Reformatter {
            rasterizer,
            scale,
            jpeg_quality,
        }
    }

    fn exchange_paths(
        &self,
        dir: &tempfile::TempDir,
        src_codec: ImageCodec,
        dst_codec: ImageCodec,
    ) -> (PathBuf, PathBuf) {
        (
            dir.path().join(format!("src.{}", src_codec.extension())),
            dir.path().join(format!("dst.{}", dst_codec.extension())),
        )
    }

    fn reformat_channel(
        &self,
        image: &PdfImage,
        target: ImageCodec,
        onebit_gray: bool,
    ) -> Result<PdfImage> {
        let dir = tempfile::tempdir()?;
        let (src, dst) = self.exchange_paths(&dir, image.codec, target);
        image.write_file(&src)?;

        let mut flags: Vec<String> = Vec::new();
        if (self.scale - 1.0).abs() > f64::EPSILON {
            flags.push("-scale".to_string());
            flags.push(format!("{}%", self.scale * 100.0));
        }
        if target == ImageCodec::Dct {
            flags.push("-quality".to_string());
            flags.push(self.jpeg_quality.to_string());
        }
        flags.push("+repage".to_string());
        if onebit_gray {
            flags.push("-colorspace".to_string());
            flags.push("Gray".to_string());
            flags.push("-depth".to_string());
            flags.push("1".to_string());
        }

        self.rasterizer.convert(&src, &flags, &dst)?;
        PdfImage::from_file(&dst, target, self.rasterizer)
    }

    /// Rescale an image (and its alpha channel) to the configured scale.
    ///
    /// With `lossy` set, Flate images are transcoded to JPEG; run-length
    /// images always land in Flate since run-length cannot be re-encoded.
    pub fn reformat(&self, image: &PdfImage, lossy: bool, onebit_alpha: bool) -> Result<PdfImage> {
        let target = if lossy && image.codec.is_lossless() {
            ImageCodec::Dct
        } else if image.codec == ImageCodec::RunLength {
            ImageCodec::Flate
        } else {
            image.codec
        };
        if target == image.codec && (self.scale - 1.0).abs() < f64::EPSILON {
            return Ok(image.clone());
        }

        let mut reformatted = self.reformat_channel(image, target, false)?;
        if let Some(alpha) = &image.alpha {
            reformatted.alpha = Some(Box::new(self.reformat_channel(
                alpha,
                ImageCodec::Flate,
                onebit_alpha,
            )?));
        }
        Ok(reformatted)
    }

    /// Composite an image over a background color through its soft mask,
    /// returning an opaque image without an alpha channel.
    pub fn flatten(&self, image: &PdfImage, background: &str) -> Result<PdfImage> {
        let Some(alpha) = &image.alpha else {
            return Ok(image.clone());
        };
        let dir = tempfile::tempdir()?;
        let (src, dst) = self.exchange_paths(&dir, image.codec, ImageCodec::Flate);
        let alpha_path = dir.path().join("alpha.pnm");
        image.write_file(&src)?;
        alpha.write_file(&alpha_path)?;

        let flags: Vec<String> = vec![
            alpha_path.to_string_lossy().into_owned(),
            "-alpha".to_string(),
            "off".to_string(),
            "-compose".to_string(),
            "CopyOpacity".to_string(),
            "-composite".to_string(),
            "-background".to_string(),
            background.to_string(),
            "-alpha".to_string(),
            "remove".to_string(),
            "-alpha".to_string(),
            "off".to_string(),
        ];
        self.rasterizer.convert(&src, &flags, &dst)?;
        PdfImage::from_file(&dst, ImageCodec::Flate, self.rasterizer)
    }
}
