//! Digital signature injection and ByteRange fixup.
//!
//! Signing happens in two phases. Before serialization, a `/Sig` object
//! is created whose /ByteRange and /Contents are marker placeholders: the
//! ByteRange is a fixed-width blank array and the /Contents a hex string
//! sized by a dry-run signature over an empty message. A widget
//! annotation carrying the appearance form is attached to the requested
//! page and an /AcroForm entry added to the catalog.
//!
//! After serialization, the recorded marker offsets drive the fixup: the
//! final ByteRange is written over its placeholder, the two ranges are
//! concatenated and signed, and the hex-encoded CMS lands between the
//! angle brackets of /Contents. A CMS that changes size between the dry
//! run and the fixup is fatal.

use crate::config::Config;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::external::Signer;
use crate::filters::DocumentFilter;
use crate::measure::{self, Unit};
use crate::object::{dict_of, Marker, Name, ObjRef, Object, Value};
use crate::template::PdfTemplate;
use crate::writer::WriteOutput;

const BYTERANGE_MARK: &str = "sig_byterange";
const CONTENTS_MARK: &str = "sig_contents";

/// Widget flags: Print (4) plus Locked (128).
const ANNOTATION_FLAGS: i64 = 132;
/// Field flags: ReadOnly.
const FIELD_FLAGS: i64 = 1;

const SIGNATURE_BOX_ASPECT: f64 = 16.0 / 9.0;

/// Injects a digital signature and patches it into the emitted file.
pub struct SignFilter {
    signer: Box<dyn Signer>,
    appearance_template: Option<Vec<u8>>,
    sig_length: Option<usize>,
}

impl SignFilter {
    /// Create the filter around a signer.
    pub fn new(signer: Box<dyn Signer>) -> Self {
        SignFilter {
            signer,
            appearance_template: None,
            sig_length: None,
        }
    }

    /// Use a template fragment (with an output named `form`) as the
    /// widget appearance instead of the built-in empty form.
    pub fn with_appearance_template(mut self, template: Vec<u8>) -> Self {
        self.appearance_template = Some(template);
        self
    }

    /// Signature widget rectangle `[x0, y0, x1, y1]` in native units.
    fn signature_rect(&self, config: &Config) -> (f64, f64, f64, f64) {
        let (x, y) = match config.signing.as_ref().and_then(|s| s.position) {
            Some((x, y)) => (
                measure::convert(x, config.unit, Unit::Native),
                measure::convert(y, config.unit, Unit::Native),
            ),
            None => {
                let edge = measure::convert(25.0, Unit::Mm, Unit::Native);
                (edge, edge)
            }
        };
        let width = measure::convert(50.0, Unit::Mm, Unit::Native).round();
        let height = (width / SIGNATURE_BOX_ASPECT).round();
        (x, y, width, height)
    }

    fn create_sig_object(&self, doc: &mut Document, config: &Config, placeholder: Vec<u8>) -> ObjRef {
        let signing = config.signing.as_ref().expect("checked by run");
        let mut content = dict_of(vec![
            ("Type", Value::Name(Name::new("Sig"))),
            ("Filter", Value::Name(Name::new("Adobe.PPKLite"))),
            ("SubFilter", Value::Name(Name::new("adbe.pkcs7.detached"))),
            (
                "ByteRange",
                Value::Marker(Marker::raw(
                    BYTERANGE_MARK,
                    format!("[ {}  ", " ".repeat(40)).into_bytes(),
                )),
            ),
            (
                "Contents",
                Value::Marker(Marker::child(CONTENTS_MARK, Value::String(placeholder))),
            ),
        ]);
        if let Some(name) = &signing.name {
            content.insert(Name::new("Name"), Value::String(name.clone().into_bytes()));
        }
        if let Some(location) = &signing.location {
            content.insert(
                Name::new("Location"),
                Value::String(location.clone().into_bytes()),
            );
        }
        if let Some(contact) = &signing.contact {
            content.insert(
                Name::new("ContactInfo"),
                Value::String(contact.clone().into_bytes()),
            );
        }
        if let Some(reason) = &signing.reason {
            content.insert(
                Name::new("Reason"),
                Value::String(reason.clone().into_bytes()),
            );
        }
        doc.add_object(Value::Dictionary(content))
    }

    /// The widget's appearance form: a merged template when configured,
    /// otherwise an empty form XObject spanning the signature box.
    fn create_appearance_form(
        &self,
        doc: &mut Document,
        width: f64,
        height: f64,
    ) -> Result<ObjRef> {
        if let Some(template) = &self.appearance_template {
            let template = PdfTemplate::parse(template)?;
            let outputs = template.merge_into(doc)?;
            return outputs.get("form").copied().ok_or_else(|| Error::Filter {
                filter: "sign".to_string(),
                reason: "appearance template exports no 'form' output".to_string(),
            });
        }

        let encoded = crate::codec::EncodedStream::create(b"% empty appearance\n", true, false, 1)?;
        let mut dict = dict_of(vec![
            ("Type", Value::Name(Name::new("XObject"))),
            ("Subtype", Value::Name(Name::new("Form"))),
            (
                "BBox",
                Value::Array(vec![
                    Value::Integer(0),
                    Value::Integer(0),
                    Value::Real(width),
                    Value::Real(height),
                ]),
            ),
        ]);
        encoded.update_dict(&mut dict);
        let id = doc.free_id();
        doc.replace(Object::with_stream(
            id,
            0,
            Value::Dictionary(dict),
            encoded.into_data(),
        ));
        Ok(ObjRef::new(id, 0))
    }

    /// Attach the annotation to the page, appending to any existing
    /// /Annots array.
    fn attach_annotation(&self, doc: &mut Document, page_ref: ObjRef, annot_ref: ObjRef) {
        let existing = doc.get(page_ref).and_then(|page| page.get("Annots")).cloned();
        match existing {
            Some(Value::Reference(array_ref)) => {
                if let Some(Value::Array(items)) =
                    doc.get_mut(array_ref).map(|obj| &mut obj.content)
                {
                    items.push(Value::Reference(annot_ref));
                    return;
                }
                log::warn!("page {} /Annots does not resolve to an array", page_ref);
            }
            Some(Value::Array(mut items)) => {
                items.push(Value::Reference(annot_ref));
                if let Some(dict) = doc.get_mut(page_ref).and_then(Object::dict_mut) {
                    dict.insert(Name::new("Annots"), Value::Array(items));
                }
                return;
            }
            _ => {}
        }
        let annots_ref = doc.add_object(Value::Array(vec![Value::Reference(annot_ref)]));
        if let Some(dict) = doc.get_mut(page_ref).and_then(Object::dict_mut) {
            dict.insert(Name::new("Annots"), Value::Reference(annots_ref));
        }
    }
}

impl DocumentFilter for SignFilter {
    fn name(&self) -> &'static str {
        "sign"
    }

    fn is_fatal(&self) -> bool {
        true
    }

    fn wants_fixup(&self) -> bool {
        true
    }

    fn run(&mut self, doc: &mut Document, config: &Config) -> Result<()> {
        let signing = config.signing.as_ref().ok_or_else(|| Error::Filter {
            filter: "sign".to_string(),
            reason: "signing configuration missing".to_string(),
        })?;

        let pages = doc.pages();
        let page_ref = pages
            .get(signing.page - 1)
            .copied()
            .ok_or_else(|| Error::Filter {
                filter: "sign".to_string(),
                reason: format!(
                    "signature page {} out of range ({} pages)",
                    signing.page,
                    pages.len()
                ),
            })?;

        // The dry run fixes the CMS size the placeholder must hold.
        let placeholder = self.signer.sign(b"")?;
        log::debug!("dry-run CMS signature is {} bytes", placeholder.len());
        self.sig_length = Some(placeholder.len());

        let (x, y, width, height) = self.signature_rect(config);
        let sig_ref = self.create_sig_object(doc, config, placeholder);
        let form_ref = self.create_appearance_form(doc, width, height)?;
        let lock_ref = doc.add_object(Value::Dictionary(dict_of(vec![
            ("Type", Value::Name(Name::new("SigFieldLock"))),
            ("P", Value::Integer(1)),
            ("Action", Value::Name(Name::new("All"))),
        ])));

        let annot_ref = doc.add_object(Value::Dictionary(dict_of(vec![
            ("Type", Value::Name(Name::new("Annot"))),
            ("Subtype", Value::Name(Name::new("Widget"))),
            (
                "Rect",
                Value::Array(vec![
                    Value::Real(x),
                    Value::Real(y),
                    Value::Real(x + width),
                    Value::Real(y + height),
                ]),
            ),
            ("T", Value::String(b"Digital Signature".to_vec())),
            ("P", Value::Reference(page_ref)),
            ("F", Value::Integer(ANNOTATION_FLAGS)),
            (
                "AP",
                Value::Dictionary(dict_of(vec![("N", Value::Reference(form_ref))])),
            ),
            ("Lock", Value::Reference(lock_ref)),
            ("FT", Value::Name(Name::new("Sig"))),
            ("V", Value::Reference(sig_ref)),
            ("Ff", Value::Integer(FIELD_FLAGS)),
        ])));

        self.attach_annotation(doc, page_ref, annot_ref);

        let acroform_ref = doc.add_object(Value::Dictionary(dict_of(vec![
            ("Fields", Value::Array(vec![Value::Reference(sig_ref)])),
            ("SigFlags", Value::Integer(3)),
        ])));
        let catalog_ref = doc
            .trailer
            .get(&Name::new("Root"))
            .and_then(Value::as_reference)
            .ok_or_else(|| Error::Filter {
                filter: "sign".to_string(),
                reason: "document has no catalog".to_string(),
            })?;
        if let Some(dict) = doc.get_mut(catalog_ref).and_then(Object::dict_mut) {
            dict.insert(Name::new("AcroForm"), Value::Reference(acroform_ref));
        }
        Ok(())
    }

    fn fixup(&mut self, output: &mut WriteOutput, _config: &Config) -> Result<()> {
        let sig_length = self.sig_length.ok_or_else(|| Error::Filter {
            filter: "sign".to_string(),
            reason: "fixup without a prior run".to_string(),
        })?;
        let contents_mark = output.mark(CONTENTS_MARK).ok_or_else(|| Error::Filter {
            filter: "sign".to_string(),
            reason: "serialized output carries no signature contents marker".to_string(),
        })?;
        let byterange_mark = output.mark(BYTERANGE_MARK).ok_or_else(|| Error::Filter {
            filter: "sign".to_string(),
            reason: "serialized output carries no byte-range marker".to_string(),
        })?;

        let file_size = output.bytes.len();
        let content_start = contents_mark;
        let content_end = content_start + 1 + 2 * sig_length;
        if content_end + 1 > file_size {
            return Err(Error::Filter {
                filter: "sign".to_string(),
                reason: "signature placeholder extends past end of file".to_string(),
            });
        }

        let byte_range = [
            0,
            content_start as i64,
            (content_end + 1) as i64,
            (file_size - content_end - 1) as i64,
        ];
        let byte_range_text = format!(
            "[ {} {} {} {} ]",
            byte_range[0], byte_range[1], byte_range[2], byte_range[3]
        );
        log::debug!(
            "signature covers ranges {:?} as {:?}",
            byte_range,
            byte_range_text
        );
        // The blank placeholder is 44 bytes wide.
        if byte_range_text.len() > 44 {
            return Err(Error::Filter {
                filter: "sign".to_string(),
                reason: format!("byte range {} exceeds its placeholder", byte_range_text),
            });
        }
        output.bytes[byterange_mark..byterange_mark + byte_range_text.len()]
            .copy_from_slice(byte_range_text.as_bytes());

        // Sign exactly the two ranges the file now declares.
        let mut payload = Vec::with_capacity(file_size - 2 * sig_length);
        payload.extend_from_slice(&output.bytes[..content_start]);
        payload.extend_from_slice(&output.bytes[content_end + 1..]);
        let signature = self.signer.sign(&payload)?;
        if signature.len() != sig_length {
            return Err(Error::SignatureSizeDrift {
                expected: sig_length,
                actual: signature.len(),
            });
        }

        let hex: String = signature.iter().map(|b| format!("{:02x}", b)).collect();
        output.bytes[content_start + 1..content_start + 1 + hex.len()]
            .copy_from_slice(hex.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SigningConfig;
    use crate::filters::Pipeline;
    use std::path::PathBuf;

    /// Deterministic fixed-size signer.
    struct FixedSigner {
        length: usize,
    }

    impl Signer for FixedSigner {
        fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
            let mut cms = vec![0xA5u8; self.length];
            // Mix the payload into the tail so tests can verify what was
            // signed, while keeping the length fixed.
            let digest: [u8; 16] = md5::Md5::digest(data).into();
            let tail = self.length.min(16);
            cms[self.length - tail..].copy_from_slice(&digest[..tail]);
            Ok(cms)
        }
    }

    /// Signer whose output length changes between invocations.
    struct DriftingSigner {
        calls: std::cell::Cell<usize>,
    }

    impl Signer for DriftingSigner {
        fn sign(&self, _data: &[u8]) -> Result<Vec<u8>> {
            let calls = self.calls.get();
            self.calls.set(calls + 1);
            Ok(vec![0u8; 100 + calls * 4])
        }
    }

    use md5::Digest;

    fn signing_config() -> Config {
        Config {
            signing: Some(SigningConfig {
                cert: PathBuf::from("cert.pem"),
                key: PathBuf::from("key.pem"),
                chain: None,
                page: 1,
                position: None,
                reason: Some("approval".to_string()),
                location: None,
                contact: None,
                name: Some("Test Signer".to_string()),
            }),
            use_xref_stream: false,
            use_object_streams: false,
            ..Default::default()
        }
    }

    fn paged_doc() -> Document {
        let mut doc = Document::new("1.4");
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
            Value::Dictionary(dict_of(vec![
                ("Type", Value::Name(Name::new("Pages"))),
                ("Kids", Value::Array(vec![Value::Reference(ObjRef::new(3, 0))])),
                ("Count", Value::Integer(1)),
            ])),
        ));
        doc.replace(Object::new(
            3,
            0,
            Value::Dictionary(dict_of(vec![
                ("Type", Value::Name(Name::new("Page"))),
                ("Parent", Value::Reference(ObjRef::new(2, 0))),
            ])),
        ));
        doc.trailer = dict_of(vec![("Root", Value::Reference(ObjRef::new(1, 0)))]);
        doc
    }

    fn signed_output(sig_length: usize) -> (WriteOutput, usize) {
        let mut doc = paged_doc();
        let config = signing_config();
        let mut pipeline = Pipeline::new();
        pipeline.add(Box::new(SignFilter::new(Box::new(FixedSigner {
            length: sig_length,
        }))));
        pipeline.run(&mut doc, &config).unwrap();
        let output = pipeline.finish(&doc, &config).unwrap();
        (output, sig_length)
    }

    #[test]
    fn test_run_builds_signature_graph() {
        let mut doc = paged_doc();
        let config = signing_config();
        let mut filter = SignFilter::new(Box::new(FixedSigner { length: 128 }));
        filter.run(&mut doc, &config).unwrap();

        let catalog = doc.catalog().unwrap();
        let acroform_ref = catalog.get("AcroForm").unwrap().as_reference().unwrap();
        let acroform = doc.get(acroform_ref).unwrap();
        assert_eq!(
            acroform.get("SigFlags").and_then(Value::as_integer),
            Some(3)
        );

        let annots_ref = doc
            .get(ObjRef::new(3, 0))
            .unwrap()
            .get("Annots")
            .unwrap()
            .as_reference()
            .unwrap();
        let annots = doc.get(annots_ref).unwrap().content.as_array().unwrap().clone();
        let annot = doc.get(annots[0].as_reference().unwrap()).unwrap();
        assert_eq!(
            annot.get("FT").and_then(Value::as_name),
            Some(&Name::new("Sig"))
        );
        let sig = doc.get(annot.get("V").unwrap().as_reference().unwrap()).unwrap();
        assert!(matches!(sig.get("ByteRange"), Some(Value::Marker(_))));
        assert!(matches!(sig.get("Contents"), Some(Value::Marker(_))));
        assert_eq!(
            sig.get("Name").and_then(Value::as_string),
            Some(&b"Test Signer"[..])
        );
    }

    #[test]
    fn test_byterange_covers_everything_but_the_hex_body() {
        let (output, sig_length) = signed_output(128);
        let content_start = output.mark(CONTENTS_MARK).unwrap();
        let content_end = content_start + 1 + 2 * sig_length;

        assert_eq!(output.bytes[content_start], b'<');
        assert_eq!(output.bytes[content_end], b'>');

        // The written ByteRange matches the marker arithmetic.
        let byterange_mark = output.mark(BYTERANGE_MARK).unwrap();
        let text = String::from_utf8_lossy(&output.bytes[byterange_mark..byterange_mark + 44]);
        let numbers: Vec<i64> = text
            .trim_start_matches('[')
            .split(']')
            .next()
            .unwrap()
            .split_whitespace()
            .map(|t| t.parse().unwrap())
            .collect();
        assert_eq!(
            numbers,
            vec![
                0,
                content_start as i64,
                (content_end + 1) as i64,
                (output.bytes.len() - content_end - 1) as i64
            ]
        );
    }

    #[test]
    fn test_stored_signature_matches_signed_ranges() {
        let (output, sig_length) = signed_output(128);
        let content_start = output.mark(CONTENTS_MARK).unwrap();
        let content_end = content_start + 1 + 2 * sig_length;

        // Reconstruct the payload the ranges declare and re-sign it.
        let mut payload = Vec::new();
        payload.extend_from_slice(&output.bytes[..content_start]);
        payload.extend_from_slice(&output.bytes[content_end + 1..]);
        let expected = FixedSigner { length: sig_length }.sign(&payload).unwrap();

        // Hex-decode what the file stores between < and >.
        let hex = &output.bytes[content_start + 1..content_end];
        let stored: Vec<u8> = hex
            .chunks(2)
            .map(|pair| {
                u8::from_str_radix(std::str::from_utf8(pair).unwrap(), 16).unwrap()
            })
            .collect();
        assert_eq!(stored, expected);
    }

    #[test]
    fn test_signature_size_drift_is_fatal() {
        let mut doc = paged_doc();
        let config = signing_config();
        let mut pipeline = Pipeline::new();
        pipeline.add(Box::new(SignFilter::new(Box::new(DriftingSigner {
            calls: std::cell::Cell::new(0),
        }))));
        pipeline.run(&mut doc, &config).unwrap();
        let err = pipeline.finish(&doc, &config).unwrap_err();
        assert!(matches!(err, Error::SignatureSizeDrift { .. }));
    }

    #[test]
    fn test_page_out_of_range_fails() {
        let mut doc = paged_doc();
        let mut config = signing_config();
        config.signing.as_mut().unwrap().page = 5;
        let mut filter = SignFilter::new(Box::new(FixedSigner { length: 64 }));
        assert!(filter.run(&mut doc, &config).is_err());
    }

    #[test]
    fn test_signed_file_still_parses() {
        let (output, _) = signed_output(96);
        let doc = Document::parse(&output.bytes).unwrap();
        let catalog = doc.catalog().unwrap();
        assert!(catalog.get("AcroForm").is_some());
    }
}
