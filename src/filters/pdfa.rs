//! PDF/A-1b conformance.
//!
//! Injects a file /ID, an ICC output intent and XMP metadata; disables
//! image interpolation; removes transparency groups from pages and form
//! XObjects; forces annotations printable; and completes font
//! descriptors (/CharSet for Type-1 fonts through the external font-info
//! source, /CIDSet and /CIDToGIDMap for CIDFontType2 fonts).
//!
//! All injected identifiers are derived from a digest of the document so
//! the output stays byte-reproducible.

use md5::{Digest, Md5};

use crate::codec::EncodedStream;
use crate::config::Config;
use crate::document::Document;
use crate::error::Result;
use crate::external::FontInfoSource;
use crate::filters::DocumentFilter;
use crate::object::{dict_of, Dict, Name, ObjRef, Object, Value};

const XMP_TEMPLATE: &str = r#"<?xpacket begin="" id="W5M0MpCehiHzreSzNTczkc9d"?>
<x:xmpmeta xmlns:x="adobe:ns:meta/">
   <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
      <rdf:Description rdf:about=""
            xmlns:xmp="http://ns.adobe.com/xap/1.0/"
            xmlns:pdf="http://ns.adobe.com/pdf/1.3/"
            xmlns:dc="http://purl.org/dc/elements/1.1/"
            xmlns:xmpMM="http://ns.adobe.com/xap/1.0/mm/"
            xmlns:pdfaid="http://www.aiim.org/pdfa/ns/id/">
         <dc:format>application/pdf</dc:format>
         <dc:title><rdf:Alt><rdf:li xml:lang="x-default">{title}</rdf:li></rdf:Alt></dc:title>
         <dc:description><rdf:Alt><rdf:li xml:lang="x-default">{description}</rdf:li></rdf:Alt></dc:description>
         <dc:creator><rdf:Seq><rdf:li>{creator}</rdf:li></rdf:Seq></dc:creator>
         <xmp:CreateDate>{create_date}</xmp:CreateDate>
         <xmp:ModifyDate>{modify_date}</xmp:ModifyDate>
         <xmp:CreatorTool>{creator_tool}</xmp:CreatorTool>
         <pdf:Producer>{producer}</pdf:Producer>
         <pdf:Keywords>{keywords}</pdf:Keywords>
         <xmpMM:DocumentID>uuid:{document_id}</xmpMM:DocumentID>
         <xmpMM:InstanceID>uuid:{instance_id}</xmpMM:InstanceID>
         <xmpMM:VersionID>1</xmpMM:VersionID>
         <pdfaid:part>1</pdfaid:part>
         <pdfaid:conformance>B</pdfaid:conformance>
      </rdf:Description>
   </rdf:RDF>
</x:xmpmeta>
<?xpacket end="w"?>"#;

/// Applies PDF/A-1b conformance fixes.
pub struct PdfAFilter {
    fonts: Option<Box<dyn FontInfoSource>>,
}

impl PdfAFilter {
    /// Create the filter; Type-1 /CharSet synthesis needs a font-info
    /// source and is skipped without one.
    pub fn new(fonts: Option<Box<dyn FontInfoSource>>) -> Self {
        PdfAFilter { fonts }
    }

    fn add_color_profile(&self, doc: &mut Document, profile: &[u8]) -> Result<ObjRef> {
        let encoded = EncodedStream::create(profile, true, false, 1)?;
        let mut dict = dict_of(vec![
            ("N", Value::Integer(3)),
            (
                "Range",
                Value::Array(
                    [0i64, 1, 0, 1, 0, 1].iter().map(|v| Value::Integer(*v)).collect(),
                ),
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

    fn add_output_intent(&self, doc: &mut Document, profile_ref: ObjRef) -> ObjRef {
        doc.add_object(Value::Array(vec![Value::Dictionary(dict_of(vec![
            ("Type", Value::Name(Name::new("OutputIntent"))),
            ("S", Value::Name(Name::new("GTS_PDFA1"))),
            ("OutputCondition", Value::String(b"sRGB".to_vec())),
            (
                "OutputConditionIdentifier",
                Value::String(b"Custom".to_vec()),
            ),
            ("Info", Value::String(b"sRGB IEC61966-2.1".to_vec())),
            ("RegistryName", Value::String(Vec::new())),
            ("DestOutputProfile", Value::Reference(profile_ref)),
        ]))]))
    }

    fn add_xmp_metadata(&self, doc: &mut Document, digest: &[u8; 16]) -> Result<ObjRef> {
        let info = info_dict(doc);
        let get = |key: &str| -> String {
            info.as_ref()
                .and_then(|d| d.get(&Name::new(key)))
                .and_then(Value::as_string)
                .map(|s| xml_escape(&String::from_utf8_lossy(s)))
                .unwrap_or_default()
        };
        let modify_date = pdf_date_to_xml(&get("ModDate"));
        let create_date = pdf_date_to_xml(&get("CreationDate"));

        let xmp = XMP_TEMPLATE
            .replace("{title}", &get("Title"))
            .replace("{description}", &get("Subject"))
            .replace("{creator}", &get("Author"))
            .replace("{creator_tool}", &get("Creator"))
            .replace("{producer}", &get("Producer"))
            .replace("{keywords}", &get("Keywords"))
            .replace("{create_date}", &create_date)
            .replace("{modify_date}", &modify_date)
            .replace("{document_id}", &hex_uuid(digest, 0x00))
            .replace("{instance_id}", &hex_uuid(digest, 0x5A));

        let stream = xmp.into_bytes();
        let id = doc.free_id();
        let dict = dict_of(vec![
            ("Type", Value::Name(Name::new("Metadata"))),
            ("Subtype", Value::Name(Name::new("XML"))),
            ("Length", Value::Integer(stream.len() as i64)),
        ]);
        doc.replace(Object::with_stream(id, 0, Value::Dictionary(dict), stream));
        Ok(ObjRef::new(id, 0))
    }

    fn fix_fonts(&self, doc: &mut Document) -> Result<()> {
        let font_refs: Vec<ObjRef> = doc
            .objects()
            .filter(|obj| {
                obj.get("Type").and_then(Value::as_name).map(Name::as_str) == Some("Font")
            })
            .map(|obj| obj.xref)
            .collect();

        let mut fixed_descriptors = std::collections::HashSet::new();
        for font_ref in font_refs {
            let font = doc.get(font_ref).expect("listed above").clone();
            let subtype = font
                .get("Subtype")
                .and_then(Value::as_name)
                .map(|n| n.as_str().to_string());

            if subtype.as_deref() == Some("CIDFontType2") {
                if let Some(dict) = doc.get_mut(font_ref).and_then(Object::dict_mut) {
                    dict.insert(
                        Name::new("CIDToGIDMap"),
                        Value::Name(Name::new("Identity")),
                    );
                }
            }

            let Some(descriptor_ref) = font.get("FontDescriptor").and_then(Value::as_reference)
            else {
                continue;
            };
            if !fixed_descriptors.insert(descriptor_ref) {
                continue;
            }

            match subtype.as_deref() {
                Some("Type1") => {
                    let Some(fonts) = &self.fonts else {
                        log::warn!(
                            "no font-info source; /CharSet for {} not synthesized",
                            font_ref
                        );
                        continue;
                    };
                    let font_file = doc
                        .get(descriptor_ref)
                        .and_then(|d| d.get("FontFile"))
                        .and_then(Value::as_reference)
                        .and_then(|r| doc.get(r))
                        .cloned();
                    let Some(font_file) = font_file else {
                        continue;
                    };
                    match fonts.font_info(&font_file) {
                        Ok(info) => {
                            if let Some(dict) =
                                doc.get_mut(descriptor_ref).and_then(Object::dict_mut)
                            {
                                dict.insert(
                                    Name::new("CharSet"),
                                    Value::String(info.charset.into_bytes()),
                                );
                            }
                        }
                        Err(e) => log::warn!("font info for {} failed: {}", font_ref, e),
                    }
                }
                Some("CIDFontType2") => {
                    let Some(glyph_count) = font
                        .get("W")
                        .and_then(Value::as_array)
                        .map(|widths| type2_glyph_count(widths))
                    else {
                        continue;
                    };
                    let cidset = cidset_bytes(glyph_count);
                    let encoded = EncodedStream::create(&cidset, true, false, 1)?;
                    let mut dict = Dict::new();
                    encoded.update_dict(&mut dict);
                    let id = doc.free_id();
                    doc.replace(Object::with_stream(
                        id,
                        0,
                        Value::Dictionary(dict),
                        encoded.into_data(),
                    ));
                    if let Some(dict) = doc.get_mut(descriptor_ref).and_then(Object::dict_mut) {
                        dict.insert(
                            Name::new("CIDSet"),
                            Value::Reference(ObjRef::new(id, 0)),
                        );
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl DocumentFilter for PdfAFilter {
    fn name(&self) -> &'static str {
        "pdfa-1b"
    }

    fn run(&mut self, doc: &mut Document, config: &Config) -> Result<()> {
        let digest = document_digest(doc);

        // File identifier, derived from content so reruns agree.
        let second: [u8; 16] = Md5::digest(digest).into();
        doc.trailer.insert(
            Name::new("ID"),
            Value::Array(vec![
                Value::String(digest.to_vec()),
                Value::String(second.to_vec()),
            ]),
        );

        // Interpolation is forbidden.
        for image_ref in doc.image_objects() {
            if let Some(dict) = doc.get_mut(image_ref).and_then(Object::dict_mut) {
                dict.insert(Name::new("Interpolate"), Value::Boolean(false));
            }
        }

        // No transparency groups on pages or form XObjects.
        for page_ref in doc.pages() {
            if let Some(dict) = doc.get_mut(page_ref).and_then(Object::dict_mut) {
                dict.shift_remove(&Name::new("Group"));
            }
        }
        for object in doc.objects_mut() {
            let is_form = object.get("Type").and_then(Value::as_name).map(Name::as_str)
                == Some("XObject")
                && object.get("Subtype").and_then(Value::as_name).map(Name::as_str)
                    == Some("Form");
            if is_form {
                if let Some(dict) = object.dict_mut() {
                    dict.shift_remove(&Name::new("Group"));
                }
            }
        }

        // Output intent needs an ICC profile to embed.
        let intent_ref = match &config.color_profile {
            Some(path) => {
                let profile = std::fs::read(path)?;
                let profile_ref = self.add_color_profile(doc, &profile)?;
                Some(self.add_output_intent(doc, profile_ref))
            }
            None => {
                log::warn!("no ICC profile configured; output intent not embedded");
                None
            }
        };

        let metadata_ref = self.add_xmp_metadata(doc, &digest)?;

        // Wire intent and metadata into every catalog.
        let catalogs: Vec<ObjRef> = doc
            .objects()
            .filter(|obj| {
                obj.get("Type").and_then(Value::as_name).map(Name::as_str) == Some("Catalog")
            })
            .map(|obj| obj.xref)
            .collect();
        for catalog_ref in catalogs {
            if let Some(dict) = doc.get_mut(catalog_ref).and_then(Object::dict_mut) {
                if let Some(intent_ref) = intent_ref {
                    dict.insert(Name::new("OutputIntents"), Value::Reference(intent_ref));
                }
                dict.insert(Name::new("Metadata"), Value::Reference(metadata_ref));
            }
        }

        // Annotations must print.
        for object in doc.objects_mut() {
            if object.get("Type").and_then(Value::as_name).map(Name::as_str) == Some("Annot") {
                if let Some(dict) = object.dict_mut() {
                    dict.insert(Name::new("F"), Value::Integer(4));
                }
            }
        }

        self.fix_fonts(doc)
    }
}

/// Digest of object identities and payloads; stable across reruns of the
/// same input.
fn document_digest(doc: &Document) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update(doc.version.as_bytes());
    for object in doc.objects() {
        hasher.update(object.xref.id.to_be_bytes());
        hasher.update(object.xref.gen.to_be_bytes());
        if let Some(stream) = &object.stream {
            hasher.update(stream);
        }
    }
    hasher.finalize().into()
}

fn info_dict(doc: &Document) -> Option<Dict> {
    let info_ref = doc.trailer.get(&Name::new("Info"))?.as_reference()?;
    doc.get(info_ref)?.dict().cloned()
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Format 16 digest bytes as a UUID-shaped hex string, tweaked by `salt`
/// so the document and instance identifiers differ.
fn hex_uuid(digest: &[u8; 16], salt: u8) -> String {
    let mut bytes = *digest;
    for byte in &mut bytes {
        *byte ^= salt;
    }
    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

/// Convert `D:YYYYMMDDHHmmSS...` into `YYYY-MM-DDTHH:mm:SS`.
fn pdf_date_to_xml(date: &str) -> String {
    let digits: String = date
        .trim_start_matches("D:")
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.len() < 14 {
        return String::new();
    }
    format!(
        "{}-{}-{}T{}:{}:{}",
        &digits[0..4],
        &digits[4..6],
        &digits[6..8],
        &digits[8..10],
        &digits[10..12],
        &digits[12..14]
    )
}

/// Number of glyphs covered by a CIDFontType2 /W array.
fn type2_glyph_count(widths: &[Value]) -> usize {
    let mut count = 0;
    let mut index = 0;
    while index < widths.len() {
        match widths.get(index + 1) {
            Some(Value::Array(group)) => {
                count += group.len();
                index += 2;
            }
            Some(_) => {
                let first = widths.get(index).and_then(Value::as_integer).unwrap_or(0);
                let last = widths.get(index + 1).and_then(Value::as_integer).unwrap_or(0);
                count += (last - first + 1).max(0) as usize;
                index += 3;
            }
            None => break,
        }
    }
    count
}

/// Bitmap with one bit set per glyph. The final byte carries the
/// remainder bits and is emitted even when it is zero, so the stream is
/// always `glyph_count / 8 + 1` bytes long.
fn cidset_bytes(glyph_count: usize) -> Vec<u8> {
    let full_bytes = glyph_count / 8;
    let set_bits = glyph_count % 8;
    let last_byte = (((1u16 << set_bits) - 1) << (8 - set_bits)) as u8;
    let mut bytes = vec![0xFFu8; full_bytes];
    bytes.push(last_byte);
    bytes
}
