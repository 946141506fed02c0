//! Type-1 font information boundary.
//!
//! Only the PDF/A conformance filter needs font internals (the /CharSet
//! of embedded Type-1 fonts). The parser/interpreter for the font
//! program lives outside the core behind this interface.

use crate::error::Result;
use crate::object::Object;

/// Information extracted from an embedded Type-1 font program.
#[derive(Debug, Clone, PartialEq)]
pub struct Type1FontInfo {
    /// `/CharSet` string listing the glyph names, e.g. `/space/a/b`
    pub charset: String,
    /// Advance widths per encoded glyph
    pub glyph_widths: Vec<f64>,
    /// PostScript font name
    pub font_name: String,
    /// Font bounding box
    pub font_bbox: [f64; 4],
}

/// Extracts [`Type1FontInfo`] from a `/FontFile` stream object.
pub trait FontInfoSource {
    /// Parse the font program carried by the object.
    fn font_info(&self, font_file: &Object) -> Result<Type1FontInfo>;
}
