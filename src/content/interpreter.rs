//! Content-stream interpreter.
//!
//! A mini graphics-state machine tracking the current transformation
//! matrix and the active non-stroking pattern key. Executing a parsed
//! content stream produces draw events with world-coordinate extents for
//! every placed image: direct `Do` draws of image XObjects and
//! pattern-fills of rectangles whose fill color references a tiling
//! pattern. The interpreter owns no I/O and ignores every other operator.

use crate::content::matrix::{Extents, Matrix};
use crate::content::operators::ContentOp;
use crate::document::Document;
use crate::object::{Name, ObjRef, Value};

/// How an image reached the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawKind {
    /// Direct `Do` invocation of an image XObject
    Direct,
    /// Rectangle fill through a tiling pattern carrying one image
    Pattern,
}

/// One placed image and the world extents it covers.
#[derive(Debug, Clone)]
pub struct DrawEvent {
    /// Draw mechanism
    pub kind: DrawKind,
    /// The image XObject drawn
    pub image: ObjRef,
    /// The pattern object, for pattern fills
    pub pattern: Option<ObjRef>,
    /// World extents in native units
    pub extents: Extents,
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    color_ns: Option<Name>,
}

impl Default for GraphicsState {
    fn default() -> Self {
        GraphicsState {
            ctm: Matrix::identity(),
            color_ns: None,
        }
    }
}

/// Executes content-stream operators against a page's resources.
pub struct Interpreter<'a> {
    doc: &'a Document,
    page: ObjRef,
    gs: GraphicsState,
    stack: Vec<GraphicsState>,
    path: Vec<ContentOp>,
    events: Vec<DrawEvent>,
}

impl<'a> Interpreter<'a> {
    /// Create an interpreter for one page.
    pub fn new(doc: &'a Document, page: ObjRef) -> Self {
        Interpreter {
            doc,
            page,
            gs: GraphicsState::default(),
            stack: Vec::new(),
            path: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Execute the operators and return the collected draw events.
    pub fn run(mut self, ops: &[ContentOp]) -> Vec<DrawEvent> {
        for op in ops {
            self.step(op);
        }
        self.events
    }

    fn step(&mut self, op: &ContentOp) {
        match op.operator.as_str() {
            "q" => self.stack.push(self.gs.clone()),
            "Q" => match self.stack.pop() {
                Some(gs) => self.gs = gs,
                None => log::warn!("graphics state stack underflow on page {}", self.page),
            },
            "cm" => {
                let operands: Vec<f64> = (0..6).filter_map(|i| op.number(i)).collect();
                if operands.len() == 6 {
                    let incoming = Matrix::new(
                        operands[0],
                        operands[1],
                        operands[2],
                        operands[3],
                        operands[4],
                        operands[5],
                    );
                    self.gs.ctm = incoming.concat(&self.gs.ctm);
                } else {
                    log::warn!("cm with non-numeric operands ignored");
                }
            }
            "re" => self.path.push(op.clone()),
            // Clipping markers leave the pending path alone.
            "W" | "W*" => {}
            "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" | "n" => {
                if op.operator == "f"
                    && self.path.len() == 1
                    && self.path[0].operator == "re"
                {
                    self.pattern_fill_event();
                }
                self.path.clear();
            }
            "scn" | "SCN" => {
                if let [Value::Name(name)] = op.operands.as_slice() {
                    self.gs.color_ns = Some(name.clone());
                }
            }
            "Do" => {
                if let Some(Value::Name(name)) = op.operands.first() {
                    self.direct_draw_event(name);
                }
            }
            _ => {}
        }
    }

    /// Resolve the page's /Resources dictionary (it may be indirect).
    fn resources(&self) -> Option<&Value> {
        let page = self.doc.get(self.page)?;
        Some(self.doc.deref(page.get("Resources")?))
    }

    /// A sub-dictionary of /Resources such as /XObject or /Pattern.
    fn resource_dict(&self, kind: &str) -> Option<&Value> {
        let resources = self.resources()?.as_dict()?;
        Some(self.doc.deref(resources.get(&Name::new(kind))?))
    }

    fn direct_draw_event(&mut self, name: &Name) {
        let Some(xobjects) = self.resource_dict("XObject").and_then(Value::as_dict) else {
            log::warn!("page {} draws {} but has no /XObject resources", self.page, name);
            return;
        };
        let Some(image_ref) = xobjects.get(name).and_then(Value::as_reference) else {
            log::warn!("page {} draws unknown XObject {}", self.page, name);
            return;
        };
        let extents = self.gs.ctm.extents([0.0, 0.0, 1.0, 1.0]);
        log::debug!(
            "direct draw of {} with {} covering {:.0}x{:.0} units",
            image_ref,
            self.gs.ctm,
            extents.width,
            extents.height
        );
        self.events.push(DrawEvent {
            kind: DrawKind::Direct,
            image: image_ref,
            pattern: None,
            extents,
        });
    }

    /// A single-rectangle fill whose non-stroking color names a tiling
    /// pattern places that pattern's image.
    fn pattern_fill_event(&mut self) {
        let Some(color_key) = self.gs.color_ns.clone() else {
            return;
        };
        let Some(patterns) = self.resource_dict("Pattern").and_then(Value::as_dict) else {
            return;
        };
        let Some(pattern_ref) = patterns.get(&color_key).and_then(Value::as_reference) else {
            return;
        };
        let Some(pattern) = self.doc.get(pattern_ref) else {
            log::warn!("pattern {} referenced but missing", pattern_ref);
            return;
        };

        let bbox = match pattern.get("BBox").map(|v| self.doc.deref(v)) {
            Some(Value::Array(items)) if items.len() == 4 => {
                let values: Vec<f64> = items.iter().filter_map(Value::as_number).collect();
                match values.as_slice() {
                    [x0, y0, x1, y1] => [*x0, *y0, *x1, *y1],
                    _ => return,
                }
            }
            _ => return,
        };
        let pattern_matrix = match pattern.get("Matrix").map(|v| self.doc.deref(v)) {
            Some(Value::Array(items)) if items.len() == 6 => {
                let values: Vec<f64> = items.iter().filter_map(Value::as_number).collect();
                match values.as_slice() {
                    [a, b, c, d, e, f] => Matrix::new(*a, *b, *c, *d, *e, *f),
                    _ => Matrix::identity(),
                }
            }
            _ => Matrix::identity(),
        };

        // Exactly one image inside the pattern's own resources.
        let image_ref = pattern
            .get("Resources")
            .map(|v| self.doc.deref(v))
            .and_then(Value::as_dict)
            .and_then(|resources| resources.get(&Name::new("XObject")))
            .map(|v| self.doc.deref(v))
            .and_then(Value::as_dict)
            .and_then(|xobjects| {
                if xobjects.len() == 1 {
                    xobjects.values().next().and_then(Value::as_reference)
                } else {
                    None
                }
            });
        let Some(image_ref) = image_ref else {
            return;
        };

        // The CTM positions the bbox; the pattern's matrix composes on top.
        let combined = self.gs.ctm.concat(&pattern_matrix);
        let extents = combined.extents(bbox);
        log::debug!(
            "pattern draw of {} via {} covering {:.0}x{:.0} units",
            image_ref,
            pattern_ref,
            extents.width,
            extents.height
        );
        self.events.push(DrawEvent {
            kind: DrawKind::Pattern,
            image: image_ref,
            pattern: Some(pattern_ref),
            extents,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::parse_content_stream;
    use crate::object::{dict_of, Object};

    /// Document with one page drawing image 10 directly and pattern 20
    /// wrapping image 11.
    fn test_doc() -> Document {
        let mut doc = Document::new("1.5");
        doc.replace(Object::new(
            3,
            0,
            Value::Dictionary(dict_of(vec![
                ("Type", Value::Name(Name::new("Page"))),
                (
                    "Resources",
                    Value::Dictionary(dict_of(vec![
                        (
                            "XObject",
                            Value::Dictionary(dict_of(vec![(
                                "Im0",
                                Value::Reference(ObjRef::new(10, 0)),
                            )])),
                        ),
                        (
                            "Pattern",
                            Value::Dictionary(dict_of(vec![(
                                "P1",
                                Value::Reference(ObjRef::new(20, 0)),
                            )])),
                        ),
                    ])),
                ),
            ])),
        ));
        doc.replace(Object::with_stream(
            10,
            0,
            Value::Dictionary(dict_of(vec![
                ("Type", Value::Name(Name::new("XObject"))),
                ("Subtype", Value::Name(Name::new("Image"))),
            ])),
            vec![0],
        ));
        doc.replace(Object::with_stream(
            11,
            0,
            Value::Dictionary(dict_of(vec![
                ("Type", Value::Name(Name::new("XObject"))),
                ("Subtype", Value::Name(Name::new("Image"))),
            ])),
            vec![0],
        ));
        doc.replace(Object::new(
            20,
            0,
            Value::Dictionary(dict_of(vec![
                ("PatternType", Value::Integer(1)),
                ("PaintType", Value::Integer(1)),
                (
                    "BBox",
                    Value::Array(vec![
                        Value::Integer(0),
                        Value::Integer(0),
                        Value::Integer(100),
                        Value::Integer(50),
                    ]),
                ),
                (
                    "Matrix",
                    Value::Array(vec![
                        Value::Real(0.5),
                        Value::Integer(0),
                        Value::Integer(0),
                        Value::Real(0.5),
                        Value::Integer(0),
                        Value::Integer(0),
                    ]),
                ),
                (
                    "Resources",
                    Value::Dictionary(dict_of(vec![(
                        "XObject",
                        Value::Dictionary(dict_of(vec![(
                            "ImP",
                            Value::Reference(ObjRef::new(11, 0)),
                        )])),
                    )])),
                ),
            ])),
        ));
        doc
    }

    #[test]
    fn test_direct_draw_extents_from_ctm() {
        let doc = test_doc();
        let ops = parse_content_stream(b"q 144 0 0 72 10 20 cm /Im0 Do Q").unwrap();
        let events = Interpreter::new(&doc, ObjRef::new(3, 0)).run(&ops);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, DrawKind::Direct);
        assert_eq!(events[0].image, ObjRef::new(10, 0));
        assert_eq!(events[0].extents.width, 144.0);
        assert_eq!(events[0].extents.height, 72.0);
        assert_eq!(events[0].extents.x, 10.0);
    }

    #[test]
    fn test_q_restores_ctm() {
        let doc = test_doc();
        let ops =
            parse_content_stream(b"q 2 0 0 2 0 0 cm Q 36 0 0 36 0 0 cm /Im0 Do").unwrap();
        let events = Interpreter::new(&doc, ObjRef::new(3, 0)).run(&ops);
        // The doubled scale was popped; only the 36-unit scale applies.
        assert_eq!(events[0].extents.width, 36.0);
    }

    #[test]
    fn test_pattern_fill_emits_event() {
        let doc = test_doc();
        let ops = parse_content_stream(b"/P1 scn 0 0 200 100 re f").unwrap();
        let events = Interpreter::new(&doc, ObjRef::new(3, 0)).run(&ops);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, DrawKind::Pattern);
        assert_eq!(events[0].image, ObjRef::new(11, 0));
        assert_eq!(events[0].pattern, Some(ObjRef::new(20, 0)));
        // BBox 100x50 through the pattern's 0.5 scale.
        assert_eq!(events[0].extents.width, 50.0);
        assert_eq!(events[0].extents.height, 25.0);
    }

    #[test]
    fn test_stroke_does_not_emit_pattern_event() {
        let doc = test_doc();
        let ops = parse_content_stream(b"/P1 scn 0 0 200 100 re S").unwrap();
        let events = Interpreter::new(&doc, ObjRef::new(3, 0)).run(&ops);
        assert!(events.is_empty());
    }

    #[test]
    fn test_multi_segment_path_not_a_pattern_fill() {
        let doc = test_doc();
        let ops =
            parse_content_stream(b"/P1 scn 0 0 10 10 re 20 20 10 10 re f").unwrap();
        let events = Interpreter::new(&doc, ObjRef::new(3, 0)).run(&ops);
        assert!(events.is_empty());
    }

    #[test]
    fn test_unknown_xobject_ignored() {
        let doc = test_doc();
        let ops = parse_content_stream(b"/Missing Do").unwrap();
        let events = Interpreter::new(&doc, ObjRef::new(3, 0)).run(&ops);
        assert!(events.is_empty());
    }
}
