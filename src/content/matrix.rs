//! Affine transformation matrices and world extents.
//!
//! A matrix is the affine `[[a b 0] [c d 0] [e f 1]]` applied to row
//! vectors: `(x, y, 1) · M = (a·x + c·y + e, b·x + d·y + f, 1)`.

use crate::measure::{self, Unit};

/// 2-D affine transformation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    /// X-scale term
    pub a: f64,
    /// Y-shear term
    pub b: f64,
    /// X-shear term
    pub c: f64,
    /// Y-scale term
    pub d: f64,
    /// X translation
    pub e: f64,
    /// Y translation
    pub f: f64,
}

impl Matrix {
    /// Build from the six `cm` operands.
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Matrix { a, b, c, d, e, f }
    }

    /// Uniform scaling matrix.
    pub fn scale(factor: f64) -> Self {
        Matrix::new(factor, 0.0, 0.0, factor, 0.0, 0.0)
    }

    /// The identity transform.
    pub fn identity() -> Self {
        Matrix::scale(1.0)
    }

    /// Whether this matrix is (numerically) the identity.
    pub fn is_identity(&self) -> bool {
        let diff = (self.a - 1.0).abs()
            + self.b.abs()
            + self.c.abs()
            + (self.d - 1.0).abs()
            + self.e.abs()
            + self.f.abs();
        diff < 1e-6
    }

    /// Transform a point.
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Matrix product `self · other`: applying the result transforms by
    /// `self` first, then by `other`.
    pub fn concat(&self, other: &Matrix) -> Matrix {
        Matrix::new(
            self.a * other.a + self.b * other.c,
            self.a * other.b + self.b * other.d,
            self.c * other.a + self.d * other.c,
            self.c * other.b + self.d * other.d,
            self.e * other.a + self.f * other.c + other.e,
            self.e * other.b + self.f * other.d + other.f,
        )
    }

    /// Axis-aligned extents of a transformed bounding box
    /// `[x0, y0, x1, y1]`.
    pub fn extents(&self, bbox: [f64; 4]) -> Extents {
        let (x0, y0) = self.apply(bbox[0], bbox[1]);
        let (x1, y1) = self.apply(bbox[2], bbox[3]);
        Extents {
            x: x0.min(x1),
            y: y0.min(y1),
            width: (x1 - x0).abs(),
            height: (y1 - y0).abs(),
        }
    }
}

impl std::fmt::Display for Matrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_identity() {
            write!(f, "Matrix<identity>")
        } else {
            write!(
                f,
                "Matrix<{:.3} {:.3} {:.3} {:.3} {:.3} {:.3}>",
                self.a, self.b, self.c, self.d, self.e, self.f
            )
        }
    }
}

/// World-coordinate extents of a drawn object, in native PDF units
/// (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extents {
    /// Left edge
    pub x: f64,
    /// Bottom edge
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

impl Extents {
    /// Effective resolution when rendering `dots_width` x `dots_height`
    /// pixels into this area; the tighter axis wins.
    pub fn dpi(&self, dots_width: u32, dots_height: u32) -> f64 {
        let width_in = measure::convert(self.width, Unit::Native, Unit::Inch);
        let height_in = measure::convert(self.height, Unit::Native, Unit::Inch);
        let dpi_x = dots_width as f64 / width_in;
        let dpi_y = dots_height as f64 / height_in;
        dpi_x.min(dpi_y)
    }
}
