//! External collaborators behind narrow trait boundaries.
//!
//! The engine shells out for pixel manipulation (an ImageMagick-style
//! raster tool) and CMS signing (openssl), and consumes Type-1 font
//! information through an interface so the parser itself can live outside
//! the core. Each boundary can be replaced with an in-process equivalent
//! without touching the engine.

mod fonts;
mod rasterizer;
mod signer;

pub use fonts::{FontInfoSource, Type1FontInfo};
pub use rasterizer::{MagickRasterizer, RasterInfo, Rasterizer};
pub use signer::{OpensslCmsSigner, Signer};
