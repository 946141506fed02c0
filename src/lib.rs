#![allow(clippy::match_like_matches_macro)]
#![allow(clippy::manual_range_contains)]

//! # pdf_recast
//!
//! A PDF rewriting engine: read an existing document into an object
//! graph, transform it through a pipeline of optimization and
//! transformation passes, and serialize a well-formed replacement.
//!
//! ## Core pieces
//!
//! - **Reader**: reconstructs the object graph from files using classical
//!   cross-reference tables or cross-reference streams, unpacking object
//!   streams along the way ([`document`], [`xref`], [`objstm`]).
//! - **Codecs**: Flate and RunLength decode/encode plus PNG and TIFF
//!   predictors ([`codec`]).
//! - **Transformation filters**: orphan removal, duplicate-image
//!   coalescing, dpi-driven resampling, alpha flattening, metadata
//!   stripping, PDF/A-1b conformance, payload embedding and incremental
//!   digital signing ([`filters`], [`template`], [`relink`]).
//! - **Writer**: re-emits the graph as a classical trailer+xref file or
//!   as object streams under a cross-reference stream, with exact
//!   positional metadata for post-serialization patching ([`writer`],
//!   [`serializer`]).
//!
//! ## Quick start
//!
//! ```no_run
//! use pdf_recast::config::Config;
//! use pdf_recast::document::Document;
//! use pdf_recast::filters::{DedupImagesFilter, ExplicitLengthFilter, OrphanFilter, Pipeline};
//!
//! # fn main() -> pdf_recast::error::Result<()> {
//! let data = std::fs::read("input.pdf")?;
//! let mut doc = Document::parse(&data)?;
//!
//! let config = Config::default();
//! let mut pipeline = Pipeline::new();
//! pipeline
//!     .add(Box::new(DedupImagesFilter::new()))
//!     .add(Box::new(ExplicitLengthFilter::new()))
//!     .add(Box::new(OrphanFilter::new()));
//! pipeline.run(&mut doc, &config)?;
//!
//! let output = pipeline.finish(&doc, &config)?;
//! std::fs::write("output.pdf", &output.bytes)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

// Error handling
pub mod error;

// Core model and parsing
pub mod document;
pub mod object;
pub mod objstm;
pub mod parser;
pub mod reader;
pub mod xref;

// Stream codecs
pub mod codec;

// Content streams and the extent interpreter
pub mod content;

// Serialization
pub mod serializer;
pub mod writer;

// Graph transformation
pub mod filters;
pub mod relink;
pub mod template;

// Configuration and units
pub mod config;
pub mod measure;

// External collaborators and image plumbing
pub mod external;
pub mod image;

// Re-exports
pub use config::Config;
pub use document::Document;
pub use error::{Error, Result};
pub use object::{Name, ObjRef, Object, Value};

// Version info
/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
