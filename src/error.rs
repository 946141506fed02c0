//! Error types for the PDF rewriting engine.
//!
//! This module defines all error types that can occur while reading,
//! transforming, and re-serializing PDF documents.

use crate::object::ObjRef;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during PDF processing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid PDF header (expected '%PDF-')
    #[error("Invalid PDF header: expected '%PDF-', found '{0}'")]
    InvalidHeader(String),

    /// Reader or structural parser gave up on the current structure
    #[error("Malformed PDF at byte {offset}: expected {expected}, found {found}")]
    MalformedPdf {
        /// Byte offset where the reader gave up
        offset: usize,
        /// What the reader expected to find
        expected: String,
        /// What was actually found
        found: String,
    },

    /// Textual parser rejected the input
    #[error("Syntax error at line {line}, column {column}: unexpected {found}")]
    Syntax {
        /// 1-based line of the first unexpected token
        line: usize,
        /// 1-based column of the first unexpected token
        column: usize,
        /// The offending token text
        found: String,
    },

    /// Referenced object not found in the document
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Unsupported stream filter; the object stays usable as an opaque blob
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// A reference points at an object that exists nowhere in the document
    #[error("Dangling reference: {0}")]
    DanglingReference(ObjRef),

    /// The relinker saw a reference that is neither mapped nor present
    #[error("Unresolved reference: {0}")]
    UnresolvedReference(ObjRef),

    /// The external rasterizer failed to decode an image
    #[error("Image decode error: {0}")]
    ImageDecode(String),

    /// The external rasterizer failed to encode an image
    #[error("Image encode error: {0}")]
    ImageEncode(String),

    /// The CMS produced at fixup time differs in length from the dry run
    #[error("Signature size drift: dry run produced {expected} bytes, fixup produced {actual}")]
    SignatureSizeDrift {
        /// CMS length of the dry-run signature
        expected: usize,
        /// CMS length produced during fixup
        actual: usize,
    },

    /// Contradictory configuration, raised before any I/O
    #[error("Configuration conflict: {0}")]
    ConfigConflict(String),

    /// A transformation filter failed
    #[error("Filter '{filter}' failed: {reason}")]
    Filter {
        /// Name of the failing filter
        filter: String,
        /// Failure description
        reason: String,
    },

    /// An external collaborator (rasterizer, signer) failed
    #[error("External tool '{tool}' failed: {reason}")]
    ExternalTool {
        /// Name of the external tool
        tool: String,
        /// Failure description
        reason: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Map this error onto the process exit-code contract.
    ///
    /// 0 is success, 1 a configuration error, 2 malformed input,
    /// 3 a filter failure, 4 an I/O failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::ConfigConflict(_) => 1,
            Error::InvalidHeader(_)
            | Error::MalformedPdf { .. }
            | Error::Syntax { .. }
            | Error::ObjectNotFound(..) => 2,
            Error::Io(_) => 4,
            _ => 3,
        }
    }
}
