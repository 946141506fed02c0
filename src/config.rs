//! Pipeline configuration.
//!
//! The CLI layer (out of scope here) populates a [`Config`]; the engine
//! validates it before any I/O and threads it through the transformation
//! filters and the writer.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::measure::Unit;
use crate::writer::WriterOptions;

/// Signing parameters.
#[derive(Debug, Clone)]
pub struct SigningConfig {
    /// Signer certificate (PEM)
    pub cert: PathBuf,
    /// Signer private key (PEM)
    pub key: PathBuf,
    /// Optional certificate chain (PEM)
    pub chain: Option<PathBuf>,
    /// 1-based page the signature widget lands on
    pub page: usize,
    /// Optional widget position (x, y) in the configured unit
    pub position: Option<(f64, f64)>,
    /// Optional signing reason
    pub reason: Option<String>,
    /// Optional signing location
    pub location: Option<String>,
    /// Optional contact information
    pub contact: Option<String>,
    /// Optional signer name
    pub name: Option<String>,
}

/// Engine configuration, consumed from the CLI layer.
#[derive(Debug, Clone)]
pub struct Config {
    /// Target resolution for image resampling
    pub target_dpi: u32,
    /// Convert resampled images to JPEG
    pub lossy_images: bool,
    /// JPEG quality (0-100)
    pub jpeg_quality: u8,
    /// Force soft masks to 1-bit depth
    pub onebit_alpha: bool,
    /// Flatten soft masks over the background color
    pub remove_alpha: bool,
    /// Background color for alpha flattening (name or `#rrggbb`)
    pub background_color: String,
    /// Pretty (multi-line, sorted) dictionary output
    pub pretty_output: bool,
    /// Emit the cross-reference as a stream
    pub use_xref_stream: bool,
    /// Pack streamless objects into object streams
    pub use_object_streams: bool,
    /// Dictionary-key prefixes stripped by the metadata filter
    pub strip_metadata_prefixes: Vec<String>,
    /// Signing setup; absent disables the signature filter
    pub signing: Option<SigningConfig>,
    /// Crop box (x, y, w, h) in the configured unit
    pub cropbox: Option<(f64, f64, f64, f64)>,
    /// Unit for configuration lengths
    pub unit: Unit,
    /// Payload file embedded as an opaque object
    pub payload_path: Option<PathBuf>,
    /// ICC profile for the PDF/A output intent
    pub color_profile: Option<PathBuf>,
    /// Correction factor applied to pattern-draw extents.
    // TODO: verify the 1.25 factor against a reference renderer; the
    // measured pattern extents look systematically small without it, but
    // the exact value has never been confirmed.
    pub pattern_extent_correction: f64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            target_dpi: 150,
            lossy_images: false,
            jpeg_quality: 85,
            onebit_alpha: false,
            remove_alpha: false,
            background_color: "white".to_string(),
            pretty_output: false,
            use_xref_stream: true,
            use_object_streams: true,
            strip_metadata_prefixes: vec!["PTEX".to_string()],
            signing: None,
            cropbox: None,
            unit: Unit::Native,
            payload_path: None,
            color_profile: None,
            pattern_extent_correction: 1.25,
        }
    }
}

impl Config {
    /// Reject contradictory settings before any I/O happens.
    pub fn validate(&self) -> Result<()> {
        if self.use_object_streams && !self.use_xref_stream {
            return Err(Error::ConfigConflict(
                "object streams require a cross-reference stream".to_string(),
            ));
        }
        if self.target_dpi == 0 {
            return Err(Error::ConfigConflict("target dpi must be positive".to_string()));
        }
        if self.jpeg_quality > 100 {
            return Err(Error::ConfigConflict(
                "jpeg quality must be between 0 and 100".to_string(),
            ));
        }
        if let Some(signing) = &self.signing {
            if signing.page == 0 {
                return Err(Error::ConfigConflict(
                    "signature page numbers are 1-based".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Writer options implied by this configuration.
    pub fn writer_options(&self) -> WriterOptions {
        WriterOptions {
            pretty: self.pretty_output,
            use_xref_stream: self.use_xref_stream,
            use_object_streams: self.use_object_streams,
            ..WriterOptions::default()
        }
    }
}
