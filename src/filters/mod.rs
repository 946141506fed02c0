//! Transformation filters.
//!
//! Each filter mutates the document in place and accounts for the bytes
//! it saved. Filters run in a deterministic, configuration-defined order;
//! each sees the mutated output of its predecessors. Failures are
//! accumulated per filter and summarized; the pipeline only aborts when a
//! filter marks itself fatal. Filters that patch the serialized file
//! (signing) implement the post-serialization `fixup` hook.

use crate::config::Config;
use crate::document::Document;
use crate::error::Result;
use crate::writer::{PdfWriter, WriteOutput};

mod crop;
mod decompress;
mod dedup_images;
mod downscale;
mod embed_payload;
mod explicit_length;
mod flatten_alpha;
mod orphans;
mod pdfa;
mod sign;
mod strip_metadata;

pub use crop::CropBoxFilter;
pub use decompress::DecompressFilter;
pub use dedup_images::DedupImagesFilter;
pub use downscale::DownscaleFilter;
pub use embed_payload::EmbedPayloadFilter;
pub use explicit_length::ExplicitLengthFilter;
pub use flatten_alpha::FlattenAlphaFilter;
pub use orphans::OrphanFilter;
pub use pdfa::PdfAFilter;
pub use sign::SignFilter;
pub use strip_metadata::StripMetadataFilter;

/// A transformation pass over a document.
pub trait DocumentFilter {
    /// Filter name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Mutate the document.
    fn run(&mut self, doc: &mut Document, config: &Config) -> Result<()>;

    /// Bytes saved by this filter (negative values mean growth).
    fn bytes_saved(&self) -> i64 {
        0
    }

    /// Whether a failure of this filter aborts the pipeline.
    fn is_fatal(&self) -> bool {
        false
    }

    /// Whether this filter needs to patch the serialized file.
    fn wants_fixup(&self) -> bool {
        false
    }

    /// Patch the serialized output in place (e.g. signature fixup).
    fn fixup(&mut self, _output: &mut WriteOutput, _config: &Config) -> Result<()> {
        Ok(())
    }
}

/// Outcome of one filter in a pipeline run.
#[derive(Debug)]
pub struct FilterReport {
    /// Filter name
    pub name: &'static str,
    /// Bytes saved
    pub bytes_saved: i64,
    /// Failure message, if the filter failed non-fatally
    pub error: Option<String>,
}

/// A configured sequence of filters plus the final write and fixup steps.
pub struct Pipeline {
    filters: Vec<Box<dyn DocumentFilter>>,
    reports: Vec<FilterReport>,
}

impl Pipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Pipeline {
            filters: Vec::new(),
            reports: Vec::new(),
        }
    }

    /// Append a filter.
    pub fn add(&mut self, filter: Box<dyn DocumentFilter>) -> &mut Self {
        self.filters.push(filter);
        self
    }

    /// Per-filter outcomes of the last `run`.
    pub fn reports(&self) -> &[FilterReport] {
        &self.reports
    }

    /// Run every filter in order. Non-fatal failures are recorded and the
    /// pipeline continues; a fatal failure aborts immediately.
    pub fn run(&mut self, doc: &mut Document, config: &Config) -> Result<()> {
        config.validate()?;
        self.reports.clear();
        let total = self.filters.len();
        for (index, filter) in self.filters.iter_mut().enumerate() {
            log::debug!("running filter {}/{}: {}", index + 1, total, filter.name());
            let error = match filter.run(doc, config) {
                Ok(()) => None,
                Err(e) if filter.is_fatal() => {
                    log::error!("filter {} failed fatally: {}", filter.name(), e);
                    return Err(e);
                }
                Err(e) => {
                    log::warn!("filter {} failed: {}", filter.name(), e);
                    Some(e.to_string())
                }
            };
            self.reports.push(FilterReport {
                name: filter.name(),
                bytes_saved: filter.bytes_saved(),
                error,
            });
        }
        Ok(())
    }

    /// Serialize the document and run every fixup hook over the emitted
    /// bytes. Fixup failures leave the output invalid and are reported;
    /// no rollback is attempted.
    pub fn finish(&mut self, doc: &Document, config: &Config) -> Result<WriteOutput> {
        let writer = PdfWriter::new(config.writer_options())?;
        let mut output = writer.write(doc)?;
        for filter in self.filters.iter_mut().filter(|f| f.wants_fixup()) {
            log::debug!("running fixup: {}", filter.name());
            filter.fixup(&mut output, config)?;
        }
        Ok(output)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
