//! Progress-callback trait for pipeline stage events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves through its stages. The CLI uses it to drive
//! a spinner; library callers can forward events anywhere.
//!
//! # Example
//!
//! ```rust
//! use md2pdf::{ConversionConfig, ConversionProgressCallback, Stage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     stages: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_stage_complete(&self, stage: Stage) {
//!         self.stages.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("done: {stage}");
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { stages: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::config::PipelineVariant;
use crate::output::ConversionStats;
use crate::pipeline::diagnostics::MissingGlyphSet;
use crate::fallback::PatchOutcome;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// A step of either pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// pandoc: Markdown → HTML body fragment.
    MarkdownToHtml,
    /// Wrap the fragment in the themed document.
    ThemeInjection,
    /// Headless browser: HTML → PDF.
    Rasterise,
    /// pandoc + LuaLaTeX. `attempt` is 1 or 2.
    Typeset { attempt: u32 },
    /// Look for missing-glyph diagnostics.
    Scan,
    /// Extend the fallback table.
    Patch,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::MarkdownToHtml => f.write_str("markdown → html"),
            Stage::ThemeInjection => f.write_str("theme"),
            Stage::Rasterise => f.write_str("rasterise"),
            Stage::Typeset { attempt } => write!(f, "typeset (attempt {attempt})"),
            Stage::Scan => f.write_str("scan diagnostics"),
            Stage::Patch => f.write_str("patch fallback table"),
        }
    }
}

/// Called by the pipeline as it runs. All methods default to no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before the first external command.
    fn on_conversion_start(&self, input: &Path, variant: PipelineVariant) {
        let _ = (input, variant);
    }

    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    fn on_stage_complete(&self, stage: Stage) {
        let _ = stage;
    }

    /// The first typeset reported glyphs the fonts could not render.
    fn on_missing_glyphs(&self, missing: &MissingGlyphSet) {
        let _ = missing;
    }

    /// The fallback table was patched (possibly with nothing new).
    fn on_table_patched(&self, outcome: &PatchOutcome) {
        let _ = outcome;
    }

    /// Called once after the output PDF has been verified.
    fn on_conversion_complete(&self, stats: &ConversionStats) {
        let _ = stats;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
