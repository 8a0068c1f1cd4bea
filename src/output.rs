//! Conversion results.

use crate::config::PipelineVariant;
use crate::pipeline::diagnostics::CodePoint;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Result of a successful conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// The generated PDF (exists and is non-empty).
    pub output_path: PathBuf,
    pub variant: PipelineVariant,
    /// Where intermediates were kept, when `keep_intermediates` is on.
    pub intermediates_dir: Option<PathBuf>,
    pub stats: ConversionStats,
}

/// Counters describing what the pipeline did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// 1, or 2 when a repair was attempted. Never more.
    pub render_attempts: u32,
    /// Code points reported missing by the first typeset, ascending.
    pub missing_glyphs: Vec<CodePoint>,
    /// Code points newly added to the fallback table.
    pub patched: Vec<CodePoint>,
    /// Missing code points the table already routed.
    pub already_present: Vec<CodePoint>,
    /// The table could not be patched (soft failure).
    pub patch_failed: bool,
    /// Size of the final PDF.
    pub output_bytes: u64,
    pub total_duration_ms: u64,
}

impl ConversionStats {
    pub fn repaired(&self) -> bool {
        self.render_attempts > 1
    }
}
