//! Conversion entry points.
//!
//! ## Why spawn_blocking?
//!
//! Every step is a blocking child process or a small file edit, and each
//! step waits for the previous one. The pipeline is therefore written as
//! plain blocking code ([`convert_sync`]); the async [`convert`] moves it onto
//! tokio's blocking pool so async callers do not stall a worker thread for
//! the minutes LuaLaTeX can take.

use crate::config::{ConversionConfig, PipelineVariant};
use crate::error::Md2PdfError;
use crate::output::ConversionOutput;
use crate::pipeline::diagnostics::{self, MissingGlyphSet};
use crate::pipeline::input::{self, Workspace};
use crate::pipeline::process::{CommandRunner, SystemRunner};
use crate::pipeline::{html, latex, RunContext};
use crate::progress::{ConversionProgressCallback, NoopProgressCallback};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// Convert a Markdown file to PDF.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// Returns `Err(Md2PdfError)` for:
/// - input not found / not readable
/// - any external tool missing or exiting non-zero
/// - an intermediate artifact that cannot be read or written
/// - a fallback-table failure when `strict_patch` is on
/// - a final PDF that is missing or empty
pub async fn convert(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Md2PdfError> {
    let input = input.as_ref().to_path_buf();
    let config = config.clone();

    tokio::task::spawn_blocking(move || convert_sync(&input, &config))
        .await
        .map_err(|e| Md2PdfError::Internal(format!("Conversion task panicked: {}", e)))?
}

/// Blocking conversion on the calling thread.
pub fn convert_sync(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Md2PdfError> {
    let total_start = Instant::now();
    let input_path = input.as_ref();
    info!("Starting {} conversion: {}", config.variant, input_path.display());

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let resolved = input::resolve_input(input_path)?;
    let output = input::output_path(config, &resolved);
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Md2PdfError::ArtifactWriteFailed {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    // ── Step 2: Scoped workspace for intermediates ───────────────────────
    let workspace = Workspace::create(config, &output)?;

    let system = SystemRunner;
    let runner: &dyn CommandRunner = config.runner.as_deref().unwrap_or(&system);
    let noop = NoopProgressCallback;
    let progress: &dyn ConversionProgressCallback =
        config.progress_callback.as_deref().unwrap_or(&noop);

    progress.on_conversion_start(resolved.path(), config.variant);

    // ── Step 3: Run the selected route ───────────────────────────────────
    let ctx = RunContext {
        config,
        runner,
        progress,
        input: &resolved,
        workspace: &workspace,
        output: &output,
    };
    let mut stats = match config.variant {
        PipelineVariant::Html => html::run(&ctx)?,
        PipelineVariant::Latex => latex::run(&ctx)?,
    };

    // ── Step 4: Verify the artifact ──────────────────────────────────────
    stats.output_bytes = input::verify_output(&output)?;
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Successfully created {} ({} bytes, {} render{}, {}ms)",
        output.display(),
        stats.output_bytes,
        stats.render_attempts,
        if stats.render_attempts == 1 { "" } else { "s" },
        stats.total_duration_ms
    );
    progress.on_conversion_complete(&stats);

    Ok(ConversionOutput {
        output_path: output,
        variant: config.variant,
        intermediates_dir: workspace.kept_dir(),
        stats,
    })
}

/// Report the missing code points recorded in a saved diagnostic log.
///
/// Runs no external tool and touches no table.
pub fn inspect_log(log: impl AsRef<Path>) -> Result<MissingGlyphSet, Md2PdfError> {
    let path: PathBuf = log.as_ref().to_path_buf();
    diagnostics::scan_file(&path).map_err(|e| Md2PdfError::ArtifactReadFailed { path, source: e })
}
