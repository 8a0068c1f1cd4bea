//! The LuaLaTeX route and its glyph-repair loop.
//!
//! ## States
//!
//! ```text
//! Typeset(1, capture stderr) ─▶ Scan ─┬─ clean ─────────────────────────▶ Done
//!                                      └─ dirty ─▶ Patch ─▶ Typeset(2) ─▶ Done
//! ```
//!
//! Any tool failure is fatal. The second typeset runs the identical command
//! without capturing, and its result is final: there is exactly one retry,
//! however many glyphs were missing and whatever the retry reports.
//!
//! A failed patch (table unreadable, anchors gone) is logged and the retry
//! runs anyway unless `strict_patch` is set. The retry is then unlikely to
//! fix anything, but the document still gets produced with placeholder boxes.

use super::diagnostics::{self, MissingGlyphSet};
use super::input::{write_artifact, HEADER_FILE, LOG_FILE};
use super::process::{Capture, CommandSpec};
use super::RunContext;
use crate::config::ConversionConfig;
use crate::error::Md2PdfError;
use crate::fallback;
use crate::output::ConversionStats;
use crate::progress::Stage;
use crate::theme;
use std::path::Path;
use tracing::{debug, info, warn};

/// `pandoc <in> -o <out> --from markdown -V geometry:margin=<m>
/// --lua-filter=<table> --pdf-engine=<engine> -H <header> --listings`
pub fn typeset_command(
    config: &ConversionConfig,
    input: &Path,
    output: &Path,
    header: &Path,
) -> CommandSpec {
    let mut filter = std::ffi::OsString::from("--lua-filter=");
    filter.push(&config.fallback_table);

    CommandSpec::new(&config.pandoc_bin)
        .arg(input)
        .arg("-o")
        .arg(output)
        .args(["--from", "markdown", "-V"])
        .arg(format!("geometry:margin={}", config.margin))
        .arg(filter)
        .arg(format!("--pdf-engine={}", config.pdf_engine))
        .arg("-H")
        .arg(header)
        .arg("--listings")
}

/// Outcome of scanning the first attempt.
#[derive(Debug)]
enum Verdict {
    Clean,
    Dirty(MissingGlyphSet),
}

pub fn run(ctx: &RunContext<'_>) -> Result<ConversionStats, Md2PdfError> {
    let config = ctx.config;
    let table = &config.fallback_table;

    if config.install_default_table && !table.exists() {
        fallback::install_default(table).map_err(|source| Md2PdfError::FallbackTable {
            path: table.clone(),
            source,
        })?;
    }

    let header = ctx.workspace.artifact(HEADER_FILE);
    write_artifact(&header, &theme::latex_header(&config.emoji_font))?;

    let cmd = typeset_command(config, ctx.input.path(), ctx.output, &header);
    let mut stats = ConversionStats::default();

    // ── Attempt 1: capture diagnostics ───────────────────────────────────
    let stage = Stage::Typeset { attempt: 1 };
    ctx.progress.on_stage_start(stage);
    let first = ctx.runner.run(&cmd, Capture::Stderr)?;
    stats.render_attempts = 1;
    write_artifact(&ctx.workspace.artifact(LOG_FILE), &first.stderr)?;
    forward_diagnostics(&first.stderr);
    let first = first.ensure_success(&cmd)?;
    ctx.progress.on_stage_complete(stage);

    // ── Scan ─────────────────────────────────────────────────────────────
    ctx.progress.on_stage_start(Stage::Scan);
    let verdict = verdict(&first.stderr);
    ctx.progress.on_stage_complete(Stage::Scan);

    let missing = match verdict {
        Verdict::Clean => {
            debug!("No missing characters reported");
            return Ok(stats);
        }
        Verdict::Dirty(missing) => missing,
    };

    info!("Found {} missing characters: {}", missing.len(), missing);
    ctx.progress.on_missing_glyphs(&missing);
    stats.missing_glyphs = missing.iter().collect();

    // ── Patch ────────────────────────────────────────────────────────────
    ctx.progress.on_stage_start(Stage::Patch);
    match fallback::patch(table, &missing) {
        Ok(outcome) => {
            if !outcome.already_present.is_empty() {
                warn!(
                    "{} missing characters were already routed to '{}'; the font may lack them",
                    outcome.already_present.len(),
                    config.emoji_font
                );
            }
            ctx.progress.on_table_patched(&outcome);
            stats.patched = outcome.added;
            stats.already_present = outcome.already_present;
        }
        Err(source) if config.strict_patch => {
            return Err(Md2PdfError::FallbackTable {
                path: table.clone(),
                source,
            });
        }
        Err(e) => {
            warn!(
                "Could not patch {}: {}; re-running anyway",
                table.display(),
                e
            );
            stats.patch_failed = true;
        }
    }
    ctx.progress.on_stage_complete(Stage::Patch);

    // ── Attempt 2: final, not scanned ────────────────────────────────────
    let stage = Stage::Typeset { attempt: 2 };
    ctx.progress.on_stage_start(stage);
    info!("Re-running {}", config.pandoc_bin);
    ctx.runner.run(&cmd, Capture::Inherit)?.ensure_success(&cmd)?;
    stats.render_attempts = 2;
    ctx.progress.on_stage_complete(stage);

    Ok(stats)
}

fn verdict(stderr: &str) -> Verdict {
    let missing = diagnostics::scan(stderr);
    if missing.is_empty() {
        Verdict::Clean
    } else {
        Verdict::Dirty(missing)
    }
}

/// Captured stderr is not shown on the terminal; replay it through tracing.
fn forward_diagnostics(stderr: &str) {
    for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
        if diagnostics::is_missing_glyph_line(line) {
            warn!("{}", line);
        } else {
            debug!("{}", line);
        }
    }
}
