//! The browser route: pandoc body fragment → themed HTML → headless PDF.
//!
//! There is no repair loop here. The browser resolves missing glyphs with
//! its own system font fallback, and it reports nothing we could act on.

use super::input::{read_artifact, write_artifact};
use super::process::{Capture, CommandSpec};
use super::RunContext;
use crate::config::ConversionConfig;
use crate::error::Md2PdfError;
use crate::output::ConversionStats;
use crate::progress::Stage;
use crate::theme;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// `pandoc <in> -o <body> --from markdown+emoji --mathjax`
pub fn pandoc_command(config: &ConversionConfig, input: &Path, body: &Path) -> CommandSpec {
    CommandSpec::new(&config.pandoc_bin)
        .arg(input)
        .arg("-o")
        .arg(body)
        .args(["--from", "markdown+emoji", "--mathjax"])
}

/// Headless print of `document` to `output` without browser headers/footers.
pub fn browser_command(
    browser: &str,
    config: &ConversionConfig,
    document: &Path,
    output: &Path,
) -> CommandSpec {
    let mut print_to = std::ffi::OsString::from("--print-to-pdf=");
    print_to.push(absolute(output));

    CommandSpec::new(browser)
        .args(["--headless", "--disable-gpu"])
        .arg(print_to)
        .arg(absolute(document))
        .args([
            "--no-pdf-header-footer",
            "--run-all-compositor-stages-before-draw",
        ])
        .arg(format!(
            "--virtual-time-budget={}",
            config.virtual_time_budget_ms
        ))
}

/// The browser resolves relative paths against its own notion of cwd.
fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

pub fn run(ctx: &RunContext<'_>) -> Result<ConversionStats, Md2PdfError> {
    let config = ctx.config;
    let stem = ctx.input.stem();
    let body_path = ctx.workspace.artifact(&format!("{stem}_body.html"));
    let full_path = ctx.workspace.artifact(&format!("{stem}_full.html"));

    // ── Step 1: Markdown → HTML body ─────────────────────────────────────
    ctx.progress.on_stage_start(Stage::MarkdownToHtml);
    let cmd = pandoc_command(config, ctx.input.path(), &body_path);
    ctx.runner.run(&cmd, Capture::Inherit)?.ensure_success(&cmd)?;
    ctx.progress.on_stage_complete(Stage::MarkdownToHtml);

    // ── Step 2: Theme injection ──────────────────────────────────────────
    ctx.progress.on_stage_start(Stage::ThemeInjection);
    let body = read_artifact(&body_path)?;
    let stylesheet = config
        .stylesheet
        .as_deref()
        .unwrap_or(theme::DEFAULT_STYLESHEET);
    write_artifact(&full_path, &theme::wrap(&body, stylesheet))?;
    ctx.progress.on_stage_complete(Stage::ThemeInjection);

    // ── Step 3: Rasterise ────────────────────────────────────────────────
    ctx.progress.on_stage_start(Stage::Rasterise);
    rasterise(ctx, &full_path)?;
    ctx.progress.on_stage_complete(Stage::Rasterise);

    Ok(ConversionStats {
        render_attempts: 1,
        ..Default::default()
    })
}

/// Try each configured browser until one can be spawned.
///
/// Only "not found" moves on to the next candidate; a browser that starts
/// and fails is fatal.
fn rasterise(ctx: &RunContext<'_>, document: &Path) -> Result<(), Md2PdfError> {
    let mut tried = Vec::new();

    for browser in ctx.config.browser_bins.iter().filter(|b| !b.trim().is_empty()) {
        let cmd = browser_command(browser, ctx.config, document, ctx.output);
        match ctx.runner.run(&cmd, Capture::Inherit) {
            Ok(out) => {
                out.ensure_success(&cmd)?;
                info!("Rasterised with {}", browser);
                return Ok(());
            }
            Err(Md2PdfError::ToolNotFound { .. }) => {
                warn!("Browser '{}' not found, trying next candidate", browser);
                tried.push(browser.as_str());
            }
            Err(e) => return Err(e),
        }
    }

    Err(Md2PdfError::ToolNotFound {
        program: tried.first().copied().unwrap_or("chromium").to_string(),
        hint: format!(
            "Tried: {}. Install Chromium or Google Chrome, or pass --browser <path>.",
            tried.join(", ")
        ),
    })
}
