//! CLI binary for md2pdf.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use md2pdf::{
    convert, inspect_log, ConversionConfig, ConversionProgressCallback, ConversionStats,
    MissingGlyphSet, PatchOutcome, PipelineVariant, ProgressCallback, Stage,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner showing the current stage, with one log line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, input: &Path, variant: PipelineVariant) {
        self.bar.set_prefix("Converting");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("{} via {variant}", input.display()))
        ));
    }

    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_message(stage.to_string());
    }

    fn on_stage_complete(&self, stage: Stage) {
        self.bar.println(format!("  {} {}", green("✓"), stage));
    }

    fn on_missing_glyphs(&self, missing: &MissingGlyphSet) {
        self.bar.println(format!(
            "  {} {} missing: {}",
            yellow("⚠"),
            missing.len(),
            dim(&missing.to_string())
        ));
    }

    fn on_table_patched(&self, outcome: &PatchOutcome) {
        if outcome.changed() {
            self.bar.println(format!(
                "  {} routed {} new code point(s) to the fallback font",
                green("+"),
                outcome.added.len()
            ));
        }
    }

    fn on_conversion_complete(&self, _stats: &ConversionStats) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # LuaLaTeX route with emoji repair (writes notes_latex.pdf)
  md2pdf notes.md

  # Browser route with the Atom One Dark theme (writes notes_html.pdf)
  md2pdf --variant html notes.md

  # Custom output, filter location and margins
  md2pdf notes.md -o build/notes.pdf --table filters/emoji.lua --margin 2cm

  # Keep the intermediate HTML/TeX/log next to the output (in build/)
  md2pdf --keep-intermediates --output-dir build notes.md

  # Which glyphs did a previous run miss?
  md2pdf --scan-log build/pandoc_log.txt

EXTERNAL TOOLS:
  html    pandoc, chromium (or chromium-browser / google-chrome / chrome)
  latex   pandoc, lualatex, the emoji font (default: Noto Color Emoji)

THE FALLBACK TABLE:
  The LaTeX route passes a pandoc Lua filter (default ./emoji.lua) whose
  is_emoji() function routes code points to the emoji font. When LuaLaTeX
  reports "Missing character: ... U+XXXX", md2pdf appends those code points
  to is_emoji() and typesets once more. The filter is created on first use
  and accumulates across runs. Edits are serialised through a lock file
  next to it (emoji.lua.lock); it stays after each run and is safe to
  ignore or add to .gitignore.
"#;

/// Convert Markdown to a themed PDF with self-healing emoji fallback.
#[derive(Parser, Debug)]
#[command(
    name = "md2pdf",
    version,
    about = "Convert Markdown to a themed PDF with self-healing emoji fallback",
    long_about = "Convert Markdown to PDF through pandoc and either a headless Chromium \
(themed HTML route) or LuaLaTeX (typeset route). The LaTeX route detects characters the \
fonts cannot render, extends the emoji fallback filter, and re-runs once.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Markdown file to convert.
    #[arg(required_unless_present = "scan_log")]
    input: Option<PathBuf>,

    /// Write the PDF here instead of <output-dir>/<stem>_<variant>.pdf.
    #[arg(short, long, env = "MD2PDF_OUTPUT")]
    output: Option<PathBuf>,

    /// Directory for the derived output name.
    #[arg(long, env = "MD2PDF_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Conversion route.
    #[arg(long, env = "MD2PDF_VARIANT", value_enum, default_value = "latex")]
    variant: VariantArg,

    /// The pandoc Lua filter holding the fallback table.
    #[arg(long, env = "MD2PDF_TABLE", default_value = "emoji.lua")]
    table: PathBuf,

    /// Do not create the bundled filter when the table file is missing.
    #[arg(long, env = "MD2PDF_NO_INSTALL_TABLE")]
    no_install_table: bool,

    /// pandoc executable.
    #[arg(long, env = "MD2PDF_PANDOC", default_value = "pandoc")]
    pandoc: String,

    /// Browser executable (disables the chromium/chrome fallback chain).
    #[arg(long, env = "MD2PDF_BROWSER")]
    browser: Option<String>,

    /// pandoc --pdf-engine for the LaTeX route.
    #[arg(long, env = "MD2PDF_PDF_ENGINE", default_value = "lualatex")]
    pdf_engine: String,

    /// Font family used for fallback glyphs.
    #[arg(long, env = "MD2PDF_EMOJI_FONT", default_value = "Noto Color Emoji")]
    emoji_font: String,

    /// Page margin for the LaTeX route.
    #[arg(long, env = "MD2PDF_MARGIN", default_value = "1in")]
    margin: String,

    /// Browser virtual time budget in milliseconds.
    #[arg(long, env = "MD2PDF_VIRTUAL_TIME_BUDGET", default_value_t = 10_000)]
    virtual_time_budget: u64,

    /// Replace the built-in theme with this file (a <style> block).
    #[arg(long, env = "MD2PDF_STYLESHEET")]
    stylesheet: Option<PathBuf>,

    /// Keep intermediate artifacts in the output directory.
    #[arg(long, env = "MD2PDF_KEEP_INTERMEDIATES")]
    keep_intermediates: bool,

    /// Fail if the fallback table cannot be patched.
    #[arg(long, env = "MD2PDF_STRICT_PATCH")]
    strict_patch: bool,

    /// Print the missing code points found in a saved log and exit.
    #[arg(long, value_name = "LOG")]
    scan_log: Option<PathBuf>,

    /// Print ConversionOutput as JSON.
    #[arg(long, env = "MD2PDF_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "MD2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MD2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MD2PDF_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum VariantArg {
    Html,
    Latex,
}

impl From<VariantArg> for PipelineVariant {
    fn from(v: VariantArg) -> Self {
        match v {
            VariantArg::Html => PipelineVariant::Html,
            VariantArg::Latex => PipelineVariant::Latex,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Usage errors exit 1 like every other failure; help/version exit 0.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && cli.scan_log.is_none();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Scan-only mode ───────────────────────────────────────────────────
    if let Some(ref log) = cli.scan_log {
        let missing = inspect_log(log).context("Failed to scan log")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&missing).context("Failed to serialise result")?
            );
        } else if missing.is_empty() {
            println!("No missing characters in {}", log.display());
        } else {
            for code in &missing {
                let glyph = char::from_u32(code.value()).map(String::from).unwrap_or_default();
                println!("U+{code}\t{glyph}");
            }
        }
        return Ok(());
    }

    let input = cli
        .input
        .clone()
        .context("Missing input Markdown file")?;

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    // ── Run conversion ───────────────────────────────────────────────────
    let output = convert(&input, &config).await.context("Conversion failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        let stats = &output.stats;
        eprintln!(
            "{}  {}  {}",
            green("✔"),
            bold(&output.output_path.display().to_string()),
            dim(&format!(
                "{} bytes, {} render(s), {}ms",
                stats.output_bytes, stats.render_attempts, stats.total_duration_ms
            )),
        );
        if stats.patch_failed {
            eprintln!(
                "   {} fallback table could not be patched; glyphs may be missing",
                yellow("⚠")
            );
        } else if !stats.patched.is_empty() {
            let codes: Vec<String> = stats.patched.iter().map(|c| format!("U+{c}")).collect();
            eprintln!("   {} {}", dim("patched:"), codes.join(", "));
        }
        if let Some(ref dir) = output.intermediates_dir {
            eprintln!("   {} {}", dim("intermediates:"), dir.display());
        }
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .variant(cli.variant.into())
        .output_dir(&cli.output_dir)
        .fallback_table(&cli.table)
        .install_default_table(!cli.no_install_table)
        .pandoc_bin(&cli.pandoc)
        .pdf_engine(&cli.pdf_engine)
        .emoji_font(&cli.emoji_font)
        .margin(&cli.margin)
        .virtual_time_budget_ms(cli.virtual_time_budget)
        .keep_intermediates(cli.keep_intermediates)
        .strict_patch(cli.strict_patch);

    if let Some(ref output) = cli.output {
        builder = builder.output(output);
    }
    if let Some(ref browser) = cli.browser {
        builder = builder.browser_bin(browser);
    }
    if let Some(ref path) = cli.stylesheet {
        let css = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read stylesheet from {:?}", path))?;
        builder = builder.stylesheet(css);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
