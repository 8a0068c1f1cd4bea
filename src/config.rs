//! Configuration types for Markdown-to-PDF conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Keeping every knob in one struct lets
//! the CLI, library callers and tests share the same defaults.

use crate::error::Md2PdfError;
use crate::pipeline::process::CommandRunner;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default browser binaries, tried in order until one can be spawned.
pub const DEFAULT_BROWSERS: &[&str] = &["chromium", "chromium-browser", "google-chrome", "chrome"];

/// Configuration for one conversion.
///
/// # Example
/// ```rust
/// use md2pdf::{ConversionConfig, PipelineVariant};
///
/// let config = ConversionConfig::builder()
///     .variant(PipelineVariant::Latex)
///     .fallback_table("filters/emoji.lua")
///     .margin("2cm")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Which route to take. Default: [`PipelineVariant::Latex`].
    pub variant: PipelineVariant,

    /// Exact output path. When `None`, the PDF is written to `output_dir`
    /// as `<stem>_html.pdf` or `<stem>_latex.pdf`.
    pub output: Option<PathBuf>,

    /// Directory for the derived output name. Default: `.`.
    pub output_dir: PathBuf,

    /// The pandoc Lua filter holding the fallback table. Default: `emoji.lua`.
    ///
    /// Shared across runs: every repair makes later runs need one render fewer.
    pub fallback_table: PathBuf,

    /// Write the bundled filter when `fallback_table` does not exist. Default: true.
    pub install_default_table: bool,

    /// pandoc executable. Default: `pandoc`.
    pub pandoc_bin: String,

    /// Browser executables for the HTML route, tried in order while the
    /// previous one is not found on PATH.
    pub browser_bins: Vec<String>,

    /// `--pdf-engine` for the LaTeX route. Default: `lualatex`.
    ///
    /// The missing-character diagnostics are LuaLaTeX's; other engines run but
    /// will not trigger repairs.
    pub pdf_engine: String,

    /// Font family bound to `\emojiChar` in the LaTeX header. Default: `Noto Color Emoji`.
    pub emoji_font: String,

    /// Page margin for the LaTeX route (`geometry:margin=`). Default: `1in`.
    pub margin: String,

    /// `--virtual-time-budget` in ms, letting web fonts and MathJax settle
    /// before the browser prints. Default: 10000.
    pub virtual_time_budget_ms: u64,

    /// Replacement for [`crate::theme::DEFAULT_STYLESHEET`] (HTML route).
    pub stylesheet: Option<String>,

    /// Keep intermediates in the output PDF's directory instead of a temp dir. Default: false.
    pub keep_intermediates: bool,

    /// Abort when the fallback table cannot be patched. Default: false.
    ///
    /// When false a patch failure is logged and the retry render still runs.
    pub strict_patch: bool,

    /// Command runner. `None` uses [`crate::pipeline::process::SystemRunner`].
    pub runner: Option<Arc<dyn CommandRunner>>,

    /// Optional stage-progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            variant: PipelineVariant::default(),
            output: None,
            output_dir: PathBuf::from("."),
            fallback_table: PathBuf::from("emoji.lua"),
            install_default_table: true,
            pandoc_bin: "pandoc".to_string(),
            browser_bins: DEFAULT_BROWSERS.iter().map(|s| s.to_string()).collect(),
            pdf_engine: "lualatex".to_string(),
            emoji_font: "Noto Color Emoji".to_string(),
            margin: "1in".to_string(),
            virtual_time_budget_ms: 10_000,
            stylesheet: None,
            keep_intermediates: false,
            strict_patch: false,
            runner: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("variant", &self.variant)
            .field("output", &self.output)
            .field("output_dir", &self.output_dir)
            .field("fallback_table", &self.fallback_table)
            .field("install_default_table", &self.install_default_table)
            .field("pandoc_bin", &self.pandoc_bin)
            .field("browser_bins", &self.browser_bins)
            .field("pdf_engine", &self.pdf_engine)
            .field("emoji_font", &self.emoji_font)
            .field("margin", &self.margin)
            .field("virtual_time_budget_ms", &self.virtual_time_budget_ms)
            .field("stylesheet", &self.stylesheet.as_ref().map(|s| s.len()))
            .field("keep_intermediates", &self.keep_intermediates)
            .field("strict_patch", &self.strict_patch)
            .field("runner", &self.runner.as_ref().map(|_| "<dyn CommandRunner>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn variant(mut self, variant: PipelineVariant) -> Self {
        self.config.variant = variant;
        self
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output = Some(path.into());
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn fallback_table(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.fallback_table = path.into();
        self
    }

    pub fn install_default_table(mut self, v: bool) -> Self {
        self.config.install_default_table = v;
        self
    }

    pub fn pandoc_bin(mut self, bin: impl Into<String>) -> Self {
        self.config.pandoc_bin = bin.into();
        self
    }

    /// Use exactly this browser, disabling the fallback chain.
    pub fn browser_bin(mut self, bin: impl Into<String>) -> Self {
        self.config.browser_bins = vec![bin.into()];
        self
    }

    pub fn browser_bins<I, S>(mut self, bins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.browser_bins = bins.into_iter().map(Into::into).collect();
        self
    }

    pub fn pdf_engine(mut self, engine: impl Into<String>) -> Self {
        self.config.pdf_engine = engine.into();
        self
    }

    pub fn emoji_font(mut self, font: impl Into<String>) -> Self {
        self.config.emoji_font = font.into();
        self
    }

    pub fn margin(mut self, margin: impl Into<String>) -> Self {
        self.config.margin = margin.into();
        self
    }

    pub fn virtual_time_budget_ms(mut self, ms: u64) -> Self {
        self.config.virtual_time_budget_ms = ms;
        self
    }

    pub fn stylesheet(mut self, css: impl Into<String>) -> Self {
        self.config.stylesheet = Some(css.into());
        self
    }

    pub fn keep_intermediates(mut self, v: bool) -> Self {
        self.config.keep_intermediates = v;
        self
    }

    pub fn strict_patch(mut self, v: bool) -> Self {
        self.config.strict_patch = v;
        self
    }

    pub fn runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.config.runner = Some(runner);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Md2PdfError> {
        let c = &self.config;
        if c.pandoc_bin.trim().is_empty() {
            return Err(Md2PdfError::InvalidConfig("pandoc binary must not be empty".into()));
        }
        if c.variant == PipelineVariant::Html && c.browser_bins.iter().all(|b| b.trim().is_empty()) {
            return Err(Md2PdfError::InvalidConfig(
                "HTML route needs at least one browser binary".into(),
            ));
        }
        if c.variant == PipelineVariant::Latex {
            if c.pdf_engine.trim().is_empty() {
                return Err(Md2PdfError::InvalidConfig("PDF engine must not be empty".into()));
            }
            if c.margin.trim().is_empty() {
                return Err(Md2PdfError::InvalidConfig("margin must not be empty".into()));
            }
            if c.fallback_table.as_os_str().is_empty() {
                return Err(Md2PdfError::InvalidConfig(
                    "fallback table path must not be empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// The two conversion routes.
///
/// | Variant | Engine | Glyph repair |
/// |---------|--------|--------------|
/// | `Html`  | pandoc → themed HTML → headless browser | no; the browser's own font fallback applies |
/// | `Latex` | pandoc + LuaLaTeX with the fallback filter | yes, one retry |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineVariant {
    Html,
    #[default]
    Latex,
}

impl PipelineVariant {
    /// Suffix appended to the input stem for the derived output name.
    pub fn output_suffix(self) -> &'static str {
        match self {
            PipelineVariant::Html => "_html.pdf",
            PipelineVariant::Latex => "_latex.pdf",
        }
    }
}

impl fmt::Display for PipelineVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineVariant::Html => f.write_str("html"),
            PipelineVariant::Latex => f.write_str("latex"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ConversionConfig::default();
        assert_eq!(c.variant, PipelineVariant::Latex);
        assert_eq!(c.fallback_table, PathBuf::from("emoji.lua"));
        assert_eq!(c.browser_bins[0], "chromium");
        assert_eq!(c.margin, "1in");
        assert_eq!(c.virtual_time_budget_ms, 10_000);
        assert!(!c.strict_patch);
        assert!(!c.keep_intermediates);
    }

    #[test]
    fn builder_rejects_empty_engine() {
        let err = ConversionConfig::builder().pdf_engine(" ").build().unwrap_err();
        assert!(matches!(err, Md2PdfError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_html_without_browser() {
        let err = ConversionConfig::builder()
            .variant(PipelineVariant::Html)
            .browser_bins(Vec::<String>::new())
            .build()
            .unwrap_err();
        assert!(matches!(err, Md2PdfError::InvalidConfig(_)));
    }

    #[test]
    fn browser_bin_replaces_chain() {
        let c = ConversionConfig::builder()
            .browser_bin("/opt/chrome/chrome")
            .build()
            .unwrap();
        assert_eq!(c.browser_bins, vec!["/opt/chrome/chrome".to_string()]);
    }

    #[test]
    fn variant_suffixes() {
        assert_eq!(PipelineVariant::Html.output_suffix(), "_html.pdf");
        assert_eq!(PipelineVariant::Latex.output_suffix(), "_latex.pdf");
        assert_eq!(PipelineVariant::Latex.to_string(), "latex");
    }

    #[test]
    fn debug_hides_trait_objects() {
        let dbg = format!("{:?}", ConversionConfig::default());
        assert!(dbg.contains("ConversionConfig"));
        assert!(dbg.contains("runner: None"));
    }
}
