//! # md2pdf
//!
//! Convert Markdown to a styled PDF through external engines, and repair
//! missing-glyph failures on the fly.
//!
//! ## Why this crate?
//!
//! pandoc + LuaLaTeX produce beautiful PDFs until the document contains a
//! character the main font cannot draw: an emoji, a dingbat, an arrow. The
//! engine logs `Missing character: … U+1F680 …` and silently leaves a blank.
//! md2pdf reads those diagnostics, routes the offending code points to an
//! emoji font by extending a pandoc Lua filter, and typesets once more. The
//! filter is kept on disk, so the next document needs no repair at all.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Markdown
//!  │
//!  ├─ html   pandoc → Atom One Dark theme → headless Chromium → PDF
//!  │
//!  └─ latex  pandoc + LuaLaTeX (+ emoji.lua filter, emoji header)
//!              ├─ scan stderr for "Missing character: … U+XXXX"
//!              ├─ patch emoji.lua (dedup, locked, atomic rename)
//!              └─ typeset once more (exactly one retry)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use md2pdf::{convert, ConversionConfig, PipelineVariant};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .variant(PipelineVariant::Latex)
//!         .build()?;
//!     let output = convert("notes.md", &config).await?;
//!     println!("{}", output.output_path.display());
//!     if output.stats.repaired() {
//!         eprintln!("patched: {:?}", output.stats.patched);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `md2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ## External tools
//!
//! | Route | Needs |
//! |-------|-------|
//! | `html`  | `pandoc`, a Chromium-family browser |
//! | `latex` | `pandoc`, `lualatex`, the emoji font (default `Noto Color Emoji`) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod fallback;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod theme;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, PipelineVariant};
pub use convert::{convert, convert_sync, inspect_log};
pub use error::{Md2PdfError, TableError};
pub use fallback::{patch as patch_fallback_table, FallbackTable, PatchOutcome};
pub use output::{ConversionOutput, ConversionStats};
pub use pipeline::diagnostics::{scan as scan_diagnostics, CodePoint, MissingGlyphSet};
pub use pipeline::process::{Capture, CommandOutput, CommandRunner, CommandSpec, SystemRunner};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
