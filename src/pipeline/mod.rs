//! Pipeline stages for Markdown-to-PDF conversion.
//!
//! Each submodule owns one concern so it can be tested without the others,
//! and without pandoc, a browser or TeX installed.
//!
//! ## Data Flow
//!
//! ```text
//! HTML route:   input ──▶ pandoc ──▶ theme::wrap ──▶ browser ──▶ PDF
//!
//! LaTeX route:  input ──▶ pandoc+lualatex ──▶ diagnostics::scan
//!                              ▲                    │ missing glyphs?
//!                              │ (once)             ▼
//!                              └──────── fallback::patch
//! ```
//!
//! 1. [`input`]       — validate the Markdown path, name and place artifacts
//! 2. [`process`]     — run external tools, optionally capturing stderr
//! 3. [`html`]        — the browser route; no repair loop
//! 4. [`latex`]       — the LuaLaTeX route with the single repair retry
//! 5. [`diagnostics`] — extract missing code points from LuaLaTeX output

pub mod diagnostics;
pub mod html;
pub mod input;
pub mod latex;
pub mod process;

use crate::config::ConversionConfig;
use crate::progress::ConversionProgressCallback;
use input::{ResolvedInput, Workspace};
use process::CommandRunner;
use std::path::Path;

/// Everything a pipeline variant needs for one run.
pub struct RunContext<'a> {
    pub config: &'a ConversionConfig,
    pub runner: &'a dyn CommandRunner,
    pub progress: &'a dyn ConversionProgressCallback,
    pub input: &'a ResolvedInput,
    pub workspace: &'a Workspace,
    pub output: &'a Path,
}
