//! Error types for the md2pdf library.
//!
//! Two error types reflect two different scopes:
//!
//! * [`Md2PdfError`] — **Fatal** for the conversion: the input is unusable,
//!   an external tool could not be spawned or exited non-zero, or the final
//!   PDF never appeared. Returned as `Err(Md2PdfError)` from the top-level
//!   `convert*` functions.
//!
//! * [`TableError`] — a problem with the persisted fallback table (anchors
//!   missing, lock or I/O failure). The LaTeX pipeline treats it as a soft
//!   failure by default: it is logged, counted in
//!   [`crate::output::ConversionStats::patch_failed`], and the retry render
//!   still happens. With `strict_patch` it is wrapped in
//!   [`Md2PdfError::FallbackTable`] and aborts the run.
//!
//! Malformed diagnostic lines never produce an error at all.

use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// All fatal errors returned by the md2pdf library.
#[derive(Debug, Error)]
pub enum Md2PdfError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Markdown file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input path exists but is a directory or other non-regular file.
    #[error("Input '{path}' is not a regular file")]
    NotAFile { path: PathBuf },

    // ── External tool errors ──────────────────────────────────────────────
    /// The program could not be found on `PATH`.
    #[error("'{program}' was not found on PATH.\n{hint}")]
    ToolNotFound { program: String, hint: String },

    /// The program exists but spawning it failed for another reason.
    #[error("Failed to start '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran and exited unsuccessfully.
    #[error("Command failed with {status}: {command}")]
    ToolFailed { command: String, status: ExitStatus },

    // ── Artifact errors ───────────────────────────────────────────────────
    /// An intermediate artifact produced by a tool could not be read.
    #[error("Failed to read intermediate artifact '{path}': {source}")]
    ArtifactReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An intermediate artifact could not be written.
    #[error("Failed to write '{path}': {source}")]
    ArtifactWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Every command succeeded but the PDF is absent or empty.
    #[error("Expected output '{path}' is missing or empty after the final render")]
    OutputMissing { path: PathBuf },

    // ── Fallback table errors ─────────────────────────────────────────────
    /// The fallback table could not be patched and `strict_patch` is on.
    #[error("Fallback table '{path}': {source}")]
    FallbackTable {
        path: PathBuf,
        #[source]
        source: TableError,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure to read, recognise, or rewrite the fallback table.
#[derive(Debug, Error)]
pub enum TableError {
    /// The function that declares the fallback predicates was not found.
    #[error("start anchor '{anchor}' not found (table not recognised)")]
    StartAnchorMissing { anchor: String },

    /// The start anchor was found but no closing `end` follows it.
    #[error("no closing 'end' after '{after}'")]
    EndAnchorMissing { after: String },

    /// The edited table no longer parses back to the expected content.
    #[error("edited table failed round-trip validation: {detail}")]
    RoundTripMismatch { detail: String },

    /// Could not take the exclusive lock on the table.
    #[error("could not lock '{path}': {detail}")]
    Lock { path: PathBuf, detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
