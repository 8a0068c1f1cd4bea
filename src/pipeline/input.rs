//! Input resolution and intermediate-artifact placement.
//!
//! ## Why a scoped workspace?
//!
//! Both routes leave files behind between steps (the HTML body and themed
//! document, the LaTeX header, the captured log). By default they live in a
//! `TempDir` that is removed when the [`Workspace`] is dropped, on success,
//! error or panic alike. With `keep_intermediates` they are written next to
//! the output instead so a failed run can be inspected.

use crate::config::{ConversionConfig, PipelineVariant};
use crate::error::Md2PdfError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// File name of the generated LaTeX header.
pub const HEADER_FILE: &str = "emoji_header.tex";

/// File name of the captured first-attempt stderr.
pub const LOG_FILE: &str = "pandoc_log.txt";

/// A validated Markdown input.
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    path: PathBuf,
    stem: String,
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name without extension; names every derived artifact.
    pub fn stem(&self) -> &str {
        &self.stem
    }
}

/// Validate that `path` is a readable regular file.
pub fn resolve_input(path: &Path) -> Result<ResolvedInput, Md2PdfError> {
    let meta = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Md2PdfError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(Md2PdfError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    };

    if !meta.is_file() {
        return Err(Md2PdfError::NotAFile {
            path: path.to_path_buf(),
        });
    }

    // Check read permission by attempting to open
    if let Err(e) = std::fs::File::open(path) {
        return Err(if e.kind() == std::io::ErrorKind::PermissionDenied {
            Md2PdfError::PermissionDenied {
                path: path.to_path_buf(),
            }
        } else {
            Md2PdfError::FileNotFound {
                path: path.to_path_buf(),
            }
        });
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string());

    debug!("Resolved Markdown input: {} (stem '{}')", path.display(), stem);
    Ok(ResolvedInput {
        path: path.to_path_buf(),
        stem,
    })
}

/// Where the final PDF goes: the explicit output, or
/// `<output_dir>/<stem>_<variant>.pdf`.
pub fn output_path(config: &ConversionConfig, input: &ResolvedInput) -> PathBuf {
    match &config.output {
        Some(p) => p.clone(),
        None => derived_name(&config.output_dir, input.stem(), config.variant),
    }
}

fn derived_name(dir: &Path, stem: &str, variant: PipelineVariant) -> PathBuf {
    dir.join(format!("{stem}{}", variant.output_suffix()))
}

/// Directory holding one run's intermediate artifacts.
pub enum Workspace {
    /// Removed on drop.
    Temp(TempDir),
    /// Left on disk.
    Kept(PathBuf),
}

impl Workspace {
    /// Scratch space for one run producing `output`.
    ///
    /// Kept intermediates go next to `output`, so an explicit `--output`
    /// elsewhere takes them along.
    pub fn create(config: &ConversionConfig, output: &Path) -> Result<Self, Md2PdfError> {
        if config.keep_intermediates {
            let dir = output
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            std::fs::create_dir_all(&dir).map_err(|e| Md2PdfError::ArtifactWriteFailed {
                path: dir.clone(),
                source: e,
            })?;
            Ok(Workspace::Kept(dir))
        } else {
            let dir = tempfile::Builder::new()
                .prefix("md2pdf-")
                .tempdir()
                .map_err(|e| Md2PdfError::Internal(format!("Failed to create temp dir: {e}")))?;
            debug!("Intermediates in {}", dir.path().display());
            Ok(Workspace::Temp(dir))
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Workspace::Temp(dir) => dir.path(),
            Workspace::Kept(dir) => dir,
        }
    }

    pub fn artifact(&self, name: &str) -> PathBuf {
        self.path().join(name)
    }

    /// The directory, if it outlives the run.
    pub fn kept_dir(&self) -> Option<PathBuf> {
        match self {
            Workspace::Temp(_) => None,
            Workspace::Kept(dir) => Some(dir.clone()),
        }
    }
}

/// Read an artifact a tool was supposed to produce.
pub fn read_artifact(path: &Path) -> Result<String, Md2PdfError> {
    std::fs::read_to_string(path).map_err(|e| Md2PdfError::ArtifactReadFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

pub fn write_artifact(path: &Path, content: &str) -> Result<(), Md2PdfError> {
    std::fs::write(path, content).map_err(|e| Md2PdfError::ArtifactWriteFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Confirm the final PDF exists and is non-empty; returns its size.
pub fn verify_output(path: &Path) -> Result<u64, Md2PdfError> {
    match std::fs::metadata(path) {
        Ok(m) if m.is_file() && m.len() > 0 => Ok(m.len()),
        _ => Err(Md2PdfError::OutputMissing {
            path: path.to_path_buf(),
        }),
    }
}
