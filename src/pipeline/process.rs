//! External process execution.
//!
//! Every collaborator (pandoc, the browser, LuaLaTeX through pandoc) is run
//! through a [`CommandRunner`]. The default [`SystemRunner`] spawns the real
//! program with `std::process::Command` and blocks until it exits; tests inject
//! scripted runners through [`crate::config::ConversionConfig::runner`] so the
//! repair loop can be exercised without any of the tools installed.
//!
//! Arguments travel as an argv vector, never through a shell, so spaces or
//! metacharacters in paths reach the tool untouched.

use crate::error::Md2PdfError;
use std::ffi::OsString;
use std::fmt;
use std::io::ErrorKind;
use std::process::{Command, ExitStatus, Stdio};
use tracing::{debug, info};

/// A fully-formed program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<OsString>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Value following `flag` (as a separate argument), if present.
    pub fn value_after(&self, flag: &str) -> Option<&OsString> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
    }

    /// Value of a `--flag=value` style argument, if present.
    pub fn value_of(&self, flag: &str) -> Option<String> {
        let prefix = format!("{flag}=");
        self.args.iter().find_map(|a| {
            a.to_str()
                .and_then(|s| s.strip_prefix(&prefix))
                .map(str::to_string)
        })
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            let arg = arg.to_string_lossy();
            if arg.contains(char::is_whitespace) {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// What to do with the child's error stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    /// Child shares the parent's stdout and stderr.
    Inherit,
    /// Child's stderr is collected into [`CommandOutput::stderr`].
    Stderr,
}

/// Result of one finished process.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    /// Captured stderr; empty under [`Capture::Inherit`].
    pub stderr: String,
}

impl CommandOutput {
    /// Turn a non-zero exit into the fatal [`Md2PdfError::ToolFailed`].
    pub fn ensure_success(self, cmd: &CommandSpec) -> Result<Self, Md2PdfError> {
        if self.status.success() {
            Ok(self)
        } else {
            Err(Md2PdfError::ToolFailed {
                command: cmd.to_string(),
                status: self.status,
            })
        }
    }
}

/// Runs external commands, blocking until they exit.
///
/// Implementations must not retry; retry policy belongs to the pipeline.
pub trait CommandRunner: Send + Sync {
    fn run(&self, cmd: &CommandSpec, capture: Capture) -> Result<CommandOutput, Md2PdfError>;
}

/// [`CommandRunner`] backed by `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, cmd: &CommandSpec, capture: Capture) -> Result<CommandOutput, Md2PdfError> {
        info!("Running: {}", cmd);

        let mut command = Command::new(&cmd.program);
        command.args(&cmd.args).stdin(Stdio::null());

        let result = match capture {
            Capture::Inherit => command.status().map(|status| CommandOutput {
                status,
                stderr: String::new(),
            }),
            Capture::Stderr => command
                .stdout(Stdio::inherit())
                .stderr(Stdio::piped())
                .output()
                .map(|out| CommandOutput {
                    status: out.status,
                    stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
                }),
        };

        let output = result.map_err(|e| spawn_error(&cmd.program, e))?;
        debug!("'{}' exited with {}", cmd.program, output.status);
        Ok(output)
    }
}

fn spawn_error(program: &str, source: std::io::Error) -> Md2PdfError {
    if source.kind() == ErrorKind::NotFound {
        Md2PdfError::ToolNotFound {
            program: program.to_string(),
            hint: install_hint(program).to_string(),
        }
    } else {
        Md2PdfError::SpawnFailed {
            program: program.to_string(),
            source,
        }
    }
}

fn install_hint(program: &str) -> &'static str {
    match program {
        "pandoc" => "Install pandoc: https://pandoc.org/installing.html",
        "lualatex" => "Install a TeX distribution that ships LuaLaTeX (TeX Live, MiKTeX).",
        p if p.contains("chrom") => {
            "Install Chromium or Google Chrome, or pass --browser <path>."
        }
        _ => "Check that the program is installed and on PATH.",
    }
}
