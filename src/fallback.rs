//! The persisted fallback table: a pandoc Lua filter whose `is_emoji`
//! function decides which code points are routed to the emoji font.
//!
//! ## Recognised shape
//!
//! ```lua
//! function is_emoji(code)
//!     return (code >= 0x1F300 and code <= 0x1F5FF)
//!         or (code == 0x2764)
//! end
//! ```
//!
//! Only two things are load-bearing: the start anchor `function is_emoji`
//! and the first line that starts with `end` after it. Everything before that
//! line is the `head`, everything from it on is the `tail`. Inside the head's
//! function body we recognise `code == 0x…` and `code >= 0x… and code <= 0x…`
//! predicates so already-routed code points are never added twice. Anything
//! else in the file is carried through untouched.
//!
//! ## Concurrency
//!
//! The table is shared by every run on the machine. [`patch`] holds an
//! exclusive advisory lock on `<table>.lock` for the whole read-modify-write
//! and replaces the file through a temporary sibling plus atomic rename, so a
//! crash never leaves a half-written filter behind.

use crate::error::TableError;
use crate::pipeline::diagnostics::{CodePoint, MissingGlyphSet};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Marks the function that holds the fallback predicates.
pub const START_ANCHOR: &str = "function is_emoji";

/// Closes the predicate function: `end` at the start of a line.
pub const END_ANCHOR: &str = "\nend";

/// Filter shipped with md2pdf, installed when no table exists yet.
pub const DEFAULT_TABLE: &str = include_str!("../assets/emoji.lua");

static RE_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"code\s*>=\s*0x([0-9A-Fa-f]+)\s+and\s+code\s*<=\s*0x([0-9A-Fa-f]+)").unwrap()
});

static RE_EXACT: Lazy<Regex> = Lazy::new(|| Regex::new(r"code\s*==\s*0x([0-9A-Fa-f]+)").unwrap());

/// One routing rule found in `is_emoji`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    Exact(CodePoint),
    /// Inclusive on both ends.
    Range(CodePoint, CodePoint),
}

impl Predicate {
    pub fn covers(&self, code: CodePoint) -> bool {
        match *self {
            Predicate::Exact(c) => c == code,
            Predicate::Range(lo, hi) => lo <= code && code <= hi,
        }
    }
}

/// Typed view of the fallback table.
#[derive(Debug, Clone)]
pub struct FallbackTable {
    head: String,
    tail: String,
    newline: &'static str,
    predicates: Vec<Predicate>,
    inserted: Vec<CodePoint>,
}

impl FallbackTable {
    /// Parse table content, locating both anchors.
    pub fn parse(content: &str) -> Result<Self, TableError> {
        let start = content
            .find(START_ANCHOR)
            .ok_or_else(|| TableError::StartAnchorMissing {
                anchor: START_ANCHOR.to_string(),
            })?;

        let mut end = content[start..]
            .find(END_ANCHOR)
            .map(|rel| start + rel)
            .ok_or_else(|| TableError::EndAnchorMissing {
                after: START_ANCHOR.to_string(),
            })?;

        // CRLF files: keep the `\r` with the closing line so inserted clauses
        // stay on lines of their own.
        let newline = if content[..end].ends_with('\r') {
            end -= 1;
            "\r\n"
        } else {
            "\n"
        };

        let predicates = parse_predicates(&content[start..end]);
        debug!(
            "Fallback table: {} predicates in is_emoji",
            predicates.len()
        );

        Ok(Self {
            head: content[..end].to_string(),
            tail: content[end..].to_string(),
            newline,
            predicates,
            inserted: Vec::new(),
        })
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Code points appended since parsing, in insertion order.
    pub fn inserted(&self) -> &[CodePoint] {
        &self.inserted
    }

    /// Whether `code` is already routed by an existing or inserted predicate.
    pub fn covers(&self, code: CodePoint) -> bool {
        self.predicates.iter().any(|p| p.covers(code)) || self.inserted.contains(&code)
    }

    /// Append an `or (code == 0x…)` clause. Returns `false` if already covered.
    pub fn insert(&mut self, code: CodePoint) -> bool {
        if self.covers(code) {
            return false;
        }
        self.inserted.push(code);
        true
    }

    /// Serialise back to text. Byte-identical to the input when nothing was
    /// inserted.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.head.len() + self.tail.len() + 32 * self.inserted.len());
        out.push_str(&self.head);
        for code in &self.inserted {
            out.push_str(&clause(code, self.newline));
        }
        out.push_str(&self.tail);
        out
    }

    /// Re-parse the rendered text and confirm the edit is exactly what we meant.
    fn validate(&self, rendered: &str) -> Result<(), TableError> {
        let reparsed = FallbackTable::parse(rendered).map_err(|e| TableError::RoundTripMismatch {
            detail: e.to_string(),
        })?;
        if !rendered.starts_with(&self.head) || !rendered.ends_with(&self.tail) {
            return Err(TableError::RoundTripMismatch {
                detail: "content outside the insertion point changed".into(),
            });
        }
        if let Some(code) = self.inserted.iter().find(|c| !reparsed.covers(**c)) {
            return Err(TableError::RoundTripMismatch {
                detail: format!("inserted code 0x{code} is not recognised after re-parse"),
            });
        }
        Ok(())
    }
}

fn clause(code: &CodePoint, newline: &str) -> String {
    format!("{newline}\t\tor (code == 0x{code})")
}

fn parse_predicates(body: &str) -> Vec<Predicate> {
    let mut predicates = Vec::new();
    for line in strip_comments(body).lines() {
        for caps in RE_RANGE.captures_iter(line) {
            if let (Ok(lo), Ok(hi)) = (caps[1].parse(), caps[2].parse()) {
                predicates.push(Predicate::Range(lo, hi));
            }
        }
        for caps in RE_EXACT.captures_iter(line) {
            if let Ok(code) = caps[1].parse() {
                predicates.push(Predicate::Exact(code));
            }
        }
    }
    predicates
}

/// `body` with Lua comments removed, both `-- line` and `--[==[ block ]==]`.
///
/// Newlines inside block comments are kept so line structure survives. An
/// unterminated block comment runs to the end of `body`, as it does in Lua.
fn strip_comments(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut rest = body;

    while let Some(pos) = rest.find("--") {
        out.push_str(&rest[..pos]);
        let comment = &rest[pos + 2..];

        rest = match long_bracket_level(comment) {
            Some(level) => {
                let open = level + 2;
                let close = format!("]{}]", "=".repeat(level));
                let (inner, after) = match comment[open..].find(&close) {
                    Some(end) => (
                        &comment[open..open + end],
                        &comment[open + end + close.len()..],
                    ),
                    None => (&comment[open..], ""),
                };
                out.extend(inner.chars().filter(|c| *c == '\n'));
                after
            }
            None => comment.find('\n').map_or("", |nl| &comment[nl..]),
        };
    }

    out.push_str(rest);
    out
}

/// Level of a Lua long bracket opening `s` (`[[` is 0, `[==[` is 2).
fn long_bracket_level(s: &str) -> Option<usize> {
    let s = s.strip_prefix('[')?;
    let level = s.bytes().take_while(|b| *b == b'=').count();
    s[level..].starts_with('[').then_some(level)
}

/// What a [`patch`] call changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchOutcome {
    /// Code points newly routed to the fallback font.
    pub added: Vec<CodePoint>,
    /// Code points that an existing predicate already covered.
    pub already_present: Vec<CodePoint>,
}

impl PatchOutcome {
    /// `true` if the file was rewritten.
    pub fn changed(&self) -> bool {
        !self.added.is_empty()
    }
}

/// Route every code in `codes` to the fallback font by editing the table at
/// `path` in place.
///
/// * An empty set returns immediately without touching the file.
/// * Codes already covered are reported in
///   [`PatchOutcome::already_present`] and not re-added.
/// * If either anchor is missing the file is left unmodified and an error is
///   returned.
pub fn patch(path: &Path, codes: &MissingGlyphSet) -> Result<PatchOutcome, TableError> {
    if codes.is_empty() {
        return Ok(PatchOutcome::default());
    }

    let _lock = TableLock::acquire(path)?;

    let content = fs::read_to_string(path)?;
    let mut table = FallbackTable::parse(&content)?;

    let mut outcome = PatchOutcome::default();
    for code in codes {
        if table.insert(code) {
            outcome.added.push(code);
        } else {
            outcome.already_present.push(code);
        }
    }

    if !outcome.changed() {
        debug!("All {} missing codes already routed; table unchanged", codes.len());
        return Ok(outcome);
    }

    let rendered = table.render();
    table.validate(&rendered)?;
    write_atomic(path, &rendered)?;

    info!(
        "Updated {} with {} new missing emoji codes",
        path.display(),
        outcome.added.len()
    );
    Ok(outcome)
}

/// Write the bundled [`DEFAULT_TABLE`] to `path` unless a file already exists.
///
/// Returns `true` if the file was created.
pub fn install_default(path: &Path) -> Result<bool, TableError> {
    if let Some(parent) = non_empty_parent(path) {
        fs::create_dir_all(parent)?;
    }
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut file) => {
            file.write_all(DEFAULT_TABLE.as_bytes())?;
            info!("Installed default fallback table at {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn non_empty_parent(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}

fn write_atomic(path: &Path, content: &str) -> Result<(), TableError> {
    let dir = non_empty_parent(path).unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;

    // NamedTempFile is created 0600; keep the table's own mode.
    if let Ok(meta) = fs::metadata(path) {
        fs::set_permissions(tmp.path(), meta.permissions())?;
    }

    tmp.persist(path).map_err(|e| TableError::Io(e.error))?;
    Ok(())
}

/// Path of the lock file guarding `table`.
///
/// The file is left in place after the lock is released; deleting it while
/// another run holds the lock would let a third run lock a fresh inode.
pub fn lock_path(table: &Path) -> PathBuf {
    let mut name = table.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// Exclusive advisory lock held for the lifetime of the value.
struct TableLock {
    #[cfg(unix)]
    _flock: nix::fcntl::Flock<File>,
    #[cfg(not(unix))]
    _file: File,
}

impl TableLock {
    fn acquire(table: &Path) -> Result<Self, TableError> {
        let path = lock_path(table);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        #[cfg(unix)]
        {
            use nix::fcntl::{Flock, FlockArg};
            let flock = Flock::lock(file, FlockArg::LockExclusive).map_err(|(_, errno)| {
                TableError::Lock {
                    path: path.clone(),
                    detail: errno.desc().to_string(),
                }
            })?;
            debug!("Locked {}", path.display());
            Ok(Self { _flock: flock })
        }

        #[cfg(not(unix))]
        {
            debug!("Advisory locking unavailable; proceeding without {}", path.display());
            Ok(Self { _file: file })
        }
    }
}
