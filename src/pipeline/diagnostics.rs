//! Missing-glyph detection in LuaLaTeX diagnostics.
//!
//! When the primary font has no glyph for a character, LuaLaTeX logs a line
//! such as
//!
//! ```text
//! [WARNING] Missing character: There is no 🚀 (U+1F680) in font [lmroman10-regular]:+tlig;!
//! ```
//!
//! pandoc forwards these on stderr. [`scan`] collects the code points from
//! every such line. Lines that carry the marker but no parsable `U+…` token
//! are dropped silently: the scan never fails.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Substring that marks a missing-glyph diagnostic line.
pub const MISSING_CHARACTER_MARKER: &str = "Missing character:";

static RE_CODE_POINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"U\+([0-9A-Fa-f]+)").expect("code point regex is valid"));

/// A Unicode code point as reported by the engine.
///
/// Displayed as uppercase hex without prefix (`1F680`). Values above
/// `0x10FFFF` are not rejected; they pass through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CodePoint(pub u32);

impl CodePoint {
    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for CodePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0)
    }
}

impl FromStr for CodePoint {
    type Err = std::num::ParseIntError;

    /// Parse a bare hex payload; case and leading zeros are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u32::from_str_radix(s, 16).map(CodePoint)
    }
}

impl From<char> for CodePoint {
    fn from(c: char) -> Self {
        CodePoint(c as u32)
    }
}

impl From<CodePoint> for String {
    fn from(cp: CodePoint) -> Self {
        cp.to_string()
    }
}

impl TryFrom<String> for CodePoint {
    type Error = std::num::ParseIntError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Code points the engine could not render during one attempt.
///
/// Iteration is in ascending order so every consumer produces the same
/// output for the same log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingGlyphSet {
    codes: BTreeSet<CodePoint>,
}

impl MissingGlyphSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the code point was not already present.
    pub fn insert(&mut self, code: CodePoint) -> bool {
        self.codes.insert(code)
    }

    pub fn contains(&self, code: CodePoint) -> bool {
        self.codes.contains(&code)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = CodePoint> + '_ {
        self.codes.iter().copied()
    }
}

impl FromIterator<CodePoint> for MissingGlyphSet {
    fn from_iter<I: IntoIterator<Item = CodePoint>>(iter: I) -> Self {
        Self {
            codes: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a MissingGlyphSet {
    type Item = CodePoint;
    type IntoIter = std::iter::Copied<std::collections::btree_set::Iter<'a, CodePoint>>;

    fn into_iter(self) -> Self::IntoIter {
        self.codes.iter().copied()
    }
}

impl fmt::Display for MissingGlyphSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, code) in self.codes.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "U+{code}")?;
        }
        Ok(())
    }
}

/// Returns `true` if the line is a missing-glyph diagnostic.
pub fn is_missing_glyph_line(line: &str) -> bool {
    line.contains(MISSING_CHARACTER_MARKER)
}

/// Extract every missing code point reported in `diagnostics`.
pub fn scan(diagnostics: &str) -> MissingGlyphSet {
    diagnostics
        .lines()
        .filter(|line| is_missing_glyph_line(line))
        .filter_map(|line| RE_CODE_POINT.captures(line))
        // Tokens too wide for u32 are malformed; skip them.
        .filter_map(|caps| caps[1].parse::<CodePoint>().ok())
        .collect()
}

/// Read a saved diagnostic log and [`scan`] it.
///
/// Invalid UTF-8 is replaced rather than rejected; only I/O errors fail.
pub fn scan_file(path: &Path) -> std::io::Result<MissingGlyphSet> {
    let bytes = std::fs::read(path)?;
    Ok(scan(&String::from_utf8_lossy(&bytes)))
}
