use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthStr;

pub type MarkerId = u64;

pub const TAG_SEPARATOR: char = ',';
pub const DEFAULT_TRUNCATED_PATH_WIDTH: usize = 80;
pub const MAX_GLYPH_WIDTH: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    Definition,
    Path,
    Symbol,
}

impl QueryType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Definition => "definition",
            Self::Path => "path",
            Self::Symbol => "symbol",
        }
    }

    /// Query-string key understood by the search REST API.
    pub fn api_key(self) -> &'static str {
        match self {
            Self::Definition => "def",
            Self::Path => "path",
            Self::Symbol => "symbol",
        }
    }
}

impl std::str::FromStr for QueryType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "g" | "d" | "def" | "definition" => Ok(Self::Definition),
            "f" | "file" | "path" => Ok(Self::Path),
            "s" | "sym" | "symbol" => Ok(Self::Symbol),
            other => Err(format!(
                "invalid query type '{other}', expected one of: def, file, sym"
            )),
        }
    }
}

/// One line match returned by the search backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub path: String,
    pub content: String,
    pub line_number: usize,
}

impl Location {
    pub fn truncated_path(&self, size: usize) -> String {
        let len = self.path.chars().count();
        if len < size {
            return self.path.clone();
        }
        if size < 10 {
            return self.path.chars().take(size).collect();
        }

        let head: String = self.path.chars().take(5).collect();
        let tail: String = self.path.chars().skip(len - (size - 5 - 2)).collect();
        format!("{head}..{tail}")
    }

    pub fn truncated_display(&self) -> String {
        format!(
            "{}:{}\n  {}",
            self.truncated_path(DEFAULT_TRUNCATED_PATH_WIDTH),
            self.line_number,
            self.content.trim()
        )
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}\n  {}",
            self.path,
            self.line_number,
            self.content.trim()
        )
    }
}

/// Opaque handle for an editor window, supplied by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewportId(pub u64);

impl fmt::Display for ViewportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "viewport {}", self.0)
    }
}

impl From<u64> for ViewportId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavEntry {
    pub path: String,
    pub line: usize,
    pub column: usize,
}

impl NavEntry {
    pub fn new(path: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            path: path.into(),
            line,
            column,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub file: String,
    pub line: usize,
    pub note: String,
    pub tags: Vec<String>,
}

impl Annotation {
    pub fn is_empty(&self) -> bool {
        is_empty_annotation(&self.note, &self.tags)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagStyle {
    pub tag: String,
    pub glyph: String,
    pub highlight: String,
}

/// Marker glyphs occupy one or two display cells.
pub fn is_valid_glyph(glyph: &str) -> bool {
    (1..=MAX_GLYPH_WIDTH).contains(&glyph.width()) && !glyph.chars().any(char::is_whitespace)
}

pub fn is_empty_annotation(note: &str, tags: &[String]) -> bool {
    note.is_empty() && tags.is_empty()
}

pub fn normalize_path(path: &str) -> String {
    let path = path.strip_prefix(r"\\?\").unwrap_or(path);
    path.replace('\\', "/")
}

/// Lowercases, trims and de-duplicates tags, keeping first-occurrence order.
///
/// A value holding several comma-joined tags contributes each of them.
pub fn normalize_tags<I, T>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut tags = Vec::new();
    for value in values {
        for part in value.as_ref().split(TAG_SEPARATOR) {
            let normalized = part.trim().to_lowercase();
            if normalized.is_empty() {
                continue;
            }
            if seen.insert(normalized.clone()) {
                tags.push(normalized);
            }
        }
    }
    tags
}

pub fn join_tags(tags: &[String]) -> String {
    tags.join(&TAG_SEPARATOR.to_string())
}

pub fn parse_tags(raw: &str) -> Vec<String> {
    normalize_tags([raw])
}
