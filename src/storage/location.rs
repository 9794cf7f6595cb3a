//! Cache locations
//!
//! A location is an ordered list of path segments naming one entity's cache
//! directory, e.g. `providers / <provider> / <title> / <qualification> / <year>`.
//! Segments are sanitized when the location is built, so two locations built
//! from the same names always map to the same directory.

use std::fmt;
use std::path::PathBuf;

/// Replaces path-breaking characters in one segment
///
/// - `\` is removed
/// - `/` becomes ` & `
/// - NUL is removed
/// - a segment that is empty, `.` or `..` afterwards becomes `_`, `_` or `__`
///
/// Distinct names that differ only in these characters collide: `A/B` and
/// `A & B` share a directory, as do `A\B` and `AB`. Catalogue names are
/// trusted not to rely on that difference.
pub fn sanitize_segment(segment: &str) -> String {
    let cleaned: String = segment
        .replace('\\', "")
        .replace('/', " & ")
        .replace('\0', "");

    match cleaned.as_str() {
        "" | "." => "_".to_string(),
        ".." => "__".to_string(),
        _ => cleaned,
    }
}

/// Sanitized, ordered key of a cache directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheLocation {
    segments: Vec<String>,
}

impl CacheLocation {
    /// The cache root itself
    pub fn root() -> Self {
        Self::default()
    }

    /// Builds a location, sanitizing every segment
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            segments: segments
                .into_iter()
                .map(|segment| sanitize_segment(segment.as_ref()))
                .collect(),
        }
    }

    /// Returns this location extended by one segment
    pub fn child(&self, segment: impl AsRef<str>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(sanitize_segment(segment.as_ref()));
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Path of this location relative to a cache root
    pub fn relative_path(&self) -> PathBuf {
        self.segments.iter().collect()
    }
}

impl fmt::Display for CacheLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            write!(f, "<root>")
        } else {
            write!(f, "{}", self.segments.join(" / "))
        }
    }
}
