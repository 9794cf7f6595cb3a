//! Cached document shapes and their on-disk encodings

use super::error::{StorageError, StorageResult};
use crate::Record;
use serde::Serialize;

/// Kind of a cached document, selecting its file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// JSON object, `<name>.json`
    Record,
    /// Raw markup, `<name>.html`
    Markup,
    /// One entry per line, `<name>.txt`
    Lines,
}

impl DocumentKind {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Record => "json",
            Self::Markup => "html",
            Self::Lines => "txt",
        }
    }
}

/// Content written to the cache
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Record(Record),
    Markup(String),
    Lines(Vec<String>),
}

impl Document {
    pub fn kind(&self) -> DocumentKind {
        match self {
            Self::Record(_) => DocumentKind::Record,
            Self::Markup(_) => DocumentKind::Markup,
            Self::Lines(_) => DocumentKind::Lines,
        }
    }

    /// Serializes to the canonical on-disk form
    ///
    /// Records are pretty-printed with four-space indentation, line lists get
    /// one trailing newline per entry. A trailing line break on an entry is
    /// dropped; an entry with a line break inside it cannot be read back as
    /// one line and is rejected with [`StorageError::MultilineEntry`].
    pub fn encode(&self) -> StorageResult<Vec<u8>> {
        match self {
            Self::Record(record) => {
                let mut buffer = Vec::new();
                let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
                let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
                record.serialize(&mut serializer)?;
                Ok(buffer)
            }
            Self::Markup(markup) => Ok(markup.as_bytes().to_vec()),
            Self::Lines(lines) => {
                let mut text = String::new();
                for line in lines {
                    let entry = line.trim_end_matches(|c: char| c == '\r' || c == '\n');
                    if entry.contains(|c: char| c == '\r' || c == '\n') {
                        return Err(StorageError::MultilineEntry {
                            entry: entry.to_string(),
                        });
                    }
                    text.push_str(entry);
                    text.push('\n');
                }
                Ok(text.into_bytes())
            }
        }
    }
}

impl From<Record> for Document {
    fn from(record: Record) -> Self {
        Self::Record(record)
    }
}

impl From<String> for Document {
    fn from(markup: String) -> Self {
        Self::Markup(markup)
    }
}

impl From<&str> for Document {
    fn from(markup: &str) -> Self {
        Self::Markup(markup.to_string())
    }
}

impl From<Vec<String>> for Document {
    fn from(lines: Vec<String>) -> Self {
        Self::Lines(lines)
    }
}
