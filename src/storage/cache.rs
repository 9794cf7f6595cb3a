//! File-system cache of fetched documents
//!
//! The store is an ordered list of cache roots. The first root is the current
//! cache: every write lands there and every read starts there. The remaining
//! roots are caches left behind by earlier versions of the harvester; a read
//! that misses the current root may consult them in order, without copying
//! anything forward.
//!
//! Reads and writes never raise. A missing document is `None` (or an empty
//! list), and an I/O or decode failure is logged and treated the same way.

use crate::config::CacheConfig;
use crate::storage::{CacheLocation, Document, DocumentKind, StorageError, StorageResult};
use crate::Record;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind};
use std::path::{Path, PathBuf};

/// Depth of an entity directory below the `providers` location:
/// provider / title / qualification / year
pub const ENTITY_DEPTH: usize = 4;

/// Result of looking a structured document up in one root
enum Lookup {
    Found(Record),
    Missing,
    Unreadable,
}

/// Hierarchical document cache with prior-version fallback
#[derive(Debug, Clone)]
pub struct CacheStore {
    roots: Vec<PathBuf>,
}

impl CacheStore {
    /// Creates a store with only a current root
    pub fn new(current: impl Into<PathBuf>) -> Self {
        Self {
            roots: vec![current.into()],
        }
    }

    /// Appends a prior-version root consulted after all earlier ones
    pub fn with_fallback(mut self, root: impl Into<PathBuf>) -> Self {
        self.roots.push(root.into());
        self
    }

    /// Builds the store described by configuration
    pub fn from_config(config: &CacheConfig) -> Self {
        config
            .fallback_roots()
            .into_iter()
            .fold(Self::new(config.current_root()), Self::with_fallback)
    }

    /// All roots, current first
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn current_root(&self) -> &Path {
        &self.roots[0]
    }

    /// Path of a document in the current root
    pub fn document_path(&self, location: &CacheLocation, name: &str, kind: DocumentKind) -> PathBuf {
        document_path(self.current_root(), location, name, kind)
    }

    /// Writes a document, reporting rather than raising failures
    ///
    /// Returns `true` when the document was written.
    pub fn write(&self, location: &CacheLocation, name: &str, content: impl Into<Document>) -> bool {
        match self.try_write(location, name, content) {
            Ok(path) => {
                tracing::debug!(path = %path.display(), "Cached document");
                true
            }
            Err(e) => {
                tracing::error!(%location, name, "Error writing cached document: {}", e);
                false
            }
        }
    }

    /// Writes a document, creating the location's directories as needed
    ///
    /// The serialization follows the content's shape; an existing document of
    /// the same name and kind is overwritten.
    pub fn try_write(
        &self,
        location: &CacheLocation,
        name: &str,
        content: impl Into<Document>,
    ) -> Result<PathBuf, StorageError> {
        let document = content.into();
        let path = self.document_path(location, name, document.kind());

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, document.encode()?)?;

        Ok(path)
    }

    /// Reads a structured document
    ///
    /// Looks in the current root first. When the document is absent there and
    /// `allow_fallback` is set, each prior-version root is tried in order and
    /// the first hit is returned. A document that exists but does not decode
    /// is a failed read: it is logged, returns `None`, and does not fall back.
    pub fn read(&self, location: &CacheLocation, name: &str, allow_fallback: bool) -> Option<Record> {
        let roots = if allow_fallback {
            &self.roots[..]
        } else {
            &self.roots[..1]
        };

        for (index, root) in roots.iter().enumerate() {
            match lookup_record(root, location, name) {
                Lookup::Found(record) => {
                    tracing::debug!(
                        %location,
                        name,
                        root = %root.display(),
                        fallback = index > 0,
                        "Loaded local copy"
                    );
                    return Some(record);
                }
                Lookup::Missing => continue,
                Lookup::Unreadable => return None,
            }
        }

        None
    }

    /// Whether the current root holds a structured document of this name
    pub fn contains(&self, location: &CacheLocation, name: &str) -> bool {
        self.document_path(location, name, DocumentKind::Record)
            .is_file()
    }

    /// Reads a markup document from the current root
    pub fn read_markup(&self, location: &CacheLocation, name: &str) -> Option<String> {
        let path = self.document_path(location, name, DocumentKind::Markup);
        read_text(&path)
    }

    /// Reads a line-list document from the current root; absent means empty
    pub fn read_lines(&self, location: &CacheLocation, name: &str) -> Vec<String> {
        let path = self.document_path(location, name, DocumentKind::Lines);
        read_text(&path)
            .map(|text| text.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Writes a CSV export `<name>.csv` at the current root
    ///
    /// Rows shorter than the header are padded with empty fields.
    pub fn write_csv<H, R>(&self, name: &str, headers: &[H], rows: R) -> StorageResult<PathBuf>
    where
        H: AsRef<str>,
        R: IntoIterator<Item = Vec<String>>,
    {
        let path = self.current_root().join(format!("{}.csv", name));
        fs::create_dir_all(self.current_root())?;

        let mut writer = csv::Writer::from_writer(BufWriter::new(File::create(&path)?));
        writer.write_record(headers.iter().map(|h| h.as_ref()))?;

        let mut written = 0usize;
        for mut row in rows {
            if row.len() < headers.len() {
                row.resize(headers.len(), String::new());
            }
            writer.write_record(&row)?;
            written += 1;
        }
        writer.flush()?;

        tracing::info!(path = %path.display(), rows = written, "Wrote CSV export");
        Ok(path)
    }

    /// Lists every entity directory exactly [`ENTITY_DEPTH`] levels below `location`
    ///
    /// Only the current root is walked. Each entry is the full location
    /// (`location` followed by the four relative segments), sorted by name at
    /// every level. Unreadable directories are logged and skipped.
    pub fn list_entities(&self, location: &CacheLocation) -> Vec<CacheLocation> {
        let start = self.current_root().join(location.relative_path());
        let mut found = Vec::new();

        tracing::debug!(path = %start.display(), "Checking for cached entities");
        collect_directories(&start, location.clone(), ENTITY_DEPTH, &mut found);

        found
    }
}

fn document_path(root: &Path, location: &CacheLocation, name: &str, kind: DocumentKind) -> PathBuf {
    root.join(location.relative_path())
        .join(format!("{}.{}", name, kind.extension()))
}

fn lookup_record(root: &Path, location: &CacheLocation, name: &str) -> Lookup {
    let path = document_path(root, location, name, DocumentKind::Record);

    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Lookup::Missing,
        Err(e) => {
            tracing::error!(path = %path.display(), "Error reading cached document: {}", e);
            return Lookup::Unreadable;
        }
    };

    match serde_json::from_slice::<serde_json::Value>(&bytes) {
        Ok(serde_json::Value::Object(record)) => Lookup::Found(record),
        Ok(_) => {
            tracing::error!(path = %path.display(), "Cached document is not a JSON object");
            Lookup::Unreadable
        }
        Err(e) => {
            tracing::error!(path = %path.display(), "Error decoding JSON from cache: {}", e);
            Lookup::Unreadable
        }
    }
}

fn read_text(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => {
            tracing::error!(path = %path.display(), "Error reading cached document: {}", e);
            None
        }
    }
}

fn collect_directories(
    dir: &Path,
    location: CacheLocation,
    remaining: usize,
    found: &mut Vec<CacheLocation>,
) {
    if remaining == 0 {
        found.push(location);
        return;
    }

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return,
        Err(e) => {
            tracing::warn!(path = %dir.display(), "Skipping unreadable cache directory: {}", e);
            return;
        }
    };

    let mut children: Vec<(String, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .map(|entry| (entry.file_name().to_string_lossy().into_owned(), entry.path()))
        .collect();
    children.sort();

    for (name, path) in children {
        collect_directories(&path, location.child(&name), remaining - 1, found);
    }
}
