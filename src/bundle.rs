//! Whole-archive loading.
//!
//! A [`ResourceBundle`] is what an installer asks for: every regular file
//! of an archive, extracted into memory and keyed by its archive path.
//! Loading is partial-failure tolerant; one damaged entry is logged and
//! left out, but a bundle with nothing in it is always an error.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use crate::cursor::EntryCursor;
use crate::error::{ExtractionError, LoadError, OpenError};
use crate::extractor::Extractor;
use crate::source::ArchiveSource;

/// What [`ResourceBundle::load_path`] does when opening the file directly fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Always retry by reading the whole file into memory.
    #[default]
    Always,
    /// Retry, except when the file is missing or unreadable for permissions.
    SkipNotFound,
    /// Report the direct open failure as is.
    Never,
}

/// Knobs for bundle loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    pub fallback: FallbackPolicy,
    pub verify_checksums: bool,
    /// Entries declaring more uncompressed bytes are skipped
    pub max_entry_size: Option<u64>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            fallback: FallbackPolicy::default(),
            verify_checksums: true,
            max_entry_size: None,
        }
    }
}

/// Extracted archive contents, keyed by entry path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceBundle {
    data: BTreeMap<String, Vec<u8>>,
}

impl ResourceBundle {
    pub fn load(source: &ArchiveSource<'_>) -> Result<Self, ExtractionError> {
        Self::load_with(source, &LoadOptions::default())
    }

    /// Extract every regular file with a payload. Entries that fail to
    /// extract are skipped; later duplicates of a path replace earlier ones.
    pub fn load_with(
        source: &ArchiveSource<'_>,
        options: &LoadOptions,
    ) -> Result<Self, ExtractionError> {
        let extractor = Extractor::new(source)
            .verify_checksums(options.verify_checksums)
            .max_entry_size(options.max_entry_size);

        let mut data = BTreeMap::new();
        let mut skipped = 0usize;
        let mut cursor = EntryCursor::begin(source);

        while let Some(entry) = cursor.current(source) {
            cursor = cursor.advance(source);

            if !entry.has_payload() {
                tracing::debug!(path = %entry.path, "skipping empty entry");
                continue;
            }

            match extractor.extract(&entry) {
                Ok(bytes) => {
                    if data.insert(entry.path.clone(), bytes).is_some() {
                        tracing::debug!(path = %entry.path, "duplicate path replaced");
                    }
                }
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(path = %entry.path, "skipping entry: {}", e);
                }
            }
        }

        if data.is_empty() {
            return Err(ExtractionError::EmptyResult);
        }

        tracing::info!(
            entries = data.len(),
            skipped,
            kind = ?source.format(),
            "loaded resource bundle"
        );
        Ok(Self { data })
    }

    pub fn load_buffer(bytes: &[u8]) -> Result<Self, LoadError> {
        Self::load_buffer_with(bytes, &LoadOptions::default())
    }

    pub fn load_buffer_with(bytes: &[u8], options: &LoadOptions) -> Result<Self, LoadError> {
        let source = ArchiveSource::open_from_buffer(bytes)?;
        Ok(Self::load_with(&source, options)?)
    }

    pub fn load_path(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        Self::load_path_with(path, &LoadOptions::default())
    }

    /// Open the file directly and, if that fails, fall back to reading it
    /// whole and treating it as a buffer, as allowed by `options.fallback`.
    pub fn load_path_with(path: impl AsRef<Path>, options: &LoadOptions) -> Result<Self, LoadError> {
        let source = open_path(path.as_ref(), options.fallback)?;
        Ok(Self::load_with(&source, options)?)
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.data.get(path).map(Vec::as_slice)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.data.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Sum of all payload sizes.
    pub fn total_size(&self) -> u64 {
        self.data.values().map(|v| v.len() as u64).sum()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.data.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn into_inner(self) -> BTreeMap<String, Vec<u8>> {
        self.data
    }
}

impl IntoIterator for ResourceBundle {
    type Item = (String, Vec<u8>);
    type IntoIter = std::collections::btree_map::IntoIter<String, Vec<u8>>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.into_iter()
    }
}

/// Open `path` as a file-backed source, retrying through a whole-file
/// read when `policy` allows it.
pub fn open_path(path: &Path, policy: FallbackPolicy) -> Result<ArchiveSource<'static>, OpenError> {
    let err = match ArchiveSource::open_file_backed(path) {
        Ok(source) => return Ok(source),
        Err(e) => e,
    };

    if !should_retry(&err, policy) {
        return Err(err);
    }

    tracing::warn!(
        path = %path.display(),
        "direct open failed ({}), retrying from memory",
        err
    );
    ArchiveSource::open_from_file(path)
}

fn should_retry(err: &OpenError, policy: FallbackPolicy) -> bool {
    match (err, policy) {
        // An index that parsed but is empty will not improve from memory
        (OpenError::Empty, _) => false,
        (_, FallbackPolicy::Always) => true,
        (_, FallbackPolicy::Never) => false,
        (OpenError::Io(e), FallbackPolicy::SkipNotFound) => !matches!(
            e.kind(),
            io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
        ),
        (_, FallbackPolicy::SkipNotFound) => true,
    }
}
