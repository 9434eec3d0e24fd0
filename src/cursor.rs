//! Forward-only enumeration of regular-file entries.
//!
//! [`EntryCursor`] is a plain `Copy` value: it never borrows the source,
//! and every step takes the source explicitly and returns the next state.
//! Directory entries are skipped; the scan never goes past the entry
//! count fixed when the source was opened.

use crate::entry::EntryMetadata;
use crate::source::ArchiveSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryCursor {
    position: u32,
    exhausted: bool,
}

impl EntryCursor {
    /// Position at the first regular-file entry, or return an exhausted
    /// cursor if there is none.
    pub fn begin(source: &ArchiveSource<'_>) -> Self {
        Self::seek_file(source, 0)
    }

    pub fn has_next(&self) -> bool {
        !self.exhausted
    }

    /// Entry under the cursor; `None` once exhausted.
    pub fn current(&self, source: &ArchiveSource<'_>) -> Option<EntryMetadata> {
        if self.exhausted {
            return None;
        }
        source.entry_at(self.position)
    }

    /// Move to the next regular-file entry. Exhaustion is terminal.
    #[must_use]
    pub fn advance(self, source: &ArchiveSource<'_>) -> Self {
        if self.exhausted {
            return self;
        }
        Self::seek_file(source, self.position.saturating_add(1))
    }

    /// Index position of the entry under the cursor.
    pub fn position(&self) -> Option<u32> {
        (!self.exhausted).then_some(self.position)
    }

    fn seek_file(source: &ArchiveSource<'_>, from: u32) -> Self {
        let count = source.entry_count();
        let found = (from..count).find(|&i| source.meta(i).is_some_and(|m| !m.is_directory));
        match found {
            Some(position) => Self {
                position,
                exhausted: false,
            },
            None => Self {
                position: count,
                exhausted: true,
            },
        }
    }
}

/// Iterator over regular-file entries, driven by an [`EntryCursor`].
pub struct Files<'s, 'a> {
    source: &'s ArchiveSource<'a>,
    cursor: EntryCursor,
}

impl<'s, 'a> Files<'s, 'a> {
    pub fn new(source: &'s ArchiveSource<'a>) -> Self {
        Self {
            source,
            cursor: EntryCursor::begin(source),
        }
    }
}

impl Iterator for Files<'_, '_> {
    type Item = EntryMetadata;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.cursor.current(self.source)?;
        self.cursor = self.cursor.advance(self.source);
        Some(entry)
    }
}

impl<'a> ArchiveSource<'a> {
    /// Regular-file entries in native index order.
    pub fn files(&self) -> Files<'_, 'a> {
        Files::new(self)
    }
}
