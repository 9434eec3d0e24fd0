use std::sync::atomic::{AtomicU64, Ordering};

use crate::zip::ZipLocator;

static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one open [`ArchiveSource`](crate::ArchiveSource).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SourceId(u64);

impl SourceId {
    pub(crate) fn next() -> Self {
        SourceId(NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Opaque position of an entry inside the source that produced it.
///
/// Only meaningful for that source instance; reopening the same archive
/// yields indices that the previous instance rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryIndex {
    pub(crate) source: SourceId,
    pub(crate) position: u32,
}

impl EntryIndex {
    /// Position in the archive's native index order.
    pub fn position(&self) -> u32 {
        self.position
    }
}

/// Metadata describing one archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMetadata {
    /// Logical path inside the archive
    pub path: String,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    /// CRC-32 for ZIP entries, zero for formats without one
    pub checksum: u32,
    pub is_directory: bool,
    pub index: EntryIndex,
}

impl EntryMetadata {
    /// Regular file with a payload to extract.
    pub fn has_payload(&self) -> bool {
        !self.is_directory && self.uncompressed_size > 0
    }

    /// Percentage of space saved by compression, 0 for empty or expanded entries.
    pub fn compression_ratio(&self) -> u64 {
        if self.uncompressed_size == 0 || self.compressed_size >= self.uncompressed_size {
            return 0;
        }
        100 - (self.compressed_size as u128 * 100 / self.uncompressed_size as u128) as u64
    }
}

/// Where and how an entry's payload is stored.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Storage {
    Zip(ZipLocator),
    Tar { data_offset: u64 },
}

/// Index record kept by the source: public metadata plus its locator.
#[derive(Debug, Clone)]
pub(crate) struct Record {
    pub(crate) meta: EntryMetadata,
    pub(crate) storage: Storage,
}
