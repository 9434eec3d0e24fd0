//! Opened archives.
//!
//! An [`ArchiveSource`] pairs one backing store with the decoded index of
//! the container it holds. The index is read once at open time and never
//! changes; every later lookup and extraction reads through the same
//! backing.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::Path;

use crate::entry::{EntryIndex, EntryMetadata, Record, SourceId, Storage};
use crate::error::OpenError;
use crate::io::{LocalFileReader, ReadAt};
use crate::tar::TarParser;
use crate::zip::{ZipLocator, ZipParser};

/// Bytes behind an archive.
///
/// A borrowed backing ties the source to the caller's buffer through `'a`;
/// owned and file backings make a `'static` source.
pub enum Backing<'a> {
    Borrowed(&'a [u8]),
    Owned(Vec<u8>),
    File(LocalFileReader),
}

impl ReadAt for Backing<'_> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Backing::Borrowed(bytes) => bytes.read_at(offset, buf),
            Backing::Owned(bytes) => bytes.as_slice().read_at(offset, buf),
            Backing::File(file) => file.read_at(offset, buf),
        }
    }

    fn size(&self) -> u64 {
        match self {
            Backing::Borrowed(bytes) => bytes.size(),
            Backing::Owned(bytes) => bytes.as_slice().size(),
            Backing::File(file) => file.size(),
        }
    }
}

impl fmt::Debug for Backing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Backing::Borrowed(_) => "Borrowed",
            Backing::Owned(_) => "Owned",
            Backing::File(_) => "File",
        };
        write!(f, "{}({} bytes)", kind, self.size())
    }
}

/// Container layout detected at open time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// Central-directory indexed
    Zip,
    /// Sequential-header indexed
    Tar,
}

/// A read-only archive with its decoded index.
pub struct ArchiveSource<'a> {
    id: SourceId,
    backing: Backing<'a>,
    format: ArchiveFormat,
    records: Vec<Record>,
    by_path: HashMap<String, u32>,
}

impl<'a> ArchiveSource<'a> {
    /// Parse the index directly over a borrowed buffer, without copying it.
    pub fn open_from_buffer(bytes: &'a [u8]) -> Result<Self, OpenError> {
        Self::open(Backing::Borrowed(bytes))
    }

    /// Detect the container format and decode its index.
    pub fn open(backing: Backing<'a>) -> Result<Self, OpenError> {
        let format = detect_format(&backing)?;
        let id = SourceId::next();

        let records: Vec<Record> = match format {
            ArchiveFormat::Zip => ZipParser::new(&backing)
                .list_files()?
                .into_iter()
                .enumerate()
                .map(|(i, e)| Record {
                    meta: EntryMetadata {
                        path: e.file_name,
                        compressed_size: e.compressed_size,
                        uncompressed_size: e.uncompressed_size,
                        checksum: e.crc32,
                        is_directory: e.is_directory,
                        index: EntryIndex {
                            source: id,
                            position: i as u32,
                        },
                    },
                    storage: Storage::Zip(ZipLocator {
                        lfh_offset: e.lfh_offset,
                        method: e.compression_method,
                        flags: e.flags,
                    }),
                })
                .collect(),
            ArchiveFormat::Tar => TarParser::new(&backing)
                .list_files()?
                .into_iter()
                .enumerate()
                .map(|(i, e)| Record {
                    meta: EntryMetadata {
                        path: e.path,
                        compressed_size: e.size,
                        uncompressed_size: e.size,
                        checksum: 0,
                        is_directory: e.is_directory,
                        index: EntryIndex {
                            source: id,
                            position: i as u32,
                        },
                    },
                    storage: Storage::Tar {
                        data_offset: e.data_offset,
                    },
                })
                .collect(),
        };

        if records.is_empty() {
            return Err(OpenError::Empty);
        }
        if u32::try_from(records.len()).is_err() {
            return Err(OpenError::malformed("too many entries"));
        }

        // Later duplicates shadow earlier ones, matching bundle assembly
        let by_path = records
            .iter()
            .map(|r| (r.meta.path.clone(), r.meta.index.position))
            .collect();

        for record in &records {
            let meta = &record.meta;
            tracing::info!(
                position = meta.index.position,
                path = %meta.path,
                compressed = meta.compressed_size,
                uncompressed = meta.uncompressed_size,
                directory = meta.is_directory,
                "indexed entry"
            );
        }

        tracing::debug!(
            kind = ?format,
            entries = records.len(),
            backing = ?backing,
            "opened archive"
        );

        Ok(Self {
            id,
            backing,
            format,
            records,
            by_path,
        })
    }

    /// Number of entries, directories included. Fixed at open time.
    pub fn entry_count(&self) -> u32 {
        self.records.len() as u32
    }

    pub fn entry_at(&self, index: u32) -> Option<EntryMetadata> {
        self.records.get(index as usize).map(|r| r.meta.clone())
    }

    /// Exact-match lookup by archive path.
    pub fn find_entry(&self, path: &str) -> Option<EntryMetadata> {
        self.by_path.get(path).and_then(|&i| self.entry_at(i))
    }

    /// All entries in native index order.
    pub fn entries(&self) -> impl Iterator<Item = &EntryMetadata> {
        self.records.iter().map(|r| &r.meta)
    }

    pub fn format(&self) -> ArchiveFormat {
        self.format
    }

    /// Size in bytes of the underlying container.
    pub fn archive_size(&self) -> u64 {
        self.backing.size()
    }

    pub fn is_file_backed(&self) -> bool {
        matches!(self.backing, Backing::File(_))
    }

    pub(crate) fn meta(&self, index: u32) -> Option<&EntryMetadata> {
        self.records.get(index as usize).map(|r| &r.meta)
    }

    /// Resolve an index handed back by a caller, rejecting indices minted
    /// by another source.
    pub(crate) fn record(&self, index: &EntryIndex) -> Option<&Record> {
        if index.source != self.id {
            return None;
        }
        self.records.get(index.position as usize)
    }

    pub(crate) fn backing(&self) -> &Backing<'a> {
        &self.backing
    }
}

impl ArchiveSource<'static> {
    /// Take ownership of an in-memory archive.
    pub fn from_vec(bytes: Vec<u8>) -> Result<Self, OpenError> {
        Self::open(Backing::Owned(bytes))
    }

    /// Read the whole file into memory, then open it as a buffer.
    pub fn open_from_file(path: impl AsRef<Path>) -> Result<Self, OpenError> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_vec(bytes)
    }

    /// Keep the file open and read index and payloads positionally.
    pub fn open_file_backed(path: impl AsRef<Path>) -> Result<Self, OpenError> {
        let reader = LocalFileReader::new(path.as_ref())?;
        Self::open(Backing::File(reader))
    }
}

impl fmt::Debug for ArchiveSource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveSource")
            .field("format", &self.format)
            .field("backing", &self.backing)
            .field("entries", &self.records.len())
            .finish()
    }
}

fn detect_format<R: ReadAt + ?Sized>(reader: &R) -> Result<ArchiveFormat, OpenError> {
    if TarParser::new(reader).detect()? {
        return Ok(ArchiveFormat::Tar);
    }
    match ZipParser::new(reader).find_eocd() {
        Ok(_) => Ok(ArchiveFormat::Zip),
        Err(OpenError::Malformed(reason)) => {
            tracing::debug!("not a ZIP archive: {}", reason);
            Err(OpenError::malformed(
                "no ZIP central directory or tar header found",
            ))
        }
        Err(e) => Err(e),
    }
}
