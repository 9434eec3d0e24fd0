use crate::entry::{EntryMetadata, Storage};
use crate::error::ExtractionError;
use crate::io::ReadAt;
use crate::source::ArchiveSource;
use crate::zip::ZipExtractor;

/// Copies or decompresses entry payloads into owned buffers.
///
/// Extraction only reads from the source, so the same entry can be
/// extracted any number of times with identical results.
#[derive(Debug, Clone, Copy)]
pub struct Extractor<'s, 'a> {
    source: &'s ArchiveSource<'a>,
    verify_checksums: bool,
    max_entry_size: Option<u64>,
}

impl<'s, 'a> Extractor<'s, 'a> {
    pub fn new(source: &'s ArchiveSource<'a>) -> Self {
        Self {
            source,
            verify_checksums: true,
            max_entry_size: None,
        }
    }

    /// Compare CRC-32 after decoding when the format stores one.
    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    /// Refuse entries declaring more than `limit` uncompressed bytes.
    pub fn max_entry_size(mut self, limit: Option<u64>) -> Self {
        self.max_entry_size = limit;
        self
    }

    pub fn extract(&self, entry: &EntryMetadata) -> Result<Vec<u8>, ExtractionError> {
        let record = self
            .source
            .record(&entry.index)
            .filter(|r| r.meta.path == entry.path)
            .ok_or_else(|| ExtractionError::NotFound(entry.path.clone()))?;
        let meta = &record.meta;

        if meta.is_directory || meta.uncompressed_size == 0 {
            return Ok(Vec::new());
        }

        if let Some(limit) = self.max_entry_size {
            if meta.uncompressed_size > limit {
                return Err(ExtractionError::TooLarge {
                    path: meta.path.clone(),
                    size: meta.uncompressed_size,
                    limit,
                });
            }
        }

        tracing::debug!(
            path = %meta.path,
            compressed = meta.compressed_size,
            uncompressed = meta.uncompressed_size,
            "extracting entry"
        );

        let backing = self.source.backing();
        match &record.storage {
            Storage::Zip(locator) => ZipExtractor::new(backing).extract_to_memory(
                &meta.path,
                locator,
                meta.compressed_size,
                meta.uncompressed_size,
                self.verify_checksums.then_some(meta.checksum),
            ),
            Storage::Tar { data_offset } => {
                match data_offset.checked_add(meta.uncompressed_size) {
                    Some(end) if end <= backing.size() => {}
                    _ => {
                        return Err(ExtractionError::corrupt(
                            &meta.path,
                            "payload runs past end of archive",
                        ));
                    }
                }
                let mut buf = vec![0u8; meta.uncompressed_size as usize];
                backing
                    .read_exact_at(*data_offset, &mut buf)
                    .map_err(|e| ExtractionError::Io {
                        path: meta.path.clone(),
                        source: e,
                    })?;
                Ok(buf)
            }
        }
    }
}
