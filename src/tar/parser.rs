//! Sequential tar index builder.
//!
//! Tar has no central directory: the index is recovered by walking
//! header blocks from the start of the archive, hopping over each
//! payload. Metadata-only records (GNU long names, pax headers) are
//! folded into the entry that follows them.

use crate::error::OpenError;
use crate::io::ReadAt;

use super::header::*;

/// Upper bound for GNU long-name and pax payloads we are willing to buffer.
const MAX_META_PAYLOAD: u64 = 1 << 20;

/// Indexed tar member
#[derive(Debug, Clone)]
pub struct TarEntry {
    pub path: String,
    pub size: u64,
    pub is_directory: bool,
    pub data_offset: u64,
}

pub struct TarParser<'r, R: ReadAt + ?Sized> {
    reader: &'r R,
    size: u64,
}

impl<'r, R: ReadAt + ?Sized> TarParser<'r, R> {
    pub fn new(reader: &'r R) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    fn read_block(&self, offset: u64) -> Result<Option<[u8; BLOCK_SIZE]>, OpenError> {
        if offset
            .checked_add(BLOCK_SIZE as u64)
            .is_none_or(|end| end > self.size)
        {
            return Ok(None);
        }
        let mut block = [0u8; BLOCK_SIZE];
        self.reader.read_exact_at(offset, &mut block)?;
        Ok(Some(block))
    }

    /// Whether the source starts like a tar archive: a valid header, or the
    /// two zero blocks of an empty archive.
    pub fn detect(&self) -> Result<bool, OpenError> {
        let Some(first) = self.read_block(0)? else {
            return Ok(false);
        };
        if looks_like_header(&first) {
            return Ok(true);
        }
        if is_zero_block(&first) && self.size % BLOCK_SIZE as u64 == 0 {
            let second = self.read_block(BLOCK_SIZE as u64)?;
            return Ok(second.is_some_and(|b| is_zero_block(&b)));
        }
        Ok(false)
    }

    /// Walk every header, returning regular files and directories in
    /// archive order. Other member types are left out of the index.
    pub fn list_files(&self) -> Result<Vec<TarEntry>, OpenError> {
        let mut entries = Vec::new();
        let mut offset = 0u64;
        let mut long_name: Option<String> = None;
        let mut pax_path: Option<String> = None;
        let mut pax_size: Option<u64> = None;

        while let Some(block) = self.read_block(offset)? {
            if is_zero_block(&block) {
                break;
            }

            let header = match TarHeader::from_block(&block) {
                Ok(header) => header,
                Err(e) if offset == 0 => return Err(e),
                Err(e) => {
                    tracing::warn!(offset, "stopping tar index at damaged header: {}", e);
                    break;
                }
            };

            let size = match header.typeflag {
                TYPE_PAX_LOCAL | TYPE_PAX_GLOBAL | TYPE_GNU_LONG_NAME => header.size,
                _ => pax_size.take().unwrap_or(header.size),
            };
            let data_offset = offset + BLOCK_SIZE as u64;
            let next = padded_len(size)
                .and_then(|padded| data_offset.checked_add(padded))
                .ok_or_else(|| OpenError::malformed(format!("tar member at {:#x} is too large", offset)))?;

            match header.typeflag {
                TYPE_GNU_LONG_NAME => {
                    let payload = self.read_meta_payload(data_offset, size)?;
                    let end = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
                    long_name = Some(String::from_utf8_lossy(&payload[..end]).to_string());
                }
                TYPE_PAX_LOCAL => {
                    let payload = self.read_meta_payload(data_offset, size)?;
                    let (path, size) = parse_pax(&payload);
                    pax_path = path;
                    pax_size = size;
                }
                TYPE_PAX_GLOBAL => {}
                _ => {
                    let path = pax_path
                        .take()
                        .or_else(|| long_name.take())
                        .unwrap_or(header.name.clone());
                    long_name = None;

                    if header.typeflag == TYPE_DIRECTORY
                        || (header.is_regular() && path.ends_with('/'))
                    {
                        entries.push(TarEntry {
                            path,
                            size: 0,
                            is_directory: true,
                            data_offset,
                        });
                    } else if header.is_regular() {
                        entries.push(TarEntry {
                            path,
                            size,
                            is_directory: false,
                            data_offset,
                        });
                    } else {
                        tracing::debug!(
                            path = %path,
                            typeflag = header.typeflag,
                            "skipping non-file tar member"
                        );
                    }
                }
            }

            offset = next;
        }

        tracing::debug!(entries = entries.len(), "indexed tar archive");
        Ok(entries)
    }

    fn read_meta_payload(&self, offset: u64, size: u64) -> Result<Vec<u8>, OpenError> {
        if size > MAX_META_PAYLOAD || offset.saturating_add(size) > self.size {
            return Err(OpenError::malformed(format!(
                "tar extended header at {:#x} is truncated or oversized",
                offset
            )));
        }
        let mut buf = vec![0u8; size as usize];
        self.reader.read_exact_at(offset, &mut buf)?;
        Ok(buf)
    }
}
