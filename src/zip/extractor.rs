use flate2::read::DeflateDecoder;
use std::io::{self, Read};

use crate::error::ExtractionError;
use crate::io::ReadAt;

use super::parser::ZipParser;
use super::structures::{CompressionMethod, FLAG_ENCRYPTED};

/// Location and encoding of one ZIP payload, taken from the central directory.
#[derive(Debug, Clone, Copy)]
pub struct ZipLocator {
    pub lfh_offset: u64,
    pub method: CompressionMethod,
    pub flags: u16,
}

/// Decodes ZIP payloads into memory
pub struct ZipExtractor<'r, R: ReadAt + ?Sized> {
    parser: ZipParser<'r, R>,
}

impl<'r, R: ReadAt + ?Sized> ZipExtractor<'r, R> {
    pub fn new(reader: &'r R) -> Self {
        Self {
            parser: ZipParser::new(reader),
        }
    }

    /// Decode one entry, checking the result against the sizes and CRC-32
    /// declared in the central directory.
    pub fn extract_to_memory(
        &self,
        path: &str,
        locator: &ZipLocator,
        compressed_size: u64,
        uncompressed_size: u64,
        crc32: Option<u32>,
    ) -> Result<Vec<u8>, ExtractionError> {
        if locator.flags & FLAG_ENCRYPTED != 0 {
            tracing::debug!(path, "entry is encrypted");
            return Err(ExtractionError::UnsupportedMethod {
                path: path.to_string(),
                method: locator.method.as_u16(),
            });
        }

        let data_offset = self
            .parser
            .get_data_offset(locator.lfh_offset)
            .map_err(|e| classify(path, e))?;

        match data_offset.checked_add(compressed_size) {
            Some(end) if end <= self.parser.size() => {}
            _ => return Err(ExtractionError::corrupt(path, "payload runs past end of archive")),
        }

        let mut raw = vec![0u8; compressed_size as usize];
        self.parser
            .reader()
            .read_exact_at(data_offset, &mut raw)
            .map_err(|e| classify(path, e))?;

        let data = match locator.method {
            CompressionMethod::Stored => {
                if compressed_size != uncompressed_size {
                    return Err(ExtractionError::corrupt(
                        path,
                        format!(
                            "stored entry has {} bytes, expected {}",
                            compressed_size, uncompressed_size
                        ),
                    ));
                }
                raw
            }
            CompressionMethod::Deflate => inflate(path, &raw, uncompressed_size)?,
            CompressionMethod::Unknown(method) => {
                return Err(ExtractionError::UnsupportedMethod {
                    path: path.to_string(),
                    method,
                });
            }
        };

        if let Some(expected) = crc32 {
            let actual = crc32fast::hash(&data);
            if actual != expected {
                return Err(ExtractionError::corrupt(
                    path,
                    format!("crc32 {:08x} does not match {:08x}", actual, expected),
                ));
            }
        }

        Ok(data)
    }
}

fn inflate(path: &str, raw: &[u8], uncompressed_size: u64) -> Result<Vec<u8>, ExtractionError> {
    // Cap the preallocation; the declared size is untrusted
    let mut out = Vec::with_capacity(uncompressed_size.min(raw.len() as u64 * 4) as usize);
    DeflateDecoder::new(raw)
        .take(uncompressed_size.saturating_add(1))
        .read_to_end(&mut out)
        .map_err(|e| ExtractionError::corrupt(path, format!("deflate stream: {}", e)))?;

    let produced = out.len() as u64;
    if produced > uncompressed_size {
        return Err(ExtractionError::corrupt(
            path,
            format!("inflates past the declared {} bytes", uncompressed_size),
        ));
    }
    if produced < uncompressed_size {
        return Err(ExtractionError::corrupt(
            path,
            format!("inflated {} bytes, expected {}", produced, uncompressed_size),
        ));
    }
    Ok(out)
}

/// Truncation and bad headers mean a damaged archive; anything else is I/O.
fn classify(path: &str, e: io::Error) -> ExtractionError {
    match e.kind() {
        io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidData => {
            ExtractionError::corrupt(path, e.to_string())
        }
        _ => ExtractionError::Io {
            path: path.to_string(),
            source: e,
        },
    }
}
