//! Low-level ZIP archive parser.
//!
//! This module handles the binary parsing of ZIP file structures,
//! reading from any source that implements the [`ReadAt`] trait.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. If ZIP64, read the ZIP64 EOCD for large file support
//! 3. Read the Central Directory to get metadata for all files
//! 4. For extraction, read each file's Local File Header and data
//!
//! Every offset taken from the archive is checked against the source
//! size before it is read, so truncated or lying archives are reported
//! as malformed instead of being read past their end.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Cursor, Read};

use crate::error::OpenError;
use crate::io::ReadAt;

use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: u64 = 65535;

/// Low-level ZIP file parser.
///
/// Borrows the data source for the duration of one parse or one
/// extraction; it holds no state beyond the source size.
pub struct ZipParser<'r, R: ReadAt + ?Sized> {
    /// The underlying data source
    reader: &'r R,
    /// Total size of the archive in bytes
    size: u64,
}

impl<'r, R: ReadAt + ?Sized> ZipParser<'r, R> {
    pub fn new(reader: &'r R) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Read `len` bytes at `offset`, treating regions past the end of
    /// the source as a malformed archive rather than an I/O failure.
    fn read_region(&self, offset: u64, len: u64, what: &str) -> Result<Vec<u8>, OpenError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.size => {}
            _ => {
                return Err(OpenError::malformed(format!(
                    "{} at {:#x}+{} lies outside the archive ({} bytes)",
                    what, offset, len, self.size
                )));
            }
        }
        let mut buf = vec![0u8; len as usize];
        self.reader.read_exact_at(offset, &mut buf)?;
        Ok(buf)
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// The EOCD is located at the end of the ZIP file. This method
    /// handles both the simple case (no comment) and archives with
    /// comments by searching backwards for the signature.
    ///
    /// Returns the record and its offset in the file.
    pub fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64), OpenError> {
        let eocd_size = EndOfCentralDirectory::SIZE as u64;
        if self.size < eocd_size {
            return Err(OpenError::malformed("too short to hold a ZIP central directory"));
        }

        // Common case first: no archive comment
        let offset = self.size - eocd_size;
        let buf = self.read_region(offset, eocd_size, "end of central directory")?;
        if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && &buf[20..22] == b"\x00\x00" {
            let eocd = EndOfCentralDirectory::from_bytes(&buf)?;
            return Ok((eocd, offset));
        }

        let search_size = (MAX_COMMENT_SIZE + eocd_size).min(self.size);
        let search_start = self.size - search_size;
        let buf = self.read_region(search_start, search_size, "archive tail")?;

        // Search backwards for EOCD signature (PK\x05\x06)
        for i in (0..=buf.len() - EndOfCentralDirectory::SIZE).rev() {
            if &buf[i..i + 4] == EndOfCentralDirectory::SIGNATURE {
                // The comment length field must account for every remaining byte
                let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;

                if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
                    let eocd = EndOfCentralDirectory::from_bytes(
                        &buf[i..i + EndOfCentralDirectory::SIZE],
                    )?;
                    return Ok((eocd, search_start + i as u64));
                }
            }
        }

        Err(OpenError::malformed("no ZIP end of central directory found"))
    }

    /// Read the ZIP64 End of Central Directory record.
    ///
    /// Called when the regular EOCD indicates ZIP64 extensions are needed
    /// (fields set to 0xFFFF or 0xFFFFFFFF).
    pub fn read_zip64_eocd(&self, eocd_offset: u64) -> Result<Zip64EOCD, OpenError> {
        // The locator sits immediately before the regular EOCD
        let locator_offset = eocd_offset
            .checked_sub(Zip64EOCDLocator::SIZE as u64)
            .ok_or_else(|| OpenError::malformed("missing ZIP64 locator"))?;
        let locator_buf = self.read_region(
            locator_offset,
            Zip64EOCDLocator::SIZE as u64,
            "ZIP64 locator",
        )?;
        let locator = Zip64EOCDLocator::from_bytes(&locator_buf)?;

        let eocd64_buf = self.read_region(
            locator.eocd64_offset,
            Zip64EOCD::MIN_SIZE as u64,
            "ZIP64 end of central directory",
        )?;
        Zip64EOCD::from_bytes(&eocd64_buf)
    }

    /// List all entries in the ZIP archive, in central directory order.
    ///
    /// An archive whose central directory is empty yields an empty list;
    /// the caller decides whether that is an error.
    pub fn list_files(&self) -> Result<Vec<ZipFileEntry>, OpenError> {
        let (eocd, eocd_offset) = self.find_eocd()?;
        if eocd.is_multi_disk() {
            return Err(OpenError::malformed("multi-disk archives are not supported"));
        }

        let (cd_offset, cd_size, total_entries) = if eocd.is_zip64() {
            let eocd64 = self.read_zip64_eocd(eocd_offset)?;
            (eocd64.cd_offset, eocd64.cd_size, eocd64.total_entries)
        } else {
            (
                eocd.cd_offset as u64,
                eocd.cd_size as u64,
                eocd.total_entries as u64,
            )
        };

        tracing::debug!(
            cd_offset,
            cd_size,
            total_entries,
            zip64 = eocd.is_zip64(),
            "found ZIP central directory"
        );

        if total_entries == 0 {
            return Ok(Vec::new());
        }
        if total_entries > cd_size / CDFH_MIN_SIZE as u64 {
            return Err(OpenError::malformed(format!(
                "central directory of {} bytes cannot hold {} entries",
                cd_size, total_entries
            )));
        }

        let cd_data = self.read_region(cd_offset, cd_size, "central directory")?;

        let mut entries = Vec::with_capacity(total_entries as usize);
        let mut cursor = Cursor::new(cd_data.as_slice());

        for i in 0..total_entries {
            let entry = Self::parse_cdfh(&mut cursor).map_err(|e| {
                OpenError::malformed(format!("central directory entry {}: {}", i, e))
            })?;
            entries.push(entry);
        }

        Ok(entries)
    }

    /// Parse a Central Directory File Header from a cursor.
    ///
    /// The CDFH contains metadata about a file in the archive, including
    /// its name, sizes, and location of the actual file data.
    fn parse_cdfh(cursor: &mut Cursor<&[u8]>) -> io::Result<ZipFileEntry> {
        let mut sig = [0u8; 4];
        cursor.read_exact(&mut sig)?;
        if sig != CDFH_SIGNATURE {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "bad signature"));
        }

        let _version_made_by = cursor.read_u16::<LittleEndian>()?;
        let _version_needed = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let compression_method = cursor.read_u16::<LittleEndian>()?;
        let _last_mod_time = cursor.read_u16::<LittleEndian>()?;
        let _last_mod_date = cursor.read_u16::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let mut compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let mut uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let file_name_length = cursor.read_u16::<LittleEndian>()?;
        let extra_field_length = cursor.read_u16::<LittleEndian>()?;
        let file_comment_length = cursor.read_u16::<LittleEndian>()?;
        let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
        let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
        let _external_attrs = cursor.read_u32::<LittleEndian>()?;
        let mut lfh_offset = cursor.read_u32::<LittleEndian>()? as u64;

        let mut file_name_bytes = vec![0u8; file_name_length as usize];
        cursor.read_exact(&mut file_name_bytes)?;
        // Non-UTF8 names are kept, lossily
        let file_name = String::from_utf8_lossy(&file_name_bytes).to_string();

        let is_directory = file_name.ends_with('/');

        let extra_field_end = cursor.position() + extra_field_length as u64;
        let cd_len = cursor.get_ref().len() as u64;
        if extra_field_end + file_comment_length as u64 > cd_len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "extra field or comment runs past the central directory",
            ));
        }

        while cursor.position() + 4 <= extra_field_end {
            let header_id = cursor.read_u16::<LittleEndian>()?;
            let field_size = cursor.read_u16::<LittleEndian>()?;
            let field_end = (cursor.position() + field_size as u64).min(extra_field_end);

            if header_id == 0x0001 {
                // ZIP64 extended information: present only for saturated header fields
                if uncompressed_size == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                    uncompressed_size = cursor.read_u64::<LittleEndian>()?;
                }
                if compressed_size == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                    compressed_size = cursor.read_u64::<LittleEndian>()?;
                }
                if lfh_offset == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                    lfh_offset = cursor.read_u64::<LittleEndian>()?;
                }
            }
            cursor.set_position(field_end);
        }

        cursor.set_position(extra_field_end + file_comment_length as u64);

        Ok(ZipFileEntry {
            file_name,
            compression_method: CompressionMethod::from_u16(compression_method),
            flags,
            compressed_size,
            uncompressed_size,
            crc32,
            lfh_offset,
            is_directory,
        })
    }

    /// Get the actual data offset for a file entry.
    ///
    /// The Local File Header (LFH) has variable-length fields (filename,
    /// extra field) that may differ from the Central Directory entry.
    /// This method reads the LFH to calculate where the actual file
    /// data begins.
    pub fn get_data_offset(&self, lfh_offset: u64) -> io::Result<u64> {
        let mut lfh_buf = [0u8; LFH_SIZE];
        self.reader.read_exact_at(lfh_offset, &mut lfh_buf)?;

        if &lfh_buf[0..4] != LFH_SIGNATURE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "invalid local file header",
            ));
        }

        let mut cursor = Cursor::new(&lfh_buf[..]);
        cursor.set_position(26); // Offset to filename length field

        let file_name_length = cursor.read_u16::<LittleEndian>()? as u64;
        let extra_field_length = cursor.read_u16::<LittleEndian>()? as u64;

        Ok(lfh_offset + LFH_SIZE as u64 + file_name_length + extra_field_length)
    }

    pub fn reader(&self) -> &'r R {
        self.reader
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}
