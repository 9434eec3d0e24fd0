//! ZIP archive parsing and payload decoding.
//!
//! ## Architecture
//!
//! - [`structures`]: Data structures representing ZIP format elements (EOCD, file headers, etc.)
//! - [`parser`]: Low-level parsing of ZIP structures through [`ReadAt`](crate::io::ReadAt)
//! - [`extractor`]: Payload decoding with size and CRC-32 checks
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! The EOCD is read first (from the end of the file), then the Central
//! Directory, so listing never touches payload bytes.
//!
//! ## Supported Features
//!
//! - Standard ZIP format (PKZIP APPNOTE 6.3.x compatible)
//! - ZIP64 extensions for files > 4GB
//! - STORED (no compression) method
//! - DEFLATE compression method
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No BZIP2, LZMA, or other compression methods

mod extractor;
mod parser;
mod structures;

pub use extractor::{ZipExtractor, ZipLocator};
pub use parser::ZipParser;
pub use structures::*;
