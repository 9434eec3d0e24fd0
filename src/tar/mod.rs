//! POSIX tar indexing.
//!
//! Supports ustar, GNU (`L` long names, base-256 sizes) and pax (`path`
//! and `size` records). Payloads are stored verbatim, so extraction is a
//! positional read of `size` bytes; tar carries no payload checksum.

mod header;
mod parser;

pub use parser::{TarEntry, TarParser};
