//! # resbundle
//!
//! Load installer resource bundles out of ZIP and tar archives, and keep
//! track of the temporary files produced along the way.
//!
//! ## Features
//!
//! - Open archives from a borrowed buffer, an owned buffer, or a file
//! - ZIP (STORED, DEFLATE, ZIP64) and tar (ustar, GNU, pax) indexes
//! - Forward-only cursor over regular files, skipping directories
//! - Size and CRC-32 checked extraction into memory
//! - Partial-failure tolerant bundle loading with a file-open fallback
//! - A temp-file registry that removes everything it created
//!
//! ## Example
//!
//! ```no_run
//! use resbundle::{ResourceBundle, TempFileRegistry};
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut temp_files = TempFileRegistry::new();
//!
//!     let bundle = ResourceBundle::load_path("resources.zip")?;
//!     for (path, bytes) in bundle.iter() {
//!         println!("{}: {} bytes", path, bytes.len());
//!     }
//!
//!     if let Some(font) = bundle.get("fonts/main.ttf") {
//!         let path = temp_files.write(font, ".ttf")?;
//!         println!("font staged at {}", path.display());
//!     }
//!
//!     temp_files.remove_all();
//!     Ok(())
//! }
//! ```

pub mod bundle;
pub mod cli;
pub mod cursor;
pub mod entry;
pub mod error;
pub mod extractor;
pub mod io;
pub mod source;
pub mod tar;
pub mod temp;
pub mod zip;

pub use bundle::{FallbackPolicy, LoadOptions, ResourceBundle};
pub use cli::Cli;
pub use cursor::{EntryCursor, Files};
pub use entry::{EntryIndex, EntryMetadata};
pub use error::{ExtractionError, LoadError, OpenError};
pub use extractor::Extractor;
pub use io::{LocalFileReader, ReadAt};
pub use source::{ArchiveFormat, ArchiveSource, Backing};
pub use temp::{CleanupReport, TempFileRegistry};
