//! Error types for opening archives, extracting entries and loading bundles.
//!
//! Nothing here is fatal: every failure is returned to the caller, who
//! decides whether to show it, retry through another open path, or give up.

use std::io;

use thiserror::Error;

/// Failure to open a container and read its index.
#[derive(Error, Debug)]
pub enum OpenError {
    /// The source could not be opened or read.
    #[error("failed to read archive: {0}")]
    Io(#[from] io::Error),

    /// No valid index was found, or the index is truncated or inconsistent.
    #[error("malformed archive: {0}")]
    Malformed(String),

    /// The index is well formed but lists no entries.
    #[error("archive contains no entries")]
    Empty,
}

impl OpenError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        OpenError::Malformed(msg.into())
    }
}

/// Failure to extract one entry, or to build a non-empty bundle.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// The entry does not belong to the source it was handed to.
    #[error("entry `{0}` does not belong to this archive")]
    NotFound(String),

    /// Decoded size or checksum differs from what the index declares.
    #[error("entry `{path}` is corrupt: {reason}")]
    Corrupt { path: String, reason: String },

    /// The entry is stored with a compression method we cannot decode.
    #[error("entry `{path}` uses unsupported compression method {method}")]
    UnsupportedMethod { path: String, method: u16 },

    /// The declared size exceeds the configured per-entry limit.
    #[error("entry `{path}` declares {size} bytes, limit is {limit}")]
    TooLarge { path: String, size: u64, limit: u64 },

    /// Reading the payload from a file-backed source failed.
    #[error("failed to read entry `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Nothing could be extracted from the archive.
    #[error("archive yielded no extractable entries")]
    EmptyResult,
}

impl ExtractionError {
    pub(crate) fn corrupt(path: &str, reason: impl Into<String>) -> Self {
        ExtractionError::Corrupt {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failure of a whole bundle load.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Open(#[from] OpenError),

    #[error(transparent)]
    Extract(#[from] ExtractionError),
}

impl LoadError {
    /// True when the archive opened but produced nothing usable.
    pub fn is_empty(&self) -> bool {
        matches!(
            self,
            LoadError::Open(OpenError::Empty) | LoadError::Extract(ExtractionError::EmptyResult)
        )
    }
}
