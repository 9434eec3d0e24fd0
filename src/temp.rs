//! Temporary files materialised from byte blobs.
//!
//! The registry is an ordinary value owned by the host's top-level
//! lifecycle object. Every mutation takes `&mut self`, so one owner at a
//! time; a multi-threaded host wraps it in a mutex. Files still
//! registered when the registry is dropped are removed then.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const DEFAULT_PREFIX: &str = "bundle_";

/// Fresh random names tried before giving up on `write`.
const MAX_NAME_ATTEMPTS: u32 = 16;

/// Outcome of a bulk removal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: usize,
    pub failed: usize,
}

impl CleanupReport {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Ledger of temp files created through [`TempFileRegistry::write`],
/// in creation order.
#[derive(Debug)]
pub struct TempFileRegistry {
    dir: PathBuf,
    prefix: String,
    entries: Vec<PathBuf>,
}

impl TempFileRegistry {
    /// Registry writing into the platform temp directory.
    pub fn new() -> Self {
        Self::in_dir(std::env::temp_dir())
    }

    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: DEFAULT_PREFIX.to_string(),
            entries: Vec::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `bytes` verbatim to `<prefix><random><extension>` and record
    /// the absolute path. Nothing is recorded if the write fails.
    pub fn write(&mut self, bytes: &[u8], extension: &str) -> io::Result<PathBuf> {
        let dir = std::path::absolute(&self.dir)?;

        for _ in 0..MAX_NAME_ATTEMPTS {
            let name = format!("{}{}{}", self.prefix, rand::random::<u32>(), extension);
            let path = dir.join(name);

            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    tracing::error!(path = %path.display(), "error creating temp file: {}", e);
                    return Err(e);
                }
            };

            if let Err(e) = file.write_all(bytes) {
                tracing::error!(path = %path.display(), "error writing temp file: {}", e);
                drop(file);
                let _ = fs::remove_file(&path);
                return Err(e);
            }

            tracing::debug!(path = %path.display(), bytes = bytes.len(), "created temp file");
            self.entries.push(path.clone());
            return Ok(path);
        }

        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no unused temp file name in {}", dir.display()),
        ))
    }

    /// Delete `path`. A missing file counts as removed, and the path need
    /// not have come from this registry.
    pub fn remove(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let removed = remove_file(path);
        if removed {
            self.entries.retain(|p| p != path);
        }
        removed
    }

    /// Remove every registered file; true iff none failed.
    pub fn remove_all(&mut self) -> bool {
        self.cleanup().is_success()
    }

    /// Remove every registered file in creation order, continuing past
    /// failures, and clear the registry.
    pub fn cleanup(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();

        for path in std::mem::take(&mut self.entries) {
            if remove_file(&path) {
                report.removed += 1;
                tracing::info!("{} removed correctly", path.display());
            } else {
                report.failed += 1;
            }
        }

        if !report.is_success() {
            tracing::warn!(
                failed = report.failed,
                removed = report.removed,
                "some temp files could not be removed"
            );
        }
        report
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.entries
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        self.entries.iter().any(|p| p == path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for TempFileRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TempFileRegistry {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            self.cleanup();
        }
    }
}

fn remove_file(path: &Path) -> bool {
    if path.as_os_str().is_empty() {
        return true;
    }
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => true,
        Err(e) => {
            tracing::error!("error removing {}: {}", path.display(), e);
            false
        }
    }
}
