use super::ReadAt;
use std::io;
use std::path::Path;

/// Local file reader with random access support
#[derive(Debug)]
pub struct LocalFileReader {
    file: std::fs::File,
    size: u64,
}

impl LocalFileReader {
    pub fn new(path: &Path) -> io::Result<Self> {
        // Stat before opening: opening a FIFO blocks until a writer shows up
        if !std::fs::metadata(path)?.is_file() {
            return Err(not_regular(path));
        }
        let file = std::fs::File::open(path)?;
        let metadata = file.metadata()?;
        if !metadata.is_file() {
            return Err(not_regular(path));
        }
        Ok(Self {
            file,
            size: metadata.len(),
        })
    }
}

/// Pipes and character devices report no usable length.
fn not_regular(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("{} is not a regular file", path.display()),
    )
}

impl ReadAt for LocalFileReader {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            self.file.read_at(buf, offset)
        }

        #[cfg(windows)]
        {
            use std::os::windows::fs::FileExt;
            self.file.seek_read(buf, offset)
        }

        #[cfg(not(any(unix, windows)))]
        {
            let _ = (offset, buf);
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "positional reads are not available on this platform",
            ))
        }
    }

    fn size(&self) -> u64 {
        self.size
    }
}
