//! Opening archives, enumerating entries and extracting payloads.

mod common;

use common::{TarBuilder, ZipBuilder, sample_files};
use resbundle::{
    ArchiveFormat, ArchiveSource, EntryCursor, ExtractionError, Extractor, OpenError,
};

fn mixed_zip() -> Vec<u8> {
    let files = sample_files();
    ZipBuilder::new()
        .directory("assets/")
        .directory("assets/images/")
        .stored(files[0].0, &files[0].1)
        .directory("fonts/")
        .deflated(files[1].0, &files[1].1)
        .stored("empty.txt", b"")
        .deflated(files[2].0, &files[2].1)
        .directory("trailing/")
        .build()
}

fn mixed_tar() -> Vec<u8> {
    let files = sample_files();
    TarBuilder::new()
        .directory("assets/")
        .file(files[0].0, &files[0].1)
        .directory("fonts/")
        .symlink("fonts/link.ttf")
        .file(files[1].0, &files[1].1)
        .file("empty.txt", b"")
        .file(files[2].0, &files[2].1)
        .build()
}

#[test]
fn zip_index_is_complete() {
    let data = mixed_zip();
    let source = ArchiveSource::open_from_buffer(&data).unwrap();

    assert_eq!(source.format(), ArchiveFormat::Zip);
    assert_eq!(source.entry_count(), 8);
    assert!(source.entry_at(0).unwrap().is_directory);
    assert!(!source.entry_at(0).unwrap().has_payload());
    assert!(source.entry_at(8).is_none());

    let fonts = source.find_entry("fonts/main.ttf").unwrap();
    assert_eq!(fonts.uncompressed_size, 4096);
    assert!(fonts.has_payload());
    assert!(fonts.compressed_size < fonts.uncompressed_size);
    assert_eq!(fonts.index.position(), 4);
    assert_eq!(source.entry_at(4).unwrap(), fonts);
    assert!(source.find_entry("fonts/MAIN.ttf").is_none());
}

#[test]
fn tar_index_skips_links() {
    let data = mixed_tar();
    let source = ArchiveSource::open_from_buffer(&data).unwrap();

    assert_eq!(source.format(), ArchiveFormat::Tar);
    // The symlink is not indexed
    assert_eq!(source.entry_count(), 6);
    assert!(source.find_entry("fonts/link.ttf").is_none());

    let readme = source.find_entry("readme.txt").unwrap();
    assert_eq!(readme.checksum, 0);
    assert_eq!(readme.compressed_size, readme.uncompressed_size);
}

#[test]
fn cursor_yields_every_file_once_in_order() {
    for data in [mixed_zip(), mixed_tar()] {
        let source = ArchiveSource::open_from_buffer(&data).unwrap();

        let mut seen = Vec::new();
        let mut cursor = EntryCursor::begin(&source);
        while cursor.has_next() {
            seen.push(cursor.current(&source).unwrap().path);
            cursor = cursor.advance(&source);
        }

        assert_eq!(
            seen,
            vec![
                "config/settings.json",
                "fonts/main.ttf",
                "empty.txt",
                "readme.txt"
            ]
        );
        let via_iter: Vec<String> = source.files().map(|e| e.path).collect();
        assert_eq!(via_iter, seen);
    }
}

#[test]
fn exhausted_cursor_stays_exhausted() {
    let data = mixed_zip();
    let source = ArchiveSource::open_from_buffer(&data).unwrap();

    let mut cursor = EntryCursor::begin(&source);
    for _ in 0..4 {
        cursor = cursor.advance(&source);
    }
    assert!(!cursor.has_next());
    assert!(cursor.current(&source).is_none());
    assert_eq!(cursor.position(), None);
    assert_eq!(cursor.advance(&source), cursor);

    // A fresh cursor starts over
    let restarted = EntryCursor::begin(&source);
    assert_eq!(restarted.position(), Some(2));
}

#[test]
fn directory_only_archive_has_exhausted_cursor() {
    let data = ZipBuilder::new().directory("a/").directory("a/b/").build();
    let source = ArchiveSource::open_from_buffer(&data).unwrap();

    assert_eq!(source.entry_count(), 2);
    assert!(!EntryCursor::begin(&source).has_next());
    assert_eq!(source.files().count(), 0);
}

#[test]
fn extraction_matches_declared_sizes() {
    let files = sample_files();
    for data in [mixed_zip(), mixed_tar()] {
        let source = ArchiveSource::open_from_buffer(&data).unwrap();
        let extractor = Extractor::new(&source);

        for entry in source.files() {
            let bytes = extractor.extract(&entry).unwrap();
            assert_eq!(bytes.len() as u64, entry.uncompressed_size, "{}", entry.path);
            if let Some((_, expected)) = files.iter().find(|(p, _)| *p == entry.path) {
                assert_eq!(&bytes, expected);
            }
        }

        let empty = source.find_entry("empty.txt").unwrap();
        assert_eq!(extractor.extract(&empty).unwrap(), Vec::<u8>::new());
    }
}

#[test]
fn extraction_is_repeatable() {
    let data = mixed_zip();
    let source = ArchiveSource::open_from_buffer(&data).unwrap();
    let extractor = Extractor::new(&source);
    let entry = source.find_entry("readme.txt").unwrap();

    let first = extractor.extract(&entry).unwrap();
    let second = extractor.extract(&entry).unwrap();
    assert_eq!(first, second);
    assert_eq!(source.files().count(), 4);
}

#[test]
fn entries_from_another_source_are_rejected() {
    let data = mixed_zip();
    let first = ArchiveSource::open_from_buffer(&data).unwrap();
    let second = ArchiveSource::open_from_buffer(&data).unwrap();

    let entry = first.find_entry("readme.txt").unwrap();
    match Extractor::new(&second).extract(&entry) {
        Err(ExtractionError::NotFound(path)) => assert_eq!(path, "readme.txt"),
        other => panic!("unexpected result: {:?}", other),
    }

    let mut renamed = entry.clone();
    renamed.path = "other.txt".to_string();
    assert!(matches!(
        Extractor::new(&first).extract(&renamed),
        Err(ExtractionError::NotFound(_))
    ));
}

#[test]
fn corrupt_entries_are_reported() {
    let data = ZipBuilder::new()
        .with_bad_crc("bad.bin", b"some payload")
        .with_method("lzma.bin", b"opaque", 14)
        .build();
    let source = ArchiveSource::open_from_buffer(&data).unwrap();
    let extractor = Extractor::new(&source);

    let bad = source.find_entry("bad.bin").unwrap();
    assert!(matches!(
        extractor.extract(&bad),
        Err(ExtractionError::Corrupt { .. })
    ));
    // The payload itself is intact; only the checksum disagrees
    assert_eq!(
        extractor.verify_checksums(false).extract(&bad).unwrap(),
        b"some payload"
    );

    let lzma = source.find_entry("lzma.bin").unwrap();
    assert!(matches!(
        extractor.extract(&lzma),
        Err(ExtractionError::UnsupportedMethod { method: 14, .. })
    ));
}

#[test]
fn truncated_tar_payload_is_corrupt() {
    let mut data = TarBuilder::new()
        .file("whole.txt", b"complete")
        .file("cut.bin", &[7u8; 2000])
        .build();
    // Drop the terminator and most of the last payload
    data.truncate(512 + 512 + 512 + 700);

    let source = ArchiveSource::open_from_buffer(&data).unwrap();
    let extractor = Extractor::new(&source);
    let cut = source.find_entry("cut.bin").unwrap();
    assert!(matches!(
        extractor.extract(&cut),
        Err(ExtractionError::Corrupt { .. })
    ));
    let whole = source.find_entry("whole.txt").unwrap();
    assert_eq!(extractor.extract(&whole).unwrap(), b"complete");
}

#[test]
fn size_limit_is_enforced() {
    let data = mixed_zip();
    let source = ArchiveSource::open_from_buffer(&data).unwrap();
    let fonts = source.find_entry("fonts/main.ttf").unwrap();

    let limited = Extractor::new(&source).max_entry_size(Some(1024));
    assert!(matches!(
        limited.extract(&fonts),
        Err(ExtractionError::TooLarge { size: 4096, limit: 1024, .. })
    ));
}

#[test]
fn zip_with_comment_is_found() {
    let data = ZipBuilder::new()
        .stored("a.txt", b"alpha")
        .build_with_comment(b"built for the installer");
    let source = ArchiveSource::open_from_buffer(&data).unwrap();
    assert_eq!(source.entry_count(), 1);
}

#[test]
fn long_tar_names_survive() {
    let name = format!("{}/resource.bin", "nested".repeat(30));
    let data = TarBuilder::new().long_name_file(&name, b"deep").build();
    let source = ArchiveSource::open_from_buffer(&data).unwrap();

    let entry = source.find_entry(&name).unwrap();
    assert_eq!(Extractor::new(&source).extract(&entry).unwrap(), b"deep");
}

#[test]
fn malformed_inputs_are_rejected() {
    let mut data = mixed_zip();
    // Point the central directory past the end of the data
    let len = data.len();
    data[len - 6..len - 2].copy_from_slice(&u32::MAX.to_le_bytes());
    assert!(matches!(
        ArchiveSource::open_from_buffer(&data),
        Err(OpenError::Malformed(_))
    ));

    let mut tar = mixed_tar();
    tar[0] ^= 0x20;
    assert!(matches!(
        ArchiveSource::open_from_buffer(&tar),
        Err(OpenError::Malformed(_))
    ));
}

#[test]
fn file_backed_and_buffered_sources_agree() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bundle.zip");
    std::fs::write(&path, mixed_zip()).unwrap();

    let direct = ArchiveSource::open_file_backed(&path).unwrap();
    let buffered = ArchiveSource::open_from_file(&path).unwrap();
    assert!(direct.is_file_backed());
    assert!(!buffered.is_file_backed());
    let on_disk = std::fs::metadata(&path).unwrap().len();
    assert_eq!(direct.archive_size(), on_disk);
    assert_eq!(buffered.archive_size(), on_disk);

    let direct_paths: Vec<_> = direct.entries().map(|e| e.path.clone()).collect();
    let buffered_paths: Vec<_> = buffered.entries().map(|e| e.path.clone()).collect();
    assert_eq!(direct_paths, buffered_paths);

    let a = Extractor::new(&direct)
        .extract(&direct.find_entry("fonts/main.ttf").unwrap())
        .unwrap();
    let b = Extractor::new(&buffered)
        .extract(&buffered.find_entry("fonts/main.ttf").unwrap())
        .unwrap();
    assert_eq!(a, b);
}

#[derive(Clone, Default)]
struct CapturedLog(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for CapturedLog {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn every_indexed_entry_is_logged() {
    let log = CapturedLog::default();
    let subscriber = {
        let log = log.clone();
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || log.clone())
            .finish()
    };

    let data = mixed_zip();
    let source = tracing::subscriber::with_default(subscriber, || {
        ArchiveSource::open_from_buffer(&data).unwrap()
    });

    let output = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
    let lines: Vec<&str> = output.lines().filter(|l| l.contains("indexed entry")).collect();
    assert_eq!(lines.len(), source.entry_count() as usize);
    for (line, entry) in lines.iter().zip(source.entries()) {
        assert!(line.contains("INFO"), "{}", line);
        assert!(line.contains(&entry.path), "{}", line);
    }
}
