//! Main entry point for the resbundle CLI application.
//!
//! Lists, prints or unpacks a resource bundle. Every temporary file the
//! run creates is removed before exit, whether or not the run succeeded.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};

use resbundle::bundle::open_path;
use resbundle::{ArchiveSource, Cli, ResourceBundle, TempFileRegistry};

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .with_writer(std::io::stderr)
        .init();

    let mut temp_files = TempFileRegistry::new();
    let result = run(&cli, &mut temp_files);

    if !temp_files.remove_all() {
        tracing::warn!("some temporary files were left behind");
    }

    result
}

fn run(cli: &Cli, temp_files: &mut TempFileRegistry) -> Result<()> {
    let source = open_source(cli, temp_files)?;

    if cli.list || cli.verbose {
        list_files(&source, cli.verbose);
        return Ok(());
    }

    let bundle = ResourceBundle::load_with(&source, &cli.load_options())
        .with_context(|| format!("nothing to extract from {}", cli.file))?;

    let selected: Vec<(&str, &[u8])> = bundle
        .iter()
        .filter(|(path, _)| is_selected(cli, path))
        .collect();

    let show_filename = cli.pipe && selected.len() > 1;
    for (path, data) in selected {
        extract_file(cli, path, data, show_filename)?;
    }

    Ok(())
}

/// Open the archive named on the command line.
///
/// With `-t` the archive bytes are first copied into a registry temp file
/// and opened from there.
fn open_source(cli: &Cli, temp_files: &mut TempFileRegistry) -> Result<ArchiveSource<'static>> {
    let policy = cli.load_options().fallback;

    if cli.is_stdin() {
        let mut bytes = Vec::new();
        std::io::stdin()
            .lock()
            .read_to_end(&mut bytes)
            .context("failed to read archive from stdin")?;

        if cli.stage {
            let staged = temp_files.write(&bytes, ".bundle")?;
            return Ok(open_path(&staged, policy)?);
        }
        return Ok(ArchiveSource::from_vec(bytes)?);
    }

    let path = Path::new(&cli.file);
    if cli.stage {
        let bytes =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let extension = path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let staged = temp_files.write(&bytes, &extension)?;
        return Ok(open_path(&staged, policy)?);
    }

    open_path(path, policy).with_context(|| format!("cannot open {}", path.display()))
}

fn is_selected(cli: &Cli, path: &str) -> bool {
    if !cli.files.is_empty() {
        let matches = cli.files.iter().any(|f| {
            if has_glob_chars(f) {
                glob_match(f, path)
            } else {
                // Exact match on full path or basename
                let basename = Path::new(path)
                    .file_name()
                    .map(|s| s.to_string_lossy())
                    .unwrap_or_default();
                path == f || basename == *f
            }
        });
        if !matches {
            return false;
        }
    }

    !cli
        .exclude
        .iter()
        .any(|x| path.contains(x.as_str()) || glob_match(x, path))
}

/// List archive entries, directories included.
fn list_files(source: &ArchiveSource<'_>, verbose: bool) {
    if verbose {
        println!(
            "{:>10}  {:>10}  {:>5}  {:>8}  Name",
            "Length", "Size", "Cmpr", "CRC-32"
        );
        println!("{}", "-".repeat(60));
    }

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in source.entries() {
        if !verbose {
            println!("{}", entry.path);
            continue;
        }

        println!(
            "{:>10}  {:>10}  {:>4}%  {:08x}  {}",
            entry.uncompressed_size,
            entry.compressed_size,
            entry.compression_ratio(),
            entry.checksum,
            entry.path
        );

        if entry.has_payload() {
            total_uncompressed += entry.uncompressed_size;
            total_compressed += entry.compressed_size;
            file_count += 1;
        }
    }

    if verbose {
        println!("{}", "-".repeat(60));
        let total_ratio = if total_uncompressed > 0 && total_compressed < total_uncompressed {
            100 - (total_compressed as u128 * 100 / total_uncompressed as u128) as u64
        } else {
            0
        };
        println!(
            "{:>10}  {:>10}  {:>4}%  {:>8}  {} files ({:?}, {} bytes)",
            total_uncompressed,
            total_compressed,
            total_ratio,
            "",
            file_count,
            source.format(),
            source.archive_size()
        );
    }
}

/// Write one extracted file to stdout or to disk, honoring overwrite flags.
fn extract_file(cli: &Cli, path: &str, data: &[u8], show_filename: bool) -> Result<()> {
    if cli.pipe {
        let mut stdout = std::io::stdout().lock();
        if show_filename {
            writeln!(stdout, "--- {} ---", path)?;
        }
        stdout.write_all(data)?;
        return Ok(());
    }

    let Some(relative) = safe_relative_path(path, cli.junk_paths) else {
        tracing::warn!("Skipping: {} (unsafe path)", path);
        return Ok(());
    };
    let output_path = match cli.extract_dir {
        Some(ref dir) => PathBuf::from(dir).join(relative),
        None => relative,
    };

    if output_path.exists() {
        if cli.never_overwrite {
            tracing::warn!("Skipping: {} (file exists)", path);
            return Ok(());
        }
        if !cli.overwrite {
            tracing::warn!("Skipping: {} (use -o to overwrite)", path);
            return Ok(());
        }
    }

    if !cli.is_quiet() {
        println!("  extracting: {}", path);
    }

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(&output_path, data)
        .with_context(|| format!("failed to write {}", output_path.display()))?;

    Ok(())
}

/// Archive path as a relative filesystem path, refusing absolute paths
/// and `..` components.
fn safe_relative_path(path: &str, junk_paths: bool) -> Option<PathBuf> {
    let candidate = Path::new(path);
    if junk_paths {
        return candidate.file_name().map(PathBuf::from);
    }

    let mut out = PathBuf::new();
    for component in candidate.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if out.as_os_str().is_empty() {
        return None;
    }
    Some(out)
}

fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Simple glob pattern matching supporting `*` and `?` wildcards.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern_chars: Vec<char> = pattern.chars().collect();
    let text_chars: Vec<char> = text.chars().collect();

    fn do_match(pattern: &[char], text: &[char]) -> bool {
        match (pattern.first(), text.first()) {
            (None, None) => true,
            // Star matches zero or more characters
            (Some('*'), _) => {
                do_match(&pattern[1..], text) || (!text.is_empty() && do_match(pattern, &text[1..]))
            }
            (Some('?'), Some(_)) => do_match(&pattern[1..], &text[1..]),
            (Some(p), Some(t)) if *p == *t => do_match(&pattern[1..], &text[1..]),
            _ => false,
        }
    }

    do_match(&pattern_chars, &text_chars)
}
