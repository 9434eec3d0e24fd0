use clap::Parser;
use tracing::level_filters::LevelFilter;

use crate::bundle::{FallbackPolicy, LoadOptions};

#[derive(Parser, Debug)]
#[command(name = "resbundle")]
#[command(version)]
#[command(about = "Inspect and unpack ZIP or tar resource bundles", long_about = None)]
#[command(after_help = "Examples:\n  \
  resbundle assets.zip -x '*.psd'      extract all files except Photoshop sources\n  \
  resbundle -p assets.tar readme.txt   print one file to stdout\n  \
  cat assets.zip | resbundle -t -l -   list an archive read from a pipe")]
pub struct Cli {
    /// Archive path, or `-` to read the archive from stdin
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Files to extract (default: all)
    #[arg(value_name = "FILES")]
    pub files: Vec<String>,

    /// List files (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely with sizes and checksums
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Extract files to pipe, no messages
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Extract files into exdir
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<String>,

    /// Exclude files that follow
    #[arg(short = 'x', value_name = "FILE", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Never overwrite existing files
    #[arg(short = 'n')]
    pub never_overwrite: bool,

    /// Overwrite files WITHOUT prompting
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Junk paths (do not make directories)
    #[arg(short = 'j')]
    pub junk_paths: bool,

    /// Stage the archive in a temporary file before opening it
    #[arg(short = 't')]
    pub stage: bool,

    /// Skip CRC-32 verification of extracted entries
    #[arg(long)]
    pub no_verify: bool,

    /// Do not retry a failed direct file open from memory
    #[arg(long)]
    pub no_fallback: bool,

    /// Skip entries larger than this many bytes
    #[arg(long, value_name = "BYTES")]
    pub max_entry_size: Option<u64>,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    pub fn is_stdin(&self) -> bool {
        self.file == "-"
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || self.pipe
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    pub fn log_level(&self) -> LevelFilter {
        if self.is_very_quiet() {
            LevelFilter::OFF
        } else if self.is_quiet() {
            LevelFilter::ERROR
        } else {
            LevelFilter::WARN
        }
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            fallback: if self.no_fallback {
                FallbackPolicy::Never
            } else {
                FallbackPolicy::Always
            },
            verify_checksums: !self.no_verify,
            max_entry_size: self.max_entry_size,
        }
    }
}
