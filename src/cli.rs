//! CLI argument parsing with clap

use crate::config::{Config, FileOperation};
use clap::Parser;
use std::path::PathBuf;

/// Media Sorter - photo and video organization by capture date
///
/// Sorts media files into date-named folders with capture-time
/// extraction from EXIF data, video metadata, filenames, and
/// file system timestamps.
#[derive(Parser, Debug)]
#[command(name = "mediasort")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file (TOML format)
    ///
    /// When specified, settings from the config file are used as defaults.
    /// CLI arguments will override config file settings.
    #[arg(short = 'C', long)]
    pub config: Option<PathBuf>,

    /// Source directory to scan for media files
    #[arg(short, long)]
    pub source: Option<PathBuf>,

    /// Destination root for organized files
    ///
    /// Omit to organize in place: date folders are created inside the
    /// source directory and already-organized folders are skipped.
    #[arg(short, long)]
    pub dest: Option<PathBuf>,

    /// Directories to exclude from scanning (absolute paths or folder names)
    #[arg(short = 'x', long = "exclude", num_args = 1..)]
    pub exclude_dirs: Option<Vec<PathBuf>>,

    /// File operation mode
    #[arg(short = 'O', long, value_enum)]
    pub operation: Option<FileOperation>,

    /// Number of threads for metadata resolution (0 = auto)
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Number of threads for file relocation
    #[arg(long)]
    pub io_threads: Option<usize>,

    /// Timeout in seconds for a single ffprobe invocation
    #[arg(long)]
    pub probe_timeout: Option<u64>,

    /// Interval in seconds between progress log lines
    #[arg(long)]
    pub report_interval: Option<u64>,

    /// Dry run mode - show what would be done without doing it
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Output log format as JSON
    #[arg(long)]
    pub json_log: bool,

    /// Print a sample configuration file and exit
    #[arg(long)]
    pub print_sample_config: bool,
}

impl Cli {
    /// Get config file name (without extension) for log naming
    pub fn config_name(&self) -> Option<String> {
        self.config.as_ref().and_then(|p| {
            p.file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.to_string())
        })
    }

    /// Merge CLI arguments with config from file
    /// CLI arguments take precedence over config file settings
    pub fn merge_with_config(&self, mut config: Config) -> Config {
        if let Some(ref source) = self.source {
            config.source_dir = source.clone();
        }
        if let Some(ref dest) = self.dest {
            config.dest_dir = Some(dest.clone());
        }
        if let Some(ref excludes) = self.exclude_dirs {
            config.exclude_dirs = excludes.clone();
        }
        if let Some(operation) = self.operation {
            config.operation = operation;
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if let Some(io_threads) = self.io_threads {
            config.io_threads = io_threads;
        }
        if let Some(probe_timeout) = self.probe_timeout {
            config.probe_timeout_secs = probe_timeout;
        }
        if let Some(report_interval) = self.report_interval {
            config.report_interval_secs = report_interval;
        }
        if self.dry_run {
            config.dry_run = true;
        }
        if self.verbose {
            config.verbose = true;
        }

        config
    }

    /// Convert CLI arguments to Config (when no config file is used)
    pub fn to_config(&self) -> Config {
        let config = Config::default();
        self.merge_with_config(config)
    }
}
