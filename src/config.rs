//! Configuration types for the media sorter

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File operation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FileOperation {
    /// Move files to the destination (default, matches in-place organization)
    #[default]
    Move,
    /// Copy files, leaving the source tree untouched
    Copy,
}

/// Detected media kind of a scanned file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

/// Configuration for the media sorter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source directory to scan for media files
    pub source_dir: PathBuf,

    /// Destination root for organized files (defaults to the source directory)
    pub dest_dir: Option<PathBuf>,

    /// Directories to exclude from scanning (absolute paths or folder names)
    #[serde(default)]
    pub exclude_dirs: Vec<PathBuf>,

    /// File operation mode
    pub operation: FileOperation,

    /// Dry run mode - plan everything but never touch the filesystem
    pub dry_run: bool,

    /// Number of threads for the metadata resolution stage (0 = auto)
    pub threads: usize,

    /// Number of threads for the relocation stage
    pub io_threads: usize,

    /// Timeout in seconds for a single ffprobe invocation
    pub probe_timeout_secs: u64,

    /// Interval in seconds between periodic progress log lines
    pub report_interval_secs: u64,

    /// Verbose output
    pub verbose: bool,

    /// Supported image extensions
    pub image_extensions: Vec<String>,

    /// Supported video extensions
    pub video_extensions: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("."),
            dest_dir: None,
            exclude_dirs: vec![],
            operation: FileOperation::default(),
            dry_run: false,
            threads: 0, // Auto-detect
            io_threads: 4,
            probe_timeout_secs: 5,
            report_interval_secs: 10,
            verbose: false,
            image_extensions: vec![
                "jpg".into(), "jpeg".into(), "png".into(), "heic".into(),
                "tiff".into(), "tif".into(), "webp".into(), "nef".into(),
                "cr2".into(), "arw".into(), "dng".into(),
            ],
            video_extensions: vec![
                "mp4".into(), "mov".into(), "avi".into(), "mkv".into(),
                "flv".into(), "wmv".into(), "3gp".into(), "m4v".into(),
                "mts".into(), "mpg".into(), "mpeg".into(),
            ],
        }
    }
}

impl Config {
    /// Check if a file extension is a supported image format
    pub fn is_image(&self, ext: &str) -> bool {
        let ext_lower = ext.to_lowercase();
        self.image_extensions.iter().any(|e| e == &ext_lower)
    }

    /// Check if a file extension is a supported video format
    pub fn is_video(&self, ext: &str) -> bool {
        let ext_lower = ext.to_lowercase();
        self.video_extensions.iter().any(|e| e == &ext_lower)
    }

    /// Classify a file extension into a media kind
    pub fn classify(&self, ext: &str) -> Option<MediaKind> {
        if self.is_image(ext) {
            Some(MediaKind::Image)
        } else if self.is_video(ext) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    /// Effective destination root (the source directory when unset)
    pub fn dest_root(&self) -> PathBuf {
        self.dest_dir.clone().unwrap_or_else(|| self.source_dir.clone())
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError { source: e })?;

        fs::write(path, content).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }

    /// Generate a sample configuration file content
    pub fn sample_config() -> String {
        r#"# Media Sorter Configuration File
# This file uses TOML format (https://toml.io)

# Source directory to scan for media files
source_dir = "D:/Camera"

# Destination root for organized files.
# Omit to organize in place inside the source directory.
dest_dir = "D:/Sorted"

# Directories to exclude from scanning
# Can be absolute paths or folder names (will match any folder with that name)
exclude_dirs = [
    ".sync",
    ".thumbnails",
    "@eaDir",
]

# File operation: "move" or "copy"
operation = "move"

# Dry run mode - show what would be done without actually doing it
dry_run = false

# Number of threads for metadata resolution (0 = auto-detect)
threads = 0

# Number of threads for file relocation (kept small to avoid disk thrashing)
io_threads = 4

# Timeout in seconds for a single ffprobe invocation
probe_timeout_secs = 5

# Interval in seconds between periodic progress log lines
report_interval_secs = 10

# Verbose output - show detailed processing information
verbose = false

# Supported file extensions (customize as needed)
image_extensions = ["jpg", "jpeg", "png", "heic", "tiff", "tif", "webp", "nef", "cr2", "arw", "dng"]
video_extensions = ["mp4", "mov", "avi", "mkv", "flv", "wmv", "3gp", "m4v", "mts", "mpg", "mpeg"]
"#
        .to_string()
    }
}

/// Errors that can occur when loading or saving configuration
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read configuration file
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to parse configuration file
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// Failed to write configuration file
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to serialize configuration
    SerializeError { source: toml::ser::Error },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError { path, source } => {
                write!(f, "Failed to read config file '{}': {}", path.display(), source)
            }
            ConfigError::ParseError { path, source } => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), source)
            }
            ConfigError::WriteError { path, source } => {
                write!(f, "Failed to write config file '{}': {}", path.display(), source)
            }
            ConfigError::SerializeError { source } => {
                write!(f, "Failed to serialize config: {}", source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
            ConfigError::WriteError { source, .. } => Some(source),
            ConfigError::SerializeError { source } => Some(source),
        }
    }
}
