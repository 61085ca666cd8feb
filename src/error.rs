//! Error types for the media sorter

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for media sorter operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the media sorter
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read EXIF data from {path}: {message}")]
    ExifRead { path: PathBuf, message: String },

    #[error("Video metadata probe failed for {path}: {message}")]
    VideoProbe { path: PathBuf, message: String },

    #[error("ffprobe not found. Install FFmpeg and ensure ffprobe is in PATH")]
    ProbeUnavailable,

    #[error("Fingerprint computation failed for {path}: {message}")]
    Fingerprint { path: PathBuf, message: String },

    #[error("Cannot plan destination for {path}: {message}")]
    Planning { path: PathBuf, message: String },

    #[error("Relocation failed for {path}: {message}")]
    Relocation { path: PathBuf, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}
