//! Capture-date resolution
//!
//! This module extracts a best-effort calendar date from:
//! - EXIF metadata in images (JPEG, HEIF, RAW formats)
//! - Video container metadata via ffprobe
//! - Filename patterns
//! - File system modification time

pub mod exif;
pub mod filename;
pub mod video;

use crate::config::{Config, MediaKind};
use chrono::{DateTime, Local, NaiveDate};
use std::fs;
use std::path::Path;
use std::time::SystemTime;
use tracing::{debug, warn};

/// Provenance of a resolved date, ordered by trust
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource {
    /// Extracted from EXIF metadata
    Exif,
    /// Extracted from video container metadata via ffprobe
    VideoMetadata,
    /// Parsed from the filename
    Filename,
    /// From the file system modification time
    FileSystem,
}

/// Result of date resolution
#[derive(Debug, Clone, Copy)]
pub struct ResolvedDate {
    /// The resolved calendar date
    pub date: NaiveDate,
    /// Where the date came from
    pub source: DateSource,
}

/// Resolve the capture date of a media file using a prioritized strategy chain
///
/// Strategies are attempted in order, first success wins:
/// 1. EXIF metadata (for images)
/// 2. Video container metadata via ffprobe (for videos)
/// 3. Filename parsing
/// 4. File system modification time, preferring the `modified` value
///    captured when the file was scanned
///
/// The final fallback always succeeds, so resolution is total.
pub fn resolve_date(
    path: &Path,
    kind: MediaKind,
    modified: Option<SystemTime>,
    config: &Config,
) -> ResolvedDate {
    match kind {
        MediaKind::Image => {
            if let Ok(date) = exif::extract_exif_date(path) {
                debug!(?path, "Resolved date from EXIF");
                return ResolvedDate {
                    date,
                    source: DateSource::Exif,
                };
            }
            debug!(?path, "No EXIF date found, trying other strategies");
        }
        MediaKind::Video => match video::extract_video_date(path, config.probe_timeout_secs) {
            Ok(date) => {
                debug!(?path, "Resolved date from video metadata");
                return ResolvedDate {
                    date,
                    source: DateSource::VideoMetadata,
                };
            }
            Err(e) => debug!(?path, error = %e, "Video probe yielded no date"),
        },
    }

    if let Some(name) = path.file_name().and_then(|f| f.to_str())
        && let Some(date) = filename::parse_filename_date(name)
    {
        debug!(?path, "Resolved date from filename");
        return ResolvedDate {
            date,
            source: DateSource::Filename,
        };
    }

    ResolvedDate {
        date: modification_date(path, modified),
        source: DateSource::FileSystem,
    }
}

/// Last-modified date in local time, from the scan-time value when one was
/// captured; epoch date if the file cannot be read at all
fn modification_date(path: &Path, cached: Option<SystemTime>) -> NaiveDate {
    let modified = match cached {
        Some(m) => Ok(m),
        None => fs::metadata(path).and_then(|m| m.modified()),
    };
    match modified {
        Ok(modified) => {
            let datetime: DateTime<Local> = modified.into();
            debug!(?path, "Using file system modification time as fallback");
            datetime.date_naive()
        }
        Err(e) => {
            warn!(?path, error = %e, "Cannot read modification time, using epoch date");
            NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()
        }
    }
}
