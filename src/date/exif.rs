//! EXIF date extraction for images

use crate::error::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime};
use exif::{In, Reader, Tag};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::trace;

/// EXIF tags to try for date extraction, in priority order
const DATE_TAGS: &[Tag] = &[
    Tag::DateTimeOriginal,  // When the original image was taken
    Tag::DateTimeDigitized, // When the image was digitized
    Tag::DateTime,          // File modification date/time
];

/// Extract the capture date from EXIF metadata
pub fn extract_exif_date(path: &Path) -> Result<NaiveDate> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let exif = Reader::new()
        .read_from_container(&mut reader)
        .map_err(|e| Error::ExifRead {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    // Try each date tag in priority order
    for tag in DATE_TAGS {
        if let Some(field) = exif.get_field(*tag, In::PRIMARY)
            && let Some(date) = parse_exif_datetime(&field.display_value().to_string())
        {
            trace!(?path, ?tag, "Found EXIF date");
            return Ok(date);
        }
    }

    Err(Error::ExifRead {
        path: path.to_path_buf(),
        message: "No valid date tag found in EXIF data".to_string(),
    })
}

/// Parse an EXIF datetime string, e.g. "YYYY:MM:DD HH:MM:SS"
///
/// Non-printable characters are stripped first; corrupt tags seen in the
/// wild contain NULs or control bytes inside the digits.
fn parse_exif_datetime(s: &str) -> Option<NaiveDate> {
    let cleaned: String = s
        .trim()
        .trim_matches('"')
        .chars()
        .filter(|c| !c.is_control())
        .collect();
    let s = cleaned.trim();

    // Standard EXIF format, with and without subseconds
    for format in ["%Y:%m:%d %H:%M:%S", "%Y:%m:%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.date());
        }
    }

    // Alternative formats some cameras write
    let formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
    ];
    for format in formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.date());
        }
    }

    // Date-only tags
    for format in ["%Y:%m:%d", "%Y-%m-%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Some(date);
        }
    }

    None
}
