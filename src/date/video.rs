//! Video metadata date extraction via ffprobe
//!
//! ffprobe is an external collaborator: its absence is detected once and
//! degrades every later resolution to the next strategy, and a hung probe
//! is killed after a timeout so one corrupt container cannot stall the run.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Metadata keys to try for creation date, in priority order
const CREATION_DATE_KEYS: &[&str] = &[
    "creation_time",
    "creation_date",
    "com.apple.quicktime.creationdate",
    "date",
];

/// Cached ffprobe availability check
static FFPROBE_AVAILABLE: OnceLock<bool> = OnceLock::new();

/// Check if ffprobe is available (cached, warns once on first miss)
fn is_ffprobe_available() -> bool {
    *FFPROBE_AVAILABLE.get_or_init(|| {
        let available = Command::new("ffprobe")
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok();
        if !available {
            warn!("ffprobe not found in PATH, video metadata extraction disabled for this run");
        }
        available
    })
}

/// Extract the capture date from video container metadata using ffprobe
pub fn extract_video_date(path: &Path, timeout_secs: u64) -> Result<NaiveDate> {
    if !is_ffprobe_available() {
        return Err(Error::ProbeUnavailable);
    }

    let child = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| Error::VideoProbe {
            path: path.to_path_buf(),
            message: format!("Failed to spawn ffprobe: {}", e),
        })?;

    let stdout = wait_with_timeout(child, Duration::from_secs(timeout_secs)).map_err(|message| {
        Error::VideoProbe {
            path: path.to_path_buf(),
            message,
        }
    })?;

    let json_str = String::from_utf8_lossy(&stdout);
    trace!(?path, "ffprobe output: {}", json_str);

    let json: serde_json::Value =
        serde_json::from_str(&json_str).map_err(|e| Error::VideoProbe {
            path: path.to_path_buf(),
            message: format!("Failed to parse ffprobe JSON: {}", e),
        })?;

    find_creation_date(path, &json).ok_or_else(|| Error::VideoProbe {
        path: path.to_path_buf(),
        message: "No creation time found in video metadata".to_string(),
    })
}

/// Wait for a child process, killing it when the deadline passes
///
/// Stdout is drained on a separate thread so a chatty child cannot fill
/// the pipe and deadlock against our polling loop.
fn wait_with_timeout(mut child: Child, timeout: Duration) -> std::result::Result<Vec<u8>, String> {
    let Some(mut stdout) = child.stdout.take() else {
        let _ = child.kill();
        let _ = child.wait();
        return Err("ffprobe stdout was not captured".to_string());
    };
    let reader = std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stdout.read_to_end(&mut buf);
        buf
    });

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                let output = reader.join().unwrap_or_default();
                if status.success() {
                    return Ok(output);
                }
                return Err(format!("ffprobe exited with {}", status));
            }
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = reader.join();
                    return Err(format!("ffprobe timed out after {:?}", timeout));
                }
                std::thread::sleep(Duration::from_millis(25));
            }
            Err(e) => {
                let _ = child.kill();
                let _ = reader.join();
                return Err(format!("Failed to wait for ffprobe: {}", e));
            }
        }
    }
}

/// Search format-level then stream-level tags for a parsable creation date
fn find_creation_date(path: &Path, json: &serde_json::Value) -> Option<NaiveDate> {
    if let Some(tags) = json.get("format").and_then(|f| f.get("tags"))
        && let Some(date) = date_from_tags(path, tags)
    {
        return Some(date);
    }

    if let Some(streams) = json.get("streams").and_then(|s| s.as_array()) {
        for stream in streams {
            if let Some(tags) = stream.get("tags")
                && let Some(date) = date_from_tags(path, tags)
            {
                return Some(date);
            }
        }
    }

    None
}

fn date_from_tags(path: &Path, tags: &serde_json::Value) -> Option<NaiveDate> {
    for key in CREATION_DATE_KEYS {
        // Try both lowercase and uppercase variants
        for tag_key in [*key, &key.to_uppercase()] {
            if let Some(value) = tags.get(tag_key).and_then(|v| v.as_str())
                && let Some(date) = parse_video_datetime(value)
            {
                debug!(?path, key = tag_key, "Found video creation time");
                return Some(date);
            }
        }
    }
    None
}

/// Parse a container creation-time string against known vendor patterns
///
/// Accepts ISO 8601 (with or without zone and subseconds), EXIF-style
/// colons, and the compact numeric forms some cameras write.
pub(crate) fn parse_video_datetime(s: &str) -> Option<NaiveDate> {
    let cleaned: String = s.trim().chars().filter(|c| !c.is_control()).collect();
    let s = cleaned.trim();

    // Full ISO 8601 with timezone offset or Z
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc().date());
    }

    let datetime_formats = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y:%m:%d %H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
        "%Y%m%d%H%M%S",
    ];
    for format in datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.date());
        }
    }

    // Compact date-only form (Sony cameras)
    for format in ["%Y%m%d", "%Y-%m-%d", "%d-%b-%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Some(date);
        }
    }

    None
}
