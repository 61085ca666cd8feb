//! Filename date parsing

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::trace;

lazy_static! {
    /// Pattern: YYYYMMDD_HHmmss or YYYYMMDD-HHmmss
    static ref PATTERN_COMPACT: Regex = Regex::new(
        r"(\d{4})(\d{2})(\d{2})[_\-](\d{2})(\d{2})(\d{2})"
    ).unwrap();

    /// Pattern: YYYY-MM-DD_HH-mm-ss or similar with separators
    static ref PATTERN_SEPARATED: Regex = Regex::new(
        r"(\d{4})[-_](\d{2})[-_](\d{2})[-_\s](\d{2})[-_\.](\d{2})[-_\.](\d{2})"
    ).unwrap();

    /// Pattern: YYYY-MM-DD or YYYY_MM_DD (date without time)
    static ref PATTERN_DATE_SEPARATED: Regex = Regex::new(
        r"(\d{4})[-_](\d{2})[-_](\d{2})"
    ).unwrap();

    /// Pattern: YYYYMMDD only
    static ref PATTERN_DATE_ONLY: Regex = Regex::new(
        r"(\d{4})(\d{2})(\d{2})"
    ).unwrap();
}

/// Parse a calendar date embedded in a filename
///
/// Fixed-width windows are matched against known patterns; timestamped
/// forms win over bare dates so `20230101_20230505.jpg`-style names take
/// the full timestamp.
pub fn parse_filename_date(filename: &str) -> Option<NaiveDate> {
    // Drop the extension for cleaner matching
    let name = filename.rsplit_once('.').map_or(filename, |(stem, _)| stem);

    // Compact timestamp first (most common camera naming)
    if let Some(date) = try_date_pattern(&PATTERN_COMPACT, name) {
        trace!(filename, "Matched compact timestamp pattern");
        return Some(date);
    }

    if let Some(date) = try_date_pattern(&PATTERN_SEPARATED, name) {
        trace!(filename, "Matched separated timestamp pattern");
        return Some(date);
    }

    if let Some(date) = try_date_pattern(&PATTERN_DATE_SEPARATED, name) {
        trace!(filename, "Matched separated date pattern");
        return Some(date);
    }

    // Bare YYYYMMDD as last resort
    if let Some(date) = try_date_pattern(&PATTERN_DATE_ONLY, name) {
        trace!(filename, "Matched date-only pattern");
        return Some(date);
    }

    None
}

fn try_date_pattern(pattern: &Regex, s: &str) -> Option<NaiveDate> {
    // A name can contain several date-like windows; take the first one
    // that survives the plausibility checks
    pattern.captures_iter(s).find_map(|caps| {
        build_date(
            caps.get(1)?.as_str(),
            caps.get(2)?.as_str(),
            caps.get(3)?.as_str(),
        )
    })
}

fn build_date(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    let day: u32 = day.parse().ok()?;

    // Plausibility window; camera clocks reset to 1980 and typos like
    // 20231 are rejected by the calendar check below
    if !(1990..=2100).contains(&year) {
        return None;
    }

    NaiveDate::from_ymd_opt(year, month, day)
}
