//! Media Sorter - a CLI tool for photo and video organization
//!
//! This library provides functionality for sorting media files into
//! date-named folders based on their capture time with support for:
//! - EXIF metadata extraction for images
//! - FFprobe-based metadata extraction for videos
//! - Filename timestamp parsing
//! - SHA-256 content deduplication
//! - Atomic, collision-free relocation
//! - A two-stage pipeline with separate compute and I/O concurrency

pub mod cli;
pub mod config;
pub mod date;
pub mod error;
pub mod fingerprint;
pub mod plan;
pub mod relocate;
pub mod report;
pub mod scan;

pub use cli::Cli;
pub use config::{Config, ConfigError, FileOperation, MediaKind};
pub use date::{DateSource, ResolvedDate, resolve_date};
pub use error::{Error, Result};
pub use fingerprint::{Fingerprint, fingerprint_file};
pub use plan::{DestinationPlan, Planned, Planner};
pub use relocate::{Relocated, relocate};
pub use report::{Outcome, ProgressTicker, Reporter, Snapshot};
pub use scan::{EntryResult, MediaEntry, Scanner};
