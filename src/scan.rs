//! Source tree scanning and the two-stage pipeline
//!
//! The scanner walks the source tree, classifies candidates by extension,
//! then drives them through two stages with different concurrency levels:
//! date resolution (CPU-bound, global rayon pool) and planning plus
//! relocation (I/O-bound, dedicated small pool). Per-entry failures are
//! converted to outcomes at the entry boundary and never abort siblings.

use crate::config::{Config, MediaKind};
use crate::date::{ResolvedDate, resolve_date};
use crate::error::Result;
use crate::fingerprint::{Fingerprint, fingerprint_file};
use crate::plan::{Planned, Planner};
use crate::relocate::{Relocated, relocate};
use crate::report::{Outcome, Reporter};
use lazy_static::lazy_static;
use rayon::prelude::*;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Directory names written by sync services and desktop indexers
const SYNC_DIR_NAMES: &[&str] = &["@eaDir", "__MACOSX", ".sync", ".thumbnails"];

lazy_static! {
    /// Date folders produced by this tool, pruned when scanning in place
    static ref DATE_DIR: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
}

/// One candidate source file, created during the tree scan
#[derive(Debug, Clone)]
pub struct MediaEntry {
    pub path: PathBuf,
    pub kind: MediaKind,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

/// Result of processing a single entry
#[derive(Debug, Clone)]
pub struct EntryResult {
    pub source: PathBuf,
    pub destination: Option<PathBuf>,
    pub resolved: Option<ResolvedDate>,
    pub outcome: Outcome,
}

/// Work item flowing from the compute stage to the I/O stage
struct ResolvedEntry {
    entry: MediaEntry,
    resolved: ResolvedDate,
    fingerprint: Option<Fingerprint>,
}

/// Coordinates the scan and the two-stage pipeline
pub struct Scanner {
    config: Arc<Config>,
    reporter: Arc<Reporter>,
    cancel: Arc<AtomicBool>,
}

impl Scanner {
    pub fn new(config: Config, reporter: Arc<Reporter>, cancel: Arc<AtomicBool>) -> Self {
        // Configure the global rayon pool for the compute stage
        if config.threads > 0
            && let Err(e) = rayon::ThreadPoolBuilder::new()
                .num_threads(config.threads)
                .build_global()
        {
            warn!(
                threads = config.threads,
                error = %e,
                "Global thread pool already built, configured thread count not applied"
            );
        }

        Self {
            config: Arc::new(config),
            reporter,
            cancel,
        }
    }

    /// Run the full pipeline over the source tree
    pub fn run(&self) -> Result<Vec<EntryResult>> {
        let dest_root = self.config.dest_root();

        info!(source = %self.config.source_dir.display(), "Scanning source tree");
        let entries = self.collect_entries(&dest_root)?;
        let total_bytes: u64 = entries.iter().map(|e| e.size).sum();
        info!(
            count = entries.len(),
            megabytes = total_bytes / (1024 * 1024),
            "Found eligible media files"
        );

        self.reporter.set_eligible_total(entries.len());

        if entries.is_empty() {
            info!("No media files to process");
            return Ok(Vec::new());
        }

        // Failure to create the destination root is fatal to the run,
        // unlike every per-file error below.
        if !self.config.dry_run {
            std::fs::create_dir_all(&dest_root)?;
        }

        // Compute stage: resolve dates at high concurrency. Resolution is
        // total, so the only entries dropped here are unadmitted ones
        // after a cancellation signal.
        info!("Resolving capture dates");
        let resolved: Vec<ResolvedEntry> = entries
            .into_par_iter()
            .filter_map(|entry| {
                if self.cancel.load(Ordering::SeqCst) {
                    return None;
                }
                let resolved = resolve_date(&entry.path, entry.kind, entry.modified, &self.config);
                let fingerprint = self.precompute_fingerprint(&dest_root, &entry, resolved);
                Some(ResolvedEntry {
                    entry,
                    resolved,
                    fingerprint,
                })
            })
            .collect();

        // I/O stage: plan and relocate on a dedicated bounded pool
        info!(
            count = resolved.len(),
            io_threads = self.config.io_threads,
            "Relocating files"
        );
        let planner = Planner::new(dest_root.clone(), self.config.dry_run);
        let io_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.io_threads.max(1))
            .build()
            .map_err(|e| crate::error::Error::Config(format!("Cannot build I/O pool: {}", e)))?;

        let results: Vec<EntryResult> = io_pool.install(|| {
            resolved
                .into_par_iter()
                .filter_map(|work| {
                    // No new work after cancellation; in-flight moves finish
                    if self.cancel.load(Ordering::SeqCst) {
                        return None;
                    }
                    let result = self.process_entry(&planner, work);
                    self.reporter.record(&result.outcome);
                    Some(result)
                })
                .collect()
        });

        if self.cancel.load(Ordering::SeqCst) {
            warn!(
                completed = results.len(),
                "Run cancelled, remaining entries were not admitted"
            );
        }

        Ok(results)
    }

    /// Plan and relocate one entry, converting every failure to an outcome
    fn process_entry(&self, planner: &Planner, work: ResolvedEntry) -> EntryResult {
        let ResolvedEntry {
            entry,
            resolved,
            fingerprint,
        } = work;

        let planned = match planner.plan(&entry.path, resolved.date, fingerprint) {
            Ok(p) => p,
            Err(e) => {
                warn!(path = %entry.path.display(), error = %e, "Planning failed");
                return EntryResult {
                    source: entry.path,
                    destination: None,
                    resolved: Some(resolved),
                    outcome: Outcome::Failed(e.to_string()),
                };
            }
        };

        match planned {
            Planned::Duplicate { existing } => EntryResult {
                source: entry.path,
                destination: Some(existing),
                resolved: Some(resolved),
                outcome: Outcome::SkippedDuplicate,
            },
            Planned::Relocate(plan) => {
                if self.config.dry_run {
                    info!(
                        source = %entry.path.display(),
                        dest = %plan.path.display(),
                        date_source = ?resolved.source,
                        "Would relocate (dry run)"
                    );
                    return EntryResult {
                        source: entry.path,
                        destination: Some(plan.path),
                        resolved: Some(resolved),
                        outcome: Outcome::Moved,
                    };
                }

                match relocate(&entry.path, &plan, self.config.operation) {
                    Ok(Relocated::Done) => {
                        info!(
                            source = %entry.path.display(),
                            dest = %plan.path.display(),
                            date_source = ?resolved.source,
                            "Relocated"
                        );
                        EntryResult {
                            source: entry.path,
                            destination: Some(plan.path),
                            resolved: Some(resolved),
                            outcome: Outcome::Moved,
                        }
                    }
                    Ok(Relocated::SourceVanished) => EntryResult {
                        source: entry.path,
                        destination: None,
                        resolved: Some(resolved),
                        outcome: Outcome::SkippedAlreadyProcessed,
                    },
                    Err(e) => {
                        warn!(path = %entry.path.display(), error = %e, "Relocation failed");
                        EntryResult {
                            source: entry.path,
                            destination: Some(plan.path),
                            resolved: Some(resolved),
                            outcome: Outcome::Failed(e.to_string()),
                        }
                    }
                }
            }
        }
    }

    /// Hash the source during the compute stage when the base destination
    /// name is already taken, so the I/O workers rarely hash anything.
    fn precompute_fingerprint(
        &self,
        dest_root: &Path,
        entry: &MediaEntry,
        resolved: ResolvedDate,
    ) -> Option<Fingerprint> {
        let filename = entry.path.file_name()?;
        let tentative = dest_root
            .join(resolved.date.format("%Y-%m-%d").to_string())
            .join(filename);
        if tentative.exists() {
            fingerprint_file(&entry.path).ok()
        } else {
            None
        }
    }

    /// Collect all eligible media files from the source tree
    fn collect_entries(&self, dest_root: &Path) -> Result<Vec<MediaEntry>> {
        let mut entries = Vec::new();

        for entry in WalkDir::new(&self.config.source_dir)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| !self.is_excluded_dir(e.path(), dest_root))
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            let Some(kind) = self.config.classify(ext) else {
                debug!(?path, "Ineligible extension, skipping");
                self.reporter.record_ineligible();
                continue;
            };

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    warn!(?path, error = %e, "Cannot stat file, skipping");
                    self.reporter.record_ineligible();
                    continue;
                }
            };

            entries.push(MediaEntry {
                path: path.to_path_buf(),
                kind,
                size: metadata.len(),
                modified: metadata.modified().ok(),
            });
        }

        Ok(entries)
    }

    /// Directories the walk must not descend into
    fn is_excluded_dir(&self, path: &Path, dest_root: &Path) -> bool {
        if path == self.config.source_dir {
            return false;
        }
        if !path.is_dir() {
            return false;
        }

        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");

        // Hidden and platform-sync directories
        if name.starts_with('.') || SYNC_DIR_NAMES.contains(&name) {
            debug!(?path, "Skipping hidden/sync directory");
            return true;
        }

        // A separate destination tree nested under the source
        if path == dest_root && dest_root != self.config.source_dir {
            debug!(?path, "Skipping destination root");
            return true;
        }

        // In-place organization: don't re-ingest date folders already
        // created under the destination root
        if path.parent() == Some(dest_root) && DATE_DIR.is_match(name) {
            debug!(?path, "Skipping already-organized date folder");
            return true;
        }

        // User-configured excludes: absolute prefixes or bare folder names
        for exclude in &self.config.exclude_dirs {
            if exclude.is_absolute() {
                if path.starts_with(exclude) {
                    debug!(?path, ?exclude, "Excluding directory (absolute path match)");
                    return true;
                }
            } else if let Some(exclude_name) = exclude.file_name()
                && path.file_name() == Some(exclude_name)
            {
                debug!(?path, ?exclude, "Excluding directory (folder name match)");
                return true;
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileOperation;
    use std::fs;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_file(path: &Path, content: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut f = fs::File::create(path).unwrap();
        f.write_all(content).unwrap();
    }

    /// Single-threaded config so outcome ordering is deterministic
    fn test_config(source: &Path, dest: &Path) -> Config {
        Config {
            source_dir: source.to_path_buf(),
            dest_dir: Some(dest.to_path_buf()),
            operation: FileOperation::Move,
            io_threads: 1,
            ..Config::default()
        }
    }

    fn run_scanner(config: Config) -> (Vec<EntryResult>, Arc<Reporter>) {
        let reporter = Arc::new(Reporter::new());
        let cancel = Arc::new(AtomicBool::new(false));
        let scanner = Scanner::new(config, reporter.clone(), cancel);
        let results = scanner.run().unwrap();
        (results, reporter)
    }

    #[test]
    fn test_moves_by_filename_date() {
        let src = tempdir().unwrap();
        let dest = tempdir().unwrap();
        write_file(&src.path().join("IMG_20230515_120000.jpg"), b"photo bytes");

        let (results, reporter) = run_scanner(test_config(src.path(), dest.path()));

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].outcome, Outcome::Moved);
        let landed = dest.path().join("2023-05-15").join("IMG_20230515_120000.jpg");
        assert!(landed.exists());
        assert!(reporter.snapshot().fully_accounted());
    }

    #[test]
    fn test_ineligible_files_are_tallied_separately() {
        let src = tempdir().unwrap();
        let dest = tempdir().unwrap();
        write_file(&src.path().join("notes.txt"), b"not media");
        write_file(&src.path().join("IMG_20230515_120000.jpg"), b"photo");

        let (results, reporter) = run_scanner(test_config(src.path(), dest.path()));

        assert_eq!(results.len(), 1);
        let snap = reporter.snapshot();
        assert_eq!(snap.ineligible, 1);
        assert_eq!(snap.eligible_total, 1);
        assert!(snap.fully_accounted());
        assert!(src.path().join("notes.txt").exists());
    }

    #[test]
    fn test_duplicate_content_same_name_skipped() {
        let src = tempdir().unwrap();
        let dest = tempdir().unwrap();
        // Same name and bytes in two subdirectories, same resolved date
        write_file(&src.path().join("a/IMG_20230515_120000.jpg"), b"same bytes");
        write_file(&src.path().join("b/IMG_20230515_120000.jpg"), b"same bytes");

        let (results, reporter) = run_scanner(test_config(src.path(), dest.path()));

        let moved = results.iter().filter(|r| r.outcome == Outcome::Moved).count();
        let dupes = results
            .iter()
            .filter(|r| r.outcome == Outcome::SkippedDuplicate)
            .count();
        assert_eq!((moved, dupes), (1, 1));

        // Exactly one copy in the destination tree
        let folder = dest.path().join("2023-05-15");
        let count = fs::read_dir(&folder).unwrap().count();
        assert_eq!(count, 1);
        assert!(reporter.snapshot().fully_accounted());
    }

    #[test]
    fn test_same_name_different_content_gets_suffix() {
        let src = tempdir().unwrap();
        let dest = tempdir().unwrap();
        write_file(&src.path().join("a/IMG_20230515_120000.jpg"), b"first bytes");
        write_file(&src.path().join("b/IMG_20230515_120000.jpg"), b"second bytes");

        let (results, _) = run_scanner(test_config(src.path(), dest.path()));

        assert!(results.iter().all(|r| r.outcome == Outcome::Moved));
        let folder = dest.path().join("2023-05-15");
        assert!(folder.join("IMG_20230515_120000.jpg").exists());
        assert!(folder.join("IMG_20230515_120000_1.jpg").exists());
    }

    #[test]
    fn test_rerun_over_organized_tree_is_idempotent() {
        let src = tempdir().unwrap();
        let dest = tempdir().unwrap();
        write_file(&src.path().join("IMG_20230515_120000.jpg"), b"photo bytes");
        write_file(&src.path().join("VID_20220101_080000.mp4"), b"video bytes");

        let (first, _) = run_scanner(test_config(src.path(), dest.path()));
        assert!(first.iter().all(|r| r.outcome == Outcome::Moved));

        // Re-supply identical sources and run again: everything must be a
        // duplicate, nothing overwritten or renamed
        write_file(&src.path().join("IMG_20230515_120000.jpg"), b"photo bytes");
        write_file(&src.path().join("VID_20220101_080000.mp4"), b"video bytes");

        let (second, reporter) = run_scanner(test_config(src.path(), dest.path()));
        assert!(
            second
                .iter()
                .all(|r| r.outcome == Outcome::SkippedDuplicate)
        );
        assert!(reporter.snapshot().fully_accounted());

        let folder = dest.path().join("2023-05-15");
        assert_eq!(fs::read_dir(&folder).unwrap().count(), 1);
    }

    #[test]
    fn test_in_place_organization_skips_date_folders() {
        let root = tempdir().unwrap();
        write_file(&root.path().join("IMG_20230515_120000.jpg"), b"photo bytes");
        // Output of a previous in-place run
        write_file(
            &root.path().join("2023-01-01/IMG_20230101_090000.jpg"),
            b"old bytes",
        );

        let mut config = test_config(root.path(), root.path());
        config.dest_dir = None; // In-place: dest defaults to source

        let (results, reporter) = run_scanner(config);

        // Only the loose file is processed; the organized one is untouched
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].outcome, Outcome::Moved);
        assert!(root.path().join("2023-05-15/IMG_20230515_120000.jpg").exists());
        assert!(root.path().join("2023-01-01/IMG_20230101_090000.jpg").exists());
        assert_eq!(reporter.snapshot().eligible_total, 1);
    }

    #[test]
    fn test_hidden_and_sync_dirs_are_pruned() {
        let src = tempdir().unwrap();
        let dest = tempdir().unwrap();
        write_file(&src.path().join(".hidden/IMG_20230515_120000.jpg"), b"x");
        write_file(&src.path().join("@eaDir/IMG_20230515_120000.jpg"), b"y");
        write_file(&src.path().join("keep/IMG_20230515_120000.jpg"), b"z");

        let (results, _) = run_scanner(test_config(src.path(), dest.path()));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, src.path().join("keep/IMG_20230515_120000.jpg"));
    }

    #[test]
    fn test_dry_run_moves_nothing() {
        let src = tempdir().unwrap();
        let dest = tempdir().unwrap();
        let source = src.path().join("IMG_20230515_120000.jpg");
        write_file(&source, b"photo bytes");

        let mut config = test_config(src.path(), dest.path());
        config.dry_run = true;

        let (results, _) = run_scanner(config);
        assert_eq!(results[0].outcome, Outcome::Moved);
        assert!(source.exists());
        assert!(!dest.path().join("2023-05-15").exists());
    }

    #[test]
    fn test_copy_operation_keeps_sources() {
        let src = tempdir().unwrap();
        let dest = tempdir().unwrap();
        let source = src.path().join("IMG_20230515_120000.jpg");
        write_file(&source, b"photo bytes");

        let mut config = test_config(src.path(), dest.path());
        config.operation = FileOperation::Copy;

        let (results, _) = run_scanner(config);
        assert_eq!(results[0].outcome, Outcome::Moved);
        assert!(source.exists());
        assert!(dest.path().join("2023-05-15/IMG_20230515_120000.jpg").exists());
    }

    #[test]
    fn test_cancelled_run_admits_no_work() {
        let src = tempdir().unwrap();
        let dest = tempdir().unwrap();
        write_file(&src.path().join("IMG_20230515_120000.jpg"), b"photo bytes");

        let reporter = Arc::new(Reporter::new());
        let cancel = Arc::new(AtomicBool::new(true));
        let scanner = Scanner::new(test_config(src.path(), dest.path()), reporter, cancel);
        let results = scanner.run().unwrap();

        assert!(results.is_empty());
        assert!(!dest.path().join("2023-05-15").exists());
    }

    #[test]
    fn test_conflicting_thread_configs_do_not_panic() {
        let src = tempdir().unwrap();
        let dest = tempdir().unwrap();
        write_file(&src.path().join("IMG_20230515_120000.jpg"), b"photo");

        let mut first = test_config(src.path(), dest.path());
        first.threads = 2;
        let (results, _) = run_scanner(first);
        assert_eq!(results.len(), 1);

        // A second run asking for a different global pool size must keep
        // working with whatever pool already exists
        write_file(&src.path().join("IMG_20230516_120000.jpg"), b"photo two");
        let mut second = test_config(src.path(), dest.path());
        second.threads = 3;
        let (results, _) = run_scanner(second);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].outcome, Outcome::Moved);
    }

    #[test]
    fn test_mtime_fallback_scenario() {
        let src = tempdir().unwrap();
        let dest = tempdir().unwrap();
        let clip = src.path().join("clip.mp4");
        write_file(&clip, b"no metadata");
        // 2022-01-01 00:00:00 UTC
        filetime::set_file_mtime(&clip, filetime::FileTime::from_unix_time(1_640_995_200, 0))
            .unwrap();

        let (results, _) = run_scanner(test_config(src.path(), dest.path()));

        assert_eq!(results[0].outcome, Outcome::Moved);
        let resolved = results[0].resolved.unwrap();
        assert_eq!(resolved.source, crate::date::DateSource::FileSystem);
        // The landed folder matches the mtime's local date
        let dest_path = results[0].destination.as_ref().unwrap();
        assert!(dest_path.exists());
        assert!(dest_path.ends_with(
            PathBuf::from(resolved.date.format("%Y-%m-%d").to_string()).join("clip.mp4")
        ));
    }
}
