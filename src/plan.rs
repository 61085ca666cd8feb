//! Destination planning with per-folder serialization
//!
//! The planner is the single authority for destination paths. Planning for
//! a given date folder runs under that folder's lock, and every issued path
//! is recorded in an in-run claim map keyed by destination with the
//! claiming source, so two entries resolved concurrently can never receive
//! the same path even before either file lands on disk, and an identical
//! in-flight file is still detected as a duplicate.

use crate::error::{Error, Result};
use crate::fingerprint::{Fingerprint, fingerprint_file};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Upper bound on suffix probing before planning gives up
const MAX_SUFFIX: u32 = 10_000;

/// A finalized, collision-free target path for one source file
#[derive(Debug, Clone)]
pub struct DestinationPlan {
    /// Date folder under the destination root, e.g. `2023-05-15`
    pub folder: PathBuf,
    /// Final unique path inside the folder
    pub path: PathBuf,
}

/// Outcome of planning a single entry
#[derive(Debug, Clone)]
pub enum Planned {
    /// A unique destination was claimed; relocation may proceed
    Relocate(DestinationPlan),
    /// Identical content already exists at the destination
    Duplicate { existing: PathBuf },
}

/// Serialized destination-path authority for one run
pub struct Planner {
    dest_root: PathBuf,
    dry_run: bool,
    folder_locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
    claimed: Mutex<HashMap<PathBuf, PathBuf>>,
}

impl Planner {
    pub fn new(dest_root: PathBuf, dry_run: bool) -> Self {
        Self {
            dest_root,
            dry_run,
            folder_locks: Mutex::new(HashMap::new()),
            claimed: Mutex::new(HashMap::new()),
        }
    }

    /// Plan a destination for `source` under its resolved date folder
    ///
    /// If a same-named file with identical content already exists (at the
    /// base name or any occupied suffix candidate), the entry is reported
    /// as a duplicate instead of receiving a plan. A fingerprint computed
    /// during the compute stage can be passed in to keep hashing off the
    /// I/O workers; otherwise one is computed lazily on first collision.
    pub fn plan(
        &self,
        source: &Path,
        date: NaiveDate,
        precomputed: Option<Fingerprint>,
    ) -> Result<Planned> {
        let folder = self.dest_root.join(date.format("%Y-%m-%d").to_string());
        let folder_lock = self.lock_for(&folder);
        let _guard = folder_lock.lock().unwrap();

        if !self.dry_run {
            fs::create_dir_all(&folder).map_err(|e| Error::Planning {
                path: source.to_path_buf(),
                message: format!("Cannot create {}: {}", folder.display(), e),
            })?;
        }

        let filename = source
            .file_name()
            .and_then(|f| f.to_str())
            .ok_or_else(|| Error::Planning {
                path: source.to_path_buf(),
                message: "Invalid source filename".into(),
            })?;

        let (stem, ext) = split_name(filename);

        // Fingerprint the source only when a collision forces it
        let mut source_print = precomputed;

        let mut candidate = folder.join(filename);
        for suffix in 0..=MAX_SUFFIX {
            let on_disk = candidate.exists();
            let claimant = if on_disk {
                None
            } else {
                self.claimed.lock().unwrap().get(&candidate).cloned()
            };

            if !on_disk && claimant.is_none() {
                self.claimed
                    .lock()
                    .unwrap()
                    .insert(candidate.clone(), source.to_path_buf());
                debug!(?source, dest = ?candidate, "Claimed destination path");
                return Ok(Planned::Relocate(DestinationPlan {
                    folder,
                    path: candidate,
                }));
            }

            // Re-check content equality at every occupied candidate,
            // whether the occupant is already on disk or still in flight
            // under an in-run claim, so an identical file relocated by an
            // earlier run or planned moments ago still short-circuits as
            // a duplicate.
            if source_print.is_none() {
                source_print = Some(fingerprint_file(source)?);
            }
            let occupant_print = match &claimant {
                // The claimant may have landed under its claimed name by now
                Some(claim_source) => fingerprint_file(claim_source)
                    .or_else(|_| fingerprint_file(&candidate))
                    .ok(),
                None => fingerprint_file(&candidate).ok(),
            };
            if let Some(sp) = &source_print
                && let Some(existing_print) = occupant_print
                && existing_print == *sp
            {
                debug!(?source, existing = ?candidate, "Identical content already organized");
                return Ok(Planned::Duplicate {
                    existing: candidate,
                });
            }

            candidate = folder.join(format!("{}_{}{}", stem, suffix + 1, ext));
        }

        Err(Error::Planning {
            path: source.to_path_buf(),
            message: "Could not find a free destination name".into(),
        })
    }

    fn lock_for(&self, folder: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.folder_locks.lock().unwrap();
        locks
            .entry(folder.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Split a filename into stem and dot-prefixed extension
fn split_name(filename: &str) -> (&str, String) {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{}", ext)),
        _ => (filename, String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_file(path: &Path, content: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut f = fs::File::create(path).unwrap();
        f.write_all(content).unwrap();
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 5, 15).unwrap()
    }

    #[test]
    fn test_plan_fresh_name() {
        let src_dir = tempdir().unwrap();
        let dest_dir = tempdir().unwrap();
        let source = src_dir.path().join("photo.jpg");
        write_file(&source, b"bytes");

        let planner = Planner::new(dest_dir.path().to_path_buf(), false);
        let Planned::Relocate(plan) = planner.plan(&source, date(), None).unwrap() else {
            panic!("expected a relocation plan");
        };
        assert_eq!(plan.path, dest_dir.path().join("2023-05-15").join("photo.jpg"));
        assert!(plan.folder.is_dir());
    }

    #[test]
    fn test_identical_existing_is_duplicate() {
        let src_dir = tempdir().unwrap();
        let dest_dir = tempdir().unwrap();
        let source = src_dir.path().join("photo.jpg");
        write_file(&source, b"same bytes");
        let existing = dest_dir.path().join("2023-05-15").join("photo.jpg");
        write_file(&existing, b"same bytes");

        let planner = Planner::new(dest_dir.path().to_path_buf(), false);
        let Planned::Duplicate { existing: found } = planner.plan(&source, date(), None).unwrap() else {
            panic!("expected a duplicate");
        };
        assert_eq!(found, existing);
    }

    #[test]
    fn test_conflicting_content_gets_smallest_suffix() {
        let src_dir = tempdir().unwrap();
        let dest_dir = tempdir().unwrap();
        let source = src_dir.path().join("photo.jpg");
        write_file(&source, b"new bytes");
        let folder = dest_dir.path().join("2023-05-15");
        write_file(&folder.join("photo.jpg"), b"other bytes");
        write_file(&folder.join("photo_1.jpg"), b"more bytes");

        let planner = Planner::new(dest_dir.path().to_path_buf(), false);
        let Planned::Relocate(plan) = planner.plan(&source, date(), None).unwrap() else {
            panic!("expected a relocation plan");
        };
        assert_eq!(plan.path, folder.join("photo_2.jpg"));
    }

    #[test]
    fn test_identical_under_suffixed_name_is_duplicate() {
        let src_dir = tempdir().unwrap();
        let dest_dir = tempdir().unwrap();
        let source = src_dir.path().join("photo.jpg");
        write_file(&source, b"same bytes");
        let folder = dest_dir.path().join("2023-05-15");
        write_file(&folder.join("photo.jpg"), b"other bytes");
        // An earlier run already relocated identical content under _1
        write_file(&folder.join("photo_1.jpg"), b"same bytes");

        let planner = Planner::new(dest_dir.path().to_path_buf(), false);
        let Planned::Duplicate { existing } = planner.plan(&source, date(), None).unwrap() else {
            panic!("expected a duplicate");
        };
        assert_eq!(existing, folder.join("photo_1.jpg"));
    }

    #[test]
    fn test_identical_content_claimed_but_not_landed_is_duplicate() {
        let src_dir = tempdir().unwrap();
        let dest_dir = tempdir().unwrap();
        let a = src_dir.path().join("a/photo.jpg");
        let b = src_dir.path().join("b/photo.jpg");
        write_file(&a, b"same bytes");
        write_file(&b, b"same bytes");

        // Both planned before either relocation lands on disk: the second
        // must be recognized as a duplicate of the in-flight claim, not
        // handed a suffixed path of its own.
        let planner = Planner::new(dest_dir.path().to_path_buf(), false);
        let Planned::Relocate(plan_a) = planner.plan(&a, date(), None).unwrap() else {
            panic!("expected a relocation plan");
        };
        let Planned::Duplicate { existing } = planner.plan(&b, date(), None).unwrap() else {
            panic!("expected a duplicate");
        };
        assert_eq!(existing, plan_a.path);
    }

    #[test]
    fn test_concurrent_claims_are_unique() {
        let src_dir = tempdir().unwrap();
        let dest_dir = tempdir().unwrap();
        let a = src_dir.path().join("a/photo.jpg");
        let b = src_dir.path().join("b/photo.jpg");
        write_file(&a, b"content a");
        write_file(&b, b"content b");

        // Same name, same date, neither on disk yet: the claimed set must
        // keep the second plan off the first plan's path.
        let planner = Planner::new(dest_dir.path().to_path_buf(), false);
        let Planned::Relocate(plan_a) = planner.plan(&a, date(), None).unwrap() else {
            panic!("expected a relocation plan");
        };
        let Planned::Relocate(plan_b) = planner.plan(&b, date(), None).unwrap() else {
            panic!("expected a relocation plan");
        };
        assert_ne!(plan_a.path, plan_b.path);
        assert_eq!(plan_b.path, dest_dir.path().join("2023-05-15").join("photo_1.jpg"));
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let src_dir = tempdir().unwrap();
        let dest_dir = tempdir().unwrap();
        let source = src_dir.path().join("photo.jpg");
        write_file(&source, b"bytes");

        let planner = Planner::new(dest_dir.path().to_path_buf(), true);
        let Planned::Relocate(plan) = planner.plan(&source, date(), None).unwrap() else {
            panic!("expected a relocation plan");
        };
        assert!(!plan.folder.exists());
    }

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("photo.jpg"), ("photo", ".jpg".to_string()));
        assert_eq!(split_name("archive.tar"), ("archive", ".tar".to_string()));
        assert_eq!(split_name("noext"), ("noext", String::new()));
        assert_eq!(split_name(".hidden"), (".hidden", String::new()));
    }
}
