//! File relocation with atomic placement
//!
//! The destination path only ever appears as a complete file: moves use an
//! atomic rename when source and destination share a filesystem, and fall
//! back to copying into a `.part` sibling that is renamed into place once
//! fully written. A failed copy removes its partial file, so later planning
//! checks never observe a half-written destination.

use crate::config::FileOperation;
use crate::error::{Error, Result};
use crate::plan::DestinationPlan;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Buffer size for copy I/O (256 KiB)
const COPY_BUF_SIZE: usize = 256 * 1024;

/// Result of a relocation attempt that did not fail outright
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relocated {
    /// File now lives at the planned destination
    Done,
    /// Source disappeared before the move - another path already claimed it
    SourceVanished,
}

/// Execute a destination plan by moving or copying the source file
pub fn relocate(source: &Path, plan: &DestinationPlan, operation: FileOperation) -> Result<Relocated> {
    // Double-check the source right before touching the disk; files can
    // vanish between scan and relocation.
    if !source.exists() {
        warn!(?source, "Source vanished before relocation, skipping");
        return Ok(Relocated::SourceVanished);
    }

    if let Some(parent) = plan.path.parent() {
        fs::create_dir_all(parent).map_err(|e| relocation_error(source, "create folder", e))?;
    }

    // Capture before the move; the source may not exist afterwards
    let source_mtime = fs::metadata(source)
        .and_then(|m| m.modified())
        .ok()
        .map(filetime::FileTime::from_system_time);

    match operation {
        FileOperation::Move => {
            // Rename is atomic and cheap on the same filesystem
            if fs::rename(source, &plan.path).is_err() {
                copy_via_tempfile(source, &plan.path)?;
                fs::remove_file(source)
                    .map_err(|e| relocation_error(source, "remove source after copy", e))?;
            }
        }
        FileOperation::Copy => {
            copy_via_tempfile(source, &plan.path)?;
        }
    }

    if let Some(mtime) = source_mtime {
        let _ = filetime::set_file_mtime(&plan.path, mtime);
    }
    debug!(?source, dest = ?plan.path, "Relocated file");
    Ok(Relocated::Done)
}

/// Copy with buffered I/O into a `.part` sibling, then rename into place
fn copy_via_tempfile(source: &Path, dest: &Path) -> Result<()> {
    let temp = dest.with_extension(match dest.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}.part", ext),
        None => "part".to_string(),
    });

    let result = copy_contents(source, &temp).and_then(|_| {
        fs::rename(&temp, dest).map_err(|e| relocation_error(source, "finalize destination", e))
    });

    if result.is_err() {
        let _ = fs::remove_file(&temp);
    }
    result
}

fn copy_contents(source: &Path, dest: &Path) -> Result<()> {
    let src_file = File::open(source).map_err(|e| relocation_error(source, "open source", e))?;
    let dest_file = File::create(dest).map_err(|e| relocation_error(source, "create destination", e))?;

    let mut reader = BufReader::with_capacity(COPY_BUF_SIZE, src_file);
    let mut writer = BufWriter::with_capacity(COPY_BUF_SIZE, dest_file);

    let mut buffer = vec![0u8; COPY_BUF_SIZE];
    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .map_err(|e| relocation_error(source, "read source", e))?;
        if bytes_read == 0 {
            break;
        }
        writer
            .write_all(&buffer[..bytes_read])
            .map_err(|e| relocation_error(source, "write destination", e))?;
    }

    writer
        .flush()
        .map_err(|e| relocation_error(source, "flush destination", e))?;
    Ok(())
}

fn relocation_error(source: &Path, action: &str, e: std::io::Error) -> Error {
    Error::Relocation {
        path: source.to_path_buf(),
        message: format!("Failed to {}: {}", action, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::DestinationPlan;
    use std::io::Write;
    use tempfile::tempdir;

    fn plan_for(dir: &Path, name: &str) -> DestinationPlan {
        let folder = dir.join("2023-05-15");
        DestinationPlan {
            path: folder.join(name),
            folder,
        }
    }

    #[test]
    fn test_move_relocates_file() {
        let src_dir = tempdir().unwrap();
        let dest_dir = tempdir().unwrap();
        let source = src_dir.path().join("photo.jpg");
        fs::File::create(&source).unwrap().write_all(b"bytes").unwrap();

        let plan = plan_for(dest_dir.path(), "photo.jpg");
        let result = relocate(&source, &plan, FileOperation::Move).unwrap();

        assert_eq!(result, Relocated::Done);
        assert!(!source.exists());
        assert_eq!(fs::read(&plan.path).unwrap(), b"bytes");
    }

    #[test]
    fn test_copy_keeps_source() {
        let src_dir = tempdir().unwrap();
        let dest_dir = tempdir().unwrap();
        let source = src_dir.path().join("clip.mp4");
        fs::File::create(&source).unwrap().write_all(b"video").unwrap();

        let plan = plan_for(dest_dir.path(), "clip.mp4");
        let result = relocate(&source, &plan, FileOperation::Copy).unwrap();

        assert_eq!(result, Relocated::Done);
        assert!(source.exists());
        assert_eq!(fs::read(&plan.path).unwrap(), b"video");
        // No .part leftover
        assert!(!plan.folder.join("clip.mp4.part").exists());
    }

    #[test]
    fn test_vanished_source_is_skipped() {
        let dest_dir = tempdir().unwrap();
        let plan = plan_for(dest_dir.path(), "gone.jpg");
        let result = relocate(Path::new("/nonexistent/gone.jpg"), &plan, FileOperation::Move).unwrap();
        assert_eq!(result, Relocated::SourceVanished);
        assert!(!plan.path.exists());
    }

    #[test]
    fn test_copy_preserves_mtime() {
        let src_dir = tempdir().unwrap();
        let dest_dir = tempdir().unwrap();
        let source = src_dir.path().join("old.jpg");
        fs::File::create(&source).unwrap().write_all(b"x").unwrap();
        let mtime = filetime::FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(&source, mtime).unwrap();

        let plan = plan_for(dest_dir.path(), "old.jpg");
        relocate(&source, &plan, FileOperation::Copy).unwrap();

        let dest_mtime = filetime::FileTime::from_last_modification_time(
            &fs::metadata(&plan.path).unwrap(),
        );
        assert_eq!(dest_mtime.unix_seconds(), 1_600_000_000);
    }
}
