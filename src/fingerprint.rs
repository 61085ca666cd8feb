//! SHA-256 content fingerprinting for duplicate detection
//!
//! Files are read in fixed-size chunks so memory stays constant no matter
//! how large the file is. Fingerprints are compared for equality only and
//! never persisted beyond the run.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::trace;

/// Chunk size for streaming reads (64 KiB)
const CHUNK_SIZE: usize = 64 * 1024;

/// Content fingerprint of a file, usable only for equality comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Hex rendering for log output
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// Compute the content fingerprint of a file with a streaming read
pub fn fingerprint_file(path: &Path) -> Result<Fingerprint> {
    let mut file = File::open(path).map_err(|e| Error::Fingerprint {
        path: path.to_path_buf(),
        message: format!("Failed to open file: {}", e),
    })?;

    let mut hasher = Sha256::new();
    let mut buffer = [0u8; CHUNK_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer).map_err(|e| Error::Fingerprint {
            path: path.to_path_buf(),
            message: format!("Failed to read file: {}", e),
        })?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    let digest = Fingerprint(hasher.finalize().into());
    trace!(?path, hash = %digest.to_hex(), "Computed content fingerprint");
    Ok(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_same_content_same_fingerprint() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"test content").unwrap();
        file.flush().unwrap();

        let mut file2 = NamedTempFile::new().unwrap();
        file2.write_all(b"test content").unwrap();
        file2.flush().unwrap();

        let a = fingerprint_file(file.path()).unwrap();
        let b = fingerprint_file(file2.path()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_content_different_fingerprint() {
        let mut file1 = NamedTempFile::new().unwrap();
        file1.write_all(b"content 1").unwrap();
        file1.flush().unwrap();

        let mut file2 = NamedTempFile::new().unwrap();
        file2.write_all(b"content 2").unwrap();
        file2.flush().unwrap();

        let a = fingerprint_file(file1.path()).unwrap();
        let b = fingerprint_file(file2.path()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_large_file_spans_chunks() {
        let mut file = NamedTempFile::new().unwrap();
        let data = vec![0xabu8; CHUNK_SIZE * 2 + 17];
        file.write_all(&data).unwrap();
        file.flush().unwrap();

        // Known answer: sha256 of the same bytes hashed in one shot
        let expected = Fingerprint(Sha256::digest(&data).into());
        assert_eq!(fingerprint_file(file.path()).unwrap(), expected);
    }

    #[test]
    fn test_missing_file_errors() {
        let result = fingerprint_file(Path::new("/nonexistent/file.jpg"));
        assert!(result.is_err());
    }
}
