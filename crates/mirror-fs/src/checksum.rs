//! SHA-256 checksums of mirror documents
//!
//! Mirror files are compared by checksum before being rewritten so that an
//! unchanged export leaves the file (and its modification time) untouched.

use sha2::{Digest, Sha256};
use std::path::Path;

const PREFIX: &str = "sha256:";

/// Checksum of rendered document content, as `"sha256:<hex>"`.
pub fn compute_content_checksum(content: &[u8]) -> String {
    format!("{}{:x}", PREFIX, Sha256::digest(content))
}

/// Checksum of a file already on disk.
pub fn compute_file_checksum(path: &Path) -> std::io::Result<String> {
    std::fs::read(path).map(|content| compute_content_checksum(&content))
}

/// True when `path` exists and holds exactly `content`.
///
/// A missing file never matches.
pub fn file_matches(path: &Path, content: &[u8]) -> std::io::Result<bool> {
    if !path.is_file() {
        return Ok(false);
    }
    Ok(compute_file_checksum(path)? == compute_content_checksum(content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_checksum_known_value() {
        assert_eq!(
            compute_content_checksum(b"hello world"),
            "sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn rewritten_document_no_longer_matches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Colours.yaml");
        assert!(!file_matches(&path, b"key: abc").unwrap());

        std::fs::write(&path, "key: abc").unwrap();
        assert!(file_matches(&path, b"key: abc").unwrap());
        assert!(!file_matches(&path, b"key: abd").unwrap());
    }
}
