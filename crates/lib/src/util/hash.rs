//! SHA-256 hashing for artifact checksums.

use std::fs;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A full 64-character SHA-256 hash of a file's contents.
///
/// Lowercase hexadecimal. Used as the artifact checksum and for change
/// detection between builds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, thiserror::Error)]
#[error("failed to read file {path}: {source}")]
pub struct HashError {
  pub path: String,
  #[source]
  pub source: std::io::Error,
}

/// Hash a file's contents, streaming it in 8 KiB chunks.
pub fn hash_file(path: &Path) -> Result<ContentHash, HashError> {
  let read_err = |source| HashError {
    path: path.display().to_string(),
    source,
  };

  let mut file = fs::File::open(path).map_err(read_err)?;
  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let bytes_read = file.read(&mut buffer).map_err(read_err)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(ContentHash(hex::encode(hasher.finalize())))
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
  let mut hasher = Sha256::new();
  hasher.update(data);
  ContentHash(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[test]
  fn file_hash_matches_bytes_hash() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("artifact");
    fs::write(&path, b"bootstrap contents").unwrap();

    assert_eq!(hash_file(&path).unwrap(), hash_bytes(b"bootstrap contents"));
  }

  #[test]
  fn known_digest() {
    assert_eq!(
      hash_bytes(b"").0,
      "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
  }

  #[test]
  fn hash_changes_with_content() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("file");
    fs::write(&path, "one").unwrap();
    let first = hash_file(&path).unwrap();
    fs::write(&path, "two").unwrap();
    let second = hash_file(&path).unwrap();

    assert_ne!(first, second);
    assert_eq!(first.0.len(), 64);
  }

  #[test]
  fn missing_file_reports_path() {
    let temp = tempdir().unwrap();
    let err = hash_file(&temp.path().join("nope")).unwrap_err();
    assert!(err.to_string().contains("nope"));
  }
}
