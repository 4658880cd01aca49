//! Build inputs, outputs and errors.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::stack::Stack;
use crate::util::hash::{ContentHash, HashError, hash_file};

/// Everything a strategy needs to build one stack.
///
/// Compared and hashed by value; the cache decorator keys on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct BuildConfig {
  pub source_dir: PathBuf,
  pub output_path: PathBuf,
  pub runtime: String,
  /// Entry point relative to `source_dir` (`.` for the directory itself).
  pub handler: String,
  pub env: BTreeMap<String, String>,
}

impl BuildConfig {
  pub fn for_stack(stack: &Stack, build_dir: &Path) -> Self {
    Self {
      source_dir: stack.absolute_path.clone(),
      output_path: stack.artifact_path(build_dir),
      runtime: stack.runtime.clone(),
      handler: stack.handler_in_stack(),
      env: stack.env.clone(),
    }
  }
}

/// A finished build output on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
  pub path: PathBuf,
  pub checksum: ContentHash,
  pub size_bytes: u64,
}

impl Artifact {
  /// Describe a file that already exists: checksum and size are read from disk.
  pub fn from_file(path: &Path) -> Result<Self, BuildError> {
    let checksum = hash_file(path)?;
    let size_bytes = std::fs::metadata(path)?.len();
    Ok(Self {
      path: path.to_path_buf(),
      checksum,
      size_bytes,
    })
  }

  pub fn size_mb(&self) -> f64 {
    self.size_bytes as f64 / 1024.0 / 1024.0
  }
}

/// Errors that can occur while building an artifact.
#[derive(Debug, Error)]
pub enum BuildError {
  #[error("unsupported runtime: {0}")]
  UnsupportedRuntime(String),

  #[error("{tool} failed with exit code {code:?}: {stderr}")]
  ToolFailed {
    tool: String,
    code: Option<i32>,
    stderr: String,
  },

  #[error("failed to run {tool}: {source}")]
  ToolSpawn {
    tool: String,
    #[source]
    source: std::io::Error,
  },

  #[error("required file not found: {}", .0.display())]
  MissingFile(PathBuf),

  #[error("no jar found in {}", .0.display())]
  NoJar(PathBuf),

  #[error("archive error: {0}")]
  Archive(#[from] zip::result::ZipError),

  #[error("checksum error: {0}")]
  Hash(#[from] HashError),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("build cancelled")]
  Cancelled,

  #[error("build task failed: {0}")]
  Join(String),
}

pub type BuildResult = Result<Artifact, BuildError>;

pub type BuildFuture = Pin<Box<dyn Future<Output = BuildResult> + Send>>;

/// A build strategy. Cheap to clone; shared between the registry and decorators.
pub type BuildFunc = Arc<dyn Fn(CancellationToken, BuildConfig) -> BuildFuture + Send + Sync>;

/// Lift an async function into a [`BuildFunc`].
pub fn build_fn<F, Fut>(f: F) -> BuildFunc
where
  F: Fn(CancellationToken, BuildConfig) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = BuildResult> + Send + 'static,
{
  Arc::new(move |cancel, cfg| Box::pin(f(cancel, cfg)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::stack;
  use tempfile::TempDir;

  #[test]
  fn config_for_stack() {
    let root = Path::new("/p");
    let mut s = stack(root, "api", "go1.x", &[]);
    s.env.insert("MODE".to_string(), "fast".to_string());

    let cfg = BuildConfig::for_stack(&s, &root.join(".forge/build"));

    assert_eq!(cfg.source_dir, root.join("api"));
    assert_eq!(cfg.output_path, root.join(".forge/build/api/bootstrap"));
    assert_eq!(cfg.handler, ".");
    assert_eq!(cfg.env.get("MODE").map(String::as_str), Some("fast"));
  }

  #[test]
  fn artifact_from_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("lambda.zip");
    std::fs::write(&path, vec![0u8; 2048]).unwrap();

    let artifact = Artifact::from_file(&path).unwrap();

    assert_eq!(artifact.size_bytes, 2048);
    assert_eq!(artifact.checksum.0.len(), 64);
    assert_eq!(artifact.path, path);
  }

  #[test]
  fn missing_artifact_is_an_error() {
    let temp = TempDir::new().unwrap();
    assert!(Artifact::from_file(&temp.path().join("nope")).is_err());
  }
}
