//! Stack declarations, the validated `Stack` value and discovery errors.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{ARCHIVE_FILE, BOOTSTRAP_FILE, SUPPORTED_RUNTIMES};

/// An independently deployable unit of the project.
///
/// Created by discovery and never mutated afterwards. `dependencies` holds
/// resolved stack names once discovery has finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stack {
  pub name: String,
  /// Directory of the stack relative to the project root.
  pub relative_path: PathBuf,
  pub absolute_path: PathBuf,
  pub runtime: String,
  /// Entry point, relative to the project root. Defaults to the stack directory.
  pub handler: String,
  pub description: Option<String>,
  pub dependencies: Vec<String>,
  /// Build-time environment forwarded to the builder.
  pub env: BTreeMap<String, String>,
}

impl Stack {
  pub fn build_target(&self) -> BuildTarget {
    build_target(&self.runtime)
  }

  pub fn needs_build(&self) -> bool {
    needs_build(&self.runtime)
  }

  /// Where this stack's artifact lives inside `build_dir`.
  ///
  /// Bootstrap runtimes get a directory per stack (`<name>/bootstrap`),
  /// bundled runtimes a single archive (`<name>.zip`).
  pub fn artifact_path(&self, build_dir: &Path) -> PathBuf {
    match self.build_target() {
      BuildTarget::Bootstrap => build_dir.join(&self.name).join(BOOTSTRAP_FILE),
      BuildTarget::Archive => build_dir.join(format!("{}.zip", self.name)),
    }
  }

  /// The handler as a path relative to the stack directory.
  ///
  /// The default handler (the stack's own directory) becomes `.`.
  pub fn handler_in_stack(&self) -> String {
    let handler = Path::new(&self.handler);
    match handler.strip_prefix(&self.relative_path) {
      Ok(rest) if rest.as_os_str().is_empty() => ".".to_string(),
      Ok(rest) => rest.to_string_lossy().replace('\\', "/"),
      Err(_) => self.handler.clone(),
    }
  }
}

/// The kind of artifact a runtime produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildTarget {
  /// A compiled `bootstrap` executable.
  Bootstrap,
  /// A `lambda.zip` bundle.
  Archive,
}

impl BuildTarget {
  pub fn file_name(self) -> &'static str {
    match self {
      BuildTarget::Bootstrap => BOOTSTRAP_FILE,
      BuildTarget::Archive => ARCHIVE_FILE,
    }
  }
}

impl std::fmt::Display for BuildTarget {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.file_name())
  }
}

/// Ahead-of-time compiled runtimes ship a `bootstrap` binary, everything else a zip.
pub fn build_target(runtime: &str) -> BuildTarget {
  if runtime.starts_with("go") {
    BuildTarget::Bootstrap
  } else {
    BuildTarget::Archive
  }
}

/// Whether the runtime compiles or bundles sources.
///
/// `provided.*` custom runtimes ship a pre-built bootstrap and need no build.
pub fn needs_build(runtime: &str) -> bool {
  ["go", "python", "nodejs", "java"]
    .iter()
    .any(|prefix| runtime.starts_with(prefix))
}

pub fn is_supported_runtime(runtime: &str) -> bool {
  SUPPORTED_RUNTIMES.contains(&runtime)
}

/// Check a stack's required fields and runtime.
pub fn validate_stack(stack: &Stack) -> Result<(), StackError> {
  if stack.name.trim().is_empty() {
    return Err(StackError::MissingName {
      path: stack.relative_path.clone(),
    });
  }
  if stack.runtime.trim().is_empty() {
    return Err(StackError::MissingRuntime {
      name: stack.name.clone(),
    });
  }
  if !is_supported_runtime(&stack.runtime) {
    return Err(StackError::UnsupportedRuntime {
      name: stack.name.clone(),
      runtime: stack.runtime.clone(),
    });
  }
  Ok(())
}

/// On-disk shape of `stack.forge.toml`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct StackFile {
  pub stack: StackDecl,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct StackDecl {
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub runtime: String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub handler: Option<String>,
  #[serde(default, alias = "after")]
  pub dependencies: Vec<String>,
  #[serde(default)]
  pub env: BTreeMap<String, String>,
}

/// Errors raised while discovering, validating or ordering stacks.
#[derive(Debug, Error)]
pub enum StackError {
  #[error("stack name is required (in {})", .path.display())]
  MissingName { path: PathBuf },

  #[error("stack {name}: runtime is required")]
  MissingRuntime { name: String },

  #[error("stack {name}: unsupported runtime: {runtime} (supported: {})", SUPPORTED_RUNTIMES.join(", "))]
  UnsupportedRuntime { name: String, runtime: String },

  #[error("cyclic dependency: {}", .path.join(" -> "))]
  CyclicDependency { path: Vec<String> },

  #[error("stack {stack} depends on unknown stack {dependency}")]
  UnknownDependency { stack: String, dependency: String },

  #[error("duplicate stack name {name} in {} and {}", .first.display(), .second.display())]
  DuplicateName {
    name: String,
    first: PathBuf,
    second: PathBuf,
  },

  #[error("no stacks found under {}", .0.display())]
  NoStacks(PathBuf),

  #[error("failed to parse {}: {source}", .path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("failed to read {}: {source}", .path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to walk project directory: {0}")]
  Walk(#[from] walkdir::Error),

  #[error("{} invalid stack(s): {}", .0.len(), join_errors(.0))]
  InvalidStacks(Vec<StackError>),
}

fn join_errors(errors: &[StackError]) -> String {
  errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::stack;

  #[test]
  fn accepts_every_supported_runtime() {
    for runtime in SUPPORTED_RUNTIMES {
      let s = stack(Path::new("/p"), "api", runtime, &[]);
      assert!(validate_stack(&s).is_ok(), "{runtime} should be accepted");
    }
  }

  #[test]
  fn rejects_missing_name() {
    let s = stack(Path::new("/p"), "", "go1.x", &[]);
    assert!(matches!(validate_stack(&s), Err(StackError::MissingName { .. })));
  }

  #[test]
  fn rejects_missing_runtime() {
    let s = stack(Path::new("/p"), "api", "", &[]);
    assert!(matches!(validate_stack(&s), Err(StackError::MissingRuntime { .. })));
  }

  #[test]
  fn unsupported_runtime_names_the_runtime() {
    let s = stack(Path::new("/p"), "legacy", "ruby3.2", &[]);
    let err = validate_stack(&s).unwrap_err();
    assert!(matches!(err, StackError::UnsupportedRuntime { .. }));
    assert!(err.to_string().contains("ruby3.2"));
  }

  #[test]
  fn validation_does_not_mutate() {
    let s = stack(Path::new("/p"), "api", "go1.x", &["shared"]);
    let before = s.clone();
    validate_stack(&s).unwrap();
    assert_eq!(s, before);
  }

  #[test]
  fn build_target_by_runtime_family() {
    assert_eq!(build_target("go1.x"), BuildTarget::Bootstrap);
    assert_eq!(build_target("python3.13"), BuildTarget::Archive);
    assert_eq!(build_target("nodejs20.x"), BuildTarget::Archive);
    assert_eq!(build_target("provided.al2023"), BuildTarget::Archive);
    assert_eq!(BuildTarget::Bootstrap.to_string(), "bootstrap");
    assert_eq!(BuildTarget::Archive.to_string(), "lambda.zip");
  }

  #[test]
  fn needs_build_by_runtime_family() {
    assert!(needs_build("go1.x"));
    assert!(needs_build("python3.12"));
    assert!(needs_build("nodejs18.x"));
    assert!(needs_build("java21"));
    assert!(!needs_build("provided.al2"));
    assert!(!needs_build("provided.al2023"));
  }

  #[test]
  fn artifact_paths() {
    let build_dir = Path::new("/p/.forge/build");
    let go = stack(Path::new("/p"), "api", "go1.x", &[]);
    let py = stack(Path::new("/p"), "worker", "python3.13", &[]);

    assert_eq!(go.artifact_path(build_dir), build_dir.join("api").join("bootstrap"));
    assert_eq!(py.artifact_path(build_dir), build_dir.join("worker.zip"));
  }

  #[test]
  fn handler_relative_to_stack() {
    let mut s = stack(Path::new("/p"), "api", "go1.x", &[]);
    s.relative_path = PathBuf::from("services/api");
    s.handler = "services/api".to_string();
    assert_eq!(s.handler_in_stack(), ".");

    s.handler = "services/api/cmd/lambda".to_string();
    assert_eq!(s.handler_in_stack(), "cmd/lambda");

    s.handler = "cmd".to_string();
    assert_eq!(s.handler_in_stack(), "cmd");
  }
}
