//! Test helpers for forge-lib.
//!
//! Project-tree builders for discovery tests and shell helpers for tests that
//! spawn processes.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::consts::STACK_FILE;
use crate::stack::Stack;

/// Returns the shell command and args to execute a shell script.
#[cfg(unix)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("/bin/sh", vec!["-c".to_string(), script.to_string()])
}

#[cfg(windows)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("cmd.exe", vec!["/C".to_string(), script.to_string()])
}

/// Write a `stack.forge.toml` declaring `name` with `runtime` and `deps` under `root/rel`.
pub fn write_stack(root: &Path, rel: &str, name: &str, runtime: &str, deps: &[&str]) -> PathBuf {
  let dir = root.join(rel);
  fs::create_dir_all(&dir).unwrap();
  let deps = deps.iter().map(|d| format!("\"{}\"", d)).collect::<Vec<_>>().join(", ");
  fs::write(
    dir.join(STACK_FILE),
    format!(
      "[stack]\nname = \"{}\"\nruntime = \"{}\"\ndependencies = [{}]\n",
      name, runtime, deps
    ),
  )
  .unwrap();
  dir
}

/// An in-memory stack rooted at `root/name`, for tests that skip discovery.
pub fn stack(root: &Path, name: &str, runtime: &str, deps: &[&str]) -> Stack {
  Stack {
    name: name.to_string(),
    relative_path: PathBuf::from(name),
    absolute_path: root.join(name),
    runtime: runtime.to_string(),
    handler: name.to_string(),
    description: None,
    dependencies: deps.iter().map(|d| d.to_string()).collect(),
    env: BTreeMap::new(),
  }
}
