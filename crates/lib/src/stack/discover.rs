//! Project scanning: finds `stack.forge.toml` declarations and resolves
//! their dependency references to stack names.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use super::types::{Stack, StackError, StackFile, validate_stack};
use crate::consts::{SKIP_DIRS, STACK_FILE};

/// Scan `project_root` for stack declarations.
///
/// Every declaration is parsed and validated; validation failures are
/// collected and reported together. Dependency references are resolved to
/// stack names. The result is sorted by name so repeated scans of the same
/// tree are identical.
pub fn find_stacks(project_root: &Path) -> Result<Vec<Stack>, StackError> {
  let root = dunce::canonicalize(project_root).map_err(|source| StackError::Io {
    path: project_root.to_path_buf(),
    source,
  })?;

  let mut stacks = Vec::new();
  let mut invalid = Vec::new();

  let walker = WalkDir::new(&root)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|e| e.depth() == 0 || !is_skipped(e));

  for entry in walker {
    let entry = entry?;
    if !entry.file_type().is_file() || entry.file_name() != STACK_FILE {
      continue;
    }

    let stack = load_stack(&root, entry.path())?;
    debug!(stack = %stack.name, path = ?stack.relative_path, "found stack declaration");

    match validate_stack(&stack) {
      Ok(()) => stacks.push(stack),
      Err(e) => invalid.push(e),
    }
  }

  if !invalid.is_empty() {
    return Err(StackError::InvalidStacks(invalid));
  }
  if stacks.is_empty() {
    return Err(StackError::NoStacks(root));
  }

  stacks.sort_by(|a, b| a.name.cmp(&b.name));
  check_unique_names(&stacks)?;
  resolve_dependencies(&mut stacks)?;

  info!(count = stacks.len(), root = ?root, "discovered stacks");
  Ok(stacks)
}

fn is_skipped(entry: &DirEntry) -> bool {
  if !entry.file_type().is_dir() {
    return false;
  }
  entry
    .file_name()
    .to_str()
    .map(|name| name.starts_with('.') || SKIP_DIRS.contains(&name))
    .unwrap_or(false)
}

fn load_stack(root: &Path, file: &Path) -> Result<Stack, StackError> {
  let content = fs::read_to_string(file).map_err(|source| StackError::Io {
    path: file.to_path_buf(),
    source,
  })?;
  let parsed: StackFile = toml::from_str(&content).map_err(|source| StackError::Parse {
    path: file.to_path_buf(),
    source,
  })?;
  let decl = parsed.stack;

  let absolute_path = file.parent().unwrap_or(root).to_path_buf();
  let relative_path = absolute_path.strip_prefix(root).unwrap_or(Path::new("")).to_path_buf();
  let handler = decl
    .handler
    .filter(|h| !h.trim().is_empty())
    .unwrap_or_else(|| default_handler(&relative_path));

  Ok(Stack {
    name: decl.name.trim().to_string(),
    relative_path,
    absolute_path,
    runtime: decl.runtime.trim().to_string(),
    handler,
    description: decl.description,
    dependencies: decl.dependencies,
    env: decl.env,
  })
}

fn default_handler(relative_path: &Path) -> String {
  let rel = relative_path.to_string_lossy().replace('\\', "/");
  if rel.is_empty() { ".".to_string() } else { rel }
}

fn check_unique_names(sorted: &[Stack]) -> Result<(), StackError> {
  for pair in sorted.windows(2) {
    if pair[0].name == pair[1].name {
      return Err(StackError::DuplicateName {
        name: pair[0].name.clone(),
        first: pair[0].relative_path.clone(),
        second: pair[1].relative_path.clone(),
      });
    }
  }
  Ok(())
}

/// Rewrite each dependency reference to a stack name.
///
/// A reference is either a stack name or a directory path, relative to the
/// declaring stack first and to the project root second.
fn resolve_dependencies(stacks: &mut [Stack]) -> Result<(), StackError> {
  let by_path: BTreeMap<PathBuf, String> = stacks
    .iter()
    .map(|s| (s.relative_path.clone(), s.name.clone()))
    .collect();
  let names: Vec<String> = stacks.iter().map(|s| s.name.clone()).collect();

  for stack in stacks.iter_mut() {
    let mut resolved: Vec<String> = Vec::with_capacity(stack.dependencies.len());
    for reference in &stack.dependencies {
      let name = if names.contains(reference) {
        reference.clone()
      } else {
        let from_stack = normalize(&stack.relative_path.join(reference));
        let from_root = normalize(Path::new(reference));
        by_path
          .get(&from_stack)
          .or_else(|| by_path.get(&from_root))
          .cloned()
          .ok_or_else(|| StackError::UnknownDependency {
            stack: stack.name.clone(),
            dependency: reference.clone(),
          })?
      };
      if !resolved.contains(&name) {
        resolved.push(name);
      }
    }
    stack.dependencies = resolved;
  }
  Ok(())
}

/// Lexically normalize a relative path (`a/./b/../c` becomes `a/c`).
fn normalize(path: &Path) -> PathBuf {
  let mut out = PathBuf::new();
  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => {
        out.pop();
      }
      other => out.push(other),
    }
  }
  out
}
