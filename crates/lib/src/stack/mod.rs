//! Stack discovery and dependency ordering.
//!
//! A project is a directory tree; every directory holding a
//! `stack.forge.toml` is a stack. [`find_stacks`] scans and validates,
//! [`DependencyGraph`] orders.

mod discover;
mod graph;
mod types;

use std::path::Path;

pub use discover::find_stacks;
pub use graph::{DependencyGraph, order_stacks};
pub use types::{BuildTarget, Stack, StackError, build_target, is_supported_runtime, needs_build, validate_stack};

/// Discover the project's stacks and return them in deploy order.
pub fn discover(project_root: &Path) -> Result<Vec<Stack>, StackError> {
  order_stacks(find_stacks(project_root)?)
}
