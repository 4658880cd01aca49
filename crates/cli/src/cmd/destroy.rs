//! Implementation of the `forge destroy` command.
//!
//! Tears stacks down in reverse dependency order: a stack is destroyed
//! before anything it depends on. Naming a stack tears down only that one.

use std::path::Path;

use anyhow::Result;

use super::{Project, approval, run};
use crate::output::print_success;

pub fn cmd_destroy(dir: &Path, stack: Option<String>, namespace: Option<String>, auto_approve: bool) -> Result<()> {
  let project = Project::load(dir)?;
  let conventions = project.conventions();
  let approval = approval(auto_approve);
  let pipeline = match stack {
    Some(name) => conventions.destroy_stack(name, namespace, approval),
    None => conventions.destroy(namespace, approval),
  };

  if let Some(state) = run(&pipeline, &project, "Destroy")? {
    println!();
    print_success(&format!("Destroyed {} stack(s)", state.stacks.len()));
  }
  Ok(())
}
