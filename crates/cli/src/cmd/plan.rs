//! Implementation of the `forge plan` command.

use std::path::Path;

use anyhow::Result;

use super::{Project, run};
use crate::output::print_success;

pub fn cmd_plan(dir: &Path, namespace: Option<String>) -> Result<()> {
  let project = Project::load(dir)?;
  let pipeline = project.conventions().plan(namespace);

  if let Some(state) = run(&pipeline, &project, "Plan")? {
    println!();
    print_success(&format!("Planned {} stack(s)", state.stacks.len()));
  }
  Ok(())
}
