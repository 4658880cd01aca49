//! Implementation of the `forge build` command.

use std::path::Path;
use std::time::Instant;

use anyhow::Result;

use super::{Project, run};
use crate::output::{format_elapsed, format_size, print_stat, print_success, short_checksum};

/// Build every stack's artifact, or with `stub_only` just put placeholders
/// where artifacts are missing so terraform can initialize.
pub fn cmd_build(dir: &Path, stub_only: bool) -> Result<()> {
  let start = Instant::now();
  let project = Project::load(dir)?;
  let conventions = project.conventions();

  if stub_only {
    if let Some(state) = run(&conventions.stubs(), &project, "Stub generation")? {
      println!();
      print_success(&format!("Artifacts in place for {} stack(s)", state.stacks.len()));
    }
    return Ok(());
  }

  let Some(state) = run(&conventions.build(), &project, "Build")? else {
    return Ok(());
  };

  println!();
  print_success(&format!(
    "Built {} artifact(s) in {}",
    state.artifacts.len(),
    format_elapsed(start.elapsed())
  ));
  for (name, artifact) in state.artifacts.iter() {
    let path = artifact.path.strip_prefix(&project.dir).unwrap_or(&artifact.path);
    print_stat(
      name,
      &format!(
        "{} ({}, sha256 {})",
        path.display(),
        format_size(artifact.size_bytes),
        short_checksum(&artifact.checksum)
      ),
    );
  }

  Ok(())
}
