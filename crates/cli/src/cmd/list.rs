//! Implementation of the `forge list` command.

use std::path::Path;

use anyhow::{Context, Result};
use forge_lib::stack::{DependencyGraph, find_stacks};
use serde::Serialize;

use super::Project;
use crate::output::{DEPENDS_ON, OutputFormat, print_info, print_json};

#[derive(Debug, Serialize)]
struct StackEntry {
  name: String,
  runtime: String,
  path: String,
  dependencies: Vec<String>,
  wave: usize,
}

#[derive(Debug, Serialize)]
struct ListOutput {
  stacks: Vec<StackEntry>,
  deploy_order: Vec<String>,
  destroy_order: Vec<String>,
}

/// Print every stack, grouped into dependency waves.
pub fn cmd_list(dir: &Path, format: OutputFormat) -> Result<()> {
  let project = Project::load(dir)?;
  let stacks = find_stacks(&project.dir).context("Stack discovery failed")?;
  let graph = DependencyGraph::new(&stacks).context("Invalid stack dependencies")?;
  let waves = graph.waves();

  let mut entries = Vec::with_capacity(stacks.len());
  for (wave, names) in waves.iter().enumerate() {
    for name in names {
      if let Some(stack) = stacks.iter().find(|s| &s.name == name) {
        entries.push(StackEntry {
          name: stack.name.clone(),
          runtime: stack.runtime.clone(),
          path: stack.relative_path.to_string_lossy().replace('\\', "/"),
          dependencies: stack.dependencies.clone(),
          wave: wave + 1,
        });
      }
    }
  }

  if matches!(format, OutputFormat::Json) {
    return print_json(&ListOutput {
      stacks: entries,
      deploy_order: graph.deploy_order(),
      destroy_order: graph.destroy_order(),
    });
  }

  print_info(&format!("Found {} stack(s)", entries.len()));
  let mut current_wave = 0;
  for entry in &entries {
    if entry.wave != current_wave {
      current_wave = entry.wave;
      println!();
      println!("Wave {}:", current_wave);
    }
    if entry.dependencies.is_empty() {
      println!("  {} ({}) {}", entry.name, entry.runtime, entry.path);
    } else {
      println!(
        "  {} ({}) {} {} {}",
        entry.name,
        entry.runtime,
        entry.path,
        DEPENDS_ON,
        entry.dependencies.join(", ")
      );
    }
  }

  Ok(())
}
