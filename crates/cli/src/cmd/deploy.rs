//! Implementation of the `forge deploy` command.
//!
//! Scans, builds, plans and applies every stack in dependency order, then
//! prints the collected terraform outputs.

use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use serde_json::Value;

use super::{Project, approval, run};
use crate::output::{format_elapsed, print_stat, print_success};

pub fn cmd_deploy(dir: &Path, namespace: Option<String>, auto_approve: bool) -> Result<()> {
  let start = Instant::now();
  let project = Project::load(dir)?;
  let pipeline = project.conventions().deploy(namespace, approval(auto_approve));

  let Some(state) = run(&pipeline, &project, "Deploy")? else {
    return Ok(());
  };

  if state.outputs.values().any(|o| !o.is_empty()) {
    println!();
    println!("Outputs:");
    for (stack, outputs) in state.outputs.iter() {
      for (key, value) in outputs {
        print_stat(&format!("{}.{}", stack, key), &render_value(value));
      }
    }
  }

  println!();
  print_success(&format!(
    "Deployed {} stack(s) in {}",
    state.stacks.len(),
    format_elapsed(start.elapsed())
  ));
  Ok(())
}

fn render_value(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}
