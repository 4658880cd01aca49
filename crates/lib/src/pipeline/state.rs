//! The value threaded through a pipeline run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use crate::build::Artifact;
use crate::config::build_dir;
use crate::stack::Stack;

/// Per-stack terraform outputs.
pub type Outputs = BTreeMap<String, Value>;

/// Pipeline state.
///
/// Fields are shared behind `Arc`s and copied on first write, so handing a
/// clone to a stage is cheap and no stage can change a value another stage
/// still holds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct State {
  pub project_dir: PathBuf,
  /// Stacks in deploy order.
  pub stacks: Arc<Vec<Stack>>,
  pub artifacts: Arc<BTreeMap<String, Artifact>>,
  pub outputs: Arc<BTreeMap<String, Outputs>>,
}

impl State {
  pub fn new(project_dir: impl Into<PathBuf>) -> Self {
    Self {
      project_dir: project_dir.into(),
      ..Default::default()
    }
  }

  pub fn build_dir(&self) -> PathBuf {
    build_dir(&self.project_dir)
  }

  pub fn stack(&self, name: &str) -> Option<&Stack> {
    self.stacks.iter().find(|s| s.name == name)
  }

  pub fn with_stacks(mut self, stacks: Vec<Stack>) -> Self {
    self.stacks = Arc::new(stacks);
    self
  }

  pub fn with_artifact(mut self, stack: impl Into<String>, artifact: Artifact) -> Self {
    Arc::make_mut(&mut self.artifacts).insert(stack.into(), artifact);
    self
  }

  pub fn with_outputs(mut self, stack: impl Into<String>, outputs: Outputs) -> Self {
    Arc::make_mut(&mut self.outputs).insert(stack.into(), outputs);
    self
  }

  pub fn project_dir(&self) -> &Path {
    &self.project_dir
  }

  /// Take every field `changed` modified relative to `base`.
  ///
  /// Used to merge the outputs of parallel stages that started from the
  /// same `base`; each field is expected to be owned by one stage.
  pub(crate) fn merge_changes(mut self, base: &State, changed: State) -> State {
    if changed.project_dir != base.project_dir {
      self.project_dir = changed.project_dir;
    }
    if !Arc::ptr_eq(&changed.stacks, &base.stacks) {
      self.stacks = changed.stacks;
    }
    if !Arc::ptr_eq(&changed.artifacts, &base.artifacts) {
      self.artifacts = changed.artifacts;
    }
    if !Arc::ptr_eq(&changed.outputs, &base.outputs) {
      self.outputs = changed.outputs;
    }
    self
  }
}
