//! Convention stages: discovery, artifacts and the terraform lifecycle.
//!
//! Every stage reports progress as [`StageEvent`](super::StageEvent)s and
//! never writes to the terminal. Terraform runs once per stack, inside the
//! stack's directory.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::engine::{EventStage, StageResult};
use super::error::PipelineError;
use super::events::EventLog;
use super::state::State;
use crate::build::{BuildConfig, Registry, build_all, build_all_concurrent, write_stub_archive, write_stub_bootstrap};
use crate::infra::{ApplyOptions, DestroyOptions, Executor, ExecutorError, namespace_vars};
use crate::stack::{BuildTarget, Stack, discover};

/// Asks the user a yes/no question. `Ok(false)` means "no".
pub type ApprovalFn = Arc<dyn Fn(&str) -> io::Result<bool> + Send + Sync>;

/// How mutating terraform commands are approved.
///
/// Approval always happens here, before the executor is called; the
/// executor itself runs non-interactively.
#[derive(Clone)]
pub enum Approval {
  /// Proceed without asking.
  Auto,
  /// Ask through the callback. `false` cancels the run.
  Prompt(ApprovalFn),
}

impl std::fmt::Debug for Approval {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Approval::Auto => f.write_str("Auto"),
      Approval::Prompt(_) => f.write_str("Prompt"),
    }
  }
}

impl Approval {
  async fn confirm(&self, question: String) -> Result<(), PipelineError> {
    let Approval::Prompt(ask) = self else {
      return Ok(());
    };
    let ask = ask.clone();
    let answer = tokio::task::spawn_blocking(move || ask(&question))
      .await
      .map_err(|e| PipelineError::Join(e.to_string()))?
      .map_err(PipelineError::Approval)?;
    if !answer {
      info!("user declined confirmation");
      return Err(PipelineError::CanceledByUser);
    }
    Ok(())
  }
}

fn require_stacks(state: &State) -> Result<(), PipelineError> {
  if state.stacks.is_empty() {
    return Err(PipelineError::InvalidState(
      "no stacks in state; stack discovery must run first".to_string(),
    ));
  }
  Ok(())
}

fn ensure_running(cancel: &CancellationToken) -> Result<(), PipelineError> {
  if cancel.is_cancelled() {
    return Err(PipelineError::Interrupted);
  }
  Ok(())
}

fn infra_error(operation: &'static str, stack: &Stack) -> impl FnOnce(ExecutorError) -> PipelineError {
  let stack = stack.name.clone();
  move |source| PipelineError::Infra {
    operation,
    stack,
    source,
  }
}

/// Discover stacks under the project directory and store them in deploy order.
#[derive(Debug, Clone, Default)]
pub struct ScanStacks;

#[async_trait]
impl EventStage for ScanStacks {
  fn name(&self) -> &str {
    "scan"
  }

  async fn run(&self, _cancel: &CancellationToken, state: State, events: &mut EventLog) -> StageResult {
    events.info("==> Scanning for stacks...");
    let stacks = discover(state.project_dir())?;

    events.info(format!("Found {} stack(s):", stacks.len()));
    for stack in &stacks {
      events.info(format!("  - {} ({})", stack.name, stack.runtime));
    }
    debug!(count = stacks.len(), "stacks discovered");
    Ok(state.with_stacks(stacks))
  }
}

/// Narrow the discovered stacks down to the one named.
#[derive(Debug, Clone)]
pub struct SelectStack {
  name: String,
}

impl SelectStack {
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: name.into() }
  }
}

#[async_trait]
impl EventStage for SelectStack {
  fn name(&self) -> &str {
    "select"
  }

  async fn run(&self, _cancel: &CancellationToken, state: State, events: &mut EventLog) -> StageResult {
    require_stacks(&state)?;
    let stack = state
      .stack(&self.name)
      .cloned()
      .ok_or_else(|| PipelineError::UnknownStack(self.name.clone()))?;
    events.info(format!("Selected stack: {}", stack.name));
    Ok(state.with_stacks(vec![stack]))
  }
}

/// Write placeholder artifacts for stacks whose artifact does not exist yet,
/// so terraform can reference every artifact path before anything is built.
#[derive(Debug, Clone, Default)]
pub struct GenerateStubs;

#[async_trait]
impl EventStage for GenerateStubs {
  fn name(&self) -> &str {
    "stubs"
  }

  async fn run(&self, _cancel: &CancellationToken, state: State, events: &mut EventLog) -> StageResult {
    require_stacks(&state)?;
    let build_dir = state.build_dir();

    let mut created = 0;
    for stack in state.stacks.iter() {
      let output = stack.artifact_path(&build_dir);
      if output.exists() {
        continue;
      }
      match stack.build_target() {
        BuildTarget::Archive => write_stub_archive(&output)?,
        BuildTarget::Bootstrap => write_stub_bootstrap(&output)?,
      }
      debug!(stack = %stack.name, path = ?output, "stub written");
      created += 1;
    }

    if created > 0 {
      events.info(format!("Created {} stub artifact(s)", created));
    }
    Ok(state)
  }
}

/// Build every stack whose runtime needs a build step.
pub struct BuildStacks {
  registry: Arc<Registry>,
  parallelism: usize,
}

impl BuildStacks {
  pub fn new(registry: Arc<Registry>) -> Self {
    Self {
      registry,
      parallelism: 1,
    }
  }

  /// Build up to `parallelism` stacks at once. `1` builds in deploy order.
  pub fn with_parallelism(mut self, parallelism: usize) -> Self {
    self.parallelism = parallelism.max(1);
    self
  }
}

#[async_trait]
impl EventStage for BuildStacks {
  fn name(&self) -> &str {
    "build"
  }

  async fn run(&self, cancel: &CancellationToken, state: State, events: &mut EventLog) -> StageResult {
    require_stacks(&state)?;
    events.info("==> Building stacks...");

    let build_dir = state.build_dir();
    let targets: Vec<(String, BuildConfig)> = state
      .stacks
      .iter()
      .filter(|stack| stack.needs_build())
      .map(|stack| (stack.name.clone(), BuildConfig::for_stack(stack, &build_dir)))
      .collect();

    if targets.is_empty() {
      events.info("No stacks need building");
      return Ok(state);
    }

    let mut built = Vec::with_capacity(targets.len());
    if self.parallelism > 1 {
      for (name, _) in &targets {
        events.info(format!("[{}] Building...", name));
      }
      let configs: Vec<BuildConfig> = targets.iter().map(|(_, cfg)| cfg.clone()).collect();
      let artifacts = build_all_concurrent(cancel, &configs, &self.registry, self.parallelism).await?;
      built.extend(targets.into_iter().map(|(name, _)| name).zip(artifacts));
    } else {
      for (name, cfg) in targets {
        events.info(format!("[{}] Building...", name));
        let mut artifacts = build_all(cancel, std::slice::from_ref(&cfg), &self.registry).await?;
        if let Some(artifact) = artifacts.pop() {
          built.push((name, artifact));
        }
      }
    }

    let mut state = state;
    for (name, artifact) in built {
      let file = artifact
        .path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
      events.success(format!("[{}] Built: {} ({:.2} MB)", name, file, artifact.size_mb()));
      state = state.with_artifact(name, artifact);
    }
    Ok(state)
  }
}

/// `terraform init` in every stack.
pub struct TerraformInit {
  executor: Arc<dyn Executor>,
}

impl TerraformInit {
  pub fn new(executor: Arc<dyn Executor>) -> Self {
    Self { executor }
  }
}

#[async_trait]
impl EventStage for TerraformInit {
  fn name(&self) -> &str {
    "init"
  }

  async fn run(&self, cancel: &CancellationToken, state: State, events: &mut EventLog) -> StageResult {
    require_stacks(&state)?;
    events.info("==> Initializing Terraform...");
    for stack in state.stacks.iter() {
      ensure_running(cancel)?;
      self
        .executor
        .init(cancel, &stack.absolute_path)
        .await
        .map_err(infra_error("init", stack))?;
      events.success(format!("[{}] Initialized", stack.name));
    }
    Ok(state)
  }
}

/// `terraform plan` in every stack, reporting whether changes are pending.
pub struct TerraformPlan {
  executor: Arc<dyn Executor>,
  namespace: Option<String>,
}

impl TerraformPlan {
  pub fn new(executor: Arc<dyn Executor>, namespace: Option<String>) -> Self {
    Self { executor, namespace }
  }
}

#[async_trait]
impl EventStage for TerraformPlan {
  fn name(&self) -> &str {
    "plan"
  }

  async fn run(&self, cancel: &CancellationToken, state: State, events: &mut EventLog) -> StageResult {
    require_stacks(&state)?;
    events.info("==> Planning infrastructure changes...");
    let vars = namespace_vars(self.namespace.as_deref());
    if let Some(ns) = self.namespace.as_deref().filter(|_| !vars.is_empty()) {
      events.info(format!("Deploying to namespace: {}", ns.trim()));
    }

    for stack in state.stacks.iter() {
      ensure_running(cancel)?;
      let changed = self
        .executor
        .plan_with_vars(cancel, &stack.absolute_path, &vars)
        .await
        .map_err(infra_error("plan", stack))?;
      if changed {
        events.info(format!("[{}] Changes detected", stack.name));
      } else {
        events.info(format!("[{}] No changes detected", stack.name));
      }
    }
    Ok(state)
  }
}

/// `terraform apply` in every stack, in deploy order.
///
/// Approval is resolved once, before the first stack is touched.
pub struct TerraformApply {
  executor: Arc<dyn Executor>,
  namespace: Option<String>,
  approval: Approval,
}

impl TerraformApply {
  pub fn new(executor: Arc<dyn Executor>, namespace: Option<String>, approval: Approval) -> Self {
    Self {
      executor,
      namespace,
      approval,
    }
  }
}

#[async_trait]
impl EventStage for TerraformApply {
  fn name(&self) -> &str {
    "apply"
  }

  async fn run(&self, cancel: &CancellationToken, state: State, events: &mut EventLog) -> StageResult {
    require_stacks(&state)?;
    let total = state.stacks.len();
    self
      .approval
      .confirm(format!("Apply changes to {} stack(s)?", total))
      .await?;

    events.info("==> Applying infrastructure changes...");
    let opts = ApplyOptions {
      auto_approve: true,
      vars: namespace_vars(self.namespace.as_deref()),
      ..Default::default()
    };

    for (i, stack) in state.stacks.iter().enumerate() {
      ensure_running(cancel)?;
      events.info(format!("[{}/{}] Applying {}...", i + 1, total, stack.name));
      self
        .executor
        .apply(cancel, &stack.absolute_path, &opts)
        .await
        .map_err(infra_error("apply", stack))?;
      events.success(format!("[{}] Applied", stack.name));
    }
    Ok(state)
  }
}

/// `terraform destroy` in every stack, dependents before their dependencies.
pub struct TerraformDestroy {
  executor: Arc<dyn Executor>,
  namespace: Option<String>,
  approval: Approval,
}

impl TerraformDestroy {
  pub fn new(executor: Arc<dyn Executor>, namespace: Option<String>, approval: Approval) -> Self {
    Self {
      executor,
      namespace,
      approval,
    }
  }
}

#[async_trait]
impl EventStage for TerraformDestroy {
  fn name(&self) -> &str {
    "destroy"
  }

  async fn run(&self, cancel: &CancellationToken, state: State, events: &mut EventLog) -> StageResult {
    require_stacks(&state)?;
    let total = state.stacks.len();
    self
      .approval
      .confirm(format!("Destroy all resources in {} stack(s)?", total))
      .await?;

    events.info("==> Destroying infrastructure...");
    let opts = DestroyOptions {
      auto_approve: true,
      vars: namespace_vars(self.namespace.as_deref()),
      ..Default::default()
    };

    // stacks are held in deploy order
    for (i, stack) in state.stacks.iter().rev().enumerate() {
      ensure_running(cancel)?;
      events.info(format!("[{}/{}] Destroying {}...", i + 1, total, stack.name));
      self
        .executor
        .destroy(cancel, &stack.absolute_path, &opts)
        .await
        .map_err(infra_error("destroy", stack))?;
      events.success(format!("[{}] Destroyed", stack.name));
    }
    Ok(state)
  }
}

/// Collect `terraform output` from every stack.
///
/// A stack whose outputs cannot be read is reported as a warning and
/// skipped; this stage never fails on executor errors.
pub struct TerraformOutputs {
  executor: Arc<dyn Executor>,
}

impl TerraformOutputs {
  pub fn new(executor: Arc<dyn Executor>) -> Self {
    Self { executor }
  }
}

#[async_trait]
impl EventStage for TerraformOutputs {
  fn name(&self) -> &str {
    "outputs"
  }

  async fn run(&self, cancel: &CancellationToken, state: State, events: &mut EventLog) -> StageResult {
    require_stacks(&state)?;
    let mut next = state.clone();
    let mut captured = 0;

    for stack in state.stacks.iter() {
      ensure_running(cancel)?;
      match self.executor.output(cancel, &stack.absolute_path).await {
        Ok(outputs) => {
          captured += outputs.len();
          next = next.with_outputs(stack.name.clone(), outputs);
        }
        Err(e) => {
          warn!(stack = %stack.name, error = %e, "failed to read outputs");
          events.warning(format!("[{}] Failed to retrieve outputs: {}", stack.name, e));
        }
      }
    }

    if captured > 0 {
      events.info(format!("Captured {} output(s)", captured));
    }
    Ok(next)
  }
}
