//! Runtime → strategy lookup and batch builds.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::decorators::Decorator;
use super::strategies::{build_go, build_java, build_node, build_python};
use super::types::{Artifact, BuildConfig, BuildError, BuildFunc, BuildResult, build_fn};

const GO_RUNTIMES: &[&str] = &["go1.x", "provided.al2", "provided.al2023"];
const PYTHON_RUNTIMES: &[&str] = &["python3.9", "python3.10", "python3.11", "python3.12", "python3.13"];
const NODE_RUNTIMES: &[&str] = &["nodejs18.x", "nodejs20.x", "nodejs22.x"];
const JAVA_RUNTIMES: &[&str] = &["java11", "java17", "java21"];

/// Maps runtime identifiers to build strategies.
///
/// Built once at startup and read-only afterwards. [`Registry::with`] and
/// [`Registry::decorate`] consume the registry and return a new one.
#[derive(Clone)]
pub struct Registry {
  builders: BTreeMap<String, BuildFunc>,
}

impl std::fmt::Debug for Registry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Registry")
      .field("runtimes", &self.builders.keys().collect::<Vec<_>>())
      .finish()
  }
}

impl Default for Registry {
  fn default() -> Self {
    Self::new()
  }
}

impl Registry {
  /// A registry with one strategy per supported runtime family.
  pub fn new() -> Self {
    let families: [(&[&str], BuildFunc); 4] = [
      (GO_RUNTIMES, build_fn(build_go)),
      (PYTHON_RUNTIMES, build_fn(build_python)),
      (NODE_RUNTIMES, build_fn(build_node)),
      (JAVA_RUNTIMES, build_fn(build_java)),
    ];

    let mut builders = BTreeMap::new();
    for (runtimes, build) in families {
      for runtime in runtimes {
        builders.insert(runtime.to_string(), build.clone());
      }
    }
    Self { builders }
  }

  /// A registry with no strategies.
  pub fn empty() -> Self {
    Self {
      builders: BTreeMap::new(),
    }
  }

  /// The strategy for `runtime`, if any.
  pub fn get(&self, runtime: &str) -> Option<BuildFunc> {
    self.builders.get(runtime).cloned()
  }

  /// Register (or replace) the strategy for `runtime`.
  pub fn with(mut self, runtime: impl Into<String>, build: BuildFunc) -> Self {
    self.builders.insert(runtime.into(), build);
    self
  }

  /// Wrap every registered strategy with `decorator`.
  pub fn decorate(self, decorator: &Decorator) -> Self {
    Self {
      builders: self
        .builders
        .into_iter()
        .map(|(runtime, build)| (runtime, decorator(build)))
        .collect(),
    }
  }

  pub fn runtimes(&self) -> impl Iterator<Item = &str> {
    self.builders.keys().map(String::as_str)
  }
}

fn resolve(registry: &Registry, cfg: &BuildConfig) -> Result<BuildFunc, BuildError> {
  registry
    .get(&cfg.runtime)
    .ok_or_else(|| BuildError::UnsupportedRuntime(cfg.runtime.clone()))
}

/// Build every config in order, stopping at the first failure.
///
/// Artifacts come back in input order.
pub async fn build_all(
  cancel: &CancellationToken,
  configs: &[BuildConfig],
  registry: &Registry,
) -> Result<Vec<Artifact>, BuildError> {
  let mut artifacts = Vec::with_capacity(configs.len());
  for cfg in configs {
    if cancel.is_cancelled() {
      return Err(BuildError::Cancelled);
    }
    let build = resolve(registry, cfg)?;
    artifacts.push(build(cancel.clone(), cfg.clone()).await?);
  }
  Ok(artifacts)
}

/// Build configs concurrently, at most `parallelism` at a time.
///
/// Every runtime is resolved before any build starts. The first failure
/// stops new builds from starting; builds already running finish. On
/// failure the error of the lowest-index build that actually failed is
/// returned. Artifacts come back in input order regardless of completion
/// order.
pub async fn build_all_concurrent(
  cancel: &CancellationToken,
  configs: &[BuildConfig],
  registry: &Registry,
  parallelism: usize,
) -> Result<Vec<Artifact>, BuildError> {
  let builds = configs
    .iter()
    .map(|cfg| resolve(registry, cfg))
    .collect::<Result<Vec<_>, _>>()?;
  if cancel.is_cancelled() {
    return Err(BuildError::Cancelled);
  }

  let stop = cancel.child_token();
  let semaphore = Arc::new(Semaphore::new(parallelism.max(1)));
  let mut join_set = JoinSet::new();

  for (index, (cfg, build)) in configs.iter().cloned().zip(builds).enumerate() {
    let stop = stop.clone();
    let semaphore = semaphore.clone();

    join_set.spawn(async move {
      let result = build_one(build, cfg, semaphore, stop.clone()).await;
      if result.is_err() {
        stop.cancel();
      }
      (index, result)
    });
  }

  let mut results: Vec<Option<BuildResult>> = (0..configs.len()).map(|_| None).collect();
  let mut join_failure = None;
  while let Some(joined) = join_set.join_next().await {
    match joined {
      Ok((index, result)) => results[index] = Some(result),
      Err(e) => {
        warn!(error = %e, "build task panicked");
        stop.cancel();
        join_failure.get_or_insert_with(|| e.to_string());
      }
    }
  }

  collect_ordered(results, join_failure)
}

async fn build_one(
  build: BuildFunc,
  cfg: BuildConfig,
  semaphore: Arc<Semaphore>,
  stop: CancellationToken,
) -> BuildResult {
  let _permit = semaphore
    .acquire_owned()
    .await
    .map_err(|e| BuildError::Join(e.to_string()))?;
  if stop.is_cancelled() {
    return Err(BuildError::Cancelled);
  }
  build(stop, cfg).await
}

fn collect_ordered(results: Vec<Option<BuildResult>>, join_failure: Option<String>) -> Result<Vec<Artifact>, BuildError> {
  let mut artifacts = Vec::with_capacity(results.len());
  let mut cancelled = false;
  let mut first_error = None;

  for result in results {
    match result {
      Some(Ok(artifact)) => artifacts.push(artifact),
      Some(Err(BuildError::Cancelled)) => cancelled = true,
      Some(Err(e)) => {
        if first_error.is_none() {
          first_error = Some(e);
        }
      }
      None => {}
    }
  }

  if let Some(e) = first_error {
    return Err(e);
  }
  if let Some(message) = join_failure {
    return Err(BuildError::Join(message));
  }
  if cancelled {
    debug!("concurrent build cancelled");
    return Err(BuildError::Cancelled);
  }
  Ok(artifacts)
}
