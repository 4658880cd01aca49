//! Stage traits and the sequential engines.
//!
//! A run threads one [`State`] through its stages in order. The first
//! failure ends the run and is returned unchanged; the partially updated
//! state is dropped. Side effects already performed by earlier stages are
//! not undone.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::PipelineError;
use super::events::{EventLog, EventSink, StageEvent};
use super::state::State;

pub type StageResult = Result<State, PipelineError>;

fn short_type_name<T: ?Sized>() -> &'static str {
  let full = std::any::type_name::<T>();
  let base = full.split('<').next().unwrap_or(full);
  base.rsplit("::").next().unwrap_or(base)
}

/// A fallible state transformation.
#[async_trait]
pub trait Stage: Send + Sync {
  fn name(&self) -> &str {
    short_type_name::<Self>()
  }

  async fn run(&self, cancel: &CancellationToken, state: State) -> StageResult;
}

/// A stage that also reports progress.
///
/// Events pushed before a failure stay in `events`.
#[async_trait]
pub trait EventStage: Send + Sync {
  fn name(&self) -> &str {
    short_type_name::<Self>()
  }

  async fn run(&self, cancel: &CancellationToken, state: State, events: &mut EventLog) -> StageResult;
}

/// Stage built from an async closure.
pub struct FnStage<F> {
  name: String,
  f: F,
}

/// Lift `f` into a [`Stage`] called `name`.
pub fn stage_fn<F, Fut>(name: impl Into<String>, f: F) -> FnStage<F>
where
  F: Fn(CancellationToken, State) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = StageResult> + Send + 'static,
{
  FnStage { name: name.into(), f }
}

#[async_trait]
impl<F, Fut> Stage for FnStage<F>
where
  F: Fn(CancellationToken, State) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = StageResult> + Send + 'static,
{
  fn name(&self) -> &str {
    &self.name
  }

  async fn run(&self, cancel: &CancellationToken, state: State) -> StageResult {
    (self.f)(cancel.clone(), state).await
  }
}

/// Runs a plain [`Stage`] inside an event pipeline. Emits nothing.
pub struct Lifted<S>(pub S);

#[async_trait]
impl<S: Stage> EventStage for Lifted<S> {
  fn name(&self) -> &str {
    self.0.name()
  }

  async fn run(&self, cancel: &CancellationToken, state: State, _events: &mut EventLog) -> StageResult {
    self.0.run(cancel, state).await
  }
}

/// An ordered sequence of [`Stage`]s.
#[derive(Clone, Default)]
pub struct Pipeline {
  stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
  pub fn new(stages: Vec<Arc<dyn Stage>>) -> Self {
    Self { stages }
  }

  /// Append a stage.
  pub fn then(mut self, stage: impl Stage + 'static) -> Self {
    self.stages.push(Arc::new(stage));
    self
  }

  /// Append every stage of `other`.
  pub fn chain(mut self, other: Pipeline) -> Self {
    self.stages.extend(other.stages);
    self
  }

  pub fn len(&self) -> usize {
    self.stages.len()
  }

  pub fn is_empty(&self) -> bool {
    self.stages.is_empty()
  }

  /// Run every stage in order, stopping at the first failure.
  pub async fn run(&self, cancel: &CancellationToken, initial: State) -> StageResult {
    let mut state = initial;
    for stage in &self.stages {
      if cancel.is_cancelled() {
        debug!(stage = stage.name(), "pipeline interrupted before stage");
        return Err(PipelineError::Interrupted);
      }
      debug!(stage = stage.name(), "running stage");
      state = stage.run(cancel, state).await?;
    }
    Ok(state)
  }
}

#[async_trait]
impl Stage for Pipeline {
  fn name(&self) -> &str {
    "pipeline"
  }

  async fn run(&self, cancel: &CancellationToken, state: State) -> StageResult {
    Pipeline::run(self, cancel, state).await
  }
}

/// An ordered sequence of [`EventStage`]s.
#[derive(Clone, Default)]
pub struct EventPipeline {
  stages: Vec<Arc<dyn EventStage>>,
}

impl EventPipeline {
  pub fn new(stages: Vec<Arc<dyn EventStage>>) -> Self {
    Self { stages }
  }

  pub fn then(mut self, stage: impl EventStage + 'static) -> Self {
    self.stages.push(Arc::new(stage));
    self
  }

  pub fn chain(mut self, other: EventPipeline) -> Self {
    self.stages.extend(other.stages);
    self
  }

  pub fn len(&self) -> usize {
    self.stages.len()
  }

  pub fn is_empty(&self) -> bool {
    self.stages.is_empty()
  }

  /// Stage names in run order.
  pub fn stage_names(&self) -> Vec<&str> {
    self.stages.iter().map(|s| s.name()).collect()
  }

  /// Run every stage in order and return the outcome with every event
  /// emitted by the stages that ran, the failing one included.
  pub async fn run_with_events(&self, cancel: &CancellationToken, initial: State) -> (StageResult, Vec<StageEvent>) {
    let mut log = EventLog::new();
    let result = self.run_into(cancel, initial, &mut log).await;
    (result, log.into_events())
  }

  /// Like [`run_with_events`](Self::run_with_events), also forwarding each
  /// event to `sink` as it is emitted.
  pub async fn run_with_sink(
    &self,
    cancel: &CancellationToken,
    initial: State,
    sink: EventSink,
  ) -> (StageResult, Vec<StageEvent>) {
    let mut log = EventLog::with_sink(sink);
    let result = self.run_into(cancel, initial, &mut log).await;
    (result, log.into_events())
  }

  async fn run_into(&self, cancel: &CancellationToken, initial: State, log: &mut EventLog) -> StageResult {
    let mut state = initial;
    for stage in &self.stages {
      if cancel.is_cancelled() {
        debug!(stage = stage.name(), "pipeline interrupted before stage");
        return Err(PipelineError::Interrupted);
      }
      debug!(stage = stage.name(), "running stage");
      state = stage.run(cancel, state, log).await?;
    }
    Ok(state)
  }
}

#[async_trait]
impl EventStage for EventPipeline {
  fn name(&self) -> &str {
    "pipeline"
  }

  async fn run(&self, cancel: &CancellationToken, state: State, events: &mut EventLog) -> StageResult {
    self.run_into(cancel, state, events).await
  }
}
