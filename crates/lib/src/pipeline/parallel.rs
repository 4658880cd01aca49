//! Concurrent stage combinators.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::engine::{EventStage, Stage, StageResult};
use super::error::PipelineError;
use super::events::EventLog;
use super::state::State;

/// Runs its members concurrently on clones of the same input state.
///
/// All members are awaited. On failure the error of the lowest-index failing
/// member is returned; otherwise each member's changes are merged into the
/// input in member order. Two members writing the same state field is a bug;
/// the later member wins.
#[derive(Clone, Default)]
pub struct Parallel {
  stages: Vec<Arc<dyn Stage>>,
  limit: Option<usize>,
}

impl Parallel {
  pub fn new(stages: Vec<Arc<dyn Stage>>) -> Self {
    Self { stages, limit: None }
  }

  pub fn with(mut self, stage: impl Stage + 'static) -> Self {
    self.stages.push(Arc::new(stage));
    self
  }

  /// Run at most `limit` members at a time.
  pub fn with_limit(mut self, limit: usize) -> Self {
    self.limit = Some(limit.max(1));
    self
  }
}

#[async_trait]
impl Stage for Parallel {
  fn name(&self) -> &str {
    "parallel"
  }

  async fn run(&self, cancel: &CancellationToken, state: State) -> StageResult {
    let results = run_members(self.stages.len(), self.limit, cancel, |index, cancel| {
      let stage = self.stages[index].clone();
      let input = state.clone();
      async move { stage.run(&cancel, input).await }
    })
    .await?;
    merge_all(state, results)
  }
}

/// [`Parallel`] for event stages. Member logs are appended in member order
/// once every member has finished.
#[derive(Clone, Default)]
pub struct ParallelEvents {
  stages: Vec<Arc<dyn EventStage>>,
  limit: Option<usize>,
}

impl ParallelEvents {
  pub fn new(stages: Vec<Arc<dyn EventStage>>) -> Self {
    Self { stages, limit: None }
  }

  pub fn with(mut self, stage: impl EventStage + 'static) -> Self {
    self.stages.push(Arc::new(stage));
    self
  }

  pub fn with_limit(mut self, limit: usize) -> Self {
    self.limit = Some(limit.max(1));
    self
  }
}

#[async_trait]
impl EventStage for ParallelEvents {
  fn name(&self) -> &str {
    "parallel"
  }

  async fn run(&self, cancel: &CancellationToken, state: State, events: &mut EventLog) -> StageResult {
    let mut logs: Vec<Option<EventLog>> = (0..self.stages.len()).map(|_| None).collect();
    let results = run_members(self.stages.len(), self.limit, cancel, |index, cancel| {
      let stage = self.stages[index].clone();
      let input = state.clone();
      async move {
        let mut log = EventLog::new();
        let result = stage.run(&cancel, input, &mut log).await;
        (result, log)
      }
    });
    let outcome = split_logs(results.await, &mut logs);
    for log in logs.into_iter().flatten() {
      events.append(log);
    }
    merge_all(state, outcome?)
  }
}

type Member<T> = (usize, T);

/// Spawn `count` members built by `make` and wait for all of them.
///
/// Results are returned in member order. A member whose turn comes after
/// `cancel` fired does not start and yields `None`.
async fn run_members<F, Fut, T>(
  count: usize,
  limit: Option<usize>,
  cancel: &CancellationToken,
  make: F,
) -> Result<Vec<Option<T>>, PipelineError>
where
  F: Fn(usize, CancellationToken) -> Fut,
  Fut: Future<Output = T> + Send + 'static,
  T: Send + 'static,
{
  let semaphore = Arc::new(Semaphore::new(limit.unwrap_or(count).max(1)));
  let mut join_set: JoinSet<Member<Option<T>>> = JoinSet::new();

  for index in 0..count {
    let member = make(index, cancel.clone());
    let semaphore = semaphore.clone();
    let cancel = cancel.clone();
    join_set.spawn(async move {
      let Ok(_permit) = semaphore.acquire_owned().await else {
        return (index, None);
      };
      if cancel.is_cancelled() {
        debug!(member = index, "parallel member not started");
        return (index, None);
      }
      (index, Some(member.await))
    });
  }

  let mut results: Vec<Option<T>> = (0..count).map(|_| None).collect();
  let mut join_failure = None;
  while let Some(joined) = join_set.join_next().await {
    match joined {
      Ok((index, result)) => results[index] = result,
      Err(e) => {
        warn!(error = %e, "parallel member panicked");
        join_failure.get_or_insert_with(|| e.to_string());
      }
    }
  }

  match join_failure {
    Some(message) => Err(PipelineError::Join(message)),
    None => Ok(results),
  }
}

fn split_logs(
  results: Result<Vec<Option<(StageResult, EventLog)>>, PipelineError>,
  logs: &mut [Option<EventLog>],
) -> Result<Vec<Option<StageResult>>, PipelineError> {
  let results = results?;
  Ok(
    results
      .into_iter()
      .enumerate()
      .map(|(index, member)| {
        member.map(|(result, log)| {
          logs[index] = Some(log);
          result
        })
      })
      .collect(),
  )
}

/// Pick the lowest-index genuine failure, else merge every output.
fn merge_all(base: State, results: Vec<Option<StageResult>>) -> Result<State, PipelineError> {
  let mut outputs = Vec::with_capacity(results.len());
  let mut first_error = None;
  let mut skipped = false;

  for result in results {
    match result {
      Some(Ok(state)) => outputs.push(state),
      Some(Err(PipelineError::Interrupted)) | None => skipped = true,
      Some(Err(e)) => {
        if first_error.is_none() {
          first_error = Some(e);
        }
      }
    }
  }

  if let Some(e) = first_error {
    return Err(e);
  }
  if skipped {
    return Err(PipelineError::Interrupted);
  }
  Ok(
    outputs
      .into_iter()
      .fold(base.clone(), |merged, changed| merged.merge_changes(&base, changed)),
  )
}
