use thiserror::Error;

use crate::build::BuildError;
use crate::config::ConfigError;
use crate::infra::ExecutorError;
use crate::stack::StackError;

/// Errors that stop a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
  #[error(transparent)]
  Stack(#[from] StackError),

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error("build failed: {0}")]
  Build(#[from] BuildError),

  #[error("{operation} failed for {stack}: {source}")]
  Infra {
    operation: &'static str,
    stack: String,
    #[source]
    source: ExecutorError,
  },

  /// The user declined a confirmation prompt.
  #[error("canceled by user")]
  CanceledByUser,

  /// The run's cancellation token fired before a stage could start.
  #[error("pipeline interrupted")]
  Interrupted,

  #[error("confirmation failed: {0}")]
  Approval(#[source] std::io::Error),

  #[error("stack not found: {0}")]
  UnknownStack(String),

  #[error("invalid pipeline state: {0}")]
  InvalidState(String),

  #[error("stage task failed: {0}")]
  Join(String),

  #[error("{0}")]
  Failed(String),
}

impl PipelineError {
  /// True when the run stopped because the user said no.
  pub fn is_canceled_by_user(&self) -> bool {
    matches!(self, PipelineError::CanceledByUser)
  }
}
