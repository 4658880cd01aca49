//! Infrastructure tool failures, classified from stderr.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
  #[error("terraform state locked (lock ID: {lock_id}): {message}")]
  StateLocked { lock_id: String, message: String },

  #[error("validation error: {message}")]
  Validation { message: String },

  #[error("terraform {command} failed with exit code {code:?}: {stderr}")]
  Exit {
    command: String,
    code: Option<i32>,
    stderr: String,
  },

  #[error("failed to run {binary}: {source}")]
  Spawn {
    binary: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse terraform output: {0}")]
  Output(#[from] serde_json::Error),

  #[error("operation cancelled before start")]
  Cancelled,
}

impl ExecutorError {
  /// Turn a failed invocation into the most specific error its stderr allows.
  pub fn classify(command: &str, code: Option<i32>, stderr: &str) -> Self {
    let stderr = stderr.trim();
    if stderr.contains("Error locking state") || stderr.contains("Error acquiring the state lock") {
      return ExecutorError::StateLocked {
        lock_id: extract_lock_id(stderr),
        message: stderr.to_string(),
      };
    }
    if stderr.contains("Error: Invalid") || stderr.contains("Error: Unsupported") {
      return ExecutorError::Validation {
        message: stderr.to_string(),
      };
    }
    ExecutorError::Exit {
      command: command.to_string(),
      code,
      stderr: stderr.to_string(),
    }
  }

  pub fn is_state_lock(&self) -> bool {
    matches!(self, ExecutorError::StateLocked { .. })
  }
}

/// The lock ID terraform prints as `ID: <id>` inside the lock info block.
fn extract_lock_id(stderr: &str) -> String {
  stderr
    .find("ID: ")
    .map(|idx| {
      let rest = &stderr[idx + 4..];
      rest.lines().next().unwrap_or("").trim().to_string()
    })
    .unwrap_or_default()
}
