//! The infrastructure tool, seen through the operations the pipeline needs.
//!
//! [`Executor`] is the port; [`TerraformCli`] is the adapter used in
//! production. Tests substitute recording implementations.

mod error;
mod options;
mod terraform;

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

pub use error::ExecutorError;
pub use options::{ApplyOptions, DestroyOptions, InitOptions, Vars, namespace_vars};
pub use terraform::TerraformCli;

/// Operations on one infrastructure working directory.
///
/// Every operation refuses to start once `cancel` has fired. An operation
/// that has started runs to completion.
#[async_trait]
pub trait Executor: Send + Sync {
  /// Prepare the directory (providers, backend). Idempotent.
  async fn init(&self, cancel: &CancellationToken, dir: &Path) -> Result<(), ExecutorError>;

  /// Report whether applying would change anything. Never mutates remote state.
  async fn plan(&self, cancel: &CancellationToken, dir: &Path) -> Result<bool, ExecutorError> {
    self.plan_with_vars(cancel, dir, &Vars::new()).await
  }

  async fn plan_with_vars(&self, cancel: &CancellationToken, dir: &Path, vars: &Vars) -> Result<bool, ExecutorError>;

  async fn apply(&self, cancel: &CancellationToken, dir: &Path, opts: &ApplyOptions) -> Result<(), ExecutorError>;

  async fn destroy(&self, cancel: &CancellationToken, dir: &Path, opts: &DestroyOptions) -> Result<(), ExecutorError>;

  /// Current outputs as a flat name → value map.
  async fn output(&self, cancel: &CancellationToken, dir: &Path) -> Result<BTreeMap<String, Value>, ExecutorError>;

  async fn validate(&self, _cancel: &CancellationToken, _dir: &Path) -> Result<(), ExecutorError> {
    Ok(())
  }
}
