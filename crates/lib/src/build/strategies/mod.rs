//! Per-runtime build strategies.
//!
//! Each strategy is an async function `(cancel, BuildConfig) -> Result<Artifact>`
//! lifted into a [`BuildFunc`](super::BuildFunc) by the registry.

mod go;
mod java;
mod node;
mod python;

use std::collections::BTreeMap;
use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::info;

pub use go::build_go;
pub use java::build_java;
pub use node::build_node;
pub use python::build_python;

use super::types::BuildError;
use crate::util::process::{Captured, run_captured};

/// Run an external tool, failing on a non-zero exit.
///
/// Refuses to start once `cancel` has fired; a tool that already started
/// runs to completion.
pub(crate) async fn run_tool(
  cancel: &CancellationToken,
  tool: &str,
  args: &[String],
  cwd: &Path,
  env: &BTreeMap<String, String>,
) -> Result<Captured, BuildError> {
  if cancel.is_cancelled() {
    return Err(BuildError::Cancelled);
  }

  info!(tool = %tool, cwd = ?cwd, "running build tool");
  let out = run_captured(tool, args, cwd, env)
    .await
    .map_err(|source| BuildError::ToolSpawn {
      tool: tool.to_string(),
      source,
    })?;

  if !out.success() {
    return Err(BuildError::ToolFailed {
      tool: format!("{} {}", tool, args.join(" ")),
      code: out.code,
      stderr: out.stderr.trim().to_string(),
    });
  }
  Ok(out)
}
