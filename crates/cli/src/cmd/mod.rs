//! Command implementations.
//!
//! Each command loads the project, assembles a pipeline from
//! [`Conventions`], runs it on a fresh runtime and renders the events as they
//! arrive.

mod build;
mod deploy;
mod destroy;
mod list;
mod plan;

pub use build::cmd_build;
pub use deploy::cmd_deploy;
pub use destroy::cmd_destroy;
pub use list::cmd_list;
pub use plan::cmd_plan;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use forge_lib::config::ForgeConfig;
use forge_lib::infra::TerraformCli;
use forge_lib::pipeline::{Approval, Conventions, EventPipeline, PipelineError, State, registry_for};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::output::{print_event, print_info};
use crate::prompts::confirm;

/// A loaded project: its canonical directory and configuration.
pub(crate) struct Project {
  pub dir: PathBuf,
  pub config: ForgeConfig,
}

impl Project {
  pub fn load(dir: &Path) -> Result<Self> {
    let dir = dunce::canonicalize(dir).with_context(|| format!("Project directory not found: {}", dir.display()))?;
    let config = ForgeConfig::load(&dir).context("Failed to load forge.toml")?;
    debug!(dir = %dir.display(), ?config, "project loaded");
    Ok(Self { dir, config })
  }

  pub fn conventions(&self) -> Conventions {
    let executor = TerraformCli::new(self.config.terraform.binary.clone()).with_region(self.config.project.region.as_deref());
    Conventions::new(Arc::new(registry_for(&self.config.build)), Arc::new(executor))
      .with_parallelism(self.config.build.parallelism)
  }
}

/// Approval for mutating commands: automatic, or an interactive `[y/N]` prompt.
pub(crate) fn approval(auto_approve: bool) -> Approval {
  if auto_approve {
    return Approval::Auto;
  }
  Approval::Prompt(Arc::new(|question: &str| {
    confirm(question, false).map_err(|e| io::Error::other(e.to_string()))
  }))
}

/// Run `pipeline`, printing events as they are emitted.
///
/// Returns `None` when the user declined a confirmation. Ctrl-C stops the
/// run before its next stage.
pub(crate) fn run(pipeline: &EventPipeline, project: &Project, action: &str) -> Result<Option<State>> {
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let (result, _events) = rt.block_on(async {
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        warn!("interrupt received, stopping after the current step");
        interrupt.cancel();
      }
    });
    pipeline
      .run_with_sink(&cancel, State::new(&project.dir), Arc::new(print_event))
      .await
  });

  match result {
    Ok(state) => Ok(Some(state)),
    Err(PipelineError::CanceledByUser) => {
      print_info("Canceled by user");
      Ok(None)
    }
    Err(e) => Err(e).with_context(|| format!("{} failed", action)),
  }
}
