use tokio_util::sync::CancellationToken;

use super::run_tool;
use crate::build::archive::{Staging, zip_dirs_blocking};
use crate::build::types::{Artifact, BuildConfig, BuildResult};

/// Install production dependencies (when there is a `package.json`) and zip the stack.
pub async fn build_node(cancel: CancellationToken, cfg: BuildConfig) -> BuildResult {
  let staging = Staging::new(&cfg.output_path)?;

  if cfg.source_dir.join("package.json").is_file() {
    let args = vec!["install".to_string(), "--production".to_string()];
    run_tool(&cancel, "npm", &args, &cfg.source_dir, &cfg.env).await?;
  }

  zip_dirs_blocking(staging.path().to_path_buf(), vec![cfg.source_dir.clone()], |name| {
    name == ".DS_Store"
  })
  .await?;
  staging.commit(&cfg.output_path)?;
  Artifact::from_file(&cfg.output_path)
}
