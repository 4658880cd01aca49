use std::collections::BTreeMap;

use tokio_util::sync::CancellationToken;

use super::run_tool;
use crate::build::archive::Staging;
use crate::build::types::{Artifact, BuildConfig, BuildResult};

/// Cross-compile a Go handler into a static `bootstrap` binary for Lambda.
pub async fn build_go(cancel: CancellationToken, cfg: BuildConfig) -> BuildResult {
  let staging = Staging::new(&cfg.output_path)?;

  let mut env: BTreeMap<String, String> = cfg.env.clone();
  env.insert("GOOS".to_string(), "linux".to_string());
  env.insert("GOARCH".to_string(), "amd64".to_string());
  env.insert("CGO_ENABLED".to_string(), "0".to_string());

  let args = go_build_args(&cfg.handler, &staging.path().to_string_lossy());
  run_tool(&cancel, "go", &args, &cfg.source_dir, &env).await?;

  staging.commit(&cfg.output_path)?;
  Artifact::from_file(&cfg.output_path)
}

fn go_build_args(handler: &str, out: &str) -> Vec<String> {
  let package = match handler.trim_start_matches("./") {
    "" | "." => ".".to_string(),
    rest => format!("./{}", rest),
  };
  [
    "build",
    "-tags",
    "lambda.norpc",
    "-ldflags",
    "-s -w",
    "-o",
    out,
    package.as_str(),
  ]
  .iter()
  .map(|s| s.to_string())
  .collect()
}
