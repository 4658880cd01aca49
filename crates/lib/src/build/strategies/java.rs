use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use super::run_tool;
use crate::build::archive::Staging;
use crate::build::types::{Artifact, BuildConfig, BuildError, BuildResult};

/// Package a Maven project and copy the resulting jar to the output path.
pub async fn build_java(cancel: CancellationToken, cfg: BuildConfig) -> BuildResult {
  let pom = cfg.source_dir.join("pom.xml");
  if !pom.is_file() {
    return Err(BuildError::MissingFile(pom));
  }

  let args = vec!["clean".to_string(), "package".to_string(), "-DskipTests".to_string()];
  run_tool(&cancel, "mvn", &args, &cfg.source_dir, &cfg.env).await?;

  let target = cfg.source_dir.join("target");
  let jar = find_jar(&target)?;

  let staging = Staging::new(&cfg.output_path)?;
  tokio::fs::copy(&jar, staging.path()).await?;
  staging.commit(&cfg.output_path)?;
  Artifact::from_file(&cfg.output_path)
}

/// First jar in `target` by name, ignoring sources, javadoc and shade originals.
fn find_jar(target: &Path) -> Result<PathBuf, BuildError> {
  let mut jars: Vec<PathBuf> = std::fs::read_dir(target)
    .map_err(|_| BuildError::NoJar(target.to_path_buf()))?
    .filter_map(|entry| entry.ok().map(|e| e.path()))
    .filter(|path| {
      path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| {
          name.ends_with(".jar")
            && !name.ends_with("-sources.jar")
            && !name.ends_with("-javadoc.jar")
            && !name.ends_with("-original.jar")
            && !name.starts_with("original-")
        })
    })
    .collect();
  jars.sort();
  jars.into_iter().next().ok_or_else(|| BuildError::NoJar(target.to_path_buf()))
}
