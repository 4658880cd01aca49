use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::run_tool;
use crate::build::archive::{Staging, zip_dirs_blocking};
use crate::build::types::{Artifact, BuildConfig, BuildResult};

const REQUIREMENTS: &str = "requirements.txt";

/// Bundle Python sources and their `requirements.txt` dependencies into a zip.
pub async fn build_python(cancel: CancellationToken, cfg: BuildConfig) -> BuildResult {
  let staging = Staging::new(&cfg.output_path)?;
  let mut roots = Vec::new();

  if cfg.source_dir.join(REQUIREMENTS).is_file() {
    let deps = staging.scratch("deps");
    tokio::fs::create_dir_all(&deps).await?;
    let args = vec![
      "install".to_string(),
      "-r".to_string(),
      REQUIREMENTS.to_string(),
      "-t".to_string(),
      deps.to_string_lossy().to_string(),
      "--upgrade".to_string(),
    ];
    run_tool(&cancel, "pip", &args, &cfg.source_dir, &cfg.env).await?;
    roots.push(deps);
  } else {
    debug!(source = ?cfg.source_dir, "no requirements.txt, bundling sources only");
  }
  roots.push(cfg.source_dir.clone());

  zip_dirs_blocking(staging.path().to_path_buf(), roots, is_python_junk).await?;
  staging.commit(&cfg.output_path)?;
  Artifact::from_file(&cfg.output_path)
}

fn is_python_junk(name: &str) -> bool {
  name == "__pycache__"
    || name == ".DS_Store"
    || name.ends_with(".pyc")
    || name.ends_with(".pyo")
    || name.ends_with(".pyd")
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs::{self, File};
  use tempfile::TempDir;
  use zip::ZipArchive;

  #[tokio::test]
  async fn bundles_sources_without_requirements() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("worker");
    fs::create_dir_all(src.join("__pycache__")).unwrap();
    fs::write(src.join("handler.py"), "def handler(e, c): return e").unwrap();
    fs::write(src.join("__pycache__/handler.cpython-313.pyc"), "x").unwrap();
    fs::write(src.join(".DS_Store"), "x").unwrap();

    let cfg = BuildConfig {
      source_dir: src,
      output_path: temp.path().join("build/worker.zip"),
      runtime: "python3.13".to_string(),
      handler: ".".to_string(),
      env: Default::default(),
    };

    let artifact = build_python(CancellationToken::new(), cfg.clone()).await.unwrap();

    assert_eq!(artifact.path, cfg.output_path);
    let archive = ZipArchive::new(File::open(&artifact.path).unwrap()).unwrap();
    assert_eq!(archive.file_names().collect::<Vec<_>>(), ["handler.py"]);
  }

  #[tokio::test]
  async fn leaves_terraform_state_out_of_the_bundle() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("api");
    fs::create_dir_all(src.join(".terraform")).unwrap();
    fs::write(src.join("handler.py"), "def handler(e, c): return e").unwrap();
    fs::write(src.join(".terraform/x"), "provider").unwrap();
    fs::write(src.join("terraform.tfstate"), r#"{"secret":"s3cr3t"}"#).unwrap();
    fs::write(src.join("main.tf"), "resource {}").unwrap();
    fs::write(src.join("stack.forge.toml"), "[stack]").unwrap();

    let cfg = BuildConfig {
      source_dir: src,
      output_path: temp.path().join("build/api.zip"),
      runtime: "python3.12".to_string(),
      handler: ".".to_string(),
      env: Default::default(),
    };

    let artifact = build_python(CancellationToken::new(), cfg).await.unwrap();

    let archive = ZipArchive::new(File::open(&artifact.path).unwrap()).unwrap();
    assert_eq!(archive.file_names().collect::<Vec<_>>(), ["handler.py"]);
  }

  #[tokio::test]
  async fn identical_inputs_give_identical_checksums() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("worker");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("handler.py"), "print('hi')").unwrap();

    let cfg = |out: &str| BuildConfig {
      source_dir: src.clone(),
      output_path: temp.path().join(out),
      runtime: "python3.12".to_string(),
      handler: ".".to_string(),
      env: Default::default(),
    };

    let first = build_python(CancellationToken::new(), cfg("a.zip")).await.unwrap();
    let second = build_python(CancellationToken::new(), cfg("b.zip")).await.unwrap();

    assert_eq!(first.checksum, second.checksum);
  }

  #[test]
  fn junk_filter() {
    assert!(is_python_junk("mod.pyc"));
    assert!(is_python_junk("__pycache__"));
    assert!(!is_python_junk("handler.py"));
  }
}
