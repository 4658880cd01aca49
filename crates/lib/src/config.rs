//! Project configuration (`forge.toml`).
//!
//! The file is optional; every setting has a default. `FORGE_REGION` and
//! `FORGE_TERRAFORM` override the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::{BUILD_DIR, CONFIG_FILE, ENV_REGION, ENV_TERRAFORM, FORGE_DIR};

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read {}: {source}", .path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse {}: {source}", .path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("invalid configuration: {0}")]
  Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForgeConfig {
  pub project: ProjectConfig,
  pub build: BuildSettings,
  pub terraform: TerraformSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
  pub name: Option<String>,
  /// Exported as `AWS_REGION` to terraform.
  pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildSettings {
  /// Maximum concurrent builds. `1` builds sequentially.
  pub parallelism: usize,
  /// Wrap builders with the in-memory cache.
  pub cache: bool,
}

impl Default for BuildSettings {
  fn default() -> Self {
    Self {
      parallelism: 1,
      cache: true,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TerraformSettings {
  pub binary: String,
}

impl Default for TerraformSettings {
  fn default() -> Self {
    Self {
      binary: "terraform".to_string(),
    }
  }
}

impl ForgeConfig {
  /// Load `forge.toml` from `project_dir`, apply environment overrides and validate.
  pub fn load(project_dir: &Path) -> Result<Self, ConfigError> {
    let path = project_dir.join(CONFIG_FILE);
    let mut config = if path.exists() {
      let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
      })?;
      toml::from_str(&content).map_err(|source| ConfigError::Parse { path, source })?
    } else {
      debug!(dir = ?project_dir, "no forge.toml, using defaults");
      ForgeConfig::default()
    };

    config.apply_env();
    config.validate()?;
    Ok(config)
  }

  fn apply_env(&mut self) {
    if let Ok(region) = std::env::var(ENV_REGION)
      && !region.is_empty()
    {
      self.project.region = Some(region);
    }
    if let Ok(binary) = std::env::var(ENV_TERRAFORM)
      && !binary.is_empty()
    {
      self.terraform.binary = binary;
    }
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.build.parallelism == 0 {
      return Err(ConfigError::Invalid("build.parallelism must be at least 1".to_string()));
    }
    if self.project.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
      return Err(ConfigError::Invalid("project.name must not be empty".to_string()));
    }
    if self.project.region.as_deref().is_some_and(|r| r.trim().is_empty()) {
      return Err(ConfigError::Invalid("project.region must not be empty".to_string()));
    }
    if self.terraform.binary.trim().is_empty() {
      return Err(ConfigError::Invalid("terraform.binary must not be empty".to_string()));
    }
    Ok(())
  }
}

/// `<project>/.forge/build`
pub fn build_dir(project_dir: &Path) -> PathBuf {
  project_dir.join(FORGE_DIR).join(BUILD_DIR)
}
