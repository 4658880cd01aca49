//! [`Executor`] backed by the `terraform` CLI.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::Executor;
use super::error::ExecutorError;
use super::options::{ApplyOptions, DestroyOptions, InitOptions, Vars};
use crate::util::process::{Captured, run_captured};

/// Drives a terraform (or compatible) binary as a child process.
///
/// Every run is captured with `-input=false` and never reads from the
/// terminal. Confirmation belongs to the caller: apply and destroy without
/// `auto_approve` are refused by terraform itself.
#[derive(Debug, Clone)]
pub struct TerraformCli {
  binary: String,
  env: BTreeMap<String, String>,
  init: InitOptions,
}

impl Default for TerraformCli {
  fn default() -> Self {
    Self::new("terraform")
  }
}

impl TerraformCli {
  pub fn new(binary: impl Into<String>) -> Self {
    Self {
      binary: binary.into(),
      env: BTreeMap::from([("TF_IN_AUTOMATION".to_string(), "1".to_string())]),
      init: InitOptions::default(),
    }
  }

  /// Export `AWS_REGION` to every invocation.
  pub fn with_region(mut self, region: Option<&str>) -> Self {
    if let Some(region) = region {
      self.env.insert("AWS_REGION".to_string(), region.to_string());
    }
    self
  }

  pub fn with_init_options(mut self, init: InitOptions) -> Self {
    self.init = init;
    self
  }

  pub fn binary(&self) -> &str {
    &self.binary
  }

  fn init_args(&self) -> Vec<String> {
    let mut args = strings(&["init", "-input=false", "-no-color"]);
    if self.init.upgrade {
      args.push("-upgrade".to_string());
    }
    if !self.init.backend {
      args.push("-backend=false".to_string());
    }
    if self.init.reconfigure {
      args.push("-reconfigure".to_string());
    }
    args
  }

  async fn captured(
    &self,
    cancel: &CancellationToken,
    dir: &Path,
    args: &[String],
  ) -> Result<Captured, ExecutorError> {
    if cancel.is_cancelled() {
      return Err(ExecutorError::Cancelled);
    }
    run_captured(&self.binary, args, dir, &self.env)
      .await
      .map_err(|source| ExecutorError::Spawn {
        binary: self.binary.clone(),
        source,
      })
  }

  async fn checked(
    &self,
    cancel: &CancellationToken,
    dir: &Path,
    args: &[String],
  ) -> Result<Captured, ExecutorError> {
    let out = self.captured(cancel, dir, args).await?;
    if !out.success() {
      return Err(ExecutorError::classify(&args[0], out.code, &out.stderr));
    }
    Ok(out)
  }
}

fn strings(items: &[&str]) -> Vec<String> {
  items.iter().map(|s| s.to_string()).collect()
}

fn push_vars(args: &mut Vec<String>, vars: &Vars) {
  for (key, value) in vars {
    args.push("-var".to_string());
    args.push(format!("{}={}", key, value));
  }
}

fn plan_args(vars: &Vars) -> Vec<String> {
  let mut args = strings(&["plan", "-input=false", "-no-color", "-detailed-exitcode"]);
  push_vars(&mut args, vars);
  args
}

fn apply_args(opts: &ApplyOptions) -> Vec<String> {
  let mut args = strings(&["apply", "-input=false", "-no-color"]);
  if opts.auto_approve {
    args.push("-auto-approve".to_string());
  }
  // A saved plan already carries its variables.
  if let Some(plan) = &opts.plan_file {
    args.push(plan.to_string_lossy().to_string());
    return args;
  }
  if let Some(file) = &opts.var_file {
    args.push(format!("-var-file={}", file.display()));
  }
  push_vars(&mut args, &opts.vars);
  args
}

fn destroy_args(opts: &DestroyOptions) -> Vec<String> {
  let mut args = strings(&["destroy", "-input=false", "-no-color"]);
  if opts.auto_approve {
    args.push("-auto-approve".to_string());
  }
  if let Some(file) = &opts.var_file {
    args.push(format!("-var-file={}", file.display()));
  }
  push_vars(&mut args, &opts.vars);
  args
}

/// Flatten `terraform output -json` (`{name: {value, type, sensitive}}`) to `{name: value}`.
fn flatten_outputs(json: &str) -> Result<BTreeMap<String, Value>, ExecutorError> {
  if json.trim().is_empty() {
    return Ok(BTreeMap::new());
  }
  let raw: BTreeMap<String, Value> = serde_json::from_str(json)?;
  Ok(
    raw
      .into_iter()
      .map(|(name, entry)| {
        let value = match entry {
          Value::Object(mut fields) if fields.contains_key("value") => fields.remove("value").unwrap_or(Value::Null),
          other => other,
        };
        (name, value)
      })
      .collect(),
  )
}

#[async_trait]
impl Executor for TerraformCli {
  async fn init(&self, cancel: &CancellationToken, dir: &Path) -> Result<(), ExecutorError> {
    info!(dir = ?dir, "terraform init");
    self.checked(cancel, dir, &self.init_args()).await?;
    Ok(())
  }

  async fn plan_with_vars(&self, cancel: &CancellationToken, dir: &Path, vars: &Vars) -> Result<bool, ExecutorError> {
    info!(dir = ?dir, vars = vars.len(), "terraform plan");
    let args = plan_args(vars);
    let out = self.captured(cancel, dir, &args).await?;
    match out.code {
      Some(0) => Ok(false),
      Some(2) => Ok(true),
      code => Err(ExecutorError::classify("plan", code, &out.stderr)),
    }
  }

  async fn apply(&self, cancel: &CancellationToken, dir: &Path, opts: &ApplyOptions) -> Result<(), ExecutorError> {
    info!(dir = ?dir, auto_approve = opts.auto_approve, "terraform apply");
    self.checked(cancel, dir, &apply_args(opts)).await?;
    Ok(())
  }

  async fn destroy(&self, cancel: &CancellationToken, dir: &Path, opts: &DestroyOptions) -> Result<(), ExecutorError> {
    info!(dir = ?dir, auto_approve = opts.auto_approve, "terraform destroy");
    self.checked(cancel, dir, &destroy_args(opts)).await?;
    Ok(())
  }

  async fn output(&self, cancel: &CancellationToken, dir: &Path) -> Result<BTreeMap<String, Value>, ExecutorError> {
    let out = self.checked(cancel, dir, &strings(&["output", "-json", "-no-color"])).await?;
    let outputs = flatten_outputs(&out.stdout)?;
    debug!(dir = ?dir, count = outputs.len(), "terraform outputs");
    Ok(outputs)
  }

  async fn validate(&self, cancel: &CancellationToken, dir: &Path) -> Result<(), ExecutorError> {
    self.checked(cancel, dir, &strings(&["validate", "-no-color"])).await?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::PathBuf;

  #[test]
  fn init_args_follow_options() {
    let tf = TerraformCli::default();
    assert_eq!(tf.init_args(), ["init", "-input=false", "-no-color"]);

    let tf = TerraformCli::default().with_init_options(InitOptions {
      upgrade: true,
      backend: false,
      reconfigure: true,
    });
    assert_eq!(
      tf.init_args(),
      ["init", "-input=false", "-no-color", "-upgrade", "-backend=false", "-reconfigure"]
    );
  }

  #[test]
  fn plan_args_carry_vars() {
    let vars = Vars::from([("namespace".to_string(), "pr-1-".to_string())]);
    assert_eq!(
      plan_args(&vars),
      ["plan", "-input=false", "-no-color", "-detailed-exitcode", "-var", "namespace=pr-1-"]
    );
  }

  #[test]
  fn apply_args_auto_approve() {
    let opts = ApplyOptions {
      auto_approve: true,
      vars: Vars::from([("namespace".to_string(), "dev-".to_string())]),
      var_file: Some(PathBuf::from("prod.tfvars")),
      plan_file: None,
    };
    assert_eq!(
      apply_args(&opts),
      [
        "apply",
        "-input=false",
        "-no-color",
        "-auto-approve",
        "-var-file=prod.tfvars",
        "-var",
        "namespace=dev-"
      ]
    );
  }

  #[test]
  fn apply_args_with_saved_plan_skip_vars() {
    let opts = ApplyOptions {
      auto_approve: true,
      vars: Vars::from([("namespace".to_string(), "dev-".to_string())]),
      var_file: None,
      plan_file: Some(PathBuf::from("tfplan")),
    };
    assert_eq!(apply_args(&opts), ["apply", "-input=false", "-no-color", "-auto-approve", "tfplan"]);
  }

  #[test]
  fn mutations_never_take_input() {
    assert_eq!(destroy_args(&DestroyOptions::default()), ["destroy", "-input=false", "-no-color"]);
    assert_eq!(apply_args(&ApplyOptions::default()), ["apply", "-input=false", "-no-color"]);
  }

  #[test]
  fn flattens_outputs() {
    let json = r#"{"api_url":{"sensitive":false,"type":"string","value":"https://api"},"count":{"type":"number","value":3}}"#;
    let outputs = flatten_outputs(json).unwrap();

    assert_eq!(outputs["api_url"], Value::String("https://api".to_string()));
    assert_eq!(outputs["count"], serde_json::json!(3));
    assert!(flatten_outputs("").unwrap().is_empty());
    assert!(flatten_outputs("not json").is_err());
  }

  #[cfg(unix)]
  mod fake_binary {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    const SCRIPT: &str = r#"#!/bin/sh
echo "$@" >> "$(dirname "$0")/calls.log"
echo "region=$AWS_REGION" >> "$(dirname "$0")/calls.log"
case "$1" in
  plan) exit 2 ;;
  output) echo '{"url":{"sensitive":false,"type":"string","value":"https://x"}}' ;;
  destroy) echo "Error: Invalid reference" >&2; exit 1 ;;
esac
exit 0
"#;

    fn fake_terraform(dir: &Path) -> TerraformCli {
      let bin = dir.join("terraform");
      std::fs::write(&bin, SCRIPT).unwrap();
      std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();
      TerraformCli::new(bin.to_string_lossy()).with_region(Some("eu-west-1"))
    }

    #[tokio::test]
    async fn drives_lifecycle() {
      let temp = TempDir::new().unwrap();
      let tf = fake_terraform(temp.path());
      let cancel = CancellationToken::new();

      tf.init(&cancel, temp.path()).await.unwrap();
      assert!(tf.plan(&cancel, temp.path()).await.unwrap());
      tf.apply(
        &cancel,
        temp.path(),
        &ApplyOptions {
          auto_approve: true,
          ..Default::default()
        },
      )
      .await
      .unwrap();
      let outputs = tf.output(&cancel, temp.path()).await.unwrap();
      assert_eq!(outputs["url"], Value::String("https://x".to_string()));

      let log = std::fs::read_to_string(temp.path().join("calls.log")).unwrap();
      assert!(log.contains("init -input=false -no-color"));
      assert!(log.contains("apply -input=false -no-color -auto-approve"));
      assert!(log.contains("region=eu-west-1"));
    }

    #[tokio::test]
    async fn unapproved_apply_stays_captured() {
      let temp = TempDir::new().unwrap();
      let tf = fake_terraform(temp.path());

      tf.apply(&CancellationToken::new(), temp.path(), &ApplyOptions::default())
        .await
        .unwrap();

      let log = std::fs::read_to_string(temp.path().join("calls.log")).unwrap();
      assert!(log.contains("apply -input=false -no-color"));
      assert!(!log.contains("-auto-approve"));
    }

    #[tokio::test]
    async fn classifies_failures() {
      let temp = TempDir::new().unwrap();
      let tf = fake_terraform(temp.path());
      let opts = DestroyOptions {
        auto_approve: true,
        ..Default::default()
      };

      let err = tf.destroy(&CancellationToken::new(), temp.path(), &opts).await.unwrap_err();
      assert!(matches!(err, ExecutorError::Validation { .. }));
    }

    #[tokio::test]
    async fn cancelled_token_starts_nothing() {
      let temp = TempDir::new().unwrap();
      let tf = fake_terraform(temp.path());
      let cancel = CancellationToken::new();
      cancel.cancel();

      assert!(matches!(tf.init(&cancel, temp.path()).await, Err(ExecutorError::Cancelled)));
      assert!(!temp.path().join("calls.log").exists());
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
      let temp = TempDir::new().unwrap();
      let tf = TerraformCli::new(temp.path().join("absent").to_string_lossy());
      let err = tf.init(&CancellationToken::new(), temp.path()).await.unwrap_err();
      assert!(matches!(err, ExecutorError::Spawn { .. }));
    }
  }
}
