//! Child-process helpers.
//!
//! Every external tool (compilers, package managers, terraform) goes through
//! [`run_captured`] with stdin closed, so no tool can wait on the terminal.
//! Processes are never killed once started; cancellation is checked by the
//! callers before spawning.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

/// Captured result of a finished child process.
#[derive(Debug, Clone)]
pub struct Captured {
  pub code: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

impl Captured {
  pub fn success(&self) -> bool {
    self.code == Some(0)
  }
}

/// Run a program to completion, capturing stdout and stderr.
///
/// A non-zero exit status is not an error here; callers inspect
/// [`Captured::code`] and classify the failure themselves.
pub async fn run_captured(
  program: &str,
  args: &[String],
  cwd: &Path,
  env: &BTreeMap<String, String>,
) -> std::io::Result<Captured> {
  debug!(program = %program, args = ?args, cwd = ?cwd, "spawning process");

  let output = Command::new(program)
    .args(args)
    .current_dir(cwd)
    .envs(env)
    .stdin(Stdio::null())
    .output()
    .await?;

  let captured = Captured {
    code: output.status.code(),
    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
  };

  if !captured.success() {
    if !captured.stderr.is_empty() {
      debug!(stderr = %captured.stderr, "process stderr");
    }
    if !captured.stdout.is_empty() {
      debug!(stdout = %captured.stdout, "process stdout");
    }
  }

  Ok(captured)
}

#[cfg(all(test, unix))]
mod tests {
  use super::*;
  use crate::util::testutil::shell_cmd;
  use tempfile::TempDir;

  #[tokio::test]
  async fn captures_stdout() {
    let temp = TempDir::new().unwrap();
    let (sh, args) = shell_cmd("echo hello");

    let out = run_captured(sh, &args, temp.path(), &BTreeMap::new()).await.unwrap();

    assert!(out.success());
    assert_eq!(out.stdout.trim(), "hello");
  }

  #[tokio::test]
  async fn reports_exit_code_and_stderr() {
    let temp = TempDir::new().unwrap();
    let (sh, args) = shell_cmd("echo broken >&2; exit 3");

    let out = run_captured(sh, &args, temp.path(), &BTreeMap::new()).await.unwrap();

    assert!(!out.success());
    assert_eq!(out.code, Some(3));
    assert_eq!(out.stderr.trim(), "broken");
  }

  #[tokio::test]
  async fn passes_environment_and_cwd() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("marker"), "").unwrap();
    let (sh, args) = shell_cmd("ls; echo \"$FORGE_TEST_VAR\"");
    let env = BTreeMap::from([("FORGE_TEST_VAR".to_string(), "value".to_string())]);

    let out = run_captured(sh, &args, temp.path(), &env).await.unwrap();

    assert!(out.stdout.contains("marker"));
    assert!(out.stdout.contains("value"));
  }

  #[tokio::test]
  async fn missing_program_is_io_error() {
    let temp = TempDir::new().unwrap();
    let result = run_captured("forge-no-such-binary", &[], temp.path(), &BTreeMap::new()).await;
    assert!(result.is_err());
  }
}
