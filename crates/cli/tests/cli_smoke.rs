//! CLI smoke tests for forge.
//!
//! These tests run the `forge` binary against throwaway projects and check
//! exit codes and rendered output. Terraform is replaced by a shell script.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serial_test::serial;
use tempfile::TempDir;

/// Get a Command for the forge binary.
fn forge_cmd() -> Command {
  cargo_bin_cmd!("forge")
}

fn declare(root: &Path, dir: &str, body: &str) {
  let stack_dir = root.join(dir);
  fs::create_dir_all(&stack_dir).unwrap();
  fs::write(stack_dir.join("stack.forge.toml"), body).unwrap();
}

/// `shared` (pre-built), `api` (python) and `worker` (node); both depend on `shared`.
fn project() -> TempDir {
  let temp = TempDir::new().unwrap();
  let root = temp.path();
  declare(root, "shared", "[stack]\nname = \"shared\"\nruntime = \"provided.al2\"\n");
  declare(
    root,
    "api",
    "[stack]\nname = \"api\"\nruntime = \"python3.12\"\ndependencies = [\"shared\"]\n",
  );
  fs::write(root.join("api/handler.py"), "def handler(event, context):\n    return event\n").unwrap();
  declare(
    root,
    "worker",
    "[stack]\nname = \"worker\"\nruntime = \"nodejs20.x\"\ndependencies = [\"shared\"]\n",
  );
  fs::write(root.join("worker/index.js"), "exports.handler = async () => ({});\n").unwrap();
  temp
}

/// Write an executable stand-in for terraform.
#[cfg(unix)]
fn fake_terraform(dir: &Path, script: &str) -> PathBuf {
  use std::os::unix::fs::PermissionsExt;

  let path = dir.join("fake-terraform");
  fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
  fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
  path
}

#[cfg(unix)]
const HAPPY_TERRAFORM: &str = r#"case "$1" in
  output) echo '{"url":{"value":"https://example.test","type":"string","sensitive":false}}' ;;
esac
exit 0"#;

// =============================================================================
// Help & Version
// =============================================================================

#[test]
#[serial]
fn help_flag_works() {
  forge_cmd()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
#[serial]
fn version_flag_works() {
  forge_cmd()
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("forge"));
}

#[test]
#[serial]
fn subcommand_help_works() {
  for cmd in &["list", "build", "plan", "deploy", "destroy"] {
    forge_cmd()
      .arg(cmd)
      .arg("--help")
      .assert()
      .success()
      .stdout(predicate::str::contains("Usage"));
  }
}

// =============================================================================
// list
// =============================================================================

#[test]
#[serial]
fn list_groups_stacks_into_waves() {
  let temp = project();

  forge_cmd()
    .arg("-C")
    .arg(temp.path())
    .arg("list")
    .assert()
    .success()
    .stdout(predicate::str::contains("Found 3 stack(s)"))
    .stdout(predicate::str::contains("Wave 1:"))
    .stdout(predicate::str::contains("Wave 2:"))
    .stdout(predicate::str::contains("api (python3.12)"));
}

#[test]
#[serial]
fn list_json_reports_orders() {
  let temp = project();

  let output = forge_cmd()
    .arg("-C")
    .arg(temp.path())
    .args(["list", "--format", "json"])
    .output()
    .unwrap();

  assert!(output.status.success());
  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["deploy_order"], serde_json::json!(["shared", "api", "worker"]));
  assert_eq!(json["destroy_order"], serde_json::json!(["worker", "api", "shared"]));
  assert_eq!(json["stacks"][0]["wave"], 1);
}

#[test]
#[serial]
fn list_without_stacks_fails() {
  let temp = TempDir::new().unwrap();

  forge_cmd()
    .arg("-C")
    .arg(temp.path())
    .arg("list")
    .assert()
    .failure()
    .stderr(predicate::str::contains("no stacks found"));
}

#[test]
#[serial]
fn list_rejects_cycles() {
  let temp = TempDir::new().unwrap();
  declare(
    temp.path(),
    "a",
    "[stack]\nname = \"a\"\nruntime = \"go1.x\"\ndependencies = [\"b\"]\n",
  );
  declare(
    temp.path(),
    "b",
    "[stack]\nname = \"b\"\nruntime = \"go1.x\"\ndependencies = [\"a\"]\n",
  );

  forge_cmd()
    .arg("-C")
    .arg(temp.path())
    .arg("list")
    .assert()
    .failure()
    .stderr(predicate::str::contains("cyclic dependency"));
}

#[test]
#[serial]
fn unsupported_runtime_is_named() {
  let temp = project();
  declare(temp.path(), "legacy", "[stack]\nname = \"legacy\"\nruntime = \"ruby3.2\"\n");

  forge_cmd()
    .arg("-C")
    .arg(temp.path())
    .arg("list")
    .assert()
    .failure()
    .stderr(predicate::str::contains("ruby3.2"));
}

#[test]
#[serial]
fn missing_project_dir_fails() {
  forge_cmd()
    .args(["-C", "/nonexistent/forge/project", "list"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("Project directory not found"));
}

// =============================================================================
// build
// =============================================================================

#[test]
#[serial]
fn build_writes_artifacts() {
  let temp = project();

  forge_cmd()
    .arg("-C")
    .arg(temp.path())
    .arg("build")
    .assert()
    .success()
    .stdout(predicate::str::contains("[api] Built: api.zip"))
    .stdout(predicate::str::contains("Built 2 artifact(s)"));

  assert!(temp.path().join(".forge/build/api.zip").is_file());
  assert!(temp.path().join(".forge/build/worker.zip").is_file());
}

#[test]
#[serial]
fn build_stub_only_writes_placeholders() {
  let temp = project();

  forge_cmd()
    .arg("-C")
    .arg(temp.path())
    .args(["build", "--stub-only"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Created 3 stub artifact(s)"))
    .stdout(predicate::str::contains("Artifacts in place for 3 stack(s)"))
    .stdout(predicate::str::contains("Building").not());

  for name in ["shared.zip", "api.zip", "worker.zip"] {
    assert!(temp.path().join(".forge/build").join(name).is_file(), "{name} missing");
  }
}

#[test]
#[serial]
fn invalid_config_fails() {
  let temp = project();
  fs::write(temp.path().join("forge.toml"), "[build]\nparallelism = 0\n").unwrap();

  forge_cmd()
    .arg("-C")
    .arg(temp.path())
    .arg("build")
    .assert()
    .failure()
    .stderr(predicate::str::contains("parallelism"));
}

// =============================================================================
// plan / deploy / destroy
// =============================================================================

#[cfg(unix)]
#[test]
#[serial]
fn plan_reports_each_stack() {
  let temp = project();
  let tf = fake_terraform(temp.path(), HAPPY_TERRAFORM);

  forge_cmd()
    .arg("-C")
    .arg(temp.path())
    .args(["plan", "--namespace", "pr-9"])
    .env("FORGE_TERRAFORM", &tf)
    .assert()
    .success()
    .stdout(predicate::str::contains("Deploying to namespace: pr-9"))
    .stdout(predicate::str::contains("[worker] No changes detected"))
    .stdout(predicate::str::contains("Planned 3 stack(s)"));
}

#[cfg(unix)]
#[test]
#[serial]
fn deploy_with_auto_approve() {
  let temp = project();
  let tf = fake_terraform(temp.path(), HAPPY_TERRAFORM);

  forge_cmd()
    .arg("-C")
    .arg(temp.path())
    .args(["deploy", "--auto-approve"])
    .env("FORGE_TERRAFORM", &tf)
    .assert()
    .success()
    .stdout(predicate::str::contains("[1/3] Applying shared..."))
    .stdout(predicate::str::contains("api.url: https://example.test"))
    .stdout(predicate::str::contains("Deployed 3 stack(s)"));
}

#[cfg(unix)]
#[test]
#[serial]
fn deploy_refuses_to_prompt_without_terminal() {
  let temp = project();
  let tf = fake_terraform(temp.path(), HAPPY_TERRAFORM);

  forge_cmd()
    .arg("-C")
    .arg(temp.path())
    .arg("deploy")
    .env("FORGE_TERRAFORM", &tf)
    .assert()
    .failure()
    .stderr(predicate::str::contains("non-interactive"))
    .stdout(predicate::str::contains("Applying").not());
}

#[cfg(unix)]
#[test]
#[serial]
fn destroy_runs_in_reverse_order() {
  let temp = project();
  let tf = fake_terraform(temp.path(), HAPPY_TERRAFORM);

  forge_cmd()
    .arg("-C")
    .arg(temp.path())
    .args(["destroy", "--auto-approve"])
    .env("FORGE_TERRAFORM", &tf)
    .assert()
    .success()
    .stdout(predicate::str::contains("[1/3] Destroying worker..."))
    .stdout(predicate::str::contains("[3/3] Destroying shared..."))
    .stdout(predicate::str::contains("Destroyed 3 stack(s)"));
}

#[cfg(unix)]
#[test]
#[serial]
fn destroy_named_stack_only() {
  let temp = project();
  let tf = fake_terraform(temp.path(), HAPPY_TERRAFORM);

  forge_cmd()
    .arg("-C")
    .arg(temp.path())
    .args(["destroy", "api", "--auto-approve"])
    .env("FORGE_TERRAFORM", &tf)
    .assert()
    .success()
    .stdout(predicate::str::contains("[1/1] Destroying api..."))
    .stdout(predicate::str::contains("Destroying worker").not())
    .stdout(predicate::str::contains("Destroyed 1 stack(s)"));
}

#[cfg(unix)]
#[test]
#[serial]
fn destroy_unknown_stack_fails() {
  let temp = project();
  let tf = fake_terraform(temp.path(), HAPPY_TERRAFORM);

  forge_cmd()
    .arg("-C")
    .arg(temp.path())
    .args(["destroy", "billing", "--auto-approve"])
    .env("FORGE_TERRAFORM", &tf)
    .assert()
    .failure()
    .stderr(predicate::str::contains("stack not found: billing"));
}

#[cfg(unix)]
#[test]
#[serial]
fn terraform_failure_is_reported() {
  let temp = project();
  let tf = fake_terraform(temp.path(), "echo 'Error: backend unreachable' >&2\nexit 1");

  forge_cmd()
    .arg("-C")
    .arg(temp.path())
    .args(["destroy", "--auto-approve"])
    .env("FORGE_TERRAFORM", &tf)
    .assert()
    .failure()
    .stderr(predicate::str::contains("init failed for shared"));
}
