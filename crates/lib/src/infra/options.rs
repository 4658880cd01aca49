//! Options for executor operations.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::consts::NAMESPACE_VAR;

/// Terraform `-var` overrides.
pub type Vars = BTreeMap<String, String>;

/// Variables isolating a deployment under `namespace`.
///
/// The namespace becomes a resource-name prefix, so it carries a trailing
/// `-`. No namespace (or an empty one) yields no variables.
pub fn namespace_vars(namespace: Option<&str>) -> Vars {
  let mut vars = Vars::new();
  if let Some(ns) = namespace.map(str::trim).filter(|ns| !ns.is_empty()) {
    vars.insert(NAMESPACE_VAR.to_string(), format!("{}-", ns));
  }
  vars
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitOptions {
  pub upgrade: bool,
  pub backend: bool,
  pub reconfigure: bool,
}

impl Default for InitOptions {
  fn default() -> Self {
    Self {
      upgrade: false,
      backend: true,
      reconfigure: false,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyOptions {
  pub auto_approve: bool,
  pub vars: Vars,
  pub var_file: Option<PathBuf>,
  /// Apply a saved plan instead of planning again.
  pub plan_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestroyOptions {
  pub auto_approve: bool,
  pub vars: Vars,
  pub var_file: Option<PathBuf>,
}
