//! Naming conventions shared across the crate.

/// Stack declaration file looked for in every project subdirectory.
pub const STACK_FILE: &str = "stack.forge.toml";

/// Optional project configuration file at the project root.
pub const CONFIG_FILE: &str = "forge.toml";

/// Per-project working directory. Never scanned for stacks.
pub const FORGE_DIR: &str = ".forge";

/// Build output directory, relative to the project root.
pub const BUILD_DIR: &str = "build";

/// Artifact name for runtimes that execute a compiled binary.
pub const BOOTSTRAP_FILE: &str = "bootstrap";

/// Artifact name for runtimes that ship a zip bundle.
pub const ARCHIVE_FILE: &str = "lambda.zip";

/// Comment written into placeholder archives.
pub const STUB_COMMENT: &str = "Forge stub - will be replaced by actual build";

/// Terraform variable carrying the namespace prefix.
pub const NAMESPACE_VAR: &str = "namespace";

/// Runtimes accepted in a stack declaration.
pub const SUPPORTED_RUNTIMES: &[&str] = &[
  "go1.x",
  "python3.11",
  "python3.12",
  "python3.13",
  "nodejs20.x",
  "nodejs18.x",
  "provided.al2",
  "provided.al2023",
];

/// Directory names discovery never descends into (hidden directories are skipped too).
pub const SKIP_DIRS: &[&str] = &["node_modules", "target", "vendor"];

/// Environment variable overriding the configured region.
pub const ENV_REGION: &str = "FORGE_REGION";

/// Environment variable overriding the terraform binary.
pub const ENV_TERRAFORM: &str = "FORGE_TERRAFORM";
