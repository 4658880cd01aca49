mod cmd;
mod output;
mod prompts;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::output::OutputFormat;

/// forge - build and deploy serverless stacks with terraform
#[derive(Parser)]
#[command(name = "forge")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Project directory (default: current directory)
  #[arg(short = 'C', long, global = true, default_value = ".")]
  project_dir: PathBuf,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// List stacks in deploy order
  List {
    /// Output format
    #[arg(short = 'o', long = "format", value_enum, default_value = "text")]
    format: OutputFormat,
  },

  /// Build every stack's artifact
  Build {
    /// Only write placeholder artifacts where none exist (for terraform init)
    #[arg(long)]
    stub_only: bool,
  },

  /// Show pending infrastructure changes
  Plan {
    /// Prefix resources with this namespace (e.g. a PR number)
    #[arg(short, long)]
    namespace: Option<String>,
  },

  /// Build and deploy every stack
  Deploy {
    /// Prefix resources with this namespace (e.g. a PR number)
    #[arg(short, long)]
    namespace: Option<String>,

    /// Skip the confirmation prompt
    #[arg(long)]
    auto_approve: bool,
  },

  /// Destroy infrastructure, all stacks in reverse dependency order or just one
  Destroy {
    /// Only destroy this stack
    stack: Option<String>,

    /// Namespace the stacks were deployed with
    #[arg(short, long)]
    namespace: Option<String>,

    /// Skip the confirmation prompt
    #[arg(long)]
    auto_approve: bool,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let dir = cli.project_dir.as_path();
  match cli.command {
    Commands::List { format } => cmd::cmd_list(dir, format),
    Commands::Build { stub_only } => cmd::cmd_build(dir, stub_only),
    Commands::Plan { namespace } => cmd::cmd_plan(dir, namespace),
    Commands::Deploy {
      namespace,
      auto_approve,
    } => cmd::cmd_deploy(dir, namespace, auto_approve),
    Commands::Destroy {
      stack,
      namespace,
      auto_approve,
    } => cmd::cmd_destroy(dir, stack, namespace, auto_approve),
  }
}
