//! Terminal rendering for forge commands.
//!
//! Pipeline events go to stdout as they arrive; warnings and errors go to
//! stderr. Colors are only used when the stream supports them.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use forge_lib::pipeline::{EventLevel, StageEvent};
use forge_lib::util::hash::ContentHash;
use owo_colors::{OwoColorize, Stream};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

/// Separates a stack from the stacks it depends on in listings.
pub const DEPENDS_ON: &str = "→";

const SUCCESS: &str = "✓";
const WARNING: &str = "⚠";
const ERROR: &str = "✗";
const INFO: &str = "•";

/// Leading characters of an artifact checksum, enough to tell builds apart.
pub fn short_checksum(checksum: &ContentHash) -> &str {
  let hex = checksum.0.as_str();
  &hex[..hex.len().min(12)]
}

/// Artifact sizes: kilobytes below one megabyte, megabytes above.
pub fn format_size(bytes: u64) -> String {
  const KB: f64 = 1024.0;
  const MB: f64 = KB * 1024.0;

  let bytes = bytes as f64;
  if bytes >= MB {
    format!("{:.2} MB", bytes / MB)
  } else {
    format!("{:.1} KB", bytes / KB)
  }
}

/// Wall time of a command run.
pub fn format_elapsed(elapsed: Duration) -> String {
  let secs = elapsed.as_secs();
  if secs >= 60 {
    format!("{}m {}s", secs / 60, secs % 60)
  } else {
    format!("{:.1}s", elapsed.as_secs_f64())
  }
}

/// Render one pipeline event. Section headers (`==> ...`) are bold.
pub fn print_event(event: &StageEvent) {
  let message = event.message.as_str();
  match event.level {
    EventLevel::Info if message.starts_with("==>") => {
      println!("{}", message.if_supports_color(Stream::Stdout, |s| s.bold()))
    }
    EventLevel::Info => println!("{}", message),
    EventLevel::Success => print_success(message),
    EventLevel::Warning => eprintln!(
      "{} {}",
      WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
      message.if_supports_color(Stream::Stderr, |s| s.yellow())
    ),
    EventLevel::Error => eprintln!(
      "{} {}",
      ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
      message.if_supports_color(Stream::Stderr, |s| s.red())
    ),
  }
}

pub fn print_success(message: &str) {
  println!("{} {}", SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()), message);
}

pub fn print_info(message: &str) {
  println!("{} {}", INFO.if_supports_color(Stream::Stdout, |s| s.blue()), message);
}

/// An indented `label: value` line, used for artifacts and outputs.
pub fn print_stat(label: &str, value: &str) {
  println!("  {}: {}", label.if_supports_color(Stream::Stdout, |s| s.dimmed()), value);
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}
