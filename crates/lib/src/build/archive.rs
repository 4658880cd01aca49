//! Zip bundling and staged artifact writes.
//!
//! Artifacts are produced inside a staging directory next to the final
//! output and renamed into place once complete, so a failed build never
//! leaves a file at the output path.

use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use super::types::BuildError;
use crate::consts::{FORGE_DIR, STACK_FILE, STUB_COMMENT};

/// Names never bundled. Terraform runs inside the stack directory, so its
/// working files and state sit next to the sources.
const ALWAYS_SKIP: &[&str] = &[FORGE_DIR, ".git", ".terraform", ".terraform.lock.hcl", STACK_FILE];

/// Suffixes never bundled: terraform sources, variables, plans and state
/// (`terraform.tfstate`, `terraform.tfstate.backup`, `terraform.tfstate.d`).
const ALWAYS_SKIP_SUFFIXES: &[&str] = &[".tf", ".tf.json", ".tfvars", ".tfvars.json", ".tfplan"];

fn always_skipped(name: &str) -> bool {
  ALWAYS_SKIP.contains(&name)
    || ALWAYS_SKIP_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
    || name.starts_with("terraform.tfstate")
}

/// Temporary location for an artifact under construction.
pub(crate) struct Staging {
  dir: TempDir,
  file: PathBuf,
}

impl Staging {
  /// Create a staging directory beside `output`, creating the parent if needed.
  pub fn new(output: &Path) -> Result<Self, BuildError> {
    let parent = output.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(parent)?;
    let dir = tempfile::Builder::new().prefix(".staging-").tempdir_in(parent)?;
    let name = output.file_name().map(|n| n.to_os_string()).unwrap_or_else(|| "artifact".into());
    let file = dir.path().join(name);
    Ok(Self { dir, file })
  }

  /// Path the artifact should be written to.
  pub fn path(&self) -> &Path {
    &self.file
  }

  /// Scratch space that is removed with the staging directory.
  pub fn scratch(&self, name: &str) -> PathBuf {
    self.dir.path().join(name)
  }

  /// Move the finished artifact to `output`.
  pub fn commit(self, output: &Path) -> Result<(), BuildError> {
    if !self.file.exists() {
      return Err(BuildError::MissingFile(self.file.clone()));
    }
    std::fs::rename(&self.file, output)?;
    Ok(())
  }
}

fn file_options() -> SimpleFileOptions {
  SimpleFileOptions::default()
    .compression_method(CompressionMethod::Deflated)
    .last_modified_time(DateTime::default())
}

#[cfg(unix)]
fn file_mode(path: &Path) -> io::Result<u32> {
  use std::os::unix::fs::PermissionsExt;
  let mode = std::fs::metadata(path)?.permissions().mode();
  Ok(if mode & 0o111 != 0 { 0o755 } else { 0o644 })
}

#[cfg(not(unix))]
fn file_mode(_path: &Path) -> io::Result<u32> {
  Ok(0o644)
}

/// Collect the files under `roots` keyed by their archive name.
///
/// Later roots win when two roots provide the same name. `skip` filters by
/// file or directory name.
fn collect_entries(roots: &[PathBuf], skip: &dyn Fn(&str) -> bool) -> Result<BTreeMap<String, PathBuf>, BuildError> {
  let mut entries = BTreeMap::new();

  for root in roots {
    let walker = WalkDir::new(root).sort_by_file_name().into_iter().filter_entry(|e| {
      e.depth() == 0
        || e
          .file_name()
          .to_str()
          .map(|name| !always_skipped(name) && !skip(name))
          .unwrap_or(true)
    });

    for entry in walker {
      let entry = entry.map_err(|e| BuildError::Io(io::Error::other(e.to_string())))?;
      if !entry.file_type().is_file() {
        continue;
      }
      let rel = entry
        .path()
        .strip_prefix(root)
        .unwrap_or(entry.path())
        .to_string_lossy()
        .replace('\\', "/");
      entries.insert(rel, entry.path().to_path_buf());
    }
  }

  Ok(entries)
}

/// Write a deterministic zip of `roots` to `output`.
///
/// Entries are sorted by name and carry a fixed timestamp, so the same
/// inputs produce byte-identical archives.
pub(crate) fn zip_dirs(output: &Path, roots: &[PathBuf], skip: &dyn Fn(&str) -> bool) -> Result<(), BuildError> {
  let entries = collect_entries(roots, skip)?;
  let file = File::create(output)?;
  let mut writer = ZipWriter::new(file);

  for (name, path) in entries {
    writer.start_file(name, file_options().unix_permissions(file_mode(&path)?))?;
    let mut source = File::open(&path)?;
    io::copy(&mut source, &mut writer)?;
  }

  writer.finish()?;
  Ok(())
}

/// Run [`zip_dirs`] on the blocking pool.
pub(crate) async fn zip_dirs_blocking(
  output: PathBuf,
  roots: Vec<PathBuf>,
  skip: fn(&str) -> bool,
) -> Result<(), BuildError> {
  tokio::task::spawn_blocking(move || zip_dirs(&output, &roots, &skip))
    .await
    .map_err(|e| BuildError::Join(e.to_string()))?
}

/// Write an empty archive carrying the stub comment.
pub fn write_stub_archive(output: &Path) -> Result<(), BuildError> {
  let staging = Staging::new(output)?;
  {
    let file = File::create(staging.path())?;
    let mut writer = ZipWriter::new(file);
    writer.set_comment(STUB_COMMENT);
    writer.finish()?;
  }
  staging.commit(output)
}

/// Write an empty executable placeholder for bootstrap runtimes.
pub fn write_stub_bootstrap(output: &Path) -> Result<(), BuildError> {
  let staging = Staging::new(output)?;
  File::create(staging.path())?;
  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(staging.path(), std::fs::Permissions::from_mode(0o755))?;
  }
  staging.commit(output)
}
