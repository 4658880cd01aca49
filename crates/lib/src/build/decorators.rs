//! Cross-cutting behavior layered over build strategies.
//!
//! A [`Decorator`] maps a [`BuildFunc`] to another `BuildFunc` with the same
//! signature, so decorators stack freely and the registry never needs to
//! know which ones are applied.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use tracing::{debug, error, info};

use super::types::{Artifact, BuildConfig, BuildFunc, build_fn};

pub type Decorator = Box<dyn Fn(BuildFunc) -> BuildFunc + Send + Sync>;

/// Storage for completed builds, keyed by configuration.
pub trait BuildCache: Send + Sync {
  fn get(&self, cfg: &BuildConfig) -> Option<Artifact>;
  fn put(&self, cfg: BuildConfig, artifact: Artifact);
}

/// Process-local [`BuildCache`]. Safe to share between concurrent builds.
#[derive(Debug, Default)]
pub struct MemoryCache {
  entries: RwLock<HashMap<BuildConfig, Artifact>>,
}

impl MemoryCache {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.entries.read().map(|e| e.len()).unwrap_or(0)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl BuildCache for MemoryCache {
  fn get(&self, cfg: &BuildConfig) -> Option<Artifact> {
    self.entries.read().ok()?.get(cfg).cloned()
  }

  fn put(&self, cfg: BuildConfig, artifact: Artifact) {
    if let Ok(mut entries) = self.entries.write() {
      entries.insert(cfg, artifact);
    }
  }
}

/// Serve repeated builds of an identical configuration from `cache`.
///
/// Only successful builds are stored.
pub fn cache(cache: Arc<dyn BuildCache>) -> Decorator {
  Box::new(move |inner: BuildFunc| {
    let cache = cache.clone();
    build_fn(move |cancel, cfg| {
      let cache = cache.clone();
      let inner = inner.clone();
      async move {
        if let Some(hit) = cache.get(&cfg) {
          debug!(runtime = %cfg.runtime, source = ?cfg.source_dir, "build cache hit");
          return Ok(hit);
        }
        let artifact = inner(cancel, cfg.clone()).await?;
        cache.put(cfg, artifact.clone());
        Ok(artifact)
      }
    })
  })
}

/// Log the start and outcome of every build.
pub fn logging() -> Decorator {
  Box::new(|inner: BuildFunc| {
    build_fn(move |cancel, cfg| {
      let inner = inner.clone();
      async move {
        info!(runtime = %cfg.runtime, source = ?cfg.source_dir, "building");
        let started = Instant::now();
        let result = inner(cancel, cfg.clone()).await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match &result {
          Ok(artifact) => info!(
            runtime = %cfg.runtime,
            path = ?artifact.path,
            size = artifact.size_bytes,
            elapsed_ms,
            "build succeeded"
          ),
          Err(e) => error!(runtime = %cfg.runtime, error = %e, elapsed_ms, "build failed"),
        }
        result
      }
    })
  })
}

/// Combine decorators, applying them right to left.
///
/// `compose(vec![a, b])(f)` is `a(b(f))`: `a` is the outermost layer.
pub fn compose(decorators: Vec<Decorator>) -> Decorator {
  Box::new(move |build: BuildFunc| decorators.iter().rev().fold(build, |acc, decorate| decorate(acc)))
}
