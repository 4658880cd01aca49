//! Artifact builders.
//!
//! A [`Registry`] maps runtime identifiers to [`BuildFunc`] strategies.
//! Strategies are plain async functions; caching and logging are layered on
//! with [`Decorator`]s rather than built into the strategies.

mod archive;
mod decorators;
mod registry;
pub mod strategies;
mod types;

pub use archive::{write_stub_archive, write_stub_bootstrap};
pub use decorators::{BuildCache, Decorator, MemoryCache, cache, compose, logging};
pub use registry::{Registry, build_all, build_all_concurrent};
pub use types::{Artifact, BuildConfig, BuildError, BuildFunc, BuildFuture, BuildResult, build_fn};
